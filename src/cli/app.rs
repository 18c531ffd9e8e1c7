//! Main CLI application structure

use std::path::{Path, PathBuf};

use anyhow::Result;
use clap::{Parser, Subcommand};

use super::output::{Output, OutputFormat};
use super::{build_cmd, plugin_cmd, report_cmd, spec_cmd};
use crate::domain::PackageCategory;
use crate::logger;
use crate::plugin::{HookOptions, PluginKind, PluginRegistry, PluginRunner, RunEnv};
use crate::storage::{Config, CONFIG_FILE};

#[derive(Parser)]
#[command(name = "specrebase")]
#[command(author, version, about = "Rebase RPM spec files to new upstream versions")]
#[command(propagate_version = true)]
pub struct Cli {
    /// Output format (defaults to the global configuration)
    #[arg(long, short = 'f', global = true)]
    pub format: Option<OutputFormat>,

    /// Enable debug logging
    #[arg(long, short = 'v', global = true)]
    pub verbose: bool,

    /// Only log errors
    #[arg(long, short = 'q', global = true)]
    pub quiet: bool,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// List registered plugins
    Plugins {
        /// Only list plugins of this kind (e.g. spec-hook, checker)
        #[arg(long)]
        kind: Option<PluginKind>,
    },

    /// List sources declared by a spec file
    Sources {
        /// Spec file
        spec: PathBuf,

        /// Download remote sources missing next to the spec
        #[arg(long)]
        fetch: bool,
    },

    /// List patches and how they are applied
    Patches {
        /// Spec file
        spec: PathBuf,
    },

    /// Write a working copy of the spec without its empty patches
    PrunePatches {
        /// Spec file
        spec: PathBuf,

        /// Directory receiving the working copy and results.json
        #[arg(long)]
        output_dir: PathBuf,
    },

    /// Run spec hooks against a working copy
    Hooks {
        /// Spec file before the rebase
        original: PathBuf,

        /// Working copy to update in place
        working: PathBuf,
    },

    /// Build old and new packages, repair the working copy from build logs and run checkers
    Rebuild {
        /// Spec file before the rebase
        original: PathBuf,

        /// Working copy, updated in place by build log hooks
        working: PathBuf,

        /// Directory receiving builds, checker output and results.json
        #[arg(long)]
        results_dir: PathBuf,

        /// Do not run build log hooks
        #[arg(long)]
        non_interactive: bool,

        /// Run build log hooks even when non-interactive
        #[arg(long)]
        force_build_log_hooks: bool,
    },

    /// Find the latest upstream version of a package
    LatestVersion {
        /// Package name
        package: String,

        /// Versioneer to use (overrides the configuration)
        #[arg(long)]
        versioneer: Option<String>,

        /// Package category (python, ruby, ...)
        #[arg(long)]
        category: Option<PackageCategory>,
    },

    /// Render a report from a stored results.json
    Report {
        /// Path to results.json
        results: PathBuf,

        /// Output tool (overrides the configuration)
        #[arg(long)]
        tool: Option<String>,
    },
}

impl Commands {
    /// File whose directory may hold a `specrebase.toml`
    fn anchor_path(&self) -> Option<&Path> {
        match self {
            Commands::Sources { spec, .. }
            | Commands::Patches { spec }
            | Commands::PrunePatches { spec, .. } => Some(spec.as_path()),
            Commands::Hooks { working, .. } | Commands::Rebuild { working, .. } => {
                Some(working.as_path())
            }
            Commands::Report { results, .. } => Some(results.as_path()),
            Commands::Plugins { .. } | Commands::LatestVersion { .. } => None,
        }
    }
}

/// Loads configuration from next to `anchor` when present, else the current directory
fn load_config(anchor: Option<&Path>) -> Result<Config> {
    let dir = anchor
        .and_then(Path::parent)
        .filter(|dir| !dir.as_os_str().is_empty() && dir.join(CONFIG_FILE).exists());

    match dir {
        Some(dir) => Config::load_from(dir),
        None => Config::load(),
    }
}

/// Builtin plugins plus executables from the configured plugin dirs and `$PATH`
pub(super) fn build_runner(config: &Config) -> PluginRunner {
    let mut registry = PluginRegistry::with_builtins();
    for dir in config.plugin_dirs() {
        registry.add_plugin_dir(dir);
    }
    registry.discover();
    PluginRunner::new(registry)
}

/// Plugin environment for a results directory
pub(super) fn run_env(config: &Config, results_dir: &Path) -> Result<RunEnv> {
    let options = HookOptions::from_toml(&config.rebase.hook_options)?;
    Ok(RunEnv::new(results_dir).with_options(options))
}

/// Main entry point for the CLI
pub fn run() -> Result<()> {
    let cli = Cli::parse();
    logger::init_logger(cli.verbose, cli.quiet);

    let config = load_config(cli.command.anchor_path())?;
    if let Some(source) = &config.source {
        tracing::debug!("Using configuration from {}", source.display());
    }

    let format = cli.format.unwrap_or_else(|| config.global.default_format.into());
    let output = Output::new(format);

    match cli.command {
        Commands::Plugins { kind } => plugin_cmd::list(&output, &config, kind)?,
        Commands::LatestVersion {
            package,
            versioneer,
            category,
        } => plugin_cmd::latest_version(&output, &config, &package, versioneer.as_deref(), category)?,

        Commands::Sources { spec, fetch } => spec_cmd::sources(&output, &config, &spec, fetch)?,
        Commands::Patches { spec } => spec_cmd::patches(&output, &spec)?,
        Commands::PrunePatches { spec, output_dir } => {
            spec_cmd::prune_patches(&output, &config, &spec, &output_dir)?
        }
        Commands::Hooks { original, working } => spec_cmd::hooks(&output, &config, &original, &working)?,
        Commands::Rebuild {
            original,
            working,
            results_dir,
            non_interactive,
            force_build_log_hooks,
        } => build_cmd::rebuild(
            &output,
            &config,
            &original,
            &working,
            &results_dir,
            non_interactive,
            force_build_log_hooks,
        )?,

        Commands::Report { results, tool } => report_cmd::run(&output, &config, &results, tool.as_deref())?,
    }

    tracing::debug!("Command completed successfully");
    Ok(())
}
