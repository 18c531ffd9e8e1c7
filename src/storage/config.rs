//! Configuration handling for specrebase
//!
//! Configuration is stored in `specrebase.toml` (next to the spec or in the
//! current directory) and `~/.config/specrebase/config.toml` (global).

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::storage::tools::{CommandFetcher, Lsdiff};

/// Project configuration file name
pub const CONFIG_FILE: &str = "specrebase.toml";

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Invalid configuration: {0}")]
    Invalid(String),

    #[error("Failed to parse configuration: {0}")]
    Parse(String),
}

/// External tool locations
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ToolsConfig {
    /// Diff-summary tool used as the empty-patch oracle
    pub lsdiff: PathBuf,

    /// Download command; destination and URL are appended
    pub fetch: Vec<String>,
}

impl Default for ToolsConfig {
    fn default() -> Self {
        Self {
            lsdiff: PathBuf::from("/usr/bin/lsdiff"),
            fetch: ["curl", "--fail", "--location", "--silent", "--show-error", "--output"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        }
    }
}

impl ToolsConfig {
    pub fn lsdiff(&self) -> Lsdiff {
        Lsdiff::new(&self.lsdiff)
    }

    pub fn fetcher(&self) -> CommandFetcher {
        CommandFetcher::new(self.fetch.clone())
    }
}

/// Run configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RebaseConfig {
    /// Never prompt; build-log hooks are skipped unless forced
    pub non_interactive: bool,

    /// Run build-log hooks even in non-interactive mode
    pub force_build_log_hooks: bool,

    /// Versioneer to use exclusively
    pub versioneer: Option<String>,

    pub output_tool: String,
    pub build_tool: String,
    pub srpm_build_tool: String,

    /// Checkers to run after a build
    pub checkers: Vec<String>,

    pub spec_hook_blacklist: Vec<String>,
    pub build_log_hook_blacklist: Vec<String>,
    pub versioneer_blacklist: Vec<String>,

    /// Extra directories scanned for executable plugins
    pub plugin_dirs: Vec<PathBuf>,

    pub tools: ToolsConfig,

    /// Free-form options passed to hooks
    pub hook_options: BTreeMap<String, toml::Value>,
}

impl Default for RebaseConfig {
    fn default() -> Self {
        Self {
            non_interactive: false,
            force_build_log_hooks: false,
            versioneer: None,
            output_tool: "text".to_string(),
            build_tool: "rpmbuild".to_string(),
            srpm_build_tool: "rpmbuild".to_string(),
            checkers: Vec::new(),
            spec_hook_blacklist: Vec::new(),
            build_log_hook_blacklist: Vec::new(),
            versioneer_blacklist: Vec::new(),
            plugin_dirs: Vec::new(),
            tools: ToolsConfig::default(),
            hook_options: BTreeMap::new(),
        }
    }
}

impl RebaseConfig {
    /// Checks values that cannot be expressed in the schema
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.output_tool.trim().is_empty() {
            return Err(ConfigError::Invalid("output_tool must not be empty".to_string()));
        }
        if self.build_tool.trim().is_empty() {
            return Err(ConfigError::Invalid("build_tool must not be empty".to_string()));
        }
        if self.tools.fetch.is_empty() {
            return Err(ConfigError::Invalid("tools.fetch must not be empty".to_string()));
        }
        Ok(())
    }
}

/// Global user configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct GlobalConfig {
    /// Default output format (text or json)
    pub default_format: OutputFormat,

    /// Plugin directories searched for every project
    pub plugin_dirs: Vec<PathBuf>,
}

/// Output format for commands
#[derive(Debug, Clone, Copy, Serialize, Deserialize, Default, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum OutputFormat {
    #[default]
    Text,
    Json,
}

/// Combined configuration (global + project)
#[derive(Debug, Clone, Default)]
pub struct Config {
    pub rebase: RebaseConfig,
    pub global: GlobalConfig,

    /// File the run configuration was read from
    pub source: Option<PathBuf>,
}

impl Config {
    /// Loads configuration looking for `specrebase.toml` in `dir`
    pub fn load_from(dir: &Path) -> Result<Self> {
        let global = Self::load_global()?;
        let path = dir.join(CONFIG_FILE);

        if !path.exists() {
            return Ok(Self {
                rebase: RebaseConfig::default(),
                global,
                source: None,
            });
        }

        let rebase = Self::load_rebase_config(&path)?;
        Ok(Self {
            rebase,
            global,
            source: Some(path),
        })
    }

    /// Loads configuration from the current directory
    pub fn load() -> Result<Self> {
        let cwd = std::env::current_dir().context("Failed to determine current directory")?;
        Self::load_from(&cwd)
    }

    /// Returns the global config directory
    pub fn global_config_dir() -> Option<PathBuf> {
        ProjectDirs::from("org", "specrebase", "specrebase")
            .map(|dirs| dirs.config_dir().to_path_buf())
    }

    fn load_global() -> Result<GlobalConfig> {
        let config_dir = match Self::global_config_dir() {
            Some(dir) => dir,
            None => return Ok(GlobalConfig::default()),
        };

        let config_path = config_dir.join("config.toml");
        if !config_path.exists() {
            return Ok(GlobalConfig::default());
        }

        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read global config: {}", config_path.display()))?;

        toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .context("Failed to parse global config")
    }

    fn load_rebase_config(path: &Path) -> Result<RebaseConfig> {
        let content = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config: {}", path.display()))?;

        let config: RebaseConfig = toml::from_str(&content)
            .map_err(|e| ConfigError::Parse(e.to_string()))
            .with_context(|| format!("Failed to parse config: {}", path.display()))?;

        config.validate()?;
        Ok(config)
    }

    /// Plugin directories from both config files.
    ///
    /// Relative project entries resolve against the config file's directory.
    pub fn plugin_dirs(&self) -> Vec<PathBuf> {
        let base = self
            .source
            .as_deref()
            .and_then(Path::parent)
            .map(Path::to_path_buf)
            .unwrap_or_default();

        self.rebase
            .plugin_dirs
            .iter()
            .map(|dir| if dir.is_relative() { base.join(dir) } else { dir.clone() })
            .chain(self.global.plugin_dirs.iter().cloned())
            .collect()
    }
}
