//! Build, check and rebuild after build-log hooks

use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::Serialize;

use super::app::{build_runner, run_env};
use super::output::Output;
use crate::domain::CheckerCategory;
use crate::plugin::{BuildRequest, CheckRequest, PluginKind, PluginRunner};
use crate::storage::{Config, RebaseConfig, ResultKind, ResultStore, SpecFile, RESULTS_FILE};

/// Builds of the working spec before giving up
const MAX_BUILD_ATTEMPTS: usize = 5;

/// Source and binary packages of one build
#[derive(Debug, Default, Serialize)]
struct Packages {
    srpm: Vec<PathBuf>,
    rpm: Vec<PathBuf>,
    logs: Vec<PathBuf>,
}

/// Builds the SRPM into `<dir>/SRPM`, then binary packages into `<dir>/RPM`
fn build_packages(runner: &PluginRunner, rebase: &RebaseConfig, spec: &SpecFile, dir: &Path) -> Result<Packages> {
    let srpm_tool = runner.srpm_build_tool(&rebase.srpm_build_tool)?;
    let build_tool = runner.build_tool(&rebase.build_tool)?;

    let srpm = srpm_tool
        .build_srpm(
            spec,
            &BuildRequest {
                results_dir: dir.join("SRPM"),
                sources_dir: spec.dir().to_path_buf(),
                srpm: None,
            },
        )
        .with_context(|| format!("Failed to build the SRPM of {}", spec.path().display()))?;

    let rpm = build_tool
        .build(
            spec,
            &BuildRequest {
                results_dir: dir.join("RPM"),
                sources_dir: spec.dir().to_path_buf(),
                srpm: srpm.packages.first().cloned(),
            },
        )
        .with_context(|| format!("Failed to build RPMs of {}", spec.path().display()))?;

    let mut logs = srpm.logs;
    logs.extend(rpm.logs);

    Ok(Packages {
        srpm: srpm.packages,
        rpm: rpm.packages,
        logs,
    })
}

/// Configured checkers, or every default-enabled one
fn checker_names(runner: &PluginRunner, rebase: &RebaseConfig) -> Vec<String> {
    if rebase.checkers.is_empty() {
        runner.default_checkers().into_iter().map(str::to_string).collect()
    } else {
        rebase.checkers.clone()
    }
}

pub fn rebuild(
    output: &Output,
    config: &Config,
    original_path: &Path,
    working_path: &Path,
    results_dir: &Path,
    non_interactive: bool,
    force_build_log_hooks: bool,
) -> Result<()> {
    let original = SpecFile::load(original_path)?;
    let mut working = SpecFile::load(working_path)?;

    fs::create_dir_all(results_dir)
        .with_context(|| format!("Failed to create directory: {}", results_dir.display()))?;
    let results_dir = std::path::absolute(results_dir)
        .with_context(|| format!("Failed to resolve path: {}", results_dir.display()))?;

    let rebase = &config.rebase;
    let non_interactive = non_interactive || rebase.non_interactive;
    let force = force_build_log_hooks || rebase.force_build_log_hooks;

    let runner = build_runner(config);
    let env = run_env(config, &results_dir)?;
    let mut store = ResultStore::new();

    // Unknown tools fail before anything is built
    runner.srpm_build_tool(&rebase.srpm_build_tool)?;
    runner.build_tool(&rebase.build_tool)?;

    let old = build_packages(&runner, rebase, &original, &results_dir.join("old-build"))
        .context("The original package does not build")?;
    store.set(ResultKind::Builds, "old", serde_json::to_value(&old)?);

    let mut attempt = 1;
    let new = loop {
        match build_packages(&runner, rebase, &working, &results_dir.join("new-build")) {
            Ok(packages) => break Ok(packages),
            Err(e) => {
                tracing::warn!("Build attempt {} failed: {:#}", attempt, e);
                let rerun = attempt < MAX_BUILD_ATTEMPTS
                    && runner.run_build_log_hooks(
                        &original,
                        &mut working,
                        non_interactive,
                        force,
                        &rebase.build_log_hook_blacklist,
                        &env,
                        &mut store,
                    )?;
                if !rerun {
                    break Err(e);
                }
                attempt += 1;
            }
        }
    };

    let mut logs: Vec<String> = old.logs.iter().map(|p| p.display().to_string()).collect();

    match &new {
        Ok(new) => {
            store.set(ResultKind::Builds, "new", serde_json::to_value(new)?);
            logs.extend(new.logs.iter().map(|p| p.display().to_string()));

            let checkers = checker_names(&runner, rebase);
            // Unknown names are reported once, by the RPM pass
            let known: Vec<String> = checkers
                .iter()
                .filter(|name| runner.registry().is_known(PluginKind::Checker, name))
                .cloned()
                .collect();

            let srpms = CheckRequest {
                old_packages: old.srpm.clone(),
                new_packages: new.srpm.clone(),
            };
            runner.run_checkers(&known, CheckerCategory::Srpm, &srpms, &env, &mut store)?;

            let rpms = CheckRequest {
                old_packages: old.rpm.clone(),
                new_packages: new.rpm.clone(),
            };
            runner.run_checkers(&checkers, CheckerCategory::Rpm, &rpms, &env, &mut store)?;

            let nvr = working.nvr().unwrap_or_else(|| working.path().display().to_string());
            store.set_outcome(true, nvr);
        }
        Err(e) => store.set_outcome(false, format!("{:#}", e)),
    }

    let results_file = results_dir.join(RESULTS_FILE);
    store.write_json(&results_file)?;

    runner.run_output_tool(&rebase.output_tool, &logs, &store, &results_dir)?;
    if output.is_json() {
        output.data(&store);
    } else {
        let mut stdout = std::io::stdout().lock();
        runner.print_cli_summary(&rebase.output_tool, &store, &results_dir, &mut stdout)?;
    }

    new.map(drop)
        .with_context(|| format!("Rebuild failed, results in {}", results_file.display()))
}
