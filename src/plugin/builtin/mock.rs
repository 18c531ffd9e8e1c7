//! Chroot builds with mock
//!
//! The source package comes from `mock --buildsrpm`, binary packages from
//! `mock --rebuild` of that source package. mock keeps its own logs
//! (`build.log`, `root.log`) in the result directory; its console output
//! is written next to them to `mock_output.log`.

use std::ffi::OsStr;
use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::plugin::capability::{BuildOutcome, BuildRequest, BuildTool, Plugin, SrpmBuildTool};
use crate::storage::SpecFile;

pub const NAME: &str = "mock";

const OUTPUT_LOG: &str = "mock_output.log";

#[derive(Debug, Clone)]
pub struct Mock {
    program: PathBuf,
}

impl Mock {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    fn run(&self, args: &[&OsStr], results_dir: &Path) -> Result<()> {
        fs::create_dir_all(results_dir)
            .with_context(|| format!("Failed to create {}", results_dir.display()))?;

        let output_path = results_dir.join(OUTPUT_LOG);
        let log = File::create(&output_path)
            .with_context(|| format!("Failed to create {}", output_path.display()))?;
        let log_err = log.try_clone()?;

        let status = Command::new(&self.program)
            .arg("--old-chroot")
            .args(args)
            .arg("--resultdir")
            .arg(results_dir)
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .status()
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;

        if !status.success() {
            anyhow::bail!(
                "{} failed with {}, see {}",
                self.program.display(),
                status,
                failure_log(status.code(), results_dir).display()
            );
        }

        Ok(())
    }

    fn build_srpm_into(&self, spec: &SpecFile, sources_dir: &Path, results_dir: &Path) -> Result<PathBuf> {
        tracing::info!("Building SRPM of {} with mock", spec.path().display());
        self.run(
            &[
                OsStr::new("--buildsrpm"),
                OsStr::new("--spec"),
                spec.path().as_os_str(),
                OsStr::new("--sources"),
                sources_dir.as_os_str(),
            ],
            results_dir,
        )?;

        files_with_suffix(results_dir, ".src.rpm")?
            .into_iter()
            .next()
            .ok_or_else(|| anyhow::anyhow!("mock produced no source package in {}", results_dir.display()))
    }
}

impl Default for Mock {
    fn default() -> Self {
        Self::new(NAME)
    }
}

/// Log explaining a failed run: exit code 1 is a failed build, anything
/// else failed while preparing the chroot
fn failure_log(code: Option<i32>, results_dir: &Path) -> PathBuf {
    let build_log = results_dir.join("build.log");
    let output_log = results_dir.join(OUTPUT_LOG);

    match code {
        Some(1) if !build_log.exists() && output_log.exists() => output_log,
        Some(1) => build_log,
        _ => results_dir.join("root.log"),
    }
}

/// Files directly in `dir` whose name ends with `suffix`, sorted
fn files_with_suffix(dir: &Path, suffix: &str) -> Result<Vec<PathBuf>> {
    let mut files = Vec::new();

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_file() && path.to_string_lossy().ends_with(suffix) {
            files.push(path);
        }
    }

    files.sort();
    Ok(files)
}

impl Plugin for Mock {
    fn name(&self) -> &str {
        NAME
    }

    fn description(&self) -> &str {
        "Builds packages in a clean chroot with mock"
    }
}

impl BuildTool for Mock {
    fn build(&self, spec: &SpecFile, request: &BuildRequest) -> Result<BuildOutcome> {
        let srpm = match &request.srpm {
            Some(srpm) => srpm.clone(),
            None => self.build_srpm_into(spec, &request.sources_dir, &request.results_dir.join("SRPM"))?,
        };

        tracing::info!("Building RPMs from {} with mock", srpm.display());
        self.run(&[OsStr::new("--rebuild"), srpm.as_os_str()], &request.results_dir)?;

        // The rebuilt source package is a side product
        let packages = files_with_suffix(&request.results_dir, ".rpm")?
            .into_iter()
            .filter(|p| !p.to_string_lossy().ends_with(".src.rpm"))
            .collect();

        Ok(BuildOutcome {
            packages,
            logs: files_with_suffix(&request.results_dir, ".log")?,
        })
    }
}

impl SrpmBuildTool for Mock {
    fn build_srpm(&self, spec: &SpecFile, request: &BuildRequest) -> Result<BuildOutcome> {
        let srpm = self.build_srpm_into(spec, &request.sources_dir, &request.results_dir)?;

        Ok(BuildOutcome {
            packages: vec![srpm],
            logs: files_with_suffix(&request.results_dir, ".log")?,
        })
    }
}
