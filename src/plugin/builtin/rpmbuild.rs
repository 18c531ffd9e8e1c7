//! Local builds with rpmbuild
//!
//! The build tree lives under `<results>/rpmbuild`; sources and patches are
//! read from the request's sources directory. The build output is written
//! to `<results>/build.log`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};

use crate::plugin::capability::{BuildOutcome, BuildRequest, BuildTool, Plugin, SrpmBuildTool};
use crate::storage::SpecFile;

pub const NAME: &str = "rpmbuild";

const LOG_FILE: &str = "build.log";

#[derive(Debug, Clone)]
pub struct Rpmbuild {
    program: PathBuf,
}

impl Rpmbuild {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }

    /// Runs rpmbuild in `mode` (`-bb` or `-bs`) and collects packages from `output_dir`
    fn run(&self, mode: &str, output_dir: &str, spec: &SpecFile, request: &BuildRequest) -> Result<BuildOutcome> {
        let topdir = request.results_dir.join("rpmbuild");
        fs::create_dir_all(&topdir)
            .with_context(|| format!("Failed to create {}", topdir.display()))?;

        let log_path = request.results_dir.join(LOG_FILE);
        let log = File::create(&log_path)
            .with_context(|| format!("Failed to create {}", log_path.display()))?;
        let log_err = log.try_clone()?;

        tracing::info!("Building {} with {} {}", spec.path().display(), self.program.display(), mode);

        let status = Command::new(&self.program)
            .arg(mode)
            .arg("--define")
            .arg(format!("_topdir {}", topdir.display()))
            .arg("--define")
            .arg(format!("_sourcedir {}", request.sources_dir.display()))
            .arg(spec.path())
            .stdin(Stdio::null())
            .stdout(log)
            .stderr(log_err)
            .status()
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;

        if !status.success() {
            anyhow::bail!(
                "{} {} failed with {}, see {}",
                self.program.display(),
                mode,
                status,
                log_path.display()
            );
        }

        let mut packages = Vec::new();
        collect_packages(&topdir.join(output_dir), &mut packages)?;
        packages.sort();

        Ok(BuildOutcome {
            packages,
            logs: vec![log_path],
        })
    }
}

impl Default for Rpmbuild {
    fn default() -> Self {
        Self::new(NAME)
    }
}

/// Collects `*.rpm` files below `dir`
fn collect_packages(dir: &Path, packages: &mut Vec<PathBuf>) -> Result<()> {
    if !dir.exists() {
        return Ok(());
    }

    for entry in fs::read_dir(dir).with_context(|| format!("Failed to read {}", dir.display()))? {
        let path = entry?.path();
        if path.is_dir() {
            collect_packages(&path, packages)?;
        } else if path.extension().is_some_and(|ext| ext == "rpm") {
            packages.push(path);
        }
    }

    Ok(())
}

impl Plugin for Rpmbuild {
    fn name(&self) -> &str {
        NAME
    }

    fn default_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Builds packages locally with rpmbuild"
    }
}

impl BuildTool for Rpmbuild {
    fn build(&self, spec: &SpecFile, request: &BuildRequest) -> Result<BuildOutcome> {
        self.run("-bb", "RPMS", spec, request)
    }
}

impl SrpmBuildTool for Rpmbuild {
    fn build_srpm(&self, spec: &SpecFile, request: &BuildRequest) -> Result<BuildOutcome> {
        self.run("-bs", "SRPMS", spec, request)
    }
}
