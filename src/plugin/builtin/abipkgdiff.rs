//! ABI comparison with abipkgdiff
//!
//! Every old binary package is compared with the new package of the same
//! name, with the matching `-debuginfo` packages passed along when present.
//! One log per package lands in `<results>/<name>-abipkgdiff.log`.

use std::fs::{self, File};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};

use anyhow::{Context, Result};
use serde_json::Map;

use crate::domain::CheckerCategory;
use crate::plugin::capability::{CheckRequest, Checker, Plugin, PluginContext};
use crate::storage::{find_program, is_executable, Payload};

pub const NAME: &str = "abipkgdiff";

const LOG_SUFFIX: &str = "-abipkgdiff.log";

/// abipkgdiff exit status bits
const ABIDIFF_ERROR: i32 = 1;
const ABIDIFF_USAGE_ERROR: i32 = 2;

const NOT_EQUAL: &str = "are not equal";

pub struct AbiPkgDiff {
    program: PathBuf,
}

impl AbiPkgDiff {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for AbiPkgDiff {
    fn default() -> Self {
        Self::new(NAME)
    }
}

/// Package name of an RPM file name (`foo-libs-1.0-1.fc40.x86_64.rpm` → `foo-libs`)
fn package_name(path: &Path) -> Option<&str> {
    let file_name = path.file_name()?.to_str()?;
    let nevra = file_name.strip_suffix(".rpm")?;
    let (nevr, _arch) = nevra.rsplit_once('.')?;
    let (nev, _release) = nevr.rsplit_once('-')?;
    let (name, _version) = nev.rsplit_once('-')?;
    Some(name)
}

fn is_debuginfo(path: &Path) -> bool {
    path.file_name()
        .is_some_and(|name| name.to_string_lossy().contains("debuginfo"))
}

/// The debuginfo package belonging to `name`
fn find_debuginfo<'a>(debuginfo: &[&'a PathBuf], name: &str) -> Option<&'a PathBuf> {
    let wanted = format!("{}-debuginfo", name);
    debuginfo
        .iter()
        .copied()
        .find(|p| package_name(p) == Some(wanted.as_str()))
}

impl Plugin for AbiPkgDiff {
    fn name(&self) -> &str {
        NAME
    }

    fn default_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Compares the ABI of old and new binary packages"
    }
}

impl Checker for AbiPkgDiff {
    fn category(&self) -> Option<CheckerCategory> {
        Some(CheckerCategory::Rpm)
    }

    fn is_available(&self) -> bool {
        if self.program.components().count() > 1 {
            return is_executable(&self.program);
        }
        self.program
            .to_str()
            .and_then(find_program)
            .is_some()
    }

    fn run_check(
        &self,
        results_dir: &Path,
        request: &CheckRequest,
        _ctx: &PluginContext<'_>,
    ) -> Result<Payload> {
        let (old_debuginfo, old_packages): (Vec<&PathBuf>, Vec<&PathBuf>) =
            request.old_packages.iter().partition(|p| is_debuginfo(p));
        let (new_debuginfo, new_packages): (Vec<&PathBuf>, Vec<&PathBuf>) =
            request.new_packages.iter().partition(|p| is_debuginfo(p));

        fs::create_dir_all(results_dir)
            .with_context(|| format!("Failed to create {}", results_dir.display()))?;

        let mut reports = Map::new();

        for old in old_packages {
            let Some(name) = package_name(old) else {
                tracing::warn!("Cannot determine the package name of {}", old.display());
                continue;
            };
            let Some(new) = new_packages.iter().find(|p| package_name(p) == Some(name)) else {
                tracing::warn!("New version of package {} was not found", name);
                continue;
            };

            let mut command = Command::new(&self.program);
            if let Some(debug) = find_debuginfo(&old_debuginfo, name) {
                command.arg("--d1").arg(debug);
            }
            if let Some(debug) = find_debuginfo(&new_debuginfo, name) {
                command.arg("--d2").arg(debug);
            }

            let log_path = results_dir.join(format!("{}{}", name, LOG_SUFFIX));
            let log = File::create(&log_path)
                .with_context(|| format!("Failed to create {}", log_path.display()))?;
            let log_err = log.try_clone()?;

            tracing::debug!("Comparing ABI of {}", name);
            let status = command
                .arg(old)
                .arg(new)
                .stdin(Stdio::null())
                .stdout(log)
                .stderr(log_err)
                .status()
                .with_context(|| format!("Failed to execute {}", self.program.display()))?;

            let code = status.code().unwrap_or(ABIDIFF_ERROR | ABIDIFF_USAGE_ERROR);
            if code & ABIDIFF_ERROR != 0 && code & ABIDIFF_USAGE_ERROR != 0 {
                anyhow::bail!("{} failed on {}, see {}", NAME, name, log_path.display());
            }

            let verdict = if code == 0 { "are equal" } else { NOT_EQUAL };
            reports.insert(
                log_path.display().to_string(),
                Payload::String(format!("ABI of the compared binaries in package {} {}.", name, verdict)),
            );
        }

        Ok(Payload::Object(reports))
    }

    fn important_changes(&self, payload: &Payload) -> Vec<String> {
        payload
            .as_object()
            .into_iter()
            .flat_map(|reports| reports.values())
            .filter_map(|text| text.as_str())
            .filter(|text| text.contains(NOT_EQUAL))
            .map(str::to_string)
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn package_names() {
        assert_eq!(package_name(Path::new("/r/foo-1.0-1.fc40.x86_64.rpm")), Some("foo"));
        assert_eq!(
            package_name(Path::new("foo-libs-debuginfo-2.3.1-4.noarch.rpm")),
            Some("foo-libs-debuginfo")
        );
        assert_eq!(package_name(Path::new("foo.tar.gz")), None);
    }

    #[test]
    fn reports_unequal_abi() {
        let checker = AbiPkgDiff::default();
        let payload = serde_json::json!({
            "a.log": "ABI of the compared binaries in package foo are equal.",
            "b.log": "ABI of the compared binaries in package foo-libs are not equal.",
        });

        assert_eq!(
            checker.important_changes(&payload),
            vec!["ABI of the compared binaries in package foo-libs are not equal."]
        );
    }

    #[cfg(unix)]
    #[test]
    fn compares_matching_packages() {
        use crate::plugin::{PluginRegistry, PluginRunner, RunEnv};
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fake-abipkgdiff");
        // Arguments are echoed; packages named foo-libs differ
        fs::write(
            &script,
            "#!/bin/sh\necho \"$@\"\ncase \"$*\" in *foo-libs-2*) exit 4 ;; esac\nexit 0\n",
        )
        .unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let checker = AbiPkgDiff::new(&script);
        assert!(checker.is_available());

        let runner = PluginRunner::new(PluginRegistry::new());
        let env = RunEnv::new(dir.path());
        let ctx = PluginContext { runner: &runner, env: &env };
        let request = CheckRequest {
            old_packages: vec![
                PathBuf::from("foo-1.0-1.x86_64.rpm"),
                PathBuf::from("foo-debuginfo-1.0-1.x86_64.rpm"),
                PathBuf::from("foo-libs-1.0-1.x86_64.rpm"),
                PathBuf::from("gone-1.0-1.x86_64.rpm"),
            ],
            new_packages: vec![
                PathBuf::from("foo-2.0-1.x86_64.rpm"),
                PathBuf::from("foo-debuginfo-2.0-1.x86_64.rpm"),
                PathBuf::from("foo-libs-2.0-1.x86_64.rpm"),
            ],
        };

        let results = dir.path().join("checkers").join(NAME);
        let payload = checker.run_check(&results, &request, &ctx).unwrap();

        assert_eq!(payload.as_object().unwrap().len(), 2);
        let foo_log = fs::read_to_string(results.join("foo-abipkgdiff.log")).unwrap();
        assert_eq!(
            foo_log.trim(),
            "--d1 foo-debuginfo-1.0-1.x86_64.rpm --d2 foo-debuginfo-2.0-1.x86_64.rpm foo-1.0-1.x86_64.rpm foo-2.0-1.x86_64.rpm"
        );
        assert_eq!(checker.important_changes(&payload).len(), 1);
    }

    #[cfg(unix)]
    #[test]
    fn usage_error_fails() {
        use crate::plugin::{PluginRegistry, PluginRunner, RunEnv};
        use std::os::unix::fs::PermissionsExt;
        use tempfile::TempDir;

        let dir = TempDir::new().unwrap();
        let script = dir.path().join("fake-abipkgdiff");
        fs::write(&script, "#!/bin/sh\nexit 3\n").unwrap();
        fs::set_permissions(&script, fs::Permissions::from_mode(0o755)).unwrap();

        let runner = PluginRunner::new(PluginRegistry::new());
        let env = RunEnv::new(dir.path());
        let ctx = PluginContext { runner: &runner, env: &env };
        let request = CheckRequest {
            old_packages: vec![PathBuf::from("foo-1.0-1.x86_64.rpm")],
            new_packages: vec![PathBuf::from("foo-2.0-1.x86_64.rpm")],
        };

        let err = AbiPkgDiff::new(&script)
            .run_check(dir.path(), &request, &ctx)
            .unwrap_err();
        assert!(err.to_string().contains("foo-abipkgdiff.log"));
    }
}
