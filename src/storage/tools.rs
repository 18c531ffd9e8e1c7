//! External processes used by the spec model
//!
//! - [`Lsdiff`] answers "does this patch touch any file?" for empty-patch
//!   pruning. Any failure counts as "not empty" so an unparseable patch is
//!   never dropped.
//! - [`CommandFetcher`] downloads remote sources. Failures propagate.

use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};

/// Oracle deciding whether a patch is empty
pub trait PatchInspector {
    fn is_empty(&self, patch: &Path) -> bool;
}

/// Emptiness oracle backed by `lsdiff` from patchutils
#[derive(Debug, Clone)]
pub struct Lsdiff {
    program: PathBuf,
}

impl Lsdiff {
    pub fn new(program: impl Into<PathBuf>) -> Self {
        Self {
            program: program.into(),
        }
    }
}

impl Default for Lsdiff {
    fn default() -> Self {
        Self::new("/usr/bin/lsdiff")
    }
}

impl PatchInspector for Lsdiff {
    fn is_empty(&self, patch: &Path) -> bool {
        let output = match Command::new(&self.program).arg(patch).output() {
            Ok(output) => output,
            Err(e) => {
                tracing::debug!("Failed to run {}: {}", self.program.display(), e);
                return false;
            }
        };

        if !output.status.success() {
            tracing::debug!(
                "{} exited with {} for {}",
                self.program.display(),
                output.status,
                patch.display()
            );
            return false;
        }

        String::from_utf8_lossy(&output.stdout).trim().is_empty()
    }
}

/// Downloads a remote artifact to a local path
pub trait Fetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()>;
}

/// Fetcher running an external download command.
///
/// The destination path and the URL are appended to `argv`.
#[derive(Debug, Clone)]
pub struct CommandFetcher {
    argv: Vec<String>,
}

impl CommandFetcher {
    pub fn new(argv: Vec<String>) -> Self {
        Self { argv }
    }
}

impl Default for CommandFetcher {
    fn default() -> Self {
        Self::new(
            ["curl", "--fail", "--location", "--silent", "--show-error", "--output"]
                .iter()
                .map(|s| s.to_string())
                .collect(),
        )
    }
}

impl Fetcher for CommandFetcher {
    fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
        let (program, args) = self
            .argv
            .split_first()
            .ok_or_else(|| anyhow::anyhow!("Fetch command is empty"))?;

        tracing::info!("Downloading {}", url);

        let output = Command::new(program)
            .args(args)
            .arg(dest)
            .arg(url)
            .output()
            .with_context(|| format!("Failed to execute fetch command: {}", program))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Failed to download {}: {}", url, stderr.trim());
        }

        Ok(())
    }
}

/// Checks if a file is executable
pub fn is_executable(path: &Path) -> bool {
    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        if let Ok(meta) = path.metadata() {
            return meta.is_file() && meta.permissions().mode() & 0o111 != 0;
        }
    }

    #[cfg(windows)]
    {
        if let Some(ext) = path.extension() {
            return ext == "exe" || ext == "bat" || ext == "cmd";
        }
    }

    false
}

/// Finds an executable on `PATH`
pub fn find_program(name: &str) -> Option<PathBuf> {
    let path_var = std::env::var_os("PATH")?;
    std::env::split_paths(&path_var)
        .map(|dir| dir.join(name))
        .find(|candidate| is_executable(candidate))
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn missing_oracle_means_not_empty() {
        let lsdiff = Lsdiff::new("/nonexistent/lsdiff");
        assert!(!lsdiff.is_empty(Path::new("whatever.patch")));
    }

    #[cfg(unix)]
    fn script(dir: &Path, name: &str, body: &str) -> PathBuf {
        use std::os::unix::fs::PermissionsExt;
        let path = dir.join(name);
        fs::write(&path, format!("#!/bin/sh\n{}\n", body)).unwrap();
        fs::set_permissions(&path, fs::Permissions::from_mode(0o755)).unwrap();
        path
    }

    #[cfg(unix)]
    #[test]
    fn oracle_output_decides_emptiness() {
        let dir = TempDir::new().unwrap();

        let silent = Lsdiff::new(script(dir.path(), "silent", "exit 0"));
        assert!(silent.is_empty(Path::new("x.patch")));

        let listing = Lsdiff::new(script(dir.path(), "listing", "echo src/main.c"));
        assert!(!listing.is_empty(Path::new("x.patch")));

        let failing = Lsdiff::new(script(dir.path(), "failing", "exit 2"));
        assert!(!failing.is_empty(Path::new("x.patch")));
    }

    #[cfg(unix)]
    #[test]
    fn fetch_failure_propagates() {
        let dir = TempDir::new().unwrap();
        let fetcher = CommandFetcher::new(vec![script(dir.path(), "fail", "exit 1")
            .display()
            .to_string()]);

        let result = fetcher.fetch("https://example.com/a.tar.gz", &dir.path().join("a.tar.gz"));
        assert!(result.is_err());
    }

    #[test]
    fn empty_fetch_command_is_an_error() {
        let fetcher = CommandFetcher::new(Vec::new());
        assert!(fetcher.fetch("https://x", Path::new("x")).is_err());
    }
}
