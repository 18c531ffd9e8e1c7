//! rpmlint checker
//!
//! Lints old and new binary packages and compares the error and warning
//! counts. The combined output lands in `<results>/rpmlint.txt`.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use anyhow::{Context, Result};
use regex::Regex;
use serde_json::json;

use crate::domain::CheckerCategory;
use crate::plugin::capability::{CheckRequest, Checker, Plugin, PluginContext};
use crate::storage::{find_program, is_executable, Payload};

pub const NAME: &str = "rpmlint";

/// Summary line, e.g. `2 packages and 0 specfiles checked; 1 errors, 3 warnings.`
const SUMMARY: &str = r"(\d+)\s+errors?,\s+(\d+)\s+warnings?";

const REPORT_FILE: &str = "rpmlint.txt";

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
struct LintCounts {
    errors: u64,
    warnings: u64,
}

pub struct Rpmlint {
    program: PathBuf,
    summary: Regex,
}

impl Rpmlint {
    pub fn new() -> Result<Self> {
        Self::with_program(NAME)
    }

    pub fn with_program(program: impl Into<PathBuf>) -> Result<Self> {
        Ok(Self {
            program: program.into(),
            summary: Regex::new(SUMMARY)?,
        })
    }

    fn parse_counts(&self, output: &str) -> LintCounts {
        output
            .lines()
            .rev()
            .find_map(|line| self.summary.captures(line))
            .map(|caps| LintCounts {
                errors: caps[1].parse().unwrap_or(0),
                warnings: caps[2].parse().unwrap_or(0),
            })
            .unwrap_or_default()
    }

    /// Runs rpmlint over `packages`; a non-zero exit only means findings
    fn lint(&self, packages: &[PathBuf]) -> Result<(String, LintCounts)> {
        if packages.is_empty() {
            return Ok((String::new(), LintCounts::default()));
        }

        let output = Command::new(&self.program)
            .args(packages)
            .output()
            .with_context(|| format!("Failed to execute {}", self.program.display()))?;

        let stdout = String::from_utf8_lossy(&output.stdout).into_owned();
        let counts = self.parse_counts(&stdout);
        Ok((stdout, counts))
    }
}

fn counts_of(payload: &Payload, side: &str) -> LintCounts {
    let count = |key: &str| payload[side][key].as_u64().unwrap_or(0);
    LintCounts {
        errors: count("errors"),
        warnings: count("warnings"),
    }
}

impl Plugin for Rpmlint {
    fn name(&self) -> &str {
        NAME
    }

    fn default_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Compares rpmlint findings of old and new packages"
    }
}

impl Checker for Rpmlint {
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
        tracing::info!("Running rpmlint on {} packages", request.old_packages.len() + request.new_packages.len());

        let (old_output, old) = self.lint(&request.old_packages)?;
        let (new_output, new) = self.lint(&request.new_packages)?;

        fs::create_dir_all(results_dir)
            .with_context(|| format!("Failed to create {}", results_dir.display()))?;
        let report = results_dir.join(REPORT_FILE);
        fs::write(&report, format!("=== old ===\n{}\n=== new ===\n{}", old_output, new_output))
            .with_context(|| format!("Failed to write {}", report.display()))?;

        Ok(json!({
            "path": report.display().to_string(),
            "old": {"errors": old.errors, "warnings": old.warnings},
            "new": {"errors": new.errors, "warnings": new.warnings},
        }))
    }

    fn important_changes(&self, payload: &Payload) -> Vec<String> {
        let old = counts_of(payload, "old");
        let new = counts_of(payload, "new");

        let mut changes = Vec::new();
        if new.errors > old.errors {
            changes.push(format!(
                "rpmlint errors increased from {} to {}",
                old.errors, new.errors
            ));
        }
        if new.warnings > old.warnings {
            changes.push(format!(
                "rpmlint warnings increased from {} to {}",
                old.warnings, new.warnings
            ));
        }
        changes
    }
}
