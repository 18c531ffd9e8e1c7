//! Report output tools
//!
//! - `text` writes `report.txt` and prints a readable summary
//! - `json` writes `report.json` holding the whole result store

use std::fmt::Write as _;
use std::fs;
use std::io::Write;
use std::path::Path;

use anyhow::{Context, Result};
use serde_json::json;

use crate::plugin::capability::{OutputTool, Plugin, ReportContext};
use crate::storage::{PatchStatus, ResultKind};

pub const TEXT_NAME: &str = "text";
pub const JSON_NAME: &str = "json";

const PATCH_STATUSES: [PatchStatus; 4] = [
    PatchStatus::Deleted,
    PatchStatus::Modified,
    PatchStatus::Inapplicable,
    PatchStatus::Unchanged,
];

fn write_report(dir: &Path, file: &str, contents: &str) -> Result<()> {
    fs::create_dir_all(dir).with_context(|| format!("Failed to create {}", dir.display()))?;
    let path = dir.join(file);
    fs::write(&path, contents).with_context(|| format!("Failed to write {}", path.display()))?;
    tracing::info!("Report written to {}", path.display());
    Ok(())
}

/// Short human summary shared by both output tools
fn summary(report: &ReportContext<'_>) -> String {
    let store = report.store;
    let mut out = String::new();

    for status in PATCH_STATUSES {
        let patches = store.patch_list(status);
        if !patches.is_empty() {
            let _ = writeln!(out, "Patches {}: {}", status.as_str(), patches.join(", "));
        }
    }

    for (name, payload) in store.entries(ResultKind::Checkers) {
        for change in report.runner.important_changes(name, payload) {
            let _ = writeln!(out, "{}: {}", name, change);
        }
    }

    for (name, payload) in store.entries(ResultKind::BuildLogHooks) {
        let _ = writeln!(out, "Build log hook {}: {}", name, payload);
    }

    for warning in &store.warnings {
        let _ = writeln!(out, "Warning: {}", warning);
    }

    match &store.outcome {
        Some(outcome) if outcome.success => {
            let _ = writeln!(out, "Rebase succeeded: {}", outcome.message);
        }
        Some(outcome) => {
            let _ = writeln!(out, "Rebase failed: {}", outcome.message);
        }
        None => {}
    }

    out
}

pub struct TextOutput;

impl Plugin for TextOutput {
    fn name(&self) -> &str {
        TEXT_NAME
    }

    fn default_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Plain text report"
    }
}

impl OutputTool for TextOutput {
    fn run(&self, logs: &[String], report: &ReportContext<'_>) -> Result<()> {
        let mut text = format!(
            "Rebase report\nStarted: {}\n\n",
            report.store.started_at.format("%Y-%m-%d %H:%M:%S UTC")
        );
        text.push_str(&summary(report));

        for (name, payload) in report.store.entries(ResultKind::Checkers) {
            let _ = writeln!(text, "\nChecker {}:\n{}", name, payload);
        }

        if !logs.is_empty() {
            text.push_str("\nLogs:\n");
            for log in logs {
                let _ = writeln!(text, "  {}", log);
            }
        }

        write_report(report.results_dir, "report.txt", &text)
    }

    fn print_cli_summary(&self, report: &ReportContext<'_>, out: &mut dyn Write) -> Result<()> {
        out.write_all(summary(report).as_bytes())?;
        Ok(())
    }
}

pub struct JsonOutput;

impl Plugin for JsonOutput {
    fn name(&self) -> &str {
        JSON_NAME
    }

    fn description(&self) -> &str {
        "JSON report"
    }
}

impl OutputTool for JsonOutput {
    fn run(&self, logs: &[String], report: &ReportContext<'_>) -> Result<()> {
        let document = json!({
            "results": report.store,
            "logs": logs,
        });
        let text = serde_json::to_string_pretty(&document)?;
        write_report(report.results_dir, "report.json", &text)
    }

    fn print_cli_summary(&self, report: &ReportContext<'_>, out: &mut dyn Write) -> Result<()> {
        writeln!(out, "Report written to {}", report.results_dir.join("report.json").display())?;
        Ok(())
    }
}
