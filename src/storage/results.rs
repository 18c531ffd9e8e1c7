//! Per-run result store
//!
//! Accumulates patch status, checker output, build-log-hook output and build
//! results keyed by plugin name. One store is created per rebase run and
//! passed by reference to every phase. It can be persisted as JSON
//! (`results.json`) for the reporting collaborators.

use std::collections::BTreeMap;
use std::fs::{self, File, OpenOptions};
use std::io::{BufReader, BufWriter, Write};
use std::path::Path;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use fs2::FileExt;
use serde::{Deserialize, Serialize};

/// Opaque plugin payload
pub type Payload = serde_json::Value;

/// File name the store is persisted under
pub const RESULTS_FILE: &str = "results.json";

/// Result categories
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ResultKind {
    Patches,
    Checkers,
    BuildLogHooks,
    Builds,
}

impl ResultKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            ResultKind::Patches => "patches",
            ResultKind::Checkers => "checkers",
            ResultKind::BuildLogHooks => "build_log_hooks",
            ResultKind::Builds => "builds",
        }
    }
}

/// Status of a patch after the rebase
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PatchStatus {
    /// Applies cleanly
    Unchanged,
    /// Had to be modified to apply
    Modified,
    /// Became empty and was removed
    Deleted,
    /// Does not apply anymore
    Inapplicable,
}

impl PatchStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            PatchStatus::Unchanged => "unchanged",
            PatchStatus::Modified => "modified",
            PatchStatus::Deleted => "deleted",
            PatchStatus::Inapplicable => "inapplicable",
        }
    }
}

/// Final outcome of a run
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Outcome {
    pub success: bool,
    pub message: String,
}

/// Explicit store of everything a run produced
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResultStore {
    pub started_at: DateTime<Utc>,

    #[serde(default)]
    pub patches: BTreeMap<String, Payload>,

    #[serde(default)]
    pub checkers: BTreeMap<String, Payload>,

    #[serde(default)]
    pub build_log_hooks: BTreeMap<String, Payload>,

    #[serde(default)]
    pub builds: BTreeMap<String, Payload>,

    /// Warnings surfaced in the final report
    #[serde(default)]
    pub warnings: Vec<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub outcome: Option<Outcome>,
}

impl Default for ResultStore {
    fn default() -> Self {
        Self::new()
    }
}

impl ResultStore {
    pub fn new() -> Self {
        Self {
            started_at: Utc::now(),
            patches: BTreeMap::new(),
            checkers: BTreeMap::new(),
            build_log_hooks: BTreeMap::new(),
            builds: BTreeMap::new(),
            warnings: Vec::new(),
            outcome: None,
        }
    }

    fn map(&self, kind: ResultKind) -> &BTreeMap<String, Payload> {
        match kind {
            ResultKind::Patches => &self.patches,
            ResultKind::Checkers => &self.checkers,
            ResultKind::BuildLogHooks => &self.build_log_hooks,
            ResultKind::Builds => &self.builds,
        }
    }

    fn map_mut(&mut self, kind: ResultKind) -> &mut BTreeMap<String, Payload> {
        match kind {
            ResultKind::Patches => &mut self.patches,
            ResultKind::Checkers => &mut self.checkers,
            ResultKind::BuildLogHooks => &mut self.build_log_hooks,
            ResultKind::Builds => &mut self.builds,
        }
    }

    /// Stores a payload, replacing any previous one under the same key
    pub fn set(&mut self, kind: ResultKind, key: impl Into<String>, payload: Payload) {
        self.map_mut(kind).insert(key.into(), payload);
    }

    pub fn get(&self, kind: ResultKind, key: &str) -> Option<&Payload> {
        self.map(kind).get(key)
    }

    /// All entries of a kind, ordered by key
    pub fn entries(&self, kind: ResultKind) -> impl Iterator<Item = (&str, &Payload)> {
        self.map(kind).iter().map(|(k, v)| (k.as_str(), v))
    }

    pub fn add_warning(&mut self, warning: impl Into<String>) {
        self.warnings.push(warning.into());
    }

    /// Records patch names under a status; later statuses for the same name win
    pub fn record_patches<I, S>(&mut self, status: PatchStatus, names: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for name in names {
            self.patches
                .insert(name.into(), Payload::String(status.as_str().to_string()));
        }
    }

    /// Patch names recorded under a status
    pub fn patch_list(&self, status: PatchStatus) -> Vec<&str> {
        self.patches
            .iter()
            .filter(|(_, v)| v.as_str() == Some(status.as_str()))
            .map(|(k, _)| k.as_str())
            .collect()
    }

    pub fn set_outcome(&mut self, success: bool, message: impl Into<String>) {
        self.outcome = Some(Outcome {
            success,
            message: message.into(),
        });
    }

    /// Writes the store as pretty JSON (exclusive lock, temp file + rename)
    pub fn write_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create directory: {}", parent.display()))?;
        }

        let temp_path = path.with_extension("json.tmp");

        {
            let file = OpenOptions::new()
                .write(true)
                .create(true)
                .truncate(true)
                .open(&temp_path)
                .with_context(|| format!("Failed to create temp file: {}", temp_path.display()))?;

            FileExt::lock_exclusive(&file).context("Failed to acquire write lock on result store")?;

            let mut writer = BufWriter::new(&file);
            serde_json::to_writer_pretty(&mut writer, self)
                .context("Failed to serialize result store")?;
            writeln!(writer).context("Failed to write result store")?;
            writer.flush().context("Failed to flush result store")?;
        }

        fs::rename(&temp_path, path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                path.display()
            )
        })?;

        Ok(())
    }

    /// Reads a store written by [`ResultStore::write_json`]
    pub fn read_json(path: &Path) -> Result<Self> {
        let file = File::open(path)
            .with_context(|| format!("Failed to open result store: {}", path.display()))?;

        FileExt::lock_shared(&file).context("Failed to acquire read lock on result store")?;

        serde_json::from_reader(BufReader::new(&file))
            .with_context(|| format!("Failed to parse result store: {}", path.display()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;
    use tempfile::TempDir;

    #[test]
    fn set_and_get_by_kind() {
        let mut store = ResultStore::new();
        store.set(ResultKind::Checkers, "rpmlint", json!({"errors": 0}));

        assert_eq!(
            store.get(ResultKind::Checkers, "rpmlint"),
            Some(&json!({"errors": 0}))
        );
        assert!(store.get(ResultKind::BuildLogHooks, "rpmlint").is_none());
    }

    #[test]
    fn patch_lists_by_status() {
        let mut store = ResultStore::new();
        store.record_patches(PatchStatus::Modified, ["a.patch", "b.patch"]);
        store.record_patches(PatchStatus::Deleted, ["b.patch"]);

        assert_eq!(store.patch_list(PatchStatus::Modified), vec!["a.patch"]);
        assert_eq!(store.patch_list(PatchStatus::Deleted), vec!["b.patch"]);
        assert!(store.patch_list(PatchStatus::Inapplicable).is_empty());
    }

    #[test]
    fn json_persistence() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("out").join(RESULTS_FILE);

        let mut store = ResultStore::new();
        store.set(ResultKind::BuildLogHooks, "files", json!({"added": {}}));
        store.add_warning("Patch4 is declared but never applied");
        store.set_outcome(true, "Rebase finished");
        store.write_json(&path).unwrap();

        let loaded = ResultStore::read_json(&path).unwrap();
        assert_eq!(loaded.started_at, store.started_at);
        assert_eq!(loaded.build_log_hooks, store.build_log_hooks);
        assert_eq!(loaded.warnings, store.warnings);
        assert_eq!(loaded.outcome, store.outcome);
        assert!(!dir.path().join("out").join("results.json.tmp").exists());
    }

    #[test]
    fn read_missing_file_fails() {
        let dir = TempDir::new().unwrap();
        assert!(ResultStore::read_json(&dir.path().join("nope.json")).is_err());
    }
}
