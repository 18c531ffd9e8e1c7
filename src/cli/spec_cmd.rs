//! Spec model commands

use std::path::Path;

use anyhow::Result;
use serde::Serialize;

use super::app::{build_runner, run_env};
use super::output::Output;
use crate::domain::{SourceEntry, SourceRole};
use crate::storage::{Config, Fetcher, PatchStatus, ResultStore, SpecFile, RESULTS_FILE};

#[derive(Serialize)]
struct SourceView {
    #[serde(flatten)]
    entry: SourceEntry,
    local: String,
    present: bool,
}

fn role_label(role: SourceRole) -> &'static str {
    match role {
        SourceRole::Generated => "Generated",
        SourceRole::Source => "Source",
        SourceRole::Patch => "Patch",
    }
}

pub fn sources(output: &Output, config: &Config, spec_path: &Path, fetch: bool) -> Result<()> {
    let spec = SpecFile::load(spec_path)?;

    if fetch {
        let fetcher = config.rebase.tools.fetcher();
        spec.resolve_sources(spec.dir(), Some(&fetcher as &dyn Fetcher))?;
    }

    let views: Vec<SourceView> = spec
        .sources()
        .into_iter()
        .map(|entry| {
            let local = spec.dir().join(entry.file_name());
            SourceView {
                present: local.exists(),
                local: local.display().to_string(),
                entry,
            }
        })
        .collect();

    if output.is_json() {
        output.data(&views);
        return Ok(());
    }

    for view in &views {
        let label = format!("{}{}", role_label(view.entry.role), view.entry.index);
        let state = if view.present { "present" } else { "missing" };
        output.row(&[&label, &view.entry.locator, state]);
    }

    Ok(())
}

pub fn patches(output: &Output, spec_path: &Path) -> Result<()> {
    let spec = SpecFile::load(spec_path)?;
    let records = spec.patch_records(spec.dir());

    if output.is_json() {
        output.data(&serde_json::json!({
            "autopatch": spec.uses_autopatch(),
            "patches": records,
        }));
        return Ok(());
    }

    if spec.uses_autopatch() {
        println!("Patches are applied with %autosetup/%autopatch");
    }
    for (number, record) in &records {
        let label = format!("Patch{}", number);
        let order = record.apply_order.to_string();
        let git = if record.git_generated { "git" } else { "-" };
        output.row(&[&label, &record.file_name(), &record.flags, &order, git]);
    }

    Ok(())
}

pub fn prune_patches(output: &Output, config: &Config, spec_path: &Path, output_dir: &Path) -> Result<()> {
    let original = SpecFile::load(spec_path)?;
    let mut patches = original.patch_records(original.dir());
    let declared = patches.clone();

    let mut working = original.working_copy(output_dir)?;
    let removed = working.write_updated_patches(&mut patches, &config.rebase.tools.lsdiff())?;

    let removed_names: Vec<String> = removed
        .iter()
        .filter_map(|n| declared.get(n))
        .map(|record| record.file_name())
        .collect();

    let mut store = ResultStore::new();
    store.record_patches(PatchStatus::Unchanged, patches.values().map(|r| r.file_name()));
    store.record_patches(PatchStatus::Deleted, removed_names.iter().cloned());
    store.write_json(&output_dir.join(RESULTS_FILE))?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "spec": working.path().display().to_string(),
            "removed": removed_names,
        }));
    } else if removed_names.is_empty() {
        output.success(&format!("No empty patches, wrote {}", working.path().display()));
    } else {
        output.success(&format!(
            "Removed {} empty patch(es): {}; wrote {}",
            removed_names.len(),
            removed_names.join(", "),
            working.path().display()
        ));
    }

    Ok(())
}

pub fn hooks(output: &Output, config: &Config, original_path: &Path, working_path: &Path) -> Result<()> {
    let original = SpecFile::load(original_path)?;
    let mut working = SpecFile::load(working_path)?;

    let runner = build_runner(config);
    let env = run_env(config, working.dir())?;
    runner.run_spec_hooks(&original, &mut working, &config.rebase.spec_hook_blacklist, &env)?;

    output.success(&format!("Applied spec hooks to {}", working.path().display()));
    Ok(())
}
