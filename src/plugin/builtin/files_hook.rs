//! `%files` repair from the build log
//!
//! Two rpmbuild failures are handled:
//! - `File not found: <buildroot>/path` → the path is removed from the
//!   `%files` section listing it
//! - `Installed (but unpackaged) file(s) found:` followed by paths → each
//!   path is added to the `%files` section holding the closest path, or to
//!   the main `%files` section
//!
//! The build log is read from `<results>/new-build/RPM/build.log`.

use std::collections::{BTreeMap, BTreeSet};
use std::fs;
use std::path::Path;

use anyhow::Result;
use globset::Glob;
use regex::Regex;
use serde_json::{json, Map};

use crate::domain::{MacroTable, SpecContent};
use crate::plugin::capability::{BuildLogHook, Plugin, PluginContext};
use crate::storage::{Payload, SpecFile};

pub const NAME: &str = "files";

/// `%files` directives and the directory their relative paths live in
const FILES_DIRECTIVES: &[(&str, Option<&str>)] = &[
    ("%artifact", None),
    ("%attr", None),
    ("%caps", None),
    ("%config", None),
    ("%defattr", None),
    ("%dev", None),
    ("%dir", None),
    ("%doc", Some("%{_defaultdocdir}/%{name}")),
    ("%docdir", None),
    ("%dverify", None),
    ("%exclude", None),
    ("%ghost", None),
    ("%lang", None),
    ("%license", Some("%{_defaultlicensedir}/%{name}")),
    ("%missingok", None),
    ("%pubkey", None),
    ("%readme", None),
    ("%verify", None),
];

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum LogError {
    /// Listed in `%files` but absent from the buildroot
    Deleted,
    /// Present in the buildroot but not listed
    Unpackaged,
}

type SectionFiles = BTreeMap<String, Vec<String>>;

pub struct FilesHook;

impl Plugin for FilesHook {
    fn name(&self) -> &str {
        NAME
    }

    fn default_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Fixes %files sections after missing or unpackaged file errors"
    }
}

impl BuildLogHook for FilesHook {
    fn run(
        &self,
        _original: &SpecFile,
        working: &mut SpecFile,
        ctx: &PluginContext<'_>,
    ) -> Result<(Payload, bool)> {
        let log_path = ctx.results_dir().join("new-build").join("RPM").join("build.log");
        let log = match fs::read_to_string(&log_path) {
            Ok(log) => log,
            Err(e) => {
                tracing::debug!("Failed to read {}: {}", log_path.display(), e);
                return Ok((json!({}), false));
            }
        };

        let Some(nvr) = working.nvr() else {
            return Ok((json!({}), false));
        };
        let Some((error, files)) = parse_build_log(&log, &nvr)? else {
            return Ok((json!({}), false));
        };

        let macros = working.macros();
        let mut payload = Map::new();
        let changed = match error {
            LogError::Deleted => {
                tracing::info!("Files absent in sources but listed in the spec: {}", files.join(", "));
                let (removed, unable) = remove_deleted_files(working.content_mut(), files, &macros);
                if !unable.is_empty() {
                    tracing::info!("Could not remove: {}", unable.join(", "));
                    payload.insert("unable_to_remove".to_string(), json!(unable));
                }
                let changed = !removed.is_empty();
                if changed {
                    payload.insert("removed".to_string(), json!(removed));
                }
                changed
            }
            LogError::Unpackaged => {
                tracing::info!("Files in sources but missing in the spec: {}", files.join(", "));
                let (added, unable) = add_unpackaged_files(working.content_mut(), files, &macros);
                if !unable.is_empty() {
                    payload.insert("unable_to_add".to_string(), json!(unable));
                }
                let changed = !added.is_empty();
                if changed {
                    payload.insert("added".to_string(), json!(added));
                }
                changed
            }
        };

        if changed {
            working.save()?;
        }
        Ok((Payload::Object(payload), changed))
    }
}

/// Finds the error type and the affected paths in a build log
fn parse_build_log(log: &str, nvr: &str) -> Result<Option<(LogError, Vec<String>)>> {
    let pattern = Regex::new(&format!(
        r"^(?:BUILDSTDERR:)?\s*(?:(?P<deleted>File\s+not\s+found:\s*)|(?P<unpackaged>Installed\s+\(but\s+unpackaged\)\s+file\(s\)\s+found:))?(?:/.*/{}[^/]*)?(?P<path>/.*)?$",
        regex::escape(nvr)
    ))?;

    let mut error = None;
    let mut files = BTreeSet::new();

    for line in log.lines() {
        let Some(caps) = pattern.captures(line) else {
            continue;
        };
        let path = caps.name("path").map(|m| m.as_str().trim_end().to_string());

        if caps.name("deleted").is_some() {
            error = Some(LogError::Deleted);
            files.extend(path);
        } else if caps.name("unpackaged").is_some() {
            error = Some(LogError::Unpackaged);
        } else if error == Some(LogError::Unpackaged) && path.is_some() {
            files.extend(path);
        } else if error.is_some() && path.is_none() {
            break;
        }
    }

    Ok(error
        .filter(|_| !files.is_empty())
        .map(|error| (error, files.into_iter().collect())))
}

/// Looks up a `%files` directive token (`%doc`, `%attr(0644,root,root)`)
fn directive(token: &str) -> Option<Option<&'static str>> {
    let name = token.split('(').next().unwrap_or(token);
    FILES_DIRECTIVES
        .iter()
        .find(|(directive, _)| *directive == name)
        .map(|(_, prefix)| *prefix)
}

fn glob_matches(pattern: &str, path: &str) -> bool {
    match Glob::new(pattern) {
        Ok(glob) => glob.compile_matcher().is_match(path),
        Err(_) => pattern == path,
    }
}

/// Expanded path tokens of a `%files` line
fn expanded_paths(line: &str, macros: &MacroTable) -> Vec<String> {
    let tokens: Vec<&str> = line.split_whitespace().collect();
    let prefix = tokens.iter().find_map(|t| directive(t).flatten());

    tokens
        .iter()
        .filter(|t| directive(t).is_none())
        .map(|t| match prefix {
            Some(prefix) if !t.starts_with('/') && !t.starts_with('%') => {
                macros.expand(&format!("{}/{}", prefix, t))
            }
            _ => macros.expand(t),
        })
        .collect()
}

/// Removes deleted files from `%files` sections.
///
/// Each listed path (glob patterns included) removes at most one file. A
/// line left without paths is dropped. Returns the removed entries per
/// section and the files no entry matched.
fn remove_deleted_files(
    content: &mut SpecContent,
    files: Vec<String>,
    macros: &MacroTable,
) -> (SectionFiles, Vec<String>) {
    let mut remaining = files;
    let mut removed = SectionFiles::new();

    for section in content.sections_mut().iter_mut().filter(|s| s.is("%files")) {
        let mut kept_lines = Vec::with_capacity(section.lines.len());

        for line in std::mem::take(&mut section.lines) {
            if remaining.is_empty() || line.trim().is_empty() {
                kept_lines.push(line);
                continue;
            }

            let tokens: Vec<&str> = line.split_whitespace().collect();
            let prefix = tokens.iter().find_map(|t| directive(t).flatten());
            let mut kept_tokens = Vec::with_capacity(tokens.len());
            let mut removed_any = false;
            let mut path_left = false;

            for token in tokens {
                if directive(token).is_some() {
                    kept_tokens.push(token);
                    continue;
                }

                let expanded = match prefix {
                    Some(prefix) if !token.starts_with('/') && !token.starts_with('%') => {
                        macros.expand(&format!("{}/{}", prefix, token))
                    }
                    _ => macros.expand(token),
                };

                match remaining.iter().rposition(|f| glob_matches(&expanded, f)) {
                    Some(pos) => {
                        remaining.remove(pos);
                        removed
                            .entry(section.name.clone())
                            .or_default()
                            .push(token.to_string());
                        tracing::info!("Removed {} from {} section", token, section.name);
                        removed_any = true;
                    }
                    None => {
                        kept_tokens.push(token);
                        path_left = true;
                    }
                }
            }

            if !removed_any {
                kept_lines.push(line);
            } else if path_left {
                kept_lines.push(kept_tokens.join(" "));
            }
        }

        section.lines = kept_lines;
    }

    (removed, remaining)
}

/// Index of the `%files` section best suited for `file`.
///
/// The section listing the path sharing the most leading components wins;
/// without any shared directory the main `%files` section is used.
fn best_section(content: &SpecContent, file: &str, macros: &MacroTable) -> Option<usize> {
    let file_path = Path::new(file);
    let mut best: Option<(usize, usize)> = None;

    for (index, section) in content.sections().iter().enumerate() {
        if !section.is("%files") {
            continue;
        }
        for line in &section.lines {
            for path in expanded_paths(line, macros) {
                let shared = file_path
                    .components()
                    .zip(Path::new(&path).components())
                    .take_while(|(a, b)| a == b)
                    .count();
                // The root component alone is not a match
                if shared > 1 && best.map_or(true, |(_, score)| shared > score) {
                    best = Some((index, shared));
                }
            }
        }
    }

    best.map(|(index, _)| index).or_else(|| {
        let sections = content.sections();
        sections
            .iter()
            .position(|s| s.name == "%files")
            .or_else(|| sections.iter().position(|s| s.is("%files")))
    })
}

/// Returns true if a `%files` entry already covers `file`
fn is_listed(content: &SpecContent, file: &str, macros: &MacroTable) -> bool {
    content
        .sections()
        .iter()
        .filter(|s| s.is("%files"))
        .flat_map(|s| s.lines.iter())
        .flat_map(|line| expanded_paths(line, macros))
        .any(|path| glob_matches(&path, file))
}

/// Adds unpackaged files to the best matching `%files` sections
fn add_unpackaged_files(
    content: &mut SpecContent,
    files: Vec<String>,
    macros: &MacroTable,
) -> (SectionFiles, Vec<String>) {
    let mut added = SectionFiles::new();
    let mut unable = Vec::new();

    for file in files {
        if is_listed(content, &file, macros) {
            continue;
        }

        let Some(index) = best_section(content, &file, macros) else {
            unable.push(file);
            continue;
        };

        let entry = macros.substitute_path(&file);
        let section = &mut content.sections_mut()[index];
        section.lines.insert(0, entry.clone());
        tracing::info!("Added {} to {} section", entry, section.name);
        added.entry(section.name.clone()).or_default().push(entry);
    }

    (added, unable)
}
