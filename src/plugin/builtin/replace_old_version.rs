//! Replaces occurrences of the old version left in the working spec
//!
//! An occurrence must be delimited: `/`, `-` or whitespace before it, and
//! `/`, `.`, `-`, whitespace or the end of the line after it. `%changelog`,
//! `Version:` and lines declaring a local source or patch are never touched.
//! With the `replace_old_version_with_macro` option the replacement is
//! `%{version}`.

use anyhow::Result;
use regex::{Captures, Regex};

use crate::domain::{is_remote_locator, parse_tag_line, SourceEntry};
use crate::plugin::capability::{Plugin, PluginContext, SpecHook};
use crate::storage::SpecFile;

pub const NAME: &str = "replace-old-version";

/// Hook option selecting `%{version}` as the replacement
pub const WITH_MACRO_OPTION: &str = "replace_old_version_with_macro";

const VERSION_MACRO: &str = "%{version}";

pub struct ReplaceOldVersion;

impl ReplaceOldVersion {
    fn is_skipped(line: &str) -> bool {
        if is_version_tag(line) || line.trim_start().starts_with('#') {
            return true;
        }

        // Local sources keep their file names
        SourceEntry::parse_declaration(line).is_some_and(|entry| !is_remote_locator(&entry.locator))
    }

    fn replace_line(pattern: &Regex, line: &str, replacement: &str, new_version: &str) -> String {
        pattern
            .replace_all(line, |caps: &Captures<'_>| {
                let (Some(whole), Some(before), Some(after)) = (caps.get(0), caps.get(1), caps.get(2)) else {
                    return String::new();
                };

                // Already updated (old version is a prefix of the new one)
                if line[before.end()..].starts_with(new_version) {
                    return whole.as_str().to_string();
                }

                format!("{}{}{}", before.as_str(), replacement, after.as_str())
            })
            .into_owned()
    }
}

impl Plugin for ReplaceOldVersion {
    fn name(&self) -> &str {
        NAME
    }

    fn default_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Replaces occurrences of the old version string"
    }
}

impl SpecHook for ReplaceOldVersion {
    fn run(&self, original: &SpecFile, working: &mut SpecFile, ctx: &PluginContext<'_>) -> Result<()> {
        let (Some(old_version), Some(new_version)) = (original.version(), working.version()) else {
            return Ok(());
        };
        if old_version.is_empty() || old_version == new_version {
            return Ok(());
        }

        let replacement = if ctx.options().get_bool(WITH_MACRO_OPTION) {
            VERSION_MACRO
        } else {
            new_version.as_str()
        };

        let pattern = Regex::new(&format!(
            r"([/\-\s]){}([/.\-\s]|$)",
            regex::escape(&old_version)
        ))?;

        let mut changed = false;
        for section in working.content_mut().sections_mut() {
            if section.is("%changelog") {
                continue;
            }

            for line in section.lines.iter_mut() {
                if Self::is_skipped(line) {
                    continue;
                }

                let updated = Self::replace_line(&pattern, line, replacement, &new_version);
                if updated != *line {
                    *line = updated;
                    changed = true;
                }
            }
        }

        if changed {
            working.save()?;
        }
        Ok(())
    }
}

fn is_version_tag(line: &str) -> bool {
    parse_tag_line(line).is_some_and(|tag| tag.name.eq_ignore_ascii_case("version"))
}
