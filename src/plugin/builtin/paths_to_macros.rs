//! Replaces absolute paths in `%files` sections with RPM path macros

use anyhow::Result;
use regex::{Captures, Regex};

use crate::plugin::capability::{Plugin, PluginContext, SpecHook};
use crate::storage::SpecFile;

pub const NAME: &str = "paths-to-rpm-macros";

/// An absolute path token
const PATH_TOKEN: &str = r"(^|\s)(/\S*)";

pub struct PathsToMacros;

impl Plugin for PathsToMacros {
    fn name(&self) -> &str {
        NAME
    }

    fn default_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Replaces paths in %files sections with RPM macros"
    }
}

impl SpecHook for PathsToMacros {
    fn run(&self, _original: &SpecFile, working: &mut SpecFile, _ctx: &PluginContext<'_>) -> Result<()> {
        let pattern = Regex::new(PATH_TOKEN)?;
        let macros = working.macros();
        let mut changed = false;

        for section in working.content_mut().sections_mut() {
            if !section.is("%files") {
                continue;
            }

            for line in section.lines.iter_mut() {
                let updated = pattern.replace_all(line, |caps: &Captures<'_>| {
                    let lead = caps.get(1).map_or("", |m| m.as_str());
                    let path = caps.get(2).map_or("", |m| m.as_str());
                    format!("{}{}", lead, macros.substitute_path(path))
                });

                if updated != line.as_str() {
                    *line = updated.into_owned();
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
