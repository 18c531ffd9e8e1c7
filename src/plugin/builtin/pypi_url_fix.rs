//! Rewrites obsolete PyPI URLs in the preamble
//!
//! - `URL:` lines: `pypi.python.org/pypi/` → `pypi.org/project/`
//! - `Source` lines: `pypi(.python).org/` → `files.pythonhosted.org/`

use anyhow::Result;
use regex::Regex;

use crate::domain::PackageCategory;
use crate::plugin::capability::{Plugin, PluginContext, SpecHook};
use crate::storage::SpecFile;

pub const NAME: &str = "pypi-url-fix";

const PROJECT_URL: (&str, &str) = (r"https?://pypi\.python\.org/pypi/", "https://pypi.org/project/");
const SOURCE_URL: (&str, &str) = (r"https?://pypi(\.python)?\.org/", "https://files.pythonhosted.org/");

pub struct PypiUrlFix {
    project_url: Regex,
    source_url: Regex,
}

impl PypiUrlFix {
    pub fn new() -> Result<Self> {
        Ok(Self {
            project_url: Regex::new(PROJECT_URL.0)?,
            source_url: Regex::new(SOURCE_URL.0)?,
        })
    }

    fn transform(&self, line: &str) -> Option<String> {
        let (pattern, replacement) = if line.starts_with("URL") {
            (&self.project_url, PROJECT_URL.1)
        } else if line.starts_with("Source") {
            (&self.source_url, SOURCE_URL.1)
        } else {
            return None;
        };

        let updated = pattern.replace_all(line, replacement);
        (updated != line).then(|| updated.into_owned())
    }
}

impl Plugin for PypiUrlFix {
    fn name(&self) -> &str {
        NAME
    }

    fn categories(&self) -> &[PackageCategory] {
        &[PackageCategory::Python]
    }

    fn default_enabled(&self) -> bool {
        true
    }

    fn description(&self) -> &str {
        "Rewrites obsolete PyPI URLs"
    }
}

impl SpecHook for PypiUrlFix {
    fn run(&self, _original: &SpecFile, working: &mut SpecFile, _ctx: &PluginContext<'_>) -> Result<()> {
        let mut changed = false;

        for section in working.content_mut().sections_mut().iter_mut().filter(|s| s.is_package()) {
            for line in section.lines.iter_mut() {
                if let Some(updated) = self.transform(line) {
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
