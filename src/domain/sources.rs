//! Source and patch declarations
//!
//! `SourceN:` and `PatchN:` tags declare the artifacts a package is built
//! from. Each declaration carries a numeric role tag: 1 for sources, 2 for
//! patches, 0 for artifacts generated at runtime.

use serde::{Deserialize, Serialize};

use super::spec::parse_tag_line;

/// URL schemes that mark a locator as remote
const REMOTE_SCHEMES: &[&str] = &["http://", "https://", "ftp://"];

/// Role of a declared artifact
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SourceRole {
    /// Produced during the rebase, never declared in the file
    Generated,
    Source,
    Patch,
}

impl SourceRole {
    /// Maps a numeric role tag to a role
    pub fn from_tag(tag: u8) -> Option<Self> {
        match tag {
            0 => Some(SourceRole::Generated),
            1 => Some(SourceRole::Source),
            2 => Some(SourceRole::Patch),
            _ => None,
        }
    }

    /// The numeric role tag
    pub fn tag(self) -> u8 {
        match self {
            SourceRole::Generated => 0,
            SourceRole::Source => 1,
            SourceRole::Patch => 2,
        }
    }
}

/// A declared source, patch or generated artifact
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SourceEntry {
    /// Path or URL
    pub locator: String,

    /// Declaration number (`Patch3` → 3)
    pub index: u32,

    pub role: SourceRole,
}

impl SourceEntry {
    pub fn new(locator: impl Into<String>, index: u32, role: SourceRole) -> Self {
        Self {
            locator: locator.into(),
            index,
            role,
        }
    }

    /// Parses a `SourceN:` / `PatchN:` declaration line.
    ///
    /// The locator is returned verbatim (unexpanded). Unnumbered
    /// declarations get index 0.
    pub fn parse_declaration(line: &str) -> Option<Self> {
        let tag = parse_tag_line(line)?;
        let lower = tag.name.to_ascii_lowercase();

        let (role, number) = if let Some(n) = lower.strip_prefix("source") {
            (SourceRole::Source, n)
        } else if let Some(n) = lower.strip_prefix("patch") {
            (SourceRole::Patch, n)
        } else {
            return None;
        };

        let index = if number.is_empty() {
            0
        } else if number.bytes().all(|b| b.is_ascii_digit()) {
            number.parse().ok()?
        } else {
            return None;
        };

        if tag.value.is_empty() {
            return None;
        }

        Some(Self::new(tag.value, index, role))
    }

    /// Returns true if the locator is an http/https/ftp URL
    pub fn is_remote(&self) -> bool {
        is_remote_locator(&self.locator)
    }

    /// Local file name the artifact is stored under
    pub fn file_name(&self) -> &str {
        file_name_of(&self.locator)
    }
}

/// Returns true if the locator is an http/https/ftp URL
pub fn is_remote_locator(locator: &str) -> bool {
    REMOTE_SCHEMES
        .iter()
        .any(|scheme| {
            locator
                .get(..scheme.len())
                .is_some_and(|prefix| prefix.eq_ignore_ascii_case(scheme))
        })
}

/// Local file name of a locator: the last path component, or the
/// `#/name` fragment of a URL when present
pub fn file_name_of(locator: &str) -> &str {
    if let Some((_, fragment)) = locator.rsplit_once("#/") {
        if !fragment.is_empty() {
            return fragment.rsplit('/').next().unwrap_or(fragment);
        }
    }

    locator
        .trim_end_matches('/')
        .rsplit('/')
        .next()
        .unwrap_or(locator)
}
