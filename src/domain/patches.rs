//! `%patch` directives and resolved patch records
//!
//! Accepted directive forms:
//! - `%patch0 -p1` (legacy, number glued to the keyword)
//! - `%patch 0 -p1`
//! - `%patch -P 0 -p1` / `%patch -P0 -p1`
//!
//! A bare `%patch` refers to patch 0. Of the remaining tokens, a single one
//! is a bare flag; otherwise the last two form the `flag value` pair, so
//! decorations in front of the flag are tolerated.

use std::collections::BTreeMap;
use std::fs::File;
use std::io::{self, BufRead, BufReader};
use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

const DIRECTIVE_PREFIX: &str = "%patch";

/// A parsed `%patch` application directive
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchDirective {
    pub patch_number: u32,

    /// Application option as `flag value` (`-b .orig`), or a bare flag (`-p1`)
    pub flags: String,

    /// Position among all directives in textual order
    pub apply_order: usize,
}

impl PatchDirective {
    /// Collects directives from lines in textual order.
    ///
    /// The first directive for a number wins; duplicates are logged.
    pub fn collect<'a>(lines: impl IntoIterator<Item = &'a str>) -> BTreeMap<u32, PatchDirective> {
        let mut directives = BTreeMap::new();
        let mut apply_order = 0;

        for line in lines {
            let Some((patch_number, flags)) = parse_directive(line) else {
                continue;
            };

            if directives.contains_key(&patch_number) {
                tracing::warn!("Patch {} is applied more than once, keeping the first directive", patch_number);
            } else {
                directives.insert(
                    patch_number,
                    PatchDirective {
                        patch_number,
                        flags,
                        apply_order,
                    },
                );
            }
            apply_order += 1;
        }

        directives
    }
}

/// Parses a directive line into `(patch number, flags)`
pub fn parse_directive(line: &str) -> Option<(u32, String)> {
    let rest = line.trim_start().strip_prefix(DIRECTIVE_PREFIX)?;

    let (mut number, tail) = if rest.starts_with(|c: char| c.is_ascii_digit()) {
        let digits_end = rest.find(|c: char| !c.is_ascii_digit()).unwrap_or(rest.len());
        (Some(rest[..digits_end].parse::<u32>().ok()?), &rest[digits_end..])
    } else {
        (None, rest)
    };

    // `%patchlist`, `%patches`, `%patch0x` are not directives
    if !(tail.is_empty() || tail.starts_with(char::is_whitespace)) {
        return None;
    }

    let tokens: Vec<&str> = tail.split_whitespace().collect();
    let mut flags = Vec::with_capacity(tokens.len());
    let mut i = 0;

    while i < tokens.len() {
        let token = tokens[i];

        if number.is_none() {
            if i == 0 && token.bytes().all(|b| b.is_ascii_digit()) {
                number = token.parse().ok();
                i += 1;
                continue;
            }
            if token == "-P" {
                if let Some(n) = tokens.get(i + 1).and_then(|t| t.parse().ok()) {
                    number = Some(n);
                    i += 2;
                    continue;
                }
            }
            if let Some(n) = token.strip_prefix("-P").and_then(|t| t.parse().ok()) {
                number = Some(n);
                i += 1;
                continue;
            }
        }

        flags.push(token);
        i += 1;
    }

    let flags = match flags.len() {
        0 | 1 => flags.concat(),
        n => flags[n - 2..].join(" "),
    };

    Some((number.unwrap_or(0), flags))
}

/// A patch resolved to a file on disk
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PatchRecord {
    pub path: PathBuf,
    pub flags: String,
    pub apply_order: usize,
    pub git_generated: bool,
}

impl PatchRecord {
    /// File name of the patch
    pub fn file_name(&self) -> String {
        self.path
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_default()
    }
}

/// Returns true if the first `diff ` header in the patch is a `diff --git` header.
///
/// Patches without any diff header are treated as not git-generated.
pub fn is_git_generated(path: &Path) -> io::Result<bool> {
    let mut reader = BufReader::new(File::open(path)?);
    let mut line = Vec::new();

    loop {
        line.clear();
        if reader.read_until(b'\n', &mut line)? == 0 {
            return Ok(false);
        }
        if line.starts_with(b"diff ") {
            return Ok(line.starts_with(b"diff --git"));
        }
    }
}
