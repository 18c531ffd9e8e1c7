//! Minimal RPM macro expansion
//!
//! Covers what locators and `%files` entries need: `%global`/`%define`
//! definitions, the common preamble tags exposed as lowercase macros, and
//! the standard path macros. Shell expansions (`%(...)`), parametric
//! macros and Lua are left untouched.

use std::collections::HashMap;

use super::spec::{parse_tag_line, SpecContent};

/// Maximum nesting depth when expanding macro bodies
const MAX_DEPTH: usize = 16;

/// Preamble tags that RPM exposes as macros of the same (lowercase) name
const TAG_MACROS: &[&str] = &["name", "version", "release", "epoch", "summary", "license", "url"];

/// Default path macros (Fedora, x86_64)
const PATH_MACROS: &[(&str, &str)] = &[
    ("_prefix", "/usr"),
    ("_exec_prefix", "/usr"),
    ("_bindir", "/usr/bin"),
    ("_sbindir", "/usr/sbin"),
    ("_libdir", "/usr/lib64"),
    ("_libexecdir", "/usr/libexec"),
    ("_datadir", "/usr/share"),
    ("_datarootdir", "/usr/share"),
    ("_docdir", "/usr/share/doc"),
    ("_defaultdocdir", "/usr/share/doc"),
    ("_licensedir", "/usr/share/licenses"),
    ("_defaultlicensedir", "/usr/share/licenses"),
    ("_mandir", "/usr/share/man"),
    ("_infodir", "/usr/share/info"),
    ("_includedir", "/usr/include"),
    ("_sysconfdir", "/etc"),
    ("_localstatedir", "/var"),
    ("_sharedstatedir", "/var/lib"),
    ("_unitdir", "/usr/lib/systemd/system"),
    ("_initddir", "/etc/rc.d/init.d"),
];

/// Path macros used when turning absolute paths back into macro form
const SUBSTITUTION_WHITELIST: &[&str] = &[
    "_bindir",
    "_sbindir",
    "_libdir",
    "_libexecdir",
    "_datadir",
    "_docdir",
    "_licensedir",
    "_mandir",
    "_infodir",
    "_includedir",
    "_sysconfdir",
    "_localstatedir",
    "_sharedstatedir",
    "_unitdir",
    "_initddir",
];

/// Macro definitions collected from a spec file
#[derive(Debug, Clone, Default)]
pub struct MacroTable {
    defs: HashMap<String, String>,
}

impl MacroTable {
    /// Creates a table holding only the default path macros
    pub fn new() -> Self {
        let defs = PATH_MACROS
            .iter()
            .map(|(name, value)| (name.to_string(), value.to_string()))
            .collect();
        Self { defs }
    }

    /// Collects macros from spec content
    pub fn from_content(content: &SpecContent) -> Self {
        let mut table = Self::new();

        for line in &content.preamble().lines {
            if let Some(tag) = parse_tag_line(line) {
                let name = tag.name.to_ascii_lowercase();
                if TAG_MACROS.contains(&name.as_str()) && !table.defs.contains_key(&name) {
                    table.define(name, tag.value);
                }
            }
        }

        for line in content.lines() {
            let trimmed = line.trim_start();
            let rest = trimmed
                .strip_prefix("%global")
                .or_else(|| trimmed.strip_prefix("%define"));
            let Some(rest) = rest.filter(|r| r.starts_with(char::is_whitespace)) else {
                continue;
            };

            let rest = rest.trim_start();
            let name_end = rest.find(char::is_whitespace).unwrap_or(rest.len());
            let name = &rest[..name_end];

            // Parametric macros (`%define foo() ...`) are not supported
            if name.is_empty() || name.contains('(') {
                continue;
            }

            table.define(name, rest[name_end..].trim());
        }

        table
    }

    /// Defines or overrides a macro
    pub fn define(&mut self, name: impl Into<String>, value: impl Into<String>) {
        self.defs.insert(name.into(), value.into());
    }

    /// Returns the raw (unexpanded) body of a macro
    pub fn get(&self, name: &str) -> Option<&str> {
        self.defs.get(name).map(String::as_str)
    }

    /// Expands all known macros in `text`
    pub fn expand(&self, text: &str) -> String {
        self.expand_depth(text, 0)
    }

    fn expand_depth(&self, text: &str, depth: usize) -> String {
        if depth > MAX_DEPTH || !text.contains('%') {
            return text.to_string();
        }

        let mut out = String::with_capacity(text.len());
        let mut rest = text;

        while let Some(pos) = rest.find('%') {
            out.push_str(&rest[..pos]);
            let after = &rest[pos + 1..];

            if let Some(tail) = after.strip_prefix('%') {
                out.push('%');
                rest = tail;
            } else if after.starts_with('{') {
                match matching_brace(after) {
                    Some(end) => {
                        let inner = &after[1..end];
                        match self.expand_braced(inner, depth) {
                            Some(value) => out.push_str(&value),
                            None => out.push_str(&rest[pos..pos + 1 + end + 1]),
                        }
                        rest = &after[end + 1..];
                    }
                    None => {
                        out.push_str(&rest[pos..]);
                        rest = "";
                    }
                }
            } else {
                let ident_len = after
                    .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
                    .unwrap_or(after.len());
                let ident = &after[..ident_len];
                match self.defs.get(ident).filter(|_| !ident.is_empty()) {
                    Some(value) => out.push_str(&self.expand_depth(value, depth + 1)),
                    None => {
                        out.push('%');
                        out.push_str(ident);
                    }
                }
                rest = &after[ident_len..];
            }
        }

        out.push_str(rest);
        out
    }

    /// Expands the body of `%{...}`; `None` keeps the original text
    fn expand_braced(&self, inner: &str, depth: usize) -> Option<String> {
        if let Some(cond) = inner.strip_prefix("!?") {
            let (name, alt) = split_conditional(cond);
            return Some(match self.defs.get(name) {
                Some(_) => String::new(),
                None => alt.map(|a| self.expand_depth(a, depth + 1)).unwrap_or_default(),
            });
        }

        if let Some(cond) = inner.strip_prefix('?') {
            let (name, alt) = split_conditional(cond);
            return Some(match (self.defs.get(name), alt) {
                (Some(_), Some(alt)) => self.expand_depth(alt, depth + 1),
                (Some(value), None) => self.expand_depth(value, depth + 1),
                (None, _) => String::new(),
            });
        }

        self.defs
            .get(inner)
            .map(|value| self.expand_depth(value, depth + 1))
    }

    /// Replaces the longest matching path-macro prefix of `path` with its macro
    pub fn substitute_path(&self, path: &str) -> String {
        let mut candidates: Vec<(&str, String)> = SUBSTITUTION_WHITELIST
            .iter()
            .filter_map(|name| self.defs.get(*name).map(|v| (*name, self.expand(v))))
            .collect();
        candidates.sort_by(|a, b| b.1.len().cmp(&a.1.len()));

        for (name, value) in candidates {
            if value.is_empty() {
                continue;
            }
            if let Some(tail) = path.strip_prefix(value.as_str()) {
                if tail.is_empty() || tail.starts_with('/') {
                    return format!("%{{{}}}{}", name, tail);
                }
            }
        }

        path.to_string()
    }
}

/// Splits `name:alternative` in conditional macros
fn split_conditional(cond: &str) -> (&str, Option<&str>) {
    match cond.split_once(':') {
        Some((name, alt)) => (name, Some(alt)),
        None => (cond, None),
    }
}

/// Finds the index of the `}` closing the `{` at position 0
fn matching_brace(text: &str) -> Option<usize> {
    let mut depth = 0usize;
    for (i, c) in text.char_indices() {
        match c {
            '{' => depth += 1,
            '}' => {
                depth -= 1;
                if depth == 0 {
                    return Some(i);
                }
            }
            _ => {}
        }
    }
    None
}
