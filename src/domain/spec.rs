//! Section-based spec file content
//!
//! A spec file is split into sections at header lines (`%prep`, `%build`,
//! `%files devel`, ...). Everything before the first header belongs to the
//! preamble, which is named [`PREAMBLE`] and has no header line of its own.
//! Lines are kept verbatim so that rendering an unmodified spec reproduces
//! the input byte for byte.

use thiserror::Error;

/// Name of the implicit first section holding the main package preamble
pub const PREAMBLE: &str = "%package";

/// Section keywords that start a new section when they begin a line
const SECTION_KEYWORDS: &[&str] = &[
    "package",
    "description",
    "prep",
    "conf",
    "build",
    "install",
    "check",
    "clean",
    "files",
    "changelog",
    "pre",
    "post",
    "preun",
    "postun",
    "pretrans",
    "posttrans",
    "preuntrans",
    "postuntrans",
    "verifyscript",
    "generate_buildrequires",
    "sourcelist",
    "patchlist",
];

/// Keyword families matched by prefix (`%triggerin`, `%filetriggerun`, ...)
const SECTION_KEYWORD_PREFIXES: &[&str] = &["trigger", "filetrigger", "transfiletrigger"];

#[derive(Debug, Error, PartialEq)]
pub enum SpecError {
    #[error("Tag not found in preamble: {0}")]
    MissingTag(String),

    #[error("Section not found: {0}")]
    MissingSection(String),
}

/// A single section of a spec file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Section {
    /// Section name: the trimmed header line, or [`PREAMBLE`]
    pub name: String,

    /// The verbatim header line (`None` for the preamble)
    pub header: Option<String>,

    /// Raw content lines, without line terminators
    pub lines: Vec<String>,
}

impl Section {
    /// Returns true if this section's keyword matches (e.g. `%files` for `%files devel`)
    pub fn is(&self, keyword: &str) -> bool {
        self.name == keyword
            || self
                .name
                .strip_prefix(keyword)
                .is_some_and(|rest| rest.starts_with(char::is_whitespace))
    }

    /// Returns true if this section can carry preamble tags
    pub fn is_package(&self) -> bool {
        self.header.is_none() || self.is("%package")
    }
}

/// A `Tag: value` line split into its parts
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct TagLine<'a> {
    /// Tag name as spelled in the file
    pub name: &'a str,

    /// Trimmed value
    pub value: &'a str,

    /// Byte offset where the value starts
    pub value_start: usize,
}

/// Splits a preamble line into tag name and value.
///
/// Tag names start with a letter and may contain letters, digits, `_`,
/// `-` and parentheses (`Requires(post)`). Comments and macro lines never
/// parse as tags.
pub fn parse_tag_line(line: &str) -> Option<TagLine<'_>> {
    let colon = line.find(':')?;
    let name = &line[..colon];

    let mut chars = name.chars();
    if !chars.next()?.is_ascii_alphabetic() {
        return None;
    }
    if !chars.all(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '-' | '(' | ')')) {
        return None;
    }

    let after = &line[colon + 1..];
    let leading = after.len() - after.trim_start().len();

    Some(TagLine {
        name,
        value: after.trim(),
        value_start: colon + 1 + leading,
    })
}

/// Returns true if the line opens a new section
fn is_section_header(line: &str) -> bool {
    let Some(rest) = line.strip_prefix('%') else {
        return false;
    };

    let keyword_end = rest
        .find(|c: char| !(c.is_ascii_alphanumeric() || c == '_'))
        .unwrap_or(rest.len());
    let keyword = &rest[..keyword_end];
    let tail = &rest[keyword_end..];

    if !(tail.is_empty() || tail.starts_with(char::is_whitespace)) {
        return false;
    }

    SECTION_KEYWORDS.contains(&keyword)
        || SECTION_KEYWORD_PREFIXES
            .iter()
            .any(|prefix| keyword.starts_with(prefix))
}

/// Parsed spec file content
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SpecContent {
    sections: Vec<Section>,
    trailing_newline: bool,
}

impl SpecContent {
    /// Parses spec text into sections
    pub fn parse(text: &str) -> Self {
        let trailing_newline = text.ends_with('\n');
        let body = if trailing_newline {
            &text[..text.len() - 1]
        } else {
            text
        };

        let mut sections = vec![Section {
            name: PREAMBLE.to_string(),
            header: None,
            lines: Vec::new(),
        }];

        if !text.is_empty() {
            for line in body.split('\n') {
                if is_section_header(line) {
                    sections.push(Section {
                        name: line.trim().to_string(),
                        header: Some(line.to_string()),
                        lines: Vec::new(),
                    });
                } else if let Some(current) = sections.last_mut() {
                    current.lines.push(line.to_string());
                }
            }
        }

        Self {
            sections,
            trailing_newline,
        }
    }

    /// Renders the content back to text
    pub fn render(&self) -> String {
        let mut lines: Vec<&str> = Vec::new();

        for section in &self.sections {
            if let Some(header) = &section.header {
                lines.push(header);
            }
            lines.extend(section.lines.iter().map(String::as_str));
        }

        let mut out = lines.join("\n");
        if self.trailing_newline {
            out.push('\n');
        }
        out
    }

    /// All sections in file order
    pub fn sections(&self) -> &[Section] {
        &self.sections
    }

    /// All sections in file order, mutable
    pub fn sections_mut(&mut self) -> &mut [Section] {
        &mut self.sections
    }

    /// The main package preamble
    pub fn preamble(&self) -> &Section {
        &self.sections[0]
    }

    /// Finds the first section with the given name
    pub fn section(&self, name: &str) -> Option<&Section> {
        self.sections.iter().find(|s| s.name == name)
    }

    /// Finds the first section with the given name, mutable
    pub fn section_mut(&mut self, name: &str) -> Option<&mut Section> {
        self.sections.iter_mut().find(|s| s.name == name)
    }

    /// Sections whose keyword matches (e.g. every `%files ...` section)
    pub fn sections_of<'a>(&'a self, keyword: &'a str) -> impl Iterator<Item = &'a Section> + 'a {
        self.sections.iter().filter(move |s| s.is(keyword))
    }

    /// Iterates over every content line (headers excluded)
    pub fn lines(&self) -> impl Iterator<Item = &str> {
        self.sections
            .iter()
            .flat_map(|s| s.lines.iter().map(String::as_str))
    }

    /// Returns the value of the first matching tag in the main preamble
    pub fn tag(&self, name: &str) -> Option<&str> {
        self.preamble()
            .lines
            .iter()
            .filter_map(|line| parse_tag_line(line))
            .find(|tag| tag.name.eq_ignore_ascii_case(name))
            .map(|tag| tag.value)
    }

    /// Returns the values of a tag across the preamble and all `%package` sections
    pub fn tag_values(&self, name: &str) -> Vec<&str> {
        self.sections
            .iter()
            .filter(|s| s.is_package())
            .flat_map(|s| s.lines.iter())
            .filter_map(|line| parse_tag_line(line))
            .filter(|tag| tag.name.eq_ignore_ascii_case(name))
            .map(|tag| tag.value)
            .collect()
    }

    /// Replaces the value of the first matching preamble tag.
    ///
    /// The tag spelling and the whitespace before the value are kept.
    pub fn set_tag(&mut self, name: &str, value: &str) -> Result<(), SpecError> {
        for line in self.sections[0].lines.iter_mut() {
            let Some(tag) = parse_tag_line(line) else {
                continue;
            };
            if tag.name.eq_ignore_ascii_case(name) {
                let updated = format!("{}{}", &line[..tag.value_start], value);
                *line = updated;
                return Ok(());
            }
        }

        Err(SpecError::MissingTag(name.to_string()))
    }

    /// Inserts a line at the top of a named section
    pub fn prepend_line(&mut self, section: &str, line: impl Into<String>) -> Result<(), SpecError> {
        let target = self
            .section_mut(section)
            .ok_or_else(|| SpecError::MissingSection(section.to_string()))?;
        target.lines.insert(0, line.into());
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const SAMPLE: &str = "\
Name:           hello
Version:        1.0
Release:        1%{?dist}
Source0:        https://example.com/hello-%{version}.tar.gz
Patch0:         fix.patch

%description
Says hello.

%package devel
Summary:  Headers

%prep
%setup -q
%patch0 -p1

%files
/usr/bin/hello

%files devel
/usr/include/hello.h

%changelog
* Mon Jan 01 2024 Someone <someone@example.com> - 1.0-1
- Initial
";

    #[test]
    fn parse_splits_sections() {
        let content = SpecContent::parse(SAMPLE);
        let names: Vec<_> = content.sections().iter().map(|s| s.name.as_str()).collect();

        assert_eq!(
            names,
            vec![
                "%package",
                "%description",
                "%package devel",
                "%prep",
                "%files",
                "%files devel",
                "%changelog"
            ]
        );
    }

    #[test]
    fn render_is_byte_identical() {
        let content = SpecContent::parse(SAMPLE);
        assert_eq!(content.render(), SAMPLE);
    }

    #[test]
    fn render_preserves_missing_trailing_newline_and_crlf() {
        let text = "Name: x\r\n%prep\r\n%setup -q";
        assert_eq!(SpecContent::parse(text).render(), text);
    }

    #[test]
    fn empty_input_round_trips() {
        assert_eq!(SpecContent::parse("").render(), "");
        assert_eq!(SpecContent::parse("\n").render(), "\n");
    }

    #[test]
    fn patch_directive_is_not_a_header() {
        let content = SpecContent::parse("%prep\n%patch0 -p1\n%patchlist\nfix.patch\n");
        let names: Vec<_> = content.sections().iter().map(|s| s.name.as_str()).collect();
        assert_eq!(names, vec!["%package", "%prep", "%patchlist"]);
        assert_eq!(content.section("%prep").unwrap().lines, vec!["%patch0 -p1"]);
    }

    #[test]
    fn trigger_families_are_headers() {
        let content = SpecContent::parse("%triggerin -- glibc\n:\n%filetriggerin -- /usr/lib\n:\n");
        assert_eq!(content.sections().len(), 3);
    }

    #[test]
    fn tag_lookup_is_case_insensitive() {
        let content = SpecContent::parse(SAMPLE);
        assert_eq!(content.tag("version"), Some("1.0"));
        assert_eq!(content.tag("NAME"), Some("hello"));
        assert_eq!(content.tag("Epoch"), None);
    }

    #[test]
    fn tag_values_include_subpackages() {
        let content = SpecContent::parse(SAMPLE);
        assert_eq!(content.tag_values("Summary"), vec!["Headers"]);
    }

    #[test]
    fn set_tag_keeps_alignment() {
        let mut content = SpecContent::parse(SAMPLE);
        content.set_tag("Version", "2.0").unwrap();

        assert_eq!(content.tag("Version"), Some("2.0"));
        assert!(content.render().contains("Version:        2.0\n"));
    }

    #[test]
    fn set_missing_tag_fails() {
        let mut content = SpecContent::parse(SAMPLE);
        assert_eq!(
            content.set_tag("Epoch", "1"),
            Err(SpecError::MissingTag("Epoch".to_string()))
        );
    }

    #[test]
    fn parse_tag_line_rejects_comments_and_macros() {
        assert!(parse_tag_line("# Patch0: old.patch").is_none());
        assert!(parse_tag_line("%global url https://x").is_none());
        let tag = parse_tag_line("Requires(post): systemd").unwrap();
        assert_eq!(tag.name, "Requires(post)");
        assert_eq!(tag.value, "systemd");
    }

    #[test]
    fn sections_of_matches_keyword_family() {
        let content = SpecContent::parse(SAMPLE);
        assert_eq!(content.sections_of("%files").count(), 2);
        assert!(!content.section("%files").unwrap().is("%file"));
    }
}
