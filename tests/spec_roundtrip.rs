//! Property-based tests for the spec model.
//!
//! - Round trip: rendering an unmodified parse reproduces the input bytes
//! - Directive parsing: every supported `%patch` form yields the same
//!   number and the same trailing flag pair
//! - Tag updates only touch the tag's own line

use proptest::prelude::*;
use specrebase::domain::{parse_directive, SpecContent};

/// A single spec line: tags, section headers, directives, shell, blanks
fn arb_line() -> impl Strategy<Value = String> {
    prop_oneof![
        prop::string::string_regex(r"(Name|Version|Release|Source[0-9]?|Patch[0-9]?):[ \t]+[a-z0-9.%{}_/-]{1,20}")
            .unwrap(),
        prop::sample::select(vec![
            "%description".to_string(),
            "%package devel".to_string(),
            "%prep".to_string(),
            "%build".to_string(),
            "%install".to_string(),
            "%files".to_string(),
            "%files -n foo-libs".to_string(),
            "%changelog".to_string(),
            "%patchlist".to_string(),
        ]),
        prop::string::string_regex(r"%patch[0-9]{1,2} -p1").unwrap(),
        prop::string::string_regex(r"[ \t]*[a-z %{}/._-]{0,30}[ \t]*").unwrap(),
        Just(String::new()),
    ]
}

/// Joins lines with LF or CRLF, with or without a trailing newline
fn arb_spec() -> impl Strategy<Value = String> {
    (
        prop::collection::vec(arb_line(), 0..30),
        any::<bool>(),
        any::<bool>(),
    )
        .prop_map(|(lines, crlf, trailing)| {
            let eol = if crlf { "\r\n" } else { "\n" };
            let mut text = lines.join(eol);
            if trailing && !lines.is_empty() {
                text.push_str(eol);
            }
            text
        })
}

fn arb_flags() -> impl Strategy<Value = Vec<String>> {
    prop::collection::vec(
        prop::string::string_regex(r"-[a-oq-z][a-z0-9.]{0,4}|-p[0-9]").unwrap(),
        0..4,
    )
}

proptest! {
    #[test]
    fn render_reproduces_input(text in arb_spec()) {
        let content = SpecContent::parse(&text);
        prop_assert_eq!(content.render(), text);
    }

    #[test]
    fn directive_forms_agree(number in 0u32..500, flags in arb_flags()) {
        let joined = flags.join(" ");
        let suffix = if joined.is_empty() { String::new() } else { format!(" {}", joined) };
        let expected = flags[flags.len().saturating_sub(2)..].join(" ");

        let forms = [
            format!("%patch{}{}", number, suffix),
            format!("%patch {}{}", number, suffix),
            format!("%patch -P {}{}", number, suffix),
            format!("  %patch -P{}{}", number, suffix),
        ];

        for form in &forms {
            prop_assert_eq!(parse_directive(form), Some((number, expected.clone())), "form: {}", form);
        }
    }

    #[test]
    fn set_tag_changes_one_line(version in r"[0-9]{1,3}(\.[0-9]{1,3}){0,2}") {
        let text = "Name: foo\nVersion:\t1.0\nRelease: 1\n%prep\n%setup -q\n";
        let mut content = SpecContent::parse(text);

        content.set_tag("version", &version).unwrap();

        prop_assert_eq!(content.tag("Version"), Some(version.as_str()));
        let expected = format!("Name: foo\nVersion:\t{}\nRelease: 1\n%prep\n%setup -q\n", version);
        prop_assert_eq!(content.render(), expected);
    }
}
