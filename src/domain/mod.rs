//! Domain models for specrebase
//!
//! The spec file model without any I/O concerns: sections and lines,
//! macro expansion, source/patch declarations and `%patch` directives.

mod category;
mod macros;
mod patches;
mod sources;
mod spec;

pub use category::{CheckerCategory, PackageCategory};
pub use macros::MacroTable;
pub use patches::{is_git_generated, parse_directive, PatchDirective, PatchRecord};
pub use sources::{file_name_of, is_remote_locator, SourceEntry, SourceRole};
pub use spec::{parse_tag_line, Section, SpecContent, SpecError, TagLine, PREAMBLE};
