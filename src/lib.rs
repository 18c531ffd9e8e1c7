//! specrebase - Rebase RPM spec files to new upstream versions
//!
//! A rebase is driven by two cooperating pieces: a structured model of the
//! spec file (sources, patches, `%patch` directives, sections) that can be
//! mutated line by line and saved back byte-for-byte, and a categorized
//! plugin runner that applies spec hooks, build-log hooks, checkers,
//! versioneers and output tools against that model.

pub mod domain;
pub mod storage;
pub mod plugin;
pub mod cli;
pub mod logger;

pub use domain::{PackageCategory, PatchDirective, PatchRecord, SourceEntry, SourceRole, SpecContent};
pub use plugin::{PluginKind, PluginRegistry, PluginRunner};
pub use storage::{ResultStore, SpecFile};
