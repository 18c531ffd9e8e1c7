//! # Storage Layer
//!
//! Everything that touches the disk or spawns a process.
//!
//! | Data | Format | Location |
//! |------|--------|----------|
//! | Package description | RPM spec, byte-exact | `<name>.spec` (original) and a working copy |
//! | Results | JSON | `<results-dir>/results.json` |
//! | Config | TOML | `specrebase.toml`, `~/.config/specrebase/config.toml` |
//!
//! Writes are atomic (temp file + rename); the result store additionally
//! takes a file lock (`fs2`).
//!
//! ## Key Types
//!
//! - [`SpecFile`] - Spec file with its parsed content and derived views
//! - [`ResultStore`] - Outcomes of a run keyed by plugin name
//! - [`Lsdiff`] / [`CommandFetcher`] - External tools
//! - [`Config`] - Project and global configuration

mod config;
mod results;
mod specfile;
mod tools;

pub use config::{Config, ConfigError, GlobalConfig, OutputFormat, RebaseConfig, ToolsConfig, CONFIG_FILE};
pub use results::{Outcome, PatchStatus, Payload, ResultKind, ResultStore, RESULTS_FILE};
pub use specfile::SpecFile;
pub use tools::{find_program, is_executable, CommandFetcher, Fetcher, Lsdiff, PatchInspector};
