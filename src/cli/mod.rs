//! # Command-Line Interface
//!
//! Thin front-end over the spec model and the plugin runner.
//!
//! ## Commands
//!
//! | Group | Purpose | Examples |
//! |-------|---------|----------|
//! | Plugins | Registry inspection | `plugins --kind spec-hook`, `latest-version foo` |
//! | Spec | Spec model operations | `sources`, `patches`, `prune-patches`, `hooks` |
//! | Build | Builds, build log hooks, checkers | `rebuild foo.spec work/foo.spec --results-dir out` |
//! | Report | Output tools | `report results.json --tool json` |
//!
//! ## Output Formats
//!
//! All commands support the `--format` flag:
//! - `text` - Human-readable output
//! - `json` - Machine-parseable JSON
//!
//! Without the flag the global configuration's `default_format` applies.
//!
//! ## Logging
//!
//! Use `--verbose` (or `-v`) for debug logs and `--quiet` (or `-q`) for
//! errors only. Logs go to stderr.
//!
//! ## Entry Point
//!
//! Call [`run()`] to parse arguments and execute the appropriate command.

mod app;
mod build_cmd;
mod output;
mod plugin_cmd;
mod report_cmd;
mod spec_cmd;

pub use app::{run, Cli, Commands};
pub use output::{Output, OutputFormat};
