//! # Plugin System
//!
//! Categorized plugins applied against a spec model during a rebase.
//!
//! ## Plugin Kinds
//!
//! | Kind | Executable Pattern | Purpose |
//! |------|--------------------|---------|
//! | Build tool | `specrebase-build-tool-{name}` | Builds binary packages |
//! | SRPM build tool | `specrebase-srpm-build-tool-{name}` | Builds source packages |
//! | Checker | `specrebase-checker-{name}` | Compares old and new build output |
//! | Spec hook | `specrebase-spec-hook-{name}` | Mutates the working spec before building |
//! | Build-log hook | `specrebase-build-log-hook-{name}` | Repairs the spec after a failed build |
//! | Versioneer | `specrebase-versioneer-{name}` | Finds the latest upstream version |
//! | Output tool | `specrebase-output-tool-{name}` | Renders the final report |
//!
//! ## Plugin Discovery
//!
//! Builtins are registered first. Executables are then discovered in:
//! 1. plugin directories from `specrebase.toml` and the global config
//! 2. `$PATH`
//!
//! The first registration of a name wins.
//!
//! ## Protocol
//!
//! ```text
//! Runner                          Plugin Executable
//!  │                               │
//!  ├── Spawn: specrebase-versioneer-pypi
//!  │                               │
//!  ├── Stdin: {"operation": "latest_version", "params": {...}}
//!  │                               │
//!  └── Stdout: {"success": true, "data": {...}}
//! ```
//!
//! Every executable must support `--manifest` to declare its kind and
//! categories.
//!
//! ## Key Types
//!
//! - [`PluginRegistry`] - Name-to-plugin tables per kind
//! - [`PluginRunner`] - Applies plugins with category and blacklist filtering
//! - [`Capability`] - A registered plugin of one kind
//! - [`PluginManifest`] - Declares an executable's capabilities

mod builtin;
mod capability;
mod external;
mod protocol;
mod registry;
mod runner;

pub use builtin::{
    AbiPkgDiff, FilesHook, JsonOutput, Mock, PathsToMacros, PypiUrlFix, ReplaceOldVersion, Rpmbuild,
    Rpmlint, RubyGems, TextOutput,
};
pub use capability::{
    merge_payloads, BuildLogHook, BuildOutcome, BuildRequest, BuildTool, Capability, CheckRequest, Checker,
    HookOptions, OutputTool, Plugin, PluginContext, ReportContext, RunEnv, SpecHook, SrpmBuildTool, Versioneer,
};
pub use external::ExternalPlugin;
pub use protocol::{PluginKind, PluginManifest, PluginRequest, PluginResponse};
pub use registry::{parse_executable_name, Availability, PluginDescriptor, PluginError, PluginRegistry, EXECUTABLE_PREFIX};
pub use runner::PluginRunner;
