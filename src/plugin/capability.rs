//! Capability contracts
//!
//! Every plugin implements [`Plugin`] for its static metadata plus exactly
//! one capability trait. The registry stores plugins as [`Capability`]
//! values, one variant per kind.

use std::collections::BTreeMap;
use std::fmt;
use std::io::Write;
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::Result;
use serde::{Deserialize, Serialize};

use super::protocol::PluginKind;
use super::runner::PluginRunner;
use crate::domain::{CheckerCategory, PackageCategory};
use crate::storage::{Payload, ResultStore, SpecFile};

/// Static plugin metadata
pub trait Plugin: Send + Sync {
    fn name(&self) -> &str;

    /// Package categories the plugin applies to; empty means all
    fn categories(&self) -> &[PackageCategory] {
        &[]
    }

    fn default_enabled(&self) -> bool {
        false
    }

    fn description(&self) -> &str {
        ""
    }
}

/// Free-form hook options from the configuration
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct HookOptions(BTreeMap<String, serde_json::Value>);

impl HookOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<serde_json::Value>) {
        self.0.insert(key.into(), value.into());
    }

    pub fn get_bool(&self, key: &str) -> bool {
        self.0.get(key).and_then(|v| v.as_bool()).unwrap_or(false)
    }

    pub fn get_str(&self, key: &str) -> Option<&str> {
        self.0.get(key).and_then(|v| v.as_str())
    }

    /// Converts TOML option values
    pub fn from_toml(options: &BTreeMap<String, toml::Value>) -> Result<Self> {
        let mut converted = BTreeMap::new();
        for (key, value) in options {
            converted.insert(key.clone(), serde_json::to_value(value)?);
        }
        Ok(Self(converted))
    }
}

/// Per-run environment shared by every plugin invocation
#[derive(Debug, Clone, Default)]
pub struct RunEnv {
    pub results_dir: PathBuf,
    pub options: HookOptions,
}

impl RunEnv {
    pub fn new(results_dir: impl Into<PathBuf>) -> Self {
        Self {
            results_dir: results_dir.into(),
            options: HookOptions::default(),
        }
    }

    pub fn with_options(mut self, options: HookOptions) -> Self {
        self.options = options;
        self
    }
}

/// Explicit context handed to every capability call
#[derive(Clone, Copy)]
pub struct PluginContext<'a> {
    pub runner: &'a PluginRunner,
    pub env: &'a RunEnv,
}

impl<'a> PluginContext<'a> {
    pub fn results_dir(&self) -> &'a Path {
        &self.env.results_dir
    }

    pub fn options(&self) -> &'a HookOptions {
        &self.env.options
    }
}

/// Packages handed to a checker
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct CheckRequest {
    pub old_packages: Vec<PathBuf>,
    pub new_packages: Vec<PathBuf>,
}

/// Validates build output without touching the spec
pub trait Checker: Plugin {
    /// Artifacts inspected; `None` runs for every category
    fn category(&self) -> Option<CheckerCategory>;

    fn is_available(&self) -> bool;

    fn run_check(
        &self,
        results_dir: &Path,
        request: &CheckRequest,
        ctx: &PluginContext<'_>,
    ) -> Result<Payload>;

    /// Findings worth a line in the CLI summary
    fn important_changes(&self, _payload: &Payload) -> Vec<String> {
        Vec::new()
    }
}

/// Targeted mutation of the working spec before building.
///
/// Implementations must be idempotent: running twice must not apply the
/// same transformation twice.
pub trait SpecHook: Plugin {
    fn run(&self, original: &SpecFile, working: &mut SpecFile, ctx: &PluginContext<'_>) -> Result<()>;
}

/// Inspects a failed build and proposes a spec fix plus a rerun signal
pub trait BuildLogHook: Plugin {
    fn run(
        &self,
        original: &SpecFile,
        working: &mut SpecFile,
        ctx: &PluginContext<'_>,
    ) -> Result<(Payload, bool)>;

    /// Folds the result of another attempt into the stored one
    fn merge_two_results(&self, old: &Payload, new: &Payload) -> Payload {
        merge_payloads(old, new)
    }
}

/// Discovers the latest upstream version of a package
pub trait Versioneer: Plugin {
    fn run(&self, package_name: &str) -> Result<Option<String>>;
}

/// What a reporter sees at the end of a run
pub struct ReportContext<'a> {
    pub runner: &'a PluginRunner,
    pub store: &'a ResultStore,
    pub results_dir: &'a Path,
}

/// Renders the final report
pub trait OutputTool: Plugin {
    fn run(&self, logs: &[String], report: &ReportContext<'_>) -> Result<()>;

    fn print_cli_summary(&self, report: &ReportContext<'_>, out: &mut dyn Write) -> Result<()>;
}

/// Inputs of a package build
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BuildRequest {
    /// Directory receiving logs and packages
    pub results_dir: PathBuf,

    /// Directory holding sources and patches
    pub sources_dir: PathBuf,

    /// Source package to rebuild, when one was built already
    #[serde(default)]
    pub srpm: Option<PathBuf>,
}

/// Artifacts produced by a build
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct BuildOutcome {
    pub packages: Vec<PathBuf>,
    pub logs: Vec<PathBuf>,
}

/// Builds binary packages
pub trait BuildTool: Plugin {
    fn build(&self, spec: &SpecFile, request: &BuildRequest) -> Result<BuildOutcome>;
}

/// Builds source packages
pub trait SrpmBuildTool: Plugin {
    fn build_srpm(&self, spec: &SpecFile, request: &BuildRequest) -> Result<BuildOutcome>;
}

/// A plugin stored in the registry
#[derive(Clone)]
pub enum Capability {
    BuildTool(Arc<dyn BuildTool>),
    SrpmBuildTool(Arc<dyn SrpmBuildTool>),
    Checker(Arc<dyn Checker>),
    SpecHook(Arc<dyn SpecHook>),
    BuildLogHook(Arc<dyn BuildLogHook>),
    Versioneer(Arc<dyn Versioneer>),
    OutputTool(Arc<dyn OutputTool>),
}

macro_rules! with_plugin {
    ($capability:expr, $plugin:ident => $body:expr) => {
        match $capability {
            Capability::BuildTool($plugin) => $body,
            Capability::SrpmBuildTool($plugin) => $body,
            Capability::Checker($plugin) => $body,
            Capability::SpecHook($plugin) => $body,
            Capability::BuildLogHook($plugin) => $body,
            Capability::Versioneer($plugin) => $body,
            Capability::OutputTool($plugin) => $body,
        }
    };
}

impl Capability {
    pub fn kind(&self) -> PluginKind {
        match self {
            Capability::BuildTool(_) => PluginKind::BuildTool,
            Capability::SrpmBuildTool(_) => PluginKind::SrpmBuildTool,
            Capability::Checker(_) => PluginKind::Checker,
            Capability::SpecHook(_) => PluginKind::SpecHook,
            Capability::BuildLogHook(_) => PluginKind::BuildLogHook,
            Capability::Versioneer(_) => PluginKind::Versioneer,
            Capability::OutputTool(_) => PluginKind::OutputTool,
        }
    }

    pub fn name(&self) -> &str {
        with_plugin!(self, p => p.name())
    }

    pub fn categories(&self) -> &[PackageCategory] {
        with_plugin!(self, p => p.categories())
    }

    pub fn default_enabled(&self) -> bool {
        with_plugin!(self, p => p.default_enabled())
    }

    pub fn description(&self) -> &str {
        with_plugin!(self, p => p.description())
    }

    /// Returns true if the plugin applies to a package of `category`
    pub fn applies_to(&self, category: Option<PackageCategory>) -> bool {
        let categories = self.categories();
        categories.is_empty() || category.is_some_and(|c| categories.contains(&c))
    }

    pub fn as_checker(&self) -> Option<&Arc<dyn Checker>> {
        match self {
            Capability::Checker(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_spec_hook(&self) -> Option<&Arc<dyn SpecHook>> {
        match self {
            Capability::SpecHook(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_build_log_hook(&self) -> Option<&Arc<dyn BuildLogHook>> {
        match self {
            Capability::BuildLogHook(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_versioneer(&self) -> Option<&Arc<dyn Versioneer>> {
        match self {
            Capability::Versioneer(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_output_tool(&self) -> Option<&Arc<dyn OutputTool>> {
        match self {
            Capability::OutputTool(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_build_tool(&self) -> Option<&Arc<dyn BuildTool>> {
        match self {
            Capability::BuildTool(p) => Some(p),
            _ => None,
        }
    }

    pub fn as_srpm_build_tool(&self) -> Option<&Arc<dyn SrpmBuildTool>> {
        match self {
            Capability::SrpmBuildTool(p) => Some(p),
            _ => None,
        }
    }
}

impl fmt::Debug for Capability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Capability")
            .field("kind", &self.kind())
            .field("name", &self.name())
            .finish()
    }
}

/// Recursive union of two payloads.
///
/// Objects merge key-wise, arrays concatenate without duplicates, any other
/// value is replaced by the new one.
pub fn merge_payloads(old: &Payload, new: &Payload) -> Payload {
    match (old, new) {
        (Payload::Object(old_map), Payload::Object(new_map)) => {
            let mut merged = old_map.clone();
            for (key, new_value) in new_map {
                let value = match old_map.get(key) {
                    Some(old_value) => merge_payloads(old_value, new_value),
                    None => new_value.clone(),
                };
                merged.insert(key.clone(), value);
            }
            Payload::Object(merged)
        }
        (Payload::Array(old_items), Payload::Array(new_items)) => {
            let mut merged = old_items.clone();
            for item in new_items {
                if !merged.contains(item) {
                    merged.push(item.clone());
                }
            }
            Payload::Array(merged)
        }
        (_, new) => new.clone(),
    }
}
