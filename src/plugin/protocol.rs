//! Plugin protocol types
//!
//! Executable plugins communicate via JSON messages over stdin/stdout.
//! Each plugin must support the `--manifest` flag to declare its kind.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use crate::domain::{CheckerCategory, PackageCategory};

/// Capability kind a plugin implements
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PluginKind {
    BuildTool,
    SrpmBuildTool,
    Checker,
    SpecHook,
    BuildLogHook,
    Versioneer,
    OutputTool,
}

impl PluginKind {
    pub const ALL: [PluginKind; 7] = [
        PluginKind::BuildTool,
        PluginKind::SrpmBuildTool,
        PluginKind::Checker,
        PluginKind::SpecHook,
        PluginKind::BuildLogHook,
        PluginKind::Versioneer,
        PluginKind::OutputTool,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            PluginKind::BuildTool => "build_tool",
            PluginKind::SrpmBuildTool => "srpm_build_tool",
            PluginKind::Checker => "checker",
            PluginKind::SpecHook => "spec_hook",
            PluginKind::BuildLogHook => "build_log_hook",
            PluginKind::Versioneer => "versioneer",
            PluginKind::OutputTool => "output_tool",
        }
    }

    /// Kebab-case form used in executable names (`specrebase-spec-hook-foo`)
    pub fn slug(&self) -> &'static str {
        match self {
            PluginKind::BuildTool => "build-tool",
            PluginKind::SrpmBuildTool => "srpm-build-tool",
            PluginKind::Checker => "checker",
            PluginKind::SpecHook => "spec-hook",
            PluginKind::BuildLogHook => "build-log-hook",
            PluginKind::Versioneer => "versioneer",
            PluginKind::OutputTool => "output-tool",
        }
    }
}

impl fmt::Display for PluginKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PluginKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized = s.to_ascii_lowercase().replace('-', "_");
        PluginKind::ALL
            .into_iter()
            .find(|kind| kind.as_str() == normalized)
            .ok_or_else(|| format!("Unknown plugin kind: {}", s))
    }
}

/// Plugin manifest declaring capabilities
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Plugin name (e.g., "pypi")
    pub name: String,

    /// Plugin version
    pub version: String,

    /// Human-readable description
    #[serde(default)]
    pub description: String,

    pub kind: PluginKind,

    /// Package categories the plugin applies to (empty = all)
    #[serde(default)]
    pub categories: Vec<PackageCategory>,

    #[serde(default)]
    pub default_enabled: bool,

    /// Artifacts a checker inspects
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub checker_category: Option<CheckerCategory>,
}

/// A message sent to a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginRequest {
    /// The operation to perform
    pub operation: String,

    /// Operation-specific parameters
    pub params: serde_json::Value,
}

impl PluginRequest {
    pub fn new(operation: impl Into<String>, params: impl Into<serde_json::Value>) -> Self {
        Self {
            operation: operation.into(),
            params: params.into(),
        }
    }
}

/// A response from a plugin
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PluginResponse {
    /// Whether the operation succeeded
    pub success: bool,

    /// Result data (if success)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<serde_json::Value>,

    /// Error message (if failure)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl PluginResponse {
    pub fn success(data: impl Into<serde_json::Value>) -> Self {
        Self {
            success: true,
            data: Some(data.into()),
            error: None,
        }
    }

    pub fn error(message: impl Into<String>) -> Self {
        Self {
            success: false,
            data: None,
            error: Some(message.into()),
        }
    }

    /// Returns the data of a successful response (`null` when absent)
    pub fn into_data(self) -> Result<serde_json::Value, String> {
        if self.success {
            Ok(self.data.unwrap_or(serde_json::Value::Null))
        } else {
            Err(self.error.unwrap_or_else(|| "Unknown error".to_string()))
        }
    }
}
