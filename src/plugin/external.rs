//! Executable plugins
//!
//! An [`ExternalPlugin`] wraps a discovered executable. Each capability call
//! spawns the executable, writes one JSON request line to stdin and reads
//! one JSON response line from stdout.

use std::io::{BufRead, BufReader, Write};
use std::path::{Path, PathBuf};
use std::process::{Command, Stdio};
use std::sync::Arc;

use anyhow::{Context, Result};
use serde_json::json;

use super::capability::{
    BuildLogHook, Capability, CheckRequest, Checker, Plugin, PluginContext, SpecHook, Versioneer,
    merge_payloads,
};
use super::protocol::{PluginKind, PluginManifest, PluginRequest, PluginResponse};
use super::registry::PluginError;
use crate::domain::{CheckerCategory, PackageCategory, SpecContent};
use crate::storage::{Payload, SpecFile};

/// A plugin implemented by an external executable
#[derive(Debug, Clone)]
pub struct ExternalPlugin {
    path: PathBuf,
    manifest: PluginManifest,
}

impl ExternalPlugin {
    /// Loads the manifest from a plugin executable
    pub fn load(path: &Path) -> Result<Self> {
        let output = Command::new(path)
            .arg("--manifest")
            .output()
            .with_context(|| format!("Failed to execute plugin: {}", path.display()))?;

        if !output.status.success() {
            let stderr = String::from_utf8_lossy(&output.stderr);
            anyhow::bail!("Plugin returned error: {}", stderr.trim());
        }

        let manifest: PluginManifest = serde_json::from_slice(&output.stdout)
            .with_context(|| format!("Failed to parse plugin manifest: {}", path.display()))?;

        Ok(Self {
            path: path.to_path_buf(),
            manifest,
        })
    }

    pub fn path(&self) -> &Path {
        &self.path
    }

    pub fn manifest(&self) -> &PluginManifest {
        &self.manifest
    }

    /// Wraps the plugin as the capability its manifest declares
    pub fn into_capability(self) -> Result<Capability> {
        let kind = self.manifest.kind;
        let plugin = Arc::new(self);
        match kind {
            PluginKind::Checker => Ok(Capability::Checker(plugin)),
            PluginKind::SpecHook => Ok(Capability::SpecHook(plugin)),
            PluginKind::BuildLogHook => Ok(Capability::BuildLogHook(plugin)),
            PluginKind::Versioneer => Ok(Capability::Versioneer(plugin)),
            kind => Err(PluginError::Protocol(format!(
                "{} plugins cannot be provided by executables",
                kind
            ))
            .into()),
        }
    }

    /// Executes a plugin request
    pub fn execute(&self, request: &PluginRequest) -> Result<PluginResponse> {
        let mut child = Command::new(&self.path)
            .stdin(Stdio::piped())
            .stdout(Stdio::piped())
            .stderr(Stdio::inherit())
            .spawn()
            .with_context(|| format!("Failed to spawn plugin: {}", self.path.display()))?;

        // Send request, then close stdin so the plugin sees EOF
        {
            let mut stdin = child
                .stdin
                .take()
                .ok_or_else(|| PluginError::Protocol("Failed to open plugin stdin".to_string()))?;
            let request_json =
                serde_json::to_string(request).context("Failed to serialize request")?;
            writeln!(stdin, "{}", request_json).context("Failed to write to plugin")?;
        }

        // Read response
        let stdout = child
            .stdout
            .take()
            .ok_or_else(|| PluginError::Protocol("Failed to open plugin stdout".to_string()))?;
        let mut reader = BufReader::new(stdout);
        let mut response_line = String::new();
        reader
            .read_line(&mut response_line)
            .context("Failed to read plugin response")?;

        let status = child.wait().context("Failed to wait for plugin")?;
        if !status.success() {
            return Err(PluginError::Protocol(format!(
                "Plugin {} exited with {}",
                self.manifest.name, status
            ))
            .into());
        }

        if response_line.trim().is_empty() {
            return Err(PluginError::Protocol(format!(
                "No response from plugin {}",
                self.manifest.name
            ))
            .into());
        }

        let response: PluginResponse =
            serde_json::from_str(&response_line).context("Failed to parse plugin response")?;

        Ok(response)
    }

    /// Executes an operation and returns the response data
    fn call(&self, operation: &str, params: serde_json::Value) -> Result<Payload> {
        let response = self.execute(&PluginRequest::new(operation, params))?;
        response.into_data().map_err(|e| {
            anyhow::anyhow!("Plugin '{}' failed on {}: {}", self.manifest.name, operation, e)
        })
    }

    fn hook_params(original: &SpecFile, working: &SpecFile, ctx: &PluginContext<'_>) -> Payload {
        json!({
            "original": original.render(),
            "working": working.render(),
            "results_dir": ctx.results_dir(),
            "options": ctx.options(),
        })
    }

    /// Replaces the working spec with text returned by the plugin
    fn apply_working(working: &mut SpecFile, data: &Payload) -> Result<bool> {
        let Some(text) = data.get("working").and_then(|v| v.as_str()) else {
            return Ok(false);
        };

        if text == working.render() {
            return Ok(false);
        }

        *working.content_mut() = SpecContent::parse(text);
        working.save()?;
        Ok(true)
    }
}

impl Plugin for ExternalPlugin {
    fn name(&self) -> &str {
        &self.manifest.name
    }

    fn categories(&self) -> &[PackageCategory] {
        &self.manifest.categories
    }

    fn default_enabled(&self) -> bool {
        self.manifest.default_enabled
    }

    fn description(&self) -> &str {
        &self.manifest.description
    }
}

impl Checker for ExternalPlugin {
    fn category(&self) -> Option<CheckerCategory> {
        self.manifest.checker_category
    }

    fn is_available(&self) -> bool {
        match self.call("is_available", json!({})) {
            Ok(data) => data.as_bool().unwrap_or(false),
            Err(e) => {
                tracing::debug!("{:#}", e);
                false
            }
        }
    }

    fn run_check(
        &self,
        results_dir: &Path,
        request: &CheckRequest,
        ctx: &PluginContext<'_>,
    ) -> Result<Payload> {
        self.call(
            "run_check",
            json!({
                "results_dir": results_dir,
                "old_packages": request.old_packages,
                "new_packages": request.new_packages,
                "options": ctx.options(),
            }),
        )
    }

    fn important_changes(&self, payload: &Payload) -> Vec<String> {
        match self.call("important_changes", json!({ "payload": payload })) {
            Ok(data) => serde_json::from_value(data).unwrap_or_default(),
            Err(e) => {
                tracing::debug!("{:#}", e);
                Vec::new()
            }
        }
    }
}

impl SpecHook for ExternalPlugin {
    fn run(&self, original: &SpecFile, working: &mut SpecFile, ctx: &PluginContext<'_>) -> Result<()> {
        let data = self.call("spec_hook", Self::hook_params(original, working, ctx))?;
        Self::apply_working(working, &data)?;
        Ok(())
    }
}

impl BuildLogHook for ExternalPlugin {
    fn run(
        &self,
        original: &SpecFile,
        working: &mut SpecFile,
        ctx: &PluginContext<'_>,
    ) -> Result<(Payload, bool)> {
        let data = self.call("build_log_hook", Self::hook_params(original, working, ctx))?;
        Self::apply_working(working, &data)?;

        let payload = data.get("payload").cloned().unwrap_or(Payload::Null);
        let rerun = data.get("rerun").and_then(|v| v.as_bool()).unwrap_or(false);
        Ok((payload, rerun))
    }

    fn merge_two_results(&self, old: &Payload, new: &Payload) -> Payload {
        match self.call("merge", json!({ "old": old, "new": new })) {
            Ok(merged) => merged,
            Err(e) => {
                tracing::debug!("{:#}, using the default merge", e);
                merge_payloads(old, new)
            }
        }
    }
}

impl Versioneer for ExternalPlugin {
    fn run(&self, package_name: &str) -> Result<Option<String>> {
        let data = self.call("latest_version", json!({ "package_name": package_name }))?;
        Ok(data
            .as_str()
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string))
    }
}
