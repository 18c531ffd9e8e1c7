//! Plugin runner
//!
//! Turns "what the pipeline wants done" into "which available, applicable
//! plugins run, in what order" and folds their results. Plugins run
//! strictly one after another.

use std::io::Write;
use std::path::Path;
use std::sync::Arc;

use anyhow::{Context, Result};

use super::capability::{
    BuildTool, CheckRequest, Capability, OutputTool, PluginContext, ReportContext, RunEnv,
    SrpmBuildTool,
};
use super::protocol::PluginKind;
use super::registry::{Availability, PluginError, PluginRegistry};
use crate::domain::{CheckerCategory, PackageCategory};
use crate::storage::{Payload, ResultKind, ResultStore, SpecFile};

/// Runs plugins from a registry
#[derive(Debug, Default)]
pub struct PluginRunner {
    registry: PluginRegistry,
}

impl PluginRunner {
    pub fn new(registry: PluginRegistry) -> Self {
        Self { registry }
    }

    pub fn registry(&self) -> &PluginRegistry {
        &self.registry
    }

    fn context<'a>(&'a self, env: &'a RunEnv) -> PluginContext<'a> {
        PluginContext { runner: self, env }
    }

    /// Available plugins of a kind not in `blacklist`, in enumeration order
    fn allowed<'a>(
        &'a self,
        kind: PluginKind,
        blacklist: &'a [String],
    ) -> impl Iterator<Item = &'a Capability> + 'a {
        self.registry
            .available(kind)
            .filter(move |c| !blacklist.iter().any(|b| b == c.name()))
    }

    /// Runs a single checker.
    ///
    /// Returns `None` without running anything if the checker is unknown,
    /// unavailable, or inspects a different category.
    pub fn run_checker(
        &self,
        results_dir: &Path,
        name: &str,
        category: CheckerCategory,
        request: &CheckRequest,
        env: &RunEnv,
    ) -> Result<Option<Payload>> {
        let Some(checker) = self
            .registry
            .lookup(PluginKind::Checker, name)
            .and_then(Capability::as_checker)
        else {
            return Ok(None);
        };

        if checker.category().is_some_and(|c| c != category) {
            return Ok(None);
        }

        if !checker.is_available() {
            tracing::debug!("Checker '{}' is not available", name);
            return Ok(None);
        }

        tracing::info!("Running checks on packages using '{}'", name);
        let payload = checker
            .run_check(results_dir, request, &self.context(env))
            .with_context(|| format!("Checker '{}' failed", name))?;

        Ok(Some(payload))
    }

    /// Runs the named checkers and stores their payloads
    pub fn run_checkers(
        &self,
        names: &[String],
        category: CheckerCategory,
        request: &CheckRequest,
        env: &RunEnv,
        store: &mut ResultStore,
    ) -> Result<()> {
        for name in names {
            if !self.registry.is_known(PluginKind::Checker, name) {
                store.add_warning(format!("Unknown checker '{}' was skipped", name));
                continue;
            }

            let results_dir = env.results_dir.join("checkers").join(name);
            if let Some(payload) = self.run_checker(&results_dir, name, category, request, env)? {
                store.set(ResultKind::Checkers, name.as_str(), payload);
            }
        }

        Ok(())
    }

    /// Important findings of a stored checker payload
    pub fn important_changes(&self, name: &str, payload: &Payload) -> Vec<String> {
        self.registry
            .lookup(PluginKind::Checker, name)
            .and_then(Capability::as_checker)
            .map(|checker| checker.important_changes(payload))
            .unwrap_or_default()
    }

    /// Runs every applicable spec hook not in `blacklist` against the working copy
    pub fn run_spec_hooks(
        &self,
        original: &SpecFile,
        working: &mut SpecFile,
        blacklist: &[String],
        env: &RunEnv,
    ) -> Result<()> {
        let category = working.category();
        let ctx = self.context(env);

        for capability in self.allowed(PluginKind::SpecHook, blacklist) {
            let Some(hook) = capability.as_spec_hook() else {
                continue;
            };
            if !capability.applies_to(category) {
                continue;
            }

            tracing::info!("Running '{}' spec hook", hook.name());
            hook.run(original, working, &ctx)
                .with_context(|| format!("Spec hook '{}' failed", hook.name()))?;
        }

        Ok(())
    }

    /// Runs build-log hooks and merges their results into `store`.
    ///
    /// Returns true if any hook asked for a rebuild. Nothing runs in
    /// non-interactive mode unless forced.
    #[allow(clippy::too_many_arguments)]
    pub fn run_build_log_hooks(
        &self,
        original: &SpecFile,
        working: &mut SpecFile,
        non_interactive: bool,
        force: bool,
        blacklist: &[String],
        env: &RunEnv,
        store: &mut ResultStore,
    ) -> Result<bool> {
        if non_interactive && !force {
            return Ok(false);
        }

        let category = working.category();
        let ctx = self.context(env);
        let mut rerun = false;

        for capability in self.allowed(PluginKind::BuildLogHook, blacklist) {
            let Some(hook) = capability.as_build_log_hook() else {
                continue;
            };
            if !capability.applies_to(category) {
                continue;
            }

            tracing::info!("Running '{}' build log hook", hook.name());
            let (payload, should_rerun) = hook
                .run(original, working, &ctx)
                .with_context(|| format!("Build log hook '{}' failed", hook.name()))?;

            let merged = match store.get(ResultKind::BuildLogHooks, hook.name()) {
                Some(previous) => hook.merge_two_results(previous, &payload),
                None => payload,
            };
            store.set(ResultKind::BuildLogHooks, hook.name(), merged);

            rerun |= should_rerun;
        }

        Ok(rerun)
    }

    /// Finds the latest upstream version of a package.
    ///
    /// A named versioneer is authoritative. Otherwise every available
    /// versioneer not in `blacklist` that applies to `category` is tried,
    /// categorized ones first, and the first non-empty result wins.
    pub fn run_versioneer(
        &self,
        name: Option<&str>,
        package_name: &str,
        category: Option<PackageCategory>,
        blacklist: &[String],
    ) -> Result<Option<String>> {
        if let Some(name) = name {
            let versioneer = self
                .registry
                .lookup(PluginKind::Versioneer, name)
                .and_then(Capability::as_versioneer)
                .ok_or_else(|| PluginError::UnknownPlugin {
                    kind: PluginKind::Versioneer,
                    name: name.to_string(),
                })?;

            tracing::info!("Running '{}' versioneer", name);
            return versioneer
                .run(package_name)
                .with_context(|| format!("Versioneer '{}' failed", name));
        }

        let mut candidates: Vec<&Capability> = self
            .allowed(PluginKind::Versioneer, blacklist)
            .filter(|c| c.applies_to(category))
            .collect();
        // Stable: enumeration order is kept within each tier
        candidates.sort_by_key(|c| c.categories().is_empty());

        for capability in candidates {
            let Some(versioneer) = capability.as_versioneer() else {
                continue;
            };

            tracing::info!("Running '{}' versioneer", versioneer.name());
            match versioneer.run(package_name) {
                Ok(Some(version)) if !version.is_empty() => return Ok(Some(version)),
                Ok(_) => {}
                Err(e) => tracing::warn!("Versioneer '{}' failed: {:#}", versioneer.name(), e),
            }
        }

        Ok(None)
    }

    fn output_tool(&self, name: &str) -> Result<&Arc<dyn OutputTool>> {
        self.registry
            .lookup(PluginKind::OutputTool, name)
            .and_then(Capability::as_output_tool)
            .ok_or_else(|| {
                PluginError::UnknownPlugin {
                    kind: PluginKind::OutputTool,
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Renders the final report; an unknown output tool is an error
    pub fn run_output_tool(
        &self,
        name: &str,
        logs: &[String],
        store: &ResultStore,
        results_dir: &Path,
    ) -> Result<()> {
        let tool = self.output_tool(name)?;
        let report = ReportContext {
            runner: self,
            store,
            results_dir,
        };

        tool.run(logs, &report)
            .with_context(|| format!("Output tool '{}' failed", name))
    }

    /// Prints the short summary of an output tool
    pub fn print_cli_summary(
        &self,
        name: &str,
        store: &ResultStore,
        results_dir: &Path,
        out: &mut dyn Write,
    ) -> Result<()> {
        let tool = self.output_tool(name)?;
        let report = ReportContext {
            runner: self,
            store,
            results_dir,
        };

        tool.print_cli_summary(&report, out)
    }

    /// Gets a build tool; an unknown name is an error
    pub fn build_tool(&self, name: &str) -> Result<Arc<dyn BuildTool>> {
        self.registry
            .lookup(PluginKind::BuildTool, name)
            .and_then(Capability::as_build_tool)
            .cloned()
            .ok_or_else(|| {
                PluginError::UnknownPlugin {
                    kind: PluginKind::BuildTool,
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Gets an SRPM build tool; an unknown name is an error
    pub fn srpm_build_tool(&self, name: &str) -> Result<Arc<dyn SrpmBuildTool>> {
        self.registry
            .lookup(PluginKind::SrpmBuildTool, name)
            .and_then(Capability::as_srpm_build_tool)
            .cloned()
            .ok_or_else(|| {
                PluginError::UnknownPlugin {
                    kind: PluginKind::SrpmBuildTool,
                    name: name.to_string(),
                }
                .into()
            })
    }

    /// Names of checkers enabled by default
    pub fn default_checkers(&self) -> Vec<&str> {
        self.registry
            .list(PluginKind::Checker, Availability::DefaultEnabled)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::capability::{BuildLogHook, Checker, Plugin, SpecHook, Versioneer};
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::sync::Mutex;
    use tempfile::TempDir;

    struct FakeChecker {
        category: CheckerCategory,
        calls: AtomicUsize,
    }

    impl Plugin for FakeChecker {
        fn name(&self) -> &str {
            "fake"
        }
    }

    impl Checker for FakeChecker {
        fn category(&self) -> Option<CheckerCategory> {
            Some(self.category)
        }

        fn is_available(&self) -> bool {
            true
        }

        fn run_check(
            &self,
            _results_dir: &Path,
            _request: &CheckRequest,
            _ctx: &PluginContext<'_>,
        ) -> Result<Payload> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            Ok(json!({"ok": true}))
        }
    }

    struct FakeVersioneer {
        name: &'static str,
        categories: Vec<PackageCategory>,
        result: Option<&'static str>,
        log: Arc<Mutex<Vec<&'static str>>>,
    }

    impl Plugin for FakeVersioneer {
        fn name(&self) -> &str {
            self.name
        }

        fn categories(&self) -> &[PackageCategory] {
            &self.categories
        }
    }

    impl Versioneer for FakeVersioneer {
        fn run(&self, _package_name: &str) -> Result<Option<String>> {
            if let Ok(mut log) = self.log.lock() {
                log.push(self.name);
            }
            Ok(self.result.map(str::to_string))
        }
    }

    struct MarkerHook {
        name: &'static str,
        categories: Vec<PackageCategory>,
    }

    impl Plugin for MarkerHook {
        fn name(&self) -> &str {
            self.name
        }

        fn categories(&self) -> &[PackageCategory] {
            &self.categories
        }
    }

    impl SpecHook for MarkerHook {
        fn run(&self, _original: &SpecFile, working: &mut SpecFile, _ctx: &PluginContext<'_>) -> Result<()> {
            let marker = format!("# {}", self.name);
            if !working.content().lines().any(|l| l == marker) {
                working.content_mut().prepend_line("%package", marker)?;
            }
            Ok(())
        }
    }

    struct CountingLogHook {
        calls: Arc<AtomicUsize>,
        rerun: bool,
    }

    impl Plugin for CountingLogHook {
        fn name(&self) -> &str {
            "counting"
        }
    }

    impl BuildLogHook for CountingLogHook {
        fn run(
            &self,
            _original: &SpecFile,
            _working: &mut SpecFile,
            _ctx: &PluginContext<'_>,
        ) -> Result<(Payload, bool)> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            Ok((json!({"attempts": [n]}), self.rerun))
        }
    }

    fn spec(text: &str) -> SpecFile {
        SpecFile::from_text("/nonexistent/x.spec", text)
    }

    fn runner_with(capabilities: Vec<Capability>) -> PluginRunner {
        let mut registry = PluginRegistry::new();
        for capability in capabilities {
            registry.register_capability(capability);
        }
        PluginRunner::new(registry)
    }

    #[test]
    fn checker_with_other_category_is_not_run() {
        let checker = Arc::new(FakeChecker {
            category: CheckerCategory::Rpm,
            calls: AtomicUsize::new(0),
        });
        let runner = runner_with(vec![Capability::Checker(checker.clone())]);
        let env = RunEnv::new("/tmp");

        let result = runner
            .run_checker(Path::new("/tmp"), "fake", CheckerCategory::Srpm, &CheckRequest::default(), &env)
            .unwrap();
        assert!(result.is_none());
        assert_eq!(checker.calls.load(Ordering::SeqCst), 0);

        let result = runner
            .run_checker(Path::new("/tmp"), "fake", CheckerCategory::Rpm, &CheckRequest::default(), &env)
            .unwrap();
        assert_eq!(result, Some(json!({"ok": true})));
        assert_eq!(checker.calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn unknown_checker_is_none() {
        let runner = runner_with(Vec::new());
        let result = runner
            .run_checker(
                Path::new("/tmp"),
                "missing",
                CheckerCategory::Rpm,
                &CheckRequest::default(),
                &RunEnv::new("/tmp"),
            )
            .unwrap();
        assert!(result.is_none());
    }

    #[test]
    fn run_checkers_stores_payloads() {
        let checker = Arc::new(FakeChecker {
            category: CheckerCategory::Rpm,
            calls: AtomicUsize::new(0),
        });
        let runner = runner_with(vec![Capability::Checker(checker)]);
        let mut store = ResultStore::new();

        runner
            .run_checkers(
                &["fake".to_string(), "ghost".to_string()],
                CheckerCategory::Rpm,
                &CheckRequest::default(),
                &RunEnv::new("/tmp"),
                &mut store,
            )
            .unwrap();

        assert_eq!(store.get(ResultKind::Checkers, "fake"), Some(&json!({"ok": true})));
        assert_eq!(store.warnings.len(), 1);
    }

    fn versioneer(
        name: &'static str,
        categories: Vec<PackageCategory>,
        result: Option<&'static str>,
        log: &Arc<Mutex<Vec<&'static str>>>,
    ) -> Capability {
        Capability::Versioneer(Arc::new(FakeVersioneer {
            name,
            categories,
            result,
            log: Arc::clone(log),
        }))
    }

    #[test]
    fn categorized_versioneers_run_first() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with(vec![
            versioneer("anitya", vec![], Some("9.9"), &log),
            versioneer("npmjs", vec![PackageCategory::Nodejs], Some("3.0"), &log),
            versioneer("pypi", vec![PackageCategory::Python], Some("2.0"), &log),
        ]);

        let version = runner
            .run_versioneer(None, "python-foo", Some(PackageCategory::Python), &[])
            .unwrap();

        assert_eq!(version.as_deref(), Some("2.0"));
        assert_eq!(*log.lock().unwrap(), vec!["pypi"]);
    }

    #[test]
    fn generic_versioneer_is_fallback() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with(vec![
            versioneer("anitya", vec![], Some("9.9"), &log),
            versioneer("pypi", vec![PackageCategory::Python], None, &log),
        ]);

        let version = runner
            .run_versioneer(None, "python-foo", Some(PackageCategory::Python), &[])
            .unwrap();

        assert_eq!(version.as_deref(), Some("9.9"));
        assert_eq!(*log.lock().unwrap(), vec!["pypi", "anitya"]);
    }

    #[test]
    fn blacklisted_versioneer_is_skipped() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with(vec![
            versioneer("pypi", vec![PackageCategory::Python], Some("2.0"), &log),
            versioneer("anitya", vec![], Some("9.9"), &log),
        ]);

        let version = runner
            .run_versioneer(None, "foo", Some(PackageCategory::Python), &["pypi".to_string()])
            .unwrap();
        assert_eq!(version.as_deref(), Some("9.9"));
    }

    #[test]
    fn named_versioneer_is_authoritative() {
        let log = Arc::new(Mutex::new(Vec::new()));
        let runner = runner_with(vec![
            versioneer("pypi", vec![PackageCategory::Python], None, &log),
            versioneer("anitya", vec![], Some("9.9"), &log),
        ]);

        let version = runner
            .run_versioneer(Some("pypi"), "foo", Some(PackageCategory::Python), &[])
            .unwrap();
        assert!(version.is_none());

        let err = runner.run_versioneer(Some("nope"), "foo", None, &[]).unwrap_err();
        assert!(err.to_string().contains("nope"));
    }

    #[test]
    fn spec_hooks_respect_category_and_blacklist() {
        let runner = runner_with(vec![
            Capability::SpecHook(Arc::new(MarkerHook {
                name: "generic",
                categories: vec![],
            })),
            Capability::SpecHook(Arc::new(MarkerHook {
                name: "ruby-only",
                categories: vec![PackageCategory::Ruby],
            })),
            Capability::SpecHook(Arc::new(MarkerHook {
                name: "python-only",
                categories: vec![PackageCategory::Python],
            })),
            Capability::SpecHook(Arc::new(MarkerHook {
                name: "blocked",
                categories: vec![],
            })),
        ]);

        let original = spec("Name: python-foo\n");
        let mut working = spec("Name: python-foo\n");
        let env = RunEnv::new("/tmp");

        runner
            .run_spec_hooks(&original, &mut working, &["blocked".to_string()], &env)
            .unwrap();
        runner
            .run_spec_hooks(&original, &mut working, &["blocked".to_string()], &env)
            .unwrap();

        assert_eq!(working.render(), "# python-only\n# generic\nName: python-foo\n");
    }

    #[test]
    fn build_log_hooks_skipped_when_non_interactive() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = runner_with(vec![Capability::BuildLogHook(Arc::new(CountingLogHook {
            calls: Arc::clone(&calls),
            rerun: true,
        }))]);
        let original = spec("Name: foo\n");
        let mut working = spec("Name: foo\n");
        let mut store = ResultStore::new();

        let rerun = runner
            .run_build_log_hooks(&original, &mut working, true, false, &[], &RunEnv::new("/tmp"), &mut store)
            .unwrap();

        assert!(!rerun);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
        assert!(store.build_log_hooks.is_empty());
    }

    #[test]
    fn build_log_hook_results_accumulate() {
        let calls = Arc::new(AtomicUsize::new(0));
        let runner = runner_with(vec![Capability::BuildLogHook(Arc::new(CountingLogHook {
            calls: Arc::clone(&calls),
            rerun: true,
        }))]);
        let original = spec("Name: foo\n");
        let mut working = spec("Name: foo\n");
        let mut store = ResultStore::new();
        let env = RunEnv::new("/tmp");

        for _ in 0..2 {
            let rerun = runner
                .run_build_log_hooks(&original, &mut working, true, true, &[], &env, &mut store)
                .unwrap();
            assert!(rerun);
        }

        assert_eq!(
            store.get(ResultKind::BuildLogHooks, "counting"),
            Some(&json!({"attempts": [0, 1]}))
        );
    }

    #[test]
    fn missing_output_and_build_tools_are_errors() {
        let runner = runner_with(Vec::new());
        let dir = TempDir::new().unwrap();
        let store = ResultStore::new();

        assert!(runner.run_output_tool("text", &[], &store, dir.path()).is_err());
        assert!(runner.build_tool("mock").is_err());
        assert!(runner.srpm_build_tool("mock").is_err());
    }
}
