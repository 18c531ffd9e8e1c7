//! Plugin registry
//!
//! Holds a `name -> plugin-or-unavailable` mapping per kind. Plugins come
//! from the builtin table and from executables discovered in:
//! 1. plugin directories from the configuration
//! 2. `$PATH`
//!
//! Executables are named `specrebase-<kind>-<name>` with the kind in
//! kebab-case (`specrebase-versioneer-pypi`). Registration never fails: a
//! plugin that cannot be loaded or does not match its kind occupies an
//! unavailable slot.

use std::collections::BTreeMap;
use std::path::{Path, PathBuf};

use anyhow::Result;
use indexmap::IndexMap;
use serde::Serialize;
use thiserror::Error;

use super::builtin;
use super::capability::Capability;
use super::external::ExternalPlugin;
use super::protocol::PluginKind;
use crate::domain::PackageCategory;
use crate::storage::is_executable;

/// Executable name prefix for discovered plugins
pub const EXECUTABLE_PREFIX: &str = "specrebase-";

#[derive(Debug, Error)]
pub enum PluginError {
    #[error("Unknown {kind} plugin: {name}")]
    UnknownPlugin { kind: PluginKind, name: String },

    #[error("{kind} plugin '{name}' is not available")]
    Unavailable { kind: PluginKind, name: String },

    #[error("Plugin '{name}' is a {actual} plugin, expected {expected}")]
    KindMismatch {
        name: String,
        expected: PluginKind,
        actual: PluginKind,
    },

    #[error("{kind} plugin '{name}' declares the name '{declared}'")]
    NameMismatch {
        kind: PluginKind,
        name: String,
        declared: String,
    },

    #[error("Plugin protocol error: {0}")]
    Protocol(String),
}

/// Which registered names to list
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Availability {
    /// Every known name, loaded or not
    All,
    /// Loaded plugins only
    Available,
    /// Loaded plugins enabled by default
    DefaultEnabled,
}

/// Serializable view of a registry slot
#[derive(Debug, Clone, Serialize)]
pub struct PluginDescriptor {
    pub name: String,
    pub kind: PluginKind,
    pub categories: Vec<PackageCategory>,
    pub default_enabled: bool,
    pub available: bool,

    #[serde(skip_serializing_if = "String::is_empty")]
    pub description: String,
}

/// Registry of plugins per kind
#[derive(Debug, Default)]
pub struct PluginRegistry {
    /// Insertion order is enumeration order
    slots: BTreeMap<PluginKind, IndexMap<String, Option<Capability>>>,

    /// Additional plugin directories
    plugin_dirs: Vec<PathBuf>,
}

impl PluginRegistry {
    /// Creates an empty registry
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a registry holding the builtin plugins
    pub fn with_builtins() -> Self {
        let mut registry = Self::new();
        builtin::register_all(&mut registry);
        registry
    }

    /// Registers a candidate under `kind`.
    ///
    /// Returns true if the candidate was accepted. A load error, a kind
    /// mismatch or a plugin calling itself something other than `name`
    /// records the name as unavailable. The first registration of a name wins.
    pub fn register(&mut self, kind: PluginKind, name: &str, candidate: Result<Capability>) -> bool {
        let slots = self.slots.entry(kind).or_default();

        if slots.contains_key(name) {
            tracing::debug!("{} plugin '{}' is already registered", kind, name);
            return false;
        }

        match candidate {
            Ok(capability) if capability.kind() == kind && capability.name() == name => {
                slots.insert(name.to_string(), Some(capability));
                true
            }
            Ok(capability) if capability.kind() == kind => {
                let mismatch = PluginError::NameMismatch {
                    kind,
                    name: name.to_string(),
                    declared: capability.name().to_string(),
                };
                tracing::debug!("{}", mismatch);
                slots.insert(name.to_string(), None);
                false
            }
            Ok(capability) => {
                let mismatch = PluginError::KindMismatch {
                    name: name.to_string(),
                    expected: kind,
                    actual: capability.kind(),
                };
                tracing::debug!("{}", mismatch);
                slots.insert(name.to_string(), None);
                false
            }
            Err(e) => {
                tracing::debug!("Failed to load {} plugin '{}': {:#}", kind, name, e);
                slots.insert(name.to_string(), None);
                false
            }
        }
    }

    /// Registers a loaded plugin under its own kind and name
    pub fn register_capability(&mut self, capability: Capability) -> bool {
        let kind = capability.kind();
        let name = capability.name().to_string();
        self.register(kind, &name, Ok(capability))
    }

    /// Gets a loaded plugin
    pub fn lookup(&self, kind: PluginKind, name: &str) -> Option<&Capability> {
        self.slots.get(&kind)?.get(name)?.as_ref()
    }

    /// Returns true if the name occupies a slot, loaded or not
    pub fn is_known(&self, kind: PluginKind, name: &str) -> bool {
        self.slots.get(&kind).is_some_and(|slots| slots.contains_key(name))
    }

    /// Lists names of a kind in enumeration order
    pub fn list(&self, kind: PluginKind, availability: Availability) -> Vec<&str> {
        let Some(slots) = self.slots.get(&kind) else {
            return Vec::new();
        };

        slots
            .iter()
            .filter(|(_, slot)| match availability {
                Availability::All => true,
                Availability::Available => slot.is_some(),
                Availability::DefaultEnabled => slot.as_ref().is_some_and(|c| c.default_enabled()),
            })
            .map(|(name, _)| name.as_str())
            .collect()
    }

    /// Loaded plugins of a kind in enumeration order
    pub fn available(&self, kind: PluginKind) -> impl Iterator<Item = &Capability> {
        self.slots
            .get(&kind)
            .into_iter()
            .flat_map(|slots| slots.values().flatten())
    }

    /// Describes every slot of a kind
    pub fn descriptors(&self, kind: PluginKind) -> Vec<PluginDescriptor> {
        let Some(slots) = self.slots.get(&kind) else {
            return Vec::new();
        };

        slots
            .iter()
            .map(|(name, slot)| PluginDescriptor {
                name: name.clone(),
                kind,
                categories: slot.as_ref().map(|c| c.categories().to_vec()).unwrap_or_default(),
                default_enabled: slot.as_ref().is_some_and(|c| c.default_enabled()),
                available: slot.is_some(),
                description: slot
                    .as_ref()
                    .map(|c| c.description().to_string())
                    .unwrap_or_default(),
            })
            .collect()
    }

    /// Adds a plugin directory to search
    pub fn add_plugin_dir(&mut self, dir: impl Into<PathBuf>) {
        self.plugin_dirs.push(dir.into());
    }

    /// Discovers executable plugins in the plugin directories, then `$PATH`
    pub fn discover(&mut self) {
        for dir in self.plugin_dirs.clone() {
            self.scan_directory(&dir);
        }

        if let Some(path_var) = std::env::var_os("PATH") {
            for dir in std::env::split_paths(&path_var) {
                self.scan_directory(&dir);
            }
        }
    }

    /// Scans a directory for plugin executables
    fn scan_directory(&mut self, dir: &Path) {
        let entries = match std::fs::read_dir(dir) {
            Ok(e) => e,
            Err(_) => return, // Ignore missing or unreadable directories
        };

        let mut found: Vec<(PluginKind, String, PathBuf)> = entries
            .flatten()
            .filter_map(|entry| {
                let path = entry.path();
                let file_name = path.file_name()?.to_str()?;
                let (kind, name) = parse_executable_name(file_name)?;
                is_executable(&path).then(|| (kind, name.to_string(), path.clone()))
            })
            .collect();

        // read_dir order is unspecified
        found.sort_by(|a, b| a.2.cmp(&b.2));

        for (kind, name, path) in found {
            if self.is_known(kind, &name) {
                continue;
            }

            tracing::debug!("Loading {} plugin '{}' from {}", kind, name, path.display());
            let candidate = ExternalPlugin::load(&path).and_then(ExternalPlugin::into_capability);
            self.register(kind, &name, candidate);
        }
    }
}

/// Splits `specrebase-<kind>-<name>` into kind and name
pub fn parse_executable_name(file_name: &str) -> Option<(PluginKind, &str)> {
    let rest = file_name.strip_prefix(EXECUTABLE_PREFIX)?;

    PluginKind::ALL.into_iter().find_map(|kind| {
        let name = rest.strip_prefix(kind.slug())?.strip_prefix('-')?;
        (!name.is_empty()).then_some((kind, name))
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::plugin::capability::{Plugin, Versioneer};
    use std::sync::Arc;
    use tempfile::TempDir;

    struct Fixed(&'static str);

    impl Plugin for Fixed {
        fn name(&self) -> &str {
            self.0
        }

        fn default_enabled(&self) -> bool {
            self.0 == "enabled"
        }
    }

    impl Versioneer for Fixed {
        fn run(&self, _package_name: &str) -> Result<Option<String>> {
            Ok(Some("1.0".to_string()))
        }
    }

    fn versioneer(name: &'static str) -> Result<Capability> {
        Ok(Capability::Versioneer(Arc::new(Fixed(name))))
    }

    #[test]
    fn new_registry_is_empty() {
        let registry = PluginRegistry::new();
        assert!(registry.list(PluginKind::Checker, Availability::All).is_empty());
    }

    #[test]
    fn register_and_lookup() {
        let mut registry = PluginRegistry::new();
        assert!(registry.register(PluginKind::Versioneer, "a", versioneer("a")));

        assert!(registry.lookup(PluginKind::Versioneer, "a").is_some());
        assert!(registry.lookup(PluginKind::Checker, "a").is_none());
    }

    #[test]
    fn failures_occupy_unavailable_slots() {
        let mut registry = PluginRegistry::new();
        assert!(!registry.register(
            PluginKind::Versioneer,
            "broken",
            Err(anyhow::anyhow!("import failed"))
        ));
        assert!(!registry.register(PluginKind::Checker, "wrong", versioneer("wrong")));

        assert!(registry.lookup(PluginKind::Versioneer, "broken").is_none());
        assert!(registry.is_known(PluginKind::Versioneer, "broken"));
        assert!(registry.is_known(PluginKind::Checker, "wrong"));
        assert!(!registry.is_known(PluginKind::Versioneer, "never"));
    }

    #[test]
    fn list_predicates_keep_enumeration_order() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginKind::Versioneer, "zeta", versioneer("zeta"));
        registry.register(PluginKind::Versioneer, "broken", Err(anyhow::anyhow!("x")));
        registry.register(PluginKind::Versioneer, "enabled", versioneer("enabled"));

        assert_eq!(
            registry.list(PluginKind::Versioneer, Availability::All),
            vec!["zeta", "broken", "enabled"]
        );
        assert_eq!(
            registry.list(PluginKind::Versioneer, Availability::Available),
            vec!["zeta", "enabled"]
        );
        assert_eq!(
            registry.list(PluginKind::Versioneer, Availability::DefaultEnabled),
            vec!["enabled"]
        );
    }

    #[test]
    fn first_registration_wins() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginKind::Versioneer, "a", Err(anyhow::anyhow!("x")));
        assert!(!registry.register(PluginKind::Versioneer, "a", versioneer("a")));
        assert!(registry.lookup(PluginKind::Versioneer, "a").is_none());
    }

    #[test]
    fn builtins_are_registered() {
        let registry = PluginRegistry::with_builtins();

        assert!(registry.lookup(PluginKind::SpecHook, "pypi-url-fix").is_some());
        assert!(registry.lookup(PluginKind::SpecHook, "replace-old-version").is_some());
        assert!(registry.lookup(PluginKind::BuildLogHook, "files").is_some());
        assert!(registry.lookup(PluginKind::Checker, "rpmlint").is_some());
        assert!(registry.lookup(PluginKind::Checker, "abipkgdiff").is_some());
        assert!(registry.lookup(PluginKind::Versioneer, "rubygems").is_some());
        assert!(registry.lookup(PluginKind::BuildTool, "rpmbuild").is_some());
        assert!(registry.lookup(PluginKind::BuildTool, "mock").is_some());
        assert!(registry.lookup(PluginKind::SrpmBuildTool, "rpmbuild").is_some());
        assert!(registry.lookup(PluginKind::SrpmBuildTool, "mock").is_some());
        assert!(registry.lookup(PluginKind::OutputTool, "text").is_some());
        assert!(registry.lookup(PluginKind::OutputTool, "json").is_some());
    }

    #[test]
    fn descriptors_report_availability() {
        let mut registry = PluginRegistry::new();
        registry.register(PluginKind::Versioneer, "ok", versioneer("ok"));
        registry.register(PluginKind::Versioneer, "broken", Err(anyhow::anyhow!("x")));

        let descriptors = registry.descriptors(PluginKind::Versioneer);
        assert!(descriptors[0].available);
        assert!(!descriptors[1].available);
    }

    #[test]
    fn executable_names() {
        assert_eq!(
            parse_executable_name("specrebase-versioneer-pypi"),
            Some((PluginKind::Versioneer, "pypi"))
        );
        assert_eq!(
            parse_executable_name("specrebase-srpm-build-tool-mock"),
            Some((PluginKind::SrpmBuildTool, "mock"))
        );
        assert_eq!(
            parse_executable_name("specrebase-build-log-hook-files"),
            Some((PluginKind::BuildLogHook, "files"))
        );
        assert_eq!(parse_executable_name("specrebase-versioneer-"), None);
        assert_eq!(parse_executable_name("specrebase-linter-x"), None);
        assert_eq!(parse_executable_name("rpmdev-sync-github"), None);
    }

    #[test]
    fn discover_empty_dir() {
        let dir = TempDir::new().unwrap();
        let mut registry = PluginRegistry::new();
        registry.add_plugin_dir(dir.path());
        registry.scan_directory(dir.path());

        assert!(registry.list(PluginKind::Checker, Availability::All).is_empty());
    }

    #[test]
    fn name_mismatch_is_unavailable() {
        let mut registry = PluginRegistry::new();
        assert!(!registry.register(PluginKind::Versioneer, "foo", versioneer("bar")));

        assert!(registry.is_known(PluginKind::Versioneer, "foo"));
        assert!(registry.lookup(PluginKind::Versioneer, "foo").is_none());
        assert!(!registry.is_known(PluginKind::Versioneer, "bar"));
    }

    #[cfg(unix)]
    #[test]
    fn discovered_manifest_must_match_file_name() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        for (file, declared) in [("specrebase-versioneer-foo", "bar"), ("specrebase-versioneer-ok", "ok")] {
            let path = dir.path().join(file);
            let script = format!(
                "#!/bin/sh\necho '{{\"name\": \"{}\", \"version\": \"1\", \"kind\": \"versioneer\"}}'\n",
                declared
            );
            std::fs::write(&path, script).unwrap();
            std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();
        }

        let mut registry = PluginRegistry::new();
        registry.scan_directory(dir.path());

        assert_eq!(registry.list(PluginKind::Versioneer, Availability::All), vec!["foo", "ok"]);
        assert_eq!(registry.list(PluginKind::Versioneer, Availability::Available), vec!["ok"]);
    }

    #[cfg(unix)]
    #[test]
    fn discover_broken_executable_is_unavailable() {
        use std::os::unix::fs::PermissionsExt;

        let dir = TempDir::new().unwrap();
        let path = dir.path().join("specrebase-checker-broken");
        std::fs::write(&path, "#!/bin/sh\nexit 1\n").unwrap();
        std::fs::set_permissions(&path, std::fs::Permissions::from_mode(0o755)).unwrap();

        let mut registry = PluginRegistry::new();
        registry.scan_directory(dir.path());

        assert!(registry.is_known(PluginKind::Checker, "broken"));
        assert!(registry.lookup(PluginKind::Checker, "broken").is_none());
    }
}
