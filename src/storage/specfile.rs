//! Spec file on disk
//!
//! [`SpecFile`] couples parsed [`SpecContent`] with the path it is saved to.
//! The original spec is loaded once and never written; every mutation goes
//! to a working copy created with [`SpecFile::working_copy`]. Writes are
//! atomic (temp file + rename).

use std::collections::BTreeMap;
use std::ffi::OsString;
use std::fs;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};

use super::tools::{Fetcher, PatchInspector};
use crate::domain::{
    is_git_generated, parse_directive, MacroTable, PackageCategory, PatchDirective, PatchRecord,
    SourceEntry, SourceRole, SpecContent, SpecError,
};

/// Directives that apply every declared patch in declaration order
const AUTOPATCH_MACROS: &[&str] = &["%autosetup", "%autopatch"];

const SOURCE_LIST: &str = "%sourcelist";
const PATCH_LIST: &str = "%patchlist";

/// A spec file and its parsed content
#[derive(Debug, Clone)]
pub struct SpecFile {
    path: PathBuf,
    content: SpecContent,

    /// Runtime-only artifacts (role `Generated`), never persisted
    generated: Vec<SourceEntry>,
}

impl SpecFile {
    /// Loads a spec file from disk; the stored path is made absolute
    pub fn load(path: impl Into<PathBuf>) -> Result<Self> {
        let path = path.into();
        let text = fs::read_to_string(&path)
            .with_context(|| format!("Failed to read spec file: {}", path.display()))?;
        let path = std::path::absolute(&path)
            .with_context(|| format!("Failed to resolve spec path: {}", path.display()))?;

        Ok(Self::from_text(path, &text))
    }

    /// Builds a spec file from text without touching the disk
    pub fn from_text(path: impl Into<PathBuf>, text: &str) -> Self {
        Self {
            path: path.into(),
            content: SpecContent::parse(text),
            generated: Vec::new(),
        }
    }

    /// Writes a copy of this spec into `dest_dir` and returns it.
    ///
    /// The copy keeps the file name; `self` is left untouched.
    pub fn working_copy(&self, dest_dir: &Path) -> Result<SpecFile> {
        let file_name = self
            .path
            .file_name()
            .ok_or_else(|| anyhow::anyhow!("Spec path has no file name: {}", self.path.display()))?;
        let dest = dest_dir.join(file_name);
        let dest = std::path::absolute(&dest)
            .with_context(|| format!("Failed to resolve path: {}", dest.display()))?;

        if dest == self.path {
            anyhow::bail!(
                "Working copy would overwrite the original spec: {}",
                dest.display()
            );
        }

        fs::create_dir_all(dest_dir)
            .with_context(|| format!("Failed to create directory: {}", dest_dir.display()))?;

        let copy = SpecFile {
            path: dest,
            content: self.content.clone(),
            generated: Vec::new(),
        };
        copy.save()?;

        Ok(copy)
    }

    /// Path this spec is saved to
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Directory containing the spec file, `.` for a bare file name
    pub fn dir(&self) -> &Path {
        self.path
            .parent()
            .filter(|dir| !dir.as_os_str().is_empty())
            .unwrap_or_else(|| Path::new("."))
    }

    pub fn content(&self) -> &SpecContent {
        &self.content
    }

    pub fn content_mut(&mut self) -> &mut SpecContent {
        &mut self.content
    }

    /// Renders the current content
    pub fn render(&self) -> String {
        self.content.render()
    }

    /// Writes the content to disk atomically (temp file + rename)
    pub fn save(&self) -> Result<()> {
        let mut temp_name = OsString::from(self.path.as_os_str());
        temp_name.push(".tmp");
        let temp_path = PathBuf::from(temp_name);

        fs::write(&temp_path, self.content.render())
            .with_context(|| format!("Failed to write temp file: {}", temp_path.display()))?;

        fs::rename(&temp_path, &self.path).with_context(|| {
            format!(
                "Failed to rename {} to {}",
                temp_path.display(),
                self.path.display()
            )
        })?;

        Ok(())
    }

    /// Macro table of the current content
    pub fn macros(&self) -> MacroTable {
        MacroTable::from_content(&self.content)
    }

    /// Expanded value of a preamble tag
    pub fn tag(&self, name: &str) -> Option<String> {
        let macros = self.macros();
        self.content.tag(name).map(|value| macros.expand(value))
    }

    /// Expanded package name
    pub fn package_name(&self) -> Option<String> {
        self.tag("Name")
    }

    /// Expanded version
    pub fn version(&self) -> Option<String> {
        self.tag("Version")
    }

    /// Expanded release
    pub fn release(&self) -> Option<String> {
        self.tag("Release")
    }

    /// `name-version-release`, when all three are declared
    pub fn nvr(&self) -> Option<String> {
        Some(format!(
            "{}-{}-{}",
            self.package_name()?,
            self.version()?,
            self.release()?
        ))
    }

    /// Sets the `Version` tag
    pub fn set_version(&mut self, version: &str) -> Result<(), SpecError> {
        self.content.set_tag("Version", version)
    }

    /// Sets the `Release` tag
    pub fn set_release(&mut self, release: &str) -> Result<(), SpecError> {
        self.content.set_tag("Release", release)
    }

    /// Ecosystem category of the package
    pub fn category(&self) -> Option<PackageCategory> {
        PackageCategory::detect(self.package_name().as_deref(), &self.content)
    }

    /// Registers an artifact produced during the rebase
    pub fn add_generated_source(&mut self, locator: impl Into<String>) -> SourceEntry {
        let index = self.generated.len() as u32;
        let entry = SourceEntry::new(locator, index, SourceRole::Generated);
        self.generated.push(entry.clone());
        entry
    }

    /// All declared artifacts in declaration order, locators macro-expanded.
    ///
    /// Entries of `%sourcelist` / `%patchlist` sections are numbered after
    /// the highest explicit index of their role. Generated artifacts come last.
    pub fn sources(&self) -> Vec<SourceEntry> {
        let macros = self.macros();
        let mut entries = Vec::new();

        for section in self.content.sections().iter().filter(|s| s.is_package()) {
            for line in &section.lines {
                if let Some(mut entry) = SourceEntry::parse_declaration(line) {
                    entry.locator = macros.expand(&entry.locator);
                    entries.push(entry);
                }
            }
        }

        for (keyword, role) in [(SOURCE_LIST, SourceRole::Source), (PATCH_LIST, SourceRole::Patch)] {
            let mut next = self.first_listed_index(role);

            for section in self.content.sections_of(keyword) {
                for line in &section.lines {
                    let Some(locator) = listed_locator(line) else {
                        continue;
                    };
                    entries.push(SourceEntry::new(macros.expand(locator), next, role));
                    next += 1;
                }
            }
        }

        entries.extend(self.generated.iter().cloned());
        entries
    }

    /// Index given to the first `%sourcelist` / `%patchlist` entry of `role`
    fn first_listed_index(&self, role: SourceRole) -> u32 {
        self.content
            .sections()
            .iter()
            .filter(|s| s.is_package())
            .flat_map(|s| s.lines.iter())
            .filter_map(|line| SourceEntry::parse_declaration(line))
            .filter(|e| e.role == role)
            .map(|e| e.index + 1)
            .max()
            .unwrap_or(0)
    }

    /// `%patch` directives keyed by patch number
    pub fn patch_directives(&self) -> BTreeMap<u32, PatchDirective> {
        PatchDirective::collect(self.content.lines())
    }

    /// Returns true if patches are applied by `%autosetup` / `%autopatch`
    pub fn uses_autopatch(&self) -> bool {
        self.content.lines().any(|line| {
            let line = line.trim_start();
            AUTOPATCH_MACROS.iter().any(|m| {
                line.strip_prefix(m)
                    .is_some_and(|rest| rest.is_empty() || rest.starts_with(char::is_whitespace))
            })
        })
    }

    /// Resolves patch declarations to absolute paths under `base_dir`.
    ///
    /// Missing files are logged and skipped. Patches without a directive are
    /// skipped with a warning unless `%autosetup`/`%autopatch` applies them,
    /// in which case they follow the directive-applied ones in declaration order.
    pub fn patch_records(&self, base_dir: &Path) -> BTreeMap<u32, PatchRecord> {
        let directives = self.patch_directives();
        let autopatch = self.uses_autopatch();
        let mut next_auto_order = directives.len();
        let mut records = BTreeMap::new();
        let base_dir = std::path::absolute(base_dir).unwrap_or_else(|_| base_dir.to_path_buf());

        for entry in self.sources().into_iter().filter(|e| e.role == SourceRole::Patch) {
            let path = if entry.is_remote() {
                base_dir.join(entry.file_name())
            } else {
                base_dir.join(&entry.locator)
            };

            if !path.exists() {
                tracing::warn!("Patch {} does not exist", path.display());
                continue;
            }

            let (flags, apply_order) = match directives.get(&entry.index) {
                Some(directive) => (directive.flags.clone(), directive.apply_order),
                None if autopatch => {
                    next_auto_order += 1;
                    (String::new(), next_auto_order - 1)
                }
                None => {
                    tracing::warn!("Patch{} is declared but never applied", entry.index);
                    continue;
                }
            };

            let git_generated = match is_git_generated(&path) {
                Ok(generated) => generated,
                Err(e) => {
                    tracing::warn!("Failed to read patch {}: {}", path.display(), e);
                    continue;
                }
            };

            records.insert(
                entry.index,
                PatchRecord {
                    path,
                    flags,
                    apply_order,
                    git_generated,
                },
            );
        }

        records
    }

    /// Resolves sources (role `Source` and `Generated`) to local paths under `base_dir`.
    ///
    /// Remote sources are downloaded when a fetcher is given and the file is
    /// not present yet. Download failures propagate.
    pub fn resolve_sources(&self, base_dir: &Path, fetcher: Option<&dyn Fetcher>) -> Result<Vec<PathBuf>> {
        let mut paths = Vec::new();

        for entry in self.sources().into_iter().filter(|e| e.role != SourceRole::Patch) {
            let local = base_dir.join(entry.file_name());

            if entry.is_remote() && !local.exists() {
                if let Some(fetcher) = fetcher {
                    fetcher
                        .fetch(&entry.locator, &local)
                        .with_context(|| format!("Failed to fetch Source{}", entry.index))?;
                }
            }

            paths.push(local);
        }

        Ok(paths)
    }

    /// Rewrites patch declarations for a new set of patches and saves.
    ///
    /// For every `PatchN:` line and `%patchlist` entry whose number is in
    /// `patches`: an empty patch gets the declaration commented out and is
    /// removed from `patches`; otherwise the trailing file name is replaced
    /// with the new patch's file name. A second pass comments out the
    /// `%patch` directives of the removed patches. Returns the removed patch
    /// numbers.
    pub fn write_updated_patches(
        &mut self,
        patches: &mut BTreeMap<u32, PatchRecord>,
        inspector: &dyn PatchInspector,
    ) -> Result<Vec<u32>> {
        let mut removed = Vec::new();
        let mut next_listed = self.first_listed_index(SourceRole::Patch);

        for section in self.content.sections_mut().iter_mut().filter(|s| s.is_package()) {
            for line in section.lines.iter_mut() {
                let Some(entry) = SourceEntry::parse_declaration(line) else {
                    continue;
                };
                if entry.role == SourceRole::Patch {
                    update_declaration(line, entry.index, patches, inspector, &mut removed);
                }
            }
        }

        for section in self.content.sections_mut().iter_mut().filter(|s| s.is(PATCH_LIST)) {
            for line in section.lines.iter_mut() {
                if listed_locator(line).is_none() {
                    continue;
                }
                update_declaration(line, next_listed, patches, inspector, &mut removed);
                next_listed += 1;
            }
        }

        if !removed.is_empty() {
            for section in self.content.sections_mut() {
                for line in section.lines.iter_mut() {
                    if parse_directive(line).is_some_and(|(n, _)| removed.contains(&n)) {
                        *line = format!("#{}", line);
                    }
                }
            }
        }

        self.save()?;
        Ok(removed)
    }
}

/// Locator of a `%sourcelist` / `%patchlist` line, skipping blanks and comments
fn listed_locator(line: &str) -> Option<&str> {
    let locator = line.trim();
    (!locator.is_empty() && !locator.starts_with('#')).then_some(locator)
}

/// Comments out or renames one patch declaration line
fn update_declaration(
    line: &mut String,
    number: u32,
    patches: &mut BTreeMap<u32, PatchRecord>,
    inspector: &dyn PatchInspector,
    removed: &mut Vec<u32>,
) {
    let Some(record) = patches.get(&number) else {
        tracing::debug!("Patch{} has no updated patch, leaving it untouched", number);
        return;
    };

    if inspector.is_empty(&record.path) {
        tracing::info!("Removing empty patch {}", record.path.display());
        *line = format!("#{}", line);
        removed.push(number);
        patches.remove(&number);
    } else {
        *line = replace_last_token(line, &record.file_name());
    }
}

/// Replaces the last whitespace-separated token, keeping surrounding whitespace
fn replace_last_token(line: &str, replacement: &str) -> String {
    let trimmed = line.trim_end();
    let token_start = trimmed
        .rfind(char::is_whitespace)
        .map(|i| i + trimmed[i..].chars().next().map_or(1, char::len_utf8))
        .unwrap_or(0);

    format!("{}{}{}", &line[..token_start], replacement, &line[trimmed.len()..])
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    const SPEC: &str = "\
%global srcname hello
Name:           python-%{srcname}
Version:        1.0
Release:        1%{?dist}
Source0:        https://example.com/%{srcname}-%{version}.tar.gz
Source1:        extra.conf
Patch0:         fix.patch
Patch3:         empty.patch
Patch4:         orphan.patch

%description
Hello.

%prep
%setup -q
%patch0 -p1
# comment between
%patch3 -p1 -b .empty

%files
/usr/bin/hello
";

    struct NamedEmpty(&'static str);

    impl PatchInspector for NamedEmpty {
        fn is_empty(&self, patch: &Path) -> bool {
            patch.file_name().is_some_and(|n| n == self.0)
        }
    }

    struct RecordingFetcher(std::cell::RefCell<Vec<String>>);

    impl Fetcher for RecordingFetcher {
        fn fetch(&self, url: &str, dest: &Path) -> Result<()> {
            self.0.borrow_mut().push(url.to_string());
            fs::write(dest, "tarball")?;
            Ok(())
        }
    }

    fn setup() -> (TempDir, SpecFile) {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("hello.spec");
        fs::write(&path, SPEC).unwrap();
        fs::write(dir.path().join("fix.patch"), "diff --git a/x b/x\n--- a/x\n+++ b/x\n").unwrap();
        fs::write(dir.path().join("empty.patch"), "").unwrap();
        fs::write(dir.path().join("orphan.patch"), "diff -u a b\n").unwrap();
        let spec = SpecFile::load(&path).unwrap();
        (dir, spec)
    }

    #[test]
    fn load_and_render_round_trip() {
        let (_dir, spec) = setup();
        assert_eq!(spec.render(), SPEC);
    }

    #[test]
    fn expanded_metadata() {
        let (_dir, spec) = setup();
        assert_eq!(spec.package_name().as_deref(), Some("python-hello"));
        assert_eq!(spec.nvr().as_deref(), Some("python-hello-1.0-1"));
        assert_eq!(spec.category(), Some(PackageCategory::Python));
    }

    #[test]
    fn sources_in_declaration_order() {
        let (_dir, spec) = setup();
        let sources = spec.sources();

        assert_eq!(sources.len(), 5);
        assert_eq!(sources[0].locator, "https://example.com/hello-1.0.tar.gz");
        assert_eq!(sources[0].role, SourceRole::Source);
        assert_eq!(sources[2], SourceEntry::new("fix.patch", 0, SourceRole::Patch));
        assert_eq!(sources[3].index, 3);
    }

    #[test]
    fn patch_list_sections_are_auto_numbered() {
        let spec = SpecFile::from_text(
            "x.spec",
            "Name: x\nPatch2: a.patch\n%patchlist\nb.patch\n\nc.patch\n%prep\n%autosetup -p1\n",
        );
        let patches: Vec<_> = spec
            .sources()
            .into_iter()
            .filter(|e| e.role == SourceRole::Patch)
            .map(|e| (e.index, e.locator))
            .collect();

        assert_eq!(
            patches,
            vec![
                (2, "a.patch".to_string()),
                (3, "b.patch".to_string()),
                (4, "c.patch".to_string())
            ]
        );
    }

    #[test]
    fn patch_records_resolve_existing_patches() {
        let (dir, spec) = setup();
        let records = spec.patch_records(dir.path());

        let fix = &records[&0];
        assert_eq!(fix.path, dir.path().join("fix.patch"));
        assert_eq!(fix.flags, "-p1");
        assert_eq!(fix.apply_order, 0);
        assert!(fix.git_generated);

        assert_eq!(records[&3].flags, "-b .empty");
        assert_eq!(records[&3].apply_order, 1);

        // Patch4 has no directive
        assert!(!records.contains_key(&4));
    }

    #[test]
    fn patch_records_are_absolute() {
        let spec = SpecFile::from_text("x.spec", "Patch0: fix.patch\n%prep\n%patch0 -p1\n");
        assert_eq!(spec.dir(), Path::new("."));

        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("fix.patch"), "diff --git a/x b/x\n").unwrap();
        let relative = relative_to_cwd(dir.path());
        let records = spec.patch_records(&relative);

        assert!(records[&0].path.is_absolute());
        assert!(records[&0].path.ends_with("fix.patch"));
    }

    /// `dir` relative to the current directory, through `..` components
    fn relative_to_cwd(dir: &Path) -> PathBuf {
        let cwd = std::env::current_dir().unwrap();
        let mut relative: PathBuf = cwd.components().skip(1).map(|_| "..").collect();
        relative.push(dir.strip_prefix("/").unwrap());
        relative
    }

    #[test]
    fn patch_records_skip_missing_files() {
        let (dir, spec) = setup();
        fs::remove_file(dir.path().join("fix.patch")).unwrap();

        let records = spec.patch_records(dir.path());
        assert!(!records.contains_key(&0));
        assert!(records.contains_key(&3));
    }

    #[test]
    fn autopatch_orders_undirected_patches() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.patch"), "diff --git a/x b/x\n").unwrap();
        fs::write(dir.path().join("b.patch"), "diff -u x y\n").unwrap();
        let spec = SpecFile::from_text(
            dir.path().join("x.spec"),
            "Name: x\nPatch0: a.patch\nPatch1: b.patch\n%prep\n%autosetup -p1\n",
        );

        let records = spec.patch_records(dir.path());
        assert_eq!(records[&0].apply_order, 0);
        assert_eq!(records[&1].apply_order, 1);
        assert!(!records[&1].git_generated);
    }

    #[test]
    fn resolve_sources_fetches_missing_remote_only() {
        let (dir, spec) = setup();
        let fetcher = RecordingFetcher(Default::default());

        let paths = spec.resolve_sources(dir.path(), Some(&fetcher)).unwrap();
        assert_eq!(
            paths,
            vec![dir.path().join("hello-1.0.tar.gz"), dir.path().join("extra.conf")]
        );
        assert_eq!(fetcher.0.borrow().len(), 1);

        // Second resolution finds the file already present
        spec.resolve_sources(dir.path(), Some(&fetcher)).unwrap();
        assert_eq!(fetcher.0.borrow().len(), 1);
    }

    #[test]
    fn generated_sources_are_listed_but_not_saved() {
        let (dir, mut spec) = setup();
        let entry = spec.add_generated_source("hello-2.0.tar.gz");
        assert_eq!(entry.role, SourceRole::Generated);

        let paths = spec.resolve_sources(dir.path(), None).unwrap();
        assert_eq!(paths.last(), Some(&dir.path().join("hello-2.0.tar.gz")));

        spec.save().unwrap();
        assert_eq!(fs::read_to_string(spec.path()).unwrap(), SPEC);
    }

    #[test]
    fn working_copy_leaves_original_untouched() {
        let (dir, spec) = setup();
        let mut copy = spec.working_copy(&dir.path().join("rebased")).unwrap();
        copy.set_version("2.0").unwrap();
        copy.save().unwrap();

        assert_eq!(fs::read_to_string(spec.path()).unwrap(), SPEC);
        assert_eq!(SpecFile::load(copy.path()).unwrap().version().as_deref(), Some("2.0"));
    }

    #[test]
    fn working_copy_refuses_same_path() {
        let (dir, spec) = setup();
        assert!(spec.working_copy(dir.path()).is_err());
    }

    #[test]
    fn write_updated_patches_prunes_empty_patch() {
        let (dir, spec) = setup();
        let mut working = spec.working_copy(&dir.path().join("rebased")).unwrap();
        let mut patches = spec.patch_records(dir.path());

        let removed = working
            .write_updated_patches(&mut patches, &NamedEmpty("empty.patch"))
            .unwrap();

        assert_eq!(removed, vec![3]);
        assert!(!patches.contains_key(&3));
        assert!(patches.contains_key(&0));

        let saved = fs::read_to_string(working.path()).unwrap();
        assert!(saved.contains("\n#Patch3:         empty.patch\n"));
        assert!(saved.contains("\n#%patch3 -p1 -b .empty\n"));
        assert!(saved.contains("\nPatch0:         fix.patch\n"));
        assert!(saved.contains("\n%patch0 -p1\n"));
        assert!(saved.contains("\nPatch4:         orphan.patch\n"));
    }

    #[test]
    fn write_updated_patches_renames_to_new_basename() {
        let (dir, spec) = setup();
        let mut working = spec.working_copy(&dir.path().join("rebased")).unwrap();
        let mut patches = spec.patch_records(dir.path());
        let renamed = patches.get_mut(&0).unwrap();
        renamed.path = dir.path().join("rebased").join("fix-rebased.patch");

        working
            .write_updated_patches(&mut patches, &NamedEmpty("none"))
            .unwrap();

        let saved = fs::read_to_string(working.path()).unwrap();
        assert!(saved.contains("\nPatch0:         fix-rebased.patch\n"));
        assert_eq!(working.patch_directives()[&0].flags, "-p1");
    }

    #[test]
    fn removal_does_not_touch_similar_numbers() {
        let dir = TempDir::new().unwrap();
        let mut spec = SpecFile::from_text(
            dir.path().join("x.spec"),
            "Patch1: one.patch\nPatch10: ten.patch\n%prep\n%patch1 -p1\n%patch10 -p1\n",
        );
        let mut patches = BTreeMap::new();
        patches.insert(
            1,
            PatchRecord {
                path: PathBuf::from("/tmp/one.patch"),
                flags: "-p1".to_string(),
                apply_order: 0,
                git_generated: false,
            },
        );

        let removed = spec
            .write_updated_patches(&mut patches, &NamedEmpty("one.patch"))
            .unwrap();

        assert_eq!(removed, vec![1]);
        assert_eq!(
            spec.render(),
            "#Patch1: one.patch\nPatch10: ten.patch\n%prep\n#%patch1 -p1\n%patch10 -p1\n"
        );
    }

    #[test]
    fn write_updated_patches_prunes_patch_list_entries() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("a.patch"), "diff -u a b\n").unwrap();
        fs::write(dir.path().join("b.patch"), "").unwrap();
        fs::write(dir.path().join("c.patch"), "diff -u c d\n").unwrap();
        let mut spec = SpecFile::from_text(
            dir.path().join("x.spec"),
            "Name: x\nPatch2: a.patch\n%patchlist\nb.patch\n\nc.patch\n%prep\n%autosetup -p1\n",
        );
        let mut patches = spec.patch_records(dir.path());
        patches.get_mut(&4).unwrap().path = dir.path().join("c-rebased.patch");

        let removed = spec
            .write_updated_patches(&mut patches, &NamedEmpty("b.patch"))
            .unwrap();

        assert_eq!(removed, vec![3]);
        assert_eq!(patches.keys().copied().collect::<Vec<_>>(), vec![2, 4]);
        assert_eq!(
            spec.render(),
            "Name: x\nPatch2: a.patch\n%patchlist\n#b.patch\n\nc-rebased.patch\n%prep\n%autosetup -p1\n"
        );
    }

    #[test]
    fn write_updated_patches_empties_single_patch_list() {
        let dir = TempDir::new().unwrap();
        fs::write(dir.path().join("b.patch"), "").unwrap();
        let mut spec = SpecFile::from_text(
            dir.path().join("x.spec"),
            "Name: x\n%patchlist\nb.patch\n%prep\n%autosetup -p1\n",
        );
        let mut patches = spec.patch_records(dir.path());

        let removed = spec
            .write_updated_patches(&mut patches, &NamedEmpty("b.patch"))
            .unwrap();

        assert_eq!(removed, vec![0]);
        assert!(patches.is_empty());
        assert!(spec.sources().iter().all(|e| e.role != SourceRole::Patch));
    }

    #[test]
    fn replace_last_token_keeps_whitespace() {
        assert_eq!(replace_last_token("Patch0:   a.patch  ", "b.patch"), "Patch0:   b.patch  ");
        assert_eq!(replace_last_token("Patch0:\ta.patch", "b.patch"), "Patch0:\tb.patch");
    }
}
