//! Builtin plugins
//!
//! | Kind | Name | Purpose |
//! |------|------|---------|
//! | Spec hook | `pypi-url-fix` | Rewrites obsolete PyPI URLs |
//! | Spec hook | `replace-old-version` | Replaces leftover old version strings |
//! | Spec hook | `paths-to-rpm-macros` | Turns absolute `%files` paths into path macros |
//! | Build-log hook | `files` | Fixes `%files` after unpackaged/missing file errors |
//! | Checker | `rpmlint` | Lints the built packages |
//! | Checker | `abipkgdiff` | Compares the ABI of old and new packages |
//! | Versioneer | `rubygems` | Latest gem version from rubygems.org |
//! | Build tool | `rpmbuild` | Binary packages with `rpmbuild -bb` |
//! | Build tool | `mock` | Binary packages rebuilt in a mock chroot |
//! | SRPM build tool | `rpmbuild` | Source package with `rpmbuild -bs` |
//! | SRPM build tool | `mock` | Source package with `mock --buildsrpm` |
//! | Output tool | `text`, `json` | Final report |

mod abipkgdiff;
mod files_hook;
mod mock;
mod output;
mod paths_to_macros;
mod pypi_url_fix;
mod replace_old_version;
mod rpmbuild;
mod rpmlint;
mod rubygems;

use std::sync::Arc;

pub use abipkgdiff::AbiPkgDiff;
pub use files_hook::FilesHook;
pub use mock::Mock;
pub use output::{JsonOutput, TextOutput};
pub use paths_to_macros::PathsToMacros;
pub use pypi_url_fix::PypiUrlFix;
pub use replace_old_version::ReplaceOldVersion;
pub use rpmbuild::Rpmbuild;
pub use rpmlint::Rpmlint;
pub use rubygems::RubyGems;

use super::capability::Capability;
use super::protocol::PluginKind;
use super::registry::PluginRegistry;

/// Registers every builtin plugin
pub fn register_all(registry: &mut PluginRegistry) {
    registry.register(
        PluginKind::SpecHook,
        pypi_url_fix::NAME,
        PypiUrlFix::new().map(|p| Capability::SpecHook(Arc::new(p))),
    );
    registry.register_capability(Capability::SpecHook(Arc::new(ReplaceOldVersion)));
    registry.register_capability(Capability::SpecHook(Arc::new(PathsToMacros)));

    registry.register_capability(Capability::BuildLogHook(Arc::new(FilesHook)));

    registry.register(
        PluginKind::Checker,
        rpmlint::NAME,
        Rpmlint::new().map(|p| Capability::Checker(Arc::new(p))),
    );
    registry.register_capability(Capability::Checker(Arc::new(AbiPkgDiff::default())));

    registry.register(
        PluginKind::Versioneer,
        rubygems::NAME,
        RubyGems::new().map(|p| Capability::Versioneer(Arc::new(p))),
    );

    registry.register_capability(Capability::BuildTool(Arc::new(Rpmbuild::default())));
    registry.register_capability(Capability::BuildTool(Arc::new(Mock::default())));
    registry.register_capability(Capability::SrpmBuildTool(Arc::new(Rpmbuild::default())));
    registry.register_capability(Capability::SrpmBuildTool(Arc::new(Mock::default())));

    registry.register_capability(Capability::OutputTool(Arc::new(TextOutput)));
    registry.register_capability(Capability::OutputTool(Arc::new(JsonOutput)));
}
