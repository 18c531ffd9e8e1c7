//! Package and checker categories
//!
//! A [`PackageCategory`] tags the ecosystem a package belongs to; plugins
//! declare the categories they apply to. A [`CheckerCategory`] says which
//! build artifacts a checker inspects.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};

use super::spec::SpecContent;

/// Ecosystem a package belongs to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PackageCategory {
    Python,
    Ruby,
    Perl,
    Nodejs,
    Golang,
    Rust,
    R,
    Haskell,
}

/// Name prefixes used by Fedora packaging guidelines
const NAME_PREFIXES: &[(&str, PackageCategory)] = &[
    ("python-", PackageCategory::Python),
    ("python2-", PackageCategory::Python),
    ("python3-", PackageCategory::Python),
    ("rubygem-", PackageCategory::Ruby),
    ("perl-", PackageCategory::Perl),
    ("nodejs-", PackageCategory::Nodejs),
    ("golang-", PackageCategory::Golang),
    ("rust-", PackageCategory::Rust),
    ("R-", PackageCategory::R),
    ("ghc-", PackageCategory::Haskell),
];

/// Build dependencies that identify an ecosystem
const BUILD_REQUIRES: &[(&str, PackageCategory)] = &[
    ("python3-devel", PackageCategory::Python),
    ("python2-devel", PackageCategory::Python),
    ("python-devel", PackageCategory::Python),
    ("ruby-devel", PackageCategory::Ruby),
    ("rubygems-devel", PackageCategory::Ruby),
    ("perl-devel", PackageCategory::Perl),
    ("perl-generators", PackageCategory::Perl),
    ("nodejs-devel", PackageCategory::Nodejs),
    ("nodejs-packaging", PackageCategory::Nodejs),
    ("golang", PackageCategory::Golang),
    ("go-rpm-macros", PackageCategory::Golang),
    ("cargo-rpm-macros", PackageCategory::Rust),
    ("rust-packaging", PackageCategory::Rust),
    ("R-devel", PackageCategory::R),
    ("ghc-rpm-macros", PackageCategory::Haskell),
];

impl PackageCategory {
    pub fn as_str(&self) -> &'static str {
        match self {
            PackageCategory::Python => "python",
            PackageCategory::Ruby => "ruby",
            PackageCategory::Perl => "perl",
            PackageCategory::Nodejs => "nodejs",
            PackageCategory::Golang => "golang",
            PackageCategory::Rust => "rust",
            PackageCategory::R => "r",
            PackageCategory::Haskell => "haskell",
        }
    }

    /// Detects the category from an expanded package name
    pub fn from_package_name(name: &str) -> Option<Self> {
        NAME_PREFIXES
            .iter()
            .find(|(prefix, _)| name.starts_with(prefix))
            .map(|(_, category)| *category)
    }

    /// Detects the category of a spec: package name first, then `BuildRequires`
    pub fn detect(package_name: Option<&str>, content: &SpecContent) -> Option<Self> {
        if let Some(category) = package_name.and_then(Self::from_package_name) {
            return Some(category);
        }

        content
            .tag_values("BuildRequires")
            .into_iter()
            .flat_map(|value| value.split([',', ' ']))
            .filter(|dep| !dep.is_empty())
            .find_map(|dep| {
                BUILD_REQUIRES
                    .iter()
                    .find(|(name, _)| *name == dep)
                    .map(|(_, category)| *category)
            })
    }
}

impl fmt::Display for PackageCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PackageCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "python" => Ok(PackageCategory::Python),
            "ruby" => Ok(PackageCategory::Ruby),
            "perl" => Ok(PackageCategory::Perl),
            "nodejs" => Ok(PackageCategory::Nodejs),
            "golang" | "go" => Ok(PackageCategory::Golang),
            "rust" => Ok(PackageCategory::Rust),
            "r" => Ok(PackageCategory::R),
            "haskell" => Ok(PackageCategory::Haskell),
            other => Err(format!("Unknown package category: {}", other)),
        }
    }
}

/// Which artifacts a checker inspects
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum CheckerCategory {
    Source,
    Srpm,
    Rpm,
}

impl fmt::Display for CheckerCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CheckerCategory::Source => f.write_str("SOURCE"),
            CheckerCategory::Srpm => f.write_str("SRPM"),
            CheckerCategory::Rpm => f.write_str("RPM"),
        }
    }
}

impl FromStr for CheckerCategory {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "SOURCE" => Ok(CheckerCategory::Source),
            "SRPM" => Ok(CheckerCategory::Srpm),
            "RPM" => Ok(CheckerCategory::Rpm),
            other => Err(format!("Unknown checker category: {}", other)),
        }
    }
}
