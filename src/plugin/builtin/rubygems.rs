//! Latest versions from rubygems.org
//!
//! Queries `<api>/<gem>.json`. Fedora packages gems as `rubygem-<gem>`, so
//! a failed lookup is retried without that prefix.

use std::time::Duration;

use anyhow::{Context, Result};
use reqwest::blocking::Client;
use serde::Deserialize;

use crate::domain::PackageCategory;
use crate::plugin::capability::{Plugin, Versioneer};

pub const NAME: &str = "rubygems";

const API_URL: &str = "https://rubygems.org/api/v1/gems";

const PACKAGE_PREFIX: &str = "rubygem-";

#[derive(Debug, Deserialize)]
struct GemInfo {
    version: Option<String>,
}

pub struct RubyGems {
    api_url: String,
    client: Client,
}

impl RubyGems {
    pub fn new() -> Result<Self> {
        Self::with_api_url(API_URL)
    }

    pub fn with_api_url(api_url: impl Into<String>) -> Result<Self> {
        let client = Client::builder()
            .timeout(Duration::from_secs(30))
            .user_agent(concat!("specrebase/", env!("CARGO_PKG_VERSION")))
            .build()
            .context("Failed to create HTTP client")?;

        Ok(Self {
            api_url: api_url.into(),
            client,
        })
    }

    /// Version published for `gem`, `None` when the lookup fails
    fn lookup(&self, gem: &str) -> Option<String> {
        let url = format!("{}/{}.json", self.api_url, gem);

        let response = match self.client.get(&url).send() {
            Ok(response) if response.status().is_success() => response,
            Ok(response) => {
                tracing::debug!("{} returned {}", url, response.status());
                return None;
            }
            Err(e) => {
                tracing::debug!("Failed to fetch {}: {}", url, e);
                return None;
            }
        };

        match response.json::<GemInfo>() {
            Ok(info) => info.version.filter(|v| !v.is_empty()),
            Err(e) => {
                tracing::debug!("Unexpected response from {}: {}", url, e);
                None
            }
        }
    }
}

impl Plugin for RubyGems {
    fn name(&self) -> &str {
        NAME
    }

    fn categories(&self) -> &[PackageCategory] {
        &[PackageCategory::Ruby]
    }

    fn description(&self) -> &str {
        "Looks up the latest gem version on rubygems.org"
    }
}

impl Versioneer for RubyGems {
    fn run(&self, package_name: &str) -> Result<Option<String>> {
        // The `ruby` gem entry does not describe the interpreter
        if package_name == "ruby" {
            return Ok(None);
        }

        let version = self.lookup(package_name).or_else(|| {
            package_name
                .strip_prefix(PACKAGE_PREFIX)
                .and_then(|gem| self.lookup(gem))
        });

        if version.is_none() {
            tracing::warn!(
                "Failed to determine the latest version of {}, check that it exists on rubygems.org",
                package_name
            );
        }

        Ok(version)
    }
}
