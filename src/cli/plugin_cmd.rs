//! Plugin registry commands

use anyhow::Result;

use super::app::build_runner;
use super::output::Output;
use crate::domain::PackageCategory;
use crate::plugin::{PluginDescriptor, PluginKind};
use crate::storage::Config;

pub fn list(output: &Output, config: &Config, kind: Option<PluginKind>) -> Result<()> {
    let runner = build_runner(config);
    let kinds: Vec<PluginKind> = match kind {
        Some(kind) => vec![kind],
        None => PluginKind::ALL.to_vec(),
    };

    let descriptors: Vec<PluginDescriptor> = kinds
        .into_iter()
        .flat_map(|kind| runner.registry().descriptors(kind))
        .collect();

    if output.is_json() {
        output.data(&descriptors);
        return Ok(());
    }

    if descriptors.is_empty() {
        println!("No plugins found.");
        return Ok(());
    }

    println!(
        "{:<16} {:<22} {:<10} {:<8} {:<12} DESCRIPTION",
        "KIND", "NAME", "AVAILABLE", "DEFAULT", "CATEGORIES"
    );
    println!("{}", "-".repeat(90));
    for plugin in descriptors {
        let categories: Vec<&str> = plugin.categories.iter().map(PackageCategory::as_str).collect();
        println!(
            "{:<16} {:<22} {:<10} {:<8} {:<12} {}",
            plugin.kind.slug(),
            plugin.name,
            if plugin.available { "yes" } else { "no" },
            if plugin.default_enabled { "yes" } else { "no" },
            if categories.is_empty() { "-".to_string() } else { categories.join(",") },
            plugin.description
        );
    }

    Ok(())
}

pub fn latest_version(
    output: &Output,
    config: &Config,
    package: &str,
    versioneer: Option<&str>,
    category: Option<PackageCategory>,
) -> Result<()> {
    let runner = build_runner(config);
    let versioneer = versioneer.or(config.rebase.versioneer.as_deref());

    let version = runner.run_versioneer(
        versioneer,
        package,
        category,
        &config.rebase.versioneer_blacklist,
    )?;

    if output.is_json() {
        output.data(&serde_json::json!({
            "package": package,
            "version": version,
        }));
        return Ok(());
    }

    match version {
        Some(version) => println!("{}", version),
        None => anyhow::bail!("No versioneer could determine the latest version of {}", package),
    }

    Ok(())
}
