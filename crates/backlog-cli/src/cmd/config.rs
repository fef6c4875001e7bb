use crate::output::print_json;
use anyhow::Context;
use backlog_core::config::{Config, WarnLevel};
use clap::Subcommand;
use std::path::Path;

#[derive(Subcommand)]
pub enum ConfigSubcommand {
    /// Show the effective configuration
    Show,

    /// Validate the config for common mistakes
    Validate,
}

pub fn run(root: &Path, subcmd: ConfigSubcommand, json: bool) -> anyhow::Result<()> {
    match subcmd {
        ConfigSubcommand::Show => show(root, json),
        ConfigSubcommand::Validate => validate(root, json),
    }
}

fn show(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    if json {
        return print_json(&config);
    }

    println!("local.backend: {}", config.local.backend.as_str());
    println!("local.path:    {}", config.local.resolved_path(root).display());
    println!("local.key:     {}", config.local.key);
    match &config.cloud {
        Some(cloud) => {
            println!("cloud.project_id: {}", cloud.project_id);
            println!("cloud.database:   {}", cloud.database);
            println!("cloud.base_url:   {}", cloud.base_url);
            println!("cloud.collection: {}", cloud.collection);
            let token = if cloud.token().is_some() { "set" } else { "unset" };
            println!("cloud.token_env:  {} ({token})", cloud.token_env);
            if let Some(secs) = cloud.timeout_secs {
                println!("cloud.timeout:    {secs}s");
            }
        }
        None => println!("cloud: disabled (local-only)"),
    }
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = Config::load(root).context("failed to load config")?;
    let warnings = config.validate();

    if json {
        let value = serde_json::json!({
            "warnings": warnings,
        });
        print_json(&value)?;
    } else if warnings.is_empty() {
        println!("Config is valid. No warnings.");
    } else {
        for w in &warnings {
            let prefix = match w.level {
                WarnLevel::Warning => "warning",
                WarnLevel::Error => "error",
            };
            println!("[{prefix}] {}", w.message);
        }
    }

    if warnings.iter().any(|w| w.level == WarnLevel::Error) {
        anyhow::bail!("config validation found errors");
    }
    Ok(())
}
