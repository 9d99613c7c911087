use crate::output::{print_fields, print_json};
use actionref_core::config::{config_path, WarnLevel};
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
    let config = super::load_config(root)?;
    if json {
        return print_json(&config);
    }
    let path = config_path(root);
    let source = if path.exists() {
        path.display().to_string()
    } else {
        "defaults".to_string()
    };
    print_fields(&[
        ("source", Some(source)),
        ("fetch.wait_timeout_ms", Some(config.fetch.wait_timeout_ms.to_string())),
        ("fetch.poll_interval_ms", Some(config.fetch.poll_interval_ms.to_string())),
        (
            "fetch.request_timeout_secs",
            Some(config.fetch.request_timeout_secs.to_string()),
        ),
        ("fetch.user_agent", Some(config.fetch.user_agent)),
        ("github.raw_base", Some(config.github.raw_base)),
        ("github.web_base", Some(config.github.web_base)),
    ]);
    Ok(())
}

fn validate(root: &Path, json: bool) -> anyhow::Result<()> {
    let config = super::load_config(root)?;
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
