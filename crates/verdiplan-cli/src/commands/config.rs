//! Config command - View and check the Verdiplan configuration
//!
//! Provides the `verdiplan config` CLI command which:
//! 1. Shows the effective configuration (YAML or JSON)
//! 2. Validates the configuration file and reports errors

use std::path::Path;

use anyhow::{Context, Result};
use clap::Subcommand;
use serde_json::json;
use tracing::info;

use verdiplan_core::config::Config;

use super::{config_path, load_config};
use crate::output::{get_formatter, OutputFormat};

#[derive(Debug, Subcommand)]
pub enum ConfigCommand {
    /// Display the effective configuration
    Show,
    /// Validate the configuration file
    Validate,
}

impl ConfigCommand {
    pub async fn execute(&self, config: Option<&Path>, format: OutputFormat) -> Result<()> {
        match self {
            ConfigCommand::Show => execute_show(config, format),
            ConfigCommand::Validate => execute_validate(config, format),
        }
    }
}

fn execute_show(explicit: Option<&Path>, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = config_path(explicit);
    let config = load_config(explicit)?;

    info!(config_path = %path.display(), "Showing configuration");

    if format.is_json() {
        let value =
            serde_json::to_value(&config).context("Failed to serialize configuration to JSON")?;
        formatter.print_json(&value);
    } else {
        if path.exists() {
            formatter.success(&format!("Configuration ({})", path.display()));
        } else {
            formatter.success("Configuration (defaults, no file found)");
        }
        formatter.info("");
        let yaml =
            serde_yaml::to_string(&config).context("Failed to serialize configuration to YAML")?;
        for line in yaml.lines() {
            formatter.info(line);
        }
    }
    Ok(())
}

fn execute_validate(explicit: Option<&Path>, format: OutputFormat) -> Result<()> {
    let formatter = get_formatter(format);
    let path = config_path(explicit);

    if !path.exists() {
        if format.is_json() {
            formatter.print_json(&json!({
                "valid": false,
                "config_path": path.display().to_string(),
                "errors": ["Configuration file not found"],
            }));
        } else {
            formatter.warn(&format!("Configuration file not found at {}", path.display()));
            formatter.info("The defaults apply until one is created.");
        }
        return Ok(());
    }

    let config = match Config::load(&path) {
        Ok(config) => config,
        Err(e) => {
            if format.is_json() {
                formatter.print_json(&json!({
                    "valid": false,
                    "config_path": path.display().to_string(),
                    "errors": [format!("Failed to parse configuration: {e:#}")],
                }));
            } else {
                formatter.error(&format!("Failed to parse configuration: {e:#}"));
                formatter.info(&format!("File: {}", path.display()));
            }
            return Ok(());
        }
    };

    info!(config_path = %path.display(), "Validating configuration");
    let errors = config.validate();

    if format.is_json() {
        let messages: Vec<String> = errors.iter().map(ToString::to_string).collect();
        formatter.print_json(&json!({
            "valid": errors.is_empty(),
            "config_path": path.display().to_string(),
            "errors": messages,
        }));
    } else if errors.is_empty() {
        formatter.success("Configuration is valid");
        formatter.info(&format!("File: {}", path.display()));
    } else {
        formatter.error(&format!(
            "Configuration has {} error{}:",
            errors.len(),
            if errors.len() == 1 { "" } else { "s" }
        ));
        formatter.info(&format!("File: {}", path.display()));
        formatter.info("");
        for error in &errors {
            formatter.info(&format!("  {} - {}", error.field, error.message));
        }
    }
    Ok(())
}
