//! Config command handlers

use std::path::Path;

use anyhow::{bail, Context, Result};

use roster_core::Config;

use crate::output::{Output, OutputFormat};

/// Keys accepted by `config set`
const KEYS: &str = "data_dir, sync_url, sync_enabled, email";

/// Show current configuration
pub fn show(config_path: &Path, output: &Output) -> Result<()> {
    let config = Config::load_from_path(config_path).context("Failed to load configuration")?;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "data_dir": config.data_dir,
                    "sync_url": config.sync_url,
                    "sync_enabled": config.sync_enabled,
                    "email": config.email,
                    "accounts": config.accounts.len()
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", config.data_dir.display());
        }
        OutputFormat::Human => {
            println!("Configuration:");
            println!("  data_dir:     {}", config.data_dir.display());
            println!(
                "  sync_url:     {}",
                config.sync_url.as_deref().unwrap_or("(not set)")
            );
            println!("  sync_enabled: {}", config.sync_enabled);
            println!(
                "  email:        {}",
                config.email.as_deref().unwrap_or("(not set)")
            );
            println!("  accounts:     {}", config.accounts.len());
            println!();
            println!("Config file: {}", config_path.display());
        }
    }

    Ok(())
}

/// Set a configuration value
pub fn set(key: &str, value: &str, config_path: &Path, output: &Output) -> Result<()> {
    let mut config = Config::load_from_path(config_path).context("Failed to load configuration")?;
    apply(&mut config, key, value)?;
    config
        .save_to_path(config_path)
        .context("Failed to save configuration")?;

    output.success(&format!("Set {} = {}", key, value));
    Ok(())
}

fn apply(config: &mut Config, key: &str, value: &str) -> Result<()> {
    match key {
        "data_dir" => config.data_dir = value.into(),
        "sync_url" => config.sync_url = optional(value),
        "sync_enabled" => {
            config.sync_enabled = value
                .parse()
                .context("Invalid value for sync_enabled. Use 'true' or 'false'.")?;
        }
        "email" => config.email = optional(value),
        _ => bail!(
            "Unknown configuration key: '{}'\nValid keys: {}",
            key,
            KEYS
        ),
    }
    Ok(())
}

/// Empty or "none" clears an optional setting
fn optional(value: &str) -> Option<String> {
    if value.is_empty() || value == "none" {
        None
    } else {
        Some(value.to_string())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_apply_known_keys() {
        let mut config = Config::default();

        apply(&mut config, "sync_url", "ws://localhost:3030").unwrap();
        apply(&mut config, "sync_enabled", "true").unwrap();
        apply(&mut config, "email", "ana@example.com").unwrap();
        assert_eq!(config.active_sync_url(), Some("ws://localhost:3030"));
        assert_eq!(config.email.as_deref(), Some("ana@example.com"));

        apply(&mut config, "sync_url", "none").unwrap();
        assert_eq!(config.sync_url, None);
    }

    #[test]
    fn test_apply_rejects_bad_input() {
        let mut config = Config::default();
        assert!(apply(&mut config, "sync_enabled", "maybe").is_err());
        assert!(apply(&mut config, "favorite_color", "blue").is_err());
    }
}
