//! Init command handler

use std::path::Path;

use anyhow::{bail, Context, Result};

use roster_core::{Config, DocumentId, Identity};

use crate::output::Output;

/// Start a new people document, or join another client's with `--join`
///
/// Joining only records the document ID; the people arrive with the first
/// sync, and saves are refused until then.
pub fn run(config_path: &Path, join: Option<&str>, output: &Output) -> Result<()> {
    let config = Config::load_from_path(config_path).context("Failed to load configuration")?;
    let identity = Identity::with_config(&config);

    let join_id = join
        .map(|id| {
            DocumentId::from_bs58check(id).map_err(|e| anyhow::anyhow!("Invalid document ID: {}", e))
        })
        .transpose()?;

    if let Some(existing) = identity.doc_id()? {
        if join_id.is_some_and(|id| id != existing) {
            bail!(
                "Already using document {}. To join another, remove {}",
                existing,
                config.data_dir.display()
            );
        }
        output.message(&format!("Already initialized with document {}", existing));
        return Ok(());
    }

    let result = match join_id {
        Some(id) => identity.initialize_join(id)?,
        None => identity.initialize_new()?,
    };

    if output.is_json() {
        println!(
            "{}",
            serde_json::json!({
                "document_id": result.doc_id.to_bs58check(),
                "document_url": result.doc_id.to_url(),
                "is_new": result.is_new
            })
        );
    } else if output.is_quiet() {
        println!("{}", result.doc_id);
    } else if result.is_new {
        output.success(&format!("Created people document {}", result.doc_id));
        println!("Share it with: roster init --join {}", result.doc_id.to_url());
    } else {
        output.success(&format!("Joined people document {}", result.doc_id));
        if config.active_sync_url().is_none() {
            println!("Sync is not configured. People arrive once you set a server:");
            println!("  roster config set sync_url ws://your-server:3030");
            println!("  roster config set sync_enabled true");
        } else {
            println!("Run `roster sync` to fetch the people.");
        }
    }

    Ok(())
}
