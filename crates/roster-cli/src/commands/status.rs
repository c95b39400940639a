//! Status command handler

use anyhow::Result;

use roster_core::DocumentPersistence;

use crate::app::App;
use crate::output::{Output, OutputFormat};

/// Show document, sync and session information
pub async fn show(app: &App, output: &Output) -> Result<()> {
    let config = &app.config;
    let doc_id = app.backend.document_id();
    let document_size = DocumentPersistence::new(config).document_size();
    let people = app.people.load_all().await?.len();
    let pending = app.backend.is_pending_sync().await;

    match output.format {
        OutputFormat::Json => {
            println!(
                "{}",
                serde_json::json!({
                    "document_id": doc_id.to_bs58check(),
                    "document_url": doc_id.to_url(),
                    "pending_sync": pending,
                    "sync_enabled": config.sync_enabled,
                    "sync_url": config.sync_url,
                    "storage": {
                        "data_dir": config.data_dir,
                        "document_size": document_size
                    },
                    "people": people,
                    "accounts": config.accounts.len()
                })
            );
        }
        OutputFormat::Quiet => {
            println!("{}", doc_id);
        }
        OutputFormat::Human => {
            println!("Roster Status");
            println!("=============");
            println!();
            println!("Document:");
            println!("  ID:  {}", doc_id);
            println!("  URL: {}", doc_id.to_url());
            if pending {
                println!("  Joined, waiting for first sync");
            }
            println!();
            println!("Sync:");
            println!(
                "  Status: {}",
                if app.sync_configured() {
                    "enabled"
                } else {
                    "disabled"
                }
            );
            if let Some(ref url) = config.sync_url {
                println!("  Server: {}", url);
            }
            println!();
            println!("Storage:");
            println!("  Location: {}", config.data_dir.display());
            println!("  Size:     {}", human_size(document_size));
            println!();
            println!("Contents:");
            println!("  People:   {}", people);
            println!("  Accounts: {}", config.accounts.len());
        }
    }

    Ok(())
}

fn human_size(bytes: u64) -> String {
    const KB: u64 = 1024;
    const MB: u64 = KB * 1024;

    if bytes >= MB {
        format!("{:.1} MB", bytes as f64 / MB as f64)
    } else if bytes >= KB {
        format!("{:.1} KB", bytes as f64 / KB as f64)
    } else {
        format!("{} bytes", bytes)
    }
}
