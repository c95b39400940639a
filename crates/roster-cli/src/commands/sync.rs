//! Sync command handler

use anyhow::{bail, Result};

use crate::app::App;
use crate::output::Output;

/// Sync with the remote server
pub async fn sync(app: &App, output: &Output) -> Result<()> {
    let config = &app.config;

    if !config.sync_enabled {
        bail!(
            "Sync is not enabled. Enable it with:\n  \
             roster config set sync_enabled true\n  \
             roster config set sync_url ws://your-server:3030"
        );
    }

    let Some(url) = app.backend.sync_url() else {
        bail!(
            "Sync URL not configured. Set it with:\n  \
             roster config set sync_url ws://your-server:3030"
        );
    };

    output.message(&format!("Connecting to {}...", url));
    output.message(&format!("Syncing document {}...", app.backend.document_id()));

    match app.backend.sync_once().await {
        Ok(true) => {
            output.success("Sync complete - document updated");
            let people = app.people.load_all().await?;
            output.message(&format!("  People: {}", people.len()));
        }
        Ok(false) => output.success("Sync complete - already up to date"),
        Err(e) => {
            output.message(&format!("Sync failed: {}", e));
            return Err(e);
        }
    }

    Ok(())
}
