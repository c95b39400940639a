//! Watch command handler

use anyhow::Result;
use tokio::sync::watch;

use roster_core::sync::ConnectionStatus;
use roster_core::{Notice, Operation, PeopleView};

use crate::app::App;
use crate::output::Output;

/// Print every collection snapshot as a delta until Ctrl-C
pub async fn watch(app: &App, output: &Output) -> Result<()> {
    let mut status_rx = if app.sync_configured() {
        Some(app.backend.start_live_sync().await?)
    } else {
        None
    };

    let mut watcher = app.people.on_collection_changed().await?;
    let mut view = PeopleView::new();
    let mut first = true;

    output.message("Watching people (Ctrl-C to stop)...");

    loop {
        tokio::select! {
            update = watcher.next() => match update {
                Some(Ok(snapshot)) => {
                    let delta = view.apply(&snapshot);
                    if first || !delta.is_empty() {
                        output.print_delta(&delta, view.len());
                    }
                    first = false;
                }
                Some(Err(e)) => {
                    output.notice(&Notice::failed(Operation::Watch, e));
                    break;
                }
                None => break,
            },
            status = next_status(&mut status_rx), if status_rx.is_some() => match status {
                Some(status) => output.message(&format!("sync: {}", status_label(status))),
                None => status_rx = None,
            },
            _ = tokio::signal::ctrl_c() => break,
        }
    }

    app.backend.stop_live_sync().await;
    Ok(())
}

async fn next_status(rx: &mut Option<watch::Receiver<ConnectionStatus>>) -> Option<ConnectionStatus> {
    let rx = rx.as_mut()?;
    rx.changed().await.ok()?;
    let status = *rx.borrow_and_update();
    Some(status)
}

fn status_label(status: ConnectionStatus) -> &'static str {
    match status {
        ConnectionStatus::Disconnected => "disconnected",
        ConnectionStatus::Connecting => "connecting",
        ConnectionStatus::Connected => "connected",
        ConnectionStatus::Syncing => "syncing",
    }
}
