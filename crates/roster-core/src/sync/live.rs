//! Live sync connection
//!
//! Keeps a WebSocket open to the sync server so remote changes arrive as
//! they happen. Reconnects with exponential backoff.

use std::sync::Arc;
use std::time::Duration;

use anyhow::Result;
use futures_util::{SinkExt, StreamExt};
use tokio::sync::{mpsc, watch, Mutex};
use tokio_tungstenite::tungstenite::Message;
use tracing::{debug, info, warn};

use super::exchange::{self, Exchange, WsRead, WsWrite};
use super::message::ServerMessage;
use super::state::SyncState;
use crate::document::RosterDocument;
use crate::document_id::DocumentId;

/// Commands accepted by the live task
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncCommand {
    /// Local changes are waiting to be pushed
    Push,
    Shutdown,
}

/// Events emitted by the live task
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SyncEvent {
    StatusChanged(ConnectionStatus),
    /// The local document now contains remote changes
    DocumentUpdated,
    Error(String),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionStatus {
    Disconnected,
    Connecting,
    Connected,
    Syncing,
}

#[derive(Debug, Clone)]
pub struct LiveSyncConfig {
    pub url: String,
    pub doc_id: DocumentId,
    pub initial_reconnect_delay: Duration,
    pub max_reconnect_delay: Duration,
}

impl LiveSyncConfig {
    pub fn new(url: impl Into<String>, doc_id: DocumentId) -> Self {
        Self {
            url: url.into(),
            doc_id,
            initial_reconnect_delay: Duration::from_secs(1),
            max_reconnect_delay: Duration::from_secs(30),
        }
    }
}

/// Handle to the live task
pub struct LiveSyncHandle {
    pub command_tx: mpsc::Sender<SyncCommand>,
    pub event_rx: mpsc::Receiver<SyncEvent>,
    pub status_rx: watch::Receiver<ConnectionStatus>,
}

impl LiveSyncHandle {
    pub fn status(&self) -> ConnectionStatus {
        *self.status_rx.borrow()
    }
}

/// Spawn the live sync task on the current runtime
///
/// The task ends on `Shutdown` or when every command sender is dropped.
pub fn spawn_live_sync(
    config: LiveSyncConfig,
    doc: Arc<Mutex<RosterDocument>>,
    sync_state: Arc<Mutex<SyncState>>,
) -> LiveSyncHandle {
    let (command_tx, command_rx) = mpsc::channel(16);
    let (event_tx, event_rx) = mpsc::channel(64);
    let (status_tx, status_rx) = watch::channel(ConnectionStatus::Disconnected);

    let task = LiveTask {
        config,
        peer_id: exchange::new_peer_id(),
        doc,
        sync_state,
        event_tx,
        status_tx,
    };
    tokio::spawn(task.run(command_rx));

    LiveSyncHandle {
        command_tx,
        event_rx,
        status_rx,
    }
}

/// Next reconnect delay after `current`
fn next_delay(current: Duration, max: Duration) -> Duration {
    (current * 2).min(max)
}

struct LiveTask {
    config: LiveSyncConfig,
    peer_id: String,
    doc: Arc<Mutex<RosterDocument>>,
    sync_state: Arc<Mutex<SyncState>>,
    event_tx: mpsc::Sender<SyncEvent>,
    status_tx: watch::Sender<ConnectionStatus>,
}

impl LiveTask {
    async fn run(self, mut command_rx: mpsc::Receiver<SyncCommand>) {
        let mut delay = self.config.initial_reconnect_delay;

        loop {
            self.set_status(ConnectionStatus::Connecting).await;

            match self.connect_and_sync(&mut command_rx).await {
                Ok(true) => break,
                Ok(false) => delay = self.config.initial_reconnect_delay,
                Err(e) => {
                    warn!("Live sync connection error: {:#}", e);
                    self.emit(SyncEvent::Error(format!("Connection error: {:#}", e)))
                        .await;
                }
            }

            self.set_status(ConnectionStatus::Disconnected).await;
            debug!("Reconnecting in {:?}", delay);

            tokio::select! {
                _ = tokio::time::sleep(delay) => {
                    delay = next_delay(delay, self.config.max_reconnect_delay);
                }
                cmd = command_rx.recv() => match cmd {
                    Some(SyncCommand::Shutdown) | None => break,
                    // Pushed by the initial exchange after reconnecting
                    Some(SyncCommand::Push) => {}
                },
            }
        }

        self.set_status(ConnectionStatus::Disconnected).await;
        info!("Live sync stopped");
    }

    /// Run one connection; `Ok(true)` means shut down
    async fn connect_and_sync(&self, command_rx: &mut mpsc::Receiver<SyncCommand>) -> Result<bool> {
        let (mut write, mut read, server_peer_id) =
            exchange::connect(&self.config.url, &self.peer_id).await?;
        self.set_status(ConnectionStatus::Connected).await;
        info!("Live sync connected to {}", self.config.url);

        let exchange = Exchange {
            peer_id: &self.peer_id,
            server_peer_id: &server_peer_id,
            doc_id: self.config.doc_id,
            doc: &self.doc,
            sync_state: &self.sync_state,
        };

        self.full_exchange(&exchange, &mut write, &mut read).await?;

        loop {
            tokio::select! {
                cmd = command_rx.recv() => match cmd {
                    Some(SyncCommand::Push) => {
                        self.full_exchange(&exchange, &mut write, &mut read).await?;
                    }
                    Some(SyncCommand::Shutdown) | None => {
                        write.close().await.ok();
                        return Ok(true);
                    }
                },
                msg = read.next() => match msg {
                    Some(Ok(Message::Binary(data))) => {
                        if let Ok(ServerMessage::Sync { data, .. }) = ServerMessage::decode(&data) {
                            self.set_status(ConnectionStatus::Syncing).await;
                            let before = exchange.heads().await;
                            exchange.receive(&data, &mut write).await?;
                            exchange.save_state().await;
                            if exchange.heads().await != before {
                                self.emit(SyncEvent::DocumentUpdated).await;
                            }
                            self.set_status(ConnectionStatus::Connected).await;
                        }
                    }
                    Some(Ok(Message::Close(_))) | None => return Ok(false),
                    Some(Err(e)) => return Err(e.into()),
                    Some(Ok(_)) => {}
                },
            }
        }
    }

    async fn full_exchange(
        &self,
        exchange: &Exchange<'_>,
        write: &mut WsWrite,
        read: &mut WsRead,
    ) -> Result<()> {
        self.set_status(ConnectionStatus::Syncing).await;
        if exchange.run(write, read).await? {
            self.emit(SyncEvent::DocumentUpdated).await;
        }
        self.set_status(ConnectionStatus::Connected).await;
        Ok(())
    }

    async fn set_status(&self, status: ConnectionStatus) {
        let changed = self.status_tx.send_if_modified(|current| {
            if *current == status {
                return false;
            }
            *current = status;
            true
        });
        if changed {
            self.emit(SyncEvent::StatusChanged(status)).await;
        }
    }

    async fn emit(&self, event: SyncEvent) {
        // Nobody listening is fine
        let _ = self.event_tx.send(event).await;
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_backoff() {
        let config = LiveSyncConfig::new("ws://localhost:3030", DocumentId::new());
        assert_eq!(config.initial_reconnect_delay, Duration::from_secs(1));
        assert_eq!(config.max_reconnect_delay, Duration::from_secs(30));
    }

    #[test]
    fn test_backoff_doubles_up_to_max() {
        let max = Duration::from_secs(30);
        let mut delay = Duration::from_secs(1);
        let mut seen = vec![delay];
        for _ in 0..6 {
            delay = next_delay(delay, max);
            seen.push(delay);
        }
        let secs: Vec<u64> = seen.iter().map(Duration::as_secs).collect();
        assert_eq!(secs, vec![1, 2, 4, 8, 16, 30, 30]);
    }

    #[tokio::test]
    async fn test_shutdown_while_unreachable() {
        let mut config = LiveSyncConfig::new("ws://127.0.0.1:9", DocumentId::new());
        config.initial_reconnect_delay = Duration::from_secs(60);

        let mut handle = spawn_live_sync(
            config,
            Arc::new(Mutex::new(RosterDocument::new())),
            Arc::new(Mutex::new(SyncState::new())),
        );

        // Connecting, then an error for the refused connection
        assert_eq!(
            handle.event_rx.recv().await,
            Some(SyncEvent::StatusChanged(ConnectionStatus::Connecting))
        );
        assert!(matches!(
            handle.event_rx.recv().await,
            Some(SyncEvent::Error(_))
        ));

        handle.command_tx.send(SyncCommand::Shutdown).await.unwrap();

        // Drain until the task drops its event sender
        while handle.event_rx.recv().await.is_some() {}
        assert_eq!(handle.status(), ConnectionStatus::Disconnected);
    }
}
