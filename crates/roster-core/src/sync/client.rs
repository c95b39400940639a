//! One-shot sync client
//!
//! Connects, syncs the people document until both sides are quiescent, then
//! disconnects. Used by `roster sync` and by the document backend when live
//! sync is not running.

use std::sync::Arc;

use anyhow::Result;
use futures_util::SinkExt;
use tokio::sync::{watch, Mutex};
use tracing::{info, warn};

use super::exchange::{self, Exchange};
use super::state::SyncState;
use crate::document::RosterDocument;
use crate::document_id::DocumentId;

/// Status of a one-shot sync
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SyncStatus {
    Disconnected,
    Connecting,
    Syncing,
    Error,
}

/// Client for an automerge-repo sync server
pub struct SyncClient {
    url: String,
    doc_id: DocumentId,
    peer_id: String,
    status: watch::Sender<SyncStatus>,
    sync_state: Arc<Mutex<SyncState>>,
}

impl SyncClient {
    pub fn new(url: &str, doc_id: DocumentId) -> Self {
        let (status, _) = watch::channel(SyncStatus::Disconnected);
        Self {
            url: url.to_string(),
            doc_id,
            peer_id: exchange::new_peer_id(),
            status,
            sync_state: Arc::new(Mutex::new(SyncState::new())),
        }
    }

    /// Use persisted sync state instead of an in-memory one
    pub fn with_sync_state(mut self, state: SyncState) -> Self {
        self.sync_state = Arc::new(Mutex::new(state));
        self
    }

    /// Share sync state with other users of the same document
    pub fn with_shared_sync_state(mut self, state: Arc<Mutex<SyncState>>) -> Self {
        self.sync_state = state;
        self
    }

    pub fn url(&self) -> &str {
        &self.url
    }

    pub fn peer_id(&self) -> &str {
        &self.peer_id
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.borrow()
    }

    pub fn subscribe_status(&self) -> watch::Receiver<SyncStatus> {
        self.status.subscribe()
    }

    /// Connect, exchange changes and disconnect
    ///
    /// Returns whether the local document was changed by the server.
    pub async fn sync_once(&self, doc: &Mutex<RosterDocument>) -> Result<bool> {
        info!("Starting sync to {}", self.url);
        self.status.send_replace(SyncStatus::Connecting);

        let (mut write, mut read, server_peer_id) =
            match exchange::connect(&self.url, &self.peer_id).await {
                Ok(conn) => conn,
                Err(e) => {
                    warn!("Sync connection failed: {:#}", e);
                    self.status.send_replace(SyncStatus::Error);
                    return Err(e);
                }
            };

        self.status.send_replace(SyncStatus::Syncing);
        let exchange = Exchange {
            peer_id: &self.peer_id,
            server_peer_id: &server_peer_id,
            doc_id: self.doc_id,
            doc,
            sync_state: &self.sync_state,
        };
        let result = exchange.run(&mut write, &mut read).await;

        write.close().await.ok();

        match &result {
            Ok(updated) => {
                info!("Sync complete, document_updated={}", updated);
                self.status.send_replace(SyncStatus::Disconnected);
            }
            Err(e) => {
                warn!("Sync failed: {:#}", e);
                self.status.send_replace(SyncStatus::Error);
            }
        }
        result
    }
}
