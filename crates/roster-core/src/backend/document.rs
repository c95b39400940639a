//! Automerge-backed record backend
//!
//! The tree lives in a [`RosterDocument`] persisted to the data directory
//! after every change. Reads are served from the local document, so the
//! store keeps working without a sync server. When a sync URL is configured
//! the document is exchanged with the server, either once on demand or
//! continuously through the live sync task; remote changes are published to
//! subscribers like local ones.

use std::sync::Arc;

use anyhow::Context;
use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{mpsc, watch, Mutex};
use tracing::{debug, info, warn};

use super::{spawn_feed, ChangeHub, RecordBackend, SnapshotFeed, SnapshotSource};
use crate::config::Config;
use crate::document::{DocumentError, RosterDocument};
use crate::document_id::DocumentId;
use crate::error::StoreError;
use crate::path::StorePath;
use crate::storage::DocumentPersistence;
use crate::sync::{
    spawn_live_sync, ConnectionStatus, LiveSyncConfig, SyncClient, SyncCommand, SyncEvent,
    SyncState,
};

struct Inner {
    doc_id: DocumentId,
    doc: Arc<Mutex<RosterDocument>>,
    persistence: Option<DocumentPersistence>,
    hub: ChangeHub,
    sync_url: Option<String>,
    sync_state: Arc<Mutex<SyncState>>,
    live: Mutex<Option<mpsc::Sender<SyncCommand>>>,
}

/// Record backend over a local Automerge document
#[derive(Clone)]
pub struct DocumentBackend {
    inner: Arc<Inner>,
}

impl DocumentBackend {
    /// A document that lives only in memory, without sync
    pub fn in_memory() -> Self {
        Self::with_document(RosterDocument::new())
    }

    /// Wrap an existing document, without persistence or sync
    pub fn with_document(doc: RosterDocument) -> Self {
        Self::build(doc, None, None, SyncState::new())
    }

    /// Open (or create) the document in the configured data directory
    pub fn open(config: &Config) -> Result<Self, StoreError> {
        let persistence = DocumentPersistence::new(config);
        let doc = persistence.load_or_create()?;

        let sync_state = match SyncState::with_path(config.sync_state_path()) {
            Ok(state) => state,
            Err(e) => {
                // Only costs a full exchange on the next sync
                warn!("Ignoring unreadable sync state: {:#}", e);
                SyncState::new()
            }
        };

        let sync_url = config.active_sync_url().map(str::to_string);
        debug!(
            "Opened document {} (sync: {})",
            doc.id(),
            sync_url.as_deref().unwrap_or("off")
        );
        Ok(Self::build(doc, Some(persistence), sync_url, sync_state))
    }

    fn build(
        doc: RosterDocument,
        persistence: Option<DocumentPersistence>,
        sync_url: Option<String>,
        sync_state: SyncState,
    ) -> Self {
        Self {
            inner: Arc::new(Inner {
                doc_id: *doc.id(),
                doc: Arc::new(Mutex::new(doc)),
                persistence,
                hub: ChangeHub::new(),
                sync_url,
                sync_state: Arc::new(Mutex::new(sync_state)),
                live: Mutex::new(None),
            }),
        }
    }

    pub fn document_id(&self) -> DocumentId {
        self.inner.doc_id
    }

    pub fn sync_url(&self) -> Option<&str> {
        self.inner.sync_url.as_deref()
    }

    /// A copy of the document, as another device would hold it
    pub async fn fork_document(&self) -> RosterDocument {
        self.inner.doc.lock().await.fork()
    }

    /// Joined another client's document and still waiting for its content
    ///
    /// Writes fail with [`StoreError::Unavailable`] until a sync or merge
    /// delivers the document.
    pub async fn is_pending_sync(&self) -> bool {
        !self.inner.doc.lock().await.is_initialized()
    }

    /// Merge changes made elsewhere into the local document
    ///
    /// Subscribers see the merged state as an external change.
    pub async fn merge_from(&self, other: &mut RosterDocument) -> Result<(), StoreError> {
        let saved = {
            let mut doc = self.inner.doc.lock().await;
            doc.merge(other).map_err(document_error)?;
            persist(&mut doc, self.inner.persistence.as_ref())
        };
        self.inner.hub.publish(StorePath::root());
        warn_unsaved(saved, &StorePath::root())
    }

    /// Exchange changes with the sync server once
    ///
    /// Returns whether the server sent anything new.
    pub async fn sync_once(&self) -> anyhow::Result<bool> {
        let url = self
            .sync_url()
            .context("Sync is not configured. Set sync_url and sync_enabled.")?;
        let client = SyncClient::new(url, self.inner.doc_id)
            .with_shared_sync_state(Arc::clone(&self.inner.sync_state));

        let updated = client.sync_once(&self.inner.doc).await?;
        {
            let mut doc = self.inner.doc.lock().await;
            persist(&mut doc, self.inner.persistence.as_ref())?;
        }
        if updated {
            self.inner.hub.publish(StorePath::root());
        }
        Ok(updated)
    }

    /// Keep the document synced over a long-lived connection
    ///
    /// Local writes are pushed as they happen; remote changes are persisted
    /// and published to subscribers.
    pub async fn start_live_sync(&self) -> anyhow::Result<watch::Receiver<ConnectionStatus>> {
        let url = self
            .sync_url()
            .context("Sync is not configured. Set sync_url and sync_enabled.")?;

        let mut live = self.inner.live.lock().await;
        if live.is_some() {
            anyhow::bail!("Live sync is already running");
        }

        let handle = spawn_live_sync(
            LiveSyncConfig::new(url, self.inner.doc_id),
            Arc::clone(&self.inner.doc),
            Arc::clone(&self.inner.sync_state),
        );
        *live = Some(handle.command_tx.clone());

        tokio::spawn(forward_remote_changes(
            handle.event_rx,
            Arc::clone(&self.inner.doc),
            self.inner.persistence.clone(),
            self.inner.hub.clone(),
        ));

        info!("Live sync started for {}", url);
        Ok(handle.status_rx)
    }

    /// Stop the live sync task, if running
    pub async fn stop_live_sync(&self) {
        if let Some(tx) = self.inner.live.lock().await.take() {
            let _ = tx.send(SyncCommand::Shutdown).await;
        }
    }

    /// Publish a local change and push it to the live task
    async fn changed(&self, path: &StorePath) {
        self.inner.hub.publish(path.clone());
        if let Some(tx) = self.inner.live.lock().await.as_ref() {
            // A full queue already holds a pending push
            let _ = tx.try_send(SyncCommand::Push);
        }
    }
}

fn document_error(err: DocumentError) -> StoreError {
    match err {
        DocumentError::NotSynced => StoreError::Unavailable,
        other => StoreError::Backend(other.to_string()),
    }
}

/// A change already applied in memory is kept and published even when
/// saving it fails; the failure is still reported to the caller.
fn warn_unsaved(saved: Result<(), StoreError>, path: &StorePath) -> Result<(), StoreError> {
    if let Err(e) = &saved {
        warn!("Change at {} applied but not saved: {}", path, e);
    }
    saved
}

fn persist(
    doc: &mut RosterDocument,
    persistence: Option<&DocumentPersistence>,
) -> Result<(), StoreError> {
    if let Some(persistence) = persistence {
        persistence.save(doc)?;
    }
    Ok(())
}

/// Persist and publish remote changes reported by the live task
async fn forward_remote_changes(
    mut events: mpsc::Receiver<SyncEvent>,
    doc: Arc<Mutex<RosterDocument>>,
    persistence: Option<DocumentPersistence>,
    hub: ChangeHub,
) {
    while let Some(event) = events.recv().await {
        match event {
            SyncEvent::DocumentUpdated => {
                let saved = {
                    let mut doc = doc.lock().await;
                    persist(&mut doc, persistence.as_ref())
                };
                if let Err(e) = saved {
                    warn!("Failed to persist synced document: {}", e);
                }
                hub.publish(StorePath::root());
            }
            SyncEvent::StatusChanged(status) => debug!("Live sync status: {:?}", status),
            SyncEvent::Error(message) => debug!("Live sync error: {}", message),
        }
    }
}

#[async_trait]
impl RecordBackend for DocumentBackend {
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        let saved = {
            let mut doc = self.inner.doc.lock().await;
            doc.put(path, value).map_err(document_error)?;
            persist(&mut doc, self.inner.persistence.as_ref())
        };
        debug!("Wrote {}", path);
        self.changed(path).await;
        warn_unsaved(saved, path)
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.snapshot(path).await
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        let saved = {
            let mut doc = self.inner.doc.lock().await;
            doc.delete(path).map_err(document_error)?;
            persist(&mut doc, self.inner.persistence.as_ref())
        };
        debug!("Deleted {}", path);
        self.changed(path).await;
        warn_unsaved(saved, path)
    }

    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotFeed, StoreError> {
        let changes = self.inner.hub.listen();
        Ok(spawn_feed(self.clone(), path.clone(), changes))
    }
}

#[async_trait]
impl SnapshotSource for DocumentBackend {
    async fn snapshot(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let doc = self.inner.doc.lock().await;
        doc.get(path).map_err(document_error)
    }
}
