//! Record backends
//!
//! A backend is a hierarchical JSON store addressed by [`StorePath`]. The
//! core only needs four operations from it: write a value, read a value,
//! delete a value, and subscribe to full snapshots of a subtree.
//!
//! ## Implementations
//!
//! - [`MemoryBackend`]: shared in-process tree, one handle per client
//! - [`DocumentBackend`]: Automerge document persisted to disk, optionally
//!   synced with a remote server
//!
//! ## Subscriptions
//!
//! Every backend publishes the path of each change on a [`ChangeHub`].
//! A subscription is a spawned task that re-reads the whole subtree when a
//! change overlaps it and pushes the snapshot into a [`SnapshotFeed`].
//! Subscribers always get full state, never a diff.

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{broadcast, mpsc};
use tracing::debug;

use crate::error::{StoreError, SubscriptionError};
use crate::path::StorePath;

mod document;
mod memory;
pub(crate) mod tree;

pub use document::DocumentBackend;
pub use memory::MemoryBackend;

/// Capacity of the change broadcast channel
const CHANGE_CAPACITY: usize = 64;

/// Capacity of each subscription's snapshot queue
const FEED_CAPACITY: usize = 16;

/// A hierarchical store the core reads and writes records through
#[async_trait]
pub trait RecordBackend: Send + Sync {
    /// Replace the value at `path`; writing `null` deletes it
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError>;

    /// One-shot read of the value at `path`
    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;

    /// Remove the value at `path`; removing a missing value succeeds
    async fn delete(&self, path: &StorePath) -> Result<(), StoreError>;

    /// Subscribe to full snapshots of the subtree at `path`
    ///
    /// The feed yields the current snapshot immediately, then a fresh one
    /// after every change that touches the subtree.
    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotFeed, StoreError>;
}

/// Source of snapshots for subscription tasks
///
/// Kept separate from [`RecordBackend::read`] so that client-side failure
/// simulation does not affect listeners, which serve from local state.
#[async_trait]
pub(crate) trait SnapshotSource: Send + Sync + 'static {
    async fn snapshot(&self, path: &StorePath) -> Result<Option<Value>, StoreError>;
}

/// A change notification on the hub
#[derive(Debug, Clone)]
pub(crate) enum Change {
    /// Something at or below this path changed
    Updated(StorePath),
    /// All subscriptions are terminated with this reason
    Revoked(String),
}

/// Broadcasts change notifications to subscription tasks
#[derive(Debug, Clone)]
pub(crate) struct ChangeHub {
    tx: broadcast::Sender<Change>,
}

impl ChangeHub {
    pub fn new() -> Self {
        let (tx, _rx) = broadcast::channel(CHANGE_CAPACITY);
        Self { tx }
    }

    pub fn publish(&self, path: StorePath) {
        // No receivers just means nobody is subscribed
        let _ = self.tx.send(Change::Updated(path));
    }

    pub fn revoke(&self, reason: impl Into<String>) {
        let _ = self.tx.send(Change::Revoked(reason.into()));
    }

    pub fn listen(&self) -> broadcast::Receiver<Change> {
        self.tx.subscribe()
    }
}

impl Default for ChangeHub {
    fn default() -> Self {
        Self::new()
    }
}

/// Stream of full snapshots for one subscription
///
/// After a terminal error has been yielded, `next` returns `None`.
#[derive(Debug)]
pub struct SnapshotFeed {
    rx: mpsc::Receiver<Result<Option<Value>, SubscriptionError>>,
}

impl SnapshotFeed {
    /// Wait for the next snapshot
    pub async fn next(&mut self) -> Option<Result<Option<Value>, SubscriptionError>> {
        self.rx.recv().await
    }
}

/// Spawn the task that feeds a subscription
///
/// `changes` must be obtained before the call so no change between
/// registration and the initial snapshot is missed.
pub(crate) fn spawn_feed<S>(
    source: S,
    path: StorePath,
    mut changes: broadcast::Receiver<Change>,
) -> SnapshotFeed
where
    S: SnapshotSource,
{
    let (tx, rx) = mpsc::channel(FEED_CAPACITY);

    tokio::spawn(async move {
        if !push_snapshot(&source, &path, &tx).await {
            return;
        }

        loop {
            tokio::select! {
                _ = tx.closed() => {
                    debug!("Subscription to {} dropped", path);
                    break;
                }
                change = changes.recv() => {
                    match change {
                        Ok(Change::Updated(changed)) => {
                            if changed.overlaps(&path) && !push_snapshot(&source, &path, &tx).await {
                                break;
                            }
                        }
                        Ok(Change::Revoked(reason)) => {
                            let _ = tx.send(Err(SubscriptionError::Revoked(reason))).await;
                            break;
                        }
                        Err(broadcast::error::RecvError::Lagged(skipped)) => {
                            // A fresh full snapshot supersedes whatever was skipped
                            debug!("Subscription to {} lagged by {} changes", path, skipped);
                            if !push_snapshot(&source, &path, &tx).await {
                                break;
                            }
                        }
                        Err(broadcast::error::RecvError::Closed) => {
                            let _ = tx
                                .send(Err(SubscriptionError::Backend(
                                    "backend shut down".to_string(),
                                )))
                                .await;
                            break;
                        }
                    }
                }
            }
        }
    });

    SnapshotFeed { rx }
}

/// Read and push one snapshot; returns false when the feed is finished
async fn push_snapshot<S: SnapshotSource>(
    source: &S,
    path: &StorePath,
    tx: &mpsc::Sender<Result<Option<Value>, SubscriptionError>>,
) -> bool {
    match source.snapshot(path).await {
        Ok(value) => tx.send(Ok(value)).await.is_ok(),
        Err(e) => {
            let _ = tx.send(Err(SubscriptionError::Backend(e.to_string()))).await;
            false
        }
    }
}
