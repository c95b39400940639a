//! In-process record backend
//!
//! All handles created from one `MemoryBackend` share the same tree and
//! change hub. `connect` models a second client talking to the same store:
//! it shares data and listeners but has its own connectivity flag.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::{Map, Value};
use tokio::sync::RwLock;
use tracing::debug;

use super::{spawn_feed, tree, ChangeHub, RecordBackend, SnapshotFeed, SnapshotSource};
use crate::error::StoreError;
use crate::path::StorePath;

struct Shared {
    tree: RwLock<Value>,
    hub: ChangeHub,
}

/// Shared in-memory hierarchical store
#[derive(Clone)]
pub struct MemoryBackend {
    shared: Arc<Shared>,
    offline: Arc<AtomicBool>,
}

impl MemoryBackend {
    /// Create an empty store
    pub fn new() -> Self {
        Self {
            shared: Arc::new(Shared {
                tree: RwLock::new(Value::Object(Map::new())),
                hub: ChangeHub::new(),
            }),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Another client connected to the same store
    pub fn connect(&self) -> Self {
        Self {
            shared: Arc::clone(&self.shared),
            offline: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Make this client's writes, reads and deletes fail with `Unavailable`
    ///
    /// Listeners keep working; they are fed from the store itself.
    pub fn set_offline(&self, offline: bool) {
        self.offline.store(offline, Ordering::SeqCst);
    }

    /// Terminate every live subscription on the store
    pub fn revoke_subscriptions(&self, reason: &str) {
        self.shared.hub.revoke(reason);
    }

    /// Copy of the whole tree
    pub async fn dump(&self) -> Value {
        self.shared.tree.read().await.clone()
    }

    fn ensure_online(&self) -> Result<(), StoreError> {
        if self.offline.load(Ordering::SeqCst) {
            return Err(StoreError::Unavailable);
        }
        Ok(())
    }
}

impl Default for MemoryBackend {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RecordBackend for MemoryBackend {
    async fn write(&self, path: &StorePath, value: Value) -> Result<(), StoreError> {
        self.ensure_online()?;
        {
            let mut root = self.shared.tree.write().await;
            tree::set(&mut root, path, value);
        }
        debug!("Wrote {}", path);
        self.shared.hub.publish(path.clone());
        Ok(())
    }

    async fn read(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        self.ensure_online()?;
        self.snapshot(path).await
    }

    async fn delete(&self, path: &StorePath) -> Result<(), StoreError> {
        self.ensure_online()?;
        {
            let mut root = self.shared.tree.write().await;
            tree::remove(&mut root, path);
        }
        debug!("Deleted {}", path);
        self.shared.hub.publish(path.clone());
        Ok(())
    }

    async fn subscribe(&self, path: &StorePath) -> Result<SnapshotFeed, StoreError> {
        self.ensure_online()?;
        let changes = self.shared.hub.listen();
        Ok(spawn_feed(self.clone(), path.clone(), changes))
    }
}

#[async_trait]
impl SnapshotSource for MemoryBackend {
    async fn snapshot(&self, path: &StorePath) -> Result<Option<Value>, StoreError> {
        let root = self.shared.tree.read().await;
        Ok(tree::get(&root, path).cloned())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn path(s: &str) -> StorePath {
        StorePath::parse(s).unwrap()
    }

    #[tokio::test]
    async fn test_write_read_delete() {
        let backend = MemoryBackend::new();
        backend
            .write(&path("people/Leo"), json!({"name": "Leo", "age": 30.0}))
            .await
            .unwrap();

        let value = backend.read(&path("people/Leo")).await.unwrap();
        assert_eq!(value, Some(json!({"name": "Leo", "age": 30.0})));

        backend.delete(&path("people/Leo")).await.unwrap();
        assert_eq!(backend.read(&path("people/Leo")).await.unwrap(), None);
        assert_eq!(backend.read(&path("people")).await.unwrap(), None);
    }

    #[tokio::test]
    async fn test_connected_clients_share_data() {
        let a = MemoryBackend::new();
        let b = a.connect();

        a.write(&path("people/Ana"), json!({"name": "Ana"}))
            .await
            .unwrap();
        assert_eq!(
            b.read(&path("people/Ana")).await.unwrap(),
            Some(json!({"name": "Ana"}))
        );
    }

    #[tokio::test]
    async fn test_offline_is_per_client() {
        let a = MemoryBackend::new();
        let b = a.connect();
        a.set_offline(true);

        let err = a.write(&path("people/Leo"), json!({"name": "Leo"})).await;
        assert!(matches!(err, Err(StoreError::Unavailable)));
        assert!(matches!(
            a.read(&path("people")).await,
            Err(StoreError::Unavailable)
        ));

        b.write(&path("people/Leo"), json!({"name": "Leo"}))
            .await
            .unwrap();
        a.set_offline(false);
        assert!(a.read(&path("people/Leo")).await.unwrap().is_some());
    }

    #[tokio::test]
    async fn test_subscription_gets_initial_and_changes() {
        let a = MemoryBackend::new();
        let b = a.connect();
        let mut feed = a.subscribe(&path("people")).await.unwrap();

        assert_eq!(feed.next().await.unwrap().unwrap(), None);

        b.write(&path("people/Leo"), json!({"name": "Leo"}))
            .await
            .unwrap();
        assert_eq!(
            feed.next().await.unwrap().unwrap(),
            Some(json!({"Leo": {"name": "Leo"}}))
        );
    }

    #[tokio::test]
    async fn test_subscription_ignores_unrelated_paths() {
        let backend = MemoryBackend::new();
        let mut feed = backend.subscribe(&path("people")).await.unwrap();
        assert_eq!(feed.next().await.unwrap().unwrap(), None);

        backend
            .write(&path("pets/Rex"), json!({"name": "Rex"}))
            .await
            .unwrap();
        backend
            .write(&path("people/Leo"), json!({"name": "Leo"}))
            .await
            .unwrap();

        // The pets write produced no snapshot; the next one is the people write
        assert_eq!(
            feed.next().await.unwrap().unwrap(),
            Some(json!({"Leo": {"name": "Leo"}}))
        );
    }

    #[tokio::test]
    async fn test_revoke_terminates_subscription() {
        let backend = MemoryBackend::new();
        let mut feed = backend.subscribe(&path("people")).await.unwrap();
        feed.next().await.unwrap().unwrap();

        backend.revoke_subscriptions("permission denied");

        let err = feed.next().await.unwrap().unwrap_err();
        assert!(err.to_string().contains("permission denied"));
        assert!(feed.next().await.is_none());
    }
}
