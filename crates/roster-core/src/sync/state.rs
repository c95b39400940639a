//! Per-peer sync state
//!
//! Automerge keeps, per peer, what it believes the peer already has. Keeping
//! that between runs makes the next exchange incremental.

use std::collections::HashMap;
use std::fs;
use std::path::PathBuf;

use anyhow::{Context, Result};
use automerge::sync::State as AutomergeSyncState;
use tracing::warn;

use crate::storage::persistence::atomic_write;

#[derive(Debug, Default)]
pub struct SyncState {
    peers: HashMap<String, AutomergeSyncState>,
    path: Option<PathBuf>,
}

impl SyncState {
    /// In-memory only
    pub fn new() -> Self {
        Self::default()
    }

    /// Backed by a JSON file, loading it if present
    pub fn with_path(path: PathBuf) -> Result<Self> {
        let mut state = Self {
            peers: HashMap::new(),
            path: Some(path),
        };
        state.load()?;
        Ok(state)
    }

    pub fn get_or_create(&mut self, peer_id: &str) -> &mut AutomergeSyncState {
        self.peers.entry(peer_id.to_string()).or_default()
    }

    pub fn get(&self, peer_id: &str) -> Option<&AutomergeSyncState> {
        self.peers.get(peer_id)
    }

    /// Write the encoded states to disk (no-op when in-memory)
    pub fn save(&self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };

        let data: HashMap<&str, Vec<u8>> = self
            .peers
            .iter()
            .map(|(peer, state)| (peer.as_str(), state.encode()))
            .collect();
        let json = serde_json::to_vec(&data)?;

        atomic_write(path, &json).context("Failed to save sync state")?;
        Ok(())
    }

    fn load(&mut self) -> Result<()> {
        let Some(path) = &self.path else {
            return Ok(());
        };
        if !path.exists() {
            return Ok(());
        }

        let json = fs::read_to_string(path).context("Failed to read sync state")?;
        let data: HashMap<String, Vec<u8>> =
            serde_json::from_str(&json).context("Failed to parse sync state")?;

        for (peer_id, bytes) in data {
            match AutomergeSyncState::decode(&bytes) {
                Ok(state) => {
                    self.peers.insert(peer_id, state);
                }
                Err(e) => warn!("Dropping unreadable sync state for {}: {}", peer_id, e),
            }
        }
        Ok(())
    }

    /// Forget every peer, forcing a full exchange next time
    pub fn clear(&mut self) {
        self.peers.clear();
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_new_peer_state_is_fresh() {
        let mut state = SyncState::new();
        assert!(state.get("server").is_none());
        assert!(state.get_or_create("server").their_heads.is_none());
        assert_eq!(state.peer_count(), 1);
    }

    #[test]
    fn test_saved_state_is_reloaded() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync_state.json");

        let mut state = SyncState::with_path(path.clone()).unwrap();
        state.get_or_create("server-a");
        state.get_or_create("server-b");
        state.save().unwrap();

        let reloaded = SyncState::with_path(path).unwrap();
        assert_eq!(reloaded.peer_count(), 2);
        assert!(reloaded.get("server-a").is_some());
    }

    #[test]
    fn test_in_memory_save_is_noop() {
        let mut state = SyncState::new();
        state.get_or_create("server");
        state.save().unwrap();
    }

    #[test]
    fn test_clear() {
        let mut state = SyncState::new();
        state.get_or_create("a");
        state.get_or_create("b");
        state.clear();
        assert_eq!(state.peer_count(), 0);
    }

    #[test]
    fn test_corrupt_file_is_an_error() {
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("sync_state.json");
        fs::write(&path, "{not json").unwrap();

        assert!(SyncState::with_path(path).is_err());
    }
}
