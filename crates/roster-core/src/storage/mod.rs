//! Storage layer
//!
//! Persists the people document to the data directory. The Automerge
//! document is the local copy of the store: reads are served from it when
//! the sync server is unreachable.

pub mod error;
pub mod persistence;

pub use error::{StorageError, StorageResult};
pub use persistence::DocumentPersistence;
