//! Roster Core Library
//!
//! This crate provides the core of Roster: a people collection kept in a
//! hierarchical record store and delivered live to every client, plus an
//! authentication session bridge.
//!
//! # Architecture
//!
//! - **SessionManager**: sign-in state, mirrored from an [`IdentityProvider`]
//! - **PeopleStore**: CRUD and a full-snapshot live listener over a [`RecordBackend`]
//! - **Backends**: [`MemoryBackend`] for in-process use, [`DocumentBackend`]
//!   for an Automerge document persisted locally and synced over WebSocket
//!
//! The two components never talk to each other; the application owns one of
//! each and hands them their backends.
//!
//! # Quick Start
//!
//! ```text
//! let store = PeopleStore::new(Arc::new(DocumentBackend::open(&config)?));
//!
//! store.save_input("Leo", "30").await?;
//! let people = store.load_all().await?;
//!
//! let mut watcher = store.on_collection_changed().await?;
//! while let Some(Ok(snapshot)) = watcher.next().await {
//!     // redraw with the full collection
//! }
//! ```
//!
//! # Modules
//!
//! - `session`: session manager and watcher
//! - `people`: people collection and live watcher
//! - `view`: incremental view over snapshots
//! - `notice`: status notices for presenters
//! - `auth`: identity provider boundary and local provider
//! - `backend`: record backend boundary and implementations
//! - `models`: Person, User, Credentials
//! - `path`: store paths and key rules
//! - `document`: Automerge document handling
//! - `document_id`: Document ID compatible with automerge-repo
//! - `identity`: first-run setup, new or joined document
//! - `storage`: Automerge persistence
//! - `sync`: automerge-repo sync client
//! - `config`: Application configuration
//! - `error`: error taxonomy

pub mod auth;
pub mod backend;
pub mod config;
pub mod document;
pub mod document_id;
pub mod error;
pub mod identity;
pub mod models;
pub mod notice;
pub mod path;
pub mod people;
pub mod session;
pub mod storage;
pub mod sync;
pub mod view;

pub use auth::{IdentityProvider, LocalIdentityProvider};
pub use backend::{DocumentBackend, MemoryBackend, RecordBackend, SnapshotFeed};
pub use config::{Account, Config};
pub use document::{DocumentError, RosterDocument};
pub use document_id::{DocumentId, DocumentIdError};
pub use error::{AuthError, CoreError, CoreResult, StoreError, SubscriptionError, ValidationError};
pub use identity::{Identity, InitResult};
pub use models::{Credentials, Person, User};
pub use notice::{Notice, Operation};
pub use path::StorePath;
pub use people::{CollectionWatcher, PeopleStore};
pub use session::{SessionManager, SessionState, SessionWatcher};
pub use storage::{DocumentPersistence, StorageError};
pub use view::{PeopleView, ViewDelta};
