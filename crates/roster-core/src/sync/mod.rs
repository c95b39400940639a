//! Remote sync with an automerge-repo sync server
//!
//! The people document can be shared between devices through a WebSocket
//! sync server speaking the automerge-repo protocol:
//!
//! 1. Connect and send `join` with our peer ID
//! 2. Wait for the server's `peer` reply
//! 3. Send a `request` carrying our first Automerge sync message
//! 4. Exchange `sync` messages until neither side has anything to send
//!
//! [`SyncClient`] does this once. [`spawn_live_sync`] keeps the connection
//! open, pushes on demand and reports remote changes as they arrive.

mod client;
mod exchange;
mod live;
mod message;
mod state;

pub use client::{SyncClient, SyncStatus};
pub use exchange::{EXCHANGE_TIMEOUT, HANDSHAKE_TIMEOUT};
pub use live::{
    spawn_live_sync, ConnectionStatus, LiveSyncConfig, LiveSyncHandle, SyncCommand, SyncEvent,
};
pub use message::{ClientMessage, PeerMetadata, ServerMessage};
pub use state::SyncState;
