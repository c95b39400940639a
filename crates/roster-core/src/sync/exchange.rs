//! Connection handshake and sync message exchange
//!
//! Shared by the one-shot client and the live task. The document and the
//! per-peer state are locked in that order, and never across network I/O.

use std::time::Duration;

use anyhow::{anyhow, bail, Context, Result};
use automerge::sync::{Message as SyncMessage, SyncDoc};
use automerge::ChangeHash;
use futures_util::stream::{SplitSink, SplitStream};
use futures_util::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio::sync::Mutex;
use tokio::time::Instant;
use tokio_tungstenite::tungstenite::Message;
use tokio_tungstenite::{connect_async, MaybeTlsStream, WebSocketStream};
use tracing::{debug, warn};

use super::message::{ClientMessage, ServerMessage};
use super::state::SyncState;
use crate::document::RosterDocument;
use crate::document_id::DocumentId;

pub(crate) type WsStream = WebSocketStream<MaybeTlsStream<TcpStream>>;
pub(crate) type WsWrite = SplitSink<WsStream, Message>;
pub(crate) type WsRead = SplitStream<WsStream>;

/// How long to wait for the server's `peer` reply
pub const HANDSHAKE_TIMEOUT: Duration = Duration::from_secs(10);

/// How long an exchange may run before we consider it quiescent
pub const EXCHANGE_TIMEOUT: Duration = Duration::from_secs(10);

/// Generate a peer ID for this process
pub(crate) fn new_peer_id() -> String {
    format!("roster-{}", &uuid::Uuid::new_v4().simple().to_string()[..8])
}

/// Open a WebSocket, send `join` and wait for the server's peer ID
pub(crate) async fn connect(url: &str, peer_id: &str) -> Result<(WsWrite, WsRead, String)> {
    debug!("Connecting to {}", url);
    let (ws_stream, _response) = connect_async(url)
        .await
        .with_context(|| format!("Failed to connect to sync server at {}", url))?;
    let (mut write, mut read) = ws_stream.split();

    send(&mut write, &ClientMessage::join(peer_id)).await?;
    let server_peer_id = wait_for_peer(&mut read, url).await?;
    debug!("Handshake complete, server peer {}", server_peer_id);

    Ok((write, read, server_peer_id))
}

async fn wait_for_peer(read: &mut WsRead, url: &str) -> Result<String> {
    let deadline = Instant::now() + HANDSHAKE_TIMEOUT;

    loop {
        let remaining = deadline.saturating_duration_since(Instant::now());
        if remaining.is_zero() {
            bail!(
                "Timeout waiting for sync server response ({}). Check that the server is running.",
                url
            );
        }

        tokio::select! {
            msg = read.next() => {
                match msg {
                    Some(Ok(Message::Binary(data))) => match ServerMessage::decode(&data) {
                        Ok(ServerMessage::Peer { sender_id, .. }) => return Ok(sender_id),
                        Ok(ServerMessage::Error { message, .. }) => {
                            bail!("Sync server error: {}", message)
                        }
                        Ok(_) => {}
                        Err(e) => warn!("Failed to decode sync server message: {}", e),
                    },
                    Some(Ok(Message::Close(_))) | None => {
                        bail!("Sync server ({}) closed connection during handshake", url)
                    }
                    Some(Err(e)) => bail!("Sync connection error ({}): {}", url, e),
                    Some(Ok(_)) => {}
                }
            }
            _ = tokio::time::sleep(remaining) => {}
        }
    }
}

pub(crate) async fn send(write: &mut WsWrite, msg: &ClientMessage) -> Result<()> {
    let bytes = msg.encode().context("Failed to encode sync message")?;
    write.send(Message::Binary(bytes)).await?;
    Ok(())
}

/// One document being synced with one server peer
pub(crate) struct Exchange<'a> {
    pub peer_id: &'a str,
    pub server_peer_id: &'a str,
    pub doc_id: DocumentId,
    pub doc: &'a Mutex<RosterDocument>,
    pub sync_state: &'a Mutex<SyncState>,
}

impl Exchange<'_> {
    pub async fn heads(&self) -> Vec<ChangeHash> {
        self.doc.lock().await.heads()
    }

    async fn generate(&self) -> Option<Vec<u8>> {
        let mut doc = self.doc.lock().await;
        let mut state = self.sync_state.lock().await;
        let peer_state = state.get_or_create(self.server_peer_id);
        let bytes = doc
            .inner_mut()
            .sync()
            .generate_sync_message(peer_state)
            .map(|m| m.encode());
        bytes
    }

    /// Send our side and process replies until the server has nothing more
    ///
    /// Returns whether the local document changed.
    pub async fn run(&self, write: &mut WsWrite, read: &mut WsRead) -> Result<bool> {
        let before = self.heads().await;

        if let Some(bytes) = self.generate().await {
            let request =
                ClientMessage::request(self.peer_id, self.server_peer_id, &self.doc_id, bytes);
            send(write, &request).await?;
        }

        let deadline = Instant::now() + EXCHANGE_TIMEOUT;
        loop {
            let remaining = deadline.saturating_duration_since(Instant::now());
            if remaining.is_zero() {
                break;
            }

            tokio::select! {
                msg = read.next() => {
                    match msg {
                        Some(Ok(Message::Binary(data))) => match ServerMessage::decode(&data) {
                            Ok(ServerMessage::Sync { data, .. }) => {
                                if !self.receive(&data, write).await? {
                                    break;
                                }
                            }
                            Ok(ServerMessage::DocUnavailable { .. }) => {
                                // New document on the server: upload ours
                                if let Some(bytes) = self.generate().await {
                                    let msg = ClientMessage::sync(
                                        self.peer_id,
                                        self.server_peer_id,
                                        &self.doc_id,
                                        bytes,
                                    );
                                    send(write, &msg).await?;
                                }
                            }
                            Ok(ServerMessage::Error { message, .. }) => {
                                bail!("Sync server error: {}", message)
                            }
                            Ok(_) => {}
                            Err(e) => warn!("Failed to decode sync server message: {}", e),
                        },
                        Some(Ok(Message::Close(_))) | None => break,
                        Some(Err(e)) => return Err(anyhow!("WebSocket error: {}", e)),
                        Some(Ok(_)) => {}
                    }
                }
                _ = tokio::time::sleep(remaining) => break,
            }
        }

        self.save_state().await;
        Ok(self.heads().await != before)
    }

    /// Apply one incoming sync message and answer it
    ///
    /// Returns false once there is nothing left to send.
    pub async fn receive(&self, data: &[u8], write: &mut WsWrite) -> Result<bool> {
        let sync_msg = match SyncMessage::decode(data) {
            Ok(m) => m,
            Err(e) => {
                warn!("Ignoring undecodable sync message: {}", e);
                return Ok(true);
            }
        };

        let response = {
            let mut doc = self.doc.lock().await;
            let mut state = self.sync_state.lock().await;
            let peer_state = state.get_or_create(self.server_peer_id);
            doc.inner_mut()
                .sync()
                .receive_sync_message(peer_state, sync_msg)?;
            let bytes = doc
                .inner_mut()
                .sync()
                .generate_sync_message(peer_state)
                .map(|m| m.encode());
            bytes
        };

        match response {
            Some(bytes) => {
                let msg = ClientMessage::sync(self.peer_id, self.server_peer_id, &self.doc_id, bytes);
                send(write, &msg).await?;
                Ok(true)
            }
            None => Ok(false),
        }
    }

    pub async fn save_state(&self) {
        if let Err(e) = self.sync_state.lock().await.save() {
            warn!("Failed to save sync state: {:#}", e);
        }
    }
}
