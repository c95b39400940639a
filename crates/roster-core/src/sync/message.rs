//! automerge-repo wire messages
//!
//! Every frame on the WebSocket is one CBOR-encoded map with a `type` tag.

use serde::{Deserialize, Serialize};

use crate::document_id::DocumentId;

/// Peer ID as used on the wire
pub type PeerId = String;

/// The only protocol version we speak
pub const PROTOCOL_V1: &str = "1";

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PeerMetadata {
    #[serde(default)]
    pub storage_id: Option<String>,
    #[serde(default)]
    pub is_ephemeral: bool,
}

/// Frames we send
#[derive(Debug, Clone, Serialize)]
#[serde(tag = "type")]
pub enum ClientMessage {
    #[serde(rename = "join")]
    Join {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "peerMetadata")]
        peer_metadata: PeerMetadata,
        #[serde(rename = "supportedProtocolVersions")]
        supported_protocol_versions: Vec<String>,
    },

    /// Ask for a document, carrying our first sync message
    #[serde(rename = "request")]
    Request {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "targetId")]
        target_id: PeerId,
        #[serde(rename = "documentId")]
        document_id: String,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },

    #[serde(rename = "sync")]
    Sync {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "targetId")]
        target_id: PeerId,
        #[serde(rename = "documentId")]
        document_id: String,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },
}

/// Frames the server sends
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "type")]
pub enum ServerMessage {
    /// Handshake reply
    #[serde(rename = "peer")]
    Peer {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "targetId")]
        target_id: PeerId,
        #[serde(rename = "peerMetadata", default)]
        peer_metadata: PeerMetadata,
        #[serde(rename = "selectedProtocolVersion")]
        selected_protocol_version: String,
    },

    #[serde(rename = "sync")]
    Sync {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "targetId")]
        target_id: PeerId,
        #[serde(rename = "documentId")]
        document_id: String,
        #[serde(with = "serde_bytes")]
        data: Vec<u8>,
    },

    #[serde(rename = "error")]
    Error {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "targetId")]
        target_id: PeerId,
        message: String,
    },

    /// The server has never seen the document
    #[serde(rename = "doc-unavailable")]
    DocUnavailable {
        #[serde(rename = "senderId")]
        sender_id: PeerId,
        #[serde(rename = "targetId")]
        target_id: PeerId,
        #[serde(rename = "documentId")]
        document_id: String,
    },
}

impl ClientMessage {
    pub fn join(sender_id: &str) -> Self {
        ClientMessage::Join {
            sender_id: sender_id.to_string(),
            peer_metadata: PeerMetadata::default(),
            supported_protocol_versions: vec![PROTOCOL_V1.to_string()],
        }
    }

    pub fn request(sender_id: &str, target_id: &str, doc_id: &DocumentId, data: Vec<u8>) -> Self {
        ClientMessage::Request {
            sender_id: sender_id.to_string(),
            target_id: target_id.to_string(),
            document_id: doc_id.to_bs58check(),
            data,
        }
    }

    pub fn sync(sender_id: &str, target_id: &str, doc_id: &DocumentId, data: Vec<u8>) -> Self {
        ClientMessage::Sync {
            sender_id: sender_id.to_string(),
            target_id: target_id.to_string(),
            document_id: doc_id.to_bs58check(),
            data,
        }
    }

    /// Encode to CBOR
    pub fn encode(&self) -> Result<Vec<u8>, ciborium::ser::Error<std::io::Error>> {
        let mut bytes = Vec::new();
        ciborium::into_writer(self, &mut bytes)?;
        Ok(bytes)
    }
}

impl ServerMessage {
    /// Decode from CBOR
    pub fn decode(bytes: &[u8]) -> Result<Self, ciborium::de::Error<std::io::Error>> {
        ciborium::from_reader(bytes)
    }
}
