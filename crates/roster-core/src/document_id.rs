//! Document ID compatible with automerge-repo
//!
//! automerge-repo identifies documents by 16 random bytes, written as
//! bs58check text and as `automerge:<bs58check>` URLs.

use std::fmt;
use std::str::FromStr;

use thiserror::Error;
use uuid::Uuid;

const URL_PREFIX: &str = "automerge:";

#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum DocumentIdError {
    #[error("invalid bs58check encoding: {0}")]
    Encoding(String),

    #[error("document ID must be 16 bytes, got {0}")]
    Length(usize),
}

/// Identifier of the people document
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct DocumentId([u8; 16]);

impl DocumentId {
    /// Generate a new random ID
    pub fn new() -> Self {
        Self(*Uuid::new_v4().as_bytes())
    }

    pub fn from_bytes(bytes: [u8; 16]) -> Self {
        Self(bytes)
    }

    pub fn as_bytes(&self) -> &[u8; 16] {
        &self.0
    }

    /// Encode as bs58check
    pub fn to_bs58check(&self) -> String {
        bs58::encode(self.0).with_check().into_string()
    }

    /// Decode from bs58check, accepting an `automerge:` URL as well
    pub fn from_bs58check(s: &str) -> Result<Self, DocumentIdError> {
        let s = s.trim();
        let s = s.strip_prefix(URL_PREFIX).unwrap_or(s);
        let bytes = bs58::decode(s)
            .with_check(None)
            .into_vec()
            .map_err(|e| DocumentIdError::Encoding(e.to_string()))?;
        let array: [u8; 16] = bytes
            .as_slice()
            .try_into()
            .map_err(|_| DocumentIdError::Length(bytes.len()))?;
        Ok(Self(array))
    }

    /// The automerge-repo URL for this document
    pub fn to_url(&self) -> String {
        format!("{}{}", URL_PREFIX, self.to_bs58check())
    }
}

impl Default for DocumentId {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Display for DocumentId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.to_bs58check())
    }
}

impl FromStr for DocumentId {
    type Err = DocumentIdError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::from_bs58check(s)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_bs58check_parses_back() {
        let id = DocumentId::new();
        let parsed = DocumentId::from_bs58check(&id.to_bs58check()).unwrap();
        assert_eq!(id, parsed);
    }

    #[test]
    fn test_url_accepted() {
        let id = DocumentId::new();
        let url = id.to_url();
        assert!(url.starts_with("automerge:"));
        assert_eq!(url.parse::<DocumentId>().unwrap(), id);
    }

    #[test]
    fn test_rejects_garbage() {
        assert!(DocumentId::from_bs58check("not-an-id!").is_err());
        // Valid bs58check but wrong length
        let short = bs58::encode([1u8, 2, 3]).with_check().into_string();
        assert_eq!(
            DocumentId::from_bs58check(&short),
            Err(DocumentIdError::Length(3))
        );
    }
}
