//! Document identity and first-run setup
//!
//! The people document ID decides which collection a client works on. A
//! client either starts its own document or joins one created elsewhere by
//! recording that document's ID and waiting for sync to deliver it.

use anyhow::{Context, Result};

use crate::config::Config;
use crate::document::RosterDocument;
use crate::document_id::DocumentId;
use crate::storage::DocumentPersistence;

/// Identity manager for the people document
pub struct Identity {
    persistence: DocumentPersistence,
}

/// Result of initialization
#[derive(Debug)]
pub struct InitResult {
    pub doc_id: DocumentId,
    /// Whether a new document was created (vs joining an existing one)
    pub is_new: bool,
}

impl Identity {
    pub fn with_config(config: &Config) -> Self {
        Self {
            persistence: DocumentPersistence::new(config),
        }
    }

    /// Whether a document ID is recorded
    ///
    /// True even while waiting for the first sync of a joined document; see
    /// [`Identity::is_pending_sync`].
    pub fn is_initialized(&self) -> bool {
        self.persistence.has_identity() || self.persistence.exists()
    }

    pub fn has_local_document(&self) -> bool {
        self.persistence.exists()
    }

    /// Joined a document whose content has not arrived yet
    pub fn is_pending_sync(&self) -> bool {
        self.persistence.is_pending_sync()
    }

    pub fn doc_id(&self) -> Result<Option<DocumentId>> {
        Ok(self.persistence.load_doc_id()?)
    }

    /// Start a new people document with a random ID
    pub fn initialize_new(&self) -> Result<InitResult> {
        self.ensure_uninitialized()?;

        let mut doc = RosterDocument::new();
        let doc_id = *doc.id();
        self.persistence
            .save(&mut doc)
            .context("Failed to save people document")?;

        Ok(InitResult {
            doc_id,
            is_new: true,
        })
    }

    /// Join the people document of another client
    ///
    /// Only the ID is stored. The document itself is pulled from the sync
    /// server, and writes are refused until it has been.
    pub fn initialize_join(&self, doc_id: DocumentId) -> Result<InitResult> {
        self.ensure_uninitialized()?;

        self.persistence
            .save_doc_id(&doc_id)
            .context("Failed to save document ID")?;

        Ok(InitResult {
            doc_id,
            is_new: false,
        })
    }

    fn ensure_uninitialized(&self) -> Result<()> {
        if self.is_initialized() {
            anyhow::bail!("Already initialized. Use `roster status` to see the document ID.");
        }
        Ok(())
    }
}
