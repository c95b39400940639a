//! Automerge document persistence
//!
//! Saves and loads the people document to/from the data directory. Writes
//! are atomic (temp file, fsync, rename) so a crash never leaves a
//! half-written document behind.
//!
//! Files:
//! - `people.automerge` - the Automerge binary document
//! - `doc_id` - the document ID (bs58check), readable without loading the document

use std::fs::{self, File};
use std::io::Write;
use std::path::{Path, PathBuf};

use tracing::{debug, warn};

use super::error::{StorageError, StorageResult};
use crate::config::Config;
use crate::document::RosterDocument;
use crate::document_id::DocumentId;

/// Persistence layer for the people document
#[derive(Debug, Clone)]
pub struct DocumentPersistence {
    document_path: PathBuf,
    doc_id_path: PathBuf,
}

impl DocumentPersistence {
    /// Create a persistence handler for the configured data directory
    pub fn new(config: &Config) -> Self {
        Self {
            document_path: config.document_path(),
            doc_id_path: config.doc_id_path(),
        }
    }

    pub fn document_path(&self) -> &Path {
        &self.document_path
    }

    /// Check if a document exists on disk
    pub fn exists(&self) -> bool {
        self.document_path.exists()
    }

    /// Size of the document file in bytes, 0 if missing
    pub fn document_size(&self) -> u64 {
        fs::metadata(&self.document_path)
            .map(|m| m.len())
            .unwrap_or(0)
    }

    /// Whether a document ID is recorded, with or without a document
    pub fn has_identity(&self) -> bool {
        self.doc_id_path.exists()
    }

    /// Joined another device's document but never received it
    pub fn is_pending_sync(&self) -> bool {
        self.has_identity() && !self.exists()
    }

    /// Save a document atomically, along with its ID
    ///
    /// A joined document that has not synced yet only records its ID; its
    /// first real save happens once sync has filled it.
    pub fn save(&self, doc: &mut RosterDocument) -> StorageResult<()> {
        if !doc.is_initialized() {
            debug!("Document {} not synced yet, saving ID only", doc.id());
            return self.save_doc_id(doc.id());
        }

        let bytes = doc.save();
        atomic_write(&self.document_path, &bytes)?;
        atomic_write(&self.doc_id_path, doc.id().to_bs58check().as_bytes())?;
        debug!("Saved document ({} bytes)", bytes.len());
        Ok(())
    }

    /// Load the document from disk
    ///
    /// Returns `None` if no document has been saved. A document that cannot
    /// be parsed is moved to `people.automerge.corrupt` and reported as
    /// `CorruptDocument`.
    pub fn load(&self) -> StorageResult<Option<RosterDocument>> {
        let path = &self.document_path;
        if !path.exists() {
            return Ok(None);
        }

        let bytes = fs::read(path).map_err(|e| StorageError::from_read(e, path.clone()))?;

        match RosterDocument::load(&bytes) {
            Ok(doc) => Ok(Some(doc)),
            Err(e) => {
                let backup_path = path.with_extension("automerge.corrupt");
                warn!("Document at {:?} is corrupted, moving it aside", path);
                fs::rename(path, &backup_path)
                    .map_err(|io| StorageError::from_io(io, backup_path.clone()))?;
                Err(StorageError::CorruptDocument {
                    path: path.clone(),
                    backup_path,
                    details: e.to_string(),
                })
            }
        }
    }

    /// Load the existing document or create and save a new one
    ///
    /// When only a document ID is on disk (joined another device but never
    /// synced), an empty document with that ID is returned and nothing is
    /// written, so the first sync can fill it.
    pub fn load_or_create(&self) -> StorageResult<RosterDocument> {
        if let Some(doc) = self.load()? {
            return Ok(doc);
        }

        if let Some(id) = self.load_doc_id()? {
            debug!("Waiting for first sync of joined document {}", id);
            return Ok(RosterDocument::empty(id));
        }

        let mut doc = RosterDocument::new();
        self.save(&mut doc)?;
        Ok(doc)
    }

    /// Record a document ID to join before any document exists locally
    pub fn save_doc_id(&self, id: &DocumentId) -> StorageResult<()> {
        atomic_write(&self.doc_id_path, id.to_bs58check().as_bytes())
    }

    /// Load the document ID from disk
    pub fn load_doc_id(&self) -> StorageResult<Option<DocumentId>> {
        let path = &self.doc_id_path;
        if !path.exists() {
            return Ok(None);
        }

        let content =
            fs::read_to_string(path).map_err(|e| StorageError::from_read(e, path.clone()))?;
        let id = DocumentId::from_bs58check(content.trim()).map_err(|e| {
            StorageError::InvalidDocumentId {
                path: path.clone(),
                details: e.to_string(),
            }
        })?;
        Ok(Some(id))
    }

    /// Delete all stored data
    pub fn delete_all(&self) -> StorageResult<()> {
        for path in [&self.document_path, &self.doc_id_path] {
            if path.exists() {
                fs::remove_file(path).map_err(|e| StorageError::from_io(e, path.clone()))?;
            }
        }
        Ok(())
    }
}

/// Write data to a file atomically
///
/// 1. Write to a temporary file in the same directory
/// 2. Sync the file to disk
/// 3. Rename the temp file to the target path
pub(crate) fn atomic_write(path: &Path, data: &[u8]) -> StorageResult<()> {
    if let Some(parent) = path.parent() {
        fs::create_dir_all(parent).map_err(|e| StorageError::from_io(e, parent.to_path_buf()))?;
    }

    let temp_path = path.with_extension("tmp");

    let mut file =
        File::create(&temp_path).map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.write_all(data)
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;
    file.sync_all()
        .map_err(|e| StorageError::from_io(e, temp_path.clone()))?;

    fs::rename(&temp_path, path).map_err(|e| StorageError::from_io(e, path.to_path_buf()))?;
    Ok(())
}
