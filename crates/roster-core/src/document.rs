//! Automerge document handling
//!
//! The people data lives in an Automerge document so that it can be synced
//! with other devices. The document holds an arbitrary JSON tree under the
//! `data` key; this module translates between that tree and `serde_json`
//! values addressed by [`StorePath`].

use std::borrow::Cow;
use std::fmt;

use automerge::{
    transaction::Transactable, AutoCommit, ChangeHash, ObjId, ObjType, ReadDoc, ScalarValue,
    Value as AmValue, ROOT,
};
use serde_json::{Map, Number, Value};
use thiserror::Error;

use crate::backend::tree;
use crate::document_id::DocumentId;
use crate::path::StorePath;
use crate::people::COLLECTION;

/// Errors that can occur during document operations
#[derive(Error, Debug)]
pub enum DocumentError {
    #[error("Automerge error: {0}")]
    Automerge(#[from] automerge::AutomergeError),

    #[error("Missing required field: {0}")]
    MissingField(String),

    #[error("Invalid field type for {0}")]
    InvalidType(String),

    #[error("Invalid document ID: {0}")]
    InvalidId(String),

    #[error("Document has not been synced yet")]
    NotSynced,
}

/// Keys used at the document root
mod keys {
    pub const SCHEMA_VERSION: &str = "schema_version";
    pub const DOC_ID: &str = "doc_id";
    pub const DATA: &str = "data";
}

/// Current schema version
pub const CURRENT_SCHEMA_VERSION: u64 = 1;

/// Collections created with the document
///
/// These maps, like `data` itself, are only ever emptied and never
/// replaced, so every copy writes records into the same Automerge object
/// and concurrent writes to different keys merge.
const COLLECTIONS: &[&str] = &[COLLECTION];

/// The people document backed by Automerge
pub struct RosterDocument {
    id: DocumentId,
    doc: AutoCommit,
}

impl RosterDocument {
    /// Create a new empty document with a random ID
    pub fn new() -> Self {
        Self::with_id(DocumentId::new())
    }

    /// Create a new empty document with a specific ID
    pub fn with_id(id: DocumentId) -> Self {
        let mut doc = AutoCommit::new();
        // Writes to a fresh document's root cannot fail
        let _ = doc.put(ROOT, keys::SCHEMA_VERSION, CURRENT_SCHEMA_VERSION);
        let _ = doc.put(ROOT, keys::DOC_ID, id.to_bs58check());
        if let Ok(data) = doc.put_object(ROOT, keys::DATA, ObjType::Map) {
            for collection in COLLECTIONS {
                let _ = doc.put_object(&data, *collection, ObjType::Map);
            }
        }
        Self { id, doc }
    }

    /// Create a document that only knows its ID, for joining via sync
    ///
    /// Its content arrives from the first sync with a peer. Until then it
    /// refuses local writes: anything written now would live in maps of its
    /// own and lose to the peer's on merge.
    pub fn empty(id: DocumentId) -> Self {
        Self {
            id,
            doc: AutoCommit::new(),
        }
    }

    /// Load a document from Automerge bytes
    pub fn load(bytes: &[u8]) -> Result<Self, DocumentError> {
        let doc = AutoCommit::load(bytes)?;

        let id_str = match doc.get(ROOT, keys::DOC_ID)? {
            Some((value, _)) => value
                .to_str()
                .map(|s| s.to_string())
                .ok_or_else(|| DocumentError::InvalidType(keys::DOC_ID.to_string()))?,
            None => return Err(DocumentError::MissingField(keys::DOC_ID.to_string())),
        };

        let id = DocumentId::from_bs58check(&id_str)
            .map_err(|e| DocumentError::InvalidId(e.to_string()))?;

        Ok(Self { id, doc })
    }

    pub fn id(&self) -> &DocumentId {
        &self.id
    }

    /// Whether the shared data map is present
    ///
    /// False only for a document made with [`RosterDocument::empty`] that
    /// has not synced yet.
    pub fn is_initialized(&self) -> bool {
        matches!(
            self.doc.get(ROOT, keys::DATA),
            Ok(Some((AmValue::Object(ObjType::Map), _)))
        )
    }

    /// Get the Automerge URL for this document
    pub fn url(&self) -> String {
        self.id.to_url()
    }

    /// Save the document to bytes
    pub fn save(&mut self) -> Vec<u8> {
        self.doc.save()
    }

    /// Current heads, used to detect whether a sync changed anything
    pub fn heads(&mut self) -> Vec<ChangeHash> {
        self.doc.get_heads()
    }

    /// Fork the document, as another device holding a copy would
    pub fn fork(&mut self) -> Self {
        Self {
            id: self.id,
            doc: self.doc.fork(),
        }
    }

    /// Merge another copy of the document into this one
    pub fn merge(&mut self, other: &mut RosterDocument) -> Result<(), DocumentError> {
        self.doc.merge(&mut other.doc)?;
        Ok(())
    }

    /// Get the underlying Automerge document mutably (for sync)
    pub fn inner_mut(&mut self) -> &mut AutoCommit {
        &mut self.doc
    }

    // ==================== Tree access ====================

    /// Read the value at `path`
    pub fn get(&self, path: &StorePath) -> Result<Option<Value>, DocumentError> {
        let Some((value, id)) = self.resolve(path.segments())? else {
            return Ok(None);
        };
        Ok(tree::normalize(self.read_value(value, &id)?))
    }

    /// Replace the value at `path`, creating parent maps as needed
    ///
    /// Writing to the root or to a collection replaces its children in
    /// place; such a value must be a map.
    pub fn put(&mut self, path: &StorePath, value: Value) -> Result<(), DocumentError> {
        self.ensure_initialized()?;
        let Some(value) = tree::normalize(value) else {
            return self.delete(path);
        };

        let segments = path.segments();
        if is_shared(segments) {
            let Value::Object(children) = value else {
                return Err(DocumentError::InvalidType(path.to_string()));
            };
            let obj = self.shared_map(segments)?;
            return self.replace_children(&obj, segments, children);
        }

        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };
        let mut obj = self.data_id_or_create()?;
        for key in parents {
            obj = self.ensure_map(&obj, key)?;
        }
        self.write_into_map(&obj, last, value)
    }

    /// Delete the value at `path`
    ///
    /// Parents left empty stay in the document; reads never show them.
    pub fn delete(&mut self, path: &StorePath) -> Result<(), DocumentError> {
        self.ensure_initialized()?;

        let segments = path.segments();
        if is_shared(segments) {
            let obj = self.shared_map(segments)?;
            return self.replace_children(&obj, segments, Map::new());
        }

        let Some((last, parents)) = segments.split_last() else {
            return Ok(());
        };
        let Some((AmValue::Object(ObjType::Map), parent)) = self.resolve(parents)? else {
            return Ok(());
        };
        if self.doc.get(&parent, last.as_str())?.is_some() {
            self.doc.delete(&parent, last.as_str())?;
        }
        Ok(())
    }

    // ==================== Internals ====================

    fn ensure_initialized(&self) -> Result<(), DocumentError> {
        if self.is_initialized() {
            Ok(())
        } else {
            Err(DocumentError::NotSynced)
        }
    }

    fn data_id(&self) -> Result<Option<ObjId>, DocumentError> {
        Ok(self.doc.get(ROOT, keys::DATA)?.map(|(_, id)| id))
    }

    fn data_id_or_create(&mut self) -> Result<ObjId, DocumentError> {
        let existing = match self.doc.get(ROOT, keys::DATA)? {
            Some((AmValue::Object(ObjType::Map), id)) => Some(id),
            _ => None,
        };
        match existing {
            Some(id) => Ok(id),
            None => Ok(self.doc.put_object(ROOT, keys::DATA, ObjType::Map)?),
        }
    }

    /// Walk from the data root; the root itself resolves to the data map
    fn resolve(&self, segments: &[String]) -> Result<Option<(AmValue<'static>, ObjId)>, DocumentError> {
        let Some(data) = self.data_id()? else {
            return Ok(None);
        };
        let mut current: (AmValue<'static>, ObjId) = (AmValue::Object(ObjType::Map), data);
        for key in segments {
            let (AmValue::Object(ObjType::Map), id) = &current else {
                return Ok(None);
            };
            let next = match self.doc.get(id, key.as_str())? {
                Some((value, next_id)) => (owned(value), next_id),
                None => return Ok(None),
            };
            current = next;
        }
        Ok(Some(current))
    }

    fn ensure_map(&mut self, parent: &ObjId, key: &str) -> Result<ObjId, DocumentError> {
        let existing = match self.doc.get(parent, key)? {
            Some((AmValue::Object(ObjType::Map), id)) => Some(id),
            _ => None,
        };
        match existing {
            Some(id) => Ok(id),
            None => Ok(self.doc.put_object(parent, key, ObjType::Map)?),
        }
    }

    /// The data map or one of the collections, created if missing
    fn shared_map(&mut self, segments: &[String]) -> Result<ObjId, DocumentError> {
        let mut obj = self.data_id_or_create()?;
        for key in segments {
            obj = self.ensure_map(&obj, key)?;
        }
        Ok(obj)
    }

    /// Make the shared map `obj` hold exactly `children`
    fn replace_children(
        &mut self,
        obj: &ObjId,
        segments: &[String],
        mut children: Map<String, Value>,
    ) -> Result<(), DocumentError> {
        let existing: Vec<String> = self.doc.keys(obj).collect();
        for key in existing {
            let child_path = child_segments(segments, &key);
            if is_shared(&child_path) {
                let value = children.remove(&key).unwrap_or(Value::Object(Map::new()));
                let Value::Object(grandchildren) = value else {
                    return Err(DocumentError::InvalidType(key));
                };
                let child = self.ensure_map(obj, &key)?;
                self.replace_children(&child, &child_path, grandchildren)?;
            } else if !children.contains_key(&key) {
                self.doc.delete(obj, key.as_str())?;
            }
        }

        for (key, value) in children {
            let child_path = child_segments(segments, &key);
            if is_shared(&child_path) {
                let Value::Object(grandchildren) = value else {
                    return Err(DocumentError::InvalidType(key));
                };
                let child = self.ensure_map(obj, &key)?;
                self.replace_children(&child, &child_path, grandchildren)?;
            } else {
                self.write_into_map(obj, &key, value)?;
            }
        }
        Ok(())
    }

    fn write_into_map(&mut self, obj: &ObjId, key: &str, value: Value) -> Result<(), DocumentError> {
        match value {
            Value::Object(map) => {
                let child = self.doc.put_object(obj, key, ObjType::Map)?;
                for (k, v) in map {
                    self.write_into_map(&child, &k, v)?;
                }
            }
            Value::Array(items) => {
                let child = self.doc.put_object(obj, key, ObjType::List)?;
                for (index, item) in items.into_iter().enumerate() {
                    self.insert_into_list(&child, index, item)?;
                }
            }
            scalar => {
                self.doc.put(obj, key, json_to_scalar(&scalar))?;
            }
        }
        Ok(())
    }

    fn insert_into_list(&mut self, list: &ObjId, index: usize, value: Value) -> Result<(), DocumentError> {
        match value {
            Value::Object(map) => {
                let child = self.doc.insert_object(list, index, ObjType::Map)?;
                for (k, v) in map {
                    self.write_into_map(&child, &k, v)?;
                }
            }
            Value::Array(items) => {
                let child = self.doc.insert_object(list, index, ObjType::List)?;
                for (i, item) in items.into_iter().enumerate() {
                    self.insert_into_list(&child, i, item)?;
                }
            }
            scalar => {
                self.doc.insert(list, index, json_to_scalar(&scalar))?;
            }
        }
        Ok(())
    }

    fn read_value(&self, value: AmValue<'_>, id: &ObjId) -> Result<Value, DocumentError> {
        match value {
            AmValue::Object(ObjType::Map) | AmValue::Object(ObjType::Table) => {
                let mut map = Map::new();
                for key in self.doc.keys(id) {
                    if let Some((child, child_id)) = self.doc.get(id, key.as_str())? {
                        map.insert(key, self.read_value(child, &child_id)?);
                    }
                }
                Ok(Value::Object(map))
            }
            AmValue::Object(ObjType::List) => {
                let mut items = Vec::new();
                for index in 0..self.doc.length(id) {
                    if let Some((child, child_id)) = self.doc.get(id, index)? {
                        items.push(self.read_value(child, &child_id)?);
                    }
                }
                Ok(Value::Array(items))
            }
            AmValue::Object(ObjType::Text) => Ok(Value::String(self.doc.text(id)?)),
            AmValue::Scalar(scalar) => Ok(scalar_to_json(&scalar)),
        }
    }
}

impl Default for RosterDocument {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for RosterDocument {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("RosterDocument")
            .field("id", &self.id)
            .field("initialized", &self.is_initialized())
            .finish()
    }
}

/// Whether `segments` names the data map or a collection
fn is_shared(segments: &[String]) -> bool {
    match segments {
        [] => true,
        [key] => COLLECTIONS.contains(&key.as_str()),
        _ => false,
    }
}

fn child_segments(segments: &[String], key: &str) -> Vec<String> {
    let mut child = segments.to_vec();
    child.push(key.to_string());
    child
}

/// Detach a value from the document borrow
fn owned(value: AmValue<'_>) -> AmValue<'static> {
    match value {
        AmValue::Object(obj_type) => AmValue::Object(obj_type),
        AmValue::Scalar(scalar) => AmValue::Scalar(Cow::Owned(scalar.into_owned())),
    }
}

fn json_to_scalar(value: &Value) -> ScalarValue {
    match value {
        Value::Bool(b) => ScalarValue::Boolean(*b),
        Value::Number(n) => {
            if let Some(i) = n.as_i64() {
                ScalarValue::Int(i)
            } else if let Some(u) = n.as_u64() {
                ScalarValue::Uint(u)
            } else {
                ScalarValue::F64(n.as_f64().unwrap_or_default())
            }
        }
        Value::String(s) => ScalarValue::Str(s.as_str().into()),
        _ => ScalarValue::Null,
    }
}

fn scalar_to_json(scalar: &ScalarValue) -> Value {
    match scalar {
        ScalarValue::Str(s) => Value::String(s.to_string()),
        ScalarValue::Int(i) => Value::from(*i),
        ScalarValue::Uint(u) => Value::from(*u),
        ScalarValue::F64(f) => Number::from_f64(*f).map(Value::Number).unwrap_or(Value::Null),
        ScalarValue::Boolean(b) => Value::Bool(*b),
        ScalarValue::Timestamp(t) => Value::from(*t),
        _ => Value::Null,
    }
}
