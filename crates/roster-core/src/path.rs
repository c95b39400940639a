//! Hierarchical store paths
//!
//! A `StorePath` is a sequence of validated keys, written `people/Leo`.
//! Keys follow the rules of hierarchical JSON stores: non-empty, no
//! `/ . # $ [ ]`, no control characters, at most 768 bytes.

use std::fmt;

use crate::error::ValidationError;

/// Longest key accepted, in bytes
pub const MAX_KEY_BYTES: usize = 768;

const FORBIDDEN: &[char] = &['/', '.', '#', '$', '[', ']'];

/// Check that `key` can be used as a single path segment
pub fn validate_key(key: &str) -> Result<(), ValidationError> {
    let reason = if key.is_empty() {
        Some("key is empty")
    } else if key.len() > MAX_KEY_BYTES {
        Some("key is longer than 768 bytes")
    } else if key.contains(FORBIDDEN) {
        Some("key contains one of / . # $ [ ]")
    } else if key.chars().any(|c| c.is_ascii_control()) {
        Some("key contains a control character")
    } else {
        None
    };

    match reason {
        Some(reason) => Err(ValidationError::InvalidKey {
            key: key.to_string(),
            reason,
        }),
        None => Ok(()),
    }
}

/// A location in the hierarchical store
#[derive(Debug, Clone, Default, PartialEq, Eq, Hash)]
pub struct StorePath {
    segments: Vec<String>,
}

impl StorePath {
    /// The root of the store
    pub fn root() -> Self {
        Self::default()
    }

    /// Parse a `/`-separated path, ignoring leading, trailing and doubled slashes
    pub fn parse(path: &str) -> Result<Self, ValidationError> {
        let mut parsed = Self::root();
        for segment in path.split('/').filter(|s| !s.is_empty()) {
            parsed = parsed.child(segment)?;
        }
        Ok(parsed)
    }

    /// Top-level path for a key known at compile time
    pub(crate) fn top_level(key: &'static str) -> Self {
        debug_assert!(validate_key(key).is_ok(), "invalid static key {key}");
        Self {
            segments: vec![key.to_string()],
        }
    }

    /// Path of a direct child
    pub fn child(&self, key: &str) -> Result<Self, ValidationError> {
        validate_key(key)?;
        let mut segments = self.segments.clone();
        segments.push(key.to_string());
        Ok(Self { segments })
    }

    pub fn segments(&self) -> &[String] {
        &self.segments
    }

    pub fn is_root(&self) -> bool {
        self.segments.is_empty()
    }

    /// Last segment, `None` for the root
    pub fn key(&self) -> Option<&str> {
        self.segments.last().map(String::as_str)
    }

    /// Parent path, `None` for the root
    pub fn parent(&self) -> Option<Self> {
        if self.is_root() {
            return None;
        }
        Some(Self {
            segments: self.segments[..self.segments.len() - 1].to_vec(),
        })
    }

    /// Whether `self` is `other` or one of its ancestors
    pub fn is_ancestor_of(&self, other: &StorePath) -> bool {
        other.segments.len() >= self.segments.len()
            && other.segments[..self.segments.len()] == self.segments[..]
    }

    /// Whether a change at one path can affect the value at the other
    pub fn overlaps(&self, other: &StorePath) -> bool {
        self.is_ancestor_of(other) || other.is_ancestor_of(self)
    }
}

impl fmt::Display for StorePath {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        if self.is_root() {
            return write!(f, "/");
        }
        write!(f, "{}", self.segments.join("/"))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_and_display() {
        let path = StorePath::parse("/people//Leo/").unwrap();
        assert_eq!(path.segments(), &["people".to_string(), "Leo".to_string()]);
        assert_eq!(path.to_string(), "people/Leo");
        assert_eq!(StorePath::root().to_string(), "/");
    }

    #[test]
    fn test_child_validates_key() {
        let people = StorePath::parse("people").unwrap();
        assert!(people.child("Leo").is_ok());
        assert!(people.child("").is_err());
        assert!(people.child("a.b").is_err());
        assert!(people.child("a#b").is_err());
        assert!(people.child("tab\there").is_err());
        assert!(people.child(&"x".repeat(MAX_KEY_BYTES + 1)).is_err());
        assert!(people.child(&"x".repeat(MAX_KEY_BYTES)).is_ok());
    }

    #[test]
    fn test_spaces_and_unicode_are_valid_keys() {
        assert!(validate_key("Ana María").is_ok());
        assert!(validate_key(" Leo").is_ok());
    }

    #[test]
    fn test_parent_and_key() {
        let path = StorePath::parse("people/Leo").unwrap();
        assert_eq!(path.key(), Some("Leo"));
        assert_eq!(path.parent().unwrap().to_string(), "people");
        assert!(StorePath::root().parent().is_none());
        assert!(StorePath::root().key().is_none());
    }

    #[test]
    fn test_overlaps() {
        let root = StorePath::root();
        let people = StorePath::parse("people").unwrap();
        let leo = StorePath::parse("people/Leo").unwrap();
        let pets = StorePath::parse("pets/Rex").unwrap();

        assert!(people.overlaps(&leo));
        assert!(leo.overlaps(&people));
        assert!(root.overlaps(&leo));
        assert!(people.overlaps(&people));
        assert!(!people.overlaps(&pets));
        assert!(!StorePath::parse("peoples").unwrap().overlaps(&leo));
    }
}
