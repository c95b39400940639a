//! Data models for Roster
//!
//! `Person` is the only record type. `User` and `Credentials` carry session
//! state across the identity provider boundary.

use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::ValidationError;
use crate::path::validate_key;

/// A person record in the `people` collection
///
/// The name is the record's identity: it is used verbatim as the storage
/// key, so two people with the same name are the same record.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct Person {
    #[serde(default)]
    pub name: String,
    #[serde(default)]
    pub age: Option<f64>,
}

impl Person {
    /// Create a person with an age
    pub fn new(name: impl Into<String>, age: f64) -> Self {
        Self {
            name: name.into(),
            age: Some(age),
        }
    }

    /// Create a person without an age
    pub fn unaged(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            age: None,
        }
    }

    /// Build a person from raw form input
    ///
    /// Both fields are required. The name is kept verbatim; the age text is
    /// trimmed and must parse as a finite number.
    pub fn from_input(name: &str, age: &str) -> Result<Self, ValidationError> {
        if name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        let age = parse_age(age)?;
        let person = Self::new(name, age);
        person.validate()?;
        Ok(person)
    }

    /// Check that this person can be written to the store
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.name.trim().is_empty() {
            return Err(ValidationError::MissingField("name"));
        }
        validate_key(&self.name)?;
        if let Some(age) = self.age {
            if !age.is_finite() {
                return Err(ValidationError::InvalidAge(age.to_string()));
            }
        }
        Ok(())
    }

    /// Age formatted for display, empty when unknown
    pub fn age_display(&self) -> String {
        match self.age {
            Some(age) if age.fract() == 0.0 => format!("{}", age as i64),
            Some(age) => format!("{}", age),
            None => String::new(),
        }
    }
}

impl fmt::Display for Person {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.age {
            Some(_) => write!(f, "{} {}", self.name, self.age_display()),
            None => write!(f, "{}", self.name),
        }
    }
}

/// Parse age text typed by a user
pub fn parse_age(input: &str) -> Result<f64, ValidationError> {
    let trimmed = input.trim();
    if trimmed.is_empty() {
        return Err(ValidationError::MissingField("age"));
    }
    match trimmed.parse::<f64>() {
        Ok(age) if age.is_finite() => Ok(age),
        _ => Err(ValidationError::InvalidAge(trimmed.to_string())),
    }
}

/// An authenticated user as reported by the identity provider
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct User {
    /// Stable user identifier
    pub uid: String,
    /// Email the user signed in with
    pub email: String,
    /// When this sign-in happened
    pub signed_in_at: DateTime<Utc>,
}

impl User {
    /// Create a user for an email address
    ///
    /// The uid is derived from the normalized email so the same account
    /// always maps to the same uid.
    pub fn for_email(email: &str) -> Self {
        let normalized = normalize_email(email);
        Self {
            uid: Uuid::new_v5(&Uuid::NAMESPACE_URL, normalized.as_bytes()).to_string(),
            email: normalized,
            signed_in_at: Utc::now(),
        }
    }

    /// Whether two values describe the same account
    pub fn same_account(&self, other: &User) -> bool {
        self.uid == other.uid
    }
}

/// Email and password used to sign in
#[derive(Clone, PartialEq, Eq)]
pub struct Credentials {
    pub email: String,
    pub password: String,
}

impl Credentials {
    pub fn new(email: impl Into<String>, password: impl Into<String>) -> Self {
        Self {
            email: email.into(),
            password: password.into(),
        }
    }

    /// Check that both fields are filled in
    pub fn validate(&self) -> Result<(), ValidationError> {
        if self.email.trim().is_empty() {
            return Err(ValidationError::MissingField("email"));
        }
        if self.password.is_empty() {
            return Err(ValidationError::MissingField("password"));
        }
        Ok(())
    }
}

impl fmt::Debug for Credentials {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credentials")
            .field("email", &self.email)
            .field("password", &"<redacted>")
            .finish()
    }
}

/// Lowercase and trim an email so lookups are case-insensitive
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}
