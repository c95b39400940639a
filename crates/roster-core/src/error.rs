//! Error taxonomy for the core
//!
//! Every fallible operation surfaces exactly one of four kinds of error:
//!
//! - [`ValidationError`]: bad input, raised before any backend call
//! - [`AuthError`]: the identity provider rejected a sign-in
//! - [`StoreError`]: a write, read or delete against the record backend failed
//! - [`SubscriptionError`]: a live listener terminated
//!
//! [`CoreError`] wraps them so callers can turn any failure into a single
//! user-facing notice. None of them is fatal; the caller may retry manually.

use thiserror::Error;

use crate::storage::StorageError;

/// Input rejected before reaching the backend
#[derive(Error, Debug, Clone, PartialEq)]
pub enum ValidationError {
    /// A required field was left empty
    #[error("{0} is required")]
    MissingField(&'static str),

    /// Age text could not be parsed as a finite number
    #[error("age must be a number, got '{0}'")]
    InvalidAge(String),

    /// A key cannot be used as a path segment in the store
    #[error("invalid key '{key}': {reason}")]
    InvalidKey { key: String, reason: &'static str },
}

/// Sign-in rejected by the identity provider
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    #[error("invalid email or password")]
    InvalidCredentials,

    #[error("no account registered for '{0}'")]
    UnknownAccount(String),

    #[error("identity provider error: {0}")]
    Provider(String),
}

/// Backend failure on write, read or delete
#[derive(Error, Debug)]
pub enum StoreError {
    /// The backend cannot be reached
    #[error("backend unavailable")]
    Unavailable,

    /// The backend reported a failure
    #[error("backend error: {0}")]
    Backend(String),

    /// Local persistence failed
    #[error(transparent)]
    Storage(#[from] StorageError),

    /// A value could not be encoded or decoded
    #[error("encoding error: {0}")]
    Encoding(String),
}

/// Terminal failure of a live subscription
///
/// Delivered once; the subscription is defunct afterwards.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum SubscriptionError {
    #[error("subscription revoked: {0}")]
    Revoked(String),

    #[error("subscription failed: {0}")]
    Backend(String),
}

/// Any failure of a core operation
#[derive(Error, Debug)]
pub enum CoreError {
    #[error(transparent)]
    Validation(#[from] ValidationError),

    #[error(transparent)]
    Auth(#[from] AuthError),

    #[error(transparent)]
    Store(#[from] StoreError),

    #[error(transparent)]
    Subscription(#[from] SubscriptionError),
}

impl CoreError {
    /// Short message suitable for showing to the user
    pub fn user_message(&self) -> String {
        match self {
            CoreError::Validation(ValidationError::MissingField(field)) => {
                format!("Fill in {} to continue", field)
            }
            CoreError::Validation(err) => err.to_string(),
            CoreError::Auth(_) => "Sign-in failed".to_string(),
            CoreError::Store(StoreError::Unavailable) => {
                "Store unavailable, try again later".to_string()
            }
            CoreError::Store(_) => "Store error".to_string(),
            CoreError::Subscription(_) => "Live updates stopped".to_string(),
        }
    }

    /// Whether the error was raised before any backend call
    pub fn is_validation(&self) -> bool {
        matches!(self, CoreError::Validation(_))
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encoding(err.to_string())
    }
}

/// Result type for core operations
pub type CoreResult<T> = Result<T, CoreError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_missing_field_message() {
        let err = CoreError::from(ValidationError::MissingField("name"));
        assert_eq!(err.user_message(), "Fill in name to continue");
        assert!(err.is_validation());
    }

    #[test]
    fn test_invalid_age_display() {
        let err = ValidationError::InvalidAge("abc".to_string());
        assert!(err.to_string().contains("abc"));
    }

    #[test]
    fn test_store_errors_are_not_validation() {
        let err = CoreError::from(StoreError::Unavailable);
        assert!(!err.is_validation());
        assert!(err.user_message().contains("unavailable"));
    }

    #[test]
    fn test_auth_error_message_hides_detail() {
        let err = CoreError::from(AuthError::UnknownAccount("a@b.c".to_string()));
        assert_eq!(err.user_message(), "Sign-in failed");
    }
}
