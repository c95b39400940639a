//! Presentation notices
//!
//! Each operation outcome becomes one `Notice`. A presenter shows
//! [`Notice::status`] as a transient message and redraws lists from the
//! people it carries.

use std::fmt;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::models::Person;
use crate::session::SessionState;

/// What the user was doing when something failed
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Operation {
    Save,
    Delete,
    Load,
    SignIn,
    Watch,
}

impl Operation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Operation::Save => "save",
            Operation::Delete => "delete",
            Operation::Load => "load",
            Operation::SignIn => "sign in",
            Operation::Watch => "watch",
        }
    }
}

impl fmt::Display for Operation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug)]
pub enum Notice {
    SessionChanged { active: bool },
    Saved { name: String },
    Deleted { name: String },
    Loaded(Vec<Person>),
    CollectionChanged(Vec<Person>),
    Failed { op: Operation, error: CoreError },
}

impl Notice {
    pub fn failed(op: Operation, error: impl Into<CoreError>) -> Self {
        Notice::Failed {
            op,
            error: error.into(),
        }
    }

    pub fn from_save(result: CoreResult<String>) -> Self {
        match result {
            Ok(name) => Notice::Saved { name },
            Err(e) => Notice::failed(Operation::Save, e),
        }
    }

    pub fn from_delete(result: CoreResult<String>) -> Self {
        match result {
            Ok(name) => Notice::Deleted { name },
            Err(e) => Notice::failed(Operation::Delete, e),
        }
    }

    pub fn from_load(result: CoreResult<Vec<Person>>) -> Self {
        match result {
            Ok(people) => Notice::Loaded(people),
            Err(e) => Notice::failed(Operation::Load, e),
        }
    }

    pub fn from_session(state: &SessionState) -> Self {
        Notice::SessionChanged {
            active: state.is_active(),
        }
    }

    /// Short status line
    pub fn status(&self) -> String {
        match self {
            Notice::SessionChanged { active: true } => "user signed in".to_string(),
            Notice::SessionChanged { active: false } => "user signed out".to_string(),
            Notice::Saved { name } => format!("{} saved", name),
            Notice::Deleted { name } => format!("{} deleted", name),
            Notice::Loaded(people) => match people.len() {
                0 => "no people".to_string(),
                1 => "1 person loaded".to_string(),
                n => format!("{} people loaded", n),
            },
            Notice::CollectionChanged(people) => format!("people updated ({})", people.len()),
            Notice::Failed {
                op: Operation::Save,
                error:
                    CoreError::Validation(
                        ValidationError::MissingField("name") | ValidationError::MissingField("age"),
                    ),
            } => "Fill in name and age to save".to_string(),
            Notice::Failed {
                op,
                error: CoreError::Validation(ValidationError::MissingField(field)),
            } => format!("Fill in {} to {}", field, op),
            Notice::Failed { error, .. } => error.user_message(),
        }
    }

    pub fn is_failure(&self) -> bool {
        matches!(self, Notice::Failed { .. })
    }

    /// The operation that failed, if this is a failure
    pub fn failed_operation(&self) -> Option<Operation> {
        match self {
            Notice::Failed { op, .. } => Some(*op),
            _ => None,
        }
    }

    /// People carried by the notice, if any
    pub fn people(&self) -> Option<&[Person]> {
        match self {
            Notice::Loaded(people) | Notice::CollectionChanged(people) => Some(people),
            _ => None,
        }
    }
}

impl fmt::Display for Notice {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.status())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::{AuthError, StoreError, SubscriptionError};
    use crate::models::User;

    #[test]
    fn test_save_notices() {
        assert_eq!(Notice::from_save(Ok("Leo".to_string())).status(), "Leo saved");

        let missing = Notice::from_save(Err(ValidationError::MissingField("age").into()));
        assert!(missing.is_failure());
        assert_eq!(missing.status(), "Fill in name and age to save");

        let bad_age = Notice::from_save(Err(ValidationError::InvalidAge("abc".into()).into()));
        assert_eq!(bad_age.status(), "age must be a number, got 'abc'");

        let offline = Notice::from_save(Err(StoreError::Unavailable.into()));
        assert_eq!(offline.status(), "Store unavailable, try again later");
        assert_eq!(offline.failed_operation(), Some(Operation::Save));
        assert!(Notice::from_save(Ok("Leo".to_string())).failed_operation().is_none());
    }

    #[test]
    fn test_delete_notices() {
        assert_eq!(
            Notice::from_delete(Ok("Unknown".to_string())).status(),
            "Unknown deleted"
        );
        assert!(Notice::from_delete(Err(StoreError::Backend("x".into()).into())).is_failure());

        let missing = Notice::from_delete(Err(ValidationError::MissingField("name").into()));
        assert_eq!(missing.failed_operation(), Some(Operation::Delete));
        assert_eq!(missing.status(), "Fill in name to delete");
    }

    #[test]
    fn test_load_notices() {
        assert_eq!(Notice::from_load(Ok(vec![])).status(), "no people");
        assert_eq!(
            Notice::from_load(Ok(vec![Person::new("Leo", 30.0)])).status(),
            "1 person loaded"
        );

        let loaded = Notice::from_load(Ok(vec![
            Person::new("Leo", 30.0),
            Person::new("Ana", 41.0),
        ]));
        assert_eq!(loaded.status(), "2 people loaded");
        assert_eq!(loaded.people().map(<[Person]>::len), Some(2));
    }

    #[test]
    fn test_session_notices() {
        let active = SessionState::Active(User::for_email("ana@example.com"));
        assert_eq!(Notice::from_session(&active).status(), "user signed in");
        assert_eq!(
            Notice::from_session(&SessionState::Inactive).status(),
            "user signed out"
        );
    }

    #[test]
    fn test_failure_messages() {
        let auth = Notice::failed(Operation::SignIn, AuthError::InvalidCredentials);
        assert_eq!(auth.status(), "Sign-in failed");
        assert_eq!(auth.failed_operation(), Some(Operation::SignIn));

        let revoked = Notice::failed(Operation::Watch, SubscriptionError::Revoked("gone".into()));
        assert_eq!(revoked.to_string(), "Live updates stopped");
        assert!(revoked.people().is_none());
    }
}
