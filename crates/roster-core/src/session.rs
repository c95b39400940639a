//! Session manager
//!
//! Bridges the identity provider and the rest of the application: sign in,
//! sign out, read the current session and watch it change. The manager is
//! an explicit instance owned by the composition root.

use std::sync::Arc;

use tokio::sync::watch;
use tracing::{debug, warn};

use crate::auth::IdentityProvider;
use crate::error::CoreResult;
use crate::models::{Credentials, User};

/// Authentication state as seen by subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SessionState {
    Active(User),
    Inactive,
}

impl SessionState {
    pub fn is_active(&self) -> bool {
        matches!(self, SessionState::Active(_))
    }

    pub fn user(&self) -> Option<&User> {
        match self {
            SessionState::Active(user) => Some(user),
            SessionState::Inactive => None,
        }
    }
}

impl From<Option<User>> for SessionState {
    fn from(user: Option<User>) -> Self {
        match user {
            Some(user) => SessionState::Active(user),
            None => SessionState::Inactive,
        }
    }
}

pub struct SessionManager {
    provider: Arc<dyn IdentityProvider>,
}

impl SessionManager {
    pub fn new(provider: Arc<dyn IdentityProvider>) -> Self {
        Self { provider }
    }

    /// Sign in with email and password
    ///
    /// Empty fields are rejected without contacting the provider. On any
    /// failure the session is left as it was.
    pub async fn login(&self, credentials: &Credentials) -> CoreResult<User> {
        credentials.validate()?;
        debug!("Signing in {}", credentials.email);
        let user = self.provider.sign_in(credentials).await?;
        Ok(user)
    }

    /// Sign out without waiting on the outcome
    ///
    /// Signing out while signed out is a no-op. A provider failure is only
    /// logged; use [`SessionManager::try_logout`] to observe it.
    pub async fn logout(&self) {
        if let Err(e) = self.provider.sign_out().await {
            warn!("Sign-out failed: {}", e);
        }
    }

    /// Sign out and report a provider failure
    pub async fn try_logout(&self) -> CoreResult<()> {
        self.provider.sign_out().await?;
        Ok(())
    }

    /// Last known user
    pub fn current_session(&self) -> Option<User> {
        self.provider.current()
    }

    pub fn is_active(&self) -> bool {
        self.current_session().is_some()
    }

    /// Watch session transitions
    ///
    /// The first `next()` yields the state at subscription time.
    pub fn subscribe(&self) -> SessionWatcher {
        SessionWatcher {
            rx: self.provider.watch(),
            primed: false,
        }
    }
}

/// Stream of session states
pub struct SessionWatcher {
    rx: watch::Receiver<Option<User>>,
    primed: bool,
}

impl SessionWatcher {
    /// Wait for the next state
    ///
    /// Returns the current state immediately on the first call, then one
    /// state per transition. Transitions in quick succession may coalesce
    /// into the latest one. `None` once the provider is gone.
    pub async fn next(&mut self) -> Option<SessionState> {
        if !self.primed {
            self.primed = true;
            return Some(self.rx.borrow_and_update().clone().into());
        }
        self.rx.changed().await.ok()?;
        Some(self.rx.borrow_and_update().clone().into())
    }
}
