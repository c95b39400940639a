//! Identity provider boundary
//!
//! The session manager only talks to an [`IdentityProvider`]. The provider
//! owns the authentication state and publishes it on a `watch` channel; it
//! must notify once per real transition, not once per call.

use async_trait::async_trait;
use tokio::sync::watch;

use crate::error::AuthError;
use crate::models::{Credentials, User};

mod local;

pub use local::{hash_password, verify_password, LocalIdentityProvider};

#[async_trait]
pub trait IdentityProvider: Send + Sync {
    /// Authenticate with email and password
    ///
    /// On failure the authentication state is left untouched.
    async fn sign_in(&self, credentials: &Credentials) -> Result<User, AuthError>;

    /// End the current session; signing out while signed out is a no-op
    async fn sign_out(&self) -> Result<(), AuthError>;

    /// Last known user, if any
    fn current(&self) -> Option<User>;

    /// Receiver of authentication state changes
    fn watch(&self) -> watch::Receiver<Option<User>>;
}
