//! Local identity provider
//!
//! Accounts are email addresses with Argon2 password hashes, usually loaded
//! from the config file. Verification runs on the blocking pool.

use std::collections::HashMap;

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Argon2,
};
use async_trait::async_trait;
use tokio::sync::watch;
use tracing::{debug, info};

use super::IdentityProvider;
use crate::config::Account;
use crate::error::AuthError;
use crate::models::{normalize_email, Credentials, User};

fn argon2_instance() -> Argon2<'static> {
    #[cfg(test)]
    {
        // Cheap parameters so tests stay fast
        let params = argon2::Params::new(1024, 1, 1, None).expect("valid Argon2 params for tests");
        Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params)
    }

    #[cfg(not(test))]
    {
        Argon2::default()
    }
}

/// Hash a password into a PHC string for storage
pub fn hash_password(password: &str) -> Result<String, AuthError> {
    let salt = SaltString::generate(&mut OsRng);
    argon2_instance()
        .hash_password(password.as_bytes(), &salt)
        .map(|hash| hash.to_string())
        .map_err(|e| AuthError::Provider(format!("failed to hash password: {}", e)))
}

/// Check a password against a stored PHC string
pub fn verify_password(password: &str, hash: &str) -> Result<bool, AuthError> {
    let parsed = PasswordHash::new(hash)
        .map_err(|e| AuthError::Provider(format!("invalid password hash: {}", e)))?;
    Ok(argon2_instance()
        .verify_password(password.as_bytes(), &parsed)
        .is_ok())
}

/// Identity provider backed by a fixed set of local accounts
pub struct LocalIdentityProvider {
    accounts: HashMap<String, String>,
    state: watch::Sender<Option<User>>,
}

impl LocalIdentityProvider {
    pub fn new() -> Self {
        let (state, _) = watch::channel(None);
        Self {
            accounts: HashMap::new(),
            state,
        }
    }

    /// Provider accepting the configured accounts
    pub fn from_accounts(accounts: &[Account]) -> Self {
        let mut provider = Self::new();
        for account in accounts {
            provider
                .accounts
                .insert(normalize_email(&account.email), account.password_hash.clone());
        }
        provider
    }

    /// Register an account with a plain password
    pub fn add_account(&mut self, email: &str, password: &str) -> Result<(), AuthError> {
        let hash = hash_password(password)?;
        self.accounts.insert(normalize_email(email), hash);
        Ok(())
    }

    pub fn has_account(&self, email: &str) -> bool {
        self.accounts.contains_key(&normalize_email(email))
    }
}

impl Default for LocalIdentityProvider {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl IdentityProvider for LocalIdentityProvider {
    async fn sign_in(&self, credentials: &Credentials) -> Result<User, AuthError> {
        let email = normalize_email(&credentials.email);
        let hash = self
            .accounts
            .get(&email)
            .cloned()
            .ok_or_else(|| AuthError::UnknownAccount(email.clone()))?;

        let password = credentials.password.clone();
        let verified = tokio::task::spawn_blocking(move || verify_password(&password, &hash))
            .await
            .map_err(|e| AuthError::Provider(e.to_string()))??;

        if !verified {
            debug!("Rejected sign-in for {}", email);
            return Err(AuthError::InvalidCredentials);
        }

        let user = User::for_email(&email);
        // Signing in again as the same account is not a transition
        let changed = self.state.send_if_modified(|current| match current {
            Some(existing) if existing.same_account(&user) => false,
            _ => {
                *current = Some(user.clone());
                true
            }
        });
        if changed {
            info!("User signed in: {}", email);
        }

        Ok(self.current().unwrap_or(user))
    }

    async fn sign_out(&self) -> Result<(), AuthError> {
        let changed = self.state.send_if_modified(|current| current.take().is_some());
        if changed {
            info!("User signed out");
        }
        Ok(())
    }

    fn current(&self) -> Option<User> {
        self.state.borrow().clone()
    }

    fn watch(&self) -> watch::Receiver<Option<User>> {
        self.state.subscribe()
    }
}
