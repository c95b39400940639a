//! Composition root
//!
//! Owns one session manager and one people store for the lifetime of a
//! command. The two are built side by side and never reference each other.

use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use tracing::debug;

use roster_core::{
    Config, Credentials, DocumentBackend, LocalIdentityProvider, Notice, PeopleStore,
    SessionManager, SessionState,
};

use crate::output::Output;

/// Environment variable holding the sign-in password
pub const PASSWORD_ENV: &str = "ROSTER_PASSWORD";

pub struct App {
    pub config: Config,
    pub config_path: PathBuf,
    pub session: SessionManager,
    pub people: PeopleStore,
    pub backend: DocumentBackend,
}

impl App {
    pub fn open(config_path: &Path) -> Result<Self> {
        let config =
            Config::load_from_path(config_path).context("Failed to load configuration")?;
        let backend = DocumentBackend::open(&config).context("Failed to open people document")?;
        let provider = LocalIdentityProvider::from_accounts(&config.accounts);

        debug!(
            "Opened {} with {} account(s)",
            config.data_dir.display(),
            config.accounts.len()
        );

        Ok(Self {
            session: SessionManager::new(Arc::new(provider)),
            people: PeopleStore::new(Arc::new(backend.clone())),
            backend,
            config,
            config_path: config_path.to_path_buf(),
        })
    }

    /// Sign in when an email and a password are available
    ///
    /// The email comes from `--email` or the config file, the password from
    /// `ROSTER_PASSWORD`. Without both this does nothing.
    pub async fn sign_in_from_env(&self, email: Option<&str>, output: &Output) -> Result<()> {
        let Some(email) = email.or(self.config.email.as_deref()) else {
            return Ok(());
        };
        let Ok(password) = std::env::var(PASSWORD_ENV) else {
            debug!("{} not set, skipping sign-in", PASSWORD_ENV);
            return Ok(());
        };

        self.session
            .login(&Credentials::new(email, password))
            .await
            .with_context(|| format!("Failed to sign in as {}", email))?;
        let state = SessionState::from(self.session.current_session());
        output.notice(&Notice::from_session(&state));
        Ok(())
    }

    /// Whether this command should talk to the sync server
    pub fn sync_configured(&self) -> bool {
        self.backend.sync_url().is_some()
    }

    /// Sync once if enabled; failures are reported but not fatal
    pub async fn auto_sync(&self, output: &Output) {
        if !self.sync_configured() {
            return;
        }

        if let Err(e) = self.backend.sync_once().await {
            if !output.is_quiet() {
                eprintln!("⚠ Auto-sync failed: {}", e);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use roster_core::Person;
    use tempfile::TempDir;

    fn write_config(dir: &TempDir) -> PathBuf {
        let path = dir.path().join("config.toml");
        let data_dir = dir.path().join("data");
        std::fs::write(
            &path,
            format!("data_dir = {:?}\n", data_dir.to_string_lossy()),
        )
        .unwrap();
        path
    }

    #[tokio::test]
    async fn test_people_survive_reopen() {
        let dir = TempDir::new().unwrap();
        let path = write_config(&dir);

        let app = App::open(&path).unwrap();
        assert!(!app.session.is_active());
        app.people.save(&Person::new("Leo", 30.0)).await.unwrap();
        drop(app);

        let app = App::open(&path).unwrap();
        assert_eq!(
            app.people.load_all().await.unwrap(),
            vec![Person::new("Leo", 30.0)]
        );
    }
}
