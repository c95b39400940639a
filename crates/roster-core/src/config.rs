//! Application configuration
//!
//! Configuration is loaded from:
//! 1. Default values
//! 2. Config file (~/.config/roster/config.toml)
//! 3. Environment variables (ROSTER_* prefix)
//!
//! Environment variables take precedence over config file values.

use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};

use crate::models::normalize_email;

/// Environment variable prefix
const ENV_PREFIX: &str = "ROSTER";

/// A local account the reference identity provider accepts
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Account {
    pub email: String,
    /// Argon2 PHC string
    pub password_hash: String,
}

/// Application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Directory for the people document and sync state
    #[serde(default = "default_data_dir")]
    pub data_dir: PathBuf,

    /// Sync server URL (optional)
    #[serde(default)]
    pub sync_url: Option<String>,

    /// Whether sync is enabled
    #[serde(default)]
    pub sync_enabled: bool,

    /// Email used for sign-in when none is given
    #[serde(default)]
    pub email: Option<String>,

    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub accounts: Vec<Account>,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            data_dir: default_data_dir(),
            sync_url: None,
            sync_enabled: false,
            email: None,
            accounts: Vec::new(),
        }
    }
}

impl Config {
    /// Load configuration from default location and environment
    ///
    /// Order of precedence (highest to lowest):
    /// 1. Environment variables (ROSTER_DATA_DIR, ROSTER_SYNC_URL, ROSTER_SYNC_ENABLED, ROSTER_EMAIL)
    /// 2. Config file (~/.config/roster/config.toml or ROSTER_CONFIG)
    /// 3. Default values
    pub fn load() -> Result<Self> {
        Self::load_from_path(&Self::config_file_path())
    }

    /// Load configuration from a specific path
    ///
    /// Environment variables are still applied as overrides.
    /// If the file doesn't exist, defaults are used.
    pub fn load_from_path(path: &Path) -> Result<Self> {
        let mut config = if path.exists() {
            let content = std::fs::read_to_string(path)
                .with_context(|| format!("Failed to read config file: {:?}", path))?;
            toml::from_str(&content)
                .with_context(|| format!("Failed to parse config file: {:?}", path))?
        } else {
            Self::default()
        };

        config.apply_env_overrides();
        config.ensure_data_dir()?;
        Ok(config)
    }

    /// Load configuration from a TOML string
    pub fn load_from_str(toml_content: &str) -> Result<Self> {
        let mut config: Config =
            toml::from_str(toml_content).context("Failed to parse config TOML")?;
        config.apply_env_overrides();
        Ok(config)
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(val) = std::env::var(format!("{}_DATA_DIR", ENV_PREFIX)) {
            self.data_dir = PathBuf::from(val);
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_URL", ENV_PREFIX)) {
            self.sync_url = if val.is_empty() { None } else { Some(val) };
        }

        if let Ok(val) = std::env::var(format!("{}_SYNC_ENABLED", ENV_PREFIX)) {
            self.sync_enabled = val.eq_ignore_ascii_case("true") || val == "1";
        }

        if let Ok(val) = std::env::var(format!("{}_EMAIL", ENV_PREFIX)) {
            self.email = if val.is_empty() { None } else { Some(val) };
        }
    }

    fn ensure_data_dir(&self) -> Result<()> {
        if !self.data_dir.exists() {
            std::fs::create_dir_all(&self.data_dir)
                .with_context(|| format!("Failed to create data directory: {:?}", self.data_dir))?;
        }
        Ok(())
    }

    /// Save configuration to the default config file
    pub fn save(&self) -> Result<()> {
        self.save_to_path(&Self::config_file_path())
    }

    pub fn save_to_path(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)
                .with_context(|| format!("Failed to create config directory: {:?}", parent))?;
        }

        let content = toml::to_string_pretty(self).context("Failed to serialize config")?;
        std::fs::write(path, content)
            .with_context(|| format!("Failed to write config file: {:?}", path))?;
        Ok(())
    }

    /// Get the config file path
    ///
    /// Can be overridden with ROSTER_CONFIG environment variable
    pub fn config_file_path() -> PathBuf {
        if let Ok(path) = std::env::var(format!("{}_CONFIG", ENV_PREFIX)) {
            return PathBuf::from(path);
        }

        dirs::config_dir()
            .unwrap_or_else(|| PathBuf::from("."))
            .join("roster")
            .join("config.toml")
    }

    /// Sync URL, if sync is enabled and a URL is configured
    pub fn active_sync_url(&self) -> Option<&str> {
        if !self.sync_enabled {
            return None;
        }
        self.sync_url.as_deref().filter(|url| !url.is_empty())
    }

    /// Add an account, replacing any existing one with the same email
    pub fn upsert_account(&mut self, email: &str, password_hash: String) {
        let email = normalize_email(email);
        self.accounts.retain(|a| normalize_email(&a.email) != email);
        self.accounts.push(Account {
            email,
            password_hash,
        });
    }

    /// Path to the Automerge document file
    pub fn document_path(&self) -> PathBuf {
        self.data_dir.join("people.automerge")
    }

    /// Path to the document ID file
    pub fn doc_id_path(&self) -> PathBuf {
        self.data_dir.join("doc_id")
    }

    /// Path to the persisted sync state
    pub fn sync_state_path(&self) -> PathBuf {
        self.data_dir.join("sync_state.json")
    }
}

fn default_data_dir() -> PathBuf {
    dirs::data_local_dir()
        .unwrap_or_else(|| PathBuf::from("."))
        .join("roster")
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::env;
    use std::sync::Mutex;
    use tempfile::TempDir;

    // Serializes tests that touch environment variables
    static ENV_MUTEX: Mutex<()> = Mutex::new(());

    /// Locks env access and restores the listed vars on drop
    struct EnvGuard<'a> {
        _lock: std::sync::MutexGuard<'a, ()>,
        saved: Vec<(String, Option<String>)>,
    }

    impl<'a> EnvGuard<'a> {
        fn new(vars: &[&str]) -> Self {
            let lock = ENV_MUTEX.lock().unwrap_or_else(|e| e.into_inner());
            let saved = vars
                .iter()
                .map(|&name| (name.to_string(), env::var(name).ok()))
                .collect();
            for name in vars {
                env::remove_var(name);
            }
            Self { _lock: lock, saved }
        }
    }

    impl Drop for EnvGuard<'_> {
        fn drop(&mut self) {
            for (name, value) in &self.saved {
                match value {
                    Some(v) => env::set_var(name, v),
                    None => env::remove_var(name),
                }
            }
        }
    }

    const ENV_VARS: &[&str] = &[
        "ROSTER_DATA_DIR",
        "ROSTER_SYNC_URL",
        "ROSTER_SYNC_ENABLED",
        "ROSTER_EMAIL",
        "ROSTER_CONFIG",
    ];

    #[test]
    fn test_default_config() {
        let config = Config::default();
        assert!(!config.sync_enabled);
        assert!(config.sync_url.is_none());
        assert!(config.email.is_none());
        assert!(config.accounts.is_empty());
        assert!(config.data_dir.ends_with("roster"));
    }

    #[test]
    fn test_file_paths() {
        let config = Config::default();
        assert!(config.document_path().ends_with("people.automerge"));
        assert!(config.doc_id_path().ends_with("doc_id"));
        assert!(config.sync_state_path().ends_with("sync_state.json"));
    }

    #[test]
    fn test_env_override_data_dir() {
        let _guard = EnvGuard::new(ENV_VARS);
        let mut config = Config::default();

        env::set_var("ROSTER_DATA_DIR", "/tmp/roster-test");
        config.apply_env_overrides();

        assert_eq!(config.data_dir, PathBuf::from("/tmp/roster-test"));
    }

    #[test]
    fn test_env_override_sync_enabled() {
        let _guard = EnvGuard::new(ENV_VARS);
        let mut config = Config::default();

        env::set_var("ROSTER_SYNC_ENABLED", "true");
        config.apply_env_overrides();
        assert!(config.sync_enabled);

        env::set_var("ROSTER_SYNC_ENABLED", "1");
        config.sync_enabled = false;
        config.apply_env_overrides();
        assert!(config.sync_enabled);

        env::set_var("ROSTER_SYNC_ENABLED", "false");
        config.apply_env_overrides();
        assert!(!config.sync_enabled);
    }

    #[test]
    fn test_env_override_sync_url_and_email() {
        let _guard = EnvGuard::new(ENV_VARS);
        let mut config = Config::default();

        env::set_var("ROSTER_SYNC_URL", "ws://localhost:3030");
        env::set_var("ROSTER_EMAIL", "ana@example.com");
        config.apply_env_overrides();
        assert_eq!(config.sync_url.as_deref(), Some("ws://localhost:3030"));
        assert_eq!(config.email.as_deref(), Some("ana@example.com"));

        // Empty strings clear them
        env::set_var("ROSTER_SYNC_URL", "");
        env::set_var("ROSTER_EMAIL", "");
        config.apply_env_overrides();
        assert!(config.sync_url.is_none());
        assert!(config.email.is_none());
    }

    #[test]
    fn test_active_sync_url() {
        let mut config = Config {
            sync_url: Some("ws://sync.example.com".to_string()),
            ..Config::default()
        };
        assert!(config.active_sync_url().is_none());

        config.sync_enabled = true;
        assert_eq!(config.active_sync_url(), Some("ws://sync.example.com"));

        config.sync_url = None;
        assert!(config.active_sync_url().is_none());
    }

    #[test]
    fn test_upsert_account_replaces_same_email() {
        let mut config = Config::default();
        config.upsert_account("Ana@Example.com", "hash-1".to_string());
        config.upsert_account("ana@example.com ", "hash-2".to_string());

        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].email, "ana@example.com");
        assert_eq!(config.accounts[0].password_hash, "hash-2");
    }

    #[test]
    fn test_save_and_load_with_accounts() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        let path = temp_dir.path().join("config.toml");

        let mut config = Config {
            data_dir: temp_dir.path().join("data"),
            sync_url: Some("ws://sync.example.com".to_string()),
            sync_enabled: true,
            email: Some("ana@example.com".to_string()),
            accounts: Vec::new(),
        };
        config.upsert_account("ana@example.com", "$argon2id$v=19$stub".to_string());
        config.save_to_path(&path).unwrap();

        let loaded = Config::load_from_path(&path).unwrap();
        assert_eq!(loaded.data_dir, config.data_dir);
        assert_eq!(loaded.sync_url, config.sync_url);
        assert!(loaded.sync_enabled);
        assert_eq!(loaded.email, config.email);
        assert_eq!(loaded.accounts, config.accounts);
        assert!(loaded.data_dir.exists());
    }

    #[test]
    fn test_load_from_str() {
        let _guard = EnvGuard::new(ENV_VARS);

        let toml = r#"
            data_dir = "/custom/data"
            sync_url = "ws://example.com"
            sync_enabled = true

            [[accounts]]
            email = "leo@example.com"
            password_hash = "$argon2id$v=19$stub"
        "#;

        let config = Config::load_from_str(toml).unwrap();
        assert_eq!(config.data_dir, PathBuf::from("/custom/data"));
        assert_eq!(config.sync_url.as_deref(), Some("ws://example.com"));
        assert!(config.sync_enabled);
        assert_eq!(config.accounts.len(), 1);
        assert_eq!(config.accounts[0].email, "leo@example.com");
    }

    #[test]
    fn test_load_from_path_missing_file() {
        let _guard = EnvGuard::new(ENV_VARS);
        let temp_dir = TempDir::new().unwrap();
        env::set_var("ROSTER_DATA_DIR", temp_dir.path().join("data"));

        let config = Config::load_from_path(&temp_dir.path().join("missing.toml")).unwrap();
        assert!(!config.sync_enabled);
        assert!(config.sync_url.is_none());
        assert!(config.data_dir.exists());
    }
}
