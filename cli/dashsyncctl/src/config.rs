//! Configuration and credential storage.
//!
//! Handles:
//! - Views endpoint and TLS settings
//! - Retry budget defaults
//! - Token storage

use std::fs;
use std::path::{Path, PathBuf};
use std::time::Duration;

use anyhow::{Context, Result};
use chrono::{DateTime, Utc};
use dashsync_reconcile::RetryBudget;
use directories::ProjectDirs;
use serde::{Deserialize, Serialize};

use crate::error::CliError;

/// Configuration file name.
const CONFIG_FILE: &str = "config.json";

/// Credentials file name.
const CREDENTIALS_FILE: &str = "credentials.json";

/// Default views collection on a local management port.
pub const DEFAULT_API_URL: &str = "https://127.0.0.1:8089/servicesNS/nobody/search/data/ui/views";

/// Get the config directory path.
pub fn config_dir() -> Result<PathBuf> {
    ProjectDirs::from("io", "dashsync", "dashsync")
        .map(|dirs| dirs.config_dir().to_path_buf())
        .ok_or_else(|| anyhow::anyhow!("Could not determine config directory"))
}

/// CLI configuration.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Config {
    /// Views collection URL.
    #[serde(default = "default_api_url")]
    pub api_url: String,

    /// Accept invalid TLS certificates.
    #[serde(default)]
    pub insecure: bool,

    /// Per-request timeout in seconds.
    #[serde(default = "default_timeout_secs")]
    pub timeout_secs: u64,

    #[serde(default)]
    pub retry: RetrySettings,
}

fn default_api_url() -> String {
    DEFAULT_API_URL.to_string()
}

fn default_timeout_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            api_url: default_api_url(),
            insecure: false,
            timeout_secs: default_timeout_secs(),
            retry: RetrySettings::default(),
        }
    }
}

/// Keys accepted by `config set`.
pub const CONFIG_KEYS: &[&str] = &[
    "api_url",
    "insecure",
    "timeout_secs",
    "retry.max_attempts",
    "retry.backoff_secs",
    "retry.confirmation_max_polls",
    "retry.confirmation_poll_secs",
    "retry.confirmation_initial_delay_secs",
];

impl Config {
    /// Load config from the default location, or return default.
    pub fn load() -> Result<Self> {
        Self::load_from(&config_dir()?.join(CONFIG_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Ok(Self::default());
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read config from {:?}", path))?;

        serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse config from {:?}", path))
    }

    /// Save config to the default location.
    pub fn save(&self) -> Result<PathBuf> {
        let path = config_dir()?.join(CONFIG_FILE);
        self.save_to(&path)?;
        Ok(path)
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        write_private(path, &contents)
            .with_context(|| format!("Failed to write config to {:?}", path))
    }

    /// Set one key from its string form.
    pub fn set(&mut self, key: &str, value: &str) -> Result<(), CliError> {
        let invalid = || CliError::InvalidConfigValue {
            key: key.to_string(),
            value: value.to_string(),
        };
        let number = || value.parse::<u64>().map_err(|_| invalid());
        let count = || value.parse::<u32>().map_err(|_| invalid());

        match key {
            "api_url" => {
                if !value.starts_with("http://") && !value.starts_with("https://") {
                    return Err(invalid());
                }
                self.api_url = value.trim_end_matches('/').to_string();
            }
            "insecure" => self.insecure = value.parse().map_err(|_| invalid())?,
            "timeout_secs" => self.timeout_secs = number()?,
            _ if key.starts_with("retry.") => {
                let mut retry = self.retry.clone();
                match key {
                    "retry.max_attempts" => retry.max_attempts = count()?,
                    "retry.backoff_secs" => retry.backoff_secs = number()?,
                    "retry.confirmation_max_polls" => retry.confirmation_max_polls = count()?,
                    "retry.confirmation_poll_secs" => retry.confirmation_poll_secs = number()?,
                    "retry.confirmation_initial_delay_secs" => {
                        retry.confirmation_initial_delay_secs = number()?
                    }
                    _ => return Err(CliError::UnknownConfigKey(key.to_string())),
                }
                // A budget `apply` would refuse is never saved.
                retry.to_budget().validate().map_err(|_| invalid())?;
                self.retry = retry;
            }
            _ => return Err(CliError::UnknownConfigKey(key.to_string())),
        }
        Ok(())
    }

    pub fn timeout(&self) -> Duration {
        Duration::from_secs(self.timeout_secs)
    }
}

/// Retry budget as stored on disk, in whole seconds.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RetrySettings {
    pub max_attempts: u32,
    pub backoff_secs: u64,
    pub confirmation_max_polls: u32,
    pub confirmation_poll_secs: u64,
    pub confirmation_initial_delay_secs: u64,
}

impl Default for RetrySettings {
    fn default() -> Self {
        Self {
            max_attempts: 5,
            backoff_secs: 5,
            confirmation_max_polls: 5,
            confirmation_poll_secs: 5,
            confirmation_initial_delay_secs: 10,
        }
    }
}

impl RetrySettings {
    pub fn to_budget(&self) -> RetryBudget {
        RetryBudget::new(
            self.max_attempts,
            Duration::from_secs(self.backoff_secs),
            self.confirmation_max_polls,
            Duration::from_secs(self.confirmation_poll_secs),
        )
        .with_initial_delay(Duration::from_secs(self.confirmation_initial_delay_secs))
    }
}

/// Stored credentials.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Credentials {
    /// Bearer token.
    pub token: String,

    /// When the token was stored.
    pub saved_at: DateTime<Utc>,
}

impl Credentials {
    /// Create new credentials.
    pub fn new(token: String) -> Self {
        Self {
            token,
            saved_at: Utc::now(),
        }
    }

    /// Load credentials from the default location.
    pub fn load() -> Result<Option<Self>> {
        Self::load_from(&config_dir()?.join(CREDENTIALS_FILE))
    }

    pub fn load_from(path: &Path) -> Result<Option<Self>> {
        if !path.exists() {
            return Ok(None);
        }

        let contents = fs::read_to_string(path)
            .with_context(|| format!("Failed to read credentials from {:?}", path))?;

        let creds: Self = serde_json::from_str(&contents)
            .with_context(|| format!("Failed to parse credentials from {:?}", path))?;

        Ok(Some(creds))
    }

    /// Save credentials to the default location.
    pub fn save(&self) -> Result<()> {
        self.save_to(&config_dir()?.join(CREDENTIALS_FILE))
    }

    pub fn save_to(&self, path: &Path) -> Result<()> {
        let contents = serde_json::to_string_pretty(self)?;
        write_private(path, &contents)
            .with_context(|| format!("Failed to write credentials to {:?}", path))
    }

    /// Delete credentials from the default location.
    pub fn delete() -> Result<bool> {
        Self::delete_at(&config_dir()?.join(CREDENTIALS_FILE))
    }

    /// Returns whether a file was removed.
    pub fn delete_at(path: &Path) -> Result<bool> {
        if !path.exists() {
            return Ok(false);
        }
        fs::remove_file(path)
            .with_context(|| format!("Failed to delete credentials at {:?}", path))?;
        Ok(true)
    }
}

/// Write `contents` with owner-only permissions on Unix.
fn write_private(path: &Path, contents: &str) -> Result<()> {
    if let Some(dir) = path.parent() {
        fs::create_dir_all(dir)?;
    }

    #[cfg(unix)]
    {
        use std::io::Write;
        use std::os::unix::fs::OpenOptionsExt;

        let mut file = fs::OpenOptions::new()
            .write(true)
            .create(true)
            .truncate(true)
            .mode(0o600)
            .open(path)?;
        file.write_all(contents.as_bytes())?;
    }

    #[cfg(not(unix))]
    {
        fs::write(path, contents)?;
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use rstest::rstest;

    use super::*;

    #[test]
    fn test_config_default() {
        let config = Config::default();
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert!(!config.insecure);

        let budget = config.retry.to_budget();
        assert_eq!(budget.max_attempts, 5);
        assert_eq!(budget.backoff_interval, Duration::from_secs(5));
        assert_eq!(budget.confirmation_max_polls, 5);
        assert_eq!(budget.confirmation_initial_delay, Duration::from_secs(10));
        assert!(budget.validate().is_ok());
    }

    #[test]
    fn test_config_partial_file_fills_defaults() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CONFIG_FILE);
        fs::write(&path, r#"{"insecure": true, "retry": {"max_attempts": 2}}"#).unwrap();

        let config = Config::load_from(&path).unwrap();
        assert!(config.insecure);
        assert_eq!(config.api_url, DEFAULT_API_URL);
        assert_eq!(config.retry.max_attempts, 2);
        assert_eq!(config.retry.backoff_secs, 5);
    }

    #[test]
    fn test_config_round_trip_through_disk() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested").join(CONFIG_FILE);

        let mut config = Config::default();
        config.set("api_url", "https://splunk.example.com:8089/servicesNS/nobody/search/data/ui/views/").unwrap();
        config.set("retry.confirmation_max_polls", "8").unwrap();
        config.save_to(&path).unwrap();

        let loaded = Config::load_from(&path).unwrap();
        assert_eq!(loaded, config);
        assert!(!loaded.api_url.ends_with('/'));
    }

    #[test]
    fn test_missing_config_is_default() {
        let dir = tempfile::tempdir().unwrap();
        let config = Config::load_from(&dir.path().join(CONFIG_FILE)).unwrap();
        assert_eq!(config, Config::default());
    }

    #[rstest]
    #[case("retry.max_attempts", "many")]
    #[case("insecure", "maybe")]
    #[case("api_url", "127.0.0.1:8089")]
    #[case("timeout_secs", "-1")]
    #[case("retry.max_attempts", "0")]
    #[case("retry.backoff_secs", "0")]
    #[case("retry.confirmation_poll_secs", "0")]
    fn test_config_set_rejects_bad_values(#[case] key: &str, #[case] value: &str) {
        let mut config = Config::default();
        assert!(matches!(
            config.set(key, value),
            Err(CliError::InvalidConfigValue { .. })
        ));
        assert_eq!(config, Config::default());
    }

    #[test]
    fn test_config_set_rejects_unknown_key() {
        let mut config = Config::default();
        assert!(matches!(
            config.set("retry.jitter", "1"),
            Err(CliError::UnknownConfigKey(_))
        ));
    }

    #[test]
    fn test_every_listed_key_is_settable() {
        for key in CONFIG_KEYS {
            let value = match *key {
                "api_url" => "https://localhost:8089/views",
                "insecure" => "true",
                _ => "3",
            };
            Config::default().set(key, value).unwrap();
        }
    }

    #[test]
    fn test_credentials_round_trip_and_delete() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join(CREDENTIALS_FILE);

        assert!(Credentials::load_from(&path).unwrap().is_none());

        Credentials::new("test-token".to_string()).save_to(&path).unwrap();
        let loaded = Credentials::load_from(&path).unwrap().unwrap();
        assert_eq!(loaded.token, "test-token");

        #[cfg(unix)]
        {
            use std::os::unix::fs::PermissionsExt;
            let mode = fs::metadata(&path).unwrap().permissions().mode();
            assert_eq!(mode & 0o777, 0o600);
        }

        assert!(Credentials::delete_at(&path).unwrap());
        assert!(!Credentials::delete_at(&path).unwrap());
    }
}
