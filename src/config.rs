//! Configuration loading and persistence.
//!
//! Settings live in `config.json` under the config directory. The VAPID
//! private key is never written there: it comes from
//! `WEBPUSH_VAPID_PRIVATE_KEY` or from a separate key file.

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
#[cfg(unix)]
use std::os::unix::fs::PermissionsExt;
use std::time::Duration;
use std::{fs, path::PathBuf};

use crate::constants::{DEFAULT_MAX_CONCURRENCY, HTTP_REQUEST_TIMEOUT, VAPID_JWT_EXPIRY_SECS};
use crate::vapid::{VapidKeys, VapidSigner};

/// Configuration for the dispatcher.
#[derive(Serialize, Deserialize, Clone)]
#[serde(default)]
pub struct Config {
    /// Base64url VAPID public key (65 bytes decoded).
    pub vapid_public_key: String,
    /// Base64url VAPID private key - NOT serialized to disk.
    #[serde(skip)]
    pub vapid_private_key: String,
    /// File holding the private key, if not supplied via env var.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub vapid_private_key_file: Option<PathBuf>,
    /// Contact URI sent as the JWT `sub` claim.
    pub vapid_subject: String,
    /// JSON file the subscription store persists to.
    pub subscriptions_path: PathBuf,
    /// Maximum simultaneous push requests per batch.
    pub max_concurrency: usize,
    /// Per-request timeout in seconds.
    pub request_timeout_secs: u64,
    /// VAPID token lifetime in seconds.
    pub jwt_expiry_secs: i64,
}

impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("vapid_public_key", &self.vapid_public_key)
            .field("vapid_private_key_file", &self.vapid_private_key_file)
            .field("vapid_subject", &self.vapid_subject)
            .field("subscriptions_path", &self.subscriptions_path)
            .field("max_concurrency", &self.max_concurrency)
            .field("request_timeout_secs", &self.request_timeout_secs)
            .field("jwt_expiry_secs", &self.jwt_expiry_secs)
            .finish_non_exhaustive()
    }
}

impl Default for Config {
    fn default() -> Self {
        let subscriptions_path = dirs::data_dir()
            .map(|d| d.join("webpush-dispatch").join("subscriptions.json"))
            .unwrap_or_else(|| PathBuf::from("subscriptions.json"));

        Self {
            vapid_public_key: String::new(),
            vapid_private_key: String::new(),
            vapid_private_key_file: None,
            vapid_subject: String::new(),
            subscriptions_path,
            max_concurrency: DEFAULT_MAX_CONCURRENCY,
            request_timeout_secs: HTTP_REQUEST_TIMEOUT.as_secs(),
            jwt_expiry_secs: VAPID_JWT_EXPIRY_SECS,
        }
    }
}

impl Config {
    /// Returns the configuration directory path, creating it if necessary.
    ///
    /// `WEBPUSH_CONFIG_DIR` overrides the platform config directory.
    pub fn config_dir() -> Result<PathBuf> {
        let dir = if let Ok(dir) = std::env::var("WEBPUSH_CONFIG_DIR") {
            PathBuf::from(dir)
        } else {
            dirs::config_dir()
                .context("Could not determine config directory")?
                .join("webpush-dispatch")
        };
        fs::create_dir_all(&dir)?;
        Ok(dir)
    }

    /// Loads configuration from file, with environment variable overrides.
    pub fn load() -> Result<Self> {
        let mut config = Self::load_from_file()?.unwrap_or_default();
        config.apply_env_overrides();
        config.load_private_key_file()?;
        Ok(config)
    }

    fn load_from_file() -> Result<Option<Self>> {
        let config_path = Self::config_dir()?.join("config.json");
        if !config_path.exists() {
            return Ok(None);
        }
        let content = fs::read_to_string(&config_path)
            .with_context(|| format!("Failed to read {}", config_path.display()))?;
        let config = serde_json::from_str(&content)
            .with_context(|| format!("Failed to parse {}", config_path.display()))?;
        Ok(Some(config))
    }

    fn apply_env_overrides(&mut self) {
        if let Ok(key) = std::env::var("WEBPUSH_VAPID_PUBLIC_KEY") {
            self.vapid_public_key = key;
        }

        if let Ok(key) = std::env::var("WEBPUSH_VAPID_PRIVATE_KEY") {
            self.vapid_private_key = key;
        }

        if let Ok(subject) = std::env::var("WEBPUSH_VAPID_SUBJECT") {
            self.vapid_subject = subject;
        }

        if let Ok(path) = std::env::var("WEBPUSH_SUBSCRIPTIONS") {
            self.subscriptions_path = PathBuf::from(path);
        }

        if let Ok(max) = std::env::var("WEBPUSH_MAX_CONCURRENCY") {
            if let Ok(max) = max.parse::<usize>() {
                self.max_concurrency = max;
            }
        }

        if let Ok(timeout) = std::env::var("WEBPUSH_TIMEOUT_SECS") {
            if let Ok(timeout) = timeout.parse::<u64>() {
                self.request_timeout_secs = timeout;
            }
        }
    }

    fn load_private_key_file(&mut self) -> Result<()> {
        if !self.vapid_private_key.is_empty() {
            return Ok(());
        }
        if let Some(path) = &self.vapid_private_key_file {
            self.vapid_private_key = fs::read_to_string(path)
                .with_context(|| format!("Failed to read VAPID private key file {}", path.display()))?
                .trim()
                .to_string();
        }
        Ok(())
    }

    /// Persists the current configuration to disk.
    /// Note: the private key is NOT saved here.
    pub fn save(&self) -> Result<()> {
        let config_path = Self::config_dir()?.join("config.json");
        fs::write(&config_path, serde_json::to_string_pretty(self)?)?;

        // Set restrictive permissions (owner read/write only)
        #[cfg(unix)]
        fs::set_permissions(&config_path, fs::Permissions::from_mode(0o600))?;

        Ok(())
    }

    /// Validated key pair. Fails before any network activity on bad keys.
    pub fn vapid_keys(&self) -> Result<VapidKeys> {
        anyhow::ensure!(
            !self.vapid_public_key.is_empty(),
            "VAPID public key not configured (set WEBPUSH_VAPID_PUBLIC_KEY)"
        );
        anyhow::ensure!(
            !self.vapid_private_key.is_empty(),
            "VAPID private key not configured (set WEBPUSH_VAPID_PRIVATE_KEY or vapid_private_key_file)"
        );
        VapidKeys::from_base64url(&self.vapid_public_key, &self.vapid_private_key)
            .context("Invalid VAPID key pair")
    }

    /// Signer built from the configured keys, subject and token lifetime.
    pub fn signer(&self) -> Result<VapidSigner> {
        anyhow::ensure!(
            self.vapid_subject.starts_with("mailto:") || self.vapid_subject.starts_with("https:"),
            "VAPID subject must be a mailto: or https: URI, got {:?}",
            self.vapid_subject
        );
        let signer = VapidSigner::new(self.vapid_keys()?, self.vapid_subject.clone())?
            .with_expiry_secs(self.jwt_expiry_secs)?;
        Ok(signer)
    }

    /// Per-request timeout.
    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }
}
