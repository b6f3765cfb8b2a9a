//! Configuration file parser for ~/.config/softvault/config.toml.
//!
//! The config file is optional. A missing file yields `Config::default()`,
//! which runs the catalog on local storage only. Unknown keys are accepted but
//! logged, since they are usually typos.
use secrecy::SecretString;
use serde::Deserialize;
use std::path::Path;
use thiserror::Error;

use crate::storage::StorageMode;
use crate::theme::ThemeMode;

/// Overrides `remote.anon_key` from the config file.
pub const REMOTE_KEY_ENV: &str = "SOFTVAULT_REMOTE_KEY";
/// Overrides `relay.bot_token` from the config file.
pub const RELAY_TOKEN_ENV: &str = "SOFTVAULT_RELAY_TOKEN";

// ============================================================================
// Error Types
// ============================================================================

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Failed to read config file: {0}")]
    Io(#[from] std::io::Error),

    #[error("Invalid TOML in config file: {0}")]
    Parse(#[from] toml::de::Error),

    #[error("Config file too large: {0}")]
    TooLarge(String),
}

// ============================================================================
// Configuration Structs
// ============================================================================

/// Top-level application configuration.
#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct Config {
    /// Initial theme: "dark", "light" or "black". Not persisted when cycled.
    pub theme: Option<String>,

    /// Hosted table store. Both `url` and `anon_key` must be set to use it.
    pub remote: RemoteConfig,

    /// Suggestion relay settings.
    pub relay: RelayConfig,
}

#[derive(Clone, Default, Deserialize)]
#[serde(default)]
pub struct RemoteConfig {
    /// Project URL, e.g. `https://xyz.supabase.co`
    pub url: Option<String>,
    pub anon_key: Option<String>,
}

#[derive(Clone, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    pub bot_token: Option<String>,
    /// Recipient chat for suggestions.
    pub chat_id: String,
    pub api_base: String,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bot_token: None,
            chat_id: "7808015273".to_string(),
            api_base: "https://api.telegram.org".to_string(),
        }
    }
}

/// Mask secrets in Debug output so they never reach logs.
impl std::fmt::Debug for Config {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Config")
            .field("theme", &self.theme)
            .field("remote.url", &self.remote.url)
            .field(
                "remote.anon_key",
                &self.remote.anon_key.as_ref().map(|_| "[REDACTED]"),
            )
            .field(
                "relay.bot_token",
                &self.relay.bot_token.as_ref().map(|_| "[REDACTED]"),
            )
            .field("relay.chat_id", &self.relay.chat_id)
            .field("relay.api_base", &self.relay.api_base)
            .finish()
    }
}

impl Config {
    const MAX_FILE_SIZE: u64 = 1_048_576;

    /// Load configuration from a TOML file.
    ///
    /// - Missing or empty file → `Ok(Config::default())`
    /// - Invalid TOML → `Err(ConfigError::Parse)`
    /// - Unknown top-level keys → accepted, logged as warning
    pub fn load(path: &Path) -> Result<Self, ConfigError> {
        match std::fs::metadata(path) {
            Ok(meta) if meta.len() > Self::MAX_FILE_SIZE => {
                return Err(ConfigError::TooLarge(format!(
                    "Config file is {} bytes (max {} bytes)",
                    meta.len(),
                    Self::MAX_FILE_SIZE
                )));
            }
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "No config file found, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
            Ok(_) => {}
        }

        let content = match std::fs::read_to_string(path) {
            Ok(c) => c,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => {
                tracing::debug!(path = %path.display(), "Config file disappeared, using defaults");
                return Ok(Self::default());
            }
            Err(e) => return Err(ConfigError::Io(e)),
        };

        if content.trim().is_empty() {
            tracing::debug!(path = %path.display(), "Config file is empty, using defaults");
            return Ok(Self::default());
        }

        if let Ok(raw) = content.parse::<toml::Table>() {
            let known_keys = ["theme", "remote", "relay"];
            for key in raw.keys() {
                if !known_keys.contains(&key.as_str()) {
                    tracing::warn!(key = %key, "Unknown key in config file, ignoring");
                }
            }
        }

        let config: Config = toml::from_str(&content)?;
        tracing::info!(path = %path.display(), "Loaded configuration");
        Ok(config)
    }

    /// Initial theme, falling back to dark for missing or unknown names.
    pub fn initial_theme(&self) -> ThemeMode {
        match self.theme.as_deref() {
            None => ThemeMode::default(),
            Some(name) => ThemeMode::from_str_name(name).unwrap_or_else(|| {
                tracing::warn!(theme = %name, "Unknown theme in config, using dark");
                ThemeMode::default()
            }),
        }
    }

    /// Resolve the storage backend. Env var key wins over the file.
    pub fn storage_mode(&self) -> StorageMode {
        self.storage_mode_with(std::env::var(REMOTE_KEY_ENV).ok())
    }

    fn storage_mode_with(&self, env_key: Option<String>) -> StorageMode {
        let key = env_key
            .filter(|k| !k.is_empty())
            .or_else(|| self.remote.anon_key.clone())
            .map(SecretString::from);
        StorageMode::from_parts(self.remote.url.as_deref(), key)
    }

    /// Relay bot token. Env var wins over the file.
    pub fn relay_token(&self) -> Option<SecretString> {
        self.relay_token_with(std::env::var(RELAY_TOKEN_ENV).ok())
    }

    fn relay_token_with(&self, env_token: Option<String>) -> Option<SecretString> {
        env_token
            .filter(|t| !t.is_empty())
            .or_else(|| self.relay.bot_token.clone())
            .filter(|t| !t.trim().is_empty())
            .map(SecretString::from)
    }
}

// ============================================================================
// Tests
// ============================================================================
