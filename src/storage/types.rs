use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::remote::RemoteError;

/// Download URL placeholder for items without a real file location.
///
/// The remote table store does not persist `download_url`, so every item read
/// back from it carries this value.
pub const PLACEHOLDER_DOWNLOAD_URL: &str = "#";

/// Display name for items whose `category_id` no longer resolves.
pub const UNCATEGORIZED: &str = "Uncategorized";

// ============================================================================
// Error Types
// ============================================================================

/// Storage-layer errors with user-friendly messages
#[derive(Debug, Error)]
pub enum StorageError {
    /// Another process holds the local database lock
    #[error("Another instance of softvault appears to be running. Please close it and try again.")]
    InstanceLocked,

    /// Local schema setup failed
    #[error("Local storage migration failed: {0}")]
    Migration(String),

    /// Local key/value database error
    #[error("Local storage error: {0}")]
    Local(#[from] sqlx::Error),

    /// A collection could not be serialized for writing
    #[error("Failed to serialize collection: {0}")]
    Serialize(#[from] serde_json::Error),

    /// Remote table store rejected or failed a request
    #[error(transparent)]
    Remote(#[from] RemoteError),

    /// `is_secure_link` was set without a link to go with it
    #[error("Item {id} has a secure link flag but no secure link URL")]
    InconsistentSecureLink { id: String },
}

impl StorageError {
    /// Map a sqlx error to `InstanceLocked` when SQLite reports lock contention.
    pub(crate) fn from_sqlx(err: sqlx::Error) -> Self {
        let error_string = err.to_string().to_lowercase();

        if error_string.contains("database is locked")
            || error_string.contains("database table is locked")
            || error_string.contains("unable to open database file")
        {
            return StorageError::InstanceLocked;
        }

        StorageError::Local(err)
    }
}

// ============================================================================
// Data Structures
// ============================================================================

/// A catalog category. Created and deleted by the admin, never updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Category {
    pub id: String,
    pub name: String,
    /// Icon name (e.g. `database`, `code`)
    pub icon: String,
}

/// A downloadable catalog entry.
///
/// Serialized with camelCase field names; this is the shape kept in local
/// storage. The remote table store uses [`super::remote::ItemRow`] instead.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SoftwareItem {
    /// Epoch milliseconds at creation, as a decimal string
    pub id: String,
    pub title: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub file_name: Option<String>,
    pub description: String,
    /// Soft reference to [`Category::id`]; may dangle after a category delete
    pub category_id: String,
    pub version: String,
    /// Free-text size such as "145 MB"
    pub size: String,
    pub download_url: String,
    pub downloads: i64,
    /// Epoch milliseconds
    pub created_at: i64,
    pub is_telegram_import: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub is_secure_link: Option<bool>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub secure_link_url: Option<String>,
    #[serde(default)]
    pub tags: Vec<String>,
}

impl SoftwareItem {
    /// Whether a tunnel link is currently active for this item.
    pub fn has_secure_link(&self) -> bool {
        self.is_secure_link.unwrap_or(false)
    }

    /// Copy of this item with an active secure link.
    pub fn with_secure_link(&self, url: impl Into<String>) -> Self {
        Self {
            is_secure_link: Some(true),
            secure_link_url: Some(url.into()),
            ..self.clone()
        }
    }

    /// Copy of this item with the secure link flag and URL both cleared.
    pub fn without_secure_link(&self) -> Self {
        Self {
            is_secure_link: Some(false),
            secure_link_url: None,
            ..self.clone()
        }
    }

    /// Enforce the flag/URL pairing before a write.
    ///
    /// A set flag needs a non-empty URL. A cleared flag always drops the URL,
    /// so a single write never leaves a stale link behind.
    pub(crate) fn normalized_secure_link(mut self) -> Result<Self, StorageError> {
        match self.is_secure_link {
            Some(true) => {
                let has_url = self
                    .secure_link_url
                    .as_deref()
                    .is_some_and(|url| !url.trim().is_empty());
                if !has_url {
                    return Err(StorageError::InconsistentSecureLink { id: self.id });
                }
            }
            Some(false) | None => self.secure_link_url = None,
        }
        Ok(self)
    }
}

/// Bot settings shown on the admin bot panel. Always read from local storage.
#[derive(Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TelegramConfig {
    pub bot_token: String,
    pub admin_ids: Vec<String>,
    pub bot_name: String,
}

/// Mask the bot token in Debug output so it never reaches logs.
impl std::fmt::Debug for TelegramConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TelegramConfig")
            .field("bot_token", &"[REDACTED]")
            .field("admin_ids", &self.admin_ids)
            .field("bot_name", &self.bot_name)
            .finish()
    }
}
