use serde::{de::DeserializeOwned, Serialize};
use sqlx::{
    sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    SqlitePool,
};
use std::str::FromStr;
use std::time::Duration;

use super::seed::{seed_categories, seed_items, seed_telegram_config};
use super::types::{Category, SoftwareItem, StorageError, TelegramConfig};

/// Key holding the JSON item collection.
pub const STORAGE_KEY_ITEMS: &str = "softvault_items_v2";
/// Key holding the JSON category collection.
pub const STORAGE_KEY_CATS: &str = "softvault_categories_v2";
/// Key holding the JSON Telegram bot settings.
pub const STORAGE_KEY_TG: &str = "softvault_tg_config_v1";

// ============================================================================
// LocalStore
// ============================================================================

/// Local key/value persistence: JSON blobs under fixed string keys.
///
/// Collections are never patched in place. Every mutation reads the whole
/// collection, changes it in memory and writes the whole blob back. Two
/// processes writing the same key race at that granularity and the last
/// write wins.
#[derive(Clone)]
pub struct LocalStore {
    pub(crate) pool: SqlitePool,
}

impl LocalStore {
    /// Open (or create) the local database and run migrations.
    ///
    /// Pass `":memory:"` for a throwaway store.
    ///
    /// # Errors
    ///
    /// Returns `StorageError::InstanceLocked` when another process holds the
    /// database lock, `StorageError::Migration` if the schema can't be created.
    pub async fn open(path: &str) -> Result<Self, StorageError> {
        let url = format!("sqlite:{}?mode=rwc", path);

        // Create the file owner-only before SQLite touches it
        #[cfg(unix)]
        if path != ":memory:" {
            use std::os::unix::fs::OpenOptionsExt;
            let db_path = std::path::Path::new(path);
            if !db_path.exists() && db_path.parent().is_some_and(|p| p.exists()) {
                let _file = std::fs::OpenOptions::new()
                    .write(true)
                    .create_new(true)
                    .mode(0o600)
                    .open(db_path)
                    .ok(); // connect_with reports the real error if this failed
            }
        }

        let options = SqliteConnectOptions::from_str(&url)
            .map_err(StorageError::from_sqlx)?
            .pragma("busy_timeout", "5000");
        let pool = SqlitePoolOptions::new()
            .max_connections(2)
            .acquire_timeout(Duration::from_secs(10))
            .connect_with(options)
            .await
            .map_err(StorageError::from_sqlx)?;

        let store = Self { pool };
        store
            .migrate()
            .await
            .map_err(|e| StorageError::Migration(e.to_string()))?;
        Ok(store)
    }

    async fn migrate(&self) -> Result<(), sqlx::Error> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS local_storage (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at TEXT NOT NULL
            )
        "#,
        )
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    // ========================================================================
    // Raw key/value access
    // ========================================================================

    /// Get the raw stored string for `key`, if any.
    pub async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        let row: Option<(String,)> =
            sqlx::query_as("SELECT value FROM local_storage WHERE key = ?")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(row.map(|(value,)| value))
    }

    /// Store `value` under `key`, replacing any previous value.
    pub async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        sqlx::query(
            r#"
            INSERT INTO local_storage (key, value, updated_at)
            VALUES (?, ?, datetime('now'))
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
        "#,
        )
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Read and decode `key`, seeding it when absent or unreadable.
    ///
    /// Malformed JSON is treated like a first run, never as corruption.
    async fn load_or_seed<T, F>(&self, key: &str, seed: F) -> Result<T, StorageError>
    where
        T: Serialize + DeserializeOwned,
        F: FnOnce() -> T,
    {
        if let Some(raw) = self.get_item(key).await? {
            match serde_json::from_str(&raw) {
                Ok(value) => return Ok(value),
                Err(e) => {
                    tracing::warn!(key, error = %e, "Stored value is not valid JSON, reseeding");
                }
            }
        } else {
            tracing::debug!(key, "No stored value, seeding defaults");
        }

        let value = seed();
        self.write_json(key, &value).await?;
        Ok(value)
    }

    async fn write_json<T: Serialize>(&self, key: &str, value: &T) -> Result<(), StorageError> {
        let json = serde_json::to_string(value)?;
        self.set_item(key, &json).await
    }

    // ========================================================================
    // Categories
    // ========================================================================

    pub async fn categories(&self) -> Result<Vec<Category>, StorageError> {
        self.load_or_seed(STORAGE_KEY_CATS, seed_categories).await
    }

    /// Append a category to the stored collection.
    pub async fn add_category(&self, category: Category) -> Result<(), StorageError> {
        let mut current = self.categories().await?;
        current.push(category);
        self.write_json(STORAGE_KEY_CATS, &current).await
    }

    /// Remove a category. Items pointing at it are left untouched.
    pub async fn delete_category(&self, id: &str) -> Result<(), StorageError> {
        let mut current = self.categories().await?;
        current.retain(|c| c.id != id);
        self.write_json(STORAGE_KEY_CATS, &current).await
    }

    // ========================================================================
    // Software items
    // ========================================================================

    pub async fn software_list(&self) -> Result<Vec<SoftwareItem>, StorageError> {
        self.load_or_seed(STORAGE_KEY_ITEMS, || {
            seed_items(chrono::Utc::now().timestamp_millis())
        })
        .await
    }

    /// Prepend an item so the newest entry comes first.
    pub async fn add_software(&self, item: SoftwareItem) -> Result<(), StorageError> {
        let current = self.software_list().await?;
        let mut updated = Vec::with_capacity(current.len() + 1);
        updated.push(item);
        updated.extend(current);
        self.write_json(STORAGE_KEY_ITEMS, &updated).await
    }

    pub async fn delete_software(&self, id: &str) -> Result<(), StorageError> {
        let mut current = self.software_list().await?;
        current.retain(|i| i.id != id);
        self.write_json(STORAGE_KEY_ITEMS, &current).await
    }

    /// Replace the item with the same id. Unknown ids are a no-op.
    pub async fn update_software(&self, item: SoftwareItem) -> Result<(), StorageError> {
        let mut current = self.software_list().await?;
        match current.iter_mut().find(|i| i.id == item.id) {
            Some(slot) => {
                *slot = item;
                self.write_json(STORAGE_KEY_ITEMS, &current).await
            }
            None => {
                tracing::debug!(id = %item.id, "Update for unknown item ignored");
                Ok(())
            }
        }
    }

    // ========================================================================
    // Telegram config
    // ========================================================================

    pub async fn telegram_config(&self) -> Result<TelegramConfig, StorageError> {
        self.load_or_seed(STORAGE_KEY_TG, seed_telegram_config).await
    }
}
