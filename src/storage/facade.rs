use futures::future::join_all;
use secrecy::SecretString;

use super::local::LocalStore;
use super::remote::{RemoteError, RemoteStore};
use super::seed::seed_categories;
use super::types::{Category, SoftwareItem, StorageError, TelegramConfig};

/// Admin gate value. Plaintext equality only: no hashing, no rate limiting.
/// This is not a security control.
const ADMIN_KEY: &str = "12345";

// ============================================================================
// Backend Selection
// ============================================================================

/// Which backend the process uses. Resolved once at startup and never changed.
pub enum StorageMode {
    Remote { url: String, anon_key: SecretString },
    Local,
}

impl StorageMode {
    /// Remote when both the URL and the key are non-empty, local otherwise.
    pub fn from_parts(url: Option<&str>, anon_key: Option<SecretString>) -> Self {
        use secrecy::ExposeSecret;

        match (url.map(str::trim), anon_key) {
            (Some(url), Some(key)) if !url.is_empty() && !key.expose_secret().trim().is_empty() => {
                Self::Remote {
                    url: url.to_string(),
                    anon_key: key,
                }
            }
            _ => Self::Local,
        }
    }
}

/// The backend currently serving catalog and category calls.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum BackendKind {
    Remote,
    Local,
}

// ============================================================================
// Storage
// ============================================================================

/// Single entry point for catalog persistence.
///
/// Routes every item/category call to the remote table store or to local
/// storage depending on the [`StorageMode`] it was built with. Telegram
/// settings are always local.
pub struct Storage {
    local: LocalStore,
    remote: Option<RemoteStore>,
}

impl Storage {
    /// Build the façade. A remote mode with a URL that fails validation is an
    /// error rather than a silent downgrade to local storage.
    pub fn new(
        mode: StorageMode,
        local: LocalStore,
        client: reqwest::Client,
    ) -> Result<Self, RemoteError> {
        let remote = match mode {
            StorageMode::Remote { url, anon_key } => {
                let store = RemoteStore::new(client, &url, anon_key)?;
                tracing::info!(url = %url, "Using remote table store");
                Some(store)
            }
            StorageMode::Local => {
                tracing::info!("Remote store not configured, using local storage");
                None
            }
        };
        Ok(Self { local, remote })
    }

    /// Façade over local storage only.
    pub fn local_only(local: LocalStore) -> Self {
        Self {
            local,
            remote: None,
        }
    }

    pub fn backend(&self) -> BackendKind {
        if self.remote.is_some() {
            BackendKind::Remote
        } else {
            BackendKind::Local
        }
    }

    // ========================================================================
    // Categories
    // ========================================================================

    /// All categories.
    ///
    /// Remote: a failed fetch logs and yields an empty list; local data is never
    /// substituted. An empty remote table is seeded once with the defaults.
    pub async fn get_categories(&self) -> Result<Vec<Category>, StorageError> {
        let Some(remote) = &self.remote else {
            return self.local.categories().await;
        };

        match remote.categories().await {
            Ok(categories) if categories.is_empty() => {
                Ok(self.seed_remote_categories(remote).await)
            }
            Ok(categories) => Ok(categories),
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch categories from remote store");
                Ok(Vec::new())
            }
        }
    }

    async fn seed_remote_categories(&self, remote: &RemoteStore) -> Vec<Category> {
        let seeds = seed_categories();
        tracing::info!(count = seeds.len(), "Remote category table empty, seeding defaults");

        let results = join_all(seeds.iter().map(|c| remote.insert_category(c))).await;
        for (category, result) in seeds.iter().zip(results) {
            if let Err(e) = result {
                tracing::warn!(id = %category.id, error = %e, "Failed to seed remote category");
            }
        }
        seeds
    }

    pub async fn add_category(&self, category: Category) -> Result<(), StorageError> {
        match &self.remote {
            Some(remote) => Ok(remote.insert_category(&category).await?),
            None => self.local.add_category(category).await,
        }
    }

    /// Delete a category. Items referencing it are not modified.
    pub async fn delete_category(&self, id: &str) -> Result<(), StorageError> {
        match &self.remote {
            Some(remote) => Ok(remote.delete_category(id).await?),
            None => self.local.delete_category(id).await,
        }
    }

    // ========================================================================
    // Software items
    // ========================================================================

    /// All items. Remote results are newest first; local results keep
    /// insertion order with new items prepended.
    pub async fn get_software_list(&self) -> Result<Vec<SoftwareItem>, StorageError> {
        let Some(remote) = &self.remote else {
            return self.local.software_list().await;
        };

        match remote.items().await {
            Ok(items) => Ok(items),
            Err(e) => {
                tracing::error!(error = %e, "Failed to fetch items from remote store");
                Ok(Vec::new())
            }
        }
    }

    pub async fn add_software(&self, item: SoftwareItem) -> Result<(), StorageError> {
        let item = item.normalized_secure_link()?;
        match &self.remote {
            Some(remote) => Ok(remote.insert_item(&item).await?),
            None => self.local.add_software(item).await,
        }
    }

    pub async fn delete_software(&self, id: &str) -> Result<(), StorageError> {
        match &self.remote {
            Some(remote) => Ok(remote.delete_item(id).await?),
            None => self.local.delete_software(id).await,
        }
    }

    /// Replace an item by id in a single write.
    ///
    /// The secure link flag and URL are validated together first, so neither
    /// backend can end up holding one without the other.
    pub async fn update_software(&self, item: SoftwareItem) -> Result<(), StorageError> {
        let item = item.normalized_secure_link()?;
        match &self.remote {
            Some(remote) => Ok(remote.update_item(&item).await?),
            None => self.local.update_software(item).await,
        }
    }

    // ========================================================================
    // Config
    // ========================================================================

    /// Bot settings, always from local storage.
    pub async fn get_telegram_config(&self) -> Result<TelegramConfig, StorageError> {
        self.local.telegram_config().await
    }

    /// Compare `key` against the fixed admin key.
    pub fn verify_admin_key(&self, key: &str) -> bool {
        verify_admin_key(key)
    }
}

/// Plaintext equality against the fixed admin key.
pub fn verify_admin_key(key: &str) -> bool {
    key == ADMIN_KEY
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::remote::ItemRow;
    use crate::storage::PLACEHOLDER_DOWNLOAD_URL;
    use pretty_assertions::assert_eq;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn local_storage() -> Storage {
        Storage::local_only(LocalStore::open(":memory:").await.unwrap())
    }

    async fn remote_storage(server: &MockServer) -> Storage {
        let mode = StorageMode::from_parts(
            Some(server.uri().as_str()),
            Some(SecretString::from("anon".to_string())),
        );
        Storage::new(
            mode,
            LocalStore::open(":memory:").await.unwrap(),
            reqwest::Client::new(),
        )
        .unwrap()
    }

    fn test_item(id: &str) -> SoftwareItem {
        SoftwareItem {
            id: id.to_string(),
            title: "Uploader".to_string(),
            file_name: None,
            description: "Uploads".to_string(),
            category_id: "cat_softs".to_string(),
            version: "1.0.0".to_string(),
            size: "5 MB".to_string(),
            download_url: "https://files.example.com/up.zip".to_string(),
            downloads: 0,
            created_at: 1_700_000_000_000,
            is_telegram_import: false,
            is_secure_link: None,
            secure_link_url: None,
            tags: vec!["Net".to_string()],
        }
    }

    #[test]
    fn test_mode_requires_both_parts() {
        let key = || Some(SecretString::from("k".to_string()));
        assert!(matches!(
            StorageMode::from_parts(Some("https://x.example.com"), key()),
            StorageMode::Remote { .. }
        ));
        assert!(matches!(
            StorageMode::from_parts(Some(""), key()),
            StorageMode::Local
        ));
        assert!(matches!(
            StorageMode::from_parts(Some("https://x.example.com"), None),
            StorageMode::Local
        ));
        assert!(matches!(
            StorageMode::from_parts(
                Some("https://x.example.com"),
                Some(SecretString::from(" ".to_string()))
            ),
            StorageMode::Local
        ));
    }

    #[test]
    fn test_verify_admin_key() {
        assert!(verify_admin_key("12345"));
        assert!(!verify_admin_key(""));
        assert!(!verify_admin_key("12345 "));
        assert!(!verify_admin_key("admin"));
        assert!(!verify_admin_key("\u{0}\u{fffd}"));
    }

    #[tokio::test]
    async fn test_local_backend_kind() {
        let storage = local_storage().await;
        assert_eq!(storage.backend(), BackendKind::Local);
    }

    #[tokio::test]
    async fn test_update_rejects_flag_without_url() {
        let storage = local_storage().await;
        storage.add_software(test_item("10")).await.unwrap();

        let mut broken = test_item("10");
        broken.is_secure_link = Some(true);
        let result = storage.update_software(broken).await;
        assert!(matches!(
            result,
            Err(StorageError::InconsistentSecureLink { .. })
        ));

        // Stored item is unchanged
        let items = storage.get_software_list().await.unwrap();
        assert_eq!(items[0], test_item("10"));
    }

    #[tokio::test]
    async fn test_telegram_config_is_local_in_remote_mode() {
        let server = MockServer::start().await;
        let storage = remote_storage(&server).await;
        assert_eq!(storage.backend(), BackendKind::Remote);

        let cfg = storage.get_telegram_config().await.unwrap();
        assert_eq!(cfg.bot_name, "FeitovManagerBot");
        assert!(server.received_requests().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_empty_categories_are_seeded() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/categories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(&server)
            .await;
        Mock::given(method("POST"))
            .and(path("/rest/v1/categories"))
            .respond_with(ResponseTemplate::new(201))
            .expect(4)
            .mount(&server)
            .await;

        let storage = remote_storage(&server).await;
        let cats = storage.get_categories().await.unwrap();
        assert_eq!(cats, seed_categories());
    }

    #[tokio::test]
    async fn test_remote_error_returns_empty_without_local_fallback() {
        let server = MockServer::start().await;
        Mock::given(method("GET"))
            .respond_with(ResponseTemplate::new(503))
            .mount(&server)
            .await;

        let storage = remote_storage(&server).await;
        assert!(storage.get_software_list().await.unwrap().is_empty());
        assert!(storage.get_categories().await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_remote_write_error_is_returned() {
        let server = MockServer::start().await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(409).set_body_string("duplicate key"))
            .mount(&server)
            .await;

        let storage = remote_storage(&server).await;
        let result = storage.add_software(test_item("11")).await;
        assert!(matches!(result, Err(StorageError::Remote(_))));
    }

    #[tokio::test]
    async fn test_remote_round_trip_keeps_all_but_download_url() {
        let server = MockServer::start().await;
        let mut item = test_item("12").with_secure_link("https://q1w2e3.ngrok-free.app/dl/12");
        item.file_name = Some("uploader.zip".to_string());
        item.downloads = 42;
        item.is_telegram_import = true;
        item.tags.push("Admin".to_string());
        Mock::given(method("POST"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(201))
            .mount(&server)
            .await;

        let storage = remote_storage(&server).await;
        storage.add_software(item.clone()).await.unwrap();

        // Serve back exactly what the insert wrote
        let requests = server.received_requests().await.unwrap();
        let insert = requests
            .iter()
            .find(|r| r.method.as_str() == "POST" && r.url.path() == "/rest/v1/items")
            .expect("insert request sent");
        let written: serde_json::Value = serde_json::from_slice(&insert.body).unwrap();
        assert!(written.get("download_url").is_none());
        assert!(written.get("downloadUrl").is_none());
        Mock::given(method("GET"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([written])))
            .mount(&server)
            .await;

        let items = storage.get_software_list().await.unwrap();

        let mut expected = item;
        expected.download_url = PLACEHOLDER_DOWNLOAD_URL.to_string();
        assert_eq!(items, vec![expected]);
    }

    #[tokio::test]
    async fn test_remote_list_keeps_rows_around_a_bad_one() {
        let server = MockServer::start().await;
        let first = ItemRow::from_item(&test_item("20"));
        let third = ItemRow::from_item(&test_item("22"));
        Mock::given(method("GET"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                first,
                {"id": "21", "title": "Broken", "tags": "not-a-list"},
                third,
                {"id": "23", "title": "Sparse", "description": null, "created_at": null}
            ])))
            .mount(&server)
            .await;

        let items = remote_storage(&server).await.get_software_list().await.unwrap();

        let ids: Vec<&str> = items.iter().map(|i| i.id.as_str()).collect();
        assert_eq!(ids, vec!["20", "22", "23"]);
        assert_eq!(items[2].description, "");
        assert_eq!(items[2].created_at, 0);
    }
}
