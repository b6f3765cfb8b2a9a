use anyhow::{bail, Result};
use std::borrow::Cow;
use std::sync::Arc;
use std::time::Duration;

use crate::admin::{telegram_import_item, CategoryForm, UploadForm};
use crate::relay::{Suggestion, SuggestionRelay};
use crate::session::{SessionStorage, ADMIN_SESSION_ACTIVE, ADMIN_SESSION_KEY};
use crate::storage::{
    Category, SoftwareItem, Storage, StorageError, TelegramConfig, PLACEHOLDER_DOWNLOAD_URL,
    UNCATEGORIZED,
};
use crate::theme::ThemeMode;
use crate::tunnel;

/// Simulated latency of the private-channel import.
const TELEGRAM_IMPORT_DELAY: Duration = Duration::from_secs(1);

/// Pauses used by the simulated admin actions.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SimulatedDelays {
    /// Pauses between the tunnel setup steps
    pub tunnel_steps: [Duration; 3],
    pub telegram_import: Duration,
}

impl Default for SimulatedDelays {
    fn default() -> Self {
        Self {
            tunnel_steps: tunnel::STEP_DELAYS,
            telegram_import: TELEGRAM_IMPORT_DELAY,
        }
    }
}

impl SimulatedDelays {
    /// No pauses at all.
    pub fn none() -> Self {
        Self {
            tunnel_steps: [Duration::ZERO; 3],
            telegram_import: Duration::ZERO,
        }
    }
}

/// Result of [`App::toggle_tunnel`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum TunnelChange {
    Created(String),
    Revoked,
    /// The remote store rejected the write; see the status message
    Unchanged,
}

// ============================================================================
// View and Filter Types
// ============================================================================

/// Current top-level view
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum View {
    #[default]
    Home,
    Admin,
}

/// Category filter for the catalog view.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub enum CategoryFilter {
    /// No filtering (the "all" sentinel)
    #[default]
    All,
    Id(String),
}

impl CategoryFilter {
    /// Parse a CLI/user value. `None`, empty and `"all"` mean no filter.
    pub fn from_arg(value: Option<&str>) -> Self {
        match value.map(str::trim) {
            None | Some("") | Some("all") => Self::All,
            Some(id) => Self::Id(id.to_string()),
        }
    }

    pub fn matches(&self, category_id: &str) -> bool {
        match self {
            Self::All => true,
            Self::Id(id) => id == category_id,
        }
    }
}

// ============================================================================
// Filtering
// ============================================================================

/// Items visible for the given search term and category filter.
///
/// An item is kept when the category matches (or the filter is `All`) and the
/// search term is empty or found, case-insensitively, in the title or in any
/// tag. Plain linear scan, re-run on every call.
pub fn filter_items<'a>(
    items: &'a [SoftwareItem],
    search_term: &str,
    filter: &CategoryFilter,
) -> Vec<&'a SoftwareItem> {
    let needle = search_term.to_lowercase();
    items
        .iter()
        .filter(|item| filter.matches(&item.category_id))
        .filter(|item| matches_search(item, &needle))
        .collect()
}

fn matches_search(item: &SoftwareItem, needle: &str) -> bool {
    needle.is_empty()
        || item.title.to_lowercase().contains(needle)
        || item.tags.iter().any(|tag| tag.to_lowercase().contains(needle))
}

fn now_ms() -> i64 {
    chrono::Utc::now().timestamp_millis()
}

// ============================================================================
// App
// ============================================================================

/// Authoritative in-memory state for the catalog UI.
///
/// Collections are only ever replaced wholesale by [`App::refresh`]; every
/// mutating action writes through the storage façade and then refreshes.
pub struct App {
    storage: Arc<Storage>,
    session: SessionStorage,
    delays: SimulatedDelays,

    pub items: Arc<Vec<SoftwareItem>>,
    pub categories: Arc<Vec<Category>>,
    /// True from the start of a refresh until both fetches have landed
    pub loading: bool,
    pub search_term: String,
    pub selected_category: CategoryFilter,
    pub theme: ThemeMode,
    pub view: View,
    pub is_admin: bool,

    /// One-shot notice for the user, cleared by [`App::take_status`]
    pub status_message: Option<Cow<'static, str>>,
}

impl App {
    /// Create the controller, restoring the admin flag from the session marker.
    ///
    /// Collections start empty with `loading` set; call [`App::refresh`].
    pub fn new(storage: Arc<Storage>, session: SessionStorage, theme: ThemeMode) -> Self {
        let is_admin = session.has_admin_marker();
        if is_admin {
            tracing::debug!("Restored admin session");
        }

        Self {
            storage,
            session,
            delays: SimulatedDelays::default(),
            items: Arc::new(Vec::new()),
            categories: Arc::new(Vec::new()),
            loading: true,
            search_term: String::new(),
            selected_category: CategoryFilter::All,
            theme,
            view: View::Home,
            is_admin,
            status_message: None,
        }
    }

    /// Replace the pauses of the simulated tunnel and import.
    pub fn with_delays(mut self, delays: SimulatedDelays) -> Self {
        self.delays = delays;
        self
    }

    pub fn storage(&self) -> &Storage {
        &self.storage
    }

    pub fn session(&self) -> &SessionStorage {
        &self.session
    }

    // ========================================================================
    // Loading
    // ========================================================================

    /// Fetch items and categories in parallel and replace both together.
    ///
    /// If either leg fails, neither collection changes and the previous
    /// (possibly stale) snapshot stays visible.
    pub async fn refresh(&mut self) {
        self.loading = true;

        let (items, categories) = tokio::join!(
            self.storage.get_software_list(),
            self.storage.get_categories()
        );

        match (items, categories) {
            (Ok(items), Ok(categories)) => {
                tracing::debug!(
                    items = items.len(),
                    categories = categories.len(),
                    "Catalog refreshed"
                );
                self.items = Arc::new(items);
                self.categories = Arc::new(categories);
            }
            (Err(e), _) | (_, Err(e)) => {
                tracing::error!(error = %e, "Failed to load data");
                self.set_status("Failed to load data");
            }
        }

        self.loading = false;
    }

    // ========================================================================
    // Derived view state
    // ========================================================================

    /// Items visible under the current search term and category filter.
    pub fn filtered_items(&self) -> Vec<&SoftwareItem> {
        filter_items(&self.items, &self.search_term, &self.selected_category)
    }

    pub fn set_search_term(&mut self, term: impl Into<String>) {
        self.search_term = term.into();
    }

    pub fn select_category(&mut self, filter: CategoryFilter) {
        self.selected_category = filter;
    }

    /// The item's category, if it still exists.
    pub fn category_for(&self, item: &SoftwareItem) -> Option<&Category> {
        self.categories.iter().find(|c| c.id == item.category_id)
    }

    /// Display name of the item's category, or the uncategorized fallback.
    pub fn category_name(&self, item: &SoftwareItem) -> &str {
        self.category_for(item)
            .map(|c| c.name.as_str())
            .unwrap_or(UNCATEGORIZED)
    }

    /// Where a download of `item` points: the active secure link, else the
    /// stored URL, else the local source.
    pub fn download_target(item: &SoftwareItem) -> &str {
        if item.has_secure_link() {
            if let Some(url) = item.secure_link_url.as_deref().filter(|u| !u.is_empty()) {
                return url;
            }
        }
        if item.download_url.is_empty() {
            "local source"
        } else {
            &item.download_url
        }
    }

    /// Whether the item only has the placeholder download location.
    pub fn is_placeholder_download(item: &SoftwareItem) -> bool {
        item.download_url == PLACEHOLDER_DOWNLOAD_URL
    }

    // ========================================================================
    // UI state
    // ========================================================================

    /// Cycle Dark → Light → Black → Dark. Returns the new theme name.
    pub fn cycle_theme(&mut self) -> &'static str {
        self.theme = self.theme.next();
        self.theme.name()
    }

    pub fn set_view(&mut self, view: View) {
        self.view = view;
    }

    pub fn set_status(&mut self, msg: impl Into<Cow<'static, str>>) {
        self.status_message = Some(msg.into());
    }

    /// Take the pending notice, leaving none behind.
    pub fn take_status(&mut self) -> Option<Cow<'static, str>> {
        self.status_message.take()
    }

    // ========================================================================
    // Admin session
    // ========================================================================

    /// Check the admin key. On success the session marker and the admin flag
    /// are set together and the admin view opens.
    ///
    /// This is a plaintext comparison against a fixed value, not authentication.
    pub fn login(&mut self, key: &str) -> bool {
        let valid = self.storage.verify_admin_key(key);
        if valid {
            self.is_admin = true;
            self.session.set(ADMIN_SESSION_KEY, ADMIN_SESSION_ACTIVE);
            self.view = View::Admin;
            tracing::info!("Admin session started");
        } else {
            tracing::warn!("Admin key rejected");
        }
        valid
    }

    /// Clear the admin flag and marker and return to the home view.
    pub fn logout(&mut self) {
        self.is_admin = false;
        self.session.remove(ADMIN_SESSION_KEY);
        self.view = View::Home;
        tracing::info!("Admin session ended");
    }

    fn ensure_admin(&self) -> Result<()> {
        if !self.is_admin {
            bail!("Admin session required");
        }
        Ok(())
    }

    // ========================================================================
    // Admin actions
    // ========================================================================

    /// Record a write outcome, then reload the catalog either way.
    ///
    /// Returns whether the write landed. A remote store failure becomes a
    /// status notice and `Ok(false)`, so the caller sees a no-op rather than
    /// an error. Local and validation failures are still returned.
    async fn finish_write(
        &mut self,
        action: &'static str,
        result: Result<(), StorageError>,
    ) -> Result<bool> {
        let outcome = match result {
            Ok(()) => Ok(true),
            Err(StorageError::Remote(e)) => {
                tracing::error!(action, error = %e, "Remote store write failed");
                self.set_status(format!("{} failed: {}", action, e));
                Ok(false)
            }
            Err(e) => {
                tracing::error!(action, error = %e, "Storage write failed");
                self.set_status(format!("{} failed: {}", action, e));
                Err(e.into())
            }
        };
        self.refresh().await;
        outcome
    }

    /// Add an item from the direct-upload form.
    ///
    /// `None` when the remote store rejected the write.
    pub async fn upload(&mut self, form: UploadForm) -> Result<Option<SoftwareItem>> {
        self.ensure_admin()?;
        let item = form.into_item(now_ms());
        let result = self.storage.add_software(item.clone()).await;
        let stored = self.finish_write("Upload", result).await?;
        Ok(stored.then_some(item))
    }

    /// Add the mock item produced by the private-channel import.
    pub async fn import_from_telegram(&mut self) -> Result<Option<SoftwareItem>> {
        self.ensure_admin()?;
        tokio::time::sleep(self.delays.telegram_import).await;

        let item = telegram_import_item(&self.categories, now_ms());
        let result = self.storage.add_software(item.clone()).await;
        let stored = self.finish_write("Telegram import", result).await?;
        Ok(stored.then_some(item))
    }

    pub async fn delete_item(&mut self, id: &str) -> Result<bool> {
        self.ensure_admin()?;
        let result = self.storage.delete_software(id).await;
        self.finish_write("Delete", result).await
    }

    pub async fn add_category(&mut self, form: CategoryForm) -> Result<Option<Category>> {
        self.ensure_admin()?;
        let category = form.into_category(now_ms());
        let result = self.storage.add_category(category.clone()).await;
        let stored = self.finish_write("Add category", result).await?;
        Ok(stored.then_some(category))
    }

    /// Delete a category. Items that reference it keep their `category_id`
    /// and display as uncategorized.
    pub async fn delete_category(&mut self, id: &str) -> Result<bool> {
        self.ensure_admin()?;
        let result = self.storage.delete_category(id).await;
        self.finish_write("Delete category", result).await
    }

    /// Bot settings for the admin bot panel.
    pub async fn telegram_config(&self) -> Result<TelegramConfig> {
        self.ensure_admin()?;
        Ok(self.storage.get_telegram_config().await?)
    }

    fn find_item(&self, id: &str) -> Result<SoftwareItem> {
        match self.items.iter().find(|i| i.id == id) {
            Some(item) => Ok(item.clone()),
            None => bail!("No item with id {}", id),
        }
    }

    /// Run the simulated tunnel for an item and store the resulting link.
    ///
    /// The flag and URL are written together in one update. `None` when the
    /// remote store rejected that update.
    pub async fn create_tunnel(
        &mut self,
        id: &str,
        on_log: impl FnMut(String),
    ) -> Result<Option<String>> {
        self.ensure_admin()?;
        let item = self.find_item(id)?;

        let url = tunnel::establish_with(&item, self.delays.tunnel_steps, on_log).await;
        let result = self
            .storage
            .update_software(item.with_secure_link(url.clone()))
            .await;
        let stored = self.finish_write("Create tunnel", result).await?;
        Ok(stored.then_some(url))
    }

    /// Clear an item's secure link, flag and URL in one update.
    pub async fn revoke_tunnel(&mut self, id: &str) -> Result<bool> {
        self.ensure_admin()?;
        let item = self.find_item(id)?;

        let result = self.storage.update_software(item.without_secure_link()).await;
        self.finish_write("Revoke tunnel", result).await
    }

    /// Revoke an active tunnel instantly, or create one if none is active.
    pub async fn toggle_tunnel(
        &mut self,
        id: &str,
        on_log: impl FnMut(String),
    ) -> Result<TunnelChange> {
        self.ensure_admin()?;
        let change = if self.find_item(id)?.has_secure_link() {
            if self.revoke_tunnel(id).await? {
                TunnelChange::Revoked
            } else {
                TunnelChange::Unchanged
            }
        } else {
            match self.create_tunnel(id, on_log).await? {
                Some(url) => TunnelChange::Created(url),
                None => TunnelChange::Unchanged,
            }
        };
        Ok(change)
    }

    // ========================================================================
    // Suggestions
    // ========================================================================

    /// Relay a suggestion and leave a one-shot notice with the outcome.
    ///
    /// Returns whether it was sent. On failure the caller keeps its form data.
    pub async fn send_suggestion(
        &mut self,
        relay: &SuggestionRelay,
        suggestion: &Suggestion,
    ) -> bool {
        match relay.send(suggestion).await {
            Ok(()) => {
                self.set_status("Suggestion sent successfully!");
                true
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to send suggestion");
                self.set_status("Failed to send suggestion. Please try again later.");
                false
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::storage::{seed_categories, LocalStore, StorageMode};
    use pretty_assertions::assert_eq;
    use secrecy::SecretString;
    use serde_json::json;
    use wiremock::matchers::{method, path};
    use wiremock::{Mock, MockServer, ResponseTemplate};

    async fn test_app() -> App {
        let local = LocalStore::open(":memory:").await.unwrap();
        App::new(
            Arc::new(Storage::local_only(local)),
            SessionStorage::new(),
            ThemeMode::Dark,
        )
        .with_delays(SimulatedDelays::none())
    }

    async fn admin_app() -> App {
        let mut app = test_app().await;
        assert!(app.login("12345"));
        app.refresh().await;
        app
    }

    fn test_item(id: &str, title: &str, category_id: &str, tags: &[&str]) -> SoftwareItem {
        SoftwareItem {
            id: id.to_string(),
            title: title.to_string(),
            file_name: None,
            description: String::new(),
            category_id: category_id.to_string(),
            version: "1.0.0".to_string(),
            size: "1 MB".to_string(),
            download_url: PLACEHOLDER_DOWNLOAD_URL.to_string(),
            downloads: 0,
            created_at: 0,
            is_telegram_import: false,
            is_secure_link: None,
            secure_link_url: None,
            tags: tags.iter().map(|t| t.to_string()).collect(),
        }
    }

    fn example_items() -> Vec<SoftwareItem> {
        vec![
            test_item("1", "DevToolkit Pro", "cat_softs", &["Utility", "Dev"]),
            test_item("2", "LeakCheck DB", "cat_db", &["SQL", "Data"]),
        ]
    }

    fn ids(items: &[&SoftwareItem]) -> Vec<String> {
        items.iter().map(|i| i.id.clone()).collect()
    }

    // ========================================================================
    // Filtering
    // ========================================================================

    #[test]
    fn test_filter_search_matches_title() {
        let items = example_items();
        let visible = filter_items(&items, "dev", &CategoryFilter::All);
        assert_eq!(ids(&visible), vec!["1"]);
    }

    #[test]
    fn test_filter_category_only() {
        let items = example_items();
        let visible = filter_items(&items, "", &CategoryFilter::Id("cat_db".to_string()));
        assert_eq!(ids(&visible), vec!["2"]);
    }

    #[test]
    fn test_filter_search_matches_tag_case_insensitive() {
        let items = example_items();
        let visible = filter_items(&items, "sQl", &CategoryFilter::All);
        assert_eq!(ids(&visible), vec!["2"]);
    }

    #[test]
    fn test_filter_requires_both_conditions() {
        let items = example_items();
        let visible = filter_items(&items, "dev", &CategoryFilter::Id("cat_db".to_string()));
        assert!(visible.is_empty());
    }

    #[test]
    fn test_filter_empty_term_all_keeps_order() {
        let items = example_items();
        let visible = filter_items(&items, "", &CategoryFilter::All);
        assert_eq!(ids(&visible), vec!["1", "2"]);
    }

    #[test]
    fn test_category_filter_from_arg() {
        assert_eq!(CategoryFilter::from_arg(None), CategoryFilter::All);
        assert_eq!(CategoryFilter::from_arg(Some("all")), CategoryFilter::All);
        assert_eq!(CategoryFilter::from_arg(Some(" ")), CategoryFilter::All);
        assert_eq!(
            CategoryFilter::from_arg(Some("cat_db")),
            CategoryFilter::Id("cat_db".to_string())
        );
    }

    // ========================================================================
    // Loading and derived state
    // ========================================================================

    #[tokio::test]
    async fn test_new_app_starts_loading_and_empty() {
        let app = test_app().await;
        assert!(app.loading);
        assert!(app.items.is_empty());
        assert_eq!(app.view, View::Home);
        assert!(!app.is_admin);
    }

    #[tokio::test]
    async fn test_refresh_loads_both_collections() {
        let mut app = test_app().await;
        app.refresh().await;
        assert!(!app.loading);
        assert_eq!(app.items.len(), 2);
        assert_eq!(*app.categories, seed_categories());
    }

    #[tokio::test]
    async fn test_filtered_items_uses_app_state() {
        let mut app = test_app().await;
        app.refresh().await;

        app.set_search_term("LEAK");
        assert_eq!(ids(&app.filtered_items()), vec!["2"]);

        app.set_search_term("");
        app.select_category(CategoryFilter::Id("cat_softs".to_string()));
        assert_eq!(ids(&app.filtered_items()), vec!["1"]);
    }

    #[tokio::test]
    async fn test_category_name_fallback() {
        let mut app = test_app().await;
        app.items = Arc::new(vec![test_item("9", "Orphan", "cat_gone", &[])]);
        app.categories = Arc::new(seed_categories());
        assert_eq!(app.category_name(&app.items[0]), UNCATEGORIZED);
        assert!(app.category_for(&app.items[0]).is_none());
    }

    #[test]
    fn test_download_target() {
        let item = test_item("1", "A", "c", &[]);
        assert_eq!(App::download_target(&item), "#");
        assert!(App::is_placeholder_download(&item));

        let linked = item.with_secure_link("https://abcdef.ngrok-free.app/dl/1");
        assert_eq!(
            App::download_target(&linked),
            "https://abcdef.ngrok-free.app/dl/1"
        );

        let mut bare = item;
        bare.download_url = String::new();
        assert_eq!(App::download_target(&bare), "local source");
    }

    // ========================================================================
    // Theme and view
    // ========================================================================

    #[tokio::test]
    async fn test_cycle_theme_full_round_trip() {
        let mut app = test_app().await;
        assert_eq!(app.cycle_theme(), "Light");
        assert_eq!(app.cycle_theme(), "Black");
        assert_eq!(app.cycle_theme(), "Dark");
        assert_eq!(app.theme, ThemeMode::Dark);
    }

    #[tokio::test]
    async fn test_status_is_one_shot() {
        let mut app = test_app().await;
        app.set_status("hello");
        assert_eq!(app.take_status().as_deref(), Some("hello"));
        assert_eq!(app.take_status(), None);
    }

    // ========================================================================
    // Admin session
    // ========================================================================

    #[tokio::test]
    async fn test_login_sets_flag_marker_and_view() {
        let mut app = test_app().await;
        assert!(!app.login("wrong"));
        assert!(!app.is_admin);
        assert!(!app.session().has_admin_marker());

        assert!(app.login("12345"));
        assert!(app.is_admin);
        assert!(app.session().has_admin_marker());
        assert_eq!(app.view, View::Admin);
    }

    #[tokio::test]
    async fn test_logout_clears_and_returns_home() {
        let mut app = admin_app().await;
        app.logout();
        assert!(!app.is_admin);
        assert!(!app.session().has_admin_marker());
        assert_eq!(app.view, View::Home);
    }

    #[tokio::test]
    async fn test_admin_restored_from_session_marker() {
        let local = LocalStore::open(":memory:").await.unwrap();
        let mut session = SessionStorage::new();
        session.set(ADMIN_SESSION_KEY, ADMIN_SESSION_ACTIVE);

        let app = App::new(Arc::new(Storage::local_only(local)), session, ThemeMode::Light);
        assert!(app.is_admin);
        assert_eq!(app.theme, ThemeMode::Light);
    }

    #[tokio::test]
    async fn test_admin_actions_require_login() {
        let mut app = test_app().await;
        app.refresh().await;
        assert!(app.delete_item("1").await.is_err());
        assert!(app.upload(UploadForm::default()).await.is_err());
        assert!(app.telegram_config().await.is_err());
        // Nothing was deleted
        assert_eq!(app.items.len(), 2);
    }

    // ========================================================================
    // Admin actions
    // ========================================================================

    #[tokio::test]
    async fn test_upload_refreshes_with_new_item_first() {
        let mut app = admin_app().await;
        let form = UploadForm {
            title: "Fresh".to_string(),
            tags: "New".to_string(),
            ..UploadForm::for_categories(&app.categories)
        };
        let item = app.upload(form).await.unwrap().expect("upload should be stored");

        assert_eq!(app.items.len(), 3);
        assert_eq!(app.items[0], item);
        assert_eq!(app.items[0].category_id, "cat_softs");
    }

    #[tokio::test]
    async fn test_import_from_telegram() {
        let mut app = admin_app().await;
        let item = app.import_from_telegram().await.unwrap().unwrap();
        assert!(item.is_telegram_import);
        assert_eq!(app.items[0].id, item.id);
    }

    #[tokio::test]
    async fn test_delete_category_keeps_items() {
        let mut app = admin_app().await;
        assert!(app.delete_category("cat_db").await.unwrap());

        assert_eq!(app.categories.len(), 3);
        let orphan = app.items.iter().find(|i| i.id == "2").unwrap();
        assert_eq!(orphan.category_id, "cat_db");
        assert_eq!(app.category_name(orphan), UNCATEGORIZED);
    }

    #[tokio::test]
    async fn test_add_category() {
        let mut app = admin_app().await;
        let cat = app
            .add_category(CategoryForm {
                name: "Tools".to_string(),
                icon: "wrench".to_string(),
            })
            .await
            .unwrap()
            .unwrap();
        assert!(cat.id.starts_with("cat_"));
        assert_eq!(app.categories.last(), Some(&cat));
    }

    #[tokio::test]
    async fn test_toggle_tunnel_creates_then_revokes() {
        let mut app = admin_app().await;
        let mut logs = Vec::new();

        let change = app
            .toggle_tunnel("1", |line| logs.push(line))
            .await
            .unwrap();
        let TunnelChange::Created(url) = change else {
            panic!("expected a new tunnel, got {:?}", change);
        };
        assert_eq!(logs.len(), 5);

        let item = app.items.iter().find(|i| i.id == "1").unwrap();
        assert!(item.has_secure_link());
        assert_eq!(item.secure_link_url.as_deref(), Some(url.as_str()));
        assert!(tunnel::is_secure_link_for(&url, "1"));

        let revoked = app.toggle_tunnel("1", |_| {}).await.unwrap();
        assert_eq!(revoked, TunnelChange::Revoked);
        let item = app.items.iter().find(|i| i.id == "1").unwrap();
        assert_eq!(item.is_secure_link, Some(false));
        assert_eq!(item.secure_link_url, None);
    }

    #[test]
    fn test_default_delays_match_simulation() {
        let delays = SimulatedDelays::default();
        assert_eq!(delays.telegram_import, Duration::from_secs(1));
        assert_eq!(delays.tunnel_steps, tunnel::STEP_DELAYS);
    }

    // ========================================================================
    // Remote write failures
    // ========================================================================

    async fn remote_admin_app(server: &MockServer) -> App {
        let mode = StorageMode::from_parts(
            Some(server.uri().as_str()),
            Some(SecretString::from("anon".to_string())),
        );
        let storage = Storage::new(
            mode,
            LocalStore::open(":memory:").await.unwrap(),
            reqwest::Client::new(),
        )
        .unwrap();
        let mut app = App::new(Arc::new(storage), SessionStorage::new(), ThemeMode::Dark)
            .with_delays(SimulatedDelays::none());
        assert!(app.login("12345"));
        app.refresh().await;
        app
    }

    async fn mount_failing_writes(server: &MockServer) {
        Mock::given(method("GET"))
            .and(path("/rest/v1/items"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([])))
            .mount(server)
            .await;
        Mock::given(method("GET"))
            .and(path("/rest/v1/categories"))
            .respond_with(ResponseTemplate::new(200).set_body_json(json!([
                {"id": "cat_softs", "name": "Software", "icon": "compact-disc"}
            ])))
            .mount(server)
            .await;
        Mock::given(method("POST"))
            .respond_with(ResponseTemplate::new(503).set_body_string("unavailable"))
            .mount(server)
            .await;
        Mock::given(method("DELETE"))
            .respond_with(ResponseTemplate::new(503))
            .mount(server)
            .await;
    }

    #[tokio::test]
    async fn test_remote_upload_failure_is_a_noop_with_notice() {
        let server = MockServer::start().await;
        mount_failing_writes(&server).await;
        let mut app = remote_admin_app(&server).await;

        let form = UploadForm {
            title: "Fresh".to_string(),
            ..UploadForm::for_categories(&app.categories)
        };
        let stored = app.upload(form).await.unwrap();

        assert_eq!(stored, None);
        assert!(app.items.is_empty());
        assert!(!app.loading);
        let notice = app.take_status().expect("failure notice");
        assert!(notice.starts_with("Upload failed:"), "{}", notice);
    }

    #[tokio::test]
    async fn test_remote_delete_failure_is_a_noop_with_notice() {
        let server = MockServer::start().await;
        mount_failing_writes(&server).await;
        let mut app = remote_admin_app(&server).await;

        assert!(!app.delete_category("cat_softs").await.unwrap());
        assert_eq!(app.categories.len(), 1);
        assert!(app.take_status().is_some());
    }

    #[tokio::test]
    async fn test_tunnel_unknown_item() {
        let mut app = admin_app().await;
        assert!(app.revoke_tunnel("nope").await.is_err());
    }

    #[tokio::test]
    async fn test_telegram_config_for_admin() {
        let app = admin_app().await;
        let cfg = app.telegram_config().await.unwrap();
        assert_eq!(cfg.bot_name, "FeitovManagerBot");
    }

    #[tokio::test]
    async fn test_send_suggestion_failure_sets_notice() {
        let mut app = test_app().await;
        let relay = SuggestionRelay::new(
            reqwest::Client::new(),
            "http://127.0.0.1:9",
            None,
            "1",
        )
        .unwrap();
        let sent = app.send_suggestion(&relay, &Suggestion::default()).await;
        assert!(!sent);
        assert_eq!(
            app.take_status().as_deref(),
            Some("Failed to send suggestion. Please try again later.")
        );
    }
}
