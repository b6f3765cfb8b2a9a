//! Client for the hosted table store (PostgREST conventions).
//!
//! Rows use snake_case column names. [`ItemRow`] and [`ItemPatch`] carry the
//! mapping to and from [`SoftwareItem`]; nothing else in the crate knows the
//! remote column names.
use secrecy::{ExposeSecret, SecretString};
use serde::{de::DeserializeOwned, Deserialize, Deserializer, Serialize};
use std::time::Duration;
use thiserror::Error;
use url::Url;

use super::types::{Category, SoftwareItem, PLACEHOLDER_DOWNLOAD_URL};

pub const ITEMS_TABLE: &str = "items";
pub const CATEGORIES_TABLE: &str = "categories";

const REQUEST_TIMEOUT: Duration = Duration::from_secs(20);

#[derive(Debug, Error)]
pub enum RemoteError {
    #[error("Request timed out after 20s")]
    Timeout,
    #[error("Network error: {0}")]
    Network(#[from] reqwest::Error),
    #[error("Remote store returned status {status}: {body}")]
    HttpStatus { status: u16, body: String },
    #[error("Invalid remote store URL: {0}")]
    InvalidUrl(#[from] url::ParseError),
    #[error("Insecure remote store URL: HTTPS required (except localhost for testing)")]
    InsecureBaseUrl,
}

// ============================================================================
// Row mapping
// ============================================================================

/// Remote row shape for the `items` table.
///
/// `download_url` has no column; reads restore [`PLACEHOLDER_DOWNLOAD_URL`].
/// Only `id` is mandatory on read: null or missing columns fall back to their
/// empty value so a partially filled row still shows up.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ItemRow {
    pub id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub title: String,
    #[serde(default)]
    pub file_name: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub description: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub category_id: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub version: String,
    #[serde(default, deserialize_with = "null_as_default")]
    pub size: String,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub downloads: i64,
    #[serde(default, deserialize_with = "lenient_i64")]
    pub created_at: i64,
    #[serde(default, deserialize_with = "null_as_default")]
    pub is_telegram_import: bool,
    #[serde(default)]
    pub is_secure_link: Option<bool>,
    #[serde(default)]
    pub secure_link_url: Option<String>,
    #[serde(default, deserialize_with = "null_as_default")]
    pub tags: Vec<String>,
}

impl ItemRow {
    pub fn from_item(item: &SoftwareItem) -> Self {
        Self {
            id: item.id.clone(),
            title: item.title.clone(),
            file_name: item.file_name.clone(),
            description: item.description.clone(),
            category_id: item.category_id.clone(),
            version: item.version.clone(),
            size: item.size.clone(),
            downloads: item.downloads,
            created_at: item.created_at,
            is_telegram_import: item.is_telegram_import,
            is_secure_link: item.is_secure_link,
            secure_link_url: item.secure_link_url.clone(),
            tags: item.tags.clone(),
        }
    }

    pub fn into_item(self) -> SoftwareItem {
        SoftwareItem {
            id: self.id,
            title: self.title,
            file_name: self.file_name,
            description: self.description,
            category_id: self.category_id,
            version: self.version,
            size: self.size,
            download_url: PLACEHOLDER_DOWNLOAD_URL.to_string(),
            downloads: self.downloads,
            created_at: self.created_at,
            is_telegram_import: self.is_telegram_import,
            is_secure_link: self.is_secure_link,
            secure_link_url: self.secure_link_url,
            tags: self.tags,
        }
    }
}

/// Column set written by an update. `id` and `created_at` are immutable.
///
/// `None` serializes as JSON `null`, so clearing the secure link clears the
/// column in the same request that clears the flag.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ItemPatch {
    pub title: String,
    pub file_name: Option<String>,
    pub description: String,
    pub category_id: String,
    pub version: String,
    pub size: String,
    pub downloads: i64,
    pub is_telegram_import: bool,
    pub is_secure_link: Option<bool>,
    pub secure_link_url: Option<String>,
    pub tags: Vec<String>,
}

impl ItemPatch {
    pub fn from_item(item: &SoftwareItem) -> Self {
        Self {
            title: item.title.clone(),
            file_name: item.file_name.clone(),
            description: item.description.clone(),
            category_id: item.category_id.clone(),
            version: item.version.clone(),
            size: item.size.clone(),
            downloads: item.downloads,
            is_telegram_import: item.is_telegram_import,
            is_secure_link: item.is_secure_link,
            secure_link_url: item.secure_link_url.clone(),
            tags: item.tags.clone(),
        }
    }
}

/// Accept bigint columns whether the server sends a number or a numeric
/// string. Null reads as 0; fractional or out-of-range values are rejected.
fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    #[derive(Deserialize)]
    #[serde(untagged)]
    enum NumberOrString {
        Int(i64),
        Float(f64),
        Text(String),
    }

    match Option::<NumberOrString>::deserialize(deserializer)? {
        None => Ok(0),
        Some(NumberOrString::Int(n)) => Ok(n),
        Some(NumberOrString::Float(f)) => integral_f64(f).ok_or_else(|| {
            serde::de::Error::custom(format!("expected an integer, found {}", f))
        }),
        Some(NumberOrString::Text(s)) => s.trim().parse().map_err(serde::de::Error::custom),
    }
}

/// `f` as an i64 when it has no fractional part and fits the range.
fn integral_f64(f: f64) -> Option<i64> {
    // i64::MAX as f64 rounds up to 2^63, which is already out of range
    let in_range = f >= i64::MIN as f64 && f < i64::MAX as f64;
    (f.is_finite() && f.fract() == 0.0 && in_range).then_some(f as i64)
}

/// Decode each row on its own, dropping the ones that don't fit `T`.
fn decode_rows<T: DeserializeOwned>(table: &str, rows: Vec<serde_json::Value>) -> Vec<T> {
    let total = rows.len();
    let decoded: Vec<T> = rows
        .into_iter()
        .filter_map(|row| match serde_json::from_value(row) {
            Ok(value) => Some(value),
            Err(e) => {
                tracing::warn!(table, error = %e, "Skipping malformed remote row");
                None
            }
        })
        .collect();

    if decoded.len() < total {
        tracing::warn!(
            table,
            kept = decoded.len(),
            skipped = total - decoded.len(),
            "Remote rows partially decoded"
        );
    }
    decoded
}

fn null_as_default<'de, D, T>(deserializer: D) -> Result<T, D::Error>
where
    D: Deserializer<'de>,
    T: Default + Deserialize<'de>,
{
    Ok(Option::<T>::deserialize(deserializer)?.unwrap_or_default())
}

// ============================================================================
// RemoteStore
// ============================================================================

/// Table-store client. One instance per process.
pub struct RemoteStore {
    client: reqwest::Client,
    rest_base: Url,
    anon_key: SecretString,
}

impl std::fmt::Debug for RemoteStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RemoteStore")
            .field("rest_base", &self.rest_base.as_str())
            .field("anon_key", &"[REDACTED]")
            .finish()
    }
}

impl RemoteStore {
    /// Build a client for the project at `base_url` (e.g. `https://xyz.supabase.co`).
    ///
    /// HTTPS is required so the key never travels in clear text; plain HTTP
    /// is accepted only for localhost.
    pub fn new(
        client: reqwest::Client,
        base_url: &str,
        anon_key: SecretString,
    ) -> Result<Self, RemoteError> {
        let parsed = Url::parse(base_url)?;
        if parsed.scheme() != "https" {
            let is_localhost = matches!(parsed.host_str(), Some("127.0.0.1" | "localhost"));
            if !is_localhost {
                tracing::error!(base_url = %base_url, "Rejecting non-HTTPS remote store URL");
                return Err(RemoteError::InsecureBaseUrl);
            }
            tracing::warn!(
                base_url = %base_url,
                "Using non-HTTPS remote store URL (localhost only)"
            );
        }

        let rest_base = parsed.join("rest/v1/")?;
        Ok(Self {
            client,
            rest_base,
            anon_key,
        })
    }

    fn table_url(&self, table: &str) -> Result<Url, RemoteError> {
        Ok(self.rest_base.join(table)?)
    }

    fn authorized(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        let key = self.anon_key.expose_secret();
        request
            .header("apikey", key)
            .header("Authorization", format!("Bearer {}", key))
    }

    async fn send(
        &self,
        request: reqwest::RequestBuilder,
    ) -> Result<reqwest::Response, RemoteError> {
        let response = tokio::time::timeout(REQUEST_TIMEOUT, self.authorized(request).send())
            .await
            .map_err(|_| RemoteError::Timeout)??;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(RemoteError::HttpStatus {
                status: status.as_u16(),
                body,
            });
        }
        Ok(response)
    }

    /// `SELECT *` with an optional `order` clause.
    ///
    /// Only the transport and the outer JSON array can fail the call. Rows that
    /// don't decode are skipped with a warning.
    async fn select<T: DeserializeOwned>(
        &self,
        table: &str,
        order: Option<&str>,
    ) -> Result<Vec<T>, RemoteError> {
        let mut url = self.table_url(table)?;
        {
            let mut query = url.query_pairs_mut();
            query.append_pair("select", "*");
            if let Some(order) = order {
                query.append_pair("order", order);
            }
        }
        let response = self.send(self.client.get(url)).await?;
        let rows: Vec<serde_json::Value> = response.json().await?;
        Ok(decode_rows(table, rows))
    }

    async fn insert<T: Serialize>(&self, table: &str, row: &T) -> Result<(), RemoteError> {
        let url = self.table_url(table)?;
        self.send(
            self.client
                .post(url)
                .header("Prefer", "return=minimal")
                .json(row),
        )
        .await?;
        Ok(())
    }

    async fn update_by_id<T: Serialize>(
        &self,
        table: &str,
        id: &str,
        patch: &T,
    ) -> Result<(), RemoteError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
        self.send(
            self.client
                .patch(url)
                .header("Prefer", "return=minimal")
                .json(patch),
        )
        .await?;
        Ok(())
    }

    async fn delete_by_id(&self, table: &str, id: &str) -> Result<(), RemoteError> {
        let mut url = self.table_url(table)?;
        url.query_pairs_mut().append_pair("id", &format!("eq.{}", id));
        self.send(self.client.delete(url)).await?;
        Ok(())
    }

    // ========================================================================
    // Table operations
    // ========================================================================

    pub async fn categories(&self) -> Result<Vec<Category>, RemoteError> {
        self.select(CATEGORIES_TABLE, None).await
    }

    pub async fn insert_category(&self, category: &Category) -> Result<(), RemoteError> {
        self.insert(CATEGORIES_TABLE, category).await
    }

    pub async fn delete_category(&self, id: &str) -> Result<(), RemoteError> {
        self.delete_by_id(CATEGORIES_TABLE, id).await
    }

    /// All items, newest first.
    pub async fn items(&self) -> Result<Vec<SoftwareItem>, RemoteError> {
        let rows: Vec<ItemRow> = self.select(ITEMS_TABLE, Some("created_at.desc")).await?;
        Ok(rows.into_iter().map(ItemRow::into_item).collect())
    }

    pub async fn insert_item(&self, item: &SoftwareItem) -> Result<(), RemoteError> {
        self.insert(ITEMS_TABLE, &ItemRow::from_item(item)).await
    }

    pub async fn update_item(&self, item: &SoftwareItem) -> Result<(), RemoteError> {
        self.update_by_id(ITEMS_TABLE, &item.id, &ItemPatch::from_item(item))
            .await
    }

    pub async fn delete_item(&self, id: &str) -> Result<(), RemoteError> {
        self.delete_by_id(ITEMS_TABLE, id).await
    }
}
