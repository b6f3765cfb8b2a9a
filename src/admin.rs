//! Admin-side input forms and the records they produce.
use rand::Rng;

use crate::storage::{Category, SoftwareItem, PLACEHOLDER_DOWNLOAD_URL};

/// Category used by imports when no category exists at all.
pub const FALLBACK_IMPORT_CATEGORY: &str = "misc";

// ============================================================================
// Direct upload
// ============================================================================

/// Direct-upload form fields, as typed by the admin.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadForm {
    pub title: String,
    pub description: String,
    pub version: String,
    pub category_id: String,
    /// Comma-separated tag list
    pub tags: String,
    /// Free-text size; a random size is filled in when empty
    pub size: String,
    pub file_name: String,
}

impl Default for UploadForm {
    fn default() -> Self {
        Self {
            title: String::new(),
            description: String::new(),
            version: "1.0.0".to_string(),
            category_id: String::new(),
            tags: String::new(),
            size: String::new(),
            file_name: String::new(),
        }
    }
}

impl UploadForm {
    /// Empty form preselecting the first category.
    pub fn for_categories(categories: &[Category]) -> Self {
        Self {
            category_id: categories.first().map(|c| c.id.clone()).unwrap_or_default(),
            ..Self::default()
        }
    }

    /// Fill title, file name, size and version from a picked file.
    pub fn fill_from_file(&mut self, file_name: &str, size_bytes: u64) {
        self.title = file_name.to_string();
        self.file_name = file_name.to_string();
        self.size = format_file_size(size_bytes);
        self.version = "1.0.0".to_string();
    }

    /// Build the catalog record. The id is the creation time in millis.
    pub fn into_item(self, now_ms: i64) -> SoftwareItem {
        let file_name = if self.file_name.is_empty() {
            self.title.clone()
        } else {
            self.file_name
        };
        let size = if self.size.trim().is_empty() {
            format!("{} MB", rand::rng().random_range(10..510))
        } else {
            self.size
        };

        SoftwareItem {
            id: now_ms.to_string(),
            title: self.title,
            file_name: Some(file_name),
            description: self.description,
            category_id: self.category_id,
            version: self.version,
            size,
            download_url: PLACEHOLDER_DOWNLOAD_URL.to_string(),
            downloads: 0,
            created_at: now_ms,
            is_telegram_import: false,
            is_secure_link: None,
            secure_link_url: None,
            tags: parse_tags(&self.tags),
        }
    }
}

/// Split a comma-separated tag list, trimming and dropping empties.
pub fn parse_tags(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(str::to_string)
        .collect()
}

/// Size in megabytes with two decimals, e.g. "1.50 MB".
pub fn format_file_size(bytes: u64) -> String {
    format!("{:.2} MB", bytes as f64 / (1024.0 * 1024.0))
}

// ============================================================================
// Categories
// ============================================================================

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CategoryForm {
    pub name: String,
    pub icon: String,
}

impl Default for CategoryForm {
    fn default() -> Self {
        Self {
            name: String::new(),
            icon: "folder".to_string(),
        }
    }
}

impl CategoryForm {
    pub fn into_category(self, now_ms: i64) -> Category {
        Category {
            id: format!("cat_{}", now_ms),
            name: self.name,
            icon: self.icon,
        }
    }
}

// ============================================================================
// Telegram import
// ============================================================================

/// The record produced by the (mock) private-channel import.
pub fn telegram_import_item(categories: &[Category], now_ms: i64) -> SoftwareItem {
    SoftwareItem {
        id: now_ms.to_string(),
        title: "Telegram_Export_Crack_v2.zip".to_string(),
        file_name: Some("Telegram_Export_Crack_v2.zip".to_string()),
        description: "Imported directly from Private Channel #9921. Contains necessary patches."
            .to_string(),
        category_id: categories
            .first()
            .map(|c| c.id.clone())
            .unwrap_or_else(|| FALLBACK_IMPORT_CATEGORY.to_string()),
        version: "2.0.0-beta".to_string(),
        size: "89 MB".to_string(),
        download_url: PLACEHOLDER_DOWNLOAD_URL.to_string(),
        downloads: 0,
        created_at: now_ms,
        is_telegram_import: true,
        is_secure_link: None,
        secure_link_url: None,
        tags: vec!["Imported".to_string(), "Telegram".to_string()],
    }
}
