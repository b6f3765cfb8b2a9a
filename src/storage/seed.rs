//! Default content written on first access to an empty store.

use super::types::{Category, SoftwareItem, TelegramConfig, PLACEHOLDER_DOWNLOAD_URL};

pub fn seed_categories() -> Vec<Category> {
    [
        ("cat_softs", "Software", "compact-disc"),
        ("cat_db", "Databases", "database"),
        ("cat_scripts", "Scripts", "code"),
        ("cat_configs", "Configs", "sliders"),
    ]
    .into_iter()
    .map(|(id, name, icon)| Category {
        id: id.to_string(),
        name: name.to_string(),
        icon: icon.to_string(),
    })
    .collect()
}

/// Seed catalog. `created_at` values are offsets back from `now_ms`.
pub fn seed_items(now_ms: i64) -> Vec<SoftwareItem> {
    vec![
        SoftwareItem {
            id: "1".to_string(),
            title: "DevToolkit Pro".to_string(),
            file_name: Some("devkit_pro_v2.4.0.exe".to_string()),
            description: "All-in-one developer utility belt for debugging and compilation."
                .to_string(),
            category_id: "cat_softs".to_string(),
            version: "2.4.0".to_string(),
            size: "145 MB".to_string(),
            download_url: PLACEHOLDER_DOWNLOAD_URL.to_string(),
            downloads: 1240,
            created_at: now_ms - 10_000_000,
            is_telegram_import: false,
            is_secure_link: None,
            secure_link_url: None,
            tags: vec!["Utility".to_string(), "Dev".to_string()],
        },
        SoftwareItem {
            id: "2".to_string(),
            title: "LeakCheck DB 2024".to_string(),
            file_name: Some("leak_check_2024_dump.sql.gz".to_string()),
            description: "Sample database for vulnerability testing purposes only.".to_string(),
            category_id: "cat_db".to_string(),
            version: "1.0.0".to_string(),
            size: "450 MB".to_string(),
            download_url: PLACEHOLDER_DOWNLOAD_URL.to_string(),
            downloads: 850,
            created_at: now_ms - 5_000_000,
            is_telegram_import: true,
            is_secure_link: None,
            secure_link_url: None,
            tags: vec!["SQL".to_string(), "Data".to_string()],
        },
    ]
}

/// Placeholder bot settings. The token is display-only and must be replaced
/// through local storage before it means anything.
pub fn seed_telegram_config() -> TelegramConfig {
    TelegramConfig {
        bot_token: "0000000000:REPLACE_WITH_BOT_TOKEN".to_string(),
        admin_ids: vec!["7808015273".to_string(), "1337704966".to_string()],
        bot_name: "FeitovManagerBot".to_string(),
    }
}
