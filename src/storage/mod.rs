mod facade;
mod local;
pub mod remote;
mod seed;
mod types;

pub use facade::{verify_admin_key, BackendKind, Storage, StorageMode};
pub use local::{LocalStore, STORAGE_KEY_CATS, STORAGE_KEY_ITEMS, STORAGE_KEY_TG};
pub use remote::{RemoteError, RemoteStore};
pub use seed::{seed_categories, seed_items, seed_telegram_config};
pub use types::{
    Category, SoftwareItem, StorageError, TelegramConfig, PLACEHOLDER_DOWNLOAD_URL, UNCATEGORIZED,
};
