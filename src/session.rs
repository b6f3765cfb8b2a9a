//! Session-scoped key/value storage.
//!
//! Lives exactly as long as the process, the way a browser tab's session
//! storage lives as long as the tab. Nothing here is written to disk.
use std::collections::HashMap;

/// Marker key set while an admin is logged in.
pub const ADMIN_SESSION_KEY: &str = "admin_session";
pub const ADMIN_SESSION_ACTIVE: &str = "active";

#[derive(Debug, Clone, Default)]
pub struct SessionStorage {
    entries: HashMap<String, String>,
}

impl SessionStorage {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.entries.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: &str, value: &str) {
        self.entries.insert(key.to_string(), value.to_string());
    }

    pub fn remove(&mut self, key: &str) {
        self.entries.remove(key);
    }

    /// Whether the admin marker is present.
    pub fn has_admin_marker(&self) -> bool {
        self.get(ADMIN_SESSION_KEY) == Some(ADMIN_SESSION_ACTIVE)
    }
}
