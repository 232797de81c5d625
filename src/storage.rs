//! Local persistent key/value storage.
//!
//! SYSTEM CONTEXT
//! ==============
//! Holds the cached identity (`userid`, `role`) so it survives a reload
//! before the remote session check completes, and the identity provider's
//! own persisted session.
//!
//! ERROR HANDLING
//! ==============
//! Storage is assumed available. `FileStorage` logs I/O failures and keeps
//! serving from memory rather than surfacing them to callers.

use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Mutex, MutexGuard, PoisonError};

use tracing::{debug, warn};

use crate::services::types::{Identity, Role};

pub const USERID_KEY: &str = "userid";
pub const ROLE_KEY: &str = "role";

/// String slots surviving process restarts.
pub trait LocalStorage: Send + Sync {
    fn get_item(&self, key: &str) -> Option<String>;
    fn set_item(&self, key: &str, value: &str);
    fn remove_item(&self, key: &str);
}

fn lock_items(items: &Mutex<HashMap<String, String>>) -> MutexGuard<'_, HashMap<String, String>> {
    items.lock().unwrap_or_else(PoisonError::into_inner)
}

// =============================================================================
// MEMORY STORAGE
// =============================================================================

/// Process-local storage; contents vanish on exit.
#[derive(Default)]
pub struct MemoryStorage {
    items: Mutex<HashMap<String, String>>,
}

impl MemoryStorage {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }
}

impl LocalStorage for MemoryStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        lock_items(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        lock_items(&self.items).insert(key.to_owned(), value.to_owned());
    }

    fn remove_item(&self, key: &str) {
        lock_items(&self.items).remove(key);
    }
}

// =============================================================================
// FILE STORAGE
// =============================================================================

/// Storage backed by a single JSON object file, rewritten on every change.
pub struct FileStorage {
    path: PathBuf,
    items: Mutex<HashMap<String, String>>,
}

impl FileStorage {
    /// Open `path`, loading existing entries. A missing or unreadable file
    /// starts empty.
    #[must_use]
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let items = load_items(&path);
        debug!(path = %path.display(), entries = items.len(), "file storage opened");
        Self { path, items: Mutex::new(items) }
    }

    #[must_use]
    pub fn path(&self) -> &Path {
        &self.path
    }

    fn write(&self, items: &HashMap<String, String>) {
        if let Some(parent) = self.path.parent() {
            if !parent.as_os_str().is_empty() {
                if let Err(e) = std::fs::create_dir_all(parent) {
                    warn!(path = %parent.display(), error = %e, "storage directory create failed");
                    return;
                }
            }
        }
        let bytes = match serde_json::to_vec_pretty(items) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(error = %e, "storage serialize failed");
                return;
            }
        };
        if let Err(e) = std::fs::write(&self.path, bytes) {
            warn!(path = %self.path.display(), error = %e, "storage write failed");
        }
    }
}

fn load_items(path: &Path) -> HashMap<String, String> {
    let raw = match std::fs::read(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return HashMap::new(),
        Err(e) => {
            warn!(path = %path.display(), error = %e, "storage read failed");
            return HashMap::new();
        }
    };
    serde_json::from_slice(&raw).unwrap_or_else(|e| {
        warn!(path = %path.display(), error = %e, "storage file corrupt, starting empty");
        HashMap::new()
    })
}

impl LocalStorage for FileStorage {
    fn get_item(&self, key: &str) -> Option<String> {
        lock_items(&self.items).get(key).cloned()
    }

    fn set_item(&self, key: &str, value: &str) {
        let mut items = lock_items(&self.items);
        items.insert(key.to_owned(), value.to_owned());
        self.write(&items);
    }

    fn remove_item(&self, key: &str) {
        let mut items = lock_items(&self.items);
        if items.remove(key).is_some() {
            self.write(&items);
        }
    }
}

// =============================================================================
// CACHED IDENTITY
// =============================================================================

/// Read the cached identity. Both slots must be present and parse.
pub fn read_cached_identity(storage: &dyn LocalStorage) -> Option<Identity> {
    let user_id = storage.get_item(USERID_KEY)?.trim().parse::<i32>().ok()?;
    let role = storage.get_item(ROLE_KEY)?.parse::<Role>().ok()?;
    Some(Identity { user_id, role })
}

pub fn write_cached_identity(storage: &dyn LocalStorage, identity: Identity) {
    storage.set_item(USERID_KEY, &identity.user_id.to_string());
    storage.set_item(ROLE_KEY, identity.role.as_str());
}

pub fn clear_cached_identity(storage: &dyn LocalStorage) {
    storage.remove_item(USERID_KEY);
    storage.remove_item(ROLE_KEY);
}

#[cfg(test)]
#[path = "storage_test.rs"]
mod tests;
