//! Persistent preference storage, the engine's only durable state before
//! the synced data model loads.

use std::collections::HashMap;
use std::sync::{Mutex, PoisonError};

use async_trait::async_trait;
use thiserror::Error;

/// Key holding the JSON-serialized projection of the last active custom
/// theme. Mutually exclusive with [`SAVED_SYSTEM_THEME_ID_KEY`].
pub const SAVED_THEME_KEY: &str = "savedTheme";

/// Key holding the raw id of the last active system theme. Mutually
/// exclusive with [`SAVED_THEME_KEY`].
pub const SAVED_SYSTEM_THEME_ID_KEY: &str = "savedSystemThemeId";

#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StorageError {
    #[error("failed to read preference '{key}': {reason}")]
    Read { key: String, reason: String },
    #[error("failed to write preference '{key}': {reason}")]
    Write { key: String, reason: String },
}

/// Async key/value store for opaque string preferences.
///
/// The mobile shell backs this with the platform keychain/shared
/// preferences; reads must be cheap enough for the cold-start path.
#[async_trait]
pub trait PreferenceStore: Send + Sync {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError>;
    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError>;
    async fn remove_item(&self, key: &str) -> Result<(), StorageError>;
}

/// Non-durable [`PreferenceStore`] for tests and previews.
#[derive(Debug, Default)]
pub struct InMemoryPreferenceStore {
    items: Mutex<HashMap<String, String>>,
}

impl InMemoryPreferenceStore {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, HashMap<String, String>> {
        self.items.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

#[async_trait]
impl PreferenceStore for InMemoryPreferenceStore {
    async fn get_item(&self, key: &str) -> Result<Option<String>, StorageError> {
        Ok(self.lock().get(key).cloned())
    }

    async fn set_item(&self, key: &str, value: &str) -> Result<(), StorageError> {
        self.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn remove_item(&self, key: &str) -> Result<(), StorageError> {
        self.lock().remove(key);
        Ok(())
    }
}
