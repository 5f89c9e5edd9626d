//! Session storage capability.
//!
//! The engine persists sessions through the [`Storage`] trait. Keys come from
//! [`ConversationReference::storage_key`](colloquy_core::ConversationReference::storage_key).
//! [`MemoryStorage`] keeps encoded sessions in process memory and is the
//! default backend; durable backends live outside this crate.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use parking_lot::Mutex;
use serde_json::Value;

use crate::error::{StorageError, StorageResult};
use crate::session::DialogSession;

/// Key-value persistence for dialog sessions.
#[async_trait]
pub trait Storage: Send + Sync {
    /// Loads the session stored under `key`.
    async fn load(&self, key: &str) -> StorageResult<Option<DialogSession>>;

    /// Stores `session` under `key`, replacing any previous value.
    async fn save(&self, key: &str, session: &DialogSession) -> StorageResult<()>;

    /// Removes the session stored under `key`. Missing keys are not an error.
    async fn delete(&self, key: &str) -> StorageResult<()>;
}

/// A shared storage trait object.
pub type BoxedStorage = Arc<dyn Storage>;

/// In-process storage.
///
/// Sessions are stored encoded as JSON, so nothing is shared between what
/// was saved and what is loaded.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    entries: Mutex<HashMap<String, Value>>,
}

impl MemoryStorage {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored sessions.
    pub fn len(&self) -> usize {
        self.entries.lock().len()
    }

    /// Returns `true` when nothing is stored.
    pub fn is_empty(&self) -> bool {
        self.entries.lock().is_empty()
    }

    /// Raw encoded session stored under `key`.
    pub fn raw(&self, key: &str) -> Option<Value> {
        self.entries.lock().get(key).cloned()
    }
}

#[async_trait]
impl Storage for MemoryStorage {
    async fn load(&self, key: &str) -> StorageResult<Option<DialogSession>> {
        let Some(value) = self.raw(key) else {
            return Ok(None);
        };
        serde_json::from_value(value)
            .map(Some)
            .map_err(|e| StorageError::serialization(key, e))
    }

    async fn save(&self, key: &str, session: &DialogSession) -> StorageResult<()> {
        let value = serde_json::to_value(session).map_err(|e| StorageError::serialization(key, e))?;
        self.entries.lock().insert(key.to_string(), value);
        Ok(())
    }

    async fn delete(&self, key: &str) -> StorageResult<()> {
        self.entries.lock().remove(key);
        Ok(())
    }
}
