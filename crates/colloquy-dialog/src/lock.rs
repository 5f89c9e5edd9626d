//! Per-conversation turn locks.
//!
//! At most one drive loop may run per storage key. A [`TurnGuard`] holds the
//! key's async mutex for the lifetime of a turn; other turns for the same key
//! either queue behind it or are rejected, depending on the
//! [`ConcurrencyPolicy`]. Entries are removed once nobody holds or waits for
//! them, so the map only grows with the number of in-flight conversations.

use std::collections::HashMap;
use std::sync::Arc;

use parking_lot::Mutex;
use serde::{Deserialize, Serialize};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};
use tracing::debug;

use crate::error::{DialogError, DialogResult};

/// What happens when a turn is already running for a conversation.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConcurrencyPolicy {
    /// Wait for the running turn to finish, then observe its committed state.
    #[default]
    Queue,
    /// Fail immediately with [`DialogError::Busy`].
    Reject,
}

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-key turn locks.
#[derive(Debug, Clone, Default)]
pub struct TurnLocks {
    inner: Arc<Mutex<LockMap>>,
}

impl TurnLocks {
    /// Creates an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Acquires the lock for `key` according to `policy`.
    pub async fn acquire(&self, key: &str, policy: ConcurrencyPolicy) -> DialogResult<TurnGuard> {
        let lock = {
            let mut map = self.inner.lock();
            map.entry(key.to_string())
                .or_insert_with(|| Arc::new(AsyncMutex::new(())))
                .clone()
        };

        let guard = match lock.clone().try_lock_owned() {
            Ok(guard) => guard,
            Err(_) => match policy {
                ConcurrencyPolicy::Reject => {
                    debug!(conversation = %key, "Turn rejected, conversation busy");
                    drop(lock);
                    self.release(key);
                    return Err(DialogError::Busy(key.to_string()));
                }
                ConcurrencyPolicy::Queue => {
                    debug!(conversation = %key, "Waiting for running turn");
                    lock.clone().lock_owned().await
                }
            },
        };
        drop(lock);

        Ok(TurnGuard {
            key: key.to_string(),
            locks: self.clone(),
            guard: Some(guard),
        })
    }

    /// Number of keys currently locked or awaited.
    pub fn len(&self) -> usize {
        self.inner.lock().len()
    }

    /// Returns `true` when no turn is running.
    pub fn is_empty(&self) -> bool {
        self.inner.lock().is_empty()
    }

    fn release(&self, key: &str) {
        let mut map = self.inner.lock();
        if map.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(key);
        }
    }
}

/// Exclusive right to run a turn for one conversation.
#[derive(Debug)]
pub struct TurnGuard {
    key: String,
    locks: TurnLocks,
    guard: Option<OwnedMutexGuard<()>>,
}

impl TurnGuard {
    /// Storage key the guard is held for.
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        self.guard.take();
        self.locks.release(&self.key);
    }
}
