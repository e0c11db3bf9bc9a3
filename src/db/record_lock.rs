//! Per-record exclusive locks keyed by pull request ID.
//!
//! SQLite has no `SELECT ... FOR UPDATE`, so exclusive access to one pull
//! request and its reviewer rows is provided by an async mutex per key.
//! Unrelated keys never contend. Entries are dropped from the registry once
//! no task holds or waits on them.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};
use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

type LockMap = HashMap<String, Arc<AsyncMutex<()>>>;

/// Registry of per-record locks.
#[derive(Clone, Default)]
pub struct RecordLocks {
    inner: Arc<Mutex<LockMap>>,
}

/// Exclusive hold on one record. Released on drop.
pub struct RecordGuard {
    // Fields drop in order: the mutex is unlocked before the registry is pruned
    _guard: OwnedMutexGuard<()>,
    registration: Registration,
}

/// Interest in one registry key, held while waiting and while locked.
struct Registration {
    key: String,
    locks: RecordLocks,
}

impl RecordLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `key`.
    ///
    /// Cancel-safe: dropping the returned future at any point, including
    /// after the lock was handed over but before it was observed, prunes the
    /// registry entry once nobody else references it.
    pub async fn acquire(&self, key: &str) -> RecordGuard {
        let lock = {
            let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(key.to_string()).or_default())
        };

        // Declared before the wait: on cancellation the pending lock future,
        // and its handle on the mutex, is dropped first
        let registration = Registration {
            key: key.to_string(),
            locks: self.clone(),
        };

        let guard = lock.lock_owned().await;

        RecordGuard {
            _guard: guard,
            registration,
        }
    }

    /// Number of keys currently held or awaited.
    pub fn active_keys(&self) -> usize {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    fn release(&self, key: &str) {
        let mut map = self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        // Only the registry itself still references the mutex
        if map.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(key);
        }
    }
}

impl RecordGuard {
    pub fn key(&self) -> &str {
        &self.registration.key
    }
}

impl Drop for Registration {
    fn drop(&mut self) {
        self.locks.release(&self.key);
    }
}
