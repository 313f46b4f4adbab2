//! In-process store backend.
//!
//! Suitable for tests and single-instance deployments. State is lost on
//! restart and is not shared between processes.

use std::collections::HashMap;
use std::sync::{Mutex, MutexGuard};
use std::time::{Duration, Instant};

use async_trait::async_trait;

use super::{Counter, KeyValueStore, StoreError, StoreResult, StoredValue};

#[derive(Debug, Clone)]
struct Entry {
    value: String,
    expires_at: Option<Instant>,
}

impl Entry {
    fn is_live(&self, now: Instant) -> bool {
        self.expires_at.map_or(true, |at| at > now)
    }

    fn remaining(&self, now: Instant) -> Option<Duration> {
        self.expires_at.map(|at| at.saturating_duration_since(now))
    }
}

/// Mutex-guarded map with lazy expiry.
///
/// The lock is only held inside synchronous sections, never across an await.
#[derive(Debug, Default)]
pub struct MemoryStore {
    entries: Mutex<HashMap<String, Entry>>,
}

impl MemoryStore {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> StoreResult<MutexGuard<'_, HashMap<String, Entry>>> {
        self.entries
            .lock()
            .map_err(|_| StoreError::Backend("memory store lock poisoned".to_string()))
    }

    /// Number of entries held, including expired ones not yet purged.
    pub fn len(&self) -> usize {
        self.entries.lock().map(|e| e.len()).unwrap_or(0)
    }

    /// Whether the store holds no entries at all.
    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}

#[async_trait]
impl KeyValueStore for MemoryStore {
    fn backend_name(&self) -> &'static str {
        "memory"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        match entries.get(key) {
            Some(entry) if entry.is_live(now) => Ok(Some(StoredValue {
                value: entry.value.clone(),
                expires_in: entry.remaining(now),
            })),
            Some(_) => {
                entries.remove(key);
                Ok(None)
            }
            None => Ok(None),
        }
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        // A TTL beyond the clock's range never expires.
        let expires_at = Instant::now().checked_add(ttl);
        self.lock()?.insert(
            key.to_string(),
            Entry {
                value: value.to_string(),
                expires_at,
            },
        );
        Ok(())
    }

    async fn increment(&self, key: &str, window: Duration) -> StoreResult<Counter> {
        let now = Instant::now();
        let mut entries = self.lock()?;

        let live = entries.get(key).filter(|e| e.is_live(now)).cloned();
        let (count, expires_at) = match live {
            Some(entry) => {
                let current: u64 = entry
                    .value
                    .parse()
                    .map_err(|_| StoreError::Corrupt(key.to_string()))?;
                (current.saturating_add(1), entry.expires_at)
            }
            None => (1, now.checked_add(window)),
        };

        entries.insert(
            key.to_string(),
            Entry {
                value: count.to_string(),
                expires_at,
            },
        );

        Ok(Counter {
            count,
            expires_in: expires_at.map_or(window, |at| at.saturating_duration_since(now)),
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = Instant::now();
        let removed = self.lock()?.remove(key);
        Ok(removed.is_some_and(|e| e.is_live(now)))
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let now = Instant::now();
        let mut entries = self.lock()?;
        let before = entries.len();
        entries.retain(|_, e| e.is_live(now));
        Ok((before - entries.len()) as u64)
    }

    async fn ping(&self) -> StoreResult<()> {
        self.lock().map(|_| ())
    }
}
