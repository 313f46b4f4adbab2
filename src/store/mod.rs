//! Key-value store for short-lived security state.
//!
//! Failed-login counters and token revocations live here rather than in
//! process memory, so they survive restarts and are shared by every server
//! instance pointed at the same backend. Every entry may carry a TTL; expired
//! entries are invisible to reads and are physically removed by
//! [`KeyValueStore::purge_expired`].

mod memory;
pub mod retry;
mod sql;
#[cfg(test)]
pub(crate) mod testing;

pub use memory::MemoryStore;
pub use retry::{with_retry, RetryPolicy};
pub use sql::SqlStore;

use std::time::Duration;

use async_trait::async_trait;
use thiserror::Error;

/// Store-level errors.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    /// The backend could not be reached (connection refused, pool exhausted, timeout).
    #[error("store unavailable: {0}")]
    Unavailable(String),

    /// The backend answered but the operation failed.
    #[error("store backend error: {0}")]
    Backend(String),

    /// A stored value does not have the expected shape.
    #[error("corrupt value for key '{0}'")]
    Corrupt(String),
}

impl StoreError {
    /// Whether retrying the same call may succeed.
    pub fn is_transient(&self) -> bool {
        matches!(self, StoreError::Unavailable(_))
    }
}

/// Result alias for store operations.
pub type StoreResult<T> = std::result::Result<T, StoreError>;

/// A live value read from the store.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct StoredValue {
    /// Raw value.
    pub value: String,
    /// Remaining lifetime, `None` when the entry never expires.
    pub expires_in: Option<Duration>,
}

/// State of a counter right after an increment.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Counter {
    /// Value after the increment.
    pub count: u64,
    /// Remaining lifetime of the counter window.
    pub expires_in: Duration,
}

/// Async key-value store with TTL support and atomic counters.
#[async_trait]
pub trait KeyValueStore: Send + Sync {
    /// Short backend name for logs.
    fn backend_name(&self) -> &'static str;

    /// Read a live entry.
    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>>;

    /// Write an entry that expires after `ttl`, replacing any previous value.
    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()>;

    /// Atomically increment a counter.
    ///
    /// A missing or expired counter is created with value 1 and a lifetime of
    /// `window`. Incrementing a live counter keeps its original expiry, so the
    /// window is anchored at the first increment.
    async fn increment(&self, key: &str, window: Duration) -> StoreResult<Counter>;

    /// Delete an entry. Returns true when a live entry was removed.
    async fn delete(&self, key: &str) -> StoreResult<bool>;

    /// Physically remove expired entries. Returns the number removed.
    async fn purge_expired(&self) -> StoreResult<u64>;

    /// Check that the backend is reachable.
    async fn ping(&self) -> StoreResult<()>;
}
