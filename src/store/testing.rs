//! Store doubles for unit tests.

use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::Notify;

use super::{Counter, KeyValueStore, MemoryStore, StoreError, StoreResult, StoredValue};

/// Store whose backend is unreachable.
pub(crate) struct FailingStore;

fn refused() -> StoreError {
    StoreError::Unavailable("connection refused".to_string())
}

#[async_trait]
impl KeyValueStore for FailingStore {
    fn backend_name(&self) -> &'static str {
        "failing"
    }

    async fn get(&self, _key: &str) -> StoreResult<Option<StoredValue>> {
        Err(refused())
    }

    async fn set_with_ttl(&self, _key: &str, _value: &str, _ttl: Duration) -> StoreResult<()> {
        Err(refused())
    }

    async fn increment(&self, _key: &str, _window: Duration) -> StoreResult<Counter> {
        Err(refused())
    }

    async fn delete(&self, _key: &str) -> StoreResult<bool> {
        Err(refused())
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        Err(refused())
    }

    async fn ping(&self) -> StoreResult<()> {
        Err(refused())
    }
}

/// In-memory store that can park one call after it completes.
///
/// Once `hold_next` is called, the next operation runs against the inner
/// store and then waits for `release`, which lets a test act while another
/// request is stopped between two steps.
pub(crate) struct GatedStore {
    inner: MemoryStore,
    armed: AtomicBool,
    held: Notify,
    released: Notify,
}

impl GatedStore {
    pub(crate) fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            armed: AtomicBool::new(false),
            held: Notify::new(),
            released: Notify::new(),
        }
    }

    pub(crate) fn hold_next(&self) {
        self.armed.store(true, Ordering::SeqCst);
    }

    /// Wait until a call is parked.
    pub(crate) async fn wait_held(&self) {
        self.held.notified().await;
    }

    pub(crate) fn release(&self) {
        self.released.notify_one();
    }

    async fn gate(&self) {
        if self.armed.swap(false, Ordering::SeqCst) {
            self.held.notify_one();
            self.released.notified().await;
        }
    }
}

#[async_trait]
impl KeyValueStore for GatedStore {
    fn backend_name(&self) -> &'static str {
        "gated"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        let result = self.inner.get(key).await;
        self.gate().await;
        result
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let result = self.inner.set_with_ttl(key, value, ttl).await;
        self.gate().await;
        result
    }

    async fn increment(&self, key: &str, window: Duration) -> StoreResult<Counter> {
        let result = self.inner.increment(key, window).await;
        self.gate().await;
        result
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let result = self.inner.delete(key).await;
        self.gate().await;
        result
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        self.inner.purge_expired().await
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }
}
