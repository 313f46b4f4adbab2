//! SQL-backed store.
//!
//! Entries live in the `kv_entries` table. Expiry is stored as epoch
//! milliseconds so every process sharing the database agrees on it.
//! Counters are incremented with a single upsert statement, so concurrent
//! increments from any number of connections are never lost.

use std::time::Duration;

use async_trait::async_trait;
use chrono::Utc;
use sqlx::SqlitePool;

use super::{Counter, KeyValueStore, StoreError, StoreResult, StoredValue};

/// Store backed by the `kv_entries` table.
#[derive(Debug, Clone)]
pub struct SqlStore {
    pool: SqlitePool,
}

impl SqlStore {
    /// Create a store on an already migrated pool.
    pub fn new(pool: SqlitePool) -> Self {
        Self { pool }
    }
}

fn now_millis() -> i64 {
    Utc::now().timestamp_millis()
}

fn millis(d: Duration) -> i64 {
    i64::try_from(d.as_millis()).unwrap_or(i64::MAX)
}

fn remaining(expires_at: i64, now: i64) -> Duration {
    Duration::from_millis(expires_at.saturating_sub(now).max(0) as u64)
}

impl From<sqlx::Error> for StoreError {
    fn from(e: sqlx::Error) -> Self {
        match e {
            sqlx::Error::PoolTimedOut
            | sqlx::Error::PoolClosed
            | sqlx::Error::Io(_)
            | sqlx::Error::WorkerCrashed => StoreError::Unavailable(e.to_string()),
            sqlx::Error::Database(ref db) if is_busy(db.message()) => {
                StoreError::Unavailable(e.to_string())
            }
            other => StoreError::Backend(other.to_string()),
        }
    }
}

fn is_busy(message: &str) -> bool {
    message.contains("database is locked") || message.contains("database is busy")
}

#[async_trait]
impl KeyValueStore for SqlStore {
    fn backend_name(&self) -> &'static str {
        "sql"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        let now = now_millis();
        let row: Option<(String, Option<i64>)> = sqlx::query_as(
            "SELECT value, expires_at FROM kv_entries
             WHERE key = ? AND (expires_at IS NULL OR expires_at > ?)",
        )
        .bind(key)
        .bind(now)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(|(value, expires_at)| StoredValue {
            value,
            expires_in: expires_at.map(|at| remaining(at, now)),
        }))
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        let expires_at = now_millis().saturating_add(millis(ttl));
        sqlx::query(
            "INSERT INTO kv_entries (key, value, expires_at) VALUES (?, ?, ?)
             ON CONFLICT(key) DO UPDATE SET
                value = excluded.value,
                expires_at = excluded.expires_at",
        )
        .bind(key)
        .bind(value)
        .bind(expires_at)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    async fn increment(&self, key: &str, window: Duration) -> StoreResult<Counter> {
        let now = now_millis();
        let fresh_expiry = now.saturating_add(millis(window));

        // SET expressions see the row as it was before the update.
        let (value, expires_at): (String, i64) = sqlx::query_as(
            "INSERT INTO kv_entries (key, value, expires_at) VALUES (?, '1', ?)
             ON CONFLICT(key) DO UPDATE SET
                value = CASE
                    WHEN expires_at IS NOT NULL AND expires_at <= ? THEN '1'
                    ELSE CAST(CAST(value AS INTEGER) + 1 AS TEXT)
                END,
                expires_at = CASE
                    WHEN expires_at IS NULL OR expires_at <= ? THEN excluded.expires_at
                    ELSE expires_at
                END
             RETURNING value, expires_at",
        )
        .bind(key)
        .bind(fresh_expiry)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let count = value
            .parse()
            .map_err(|_| StoreError::Corrupt(key.to_string()))?;

        Ok(Counter {
            count,
            expires_in: remaining(expires_at, now),
        })
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        let now = now_millis();
        let removed: Option<(Option<i64>,)> =
            sqlx::query_as("DELETE FROM kv_entries WHERE key = ? RETURNING expires_at")
                .bind(key)
                .fetch_optional(&self.pool)
                .await?;

        Ok(matches!(removed, Some((expires_at,)) if expires_at.map_or(true, |at| at > now)))
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        let result =
            sqlx::query("DELETE FROM kv_entries WHERE expires_at IS NOT NULL AND expires_at <= ?")
                .bind(now_millis())
                .execute(&self.pool)
                .await?;
        Ok(result.rows_affected())
    }

    async fn ping(&self) -> StoreResult<()> {
        sqlx::query("SELECT 1").execute(&self.pool).await?;
        Ok(())
    }
}
