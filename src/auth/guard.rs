//! Brute-force protection for the login endpoint.
//!
//! Failed logins are counted per identity in the shared store. The window
//! opens with the first failure and is not extended by later ones; once the
//! count reaches the threshold the identity stays locked until the window
//! expires.

use std::sync::Arc;
use std::time::Duration;

use super::AuthError;
use crate::db::normalize_email;
use crate::store::{with_retry, Counter, KeyValueStore, RetryPolicy};

const FAILED_ATTEMPTS_PREFIX: &str = "failed_attempts:";

/// Failed-attempt state of an identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LockStatus {
    /// No failures recorded in the current window.
    Clear,
    /// Some failures, still below the threshold.
    Accumulating { attempts: u64 },
    /// Threshold reached; login is refused until `retry_after` elapses.
    Locked { attempts: u64, retry_after: Duration },
}

impl LockStatus {
    /// Whether login is currently refused.
    pub fn is_locked(&self) -> bool {
        matches!(self, LockStatus::Locked { .. })
    }

    /// Failures counted in the current window.
    pub fn attempts(&self) -> u64 {
        match self {
            LockStatus::Clear => 0,
            LockStatus::Accumulating { attempts } | LockStatus::Locked { attempts, .. } => {
                *attempts
            }
        }
    }
}

/// Canonical form of a login identity, the same form emails are stored in.
pub fn normalize_identity(identity: &str) -> String {
    normalize_email(identity)
}

fn attempts_key(identity: &str) -> String {
    format!("{FAILED_ATTEMPTS_PREFIX}{}", normalize_identity(identity))
}

/// Whole seconds until `d` has passed, rounded up.
pub(crate) fn ceil_secs(d: Duration) -> u64 {
    d.as_secs() + u64::from(d.subsec_nanos() > 0)
}

/// A login attempt counted before its credentials are checked.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Attempt {
    /// Position of this attempt in the current window.
    pub number: u64,
    /// Whether a failure of this attempt leaves the identity locked.
    pub locks_on_failure: bool,
    /// Seconds until the window closes.
    pub retry_after_secs: u64,
}

/// Counts failed logins and decides lockout.
#[derive(Clone)]
pub struct LoginGuard {
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
    max_attempts: u64,
    window: Duration,
}

impl LoginGuard {
    /// Create a guard locking after `max_attempts` failures within `window`.
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        retry: RetryPolicy,
        max_attempts: u64,
        window: Duration,
    ) -> Self {
        Self {
            store,
            retry,
            max_attempts: max_attempts.max(1),
            window,
        }
    }

    /// Current state of `identity`.
    pub async fn status(&self, identity: &str) -> Result<LockStatus, AuthError> {
        let key = attempts_key(identity);
        let entry = with_retry(&self.retry, "attempt_status", || self.store.get(&key)).await?;

        let Some(entry) = entry else {
            return Ok(LockStatus::Clear);
        };
        let attempts: u64 = entry
            .value
            .parse()
            .map_err(|_| AuthError::Internal(format!("corrupt counter at '{key}'")))?;

        if attempts >= self.max_attempts {
            Ok(LockStatus::Locked {
                attempts,
                retry_after: entry.expires_in.unwrap_or(self.window),
            })
        } else if attempts == 0 {
            Ok(LockStatus::Clear)
        } else {
            Ok(LockStatus::Accumulating { attempts })
        }
    }

    /// Whether login is currently refused for `identity`.
    pub async fn is_locked(&self, identity: &str) -> Result<bool, AuthError> {
        Ok(self.status(identity).await?.is_locked())
    }

    /// Failures counted for `identity` in the current window.
    pub async fn attempt_count(&self, identity: &str) -> Result<u64, AuthError> {
        Ok(self.status(identity).await?.attempts())
    }

    async fn count(&self, identity: &str, operation: &str) -> Result<Counter, AuthError> {
        let key = attempts_key(identity);
        let counter = with_retry(&self.retry, operation, || {
            self.store.increment(&key, self.window)
        })
        .await?;
        Ok(counter)
    }

    /// Record a failed login.
    ///
    /// Returns the new count, or `LockedOut` when this failure reaches the
    /// threshold.
    pub async fn register_failure(&self, identity: &str) -> Result<u64, AuthError> {
        let counter = self.count(identity, "register_failure").await?;

        if counter.count >= self.max_attempts {
            let retry_after_secs = ceil_secs(counter.expires_in);
            tracing::warn!(
                attempts = counter.count,
                retry_after_secs,
                "login locked after repeated failures"
            );
            return Err(AuthError::LockedOut {
                attempts: counter.count,
                retry_after_secs,
            });
        }

        tracing::debug!(attempts = counter.count, "failed login recorded");
        Ok(counter.count)
    }

    /// Count a login attempt before its credentials are checked.
    ///
    /// The attempt is recorded as a failure up front and the caller clears
    /// the count with `reset` when the credentials match. Concurrent attempts
    /// get distinct numbers, so no more than the threshold of them pass
    /// between resets. Fails with `LockedOut` when earlier attempts already
    /// reached the threshold.
    pub async fn begin_attempt(&self, identity: &str) -> Result<Attempt, AuthError> {
        let counter = self.count(identity, "begin_attempt").await?;
        let retry_after_secs = ceil_secs(counter.expires_in);

        if counter.count > self.max_attempts {
            return Err(AuthError::LockedOut {
                attempts: counter.count,
                retry_after_secs,
            });
        }

        Ok(Attempt {
            number: counter.count,
            locks_on_failure: counter.count >= self.max_attempts,
            retry_after_secs,
        })
    }

    /// Clear the failure history of `identity`.
    pub async fn reset(&self, identity: &str) -> Result<(), AuthError> {
        let key = attempts_key(identity);
        with_retry(&self.retry, "reset_attempts", || self.store.delete(&key)).await?;
        Ok(())
    }
}

impl std::fmt::Debug for LoginGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoginGuard")
            .field("backend", &self.store.backend_name())
            .field("max_attempts", &self.max_attempts)
            .field("window", &self.window)
            .finish()
    }
}
