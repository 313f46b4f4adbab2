//! Revoked-token registry.
//!
//! Tokens are stateless, so logout records the token here until it would
//! have expired anyway. Entries are keyed by the SHA-256 of the token so the
//! store never holds a usable credential.

use std::sync::Arc;
use std::time::Duration;

use sha2::{Digest, Sha256};

use super::AuthError;
use crate::store::{with_retry, KeyValueStore, RetryPolicy};

const REVOKED_PREFIX: &str = "revoked:";
const REVOKED_VALUE: &str = "revoked";

/// Store key for a token's revocation entry.
pub fn revocation_key(token: &str) -> String {
    let digest = Sha256::digest(token.as_bytes());
    let hex: String = digest.iter().map(|b| format!("{b:02x}")).collect();
    format!("{REVOKED_PREFIX}{hex}")
}

/// Records and answers token revocations.
#[derive(Clone)]
pub struct RevocationStore {
    store: Arc<dyn KeyValueStore>,
    retry: RetryPolicy,
}

impl RevocationStore {
    /// Create a registry on the given store.
    pub fn new(store: Arc<dyn KeyValueStore>, retry: RetryPolicy) -> Self {
        Self { store, retry }
    }

    /// Revoke `token` for the rest of its natural lifetime.
    ///
    /// A zero remaining lifetime records nothing.
    pub async fn revoke(&self, token: &str, remaining: Duration) -> Result<(), AuthError> {
        if remaining.is_zero() {
            return Ok(());
        }

        let key = revocation_key(token);
        with_retry(&self.retry, "revoke", || {
            self.store.set_with_ttl(&key, REVOKED_VALUE, remaining)
        })
        .await?;

        tracing::debug!(ttl_secs = remaining.as_secs(), "token revoked");
        Ok(())
    }

    /// Whether `token` has an unexpired revocation entry.
    ///
    /// Store failures surface as `ServiceUnavailable`, never as "not revoked".
    pub async fn is_revoked(&self, token: &str) -> Result<bool, AuthError> {
        let key = revocation_key(token);
        let entry = with_retry(&self.retry, "is_revoked", || self.store.get(&key)).await?;
        Ok(entry.is_some())
    }
}

impl std::fmt::Debug for RevocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationStore")
            .field("backend", &self.store.backend_name())
            .finish()
    }
}
