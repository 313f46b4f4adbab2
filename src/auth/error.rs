//! Authentication error type.

use thiserror::Error;

use crate::store::StoreError;

/// Errors produced by the authentication core.
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum AuthError {
    /// Unknown email or wrong password. Never says which.
    #[error("invalid credentials")]
    InvalidCredentials,

    /// The identity is locked out; the credential store was not consulted.
    #[error("account locked, retry after {retry_after_secs} seconds")]
    AccountLocked { retry_after_secs: u64 },

    /// A failure pushed the identity's counter to the lockout threshold.
    #[error("too many failed login attempts ({attempts})")]
    LockedOut { attempts: u64, retry_after_secs: u64 },

    /// Token signature is valid but its expiry has passed.
    #[error("token expired")]
    ExpiredToken,

    /// Bad signature, malformed payload or wrong algorithm.
    #[error("invalid token")]
    InvalidToken,

    /// Token was revoked by logout.
    #[error("token revoked")]
    RevokedToken,

    /// The counter/revocation store could not be reached.
    #[error("authentication service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Unexpected failure (hashing, signing, corrupt state).
    #[error("internal authentication error: {0}")]
    Internal(String),
}

impl AuthError {
    /// Stable label for logs.
    pub fn kind(&self) -> &'static str {
        match self {
            AuthError::InvalidCredentials => "invalid_credentials",
            AuthError::AccountLocked { .. } => "account_locked",
            AuthError::LockedOut { .. } => "locked_out",
            AuthError::ExpiredToken => "expired_token",
            AuthError::InvalidToken => "invalid_token",
            AuthError::RevokedToken => "revoked_token",
            AuthError::ServiceUnavailable(_) => "service_unavailable",
            AuthError::Internal(_) => "internal",
        }
    }
}

impl From<StoreError> for AuthError {
    fn from(e: StoreError) -> Self {
        match e {
            StoreError::Corrupt(_) => AuthError::Internal(e.to_string()),
            StoreError::Unavailable(_) | StoreError::Backend(_) => {
                AuthError::ServiceUnavailable(e.to_string())
            }
        }
    }
}
