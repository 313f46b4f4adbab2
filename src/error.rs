//! Error types for Chat Central.

use thiserror::Error;

use crate::auth::AuthError;

/// Common error type for Chat Central.
#[derive(Error, Debug)]
pub enum AppError {
    /// Database error.
    ///
    /// Database errors from sqlx are automatically converted.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication or session error.
    #[error(transparent)]
    Auth(#[from] AuthError),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found.
    #[error("{0} not found")]
    NotFound(String),

    /// Unique constraint violated.
    #[error("{0} already exists")]
    Conflict(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl From<sqlx::Error> for AppError {
    fn from(e: sqlx::Error) -> Self {
        AppError::Database(e.to_string())
    }
}

/// Result type alias for Chat Central operations.
pub type Result<T> = std::result::Result<T, AppError>;
