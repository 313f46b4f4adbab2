//! Authentication module for Chat Central.
//!
//! Password hashing, session tokens, logout revocation and brute-force
//! lockout, coordinated by [`Authenticator`].

mod error;
pub mod guard;
mod password;
pub mod revocation;
mod service;
pub mod token;

pub use error::AuthError;
pub use guard::{normalize_identity, Attempt, LockStatus, LoginGuard};
pub use password::{
    validate_password, PasswordError, PasswordHasher, MAX_PASSWORD_LENGTH, MIN_PASSWORD_LENGTH,
};
pub use revocation::{revocation_key, RevocationStore};
pub use service::{Authenticator, LoginOutcome, NewCredential};
pub use token::{IssuedToken, Principal, TokenClaims, TokenIssuer};
