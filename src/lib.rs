//! Chat Central admin backend.
//!
//! Credential storage, session tokens, logout revocation and brute-force
//! lockout behind an axum HTTP API.

pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod store;
pub mod web;

pub use auth::{AuthError, Authenticator};
pub use config::Config;
pub use db::{Database, NewUser, Role, User, UserRepository};
pub use error::{AppError, Result};
