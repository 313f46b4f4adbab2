//! API handlers for the admin backend.

pub mod auth;
pub mod users;

use std::sync::Arc;

use crate::auth::Authenticator;
use crate::config::ServerConfig;
use crate::store::KeyValueStore;
use crate::web::middleware::LoginRateLimiter;

pub use auth::*;
pub use users::*;

/// Application state shared across handlers.
pub struct AppState {
    /// Authentication orchestrator (credential store, tokens, lockout).
    pub auth: Authenticator,
    /// Key-value store backing counters and revocations.
    pub store: Arc<dyn KeyValueStore>,
    /// Per-address limiter for the login route.
    pub login_limiter: LoginRateLimiter,
}

impl AppState {
    /// Create a new application state.
    pub fn new(auth: Authenticator, store: Arc<dyn KeyValueStore>, server: &ServerConfig) -> Self {
        Self {
            auth,
            store,
            login_limiter: LoginRateLimiter::new(
                server.login_rate_limit,
                server.trusted_proxies.clone(),
            ),
        }
    }
}
