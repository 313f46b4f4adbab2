//! Middleware for the web API.

pub mod auth;
pub mod cors;
pub mod rate_limit;

pub use auth::{bearer_token, AuthUser};
pub use cors::create_cors_layer;
pub use rate_limit::{login_rate_limit, LoginRateLimiter};
