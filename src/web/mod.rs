//! Web API module for Chat Central.
//!
//! REST endpoints for authentication and user administration, plus the
//! OpenAPI document served through Swagger UI.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod openapi;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::{create_health_router, create_router};
pub use server::WebServer;
