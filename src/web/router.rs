//! Router configuration for Web API.

use axum::{
    middleware,
    routing::{get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    change_password, create_user, delete_user, get_user, list_roles, list_users, login, logout,
    me, register, update_role, AppState,
};
use super::middleware::{create_cors_layer, login_rate_limit};
use super::openapi::create_swagger_router;

/// Create the main API router.
///
/// Protected routes authenticate through the `AuthUser` extractor, so every
/// call is checked against the revocation store.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    // Login sits behind the per-address limiter
    let login_routes = Router::new()
        .route("/login", post(login))
        .route_layer(middleware::from_fn_with_state(
            app_state.clone(),
            login_rate_limit,
        ));

    let auth_routes = Router::new()
        .route("/register", post(register))
        .route("/logout", post(logout))
        .route("/me", get(me))
        .route("/password", put(change_password))
        .merge(login_routes);

    let user_routes = Router::new()
        .route("/", get(list_users).post(create_user))
        .route("/roles", get(list_roles))
        .route("/:id", get(get_user).delete(delete_user))
        .route("/:id/role", put(update_role));

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .nest("/users", user_routes);

    Router::new()
        .nest("/api", api_routes)
        .merge(create_swagger_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router() -> Router {
    Router::new().route("/health", get(health_check))
}

/// Health check handler.
async fn health_check() -> &'static str {
    "OK"
}
