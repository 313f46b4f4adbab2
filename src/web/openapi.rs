//! OpenAPI document and Swagger UI.

use axum::Router;
use std::sync::Arc;
use utoipa::{
    openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme},
    Modify, OpenApi,
};
use utoipa_swagger_ui::SwaggerUi;

use super::dto::{
    ChangePasswordRequest, CreateUserRequest, LoginRequest, LoginResponse, LogoutRequest,
    MessageResponse, RegisterRequest, RoleInfo, UpdateRoleRequest, UserResponse,
};
use super::handlers::{self, AppState};
use crate::db::Role;

/// Path the JSON document is served from.
pub const OPENAPI_JSON_PATH: &str = "/api-docs/openapi.json";

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::auth::register,
        handlers::auth::login,
        handlers::auth::logout,
        handlers::auth::me,
        handlers::auth::change_password,
        handlers::users::list_roles,
        handlers::users::list_users,
        handlers::users::create_user,
        handlers::users::get_user,
        handlers::users::update_role,
        handlers::users::delete_user,
    ),
    components(schemas(
        Role,
        RegisterRequest,
        LoginRequest,
        LogoutRequest,
        ChangePasswordRequest,
        CreateUserRequest,
        UpdateRoleRequest,
        UserResponse,
        LoginResponse,
        MessageResponse,
        RoleInfo,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login, logout and the current session"),
        (name = "users", description = "User and role administration")
    )
)]
struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

/// The generated OpenAPI document.
pub fn openapi() -> utoipa::openapi::OpenApi {
    ApiDoc::openapi()
}

/// Router serving Swagger UI at `/swagger-ui` and the JSON document.
pub fn create_swagger_router() -> Router<Arc<AppState>> {
    Router::new().merge(SwaggerUi::new("/swagger-ui").url(OPENAPI_JSON_PATH, openapi()))
}
