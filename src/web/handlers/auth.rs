//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use super::AppState;
use crate::auth::{AuthError, NewCredential};
use crate::db::UserRepository;
use crate::error::AppError;
use crate::web::dto::{
    ApiResponse, ChangePasswordRequest, LoginRequest, LoginResponse, LogoutRequest,
    MessageResponse, RegisterRequest, UserResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// POST /api/auth/register - Self-service registration.
#[utoipa::path(
    post,
    path = "/api/auth/register",
    tag = "auth",
    request_body = RegisterRequest,
    responses(
        (status = 201, description = "User registered", body = UserResponse),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation error")
    )
)]
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    let user = state
        .auth
        .register(NewCredential::new(req.username, req.email, req.password))
        .await?;

    Ok((StatusCode::CREATED, Json(ApiResponse::new(user.into()))))
}

/// POST /api/auth/login - Exchange credentials for a session token.
#[utoipa::path(
    post,
    path = "/api/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = LoginResponse),
        (status = 401, description = "Invalid email or password"),
        (status = 403, description = "Account temporarily locked"),
        (status = 429, description = "Too many requests from this address"),
        (status = 503, description = "Authentication store unavailable")
    )
)]
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<ApiResponse<LoginResponse>>, ApiError> {
    let outcome = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(ApiResponse::new(outcome.into())))
}

/// POST /api/auth/logout - Revoke a session token.
///
/// Unknown, malformed and expired tokens are acknowledged the same way.
#[utoipa::path(
    post,
    path = "/api/auth/logout",
    tag = "auth",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logged out", body = MessageResponse),
        (status = 503, description = "Authentication store unavailable")
    )
)]
pub async fn logout(
    State(state): State<Arc<AppState>>,
    Json(req): Json<LogoutRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state.auth.logout(req.token.trim()).await?;
    Ok(Json(ApiResponse::new(MessageResponse::new("Logged out"))))
}

/// GET /api/auth/me - Current user.
#[utoipa::path(
    get,
    path = "/api/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current user", body = UserResponse),
        (status = 401, description = "Invalid or expired token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn me(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    let user = UserRepository::new(state.auth.db().pool())
        .get_by_id(auth_user.user_id())
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::new(user.into())))
}

/// PUT /api/auth/password - Change the caller's password.
#[utoipa::path(
    put,
    path = "/api/auth/password",
    tag = "auth",
    request_body = ChangePasswordRequest,
    responses(
        (status = 200, description = "Password changed", body = MessageResponse),
        (status = 400, description = "Current password is incorrect"),
        (status = 401, description = "Invalid or expired token"),
        (status = 422, description = "New password rejected by policy")
    ),
    security(("bearer_auth" = []))
)]
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    state
        .auth
        .change_password(auth_user.user_id(), &req.current_password, &req.new_password)
        .await
        .map_err(|e| match e {
            // A 401 here would read as a rejected session token.
            AppError::Auth(AuthError::InvalidCredentials) => {
                ApiError::bad_request("Current password is incorrect")
            }
            other => other.into(),
        })?;

    Ok(Json(ApiResponse::new(MessageResponse::new(
        "Password changed",
    ))))
}
