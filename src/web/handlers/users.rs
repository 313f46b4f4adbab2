//! User management handlers.

use axum::{
    extract::{Path, Query, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use super::AppState;
use crate::auth::NewCredential;
use crate::db::{Role, UserRepository};
use crate::web::dto::{
    ApiResponse, CreateUserRequest, ListUsersQuery, MessageResponse, RoleInfo, UpdateRoleRequest,
    UserResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

/// GET /api/users/roles - Role catalog.
#[utoipa::path(
    get,
    path = "/api/users/roles",
    tag = "users",
    responses(
        (status = 200, description = "Available roles", body = [RoleInfo]),
        (status = 401, description = "Invalid or expired token")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_roles(_auth_user: AuthUser) -> Json<ApiResponse<Vec<RoleInfo>>> {
    Json(ApiResponse::new(
        Role::ALL.into_iter().map(RoleInfo::from).collect(),
    ))
}

/// GET /api/users - List users, newest first.
#[utoipa::path(
    get,
    path = "/api/users",
    tag = "users",
    params(ListUsersQuery),
    responses(
        (status = 200, description = "Users", body = [UserResponse]),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Admin role required")
    ),
    security(("bearer_auth" = []))
)]
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Query(query): Query<ListUsersQuery>,
) -> Result<Json<ApiResponse<Vec<UserResponse>>>, ApiError> {
    auth_user.require(Role::Admin)?;

    let users = UserRepository::new(state.auth.db().pool())
        .list(query.effective_limit())
        .await?;

    Ok(Json(ApiResponse::new(
        users.into_iter().map(UserResponse::from).collect(),
    )))
}

/// POST /api/users - Create a user with a role.
#[utoipa::path(
    post,
    path = "/api/users",
    tag = "users",
    request_body = CreateUserRequest,
    responses(
        (status = 201, description = "User created", body = UserResponse),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Admin role required"),
        (status = 409, description = "Email already registered"),
        (status = 422, description = "Validation error")
    ),
    security(("bearer_auth" = []))
)]
pub async fn create_user(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    ValidatedJson(req): ValidatedJson<CreateUserRequest>,
) -> Result<(StatusCode, Json<ApiResponse<UserResponse>>), ApiError> {
    auth_user.require(Role::Admin)?;

    let user = state
        .auth
        .register(NewCredential::new(req.username, req.email, req.password).with_role(req.role))
        .await?;

    tracing::info!(
        admin_id = auth_user.user_id(),
        user_id = user.id,
        role = %user.role,
        "user created by admin"
    );
    Ok((StatusCode::CREATED, Json(ApiResponse::new(user.into()))))
}

/// GET /api/users/{id} - User detail (admin, or the user themselves).
#[utoipa::path(
    get,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User", body = UserResponse),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Not permitted"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    auth_user.require_self_or_admin(id)?;

    let user = UserRepository::new(state.auth.db().pool())
        .get_by_id(id)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    Ok(Json(ApiResponse::new(user.into())))
}

/// PUT /api/users/{id}/role - Change a user's role.
#[utoipa::path(
    put,
    path = "/api/users/{id}/role",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    request_body = UpdateRoleRequest,
    responses(
        (status = 200, description = "Role updated", body = UserResponse),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Admin role required, or own role"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
    Json(req): Json<UpdateRoleRequest>,
) -> Result<Json<ApiResponse<UserResponse>>, ApiError> {
    auth_user.require(Role::Admin)?;

    // Keeps at least one admin in place.
    if id == auth_user.user_id() {
        return Err(ApiError::forbidden("Cannot change your own role"));
    }

    let user = UserRepository::new(state.auth.db().pool())
        .update_role(id, req.role)
        .await?
        .ok_or_else(|| ApiError::not_found("User not found"))?;

    tracing::info!(
        admin_id = auth_user.user_id(),
        user_id = id,
        role = %user.role,
        "role changed"
    );
    Ok(Json(ApiResponse::new(user.into())))
}

/// DELETE /api/users/{id} - Remove a user.
#[utoipa::path(
    delete,
    path = "/api/users/{id}",
    tag = "users",
    params(("id" = i64, Path, description = "User ID")),
    responses(
        (status = 200, description = "User deleted", body = MessageResponse),
        (status = 401, description = "Invalid or expired token"),
        (status = 403, description = "Admin role required, or own account"),
        (status = 404, description = "User not found")
    ),
    security(("bearer_auth" = []))
)]
pub async fn delete_user(
    State(state): State<Arc<AppState>>,
    auth_user: AuthUser,
    Path(id): Path<i64>,
) -> Result<Json<ApiResponse<MessageResponse>>, ApiError> {
    auth_user.require(Role::Admin)?;

    if id == auth_user.user_id() {
        return Err(ApiError::forbidden("Cannot delete your own account"));
    }

    let deleted = UserRepository::new(state.auth.db().pool())
        .delete(id)
        .await?;
    if !deleted {
        return Err(ApiError::not_found("User not found"));
    }

    tracing::info!(admin_id = auth_user.user_id(), user_id = id, "user deleted");
    Ok(Json(ApiResponse::new(MessageResponse::new("User deleted"))))
}
