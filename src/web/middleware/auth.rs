//! Bearer-token authentication extractor.

use axum::{
    async_trait,
    extract::FromRequestParts,
    http::{header::AUTHORIZATION, request::Parts, HeaderMap},
};
use std::sync::Arc;

use crate::auth::Principal;
use crate::db::Role;
use crate::web::error::{ApiError, TOKEN_REJECTED_MESSAGE};
use crate::web::handlers::AppState;

/// Extract the token from an `Authorization: Bearer <token>` header.
pub fn bearer_token(headers: &HeaderMap) -> Option<&str> {
    headers
        .get(AUTHORIZATION)
        .and_then(|value| value.to_str().ok())
        .and_then(|value| {
            value
                .strip_prefix("Bearer ")
                .or_else(|| value.strip_prefix("bearer "))
        })
        .map(str::trim)
        .filter(|token| !token.is_empty())
}

/// Extractor for authenticated users.
///
/// Every request using it is checked for signature, expiry, revocation and
/// a still existing account.
#[derive(Debug, Clone)]
pub struct AuthUser {
    /// Authenticated identity.
    pub principal: Principal,
}

impl AuthUser {
    /// User ID of the caller.
    pub fn user_id(&self) -> i64 {
        self.principal.user_id
    }

    /// Fail with 403 unless the caller has at least `required`.
    pub fn require(&self, required: Role) -> Result<(), ApiError> {
        if self.principal.role.can_access(required) {
            Ok(())
        } else {
            tracing::info!(
                user_id = self.principal.user_id,
                role = %self.principal.role,
                required = %required,
                "access denied: insufficient role"
            );
            Err(ApiError::forbidden("Insufficient permissions"))
        }
    }

    /// Fail with 403 unless the caller is `user_id` or an admin.
    pub fn require_self_or_admin(&self, user_id: i64) -> Result<(), ApiError> {
        if self.principal.user_id == user_id {
            Ok(())
        } else {
            self.require(Role::Admin)
        }
    }
}

#[async_trait]
impl FromRequestParts<Arc<AppState>> for AuthUser {
    type Rejection = ApiError;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        let token = bearer_token(&parts.headers).ok_or_else(|| {
            tracing::debug!("bearer token missing");
            ApiError::unauthorized(TOKEN_REJECTED_MESSAGE)
        })?;

        let principal = state.auth.authenticate(token).await?;

        Ok(AuthUser { principal })
    }
}
