//! Response DTOs for Web API.

use chrono::{NaiveDateTime, SecondsFormat};
use serde::Serialize;
use utoipa::ToSchema;

use crate::auth::LoginOutcome;
use crate::db::{Role, User};

/// Generic API response wrapper.
#[derive(Debug, Serialize)]
pub struct ApiResponse<T: Serialize> {
    /// Response data.
    pub data: T,
}

impl<T: Serialize> ApiResponse<T> {
    /// Create a new API response.
    pub fn new(data: T) -> Self {
        Self { data }
    }
}

/// Convert a database timestamp (`YYYY-MM-DD HH:MM:SS`, UTC) to RFC3339.
///
/// Unparseable input is returned unchanged.
pub fn to_rfc3339(datetime_str: &str) -> String {
    NaiveDateTime::parse_from_str(datetime_str, "%Y-%m-%d %H:%M:%S")
        .map(|naive| naive.and_utc().to_rfc3339_opts(SecondsFormat::Secs, true))
        .unwrap_or_else(|_| datetime_str.to_string())
}

/// User information in responses. Never carries the password hash.
#[derive(Debug, Serialize, ToSchema)]
pub struct UserResponse {
    /// User ID.
    pub id: i64,
    /// Display name.
    pub username: String,
    /// Login email.
    pub email: String,
    /// Access role.
    pub role: Role,
    /// Creation time (RFC3339).
    pub created_at: String,
    /// Last modification time (RFC3339).
    pub updated_at: String,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            created_at: to_rfc3339(&user.created_at),
            updated_at: to_rfc3339(&user.updated_at),
            id: user.id,
            username: user.username,
            email: user.email,
            role: user.role,
        }
    }
}

/// Login response.
#[derive(Debug, Serialize, ToSchema)]
pub struct LoginResponse {
    /// Session token (JWT).
    pub token: String,
    /// Always `bearer`.
    pub token_type: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    /// The authenticated user.
    pub user: UserResponse,
}

impl From<LoginOutcome> for LoginResponse {
    fn from(outcome: LoginOutcome) -> Self {
        Self {
            token: outcome.token,
            token_type: "bearer".to_string(),
            expires_in: outcome.expires_in,
            user: outcome.user.into(),
        }
    }
}

/// Plain acknowledgment.
#[derive(Debug, Serialize, ToSchema)]
pub struct MessageResponse {
    /// Human-readable message.
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Role catalog entry.
#[derive(Debug, Serialize, ToSchema)]
pub struct RoleInfo {
    /// Role name.
    pub name: Role,
    /// What the role may do.
    pub description: String,
}

impl From<Role> for RoleInfo {
    fn from(role: Role) -> Self {
        Self {
            name: role,
            description: role.description().to_string(),
        }
    }
}
