//! Request DTOs for Web API.

use serde::Deserialize;
use utoipa::{IntoParams, ToSchema};
use validator::Validate;

use crate::db::Role;
use crate::web::dto::validation::{no_control_chars, not_empty_trimmed};

/// User registration request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct RegisterRequest {
    /// Display name.
    #[validate(
        length(min = 1, max = 64, message = "Username must be 1-64 characters"),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub username: String,
    /// Login email.
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    /// Password (8-128 characters).
    #[validate(length(max = 1024, message = "Password is too long"))]
    pub password: String,
}

/// Login request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct LoginRequest {
    /// Login email.
    #[validate(length(min = 1, max = 254, message = "Email is required"))]
    pub email: String,
    /// Password.
    #[validate(length(min = 1, max = 1024, message = "Password is required"))]
    pub password: String,
}

/// Logout request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    /// Session token to revoke.
    pub token: String,
}

/// Password change request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct ChangePasswordRequest {
    /// Current password.
    #[validate(length(min = 1, message = "Current password is required"))]
    pub current_password: String,
    /// New password (8-128 characters).
    #[validate(length(max = 1024, message = "Password is too long"))]
    pub new_password: String,
}

/// Admin user creation request.
#[derive(Debug, Deserialize, Validate, ToSchema)]
pub struct CreateUserRequest {
    /// Display name.
    #[validate(
        length(min = 1, max = 64, message = "Username must be 1-64 characters"),
        custom(function = "not_empty_trimmed"),
        custom(function = "no_control_chars")
    )]
    pub username: String,
    /// Login email.
    #[validate(email(message = "Must be a valid email address"))]
    pub email: String,
    /// Initial password (8-128 characters).
    #[validate(length(max = 1024, message = "Password is too long"))]
    pub password: String,
    /// Role, `user` when omitted.
    #[serde(default)]
    pub role: Role,
}

/// Role update request.
#[derive(Debug, Deserialize, ToSchema)]
pub struct UpdateRoleRequest {
    /// New role.
    pub role: Role,
}

/// Query parameters for listing users.
#[derive(Debug, Default, Deserialize, IntoParams)]
#[into_params(parameter_in = Query)]
pub struct ListUsersQuery {
    /// Maximum number of users to return (1-100, default 50).
    pub limit: Option<i64>,
}

impl ListUsersQuery {
    /// Default page size.
    pub const DEFAULT_LIMIT: i64 = 50;
    /// Largest page size a caller may request.
    pub const MAX_LIMIT: i64 = 100;

    /// Requested limit clamped to `1..=MAX_LIMIT`.
    pub fn effective_limit(&self) -> i64 {
        self.limit
            .unwrap_or(Self::DEFAULT_LIMIT)
            .clamp(1, Self::MAX_LIMIT)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_register_request_validation() {
        let valid = RegisterRequest {
            username: "alice".to_string(),
            email: "alice@example.com".to_string(),
            password: "correct horse".to_string(),
        };
        assert!(valid.validate().is_ok());

        let bad_email = RegisterRequest {
            email: "not-an-email".to_string(),
            ..valid
        };
        let errors = bad_email.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("email"));
    }

    #[test]
    fn test_register_request_rejects_blank_username() {
        let request = RegisterRequest {
            username: "   ".to_string(),
            email: "alice@example.com".to_string(),
            password: "correct horse".to_string(),
        };
        let errors = request.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("username"));
    }

    #[test]
    fn test_create_user_role_defaults_to_user() {
        let request: CreateUserRequest = serde_json::from_str(
            r#"{"username":"bob","email":"bob@example.com","password":"password123"}"#,
        )
        .unwrap();
        assert_eq!(request.role, Role::User);
    }

    #[test]
    fn test_list_limit_clamped() {
        assert_eq!(ListUsersQuery { limit: None }.effective_limit(), 50);
        assert_eq!(ListUsersQuery { limit: Some(500) }.effective_limit(), 100);
        assert_eq!(ListUsersQuery { limit: Some(0) }.effective_limit(), 1);
        assert_eq!(ListUsersQuery { limit: Some(10) }.effective_limit(), 10);
    }
}
