//! Credential record model for Chat Central.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use utoipa::ToSchema;

/// Access role. Ordered `Viewer < User < Admin`.
#[derive(
    Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Default, Serialize, Deserialize, ToSchema,
)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    /// Read-only access.
    Viewer,
    /// Regular account.
    #[default]
    User,
    /// Administrator.
    Admin,
}

impl Role {
    /// Every role, lowest first.
    pub const ALL: [Role; 3] = [Role::Viewer, Role::User, Role::Admin];

    /// Convert role to database string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            Role::Viewer => "viewer",
            Role::User => "user",
            Role::Admin => "admin",
        }
    }

    /// Human-readable description for the role catalog.
    pub fn description(&self) -> &'static str {
        match self {
            Role::Viewer => "Read-only access",
            Role::User => "Standard access",
            Role::Admin => "Full administrative access",
        }
    }

    /// Check if this role has at least the required permission level.
    ///
    /// # Examples
    ///
    /// ```
    /// use chatcentral::db::Role;
    ///
    /// assert!(Role::Admin.can_access(Role::User));
    /// assert!(Role::User.can_access(Role::User));
    /// assert!(!Role::Viewer.can_access(Role::User));
    /// ```
    pub fn can_access(&self, required: Role) -> bool {
        *self >= required
    }
}

impl fmt::Display for Role {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

impl FromStr for Role {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_lowercase().as_str() {
            "viewer" => Ok(Role::Viewer),
            "user" => Ok(Role::User),
            "admin" => Ok(Role::Admin),
            _ => Err(format!("unknown role: {s}")),
        }
    }
}

impl TryFrom<String> for Role {
    type Error = String;

    fn try_from(s: String) -> Result<Self, Self::Error> {
        s.parse()
    }
}

/// A stored credential record.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// Unique user ID.
    pub id: i64,
    /// Display name.
    pub username: String,
    /// Login email, stored in `normalize_email` form.
    pub email: String,
    /// Argon2 PHC string. Never the plaintext.
    pub password_hash: String,
    /// Access role.
    #[sqlx(try_from = "String")]
    pub role: Role,
    /// Creation timestamp (UTC, `YYYY-MM-DD HH:MM:SS`).
    pub created_at: String,
    /// Last modification timestamp.
    pub updated_at: String,
}

/// Canonical stored form of a login email: trimmed and lowercased.
///
/// Lowercasing covers all of Unicode, so `ÜBER.de` and `über.de` are the
/// same address.
pub fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

/// Data for inserting a credential record.
#[derive(Debug, Clone)]
pub struct NewUser {
    /// Display name.
    pub username: String,
    /// Login email.
    pub email: String,
    /// Password hash (already hashed with Argon2).
    pub password_hash: String,
    /// Access role (defaults to User).
    pub role: Role,
}

impl NewUser {
    /// Create a new user record with the default role.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password_hash: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password_hash: password_hash.into(),
            role: Role::default(),
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}
