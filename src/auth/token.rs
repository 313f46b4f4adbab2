//! Session token issuance and validation (HS256 JWT).

use std::time::Duration;

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};

use super::AuthError;
use crate::db::Role;

/// Claims carried by a session token.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenClaims {
    /// Subject (user ID as a decimal string).
    pub sub: String,
    /// Role at issuance time.
    pub role: Role,
    /// Issued at (epoch seconds).
    pub iat: i64,
    /// Expiration (epoch seconds).
    pub exp: i64,
    /// Unique token ID.
    pub jti: String,
}

impl TokenClaims {
    /// The authenticated identity these claims describe.
    pub fn principal(&self) -> Result<Principal, AuthError> {
        let user_id = self.sub.parse().map_err(|_| AuthError::InvalidToken)?;
        Ok(Principal {
            user_id,
            role: self.role,
        })
    }
}

/// Identity attached to an authenticated request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Principal {
    /// User ID.
    pub user_id: i64,
    /// Access role.
    pub role: Role,
}

/// A freshly signed token.
#[derive(Debug, Clone)]
pub struct IssuedToken {
    /// Encoded JWT.
    pub token: String,
    /// Expiration (epoch seconds).
    pub expires_at: i64,
    /// Lifetime in seconds.
    pub expires_in: u64,
}

/// Signs and verifies session tokens with a process-wide secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
}

impl TokenIssuer {
    /// Create an issuer from the signing secret.
    pub fn new(secret: &str) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        // Expiry is checked by validate_at so that an expired token is
        // distinguishable from a forged one and no leeway applies.
        validation.validate_exp = false;
        validation.leeway = 0;
        validation.set_required_spec_claims(&["exp", "sub", "iat"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
        }
    }

    /// Issue a token for `user_id` valid for `ttl` from now.
    pub fn issue(&self, user_id: i64, role: Role, ttl: Duration) -> Result<IssuedToken, AuthError> {
        self.issue_at(user_id, role, ttl, Utc::now().timestamp())
    }

    /// Issue a token as if the current time were `now` (epoch seconds).
    pub fn issue_at(
        &self,
        user_id: i64,
        role: Role,
        ttl: Duration,
        now: i64,
    ) -> Result<IssuedToken, AuthError> {
        let expires_in = ttl.as_secs();
        let exp = now.saturating_add(i64::try_from(expires_in).unwrap_or(i64::MAX));
        let claims = TokenClaims {
            sub: user_id.to_string(),
            role,
            iat: now,
            exp,
            jti: uuid::Uuid::new_v4().to_string(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(
            |e| {
                tracing::error!("Failed to encode JWT: {}", e);
                AuthError::Internal("failed to sign token".to_string())
            },
        )?;

        Ok(IssuedToken {
            token,
            expires_at: exp,
            expires_in,
        })
    }

    /// Validate a token against the current time.
    pub fn validate(&self, token: &str) -> Result<TokenClaims, AuthError> {
        self.validate_at(token, Utc::now().timestamp())
    }

    /// Validate a token as if the current time were `now` (epoch seconds).
    ///
    /// Signature and shape are checked first, so a forged token is always
    /// `InvalidToken` even when its claimed expiry has passed.
    pub fn validate_at(&self, token: &str, now: i64) -> Result<TokenClaims, AuthError> {
        let claims = self.inspect(token)?;
        if now > claims.exp {
            return Err(AuthError::ExpiredToken);
        }
        Ok(claims)
    }

    /// Verify signature and claim shape without looking at expiry.
    pub fn inspect(&self, token: &str) -> Result<TokenClaims, AuthError> {
        let data = decode::<TokenClaims>(token, &self.decoding_key, &self.validation).map_err(
            |e| {
                tracing::debug!("JWT validation failed: {}", e);
                AuthError::InvalidToken
            },
        )?;

        let claims = data.claims;
        claims.principal()?;
        Ok(claims)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer").finish_non_exhaustive()
    }
}
