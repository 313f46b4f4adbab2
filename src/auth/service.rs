//! Authentication orchestration: login, logout, request authentication and
//! credential lifecycle.

use std::sync::Arc;
use std::time::Duration;

use chrono::Utc;
use tracing::{debug, info, warn};

use super::guard::{normalize_identity, Attempt, LoginGuard};
use super::password::{validate_password, PasswordHasher};
use super::revocation::RevocationStore;
use super::token::{Principal, TokenIssuer};
use super::AuthError;
use crate::config::Config;
use crate::db::{normalize_email, Database, NewUser, Role, User, UserRepository};
use crate::store::{KeyValueStore, RetryPolicy};
use crate::{AppError, Result};

/// Result of a successful login.
#[derive(Debug, Clone)]
pub struct LoginOutcome {
    /// Signed session token.
    pub token: String,
    /// Token lifetime in seconds.
    pub expires_in: u64,
    /// Token expiry (epoch seconds).
    pub expires_at: i64,
    /// The authenticated user.
    pub user: User,
}

/// Data for registering a credential.
#[derive(Debug, Clone)]
pub struct NewCredential {
    /// Display name.
    pub username: String,
    /// Login email.
    pub email: String,
    /// Plaintext password. Hashed before it is stored.
    pub password: String,
    /// Access role.
    pub role: Role,
}

impl NewCredential {
    /// Create a credential with the default role.
    pub fn new(
        username: impl Into<String>,
        email: impl Into<String>,
        password: impl Into<String>,
    ) -> Self {
        Self {
            username: username.into(),
            email: email.into(),
            password: password.into(),
            role: Role::default(),
        }
    }

    /// Set the role.
    pub fn with_role(mut self, role: Role) -> Self {
        self.role = role;
        self
    }
}

/// Coordinates the guard, hasher, issuer and revocation registry.
#[derive(Clone)]
pub struct Authenticator {
    db: Database,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    guard: LoginGuard,
    revocations: RevocationStore,
    token_ttl: Duration,
}

impl Authenticator {
    /// Build the authentication core from configuration.
    pub fn new(db: Database, store: Arc<dyn KeyValueStore>, config: &Config) -> Result<Self> {
        let hasher = PasswordHasher::new(&config.hashing)
            .map_err(|e| AppError::Config(format!("hashing: {e}")))?;
        let retry = RetryPolicy::new(
            config.auth.store_retries,
            Duration::from_millis(config.auth.store_backoff_ms),
        );

        Ok(Self {
            db,
            hasher,
            issuer: TokenIssuer::new(&config.auth.jwt_secret),
            guard: LoginGuard::new(
                store.clone(),
                retry,
                config.auth.max_login_attempts,
                Duration::from_secs(config.auth.lockout_window_secs),
            ),
            revocations: RevocationStore::new(store, retry),
            token_ttl: Duration::from_secs(config.auth.token_ttl_secs),
        })
    }

    /// Credential database.
    pub fn db(&self) -> &Database {
        &self.db
    }

    /// Password hasher.
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Token issuer.
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Failed-login guard.
    pub fn guard(&self) -> &LoginGuard {
        &self.guard
    }

    /// Session token lifetime.
    pub fn token_ttl(&self) -> Duration {
        self.token_ttl
    }

    /// Authenticate with email and password and issue a session token.
    ///
    /// Every attempt is counted before the password is checked and the count
    /// is cleared on success, so a burst of concurrent attempts cannot get
    /// more guesses past the threshold than sequential ones. A locked
    /// identity is refused before the credential store is read. Unknown
    /// emails and wrong passwords are indistinguishable to the caller.
    pub async fn login(
        &self,
        email: &str,
        password: &str,
    ) -> std::result::Result<LoginOutcome, AuthError> {
        let identity = normalize_identity(email);

        let attempt = match self.guard.begin_attempt(&identity).await {
            Ok(attempt) => attempt,
            Err(AuthError::LockedOut {
                attempts,
                retry_after_secs,
            }) => {
                info!(attempts, "login refused: account locked");
                return Err(AuthError::AccountLocked { retry_after_secs });
            }
            Err(e) => return Err(e),
        };

        let user = UserRepository::new(self.db.pool())
            .get_by_email(&identity)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let verified = match &user {
            Some(user) => self.hasher.verify_blocking(password, &user.password_hash).await,
            None => {
                // Same work as a real check so response time does not reveal
                // whether the email is registered.
                self.hasher
                    .verify_blocking(password, self.hasher.dummy_hash())
                    .await;
                false
            }
        };

        let user = match user {
            Some(user) if verified => user,
            _ => return Err(Self::reject(attempt)),
        };

        self.guard.reset(&identity).await?;
        let issued = self.issuer.issue(user.id, user.role, self.token_ttl)?;
        info!(user_id = user.id, "login succeeded");

        Ok(LoginOutcome {
            token: issued.token,
            expires_in: issued.expires_in,
            expires_at: issued.expires_at,
            user,
        })
    }

    fn reject(attempt: Attempt) -> AuthError {
        if attempt.locks_on_failure {
            warn!(
                attempts = attempt.number,
                retry_after_secs = attempt.retry_after_secs,
                "login locked after repeated failures"
            );
            AuthError::AccountLocked {
                retry_after_secs: attempt.retry_after_secs,
            }
        } else {
            info!(attempts = attempt.number, "login failed: invalid credentials");
            AuthError::InvalidCredentials
        }
    }

    /// Revoke a session token.
    ///
    /// Tokens that fail signature checks or have already expired are ignored,
    /// and revoking twice is harmless.
    pub async fn logout(&self, token: &str) -> std::result::Result<(), AuthError> {
        let claims = match self.issuer.inspect(token) {
            Ok(claims) => claims,
            Err(e) => {
                debug!(kind = e.kind(), "logout ignored");
                return Ok(());
            }
        };

        // Validity ends once the clock passes the `exp` second.
        let valid_until_ms = claims.exp.saturating_add(1).saturating_mul(1000);
        let remaining_ms = valid_until_ms.saturating_sub(Utc::now().timestamp_millis());
        if remaining_ms <= 0 {
            debug!("logout ignored: token already expired");
            return Ok(());
        }

        self.revocations
            .revoke(token, Duration::from_millis(remaining_ms as u64))
            .await?;
        info!(subject = %claims.sub, "logout: token revoked");
        Ok(())
    }

    /// Resolve the principal behind a bearer token.
    ///
    /// Rejects expired, forged and revoked tokens, and tokens whose account
    /// has since been deleted. The role is read from the account, so a role
    /// change takes effect on tokens already issued.
    pub async fn authenticate(&self, token: &str) -> std::result::Result<Principal, AuthError> {
        let claims = self.issuer.validate(token)?;
        if self.revocations.is_revoked(token).await? {
            return Err(AuthError::RevokedToken);
        }
        let principal = claims.principal()?;

        let user = UserRepository::new(self.db.pool())
            .get_by_id(principal.user_id)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?
            .ok_or_else(|| {
                debug!(user_id = principal.user_id, "token for deleted account");
                AuthError::InvalidToken
            })?;

        Ok(Principal {
            user_id: user.id,
            role: user.role,
        })
    }

    /// Register a new credential record.
    pub async fn register(&self, credential: NewCredential) -> Result<User> {
        validate_password(&credential.password).map_err(|e| AppError::Validation(e.to_string()))?;

        let email = normalize_email(&credential.email);
        let repo = UserRepository::new(self.db.pool());
        if repo.email_exists(&email).await? {
            return Err(AppError::Conflict("email".to_string()));
        }

        let password_hash = self
            .hasher
            .hash_blocking(&credential.password)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        let user = repo
            .create(
                &NewUser::new(credential.username.trim(), email, password_hash)
                    .with_role(credential.role),
            )
            .await?;
        info!(user_id = user.id, role = %user.role, "user registered");
        Ok(user)
    }

    /// Change a password after re-checking the current one.
    pub async fn change_password(
        &self,
        user_id: i64,
        current_password: &str,
        new_password: &str,
    ) -> Result<()> {
        let repo = UserRepository::new(self.db.pool());
        let user = repo
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| AppError::NotFound("user".to_string()))?;

        if !self
            .hasher
            .verify_blocking(current_password, &user.password_hash)
            .await
        {
            warn!(user_id, "password change refused: current password mismatch");
            return Err(AuthError::InvalidCredentials.into());
        }

        validate_password(new_password).map_err(|e| AppError::Validation(e.to_string()))?;
        let password_hash = self
            .hasher
            .hash_blocking(new_password)
            .await
            .map_err(|e| AuthError::Internal(e.to_string()))?;

        repo.update_password(user_id, &password_hash).await?;
        info!(user_id, "password changed");
        Ok(())
    }
}

impl std::fmt::Debug for Authenticator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Authenticator")
            .field("guard", &self.guard)
            .field("token_ttl", &self.token_ttl)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::LockStatus;
    use crate::config::HashingConfig;
    use crate::store::testing::{FailingStore, GatedStore};
    use crate::store::{MemoryStore, SqlStore};

    fn test_config() -> Config {
        let mut config = Config::default();
        config.auth.jwt_secret = "test-secret-key".to_string();
        config.auth.store_retries = 1;
        config.auth.store_backoff_ms = 1;
        config.hashing = HashingConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        config
    }

    async fn setup_with(store: Arc<dyn KeyValueStore>) -> Authenticator {
        let db = Database::open_in_memory().await.unwrap();
        Authenticator::new(db, store, &test_config()).unwrap()
    }

    async fn setup() -> Authenticator {
        setup_with(Arc::new(MemoryStore::new())).await
    }

    async fn register_alice(auth: &Authenticator) -> User {
        auth.register(NewCredential::new("alice", "alice@x.io", "correct-pw"))
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_register_hashes_password() {
        let auth = setup().await;
        let user = register_alice(&auth).await;

        assert_eq!(user.role, Role::User);
        assert_ne!(user.password_hash, "correct-pw");
        assert!(user.password_hash.starts_with("$argon2id$"));
    }

    #[tokio::test]
    async fn test_register_rejects_duplicate_email() {
        let auth = setup().await;
        register_alice(&auth).await;

        let result = auth
            .register(NewCredential::new("alice2", "ALICE@x.io", "another-pw"))
            .await;
        assert!(matches!(result, Err(AppError::Conflict(_))));
    }

    #[tokio::test]
    async fn test_register_stores_normalized_email() {
        let auth = setup().await;
        let user = auth
            .register(NewCredential::new("alice", " alice@ÜBER.de ", "correct-pw"))
            .await
            .unwrap();
        assert_eq!(user.email, "alice@über.de");

        let outcome = auth.login("alice@ÜBER.de", "correct-pw").await.unwrap();
        assert_eq!(outcome.user.id, user.id);
        assert!(auth.login("ALICE@über.de", "correct-pw").await.is_ok());
    }

    #[tokio::test]
    async fn test_register_rejects_short_password() {
        let auth = setup().await;
        let result = auth
            .register(NewCredential::new("bob", "bob@x.io", "short"))
            .await;
        assert!(matches!(result, Err(AppError::Validation(_))));
    }

    #[tokio::test]
    async fn test_login_success() {
        let auth = setup().await;
        let alice = register_alice(&auth).await;

        let outcome = auth.login("alice@x.io", "correct-pw").await.unwrap();
        assert_eq!(outcome.user.id, alice.id);
        assert_eq!(outcome.expires_in, 3600);

        let principal = auth.authenticate(&outcome.token).await.unwrap();
        assert_eq!(principal.user_id, alice.id);
        assert_eq!(principal.role, Role::User);
    }

    #[tokio::test]
    async fn test_login_email_is_case_insensitive() {
        let auth = setup().await;
        register_alice(&auth).await;
        assert!(auth.login(" Alice@X.io ", "correct-pw").await.is_ok());
    }

    #[tokio::test]
    async fn test_wrong_password_and_unknown_email_look_the_same() {
        let auth = setup().await;
        register_alice(&auth).await;

        let wrong = auth.login("alice@x.io", "wrong-pw").await.unwrap_err();
        let unknown = auth.login("nobody@x.io", "whatever").await.unwrap_err();
        assert_eq!(wrong, AuthError::InvalidCredentials);
        assert_eq!(unknown, AuthError::InvalidCredentials);
        assert_eq!(wrong.to_string(), unknown.to_string());
    }

    #[tokio::test]
    async fn test_unknown_email_failures_are_counted() {
        let auth = setup().await;
        for _ in 0..2 {
            let _ = auth.login("nobody@x.io", "whatever").await;
        }
        assert_eq!(auth.guard().attempt_count("nobody@x.io").await.unwrap(), 2);
    }

    #[tokio::test]
    async fn test_lockout_after_threshold() {
        let auth = setup().await;
        register_alice(&auth).await;

        for _ in 0..4 {
            assert_eq!(
                auth.login("alice@x.io", "wrong-pw").await.unwrap_err(),
                AuthError::InvalidCredentials
            );
        }

        // The attempt that reaches the threshold is already refused as locked.
        assert!(matches!(
            auth.login("alice@x.io", "wrong-pw").await,
            Err(AuthError::AccountLocked { .. })
        ));

        // Even the right password is refused while locked.
        match auth.login("alice@x.io", "correct-pw").await {
            Err(AuthError::AccountLocked { retry_after_secs }) => {
                assert!(retry_after_secs > 0 && retry_after_secs <= 1800);
            }
            other => panic!("Expected AccountLocked, got {other:?}"),
        }
        // Refused attempts are counted too, without extending the window.
        assert_eq!(auth.guard().attempt_count("alice@x.io").await.unwrap(), 6);
    }

    #[tokio::test]
    async fn test_correct_password_on_threshold_attempt_succeeds() {
        let auth = setup().await;
        register_alice(&auth).await;

        for _ in 0..4 {
            let _ = auth.login("alice@x.io", "wrong-pw").await;
        }
        assert!(auth.login("alice@x.io", "correct-pw").await.is_ok());
    }

    #[tokio::test]
    async fn test_in_flight_attempt_reaching_threshold_blocks_correct_password() {
        let store = Arc::new(GatedStore::new());
        let auth = setup_with(store.clone()).await;
        register_alice(&auth).await;

        for _ in 0..4 {
            assert_eq!(
                auth.login("alice@x.io", "wrong-pw").await.unwrap_err(),
                AuthError::InvalidCredentials
            );
        }

        // Park a fifth wrong guess right after it is counted, before its
        // password check.
        store.hold_next();
        let pending = {
            let auth = auth.clone();
            tokio::spawn(async move { auth.login("alice@x.io", "wrong-pw").await })
        };
        store.wait_held().await;

        assert!(matches!(
            auth.login("alice@x.io", "correct-pw").await,
            Err(AuthError::AccountLocked { .. })
        ));

        store.release();
        assert!(matches!(
            pending.await.unwrap(),
            Err(AuthError::AccountLocked { .. })
        ));
        assert!(auth.guard().is_locked("alice@x.io").await.unwrap());
    }

    #[tokio::test]
    async fn test_concurrent_burst_with_correct_password_stays_locked() {
        let auth = setup().await;
        register_alice(&auth).await;

        for _ in 0..5 {
            let _ = auth.login("alice@x.io", "wrong-pw").await;
        }

        let mut tasks = Vec::new();
        for i in 0..20 {
            let auth = auth.clone();
            let password = if i == 10 { "correct-pw" } else { "wrong-pw" };
            tasks.push(tokio::spawn(async move {
                auth.login("alice@x.io", password).await
            }));
        }
        for task in tasks {
            assert!(matches!(
                task.await.unwrap(),
                Err(AuthError::AccountLocked { .. })
            ));
        }
    }

    #[tokio::test]
    async fn test_success_resets_counter() {
        let auth = setup().await;
        register_alice(&auth).await;

        for _ in 0..3 {
            let _ = auth.login("alice@x.io", "wrong-pw").await;
        }
        auth.login("alice@x.io", "correct-pw").await.unwrap();

        assert_eq!(
            auth.guard().status("alice@x.io").await.unwrap(),
            LockStatus::Clear
        );
    }

    #[tokio::test]
    async fn test_lock_expires_after_window() {
        let mut config = test_config();
        config.auth.max_login_attempts = 2;
        config.auth.lockout_window_secs = 1;
        let db = Database::open_in_memory().await.unwrap();
        let auth = Authenticator::new(db, Arc::new(MemoryStore::new()), &config).unwrap();
        register_alice(&auth).await;

        let _ = auth.login("alice@x.io", "wrong-pw").await;
        let _ = auth.login("alice@x.io", "wrong-pw").await;
        assert!(matches!(
            auth.login("alice@x.io", "correct-pw").await,
            Err(AuthError::AccountLocked { .. })
        ));

        tokio::time::sleep(Duration::from_millis(1100)).await;
        assert!(auth.login("alice@x.io", "correct-pw").await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_revokes_token() {
        let auth = setup().await;
        register_alice(&auth).await;
        let outcome = auth.login("alice@x.io", "correct-pw").await.unwrap();

        auth.logout(&outcome.token).await.unwrap();
        assert_eq!(
            auth.authenticate(&outcome.token).await,
            Err(AuthError::RevokedToken)
        );

        // Idempotent
        auth.logout(&outcome.token).await.unwrap();
        assert_eq!(
            auth.authenticate(&outcome.token).await,
            Err(AuthError::RevokedToken)
        );
    }

    #[tokio::test]
    async fn test_logout_leaves_other_tokens_valid() {
        let auth = setup().await;
        register_alice(&auth).await;
        let first = auth.login("alice@x.io", "correct-pw").await.unwrap();
        let second = auth.login("alice@x.io", "correct-pw").await.unwrap();

        auth.logout(&first.token).await.unwrap();
        assert!(auth.authenticate(&second.token).await.is_ok());
    }

    #[tokio::test]
    async fn test_logout_ignores_invalid_and_expired_tokens() {
        let store = Arc::new(MemoryStore::new());
        let auth = setup_with(store.clone()).await;

        auth.logout("garbage").await.unwrap();

        let past = Utc::now().timestamp() - 7200;
        let expired = auth
            .issuer()
            .issue_at(1, Role::User, Duration::from_secs(60), past)
            .unwrap();
        auth.logout(&expired.token).await.unwrap();

        assert!(store.is_empty());
    }

    #[tokio::test]
    async fn test_authenticate_rejects_expired_and_forged() {
        let auth = setup().await;
        let past = Utc::now().timestamp() - 7200;
        let expired = auth
            .issuer()
            .issue_at(1, Role::User, Duration::from_secs(60), past)
            .unwrap();
        assert_eq!(
            auth.authenticate(&expired.token).await,
            Err(AuthError::ExpiredToken)
        );

        let forged = TokenIssuer::new("other-secret")
            .issue(1, Role::Admin, Duration::from_secs(60))
            .unwrap();
        assert_eq!(
            auth.authenticate(&forged.token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_authenticate_rejects_deleted_account() {
        let auth = setup().await;
        let alice = register_alice(&auth).await;
        let outcome = auth.login("alice@x.io", "correct-pw").await.unwrap();

        UserRepository::new(auth.db().pool())
            .delete(alice.id)
            .await
            .unwrap();
        assert_eq!(
            auth.authenticate(&outcome.token).await,
            Err(AuthError::InvalidToken)
        );
    }

    #[tokio::test]
    async fn test_authenticate_uses_current_role() {
        let auth = setup().await;
        let admin = auth
            .register(NewCredential::new("root", "root@x.io", "correct-pw").with_role(Role::Admin))
            .await
            .unwrap();
        let outcome = auth.login("root@x.io", "correct-pw").await.unwrap();
        assert_eq!(
            auth.authenticate(&outcome.token).await.unwrap().role,
            Role::Admin
        );

        UserRepository::new(auth.db().pool())
            .update_role(admin.id, Role::Viewer)
            .await
            .unwrap();
        let principal = auth.authenticate(&outcome.token).await.unwrap();
        assert_eq!(principal.user_id, admin.id);
        assert_eq!(principal.role, Role::Viewer);
    }

    #[tokio::test]
    async fn test_change_password() {
        let auth = setup().await;
        let alice = register_alice(&auth).await;

        let wrong = auth
            .change_password(alice.id, "not-current", "brand-new-pw")
            .await;
        assert!(matches!(
            wrong,
            Err(AppError::Auth(AuthError::InvalidCredentials))
        ));

        auth.change_password(alice.id, "correct-pw", "brand-new-pw")
            .await
            .unwrap();
        assert!(auth.login("alice@x.io", "brand-new-pw").await.is_ok());
        assert_eq!(
            auth.login("alice@x.io", "correct-pw").await.unwrap_err(),
            AuthError::InvalidCredentials
        );
    }

    #[tokio::test]
    async fn test_change_password_unknown_user() {
        let auth = setup().await;
        let result = auth.change_password(999, "a", "brand-new-pw").await;
        assert!(matches!(result, Err(AppError::NotFound(_))));
    }

    #[tokio::test]
    async fn test_store_outage_fails_closed() {
        let auth = setup_with(Arc::new(FailingStore)).await;
        register_alice(&auth).await;

        assert!(matches!(
            auth.login("alice@x.io", "correct-pw").await,
            Err(AuthError::ServiceUnavailable(_))
        ));

        let token = auth
            .issuer()
            .issue(1, Role::User, Duration::from_secs(60))
            .unwrap();
        assert!(matches!(
            auth.authenticate(&token.token).await,
            Err(AuthError::ServiceUnavailable(_))
        ));
    }

    #[tokio::test]
    async fn test_sql_store_shares_lockout_between_instances() {
        let db = Database::open_in_memory().await.unwrap();
        let config = test_config();
        let first = Authenticator::new(
            db.clone(),
            Arc::new(SqlStore::new(db.pool().clone())),
            &config,
        )
        .unwrap();
        let second = Authenticator::new(
            db.clone(),
            Arc::new(SqlStore::new(db.pool().clone())),
            &config,
        )
        .unwrap();
        register_alice(&first).await;

        for _ in 0..3 {
            let _ = first.login("alice@x.io", "wrong-pw").await;
        }
        for _ in 0..2 {
            let _ = second.login("alice@x.io", "wrong-pw").await;
        }

        assert!(matches!(
            first.login("alice@x.io", "correct-pw").await,
            Err(AuthError::AccountLocked { .. })
        ));

        // A token revoked through one instance is rejected by the other.
        let token = first
            .issuer()
            .issue(1, Role::User, Duration::from_secs(60))
            .unwrap();
        second.logout(&token.token).await.unwrap();
        assert_eq!(
            first.authenticate(&token.token).await,
            Err(AuthError::RevokedToken)
        );
    }

    #[tokio::test]
    async fn test_scenario_alice_locked_bob_unaffected() {
        let auth = setup().await;
        register_alice(&auth).await;
        auth.register(NewCredential::new("bob", "bob@x.io", "bobs-password"))
            .await
            .unwrap();

        for _ in 0..5 {
            let _ = auth.login("alice@x.io", "guess").await;
        }
        assert!(auth.guard().is_locked("alice@x.io").await.unwrap());

        let bob = auth.login("bob@x.io", "bobs-password").await.unwrap();
        assert!(auth.authenticate(&bob.token).await.is_ok());
    }
}
