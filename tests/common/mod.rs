//! Shared helpers for Web API integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use axum::http::header::AUTHORIZATION;
use axum_test::TestServer;
use serde_json::{json, Value};

use chatcentral::auth::NewCredential;
use chatcentral::store::{
    Counter, KeyValueStore, MemoryStore, StoreError, StoreResult, StoredValue,
};
use chatcentral::web::{create_health_router, create_router, AppState};
use chatcentral::{Authenticator, Config, Database, Role};

/// Password used for every seeded account.
pub const PASSWORD: &str = "correct horse battery";

/// Configuration with cheap hashing and a generous per-address limit.
pub fn test_config() -> Config {
    let mut config = Config::default();
    config.auth.jwt_secret = "test-secret-key-for-testing-only".to_string();
    config.auth.store_retries = 1;
    config.auth.store_backoff_ms = 1;
    config.hashing.memory_kib = 1024;
    config.hashing.iterations = 1;
    config.hashing.parallelism = 1;
    config.server.login_rate_limit = 1000;
    config
}

/// A store that can be switched off to simulate a backend outage.
pub struct SwitchableStore {
    inner: MemoryStore,
    down: AtomicBool,
}

impl SwitchableStore {
    pub fn new() -> Self {
        Self {
            inner: MemoryStore::new(),
            down: AtomicBool::new(false),
        }
    }

    pub fn set_down(&self, down: bool) {
        self.down.store(down, Ordering::SeqCst);
    }

    fn check(&self) -> StoreResult<()> {
        if self.down.load(Ordering::SeqCst) {
            Err(StoreError::Unavailable("connection refused".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl KeyValueStore for SwitchableStore {
    fn backend_name(&self) -> &'static str {
        "switchable"
    }

    async fn get(&self, key: &str) -> StoreResult<Option<StoredValue>> {
        self.check()?;
        self.inner.get(key).await
    }

    async fn set_with_ttl(&self, key: &str, value: &str, ttl: Duration) -> StoreResult<()> {
        self.check()?;
        self.inner.set_with_ttl(key, value, ttl).await
    }

    async fn increment(&self, key: &str, window: Duration) -> StoreResult<Counter> {
        self.check()?;
        self.inner.increment(key, window).await
    }

    async fn delete(&self, key: &str) -> StoreResult<bool> {
        self.check()?;
        self.inner.delete(key).await
    }

    async fn purge_expired(&self) -> StoreResult<u64> {
        self.check()?;
        self.inner.purge_expired().await
    }

    async fn ping(&self) -> StoreResult<()> {
        self.check()
    }
}

/// A running test application.
pub struct TestApp {
    pub server: TestServer,
    pub auth: Authenticator,
    pub store: Arc<SwitchableStore>,
}

impl TestApp {
    /// Build an application on an in-memory database.
    pub async fn new() -> Self {
        Self::with_config(test_config()).await
    }

    pub async fn with_config(config: Config) -> Self {
        let db = Database::open_in_memory()
            .await
            .expect("Failed to create test database");
        let store = Arc::new(SwitchableStore::new());
        let dyn_store: Arc<dyn KeyValueStore> = store.clone();

        let auth = Authenticator::new(db, dyn_store.clone(), &config)
            .expect("Failed to build authenticator");
        let state = Arc::new(AppState::new(auth.clone(), dyn_store, &config.server));

        let router = create_router(state, &config.server.cors_origins).merge(create_health_router());
        let server = TestServer::new(router).expect("Failed to create test server");

        Self {
            server,
            auth,
            store,
        }
    }

    /// Insert a user directly, bypassing the HTTP layer.
    pub async fn seed_user(&self, username: &str, email: &str, role: Role) -> i64 {
        self.auth
            .register(NewCredential::new(username, email, PASSWORD).with_role(role))
            .await
            .expect("Failed to seed user")
            .id
    }

    /// POST /api/auth/login and return the raw response body.
    pub async fn login_raw(&self, email: &str, password: &str) -> axum_test::TestResponse {
        self.server
            .post("/api/auth/login")
            .json(&json!({ "email": email, "password": password }))
            .await
    }

    /// Log in with the seeded password and return the token.
    pub async fn login(&self, email: &str) -> String {
        let response = self.login_raw(email, PASSWORD).await;
        response.assert_status_ok();
        let body: Value = response.json();
        body["data"]["token"]
            .as_str()
            .expect("token missing")
            .to_string()
    }

    /// Seed a user with `role` and log them in.
    pub async fn user_with_token(&self, username: &str, role: Role) -> (i64, String) {
        let email = format!("{username}@example.com");
        let id = self.seed_user(username, &email, role).await;
        let token = self.login(&email).await;
        (id, token)
    }

    pub async fn get_authed(&self, path: &str, token: &str) -> axum_test::TestResponse {
        self.server
            .get(path)
            .add_header(AUTHORIZATION, format!("Bearer {token}"))
            .await
    }
}
