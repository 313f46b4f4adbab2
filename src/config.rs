//! Configuration module for Chat Central.

use serde::Deserialize;
use std::net::IpAddr;
use std::path::Path;

use crate::{AppError, Result};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Login requests allowed per source address per minute.
    #[serde(default = "default_login_rate_limit")]
    pub login_rate_limit: u32,
    /// Reverse proxies whose `X-Forwarded-For`/`X-Real-IP` headers are honored.
    #[serde(default)]
    pub trusted_proxies: Vec<IpAddr>,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8000
}

fn default_login_rate_limit() -> u32 {
    20
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            login_rate_limit: default_login_rate_limit(),
            trusted_proxies: vec![],
        }
    }
}

/// Credential database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Connection string of the credential database.
    #[serde(default = "default_database_url")]
    pub url: String,
}

fn default_database_url() -> String {
    "sqlite://data/chatcentral.db".to_string()
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: default_database_url(),
        }
    }
}

/// Counter and revocation store configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct StoreConfig {
    /// Store backend: "sql" (shared, survives restarts) or "memory" (single process).
    #[serde(default = "default_store_backend")]
    pub backend: String,
    /// Connection string for the "sql" backend. Falls back to the credential database.
    #[serde(default)]
    pub url: Option<String>,
    /// Interval between purges of expired entries.
    #[serde(default = "default_purge_interval")]
    pub purge_interval_secs: u64,
}

fn default_store_backend() -> String {
    "sql".to_string()
}

fn default_purge_interval() -> u64 {
    3600
}

impl Default for StoreConfig {
    fn default() -> Self {
        Self {
            backend: default_store_backend(),
            url: None,
            purge_interval_secs: default_purge_interval(),
        }
    }
}

/// Longest accepted token lifetime or lockout window: one year.
pub const MAX_DURATION_SECS: u64 = 365 * 24 * 60 * 60;

/// Authentication configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct AuthConfig {
    /// JWT signing secret (must be set).
    #[serde(default)]
    pub jwt_secret: String,
    /// Session token lifetime in seconds.
    #[serde(default = "default_token_ttl")]
    pub token_ttl_secs: u64,
    /// Failed logins before an identity is locked.
    #[serde(default = "default_max_login_attempts")]
    pub max_login_attempts: u64,
    /// Failed-attempt window (and lock duration) in seconds.
    #[serde(default = "default_lockout_window")]
    pub lockout_window_secs: u64,
    /// Store retries after the first failed call.
    #[serde(default = "default_store_retries")]
    pub store_retries: u32,
    /// Initial backoff between store retries in milliseconds.
    #[serde(default = "default_store_backoff")]
    pub store_backoff_ms: u64,
}

fn default_token_ttl() -> u64 {
    3600 // 1 hour
}

fn default_max_login_attempts() -> u64 {
    5
}

fn default_lockout_window() -> u64 {
    1800 // 30 minutes
}

fn default_store_retries() -> u32 {
    2
}

fn default_store_backoff() -> u64 {
    50
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: String::new(),
            token_ttl_secs: default_token_ttl(),
            max_login_attempts: default_max_login_attempts(),
            lockout_window_secs: default_lockout_window(),
            store_retries: default_store_retries(),
            store_backoff_ms: default_store_backoff(),
        }
    }
}

/// Argon2 cost parameters.
#[derive(Debug, Clone, Deserialize)]
pub struct HashingConfig {
    /// Memory cost in KiB.
    #[serde(default = "default_memory_kib")]
    pub memory_kib: u32,
    /// Time cost (iterations).
    #[serde(default = "default_iterations")]
    pub iterations: u32,
    /// Parallelism (lanes).
    #[serde(default = "default_parallelism")]
    pub parallelism: u32,
}

fn default_memory_kib() -> u32 {
    65536 // 64 MB
}

fn default_iterations() -> u32 {
    3
}

fn default_parallelism() -> u32 {
    4
}

impl Default for HashingConfig {
    fn default() -> Self {
        Self {
            memory_kib: default_memory_kib(),
            iterations: default_iterations(),
            parallelism: default_parallelism(),
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Path to the log file.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/chatcentral.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Credential database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Counter/revocation store configuration.
    #[serde(default)]
    pub store: StoreConfig,
    /// Authentication configuration.
    #[serde(default)]
    pub auth: AuthConfig,
    /// Password hashing configuration.
    #[serde(default)]
    pub hashing: HashingConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(AppError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides()?;
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| AppError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `CHATCENTRAL_JWT_SECRET`
    /// - `CHATCENTRAL_TOKEN_TTL_SECS`
    /// - `CHATCENTRAL_MAX_LOGIN_ATTEMPTS`
    /// - `CHATCENTRAL_LOCKOUT_WINDOW_SECS`
    /// - `CHATCENTRAL_DATABASE_URL`
    /// - `CHATCENTRAL_STORE_URL`
    ///
    /// Empty values are ignored.
    pub fn apply_env_overrides(&mut self) -> Result<()> {
        if let Some(secret) = env_value("CHATCENTRAL_JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(ttl) = env_number("CHATCENTRAL_TOKEN_TTL_SECS")? {
            self.auth.token_ttl_secs = ttl;
        }
        if let Some(attempts) = env_number("CHATCENTRAL_MAX_LOGIN_ATTEMPTS")? {
            self.auth.max_login_attempts = attempts;
        }
        if let Some(window) = env_number("CHATCENTRAL_LOCKOUT_WINDOW_SECS")? {
            self.auth.lockout_window_secs = window;
        }
        if let Some(url) = env_value("CHATCENTRAL_DATABASE_URL") {
            self.database.url = url;
        }
        if let Some(url) = env_value("CHATCENTRAL_STORE_URL") {
            self.store.url = Some(url);
        }
        Ok(())
    }

    /// Connection string the "sql" store backend should use.
    pub fn store_url(&self) -> &str {
        self.store.url.as_deref().unwrap_or(&self.database.url)
    }

    /// Validate the configuration.
    pub fn validate(&self) -> Result<()> {
        if self.auth.jwt_secret.is_empty() {
            return Err(AppError::Config(
                "jwt_secret is not set. \
                 Set it in config.toml or via CHATCENTRAL_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }
        if self.auth.token_ttl_secs == 0 || self.auth.token_ttl_secs > MAX_DURATION_SECS {
            return Err(AppError::Config(format!(
                "token_ttl_secs must be between 1 and {MAX_DURATION_SECS}"
            )));
        }
        if self.auth.max_login_attempts == 0 {
            return Err(AppError::Config(
                "max_login_attempts must be at least 1".to_string(),
            ));
        }
        if self.auth.lockout_window_secs == 0 || self.auth.lockout_window_secs > MAX_DURATION_SECS
        {
            return Err(AppError::Config(format!(
                "lockout_window_secs must be between 1 and {MAX_DURATION_SECS}"
            )));
        }
        match self.store.backend.as_str() {
            "sql" | "memory" => Ok(()),
            other => Err(AppError::Config(format!(
                "unknown store backend '{other}' (expected \"sql\" or \"memory\")"
            ))),
        }
    }
}

fn env_value(name: &str) -> Option<String> {
    std::env::var(name).ok().filter(|v| !v.is_empty())
}

fn env_number<T: std::str::FromStr>(name: &str) -> Result<Option<T>> {
    match env_value(name) {
        Some(raw) => raw
            .trim()
            .parse()
            .map(Some)
            .map_err(|_| AppError::Config(format!("{name} must be a number, got '{raw}'"))),
        None => Ok(None),
    }
}
