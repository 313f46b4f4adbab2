//! Database schema and migrations for Chat Central.
//!
//! Migrations are applied in order when the database is opened. The
//! schema_version table records which ones have run.

/// Database migrations.
pub const MIGRATIONS: &[&str] = &[
    // v1: Credential records
    r#"
CREATE TABLE users (
    id             INTEGER PRIMARY KEY AUTOINCREMENT,
    username       TEXT NOT NULL,
    email          TEXT NOT NULL,
    password_hash  TEXT NOT NULL,           -- Argon2 PHC string
    role           TEXT NOT NULL DEFAULT 'user',  -- 'admin', 'user', 'viewer'
    created_at     TEXT NOT NULL DEFAULT (datetime('now')),
    updated_at     TEXT NOT NULL DEFAULT (datetime('now'))
);

CREATE UNIQUE INDEX idx_users_email ON users(email);   -- normalized on write
CREATE INDEX idx_users_role ON users(role);
"#,
    // v2: Key-value entries for login counters and token revocations
    r#"
CREATE TABLE kv_entries (
    key         TEXT PRIMARY KEY,
    value       TEXT NOT NULL,
    expires_at  INTEGER                     -- epoch millis, NULL = never
);

CREATE INDEX idx_kv_entries_expires_at ON kv_entries(expires_at);
"#,
];
