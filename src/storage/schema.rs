//! Store schema definitions.
//!
//! The on-disk layout is deliberately small: a key/value metadata table
//! carrying the key-derivation parameters, the passphrase verifier and the
//! model the store was written with, and one table of sealed objects.

use rusqlite::{Connection, Result};

/// Current layout version for migration tracking.
pub const CURRENT_SCHEMA_VERSION: i32 = 1;

/// Format marker written into every store.
pub const STORE_FORMAT: &str = "listvault/1";

/// Metadata keys.
pub mod meta {
    pub const FORMAT: &str = "format";
    pub const SALT: &str = "salt";
    pub const KDF: &str = "kdf";
    pub const VERIFIER_NONCE: &str = "verifier_nonce";
    pub const VERIFIER: &str = "verifier";
    pub const MODEL_JSON: &str = "model_json";
    pub const MODEL_HASH: &str = "model_hash";
    pub const MODEL_VERSION: &str = "model_version";
    pub const CREATED_AT: &str = "created_at";
}

/// Known plaintext sealed under the store key to check passphrases.
pub const VERIFIER_PLAINTEXT: &[u8] = b"listvault-key-check";

/// The complete SQL layout of a store.
///
/// Timestamps are INTEGER Unix milliseconds. Object payloads are sealed
/// JSON attribute maps; only the id and entity name are stored in clear.
pub const SCHEMA_SQL: &str = r"
CREATE TABLE IF NOT EXISTS schema_migrations (
    version TEXT PRIMARY KEY,
    applied_at INTEGER NOT NULL
);

CREATE TABLE IF NOT EXISTS store_metadata (
    key TEXT PRIMARY KEY,
    value BLOB NOT NULL
);

CREATE TABLE IF NOT EXISTS objects (
    id TEXT PRIMARY KEY,
    entity TEXT NOT NULL,
    nonce BLOB NOT NULL,
    payload BLOB NOT NULL,
    created_at INTEGER NOT NULL,
    updated_at INTEGER NOT NULL
);

CREATE INDEX IF NOT EXISTS idx_objects_entity ON objects(entity);
";

/// Apply the layout to the database.
///
/// Idempotent: every statement uses `IF NOT EXISTS`.
///
/// # Errors
///
/// Returns an error if the SQL execution fails or pragmas cannot be set.
pub fn apply_schema(conn: &Connection) -> Result<()> {
    conn.pragma_update(None, "journal_mode", "WAL")?;
    conn.pragma_update(None, "synchronous", "NORMAL")?;
    conn.pragma_update(None, "temp_store", "MEMORY")?;

    conn.execute_batch(SCHEMA_SQL)?;

    super::migrations::run_migrations(conn)?;

    conn.execute(
        "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
        rusqlite::params![
            format!("v{CURRENT_SCHEMA_VERSION}"),
            chrono::Utc::now().timestamp_millis()
        ],
    )?;

    Ok(())
}

/// Check whether the store metadata table exists.
///
/// Used before applying the layout to tell an initialized store apart
/// from an empty or foreign SQLite file.
///
/// # Errors
///
/// Returns an error if the file is not a SQLite database.
pub fn has_store_metadata(conn: &Connection) -> Result<bool> {
    conn.prepare("SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'store_metadata'")?
        .exists([])
}
