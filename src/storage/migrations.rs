//! Store layout migrations embedded at compile time.
//!
//! Migrations are sourced from `/migrations/` at the repo root and
//! embedded into the binary using `include_str!`. These cover the SQL
//! layout of the store itself; model (entity) changes are handled by
//! [`crate::storage::store`] through an inferred mapping.

use rusqlite::{Connection, Result};
use std::collections::HashSet;
use tracing::{info, warn};

/// A single migration with version identifier and SQL content.
struct Migration {
    version: &'static str,
    sql: &'static str,
}

/// All migrations in order, embedded at compile time.
///
/// Version names match the SQL filenames (without .sql extension).
/// The `schema_migrations` table tracks which have been applied.
const MIGRATIONS: &[Migration] = &[
    Migration {
        version: "001_add_model_migrations",
        sql: include_str!("../../migrations/001_add_model_migrations.sql"),
    },
    Migration {
        version: "002_add_object_listing_index",
        sql: include_str!("../../migrations/002_add_object_listing_index.sql"),
    },
];

/// Apply every migration not yet recorded in `schema_migrations`.
///
/// Each migration runs in its own transaction together with its
/// bookkeeping row. Both store handles of a coordinator call this against
/// the same file; whichever comes second finds every version recorded.
/// Returns the number of migrations applied.
///
/// # Errors
///
/// Returns an error if a migration fails to apply. Duplicate-column
/// failures are logged and treated as applied.
pub fn run_migrations(conn: &Connection) -> Result<usize> {
    conn.execute(
        "CREATE TABLE IF NOT EXISTS schema_migrations (
            version TEXT PRIMARY KEY,
            applied_at INTEGER NOT NULL
        )",
        [],
    )?;

    let applied: HashSet<String> = conn
        .prepare("SELECT version FROM schema_migrations")?
        .query_map([], |row| row.get(0))?
        .collect::<Result<_, _>>()?;

    let pending: Vec<&Migration> = MIGRATIONS
        .iter()
        .filter(|m| !applied.contains(m.version))
        .collect();

    for migration in &pending {
        let tx = conn.unchecked_transaction()?;
        match tx.execute_batch(migration.sql) {
            Ok(()) => {}
            Err(e) if e.to_string().contains("duplicate column name") => {
                warn!(version = migration.version, "Store layout already has these columns");
            }
            Err(e) => return Err(e),
        }
        tx.execute(
            "INSERT OR IGNORE INTO schema_migrations (version, applied_at) VALUES (?1, ?2)",
            rusqlite::params![migration.version, chrono::Utc::now().timestamp_millis()],
        )?;
        tx.commit()?;
        info!(version = migration.version, "Store layout migrated");
    }

    Ok(pending.len())
}
