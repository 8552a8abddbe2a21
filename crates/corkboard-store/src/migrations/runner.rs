//! Applies embedded migrations in order, each in its own transaction

use super::embedded::{Migration, MIGRATIONS};
use crate::errors::{from_rusqlite, migration_error, Result};
use rusqlite::{params, Connection, OptionalExtension};

const LEDGER_DDL: &str = "CREATE TABLE IF NOT EXISTS schema_migrations (
    id TEXT PRIMARY KEY,
    checksum TEXT NOT NULL,
    applied_at TEXT NOT NULL
)";

/// Bring the schema up to date
///
/// # Errors
/// `Store` if a migration's SQL fails or an applied migration's recorded
/// checksum no longer matches the embedded SQL.
pub fn apply_migrations(conn: &mut Connection) -> Result<()> {
    conn.execute_batch(LEDGER_DDL).map_err(from_rusqlite)?;
    for migration in MIGRATIONS {
        apply_one(conn, migration)?;
    }
    Ok(())
}

/// Ids of the applied migrations, oldest first
pub fn applied_migrations(conn: &Connection) -> Result<Vec<String>> {
    let mut stmt = conn
        .prepare("SELECT id FROM schema_migrations ORDER BY applied_at, id")
        .map_err(from_rusqlite)?;
    let rows = stmt
        .query_map([], |row| row.get(0))
        .map_err(from_rusqlite)?;
    let ids = rows
        .collect::<std::result::Result<Vec<String>, _>>()
        .map_err(from_rusqlite)?;
    Ok(ids)
}

fn apply_one(conn: &mut Connection, migration: &Migration) -> Result<()> {
    let checksum = migration.checksum();
    let recorded: Option<String> = conn
        .query_row(
            "SELECT checksum FROM schema_migrations WHERE id = ?1",
            [migration.id],
            |row| row.get(0),
        )
        .optional()
        .map_err(from_rusqlite)?;

    if let Some(recorded) = recorded {
        if recorded != checksum {
            return Err(migration_error(migration.id, "checksum mismatch"));
        }
        return Ok(());
    }

    let tx = conn.transaction().map_err(from_rusqlite)?;
    tx.execute_batch(migration.sql)
        .map_err(|e| migration_error(migration.id, &e.to_string()))?;
    tx.execute(
        "INSERT INTO schema_migrations (id, checksum, applied_at) VALUES (?1, ?2, ?3)",
        params![migration.id, checksum, chrono::Utc::now().to_rfc3339()],
    )
    .map_err(from_rusqlite)?;
    tx.commit().map_err(from_rusqlite)
}
