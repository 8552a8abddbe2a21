//! Creating a new, empty store file

use crate::db;
use crate::engine::SqliteEngine;
use crate::errors::{from_rusqlite, io_error, store_name, Result};
use crate::fs::{BackingFs, StdFs};
use crate::migrations::apply_migrations;
use crate::publish;
use corkboard_core::errors::{BoardError, ErrorKind};
use std::path::Path;

/// Create a store at `path` with the board schema and an id prefix
///
/// The file is published with the same temp-then-rename step as every
/// later save, so a crash never leaves a half-initialized store behind.
///
/// # Errors
/// `Store` if a file already exists at `path`.
pub fn init_database(path: &Path, issue_prefix: &str) -> Result<()> {
    let fs = StdFs;
    if fs
        .stamp(path)
        .map_err(|e| io_error("stat_store", e))?
        .is_some()
    {
        return Err(BoardError::new(ErrorKind::Store)
            .with_op("init_database")
            .with_message(format!("{} already exists", store_name(path))));
    }
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).map_err(|e| io_error("create_store_dir", e))?;
    }

    let mut conn = db::open_in_memory()?;
    apply_migrations(&mut conn)?;
    conn.execute(
        "INSERT INTO config (key, value) VALUES ('issue_prefix', ?1)",
        [issue_prefix],
    )
    .map_err(from_rusqlite)?;

    let engine = SqliteEngine::from_connection(conn)?;
    let tmp = publish::stage(&fs, &engine, path)?;
    if let Err(e) = publish::commit(&fs, &tmp, path) {
        let _ = publish::discard(&fs, &tmp);
        return Err(io_error("publish_new_store", e));
    }
    engine.close()
}
