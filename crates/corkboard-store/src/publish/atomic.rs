//! Atomic write primitives
//!
//! Uses the temp→rename pattern to ensure no partial writes. Retrying a
//! failed rename is the caller's policy; these functions make one attempt.

use crate::engine::SqliteEngine;
use crate::errors::{io_error, Result};
use crate::fs::BackingFs;
use std::ffi::OsString;
use std::io;
use std::path::{Path, PathBuf};

/// Temporary path colocated with `canonical`: `<canonical>.tmp`
pub fn temp_path(canonical: &Path) -> PathBuf {
    let mut name: OsString = canonical.as_os_str().to_owned();
    name.push(".tmp");
    PathBuf::from(name)
}

/// Export the engine's full content into the temporary path
///
/// A stale temporary file from an earlier failed publish is removed first.
/// There is no separate fsync: the export is one SQLite backup into a
/// connection opened with `synchronous = FULL`, so the staged file is on
/// disk once its final commit returns. Returns the temporary path on
/// success.
pub fn stage(fs: &dyn BackingFs, engine: &SqliteEngine, canonical: &Path) -> Result<PathBuf> {
    let tmp = temp_path(canonical);
    fs.remove(&tmp).map_err(|e| io_error("remove_stale_temp", e))?;

    if let Err(err) = engine.export_to(&tmp) {
        // Best effort: the export error is the one worth reporting
        let _ = fs.remove(&tmp);
        return Err(err);
    }

    Ok(tmp)
}

/// Rename the staged file onto the canonical path (single attempt)
pub fn commit(fs: &dyn BackingFs, tmp: &Path, canonical: &Path) -> io::Result<()> {
    fs.rename(tmp, canonical)
}

/// Remove the staged file after giving up on a publish
pub fn discard(fs: &dyn BackingFs, tmp: &Path) -> Result<()> {
    fs.remove(tmp).map_err(|e| io_error("remove_temp", e))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::bootstrap::init_database;
    use crate::fs::StdFs;
    use tempfile::TempDir;

    #[test]
    fn test_temp_path_appends_suffix() {
        let tmp = temp_path(Path::new("/data/.beads/issues.db"));
        assert_eq!(tmp, PathBuf::from("/data/.beads/issues.db.tmp"));
    }

    #[test]
    fn test_stage_commit_leaves_no_temp() {
        let dir = TempDir::new().unwrap();
        let canonical = dir.path().join("board.db");
        init_database(&canonical, "bd").unwrap();
        let engine = SqliteEngine::load(&canonical).unwrap();

        let tmp = stage(&StdFs, &engine, &canonical).unwrap();
        assert!(tmp.exists());
        commit(&StdFs, &tmp, &canonical).unwrap();

        assert!(!tmp.exists());
        assert!(SqliteEngine::load(&canonical).is_ok());
    }

    #[test]
    fn test_stage_writes_through_synced_connection() {
        let dir = TempDir::new().unwrap();
        let target = dir.path().join("staged.db");
        let conn = crate::db::open_for_write(&target).unwrap();

        let synchronous: i64 = conn
            .query_row("PRAGMA synchronous", [], |row| row.get(0))
            .unwrap();
        let journal: String = conn
            .query_row("PRAGMA journal_mode", [], |row| row.get(0))
            .unwrap();
        assert_eq!(synchronous, 2, "expected synchronous = FULL");
        assert_eq!(journal.to_lowercase(), "delete");
    }

    #[test]
    fn test_stage_replaces_stale_temp() {
        let dir = TempDir::new().unwrap();
        let canonical = dir.path().join("board.db");
        init_database(&canonical, "bd").unwrap();
        std::fs::write(temp_path(&canonical), b"half-written garbage").unwrap();

        let engine = SqliteEngine::load(&canonical).unwrap();
        let tmp = stage(&StdFs, &engine, &canonical).unwrap();

        assert!(SqliteEngine::load(&tmp).is_ok());
    }
}
