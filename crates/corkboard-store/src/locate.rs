//! Locating the backing file
//!
//! Either an explicit path, or discovery of `.beads/*.db` under a search
//! root (first match by file name, so discovery is deterministic).

use crate::errors::{connection_error, io_error, store_name, Result};
use crate::fs::BackingFs;
use corkboard_core::errors::{BoardError, ErrorKind};
use std::path::{Path, PathBuf};

/// Directory searched for store files
pub const STORE_DIR: &str = ".beads";

/// Extension of store files
pub const STORE_EXTENSION: &str = "db";

/// Resolve the canonical backing path
///
/// # Errors
/// `Connection` if the explicit path does not exist or discovery finds
/// nothing.
pub fn locate_store(
    fs: &dyn BackingFs,
    explicit: Option<&Path>,
    search_root: &Path,
) -> Result<PathBuf> {
    if let Some(path) = explicit {
        return match fs.stamp(path).map_err(|e| io_error("stat_store", e))? {
            Some(_) => Ok(path.to_path_buf()),
            None => Err(connection_error(path, "no store file found")),
        };
    }

    let dir = search_root.join(STORE_DIR);
    let mut candidates: Vec<PathBuf> = fs
        .list_dir(&dir)
        .map_err(|e| io_error("list_store_dir", e))?
        .into_iter()
        .filter(|p| p.extension().and_then(|e| e.to_str()) == Some(STORE_EXTENSION))
        .collect();
    candidates.sort();

    match candidates.into_iter().next() {
        Some(path) => {
            tracing::debug!(store = %store_name(&path), "Discovered store file");
            Ok(path)
        }
        None => Err(BoardError::new(ErrorKind::Connection)
            .with_op("locate_store")
            .with_message(format!("no {}/*.{} store found", STORE_DIR, STORE_EXTENSION))),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::fs::StdFs;
    use std::fs;
    use tempfile::TempDir;

    #[test]
    fn test_explicit_path_must_exist() {
        let dir = TempDir::new().unwrap();
        let err = locate_store(&StdFs, Some(&dir.path().join("x.db")), dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }

    #[test]
    fn test_discovery_picks_first_db_by_name() {
        let dir = TempDir::new().unwrap();
        let store_dir = dir.path().join(STORE_DIR);
        fs::create_dir_all(&store_dir).unwrap();
        fs::write(store_dir.join("zeta.db"), b"").unwrap();
        fs::write(store_dir.join("alpha.db"), b"").unwrap();
        fs::write(store_dir.join("alpha.db.tmp"), b"").unwrap();
        fs::write(store_dir.join("notes.txt"), b"").unwrap();

        let found = locate_store(&StdFs, None, dir.path()).unwrap();
        assert_eq!(found, store_dir.join("alpha.db"));
    }

    #[test]
    fn test_discovery_without_store_dir_fails() {
        let dir = TempDir::new().unwrap();
        let err = locate_store(&StdFs, None, dir.path()).unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Connection);
    }
}
