//! File-system seam for the backing file
//!
//! Everything the persistence engine does to the canonical path outside
//! SQLite itself (stat, rename, remove, directory listing) goes through
//! `BackingFs`, so tests can inject lock contention and other faults.

use std::fs;
use std::io;
use std::path::{Path, PathBuf};
use std::time::SystemTime;

/// Observed identity of the backing file: modification time and size
///
/// Two stamps that differ mean the file was rewritten. Size is a secondary
/// signal for file systems with coarse mtime granularity.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct FileStamp {
    pub modified: SystemTime,
    pub len: u64,
}

pub trait BackingFs: Send + Sync + std::fmt::Debug {
    /// Stamp of the file at `path`, `None` if it does not exist
    fn stamp(&self, path: &Path) -> io::Result<Option<FileStamp>>;

    /// Atomically move `from` onto `to`, replacing it
    fn rename(&self, from: &Path, to: &Path) -> io::Result<()>;

    /// Remove a file; a missing file is not an error
    fn remove(&self, path: &Path) -> io::Result<()>;

    /// Files directly inside `dir`; a missing directory yields nothing
    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>>;
}

/// `BackingFs` over `std::fs`
#[derive(Debug, Default, Clone, Copy)]
pub struct StdFs;

impl BackingFs for StdFs {
    fn stamp(&self, path: &Path) -> io::Result<Option<FileStamp>> {
        match fs::metadata(path) {
            Ok(meta) => Ok(Some(FileStamp {
                modified: meta.modified()?,
                len: meta.len(),
            })),
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(None),
            Err(e) => Err(e),
        }
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        fs::rename(from, to)
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        match fs::remove_file(path) {
            Err(e) if e.kind() == io::ErrorKind::NotFound => Ok(()),
            other => other,
        }
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(e) if e.kind() == io::ErrorKind::NotFound => return Ok(Vec::new()),
            Err(e) => return Err(e),
        };
        let mut files = Vec::new();
        for entry in entries {
            let entry = entry?;
            if entry.file_type()?.is_file() {
                files.push(entry.path());
            }
        }
        Ok(files)
    }
}
