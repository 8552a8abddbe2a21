//! Shared fixtures for adapter integration tests

#![allow(dead_code)]

use corkboard_engine::{AdapterConfig, BoardAdapter};
use corkboard_store::{init_database, BackingFs, FileStamp, SqliteEngine, StdFs};
use std::io;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicBool, AtomicU32, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, SystemTime};
use tempfile::TempDir;

/// `BackingFs` over the real file system with fault injection
///
/// Counts successful renames, fails the next `fail_renames` renames with a
/// permission error (a file held by another process), can stall the next
/// `stamp` call to keep a reload in flight, and can fail every `stamp` call
/// while `fail_stamps` is set.
#[derive(Debug, Default)]
pub struct FaultyFs {
    renames: AtomicU64,
    fail_renames: AtomicU32,
    stall_next_stamp: AtomicBool,
    stall_for_ms: AtomicU64,
    fail_stamps: AtomicBool,
}

impl FaultyFs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn renames(&self) -> u64 {
        self.renames.load(Ordering::SeqCst)
    }

    pub fn fail_next_renames(&self, count: u32) {
        self.fail_renames.store(count, Ordering::SeqCst);
    }

    pub fn stall_next_stamp(&self, duration: Duration) {
        self.stall_for_ms
            .store(duration.as_millis() as u64, Ordering::SeqCst);
        self.stall_next_stamp.store(true, Ordering::SeqCst);
    }

    pub fn fail_stamps(&self, failing: bool) {
        self.fail_stamps.store(failing, Ordering::SeqCst);
    }
}

impl BackingFs for FaultyFs {
    fn stamp(&self, path: &Path) -> io::Result<Option<FileStamp>> {
        if self.fail_stamps.load(Ordering::SeqCst) {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "metadata not readable",
            ));
        }
        if self.stall_next_stamp.swap(false, Ordering::SeqCst) {
            std::thread::sleep(Duration::from_millis(
                self.stall_for_ms.load(Ordering::SeqCst),
            ));
        }
        StdFs.stamp(path)
    }

    fn rename(&self, from: &Path, to: &Path) -> io::Result<()> {
        let failing = self
            .fail_renames
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| n.checked_sub(1))
            .is_ok();
        if failing {
            return Err(io::Error::new(
                io::ErrorKind::PermissionDenied,
                "file is locked by another process",
            ));
        }
        StdFs.rename(from, to)?;
        self.renames.fetch_add(1, Ordering::SeqCst);
        Ok(())
    }

    fn remove(&self, path: &Path) -> io::Result<()> {
        StdFs.remove(path)
    }

    fn list_dir(&self, dir: &Path) -> io::Result<Vec<PathBuf>> {
        StdFs.list_dir(dir)
    }
}

/// Short windows so tests run in milliseconds
pub fn fast_config(db: &Path) -> AdapterConfig {
    AdapterConfig {
        debounce_ms: 30,
        self_save_guard_ms: 200,
        snapshot_ttl_ms: 10_000,
        reload_wait_interval_ms: 10,
        reload_wait_max_attempts: 10,
        save_wait_ms: 2_000,
        publish_max_attempts: 5,
        publish_initial_backoff_ms: 1,
        publish_max_backoff_ms: 5,
        ..AdapterConfig::for_database(db)
    }
}

pub struct Fixture {
    pub dir: TempDir,
    pub db: PathBuf,
    pub fs: Arc<FaultyFs>,
}

impl Fixture {
    pub fn new() -> Self {
        let dir = TempDir::new().unwrap();
        let db = dir.path().join(".beads").join("issues.db");
        init_database(&db, "bd").unwrap();
        Self {
            dir,
            db,
            fs: FaultyFs::new(),
        }
    }

    pub fn adapter(&self) -> BoardAdapter {
        self.adapter_with(fast_config(&self.db))
    }

    pub fn adapter_with(&self, config: AdapterConfig) -> BoardAdapter {
        BoardAdapter::with_fs(config, self.fs.clone()).unwrap()
    }

    /// Issue count as seen by a fresh reader of the backing file
    pub fn issues_on_disk(&self) -> usize {
        SqliteEngine::load(&self.db).unwrap().board().unwrap().len()
    }

    pub fn tmp_path(&self) -> PathBuf {
        corkboard_store::publish::temp_path(&self.db)
    }
}

/// Push the file's mtime forward so a rewrite is visible on any file system
pub fn bump_mtime(path: &Path, by: Duration) {
    let file = std::fs::OpenOptions::new().write(true).open(path).unwrap();
    file.set_modified(SystemTime::now() + by).unwrap();
}

/// Rewrite the backing file as another process would: temp file plus rename
pub fn external_create(db: &Path, title: &str) {
    use corkboard_core::ops::{Mutation, NewIssue};

    let mut engine = SqliteEngine::load(db).unwrap();
    engine
        .apply(&Mutation::Create(NewIssue::new(title)), "other-process", "bd")
        .unwrap();
    let tmp = corkboard_store::publish::stage(&StdFs, &engine, db).unwrap();
    std::fs::rename(&tmp, db).unwrap();
    bump_mtime(db, Duration::from_secs(5));
}

/// Poll until `condition` holds or `timeout` elapses
pub async fn eventually(timeout: Duration, mut condition: impl FnMut() -> bool) -> bool {
    let deadline = tokio::time::Instant::now() + timeout;
    while tokio::time::Instant::now() < deadline {
        if condition() {
            return true;
        }
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
    condition()
}
