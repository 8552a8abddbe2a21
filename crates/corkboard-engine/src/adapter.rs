//! Board adapter facade
//!
//! `BoardAdapter` owns the single live engine and the single backing file.
//! Reads and mutations go through it; persistence (debounced publish) and
//! external-change handling (reload) are driven from here and implemented in
//! the `persistence` and `detector` modules.
//!
//! Lock order, outermost first: `reload_lock`, `save_lock`, `engine`, then
//! the status channel. The `engine` lock is synchronous and is never held
//! across an `.await`.

use crate::cache::SnapshotCache;
use crate::config::AdapterConfig;
use crate::state::{EngineStatus, Phase, StatusSnapshot, StatusTx};
use corkboard_core::errors::{BoardError, ErrorKind, Result};
use corkboard_core::model::{Board, IssueDetail};
use corkboard_core::ops::{Mutation, MutationOutcome};
use corkboard_core::types::OperationContext;
use corkboard_core::{log_op_end, log_op_error, log_op_start};
use corkboard_store::errors::{io_error, store_name};
use corkboard_store::{locate_store, BackingFs, FileStamp, SqliteEngine, StdFs};
use parking_lot::Mutex;
use std::future::Future;
use std::path::PathBuf;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

/// The live engine together with the path it was loaded from
pub(crate) struct Connected {
    pub engine: SqliteEngine,
    pub path: PathBuf,
}

/// State shared between the facade and its background save tasks
pub(crate) struct Shared {
    pub config: AdapterConfig,
    pub fs: Arc<dyn BackingFs>,
    pub engine: Mutex<Option<Connected>>,
    pub status: StatusTx,
    pub cache: SnapshotCache,
    /// Pending debounce timer, aborted on every reschedule
    pub debounce: Mutex<Option<JoinHandle<()>>>,
    /// Held for the whole of a publish
    pub save_lock: tokio::sync::Mutex<()>,
    /// Serializes reloads and dispose
    pub reload_lock: tokio::sync::Mutex<()>,
    pub disposed: AtomicBool,
}

impl Shared {
    pub fn phase(&self) -> Phase {
        self.status.borrow().phase
    }

    pub fn canonical_path(&self) -> Option<PathBuf> {
        self.engine.lock().as_ref().map(|c| c.path.clone())
    }

    /// Run `f` against the live engine under the engine lock
    pub fn with_engine<T>(
        &self,
        op: &str,
        f: impl FnOnce(&mut Connected) -> Result<T>,
    ) -> Result<T> {
        let mut slot = self.engine.lock();
        let connected = slot.as_mut().ok_or_else(|| not_connected(op))?;
        f(connected)
    }

    /// Locate and load the backing file, stamping it before the read
    ///
    /// The stamp is taken first: a rewrite racing the load then shows up as
    /// a changed file on the next check instead of going unnoticed.
    pub fn open_store(&self) -> Result<(Connected, Option<FileStamp>)> {
        let path = locate_store(
            self.fs.as_ref(),
            self.config.database.as_deref(),
            &self.config.search_root,
        )?;
        let stamp = self
            .fs
            .stamp(&path)
            .map_err(|e| io_error("stat_store", e))?;
        let engine = SqliteEngine::load(&path)?;
        Ok((Connected { engine, path }, stamp))
    }

    fn connect(&self) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(disposed("connect"));
        }
        if self.engine.lock().is_some() {
            return Ok(());
        }

        let (connected, stamp) = self.open_store()?;
        let name = store_name(&connected.path);

        let mut slot = self.engine.lock();
        if slot.is_some() {
            // Another caller connected first; keep its engine
            return Ok(());
        }
        *slot = Some(connected);
        self.status.send_modify(|s| {
            s.connected = true;
            s.last_known = stamp;
        });
        self.cache.invalidate();
        info!(store = %name, "Connected to board store");
        Ok(())
    }

    pub fn ensure_connected(&self, op: &str) -> Result<()> {
        if self.disposed.load(Ordering::SeqCst) {
            return Err(disposed(op));
        }
        self.connect()
    }

    /// Change check, then the bounded wait on any reload in flight
    async fn prepare_read(&self, op: &'static str) -> Result<()> {
        self.ensure_connected(op)?;

        if let Err(err) = self.check_external(op).await {
            match err.kind() {
                // Local state is still consistent; the reload is retried on the next read
                ErrorKind::Persistence | ErrorKind::StuckState => {
                    warn!(op, err_code = err.code(), "Reload deferred: {}", err);
                }
                ErrorKind::Reload => {
                    return Err(BoardError::new(ErrorKind::Connection)
                        .with_op(op)
                        .with_message("board store could not be reopened")
                        .with_source(err));
                }
                ErrorKind::Io => {
                    return Err(BoardError::new(ErrorKind::Connection)
                        .with_op(op)
                        .with_message("board store could not be checked for changes")
                        .with_source(err));
                }
                _ => return Err(err),
            }
        }

        self.wait_while_reloading(op).await;
        Ok(())
    }

    async fn read_board(&self) -> Result<Arc<Board>> {
        self.prepare_read("get_board").await?;

        if let Some(board) = self.cache.get() {
            debug!("Serving board from snapshot cache");
            return Ok(board);
        }

        let (board, generation) = self.with_engine("get_board", |c| {
            Ok((c.engine.board()?, self.cache.generation()))
        })?;
        let board = Arc::new(board);
        self.cache.put(Arc::clone(&board), generation);
        Ok(board)
    }

    async fn read_issue(&self, issue_id: &str) -> Result<IssueDetail> {
        self.prepare_read("get_issue").await?;
        self.with_engine("get_issue", |c| c.engine.issue_detail(issue_id))
    }

    async fn apply_mutation(self: &Arc<Self>, mutation: &Mutation) -> Result<MutationOutcome> {
        let op = mutation.name();
        self.ensure_connected(op)?;

        let outcome = loop {
            self.wait_while_reloading(op).await;
            if let Some(outcome) = self.apply_unless_reloading(op, mutation)? {
                break outcome;
            }
        };

        if outcome.changed() {
            self.schedule_save();
        }
        Ok(outcome)
    }

    /// Apply under the engine lock; `None` if a reload started meanwhile
    fn apply_unless_reloading(
        &self,
        op: &str,
        mutation: &Mutation,
    ) -> Result<Option<MutationOutcome>> {
        let mut slot = self.engine.lock();
        if self.phase().is_reloading() {
            return Ok(None);
        }
        let connected = slot.as_mut().ok_or_else(|| not_connected(op))?;
        let outcome =
            connected
                .engine
                .apply(mutation, &self.config.actor, &self.config.issue_prefix)?;

        if outcome.changed() {
            self.status.send_modify(EngineStatus::mark_dirty);
            self.cache.invalidate();
        }
        Ok(Some(outcome))
    }

    async fn shutdown(&self) -> Result<()> {
        let _reload = self.reload_lock.lock().await;

        let flushed = self.flush_pending_saves().await;
        if let Err(err) = &flushed {
            error!(
                err_code = err.code(),
                "Unpublished changes could not be flushed before close: {}", err
            );
        }

        let previous = self.engine.lock().take();
        self.cache.invalidate();
        self.status.send_modify(|s| s.connected = false);

        if let Some(connected) = previous {
            let name = store_name(&connected.path);
            if let Err(err) = connected.engine.close() {
                warn!(store = %name, err_code = err.code(), "Engine did not close cleanly");
            }
            info!(store = %name, "Board adapter disposed");
        }
        flushed
    }
}

fn not_connected(op: &str) -> BoardError {
    BoardError::new(ErrorKind::Connection)
        .with_op(op)
        .with_message("not connected to a board store")
}

fn disposed(op: &str) -> BoardError {
    BoardError::new(ErrorKind::Connection)
        .with_op(op)
        .with_message("adapter has been disposed")
}

/// Wrap a facade operation with start/end logging and an operation id
async fn traced<T>(op: &'static str, fut: impl Future<Output = Result<T>>) -> Result<T> {
    let ctx = OperationContext::new(op);
    let start = Instant::now();
    log_op_start!(ctx.op, op_id = %ctx.op_id);

    let result = fut.await;
    let duration_ms = start.elapsed().as_millis() as u64;
    match &result {
        Ok(_) => log_op_end!(ctx.op, duration_ms = duration_ms, op_id = %ctx.op_id),
        Err(err) => log_op_error!(ctx.op, err, duration_ms = duration_ms, op_id = %ctx.op_id),
    }
    result
}

/// Consistency and persistence engine for a board backed by a SQLite file
///
/// Mutations apply to an in-memory engine immediately and reach the file
/// through a debounced, atomic publish. Reads detect rewrites of the file by
/// other processes and reload before answering.
///
/// Must be used from within a Tokio runtime.
pub struct BoardAdapter {
    shared: Arc<Shared>,
}

impl BoardAdapter {
    /// # Errors
    /// `Config` if the configuration is invalid.
    pub fn new(config: AdapterConfig) -> Result<Self> {
        Self::with_fs(config, Arc::new(StdFs))
    }

    /// Adapter with a custom file-system seam
    ///
    /// # Errors
    /// `Config` if the configuration is invalid.
    pub fn with_fs(config: AdapterConfig, fs: Arc<dyn BackingFs>) -> Result<Self> {
        config.validate()?;
        let cache = SnapshotCache::new(config.snapshot_ttl());
        Ok(Self {
            shared: Arc::new(Shared {
                config,
                fs,
                engine: Mutex::new(None),
                status: watch::Sender::new(EngineStatus::new()),
                cache,
                debounce: Mutex::new(None),
                save_lock: tokio::sync::Mutex::new(()),
                reload_lock: tokio::sync::Mutex::new(()),
                disposed: AtomicBool::new(false),
            }),
        })
    }

    pub fn config(&self) -> &AdapterConfig {
        &self.shared.config
    }

    /// Locate and load the backing file; a no-op once connected
    ///
    /// # Errors
    /// `Connection` if no valid store is found or it lacks the expected tables.
    pub async fn connect(&self) -> Result<()> {
        traced("connect", async { self.shared.connect() }).await
    }

    /// The board read-model, reloading first if the file changed externally
    ///
    /// # Errors
    /// `Connection` if the store cannot be loaded or reopened.
    pub async fn get_board(&self) -> Result<Arc<Board>> {
        traced("get_board", self.shared.read_board()).await
    }

    /// One issue with its comments and recent audit events
    ///
    /// # Errors
    /// `Connection` as for [`get_board`](Self::get_board), `NotFound` for an
    /// unknown id.
    pub async fn get_issue(&self, issue_id: &str) -> Result<IssueDetail> {
        traced("get_issue", self.shared.read_issue(issue_id)).await
    }

    /// Apply a mutation to the live engine and schedule its publish
    ///
    /// The next [`get_board`](Self::get_board) reflects the mutation even
    /// though the file is written later.
    ///
    /// # Errors
    /// `Validation` for bad input, `NotFound` for unknown issues, `Store` if
    /// the engine rejects the write.
    pub async fn mutate(&self, mutation: Mutation) -> Result<MutationOutcome> {
        traced(mutation.name(), self.shared.apply_mutation(&mutation)).await
    }

    /// Reload from disk now, publishing pending changes first
    ///
    /// Returns whether the live engine was replaced. `false` means the
    /// reload was deferred because local changes kept arriving, or was
    /// superseded by a waiter that gave up on it; a warning is logged in
    /// both cases and the live engine stays in use.
    ///
    /// # Errors
    /// `Reload` if neither the reload nor the fallback reconnect succeed;
    /// `Persistence` if pending changes could not be published.
    pub async fn reload_now(&self) -> Result<bool> {
        traced("reload_now", async {
            self.shared.ensure_connected("reload_now")?;
            self.shared.reload("reload_now").await
        })
        .await
    }

    /// Advisory hint that the file may have changed
    ///
    /// Runs the change check; returns whether a reload happened.
    ///
    /// # Errors
    /// As for [`reload_now`](Self::reload_now).
    pub async fn on_change_hint(&self) -> Result<bool> {
        traced("on_change_hint", async {
            self.shared.ensure_connected("on_change_hint")?;
            self.shared.check_external("on_change_hint").await
        })
        .await
    }

    /// Publish pending changes now and wait for the result
    ///
    /// # Errors
    /// `Persistence` if the publish gave up; the changes stay pending.
    pub async fn flush(&self) -> Result<()> {
        traced("flush", self.shared.flush_pending_saves()).await
    }

    /// Start (or restart) the debounce window for a publish
    pub fn schedule_save(&self) {
        self.shared.schedule_save();
    }

    pub fn is_dirty(&self) -> bool {
        self.shared.phase().is_dirty()
    }

    pub fn status(&self) -> StatusSnapshot {
        StatusSnapshot::from(&*self.shared.status.borrow())
    }

    /// Canonical path of the connected store
    pub fn store_path(&self) -> Option<PathBuf> {
        self.shared.canonical_path()
    }

    /// Flush pending changes and release the engine
    ///
    /// Idempotent; failures are logged, never returned.
    pub async fn dispose(&self) {
        if self.shared.disposed.swap(true, Ordering::SeqCst) {
            debug!("Board adapter already disposed");
            return;
        }
        self.shared.cancel_scheduled_save();
        let _ = traced("dispose", self.shared.shutdown()).await;
    }
}

impl std::fmt::Debug for BoardAdapter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("BoardAdapter")
            .field("phase", &self.shared.phase())
            .field("fs", &self.shared.fs)
            .field("cache", &self.shared.cache)
            .finish_non_exhaustive()
    }
}

impl Drop for BoardAdapter {
    fn drop(&mut self) {
        if self.shared.disposed.load(Ordering::SeqCst) {
            return;
        }
        if self.shared.phase().is_dirty() {
            warn!("Board adapter dropped with unpublished changes; call dispose() to flush them");
        }
    }
}
