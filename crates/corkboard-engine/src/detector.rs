//! External change detection and the reload protocol
//!
//! Other processes may rewrite the backing file at any time. There is no
//! cross-process lock: a rewrite is inferred from the file's stamp
//! (modification time and size) differing from the one recorded at the last
//! load or publish. A change that lands within the self-save window is
//! attributed to our own publish and ignored until the window closes.
//!
//! Known gap: an external rewrite that lands in the same instant as one of
//! our publishes can be overwritten by it or masked by the self-save window
//! and its stamp recorded as our own. Detection is reactive, not a lock.

use crate::adapter::{Connected, Shared};
use crate::state::{Phase, ReloadGuard};
use corkboard_core::errors::{BoardError, ErrorKind, Result};
use corkboard_store::errors::{io_error, store_name};
use corkboard_store::{FileStamp, SqliteEngine};
use std::path::PathBuf;
use std::time::Instant;
use tracing::{debug, error, info, warn};

/// Flush-then-enter rounds before a reload gives way to ongoing mutations
const RELOAD_ENTRY_ATTEMPTS: usize = 3;

impl Shared {
    /// The file differs from what we last loaded or published
    ///
    /// False when no previous stamp is known or the file is missing: a
    /// missing file is recreated by the next publish, not reloaded.
    pub(crate) fn has_changed_externally(&self, current: Option<FileStamp>) -> bool {
        let status = self.status.borrow();
        match (status.last_known, current) {
            (Some(known), Some(now)) => known != now,
            _ => false,
        }
    }

    /// A publish is running or finished within the self-save window
    pub(crate) fn is_recent_self_save(&self) -> bool {
        let status = self.status.borrow();
        status.phase.is_saving()
            || status
                .last_save_at
                .is_some_and(|at| at.elapsed() < self.config.self_save_guard())
    }

    /// The file changed since our last load or publish, and not by us
    fn external_change_pending(&self, op: &str) -> Result<bool> {
        let Some(path) = self.canonical_path() else {
            return Ok(false);
        };
        let current = self
            .fs
            .stamp(&path)
            .map_err(|e| io_error("stat_store", e))?;

        if !self.has_changed_externally(current) {
            return Ok(false);
        }
        if self.is_recent_self_save() {
            debug!(op, store = %store_name(&path), "Change within self-save window; reload suppressed");
            return Ok(false);
        }
        Ok(true)
    }

    /// Reload if the file changed and the change is not our own publish
    ///
    /// Waits are bounded by the reload wait cap: first for a reload already
    /// in flight, then for the reload lock. If the lock is still held when
    /// the cap runs out the change is left for a later call. The change is
    /// checked again once the lock is held, so a reload that finished in
    /// the meantime is not repeated. Returns whether a reload happened.
    pub(crate) async fn check_external(&self, op: &'static str) -> Result<bool> {
        self.wait_while_reloading(op).await;
        if !self.external_change_pending(op)? {
            return Ok(false);
        }

        let cap = self.config.reload_wait_cap();
        let Ok(_serial) = tokio::time::timeout(cap, self.reload_lock.lock()).await else {
            warn!(
                op,
                wait_ms = cap.as_millis() as u64,
                "Another reload still holds the store; serving the live engine"
            );
            return Ok(false);
        };
        if !self.external_change_pending(op)? {
            debug!(op, "External change already picked up by another reload");
            return Ok(false);
        }

        if let Some(path) = self.canonical_path() {
            info!(op, store = %store_name(&path), "Backing file changed externally");
        }
        self.reload_serialized(op).await
    }

    /// Replace the live engine with the file's current content
    ///
    /// Pending changes are published first. If the file cannot be loaded,
    /// falls back to connecting from scratch; if that fails too the adapter
    /// is left disconnected and `Reload` is returned. Returns whether the
    /// engine was replaced: false when local changes kept arriving or a
    /// timed-out waiter superseded this reload.
    pub(crate) async fn reload(&self, op: &'static str) -> Result<bool> {
        let _serial = self.reload_lock.lock().await;
        self.reload_serialized(op).await
    }

    /// Reload body; the caller holds `reload_lock`
    async fn reload_serialized(&self, op: &'static str) -> Result<bool> {
        let start = Instant::now();

        let mut entered = None;
        for _ in 0..RELOAD_ENTRY_ATTEMPTS {
            self.flush_pending_saves().await?;
            entered = self.try_enter_reload(op)?;
            if entered.is_some() {
                break;
            }
        }
        let Some((epoch, path)) = entered else {
            warn!(op, "Reload deferred: local changes keep arriving");
            return Ok(false);
        };

        let guard = ReloadGuard::new(&self.status, epoch);
        debug!(op, epoch, store = %store_name(&path), "Reloading board store");

        let loaded = self
            .fs
            .stamp(&path)
            .map_err(|e| io_error("stat_store", e))
            .and_then(|stamp| {
                let engine = SqliteEngine::load(&path)?;
                Ok((
                    Connected {
                        engine,
                        path: path.clone(),
                    },
                    stamp,
                ))
            });

        let (fresh, stamp) = match loaded {
            Ok(loaded) => loaded,
            Err(cause) => {
                warn!(
                    op,
                    epoch,
                    store = %store_name(&path),
                    err_code = cause.code(),
                    "Reload failed, reconnecting from scratch"
                );
                match self.open_store() {
                    Ok(reopened) => reopened,
                    Err(fallback) => {
                        self.disconnect_after_failed_reload(&guard);
                        let err = BoardError::new(ErrorKind::Reload)
                            .with_op(op)
                            .with_message("board store could not be reopened")
                            .with_source(fallback);
                        error!(op, epoch, err_code = err.code(), "{}", err);
                        return Err(err);
                    }
                }
            }
        };

        let installed = self.install_reloaded(&guard, fresh, stamp);
        if installed {
            info!(
                op,
                epoch,
                duration_ms = start.elapsed().as_millis() as u64,
                "Reloaded board store"
            );
        }
        Ok(installed)
    }

    /// Enter `Reloading` from `Idle` under the engine lock
    fn try_enter_reload(&self, op: &str) -> Result<Option<(u64, PathBuf)>> {
        let slot = self.engine.lock();
        let Some(connected) = slot.as_ref() else {
            return Err(BoardError::new(ErrorKind::Connection)
                .with_op(op)
                .with_message("not connected to a board store"));
        };

        let mut epoch = None;
        self.status.send_if_modified(|s| {
            if s.phase != Phase::Idle {
                return false;
            }
            s.epoch += 1;
            s.phase = Phase::Reloading { epoch: s.epoch };
            epoch = Some(s.epoch);
            true
        });
        Ok(epoch.map(|epoch| (epoch, connected.path.clone())))
    }

    /// Swap in the reloaded engine unless a timed-out waiter moved on
    fn install_reloaded(
        &self,
        guard: &ReloadGuard<'_>,
        fresh: Connected,
        stamp: Option<FileStamp>,
    ) -> bool {
        let mut slot = self.engine.lock();
        if !guard.is_current() {
            warn!(
                epoch = guard.epoch(),
                "Reload superseded by a forced reset; keeping the live engine"
            );
            return false;
        }

        let previous = slot.replace(fresh);
        self.status.send_modify(|s| {
            s.connected = true;
            s.last_known = stamp;
            s.reloads += 1;
            s.phase = Phase::Idle;
        });
        self.cache.invalidate();
        drop(slot);

        if let Some(old) = previous {
            if let Err(err) = old.engine.close() {
                debug!(err_code = err.code(), "Replaced engine did not close cleanly");
            }
        }
        true
    }

    fn disconnect_after_failed_reload(&self, guard: &ReloadGuard<'_>) {
        let mut slot = self.engine.lock();
        if !guard.is_current() {
            return;
        }
        let previous = slot.take();
        self.status.send_modify(|s| {
            s.connected = false;
            s.last_known = None;
            s.phase = Phase::Idle;
        });
        self.cache.invalidate();
        drop(slot);

        if let Some(old) = previous {
            let _ = old.engine.close();
        }
    }

    /// Bounded wait for an in-flight reload to finish
    ///
    /// Woken by the status channel rather than polling. When the cap
    /// (`reload_wait_interval_ms` times `reload_wait_max_attempts`) is
    /// reached the reload is presumed stuck: the phase is forced back to
    /// `Idle` under a new epoch, a warning is logged and the caller
    /// proceeds. The stuck reload notices the new epoch and discards its
    /// result instead of overwriting what the caller did.
    pub(crate) async fn wait_while_reloading(&self, op: &str) {
        let mut rx = self.status.subscribe();
        let epoch = match rx.borrow_and_update().phase {
            Phase::Reloading { epoch } => epoch,
            _ => return,
        };

        let cap = self.config.reload_wait_cap();
        let finished = tokio::time::timeout(cap, rx.wait_for(|s| !s.phase.is_reloading()))
            .await
            .is_ok();
        if finished {
            return;
        }

        let forced = self.status.send_if_modified(|s| {
            if s.phase != (Phase::Reloading { epoch }) {
                return false;
            }
            s.epoch += 1;
            s.phase = Phase::Idle;
            true
        });
        if forced {
            let err = BoardError::new(ErrorKind::StuckState)
                .with_op(op)
                .with_message(format!(
                    "reload did not finish within {} ms; state forced back to idle",
                    cap.as_millis()
                ));
            warn!(op, epoch, err_code = err.code(), "{}", err.message());
        }
    }
}
