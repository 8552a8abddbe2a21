//! Persistence controller: debounced, atomic publish of the live engine.
//!
//! A publish stages the engine's full content into `<path>.tmp` and renames
//! it onto the canonical path. Rename failures (another process holding the
//! file) are retried with exponential backoff; when the attempts run out the
//! changes stay pending and the failure is surfaced.

use crate::adapter::Shared;
use crate::config::AdapterConfig;
use crate::state::{Phase, SavingGuard};
use chrono::Utc;
use corkboard_core::errors::{BoardError, ErrorKind, Result};
use corkboard_core::types::PublishId;
use corkboard_store::errors::{io_error, store_name};
use corkboard_store::publish;
use std::path::Path;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::runtime::Handle;
use tracing::{debug, error, info, warn};

/// Backoff schedule for the rename step of a publish
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub initial_delay: Duration,
    pub max_delay: Duration,
}

impl RetryPolicy {
    pub fn from_config(config: &AdapterConfig) -> Self {
        Self {
            max_attempts: config.publish_max_attempts,
            initial_delay: Duration::from_millis(config.publish_initial_backoff_ms),
            max_delay: Duration::from_millis(config.publish_max_backoff_ms),
        }
    }

    /// Delay after the given failed attempt (1-based), doubling up to the cap
    pub fn delay_after(&self, attempt: u32) -> Duration {
        let factor = 2u32.saturating_pow(attempt.saturating_sub(1));
        self.initial_delay
            .saturating_mul(factor)
            .min(self.max_delay)
    }
}

impl Shared {
    /// Cancel any pending timer and start a new quiet window
    ///
    /// When the window elapses the save is handed to its own task, so a
    /// later cancel only ever lands on a timer that has not fired.
    pub(crate) fn schedule_save(self: &Arc<Self>) {
        let Ok(runtime) = Handle::try_current() else {
            warn!("No async runtime available; save not scheduled");
            return;
        };

        let shared = Arc::clone(self);
        let delay = self.config.debounce();
        let timer = runtime.spawn(async move {
            tokio::time::sleep(delay).await;
            tokio::spawn(async move {
                // Failures are logged and recorded in the status
                let _ = shared.save().await;
            });
        });

        if let Some(previous) = self.debounce.lock().replace(timer) {
            previous.abort();
        }
    }

    pub(crate) fn cancel_scheduled_save(&self) {
        if let Some(timer) = self.debounce.lock().take() {
            timer.abort();
        }
    }

    /// Publish if dirty; waits for any publish already running
    pub(crate) async fn save(&self) -> Result<()> {
        let _serial = self.save_lock.lock().await;
        self.publish_locked().await
    }

    /// Publish pending changes before a reload or close
    ///
    /// Cancels the pending timer and publishes now. A publish already in
    /// flight is waited on for at most `save_wait_ms`.
    pub(crate) async fn flush_pending_saves(&self) -> Result<()> {
        self.cancel_scheduled_save();

        let wait = self.config.save_wait();
        let Ok(_serial) = tokio::time::timeout(wait, self.save_lock.lock()).await else {
            let err = BoardError::new(ErrorKind::StuckState)
                .with_op("flush")
                .with_message(format!(
                    "in-flight save did not finish within {} ms",
                    wait.as_millis()
                ));
            warn!(err_code = err.code(), "{}", err.message());
            return Err(err);
        };

        self.publish_locked().await
    }

    /// One publish; the caller holds `save_lock`
    async fn publish_locked(&self) -> Result<()> {
        let began = self.status.send_if_modified(|s| {
            if s.phase == Phase::Dirty {
                s.phase = Phase::Saving { redirtied: false };
                true
            } else {
                false
            }
        });
        if !began {
            return Ok(());
        }

        let guard = SavingGuard::new(&self.status);
        let publish_id = PublishId::new();
        let start = Instant::now();

        let staged = self.with_engine("save", |c| {
            let tmp = publish::stage(self.fs.as_ref(), &c.engine, &c.path)?;
            Ok((tmp, c.path.clone()))
        });
        let (tmp, canonical) = match staged {
            Ok(paths) => paths,
            Err(cause) => return Err(self.publish_failed(guard, cause, &publish_id)),
        };

        let attempts = match self.commit_with_retry(&tmp, &canonical, &publish_id).await {
            Ok(attempts) => attempts,
            Err(cause) => {
                if let Err(err) = publish::discard(self.fs.as_ref(), &tmp) {
                    warn!(publish_id = %publish_id, err_code = err.code(), "Temporary file left behind");
                }
                return Err(self.publish_failed(guard, cause, &publish_id));
            }
        };

        let stamp = match self.fs.stamp(&canonical) {
            Ok(stamp) => stamp,
            Err(e) => {
                warn!(publish_id = %publish_id, error = %e, "Could not stat published file");
                None
            }
        };

        // Stamp, save time and phase move together: a change check can never
        // see the new mtime without the self-save window already open.
        // Mutations applied meanwhile armed their own debounce timer.
        let now = Instant::now();
        self.status.send_modify(|s| {
            if stamp.is_some() {
                s.last_known = stamp;
            }
            s.last_save_at = Some(now);
            s.last_saved_wall = Some(Utc::now());
            s.last_error = None;
            s.publishes += 1;
            s.phase = match s.phase {
                Phase::Saving { redirtied: true } => Phase::Dirty,
                _ => Phase::Idle,
            };
        });
        guard.disarm();

        info!(
            publish_id = %publish_id,
            store = %store_name(&canonical),
            attempt = attempts,
            duration_ms = start.elapsed().as_millis() as u64,
            "Published board store"
        );
        Ok(())
    }

    /// Rename with exponential backoff; returns the attempt that succeeded
    async fn commit_with_retry(
        &self,
        tmp: &Path,
        canonical: &Path,
        publish_id: &PublishId,
    ) -> Result<u32> {
        let policy = RetryPolicy::from_config(&self.config);
        let mut attempt = 1;

        loop {
            match publish::commit(self.fs.as_ref(), tmp, canonical) {
                Ok(()) => {
                    if attempt > 1 {
                        debug!(publish_id = %publish_id, attempt, "Rename succeeded after retry");
                    }
                    return Ok(attempt);
                }
                Err(e) if attempt >= policy.max_attempts => {
                    let reason = format!("rename failed after {} attempts: {}", attempt, e);
                    return Err(io_error("rename", e).with_message(reason));
                }
                Err(e) => {
                    let delay = policy.delay_after(attempt);
                    warn!(
                        publish_id = %publish_id,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %e,
                        "Rename failed, retrying"
                    );
                    tokio::time::sleep(delay).await;
                    attempt += 1;
                }
            }
        }
    }

    /// Keep the changes pending and record the failure
    fn publish_failed(
        &self,
        guard: SavingGuard<'_>,
        cause: BoardError,
        publish_id: &PublishId,
    ) -> BoardError {
        let err = BoardError::new(ErrorKind::Persistence)
            .with_op("save")
            .with_message("changes could not be published and remain pending")
            .with_source(cause);

        self.status.send_modify(|s| {
            s.phase = Phase::Dirty;
            s.last_error = Some(err.clone());
        });
        guard.disarm();

        error!(publish_id = %publish_id, err_code = err.code(), "Publish failed: {}", err);
        err
    }
}
