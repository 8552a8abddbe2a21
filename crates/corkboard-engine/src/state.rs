//! Persistence state machine
//!
//! The adapter's whole consistency state is one [`EngineStatus`] value held
//! in a `tokio::sync::watch` channel. Every transition is a single
//! `send_modify`/`send_if_modified`, so the phase and the timestamps it
//! depends on change together and waiters are woken instead of polling.
//!
//! ```text
//!          mutate                 debounce fires
//!  Idle ───────────▶ Dirty ───────────────────────▶ Saving ──▶ Idle
//!   │ ▲                ▲                              │
//!   │ │                └──────── publish failed ──────┘
//!   │ └──────────────┐
//!   └──▶ Reloading ──┘   (entered only from Idle, after a flush)
//! ```

use chrono::{DateTime, Utc};
use corkboard_core::errors::BoardError;
use corkboard_store::FileStamp;
use serde::Serialize;
use std::time::Instant;
use tokio::sync::watch;

/// Where the adapter is in its dirty/save/reload cycle
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    /// Engine content matches the last publish or load
    Idle,
    /// Engine holds mutations not yet published
    Dirty,
    /// A publish is in flight; `redirtied` records mutations applied meanwhile
    Saving { redirtied: bool },
    /// The engine is being replaced from disk
    Reloading { epoch: u64 },
}

impl Phase {
    pub fn name(&self) -> &'static str {
        match self {
            Self::Idle => "idle",
            Self::Dirty => "dirty",
            Self::Saving { .. } => "saving",
            Self::Reloading { .. } => "reloading",
        }
    }

    /// Unpublished mutations exist
    pub fn is_dirty(&self) -> bool {
        matches!(self, Self::Dirty | Self::Saving { .. })
    }

    pub fn is_saving(&self) -> bool {
        matches!(self, Self::Saving { .. })
    }

    pub fn is_reloading(&self) -> bool {
        matches!(self, Self::Reloading { .. })
    }
}

impl std::fmt::Display for Phase {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

/// Value carried by the status channel
#[derive(Debug, Clone)]
pub(crate) struct EngineStatus {
    pub phase: Phase,
    pub connected: bool,
    /// Stamp of the backing file as of the last load or publish
    pub last_known: Option<FileStamp>,
    /// Monotonic time of the last successful publish (self-save window)
    pub last_save_at: Option<Instant>,
    pub last_saved_wall: Option<DateTime<Utc>>,
    /// Set when a publish gives up; cleared by the next successful one
    pub last_error: Option<BoardError>,
    /// Incremented on every entry into `Reloading` and on forced resets
    pub epoch: u64,
    pub publishes: u64,
    pub reloads: u64,
}

impl EngineStatus {
    pub fn new() -> Self {
        Self {
            phase: Phase::Idle,
            connected: false,
            last_known: None,
            last_save_at: None,
            last_saved_wall: None,
            last_error: None,
            epoch: 0,
            publishes: 0,
            reloads: 0,
        }
    }

    /// Record a mutation applied to the live engine
    pub fn mark_dirty(&mut self) {
        self.phase = match self.phase {
            Phase::Saving { .. } => Phase::Saving { redirtied: true },
            _ => Phase::Dirty,
        };
    }
}

pub(crate) type StatusTx = watch::Sender<EngineStatus>;

/// Diagnostics view of the adapter's state
#[derive(Debug, Clone, Serialize)]
pub struct StatusSnapshot {
    pub phase: &'static str,
    pub connected: bool,
    pub is_dirty: bool,
    pub is_saving: bool,
    pub is_reloading: bool,
    pub last_saved_at: Option<DateTime<Utc>>,
    #[serde(skip)]
    pub last_known: Option<FileStamp>,
    pub last_error: Option<String>,
    pub publishes: u64,
    pub reloads: u64,
}

impl From<&EngineStatus> for StatusSnapshot {
    fn from(status: &EngineStatus) -> Self {
        Self {
            phase: status.phase.name(),
            connected: status.connected,
            is_dirty: status.phase.is_dirty(),
            is_saving: status.phase.is_saving(),
            is_reloading: status.phase.is_reloading(),
            last_saved_at: status.last_saved_wall,
            last_known: status.last_known,
            last_error: status.last_error.as_ref().map(ToString::to_string),
            publishes: status.publishes,
            reloads: status.reloads,
        }
    }
}

/// Restores `Dirty` if a publish exits without settling its phase
///
/// Covers early returns, panics and a cancelled save future. A publish
/// that completes settles the phase itself and calls [`disarm`](Self::disarm).
pub(crate) struct SavingGuard<'a> {
    status: &'a StatusTx,
    armed: bool,
}

impl<'a> SavingGuard<'a> {
    pub fn new(status: &'a StatusTx) -> Self {
        Self {
            status,
            armed: true,
        }
    }

    pub fn disarm(mut self) {
        self.armed = false;
    }
}

impl Drop for SavingGuard<'_> {
    fn drop(&mut self) {
        if !self.armed {
            return;
        }
        self.status.send_if_modified(|s| {
            if s.phase.is_saving() {
                s.phase = Phase::Dirty;
                true
            } else {
                false
            }
        });
    }
}

/// Releases `Reloading { epoch }` on every exit path of a reload
///
/// Only the reload that entered the phase can release it: if a timed-out
/// waiter already forced the state forward (new epoch), dropping the guard
/// leaves the current phase alone.
pub(crate) struct ReloadGuard<'a> {
    status: &'a StatusTx,
    epoch: u64,
}

impl<'a> ReloadGuard<'a> {
    pub fn new(status: &'a StatusTx, epoch: u64) -> Self {
        Self { status, epoch }
    }

    pub fn epoch(&self) -> u64 {
        self.epoch
    }

    /// Whether this reload still owns the phase
    pub fn is_current(&self) -> bool {
        self.status.borrow().phase == Phase::Reloading { epoch: self.epoch }
    }
}

impl Drop for ReloadGuard<'_> {
    fn drop(&mut self) {
        let epoch = self.epoch;
        self.status.send_if_modified(|s| {
            if s.phase == (Phase::Reloading { epoch }) {
                s.phase = Phase::Idle;
                true
            } else {
                false
            }
        });
    }
}
