//! corkboard engine - keeps the in-memory board consistent with its file
//!
//! This crate provides:
//! - `BoardAdapter`, the facade over the live engine (connect, reads,
//!   mutations, reload, dispose)
//! - The persistence controller: debounced, atomic publish with retry
//! - External change detection with self-save suppression and reload
//! - The TTL snapshot cache for the board read-model
//! - `AdapterConfig`, loadable from TOML

pub mod adapter;
pub mod backend;
pub mod cache;
pub mod config;
mod detector;
pub mod persistence;
pub mod state;

// Re-export key types
pub use adapter::BoardAdapter;
pub use backend::BoardBackend;
pub use cache::SnapshotCache;
pub use config::AdapterConfig;
pub use corkboard_core::errors::{BoardError, ErrorKind, Result};
pub use persistence::RetryPolicy;
pub use state::{Phase, StatusSnapshot};
