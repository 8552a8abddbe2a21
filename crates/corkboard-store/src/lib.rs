//! corkboard store - the record store behind the board
//!
//! Provides:
//! - `SqliteEngine`, the embedded engine holding the live in-memory copy
//! - The board schema with a migrations framework
//! - Repository layer executing mutations and assembling the read-model
//! - Publish primitives (stage to `<path>.tmp`, rename onto the canonical path)
//! - The `BackingFs` seam and store discovery

pub mod bootstrap;
pub mod db;
pub mod engine;
pub mod errors;
pub mod fs;
pub mod locate;
pub mod migrations;
pub mod publish;
pub mod repo;

// Re-export key types
pub use bootstrap::init_database;
pub use engine::SqliteEngine;
pub use errors::Result;
pub use fs::{BackingFs, FileStamp, StdFs};
pub use locate::locate_store;
