//! Error handling for corkboard-store
//!
//! Wraps the core BoardError with store-specific helpers

use corkboard_core::errors::{BoardError, ErrorKind};
use std::path::Path;

/// Result type alias using BoardError
pub type Result<T> = std::result::Result<T, BoardError>;

/// Name of a backing file safe to show outside the process (no directories)
pub fn store_name(path: &Path) -> String {
    path.file_name()
        .map(|n| n.to_string_lossy().into_owned())
        .unwrap_or_else(|| "<store>".to_string())
}

/// Create a connection error for a backing file
pub fn connection_error(path: &Path, reason: &str) -> BoardError {
    BoardError::new(ErrorKind::Connection)
        .with_op("connect")
        .with_message(format!("{}: {}", store_name(path), reason))
}

/// Create a not-found error for an issue id
pub fn issue_not_found(issue_id: &str) -> BoardError {
    BoardError::new(ErrorKind::NotFound)
        .with_entity_id(issue_id)
        .with_message("Issue not found")
}

/// Create a migration error
pub fn migration_error(migration_id: &str, reason: &str) -> BoardError {
    BoardError::new(ErrorKind::Store)
        .with_op("migration")
        .with_entity_id(migration_id)
        .with_message(format!("Migration {} failed: {}", migration_id, reason))
}

/// Create a database error from rusqlite::Error
pub fn from_rusqlite(err: rusqlite::Error) -> BoardError {
    BoardError::new(ErrorKind::Store)
        .with_op("sqlite")
        .with_message(err.to_string())
}

/// Create an IO error
pub fn io_error(operation: &str, err: std::io::Error) -> BoardError {
    BoardError::new(ErrorKind::Io)
        .with_op(operation.to_string())
        .with_message(err.to_string())
}
