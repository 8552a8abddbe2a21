pub mod board;
pub mod init;
pub mod issue;
pub mod watch;

use clap::Args;
use corkboard_core::errors::{BoardError, ErrorKind};
use corkboard_engine::{AdapterConfig, BoardAdapter};
use std::path::PathBuf;

pub type CliResult = Result<(), Box<dyn std::error::Error>>;

/// Options shared by every command
#[derive(Debug, Args)]
pub struct GlobalArgs {
    /// Board store file (default: discover .beads/*.db)
    #[arg(long, global = true)]
    pub db: Option<PathBuf>,

    /// TOML file with adapter settings
    #[arg(long, global = true)]
    pub config: Option<PathBuf>,

    /// Emit logs as JSON
    #[arg(long, global = true)]
    pub log_json: bool,
}

/// Adapter settings: config file first, then `--db` on top
pub fn load_config(global: &GlobalArgs) -> Result<AdapterConfig, BoardError> {
    let mut config = match &global.config {
        Some(path) => AdapterConfig::from_toml_file(path)?,
        None => AdapterConfig::default(),
    };
    if let Some(db) = &global.db {
        config.database = Some(db.clone());
    }
    Ok(config)
}

/// Adapter for the configured store, connected
pub async fn open(global: &GlobalArgs) -> Result<BoardAdapter, BoardError> {
    let adapter = BoardAdapter::new(load_config(global)?)?;
    adapter.connect().await?;
    Ok(adapter)
}

/// Dispose the adapter, failing if its changes could not be published
pub async fn close(adapter: BoardAdapter) -> Result<(), BoardError> {
    adapter.dispose().await;
    let status = adapter.status();
    match status.last_error {
        Some(reason) if status.is_dirty => Err(BoardError::new(ErrorKind::Persistence)
            .with_op("close")
            .with_message(format!("changes were not saved: {}", reason))),
        _ => Ok(()),
    }
}
