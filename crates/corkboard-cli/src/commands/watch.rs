//! Follow the store and print the board when another writer changes it

use super::{close, open, CliResult, GlobalArgs};
use clap::Args;
use corkboard_core::errors::{BoardError, ErrorKind};
use std::time::Duration;

#[derive(Debug, Args)]
pub struct WatchArgs {
    /// Polling interval in milliseconds
    #[arg(long, default_value_t = 1000)]
    pub interval_ms: u64,

    /// Stop after this many detected changes
    #[arg(long)]
    pub count: Option<u32>,
}

/// Failures after which local state is intact and the next tick retries
fn is_transient(err: &BoardError) -> bool {
    matches!(err.kind(), ErrorKind::Persistence | ErrorKind::StuckState)
}

pub async fn execute(global: &GlobalArgs, args: WatchArgs) -> CliResult {
    let adapter = open(global).await?;
    if let Some(path) = adapter.store_path() {
        println!("Watching {}", path.display());
    }

    let mut ticker = tokio::time::interval(Duration::from_millis(args.interval_ms.max(1)));
    let mut seen = 0u32;
    let outcome: CliResult = loop {
        tokio::select! {
            _ = tokio::signal::ctrl_c() => break Ok(()),
            _ = ticker.tick() => {}
        }

        match adapter.on_change_hint().await {
            Ok(true) => {
                let board = match adapter.get_board().await {
                    Ok(board) => board,
                    Err(e) => break Err(e.into()),
                };
                seen += 1;
                tracing::info!(issues = board.len(), seen, "External change picked up");
                println!("Store changed: {} issues", board.len());
                if args.count.is_some_and(|limit| seen >= limit) {
                    break Ok(());
                }
            }
            Ok(false) => {}
            Err(e) if is_transient(&e) => {
                tracing::warn!(err_code = e.code(), "Change check deferred: {}", e);
            }
            Err(e) => break Err(e.into()),
        }
    };

    close(adapter).await?;
    outcome
}
