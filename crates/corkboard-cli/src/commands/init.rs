//! Store creation command
//!
//! Usage: corkboard init [--prefix <PREFIX>] [--db <PATH>]

use super::{load_config, CliResult, GlobalArgs};
use clap::Args;
use corkboard_store::init_database;
use corkboard_store::locate::{STORE_DIR, STORE_EXTENSION};

#[derive(Debug, Args)]
pub struct InitArgs {
    /// Prefix for issue ids (e.g. "web" gives web-1a2b3c)
    #[arg(long, default_value = "bd")]
    pub prefix: String,
}

/// Create the store at `--db`, or `.beads/issues.db` under the search root
pub fn execute(global: &GlobalArgs, args: InitArgs) -> CliResult {
    let config = load_config(global)?;
    let path = config.database.clone().unwrap_or_else(|| {
        config
            .search_root
            .join(STORE_DIR)
            .join(format!("issues.{}", STORE_EXTENSION))
    });

    init_database(&path, &args.prefix)?;
    println!("Initialized board store at {}", path.display());
    Ok(())
}
