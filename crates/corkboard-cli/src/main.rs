//! corkboard CLI
//!
//! Command-line interface for a corkboard issue board

use clap::{Parser, Subcommand};
use corkboard_core::logging_facility::{init, Profile};

mod commands;

#[derive(Debug, Parser)]
#[command(name = "corkboard")]
#[command(about = "corkboard - issue board over a SQLite record store", long_about = None)]
struct Cli {
    #[command(flatten)]
    global: commands::GlobalArgs,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Debug, Subcommand)]
enum Commands {
    /// Create a new, empty board store
    Init(commands::init::InitArgs),
    /// Show the board, one column per status
    Board(commands::board::BoardArgs),
    /// Show one issue with its comments and history
    Show(commands::board::ShowArgs),
    /// Create an issue
    Create(commands::issue::CreateArgs),
    /// Change fields of an issue
    Update(commands::issue::UpdateArgs),
    /// Move an issue to another status
    Status(commands::issue::StatusArgs),
    /// Add or remove labels
    Label(commands::issue::LabelArgs),
    /// Add or remove relations between issues
    Dep(commands::issue::DepArgs),
    /// Comment on an issue
    Comment(commands::issue::CommentArgs),
    /// Follow the store and report external changes
    Watch(commands::watch::WatchArgs),
}

#[tokio::main]
async fn main() {
    let cli = Cli::parse();

    init(if cli.global.log_json {
        Profile::Production
    } else {
        Profile::Development
    });

    let result = match cli.command {
        Commands::Init(args) => commands::init::execute(&cli.global, args),
        Commands::Board(args) => commands::board::execute_board(&cli.global, args).await,
        Commands::Show(args) => commands::board::execute_show(&cli.global, args).await,
        Commands::Create(args) => commands::issue::execute_create(&cli.global, args).await,
        Commands::Update(args) => commands::issue::execute_update(&cli.global, args).await,
        Commands::Status(args) => commands::issue::execute_status(&cli.global, args).await,
        Commands::Label(args) => commands::issue::execute_label(&cli.global, args).await,
        Commands::Dep(args) => commands::issue::execute_dep(&cli.global, args).await,
        Commands::Comment(args) => commands::issue::execute_comment(&cli.global, args).await,
        Commands::Watch(args) => commands::watch::execute(&cli.global, args).await,
    };

    if let Err(e) = result {
        eprintln!("Error: {}", e);
        std::process::exit(1);
    }
}
