//! autosync CLI
//!
//! Keeps a working directory synchronized with its git remote: saved files
//! are committed and pushed after a quiet period, remote changes are pulled
//! periodically.

mod cli;
mod commands;
mod console;
mod context;
mod error;
mod logging;
mod watcher;

use clap::Parser;
use colored::Colorize;

use cli::{Cli, Commands};
use error::Result;

#[tokio::main]
async fn main() {
    if let Err(e) = run().await {
        eprintln!("{}: {}", "error".red().bold(), e);
        std::process::exit(1);
    }
}

async fn run() -> Result<()> {
    let cli = Cli::parse();

    if let Err(e) = logging::init(cli.verbose) {
        eprintln!("{}: logging unavailable: {}", "warning".yellow().bold(), e);
    }
    tracing::debug!(dir = %cli.dir.display(), "Starting");

    match cli.command {
        Some(cmd) => execute_command(cmd, &cli.dir).await,
        None => {
            println!("{} keep a directory in sync with git", "autosync".green().bold());
            println!();
            println!("Run {} for available commands.", "autosync --help".cyan());
            Ok(())
        }
    }
}

async fn execute_command(cmd: Commands, dir: &std::path::Path) -> Result<()> {
    match cmd {
        Commands::Watch => commands::run_watch(dir).await,
        Commands::Sync => commands::run_sync(dir).await,
        Commands::Status { json } => commands::run_status(dir, json).await,
        Commands::Conflicts { json } => commands::run_conflicts(dir, json).await,
        Commands::Log {
            limit,
            offset,
            json,
        } => commands::run_log(dir, limit, offset, json).await,
        Commands::Show { revision } => commands::run_show(dir, &revision).await,
        Commands::Config { init } => commands::run_config(dir, init),
    }
}
