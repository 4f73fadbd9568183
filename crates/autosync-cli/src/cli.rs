//! CLI argument parsing using clap derive

use std::path::PathBuf;

use clap::{Parser, Subcommand};

/// autosync - Keep a working directory synchronized with its git remote
#[derive(Parser, Debug)]
#[command(name = "autosync")]
#[command(author, version, about, long_about = None)]
pub struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    pub verbose: bool,

    /// Working directory to operate on
    #[arg(short = 'C', long = "dir", global = true, default_value = ".", env = "AUTOSYNC_DIR")]
    pub dir: PathBuf,

    /// The command to run
    #[command(subcommand)]
    pub command: Option<Commands>,
}

/// Available commands
#[derive(Subcommand, Debug, Clone, PartialEq, Eq)]
pub enum Commands {
    /// Watch the directory and synchronize continuously
    ///
    /// Saved files are committed and pushed after a quiet period, and the
    /// remote is pulled on a randomized interval. Stop with Ctrl-C.
    Watch,

    /// Commit, pull and push once
    Sync,

    /// Show synchronization status
    Status {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List files with unresolved conflict markers
    Conflicts {
        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// Show commit history
    Log {
        /// Maximum number of commits to show
        #[arg(short = 'n', long, default_value_t = 20)]
        limit: usize,

        /// Number of most recent commits to skip
        #[arg(long, default_value_t = 0)]
        offset: usize,

        /// Output as JSON for scripting
        #[arg(long)]
        json: bool,
    },

    /// List files changed by a revision
    Show {
        /// Revision to inspect
        #[arg(default_value = "HEAD")]
        revision: String,
    },

    /// Show effective settings
    Config {
        /// Write a default settings file into the working directory
        #[arg(long)]
        init: bool,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_log_options() {
        let cli = Cli::parse_from(["autosync", "log", "-n", "5", "--offset", "10", "--json"]);
        assert_eq!(
            cli.command,
            Some(Commands::Log {
                limit: 5,
                offset: 10,
                json: true
            })
        );
    }

    #[test]
    fn global_dir_flag_after_subcommand() {
        let cli = Cli::parse_from(["autosync", "status", "-C", "/tmp/notes"]);
        assert_eq!(cli.dir, PathBuf::from("/tmp/notes"));
    }

    #[test]
    fn show_defaults_to_head() {
        let cli = Cli::parse_from(["autosync", "show"]);
        assert_eq!(
            cli.command,
            Some(Commands::Show {
                revision: "HEAD".to_string()
            })
        );
    }

    #[test]
    fn verify_cli() {
        use clap::CommandFactory;
        Cli::command().debug_assert();
    }
}
