//! Terminal reporter for status changes and notifications

use std::sync::atomic::{AtomicUsize, Ordering};

use autosync_core::{Notifier, StatusSink, SyncStatus};
use colored::{ColoredString, Colorize};

/// Prints status changes to stdout and notifications to stderr.
#[derive(Debug, Default)]
pub struct ConsoleReporter {
    errors: AtomicUsize,
}

impl ConsoleReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of error notifications shown so far
    pub fn error_count(&self) -> usize {
        self.errors.load(Ordering::SeqCst)
    }

    fn error(&self, message: &str) {
        self.errors.fetch_add(1, Ordering::SeqCst);
        eprintln!("{}: {}", "error".red().bold(), message);
    }

    fn warning(&self, message: &str) {
        eprintln!("{}: {}", "warning".yellow().bold(), message);
    }
}

/// Colored label of a status
pub fn paint(status: SyncStatus) -> ColoredString {
    let label = status.to_string();
    match status {
        SyncStatus::Enabled | SyncStatus::SyncComplete => label.green(),
        SyncStatus::Syncing => label.cyan(),
        SyncStatus::LocalOnly | SyncStatus::SyncCompleteWithConflicts => label.yellow(),
        SyncStatus::Offline => label.red(),
        SyncStatus::Inapplicable => label.dimmed(),
    }
}

impl StatusSink for ConsoleReporter {
    fn set_status(&self, status: SyncStatus) {
        println!("{} {}", "status".dimmed(), paint(status));
    }

    fn set_auto_sync(&self, enabled: bool) {
        tracing::debug!(enabled, "Auto-sync toggled");
    }

    fn show_transient(&self, message: &str) {
        println!("{} {}", "→".cyan(), message);
    }
}

impl Notifier for ConsoleReporter {
    fn tool_not_found(&self) {
        self.error("git executable not found; install git to enable synchronization");
    }

    fn no_remote(&self) {
        self.warning("no remote configured; changes are committed locally only");
    }

    fn network_retry(&self, attempt: u32) {
        self.warning(&format!("network unavailable, retrying (attempt {attempt})"));
    }

    fn network_offline(&self) {
        self.error("network unavailable; working offline until the next successful pull");
    }

    fn generic_error(&self, message: &str) {
        self.error(&format!("sync failed: {message}"));
    }

    fn conflicts_detected(&self, count: usize) {
        let noun = if count == 1 { "file" } else { "files" };
        self.warning(&format!(
            "{count} {noun} with conflict markers; run {} to list them",
            "autosync conflicts".cyan()
        ));
    }
}
