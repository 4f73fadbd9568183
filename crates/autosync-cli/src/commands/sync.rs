//! Sync command implementation

use std::path::Path;

use autosync_core::{SyncSettings, SyncStatus};
use colored::Colorize;

use crate::console::paint;
use crate::context::{Workspace, resolve_root};
use crate::error::{CliError, Result};

/// Run a single commit, pull and push cycle
pub async fn run_sync(dir: &Path) -> Result<()> {
    let root = resolve_root(dir)?;
    let mut settings = SyncSettings::load(&root)?;
    // One-shot run: keep the poll timer disarmed
    settings.auto_sync = false;

    let workspace = Workspace::with_settings(root, settings);
    let orchestrator = &workspace.orchestrator;

    if orchestrator.initialize().await == SyncStatus::Inapplicable {
        return Err(CliError::user(format!(
            "Synchronization is not available in {} (not a git repository?)",
            workspace.root.display()
        )));
    }

    let status = orchestrator.full_sync().await;
    if status == SyncStatus::Offline {
        return Err(CliError::user(
            "Remote unreachable; changes are kept in local commits",
        ));
    }
    if workspace.reporter.error_count() > 0 {
        return Err(CliError::user("Sync did not complete"));
    }

    println!("{} {}", "Done:".green().bold(), paint(status));
    Ok(())
}
