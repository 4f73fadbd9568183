//! Status command implementation
//!
//! A read-only inspection: unlike the sync engine's start-up check it never
//! initializes the repository.

use std::path::Path;

use autosync_core::{SettingsSource, SyncSettings, SyncStatus};
use autosync_vcs::Vcs;
use colored::Colorize;
use serde::Serialize;

use crate::console::paint;
use crate::context::Workspace;
use crate::error::Result;

/// Snapshot printed by `autosync status`
#[derive(Debug, Serialize)]
pub struct StatusReport {
    pub root: String,
    pub status: SyncStatus,
    pub auto_sync: bool,
    pub remote: Option<String>,
    pub uncommitted_changes: bool,
    pub conflicts: usize,
    pub settings_file: Option<String>,
}

/// Run the status command
pub async fn run_status(dir: &Path, json: bool) -> Result<()> {
    let workspace = Workspace::open(dir)?;
    let report = inspect(&workspace).await;

    if json {
        println!("{}", serde_json::to_string_pretty(&report)?);
        return Ok(());
    }

    println!("{}", "Sync Status".bold());
    println!();
    println!("{}:      {}", "Path".dimmed(), report.root);
    println!("{}:    {}", "Status".dimmed(), paint(report.status));
    let auto_sync = if report.auto_sync {
        "on".green()
    } else {
        "off".yellow()
    };
    println!("{}: {}", "Auto-sync".dimmed(), auto_sync);

    if report.status == SyncStatus::Inapplicable {
        println!();
        println!("{}", "Not under version control".yellow());
        println!("Run {} to start tracking this directory.", "git init".cyan());
        return Ok(());
    }

    match &report.remote {
        Some(remote) => println!("{}:    {}", "Remote".dimmed(), remote.cyan()),
        None => println!("{}:    {}", "Remote".dimmed(), "none".dimmed()),
    }
    let changes = if report.uncommitted_changes {
        "uncommitted changes".yellow()
    } else {
        "clean".green()
    };
    println!("{}:   {}", "Changes".dimmed(), changes);
    if report.conflicts > 0 {
        println!(
            "{}: {} (run {})",
            "Conflicts".dimmed(),
            report.conflicts.to_string().red(),
            "autosync conflicts".cyan()
        );
    }
    match &report.settings_file {
        Some(path) => println!("{}:  {}", "Settings".dimmed(), path),
        None => println!(
            "{}:  {} (run {})",
            "Settings".dimmed(),
            "defaults".dimmed(),
            "autosync config --init".cyan()
        ),
    }

    Ok(())
}

async fn inspect(workspace: &Workspace) -> StatusReport {
    let settings: SyncSettings = workspace.settings.current();
    let vcs = workspace.vcs.as_ref();

    let mut report = StatusReport {
        root: workspace.root.display().to_string(),
        status: SyncStatus::Inapplicable,
        auto_sync: settings.auto_sync,
        remote: None,
        uncommitted_changes: false,
        conflicts: 0,
        settings_file: SyncSettings::locate(&workspace.root)
            .map(|path| path.display().to_string()),
    };

    if !vcs.is_available().await || !vcs.has_local_repository(&workspace.root).await {
        return report;
    }

    let has_remote = vcs.has_remote().await.unwrap_or_else(|e| {
        tracing::debug!(error = %e, "Remote lookup failed");
        false
    });
    if has_remote {
        report.status = SyncStatus::Enabled;
        report.remote = Some(settings.remote.clone());
    } else {
        report.status = SyncStatus::LocalOnly;
    }

    report.uncommitted_changes = vcs.has_uncommitted_changes().await.unwrap_or(false);
    report.conflicts = vcs
        .list_conflicted_files()
        .await
        .map(|files| files.len())
        .unwrap_or(0);

    tracing::debug!(?report, "Status inspected");
    report
}

#[cfg(test)]
mod tests {
    use super::*;
    use autosync_test_utils::{RemoteSetup, init_repo};
    use tempfile::TempDir;

    fn workspace(root: &Path) -> Workspace {
        Workspace::with_settings(root.canonicalize().unwrap(), SyncSettings::default())
    }

    #[tokio::test]
    async fn plain_directory_is_inapplicable() {
        let temp = TempDir::new().unwrap();
        let report = inspect(&workspace(temp.path())).await;
        assert_eq!(report.status, SyncStatus::Inapplicable);
        assert!(report.remote.is_none());
    }

    #[tokio::test]
    async fn repository_without_remote_is_local_only() {
        let temp = TempDir::new().unwrap();
        init_repo(temp.path());
        std::fs::write(temp.path().join("draft.md"), "text").unwrap();

        let report = inspect(&workspace(temp.path())).await;
        assert_eq!(report.status, SyncStatus::LocalOnly);
        assert!(report.uncommitted_changes);
    }

    #[tokio::test]
    async fn clone_reports_its_remote() {
        let setup = RemoteSetup::new();
        let report = inspect(&workspace(&setup.alice())).await;
        assert_eq!(report.status, SyncStatus::Enabled);
        assert_eq!(report.remote.as_deref(), Some("origin"));
        assert!(!report.uncommitted_changes);
        assert_eq!(report.conflicts, 0);
    }
}
