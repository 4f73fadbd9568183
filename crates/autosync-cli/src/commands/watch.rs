//! Watch command implementation

use std::path::Path;
use std::sync::Arc;

use autosync_core::{ChangeDebouncer, SettingsSource, SyncStatus};
use colored::Colorize;

use crate::context::Workspace;
use crate::error::{CliError, Result};
use crate::watcher::SaveWatcher;

/// Synchronize continuously until interrupted
pub async fn run_watch(dir: &Path) -> Result<()> {
    let workspace = Workspace::open(dir)?;
    let orchestrator = Arc::clone(&workspace.orchestrator);

    let status = orchestrator.initialize().await;
    if status == SyncStatus::Inapplicable {
        return Err(CliError::user(format!(
            "Synchronization is not available in {} (not a git repository?)",
            workspace.root.display()
        )));
    }
    if !workspace.settings.current().auto_sync {
        println!(
            "{} auto_sync is off in settings; enabling it for this session",
            "note:".cyan()
        );
        orchestrator.start_auto_sync();
    }

    let debouncer = ChangeDebouncer::new(Arc::clone(&orchestrator), orchestrator.puller());
    let (watcher, saves) = SaveWatcher::start(&workspace.root)?;
    let listener = tokio::spawn(Arc::clone(&debouncer).listen(saves));

    println!(
        "{} {} (press {} to stop)",
        "Watching".green().bold(),
        watcher.root().display(),
        "Ctrl-C".cyan()
    );

    tokio::signal::ctrl_c().await?;
    println!();
    tracing::info!("Interrupted, shutting down");

    drop(watcher);
    listener.abort();
    orchestrator.scheduler().cancel_all();

    let pending = debouncer.pending();
    if !pending.is_empty() {
        println!("Committing {} pending change(s)", pending.len());
        debouncer.on_quiet().await;
        orchestrator.scheduler().cancel_all();
    }

    Ok(())
}
