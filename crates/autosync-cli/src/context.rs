//! Workspace resolution shared by all commands

use std::path::{Path, PathBuf};
use std::sync::Arc;

use autosync_core::{SharedSettings, SyncOrchestrator, SyncSettings};
use autosync_vcs::{GitCli, repository_root};

use crate::console::ConsoleReporter;
use crate::error::{CliError, Result};

/// A working directory with its settings and sync engine.
pub struct Workspace {
    pub root: PathBuf,
    pub settings: Arc<SharedSettings>,
    pub vcs: Arc<GitCli>,
    pub reporter: Arc<ConsoleReporter>,
    pub orchestrator: Arc<SyncOrchestrator>,
}

impl Workspace {
    /// Open the workspace containing `dir`.
    ///
    /// Inside a repository the root is the repository top level, so that
    /// paths reported by git line up with paths on disk.
    pub fn open(dir: &Path) -> Result<Self> {
        let root = resolve_root(dir)?;
        let settings = SyncSettings::load(&root)?;
        Ok(Self::with_settings(root, settings))
    }

    pub fn with_settings(root: PathBuf, settings: SyncSettings) -> Self {
        let vcs = Arc::new(GitCli::new(
            root.clone(),
            settings.remote.clone(),
            settings.command_timeout(),
        ));
        let settings = Arc::new(SharedSettings::new(settings));
        let reporter = Arc::new(ConsoleReporter::new());

        let orchestrator = SyncOrchestrator::new(root.clone(), vcs.clone(), settings.clone())
            .with_status_sink(reporter.clone())
            .with_notifier(reporter.clone());

        Self {
            root,
            settings,
            vcs,
            reporter,
            orchestrator: Arc::new(orchestrator),
        }
    }
}

/// Canonical root for `dir`: the enclosing repository top level if any
pub fn resolve_root(dir: &Path) -> Result<PathBuf> {
    let dir = dir
        .canonicalize()
        .map_err(|e| CliError::user(format!("Cannot open {}: {}", dir.display(), e)))?;
    if !dir.is_dir() {
        return Err(CliError::user(format!("Not a directory: {}", dir.display())));
    }
    Ok(repository_root(&dir)
        .and_then(|root| root.canonicalize().ok())
        .unwrap_or(dir))
}
