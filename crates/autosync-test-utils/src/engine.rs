//! [`TestEngine`] wires a full engine around a [`ScriptedVcs`].

use std::fs;
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

use autosync_core::{ChangeDebouncer, SharedSettings, SyncOrchestrator, SyncSettings};
use tempfile::TempDir;

use crate::reporter::RecordingReporter;
use crate::scripted::ScriptedVcs;

/// Orchestrator plus debouncer over scripted collaborators.
///
/// The root is a fresh temporary directory, so conflict scans read real
/// files. Conflicting merges scripted on [`ScriptedVcs`] write there.
///
/// # Example
///
/// ```rust,no_run
/// # async fn demo() {
/// use autosync_test_utils::{ScriptedVcs, TestEngine};
///
/// let engine = TestEngine::new(ScriptedVcs::new());
/// engine.orchestrator.initialize().await;
/// engine.debouncer.queue_change("a.txt");
/// # }
/// ```
pub struct TestEngine {
    pub vcs: Arc<ScriptedVcs>,
    pub reporter: Arc<RecordingReporter>,
    pub settings: Arc<SharedSettings>,
    pub orchestrator: Arc<SyncOrchestrator>,
    pub debouncer: Arc<ChangeDebouncer>,
    workdir: TempDir,
}

impl TestEngine {
    /// Engine with [`TestEngine::quick_settings`]
    pub fn new(vcs: ScriptedVcs) -> Self {
        Self::with_settings(vcs, Self::quick_settings())
    }

    pub fn with_settings(vcs: ScriptedVcs, settings: SyncSettings) -> Self {
        let workdir = TempDir::new().expect("failed to create workdir");
        vcs.attach_workdir(workdir.path());
        let vcs = Arc::new(vcs);
        let reporter = Arc::new(RecordingReporter::new());
        let settings = Arc::new(SharedSettings::new(settings));

        let orchestrator = Arc::new(
            SyncOrchestrator::new(workdir.path(), vcs.clone(), settings.clone())
                .with_status_sink(reporter.clone())
                .with_notifier(reporter.clone()),
        );
        let debouncer = ChangeDebouncer::new(orchestrator.clone(), orchestrator.puller());

        Self {
            vcs,
            reporter,
            settings,
            orchestrator,
            debouncer,
            workdir,
        }
    }

    /// Temporary directory the engine runs in
    pub fn root(&self) -> &Path {
        self.workdir.path()
    }

    /// Write `content` to `relative` under [`TestEngine::root`]
    pub fn write_file(&self, relative: &str, content: &str) {
        fs::write(self.root().join(relative), content).expect("failed to write file");
    }

    /// Round timings for paused-clock tests. The poll timer is pushed out
    /// to an hour so it stays quiet unless a test waits for it.
    pub fn quick_settings() -> SyncSettings {
        SyncSettings {
            quiet_period_secs: 60,
            retry_backoff_secs: 30,
            max_network_retries: 3,
            pull_interval_min_secs: 3600,
            pull_interval_max_secs: 3600,
            ..SyncSettings::default()
        }
    }

    /// Advance the paused tokio clock and let woken tasks run
    pub async fn advance(duration: Duration) {
        tokio::time::sleep(duration).await;
        settle().await;
    }
}

/// Yield enough times for spawned callbacks to finish their VCS calls
pub async fn settle() {
    for _ in 0..32 {
        tokio::task::yield_now().await;
    }
}
