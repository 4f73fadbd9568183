//! Sync state machine and the single mutual-exclusion point
//!
//! Every sequence of VCS mutations runs inside a [`SyncSession`], which
//! exists only while the orchestrator's lock is held. Concurrent triggers
//! (debounce timer, poll timer, manual sync) queue on the lock in arrival
//! order rather than failing.

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use autosync_vcs::{CommitRecord, Vcs};
use chrono::Local;
use tokio::sync::MutexGuard;

use crate::Result;
use crate::classify::{SemanticError, classify};
use crate::config::{SettingsSource, SyncSettings};
use crate::conflict::{ConflictFile, collect_conflict_files};
use crate::poller::{PullOutcome, Puller, RemotePoller};
use crate::recovery::{self, Recovery};
use crate::scheduler::Scheduler;
use crate::status::{LogReporter, Notifier, StatusSink, SyncStatus};

/// Timer key of the recurring remote poll
pub const POLL_TIMER: &str = "auto-pull";

type ResumeHook = Box<dyn Fn() + Send + Sync>;

/// Owns the sync status and serializes all VCS mutations.
pub struct SyncOrchestrator {
    root: PathBuf,
    vcs: Arc<dyn Vcs>,
    settings: Arc<dyn SettingsSource>,
    scheduler: Scheduler,
    sink: Arc<dyn StatusSink>,
    notifier: Arc<dyn Notifier>,
    puller: Arc<dyn Puller>,
    lock: tokio::sync::Mutex<()>,
    status: Mutex<SyncStatus>,
    resume_hooks: Mutex<Vec<ResumeHook>>,
}

impl std::fmt::Debug for SyncOrchestrator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SyncOrchestrator")
            .field("root", &self.root)
            .field("status", &self.status())
            .field("scheduler", &self.scheduler)
            .finish_non_exhaustive()
    }
}

impl SyncOrchestrator {
    /// Create an orchestrator for the working directory `root`.
    ///
    /// Reporting defaults to [`LogReporter`] and pulling to [`RemotePoller`];
    /// use the `with_*` methods to plug in host collaborators.
    pub fn new(
        root: impl Into<PathBuf>,
        vcs: Arc<dyn Vcs>,
        settings: Arc<dyn SettingsSource>,
    ) -> Self {
        Self {
            root: root.into(),
            vcs,
            settings,
            scheduler: Scheduler::new(),
            sink: Arc::new(LogReporter),
            notifier: Arc::new(LogReporter),
            puller: Arc::new(RemotePoller),
            lock: tokio::sync::Mutex::new(()),
            status: Mutex::new(SyncStatus::Inapplicable),
            resume_hooks: Mutex::new(Vec::new()),
        }
    }

    pub fn with_scheduler(mut self, scheduler: Scheduler) -> Self {
        self.scheduler = scheduler;
        self
    }

    pub fn with_status_sink(mut self, sink: Arc<dyn StatusSink>) -> Self {
        self.sink = sink;
        self
    }

    pub fn with_notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = notifier;
        self
    }

    pub fn with_puller(mut self, puller: Arc<dyn Puller>) -> Self {
        self.puller = puller;
        self
    }

    pub fn root(&self) -> &Path {
        &self.root
    }

    pub fn scheduler(&self) -> &Scheduler {
        &self.scheduler
    }

    /// The puller used for the auto-pull path
    pub fn puller(&self) -> Arc<dyn Puller> {
        Arc::clone(&self.puller)
    }

    /// Fresh snapshot of the administrative settings
    pub fn settings(&self) -> SyncSettings {
        self.settings.current()
    }

    pub fn status(&self) -> SyncStatus {
        *self.status.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Wait for the lock and open a session.
    pub async fn acquire(&self) -> SyncSession<'_> {
        let guard = self.lock.lock().await;
        tracing::trace!("Sync lock acquired");
        SyncSession {
            orchestrator: self,
            _guard: guard,
        }
    }

    /// Check prerequisites and settle into the initial status.
    ///
    /// The recurring poll timer is armed only when a remote exists and
    /// auto-sync is enabled.
    pub async fn initialize(self: &Arc<Self>) -> SyncStatus {
        let settings = self.settings();
        let session = self.acquire().await;
        let status = session.check_prerequisites().await;
        session.set_status(status);
        drop(session);

        if status == SyncStatus::Enabled && settings.auto_sync {
            self.arm_poll_timer(&settings);
        }
        self.sink.set_auto_sync(settings.auto_sync);

        tracing::info!(status = %status, root = %self.root.display(), "Sync engine initialized");
        status
    }

    /// Fetch and integrate remote changes.
    pub async fn pull(&self) -> PullOutcome {
        let session = self.acquire().await;
        let outcome = self.puller.pull(&session).await;
        session.apply_pull(&outcome).await;
        outcome
    }

    /// Manual commit, pull and push.
    ///
    /// Timers are paused for the duration and resumed on every exit path.
    /// Failures are reported once, without the bounded network retry.
    /// One-shot timers that came due meanwhile were dropped; the hooks
    /// registered with [`on_resume`](Self::on_resume) run afterwards so
    /// their owners can re-arm them.
    pub async fn full_sync(&self) -> SyncStatus {
        let pause = self.scheduler.pause_scope();
        let session = self.acquire().await;
        let status = session.run_full_sync().await;
        drop(session);
        drop(pause);
        tracing::info!(status = %status, "Manual sync finished");

        if !self.scheduler.is_paused() {
            self.run_resume_hooks();
        }
        status
    }

    /// Register `hook` to run each time a manual sync lifts its pause
    pub fn on_resume(&self, hook: impl Fn() + Send + Sync + 'static) {
        self.resume_hooks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .push(Box::new(hook));
    }

    /// Turn auto-sync on and arm the poll timer.
    pub fn start_auto_sync(self: &Arc<Self>) {
        self.settings.set_auto_sync(true);
        let settings = self.settings();

        if self.status().has_remote() {
            self.arm_poll_timer(&settings);
        }
        self.sink.set_auto_sync(true);
        tracing::info!("Auto-sync started");
    }

    /// Turn auto-sync off and disarm the poll timer.
    ///
    /// A debounce cycle already armed notices the flag when it fires.
    pub fn stop_auto_sync(&self) {
        self.settings.set_auto_sync(false);
        self.scheduler.cancel(POLL_TIMER);
        self.sink.set_auto_sync(false);
        tracing::info!("Auto-sync stopped");
    }

    /// Files with unresolved conflict markers, grouped per file.
    pub async fn conflicts(&self) -> Result<Vec<ConflictFile>> {
        let paths = self.vcs.list_conflicted_files().await?;
        Ok(collect_conflict_files(&self.root, paths.as_slice()))
    }

    pub async fn history(&self, limit: usize, offset: usize) -> Result<Vec<CommitRecord>> {
        Ok(self.vcs.commit_history(limit, offset).await?)
    }

    pub async fn changed_files(&self, revision: &str) -> Result<Vec<String>> {
        Ok(self.vcs.changed_files(revision).await?)
    }

    fn run_resume_hooks(&self) {
        let hooks = self.resume_hooks.lock().unwrap_or_else(PoisonError::into_inner);
        for hook in hooks.iter() {
            hook();
        }
    }

    fn arm_poll_timer(self: &Arc<Self>, settings: &SyncSettings) {
        let (min_delay, max_delay) = settings.pull_interval();
        let weak = Arc::downgrade(self);

        self.scheduler
            .schedule_recurring(POLL_TIMER, min_delay, max_delay, move || {
                let weak = weak.clone();
                async move {
                    if let Some(orchestrator) = weak.upgrade() {
                        orchestrator.pull().await;
                    }
                    Ok(())
                }
            });
        tracing::debug!(
            min_secs = min_delay.as_secs(),
            max_secs = max_delay.as_secs(),
            "Poll timer armed"
        );
    }
}

/// Exclusive access to the VCS, held for one sync sequence.
///
/// Dropping the session releases the orchestrator's lock.
pub struct SyncSession<'a> {
    orchestrator: &'a SyncOrchestrator,
    _guard: MutexGuard<'a, ()>,
}

impl<'a> SyncSession<'a> {
    pub fn vcs(&self) -> &'a dyn Vcs {
        self.orchestrator.vcs.as_ref()
    }

    pub fn notifier(&self) -> &'a dyn Notifier {
        self.orchestrator.notifier.as_ref()
    }

    pub fn settings(&self) -> SyncSettings {
        self.orchestrator.settings()
    }

    pub fn root(&self) -> &'a Path {
        &self.orchestrator.root
    }

    pub fn status(&self) -> SyncStatus {
        self.orchestrator.status()
    }

    pub fn show_transient(&self, message: &str) {
        self.orchestrator.sink.show_transient(message);
    }

    pub(crate) fn set_status(&self, status: SyncStatus) {
        let previous = std::mem::replace(
            &mut *self
                .orchestrator
                .status
                .lock()
                .unwrap_or_else(PoisonError::into_inner),
            status,
        );
        if previous != status {
            tracing::debug!(from = %previous, to = %status, "Status transition");
        }
        self.orchestrator.sink.set_status(status);
    }

    /// Notify about files left with conflict markers; returns their count.
    ///
    /// Only files with at least one closed marker region count, matching
    /// what [`SyncOrchestrator::conflicts`] shows.
    pub(crate) async fn report_conflicts(&self) -> usize {
        match self.vcs().list_conflicted_files().await {
            Ok(paths) => {
                let files = collect_conflict_files(self.root(), paths.as_slice());
                if !files.is_empty() {
                    let names: Vec<&str> =
                        files.iter().map(|f| f.relative_path.as_str()).collect();
                    tracing::warn!(count = files.len(), files = ?names, "Conflicts recorded");
                    self.notifier().conflicts_detected(files.len());
                }
                files.len()
            }
            Err(e) => {
                tracing::warn!(error = %e, "Could not list conflicted files");
                0
            }
        }
    }

    /// Settle the status after a pull
    pub(crate) async fn apply_pull(&self, outcome: &PullOutcome) {
        match outcome.status() {
            Some(status) => {
                self.set_status(status);
                if *outcome == PullOutcome::Conflicted {
                    self.report_conflicts().await;
                }
            }
            // A clean fetch proves the remote is reachable again
            None if self.status() == SyncStatus::Offline => self.set_status(SyncStatus::Enabled),
            None => {}
        }
    }

    async fn check_prerequisites(&self) -> SyncStatus {
        let vcs = self.vcs();

        if !vcs.is_available().await {
            self.notifier().tool_not_found();
            return SyncStatus::Inapplicable;
        }

        if !vcs.has_local_repository(self.root()).await {
            tracing::info!(root = %self.root().display(), "Not under version control");
            return SyncStatus::Inapplicable;
        }

        match vcs.is_initialized().await {
            Ok(true) => {}
            Ok(false) => {
                if let Err(e) = vcs.initialize_repository().await {
                    tracing::error!(error = %e, "Failed to initialize repository");
                    return SyncStatus::Inapplicable;
                }
                tracing::info!("Initialized repository with an empty commit");
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to inspect repository");
                return SyncStatus::Inapplicable;
            }
        }

        match vcs.has_remote().await {
            Ok(true) => SyncStatus::Enabled,
            Ok(false) => {
                self.notifier().no_remote();
                SyncStatus::LocalOnly
            }
            Err(e) => {
                tracing::warn!(error = %e, "Failed to inspect remotes");
                self.notifier().no_remote();
                SyncStatus::LocalOnly
            }
        }
    }

    async fn run_full_sync(&self) -> SyncStatus {
        let initial = self.status();
        if initial == SyncStatus::Inapplicable {
            self.show_transient("Synchronization is not available here");
            return initial;
        }

        let vcs = self.vcs();
        let message = manual_commit_message();

        match vcs.has_uncommitted_changes().await {
            Ok(true) => {}
            Ok(false) => {
                self.show_transient("No changes to sync");
                return initial;
            }
            Err(e) => return self.settle_failure(classify(&e), &message, initial).await,
        }

        self.set_status(SyncStatus::Syncing);

        if let Err(e) = vcs.commit(&message).await {
            return self.settle_failure(classify(&e), &message, initial).await;
        }

        if initial == SyncStatus::LocalOnly {
            self.set_status(SyncStatus::LocalOnly);
            self.show_transient("Committed locally");
            return SyncStatus::LocalOnly;
        }

        let mut conflicted = false;
        match self.orchestrator.puller.pull(self).await {
            PullOutcome::UpToDate | PullOutcome::Reconciled => {}
            PullOutcome::Conflicted => {
                if let Err(e) = vcs.commit(&recovery::conflict_message(&message)).await {
                    return self.settle_failure(classify(&e), &message, initial).await;
                }
                conflicted = true;
            }
            PullOutcome::Failed(error) => {
                return self.settle_failure(error, &message, initial).await;
            }
        }

        if let Err(e) = vcs.push().await {
            return self.settle_failure(classify(&e), &message, initial).await;
        }

        let status = if conflicted {
            self.report_conflicts().await;
            SyncStatus::SyncCompleteWithConflicts
        } else {
            SyncStatus::SyncComplete
        };
        self.set_status(status);
        self.show_transient("Sync complete");
        status
    }

    /// Run the shared recovery policy once and settle the status.
    ///
    /// A run that started `LocalOnly` always settles back to `LocalOnly`.
    async fn settle_failure(
        &self,
        error: SemanticError,
        message: &str,
        initial: SyncStatus,
    ) -> SyncStatus {
        let local_only = initial == SyncStatus::LocalOnly;
        let puller = self.orchestrator.puller.as_ref();
        let status = match recovery::recover(self, puller, error, message, local_only).await {
            Recovery::Synced(status) => status,
            Recovery::Retry(error) => {
                tracing::warn!(error = %error.message, "Manual sync failed, remote unreachable");
                self.notifier().network_offline();
                SyncStatus::Offline
            }
            Recovery::Offline(_) if local_only => SyncStatus::LocalOnly,
            Recovery::Offline(_) => SyncStatus::Offline,
            Recovery::Abandoned(_) if local_only => SyncStatus::LocalOnly,
            Recovery::Abandoned(_) => SyncStatus::Enabled,
        };
        self.set_status(status);
        status
    }
}

fn manual_commit_message() -> String {
    format!("Manual sync: {}", Local::now().format("%Y-%m-%d %H:%M:%S"))
}
