//! Auto-commit path
//!
//! Save events accumulate in a pending set. Every event re-arms one timer,
//! so the commit happens a full quiet period after the last save.

use std::collections::BTreeSet;
use std::path::PathBuf;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use chrono::Local;
use tokio::sync::mpsc::UnboundedReceiver;

use crate::classify::{SemanticError, classify};
use crate::config::SyncSettings;
use crate::orchestrator::{SyncOrchestrator, SyncSession};
use crate::poller::Puller;
use crate::recovery::{self, Recovery};
use crate::status::SyncStatus;

/// Timer key shared by the quiet-period timer and network retries
pub const COMMIT_TIMER: &str = "auto-commit";

#[derive(Debug, Default)]
struct PendingState {
    files: BTreeSet<String>,
    retries: u32,
    /// A commit landed but its push has not succeeded yet
    awaiting_push: bool,
}

/// Batches save events into commit-and-push cycles.
pub struct ChangeDebouncer {
    orchestrator: Arc<SyncOrchestrator>,
    puller: Arc<dyn Puller>,
    state: Mutex<PendingState>,
}

impl ChangeDebouncer {
    /// Create a debouncer bound to `orchestrator`.
    ///
    /// A manual sync drops timers that come due while it runs, so the
    /// debouncer re-arms itself once the sync finishes.
    pub fn new(orchestrator: Arc<SyncOrchestrator>, puller: Arc<dyn Puller>) -> Arc<Self> {
        let debouncer = Arc::new(Self {
            orchestrator,
            puller,
            state: Mutex::new(PendingState::default()),
        });

        let weak = Arc::downgrade(&debouncer);
        debouncer.orchestrator.on_resume(move || {
            if let Some(debouncer) = weak.upgrade() {
                debouncer.rearm_if_pending();
            }
        });
        debouncer
    }

    /// Record a saved file and push the commit deadline back.
    ///
    /// Does nothing while auto-sync is disabled.
    pub fn queue_change(self: &Arc<Self>, file_id: impl Into<String>) {
        let settings = self.orchestrator.settings();
        if !settings.auto_sync {
            return;
        }

        let file_id = file_id.into();
        tracing::trace!(file = %file_id, "Change queued");
        self.state().files.insert(file_id);
        self.arm(settings.quiet_period());
    }

    /// Files waiting for the next cycle, sorted
    pub fn pending(&self) -> Vec<String> {
        self.state().files.iter().cloned().collect()
    }

    /// Network retries spent in the current cycle
    pub fn retries(&self) -> u32 {
        self.state().retries
    }

    /// Feed save events from a file watcher until the sender closes.
    pub async fn listen(self: Arc<Self>, mut saves: UnboundedReceiver<PathBuf>) {
        let root = self.orchestrator.root().to_path_buf();
        while let Some(path) = saves.recv().await {
            let file_id = path
                .strip_prefix(&root)
                .unwrap_or(&path)
                .to_string_lossy()
                .into_owned();
            self.queue_change(file_id);
        }
        tracing::debug!("Save event stream closed");
    }

    /// Quiet-period handler: commit and push the pending changes.
    pub async fn on_quiet(self: &Arc<Self>) {
        let settings = self.orchestrator.settings();
        if !settings.auto_sync {
            tracing::debug!("Auto-sync disabled since the last save, dropping pending changes");
            self.reset();
            return;
        }

        let session = self.orchestrator.acquire().await;
        let status = session.status();
        if status == SyncStatus::Inapplicable {
            self.reset();
            return;
        }
        let local_only = status == SyncStatus::LocalOnly;

        let files = self.pending();
        let message = commit_message(&files);
        let awaiting_push = self.state().awaiting_push;

        let dirty = match session.vcs().has_uncommitted_changes().await {
            Ok(dirty) => dirty,
            Err(e) => {
                let error = classify(&e);
                return self.handle_failure(&session, error, &settings, &message, local_only).await;
            }
        };

        if !dirty && !awaiting_push {
            tracing::debug!(files = files.len(), "Saves left no real changes");
            self.reset();
            return;
        }

        session.set_status(SyncStatus::Syncing);

        if dirty {
            if let Err(e) = session.vcs().commit(&message).await {
                let error = classify(&e);
                return self.handle_failure(&session, error, &settings, &message, local_only).await;
            }
            self.state().awaiting_push = true;
            tracing::info!(files = files.len(), "Committed pending changes");
        }

        if local_only {
            self.reset();
            session.set_status(SyncStatus::LocalOnly);
            return;
        }

        match session.vcs().push().await {
            Ok(()) => {
                self.reset();
                session.show_transient("Sync complete");
                session.set_status(SyncStatus::Enabled);
                tracing::info!("Pushed pending changes");
            }
            Err(e) => {
                let error = classify(&e);
                self.handle_failure(&session, error, &settings, &message, local_only).await;
            }
        }
    }

    async fn handle_failure(
        self: &Arc<Self>,
        session: &SyncSession<'_>,
        error: SemanticError,
        settings: &SyncSettings,
        message: &str,
        local_only: bool,
    ) {
        let puller = self.puller.as_ref();
        match recovery::recover(session, puller, error, message, local_only).await {
            Recovery::Synced(status) => {
                self.reset();
                if status == SyncStatus::Enabled {
                    session.show_transient("Sync complete");
                }
                session.set_status(status);
            }
            Recovery::Retry(error) => {
                let attempt = {
                    let mut state = self.state();
                    state.retries += 1;
                    state.retries
                };

                if attempt <= settings.max_network_retries {
                    tracing::warn!(
                        attempt,
                        max = settings.max_network_retries,
                        error = %error.message,
                        "Network failure, scheduling retry"
                    );
                    session.notifier().network_retry(attempt);
                    session.set_status(SyncStatus::Offline);
                    self.arm(settings.retry_backoff());
                } else {
                    tracing::error!(attempts = attempt, "Network retries exhausted");
                    self.reset();
                    session.set_status(SyncStatus::Offline);
                    session.notifier().network_offline();
                }
            }
            Recovery::Offline(_) | Recovery::Abandoned(_) if local_only => {
                self.reset();
                session.set_status(SyncStatus::LocalOnly);
            }
            Recovery::Offline(_) => {
                self.reset();
                session.set_status(SyncStatus::Offline);
            }
            Recovery::Abandoned(_) => {
                self.reset();
                session.set_status(SyncStatus::Enabled);
            }
        }
    }

    /// Re-arm the commit timer if a cycle is pending but nothing will run it
    fn rearm_if_pending(self: &Arc<Self>) {
        if self.orchestrator.scheduler().is_active(COMMIT_TIMER) {
            return;
        }

        let (pending, retrying) = {
            let state = self.state();
            (!state.files.is_empty() || state.awaiting_push, state.retries > 0)
        };
        if !pending {
            return;
        }

        let settings = self.orchestrator.settings();
        let delay = if retrying {
            settings.retry_backoff()
        } else {
            settings.quiet_period()
        };
        tracing::debug!(retrying, delay = ?delay, "Re-arming commit timer after manual sync");
        self.arm(delay);
    }

    fn arm(self: &Arc<Self>, delay: Duration) {
        let weak = Arc::downgrade(self);
        self.orchestrator
            .scheduler()
            .schedule_once(COMMIT_TIMER, delay, move || async move {
                if let Some(debouncer) = weak.upgrade() {
                    debouncer.on_quiet().await;
                }
                Ok(())
            });
    }

    /// Clear the pending set together with the retry bookkeeping
    fn reset(&self) {
        let mut state = self.state();
        state.files.clear();
        state.retries = 0;
        state.awaiting_push = false;
    }

    fn state(&self) -> MutexGuard<'_, PendingState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }
}

impl std::fmt::Debug for ChangeDebouncer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeDebouncer")
            .field("state", &*self.state())
            .finish_non_exhaustive()
    }
}

fn commit_message(files: &[String]) -> String {
    let mut message = format!("Auto-sync: {}", Local::now().format("%Y-%m-%d %H:%M:%S"));
    if !files.is_empty() {
        message.push_str("\n\nChanged files:");
        for file in files {
            message.push_str("\n- ");
            message.push_str(file);
        }
    }
    message
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn commit_message_lists_files() {
        let message = commit_message(&["a.txt".to_string(), "docs/b.txt".to_string()]);

        assert!(message.starts_with("Auto-sync: "));
        assert!(message.ends_with("Changed files:\n- a.txt\n- docs/b.txt"));
    }

    #[test]
    fn commit_message_without_files_is_one_line() {
        assert!(!commit_message(&[]).contains('\n'));
    }
}
