//! Auto-pull path
//!
//! The poller is stateless. It runs inside a [`SyncSession`], so it only ever
//! touches the VCS while the orchestrator's lock is held, and it reports what
//! happened instead of changing the status itself.

use async_trait::async_trait;

use crate::classify::{ErrorKind, SemanticError, classify};
use crate::orchestrator::SyncSession;
use crate::status::SyncStatus;

/// Result of one fetch-and-reconcile pass
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PullOutcome {
    /// Local revision already contains the remote tip
    UpToDate,
    /// Remote changes were integrated cleanly
    Reconciled,
    /// Remote changes were integrated with conflict markers left in place
    Conflicted,
    /// Fetch or reconcile failed
    Failed(SemanticError),
}

impl PullOutcome {
    /// Status this outcome settles into.
    ///
    /// `None` for an up-to-date pull, which leaves the status alone.
    pub fn status(&self) -> Option<SyncStatus> {
        match self {
            Self::UpToDate => None,
            Self::Reconciled => Some(SyncStatus::Enabled),
            Self::Conflicted => Some(SyncStatus::SyncCompleteWithConflicts),
            Self::Failed(_) => Some(SyncStatus::Offline),
        }
    }
}

/// Anything that can integrate remote changes inside a held session
#[async_trait]
pub trait Puller: Send + Sync {
    async fn pull(&self, session: &SyncSession<'_>) -> PullOutcome;
}

/// Fetches the remote and merges it when the local revision is behind
#[derive(Debug, Default, Clone, Copy)]
pub struct RemotePoller;

#[async_trait]
impl Puller for RemotePoller {
    async fn pull(&self, session: &SyncSession<'_>) -> PullOutcome {
        let vcs = session.vcs();

        if let Err(e) = vcs.fetch().await {
            let error = classify(&e);
            if error.kind == ErrorKind::Network {
                tracing::warn!(error = %error.message, "Fetch failed, remote unreachable");
            } else {
                tracing::error!(kind = %error.kind, error = %error.message, "Unexpected fetch failure");
            }
            return PullOutcome::Failed(error);
        }

        match vcs.is_behind_remote().await {
            Ok(false) => {
                tracing::trace!("Already up to date with remote");
                return PullOutcome::UpToDate;
            }
            Ok(true) => {}
            Err(e) => {
                let error = classify(&e);
                tracing::error!(kind = %error.kind, error = %error.message, "Could not compare with remote");
                return PullOutcome::Failed(error);
            }
        }

        match vcs.reconcile_with_remote().await {
            Ok(()) => {
                tracing::info!("Integrated remote changes");
                PullOutcome::Reconciled
            }
            Err(e) => {
                let error = classify(&e);
                if error.kind == ErrorKind::Conflict {
                    tracing::warn!("Remote changes conflict with local edits");
                    PullOutcome::Conflicted
                } else {
                    tracing::error!(kind = %error.kind, error = %error.message, "Reconcile failed");
                    PullOutcome::Failed(error)
                }
            }
        }
    }
}
