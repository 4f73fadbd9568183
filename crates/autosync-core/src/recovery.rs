//! Recovery branches shared by the auto-commit path and manual sync
//!
//! Each classified failure maps to one branch. Network failures are handed
//! back to the caller, which owns the retry budget.

use crate::classify::{ErrorKind, SemanticError, classify};
use crate::orchestrator::SyncSession;
use crate::poller::{PullOutcome, Puller};
use crate::status::SyncStatus;

/// Summary-line suffix for commits that record unresolved conflicts
const CONFLICT_SUFFIX: &str = " (with conflicts)";

/// Where a failed cycle ended up
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) enum Recovery {
    /// Changes reached the remote after all
    Synced(SyncStatus),
    /// Transient network failure; the caller decides whether to retry
    Retry(SemanticError),
    /// The second attempt failed too
    Offline(SemanticError),
    /// Not known to be transient; the cycle is dropped
    Abandoned(SemanticError),
}

/// Apply the branch for `error` inside an already held session.
///
/// `message` is the commit message of the failed cycle. A `local_only`
/// repository has nothing to push to, so only the conflict branch applies.
pub(crate) async fn recover(
    session: &SyncSession<'_>,
    puller: &dyn Puller,
    error: SemanticError,
    message: &str,
    local_only: bool,
) -> Recovery {
    tracing::debug!(kind = %error.kind, error = %error.message, "Recovering from sync failure");

    match error.kind {
        ErrorKind::Network if !local_only => Recovery::Retry(error),
        ErrorKind::RemoteChanged if !local_only => pull_then_push(session, puller, message).await,
        ErrorKind::Conflict => commit_through_conflict(session, message, local_only).await,
        _ => {
            tracing::error!(kind = %error.kind, error = %error.message, "Abandoning sync cycle");
            session.notifier().generic_error(&error.message);
            Recovery::Abandoned(error)
        }
    }
}

/// Commit message with the conflict suffix appended to its summary line
pub(crate) fn conflict_message(message: &str) -> String {
    match message.split_once('\n') {
        Some((summary, body)) => format!("{summary}{CONFLICT_SUFFIX}\n{body}"),
        None => format!("{message}{CONFLICT_SUFFIX}"),
    }
}

async fn pull_then_push(session: &SyncSession<'_>, puller: &dyn Puller, message: &str) -> Recovery {
    tracing::info!("Remote has new commits, pulling before retrying push");

    let conflicted = match puller.pull(session).await {
        PullOutcome::UpToDate | PullOutcome::Reconciled => false,
        PullOutcome::Conflicted => {
            if let Err(e) = session.vcs().commit(&conflict_message(message)).await {
                return offline(classify(&e), "Commit after conflicting pull failed");
            }
            true
        }
        PullOutcome::Failed(error) => return offline(error, "Pull before retrying push failed"),
    };

    if let Err(e) = session.vcs().push().await {
        return offline(classify(&e), "Push after pull failed");
    }

    if conflicted {
        session.report_conflicts().await;
        Recovery::Synced(SyncStatus::SyncCompleteWithConflicts)
    } else {
        Recovery::Synced(SyncStatus::Enabled)
    }
}

async fn commit_through_conflict(
    session: &SyncSession<'_>,
    message: &str,
    local_only: bool,
) -> Recovery {
    tracing::warn!("Committing through merge conflict");

    if let Err(e) = session.vcs().commit(&conflict_message(message)).await {
        return offline(classify(&e), "Conflict commit failed");
    }
    if local_only {
        session.report_conflicts().await;
        return Recovery::Synced(SyncStatus::LocalOnly);
    }
    if let Err(e) = session.vcs().push().await {
        return offline(classify(&e), "Push after conflict commit failed");
    }

    session.report_conflicts().await;
    Recovery::Synced(SyncStatus::SyncCompleteWithConflicts)
}

fn offline(error: SemanticError, context: &str) -> Recovery {
    tracing::warn!(kind = %error.kind, error = %error.message, "{context}");
    Recovery::Offline(error)
}
