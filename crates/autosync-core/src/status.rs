//! Synchronization status and the host-facing reporting seams

use std::fmt;

use serde::Serialize;

/// Current synchronization state, owned by the orchestrator
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize)]
#[serde(rename_all = "kebab-case")]
pub enum SyncStatus {
    /// Prerequisites missing (no tool or not under version control)
    #[default]
    Inapplicable,
    Enabled,
    /// Repository without a remote
    LocalOnly,
    Offline,
    Syncing,
    SyncComplete,
    SyncCompleteWithConflicts,
}

impl SyncStatus {
    /// Whether this state implies a configured remote worth polling
    pub fn has_remote(self) -> bool {
        !matches!(self, Self::Inapplicable | Self::LocalOnly)
    }
}

impl fmt::Display for SyncStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::Inapplicable => "inapplicable",
            Self::Enabled => "enabled",
            Self::LocalOnly => "local only",
            Self::Offline => "offline",
            Self::Syncing => "syncing",
            Self::SyncComplete => "sync complete",
            Self::SyncCompleteWithConflicts => "sync complete with conflicts",
        };
        f.write_str(label)
    }
}

/// Status indicator owned by the host
pub trait StatusSink: Send + Sync {
    fn set_status(&self, status: SyncStatus);

    fn set_auto_sync(&self, enabled: bool);

    /// Short-lived message that does not change the status
    fn show_transient(&self, message: &str);
}

/// User-facing notifications
pub trait Notifier: Send + Sync {
    fn tool_not_found(&self);

    fn no_remote(&self);

    /// A network failure is being retried; `attempt` starts at 1
    fn network_retry(&self, attempt: u32);

    /// Retries are exhausted and the engine went offline
    fn network_offline(&self);

    fn generic_error(&self, message: &str);

    fn conflicts_detected(&self, count: usize);
}

/// Reporter that routes every status change and notification to `tracing`
#[derive(Debug, Default, Clone, Copy)]
pub struct LogReporter;

impl StatusSink for LogReporter {
    fn set_status(&self, status: SyncStatus) {
        tracing::info!(status = %status, "Sync status changed");
    }

    fn set_auto_sync(&self, enabled: bool) {
        tracing::info!(enabled, "Auto-sync toggled");
    }

    fn show_transient(&self, message: &str) {
        tracing::info!("{message}");
    }
}

impl Notifier for LogReporter {
    fn tool_not_found(&self) {
        tracing::error!("git executable not found; synchronization is unavailable");
    }

    fn no_remote(&self) {
        tracing::warn!("No remote configured; changes are committed locally only");
    }

    fn network_retry(&self, attempt: u32) {
        tracing::warn!(attempt, "Network unavailable, retrying");
    }

    fn network_offline(&self) {
        tracing::error!("Network retries exhausted, working offline");
    }

    fn generic_error(&self, message: &str) {
        tracing::error!(error = %message, "Synchronization failed");
    }

    fn conflicts_detected(&self, count: usize) {
        tracing::warn!(count, "Merge conflicts were committed and need resolving");
    }
}
