//! Reporter that records everything the engine tells the host.

use std::sync::{Mutex, MutexGuard, PoisonError};

use autosync_core::{Notifier, StatusSink, SyncStatus};

/// One notification as received by the host
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    ToolNotFound,
    NoRemote,
    NetworkRetry(u32),
    NetworkOffline,
    GenericError(String),
    ConflictsDetected(usize),
}

#[derive(Debug, Default)]
struct Recorded {
    statuses: Vec<SyncStatus>,
    auto_sync: Vec<bool>,
    transients: Vec<String>,
    notifications: Vec<Notification>,
}

/// [`StatusSink`] and [`Notifier`] that keep every call for assertions.
#[derive(Debug, Default)]
pub struct RecordingReporter {
    recorded: Mutex<Recorded>,
}

impl RecordingReporter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Every status set, in order
    pub fn statuses(&self) -> Vec<SyncStatus> {
        self.recorded().statuses.clone()
    }

    pub fn last_status(&self) -> Option<SyncStatus> {
        self.recorded().statuses.last().copied()
    }

    /// Last value of the auto-sync indicator
    pub fn auto_sync(&self) -> Option<bool> {
        self.recorded().auto_sync.last().copied()
    }

    pub fn transients(&self) -> Vec<String> {
        self.recorded().transients.clone()
    }

    pub fn notifications(&self) -> Vec<Notification> {
        self.recorded().notifications.clone()
    }

    /// Attempt numbers of every network retry notification
    pub fn retry_attempts(&self) -> Vec<u32> {
        self.recorded()
            .notifications
            .iter()
            .filter_map(|n| match n {
                Notification::NetworkRetry(attempt) => Some(*attempt),
                _ => None,
            })
            .collect()
    }

    fn recorded(&self) -> MutexGuard<'_, Recorded> {
        self.recorded.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self, notification: Notification) {
        self.recorded().notifications.push(notification);
    }
}

impl StatusSink for RecordingReporter {
    fn set_status(&self, status: SyncStatus) {
        self.recorded().statuses.push(status);
    }

    fn set_auto_sync(&self, enabled: bool) {
        self.recorded().auto_sync.push(enabled);
    }

    fn show_transient(&self, message: &str) {
        self.recorded().transients.push(message.to_string());
    }
}

impl Notifier for RecordingReporter {
    fn tool_not_found(&self) {
        self.notify(Notification::ToolNotFound);
    }

    fn no_remote(&self) {
        self.notify(Notification::NoRemote);
    }

    fn network_retry(&self, attempt: u32) {
        self.notify(Notification::NetworkRetry(attempt));
    }

    fn network_offline(&self) {
        self.notify(Notification::NetworkOffline);
    }

    fn generic_error(&self, message: &str) {
        self.notify(Notification::GenericError(message.to_string()));
    }

    fn conflicts_detected(&self, count: usize) {
        self.notify(Notification::ConflictsDetected(count));
    }
}
