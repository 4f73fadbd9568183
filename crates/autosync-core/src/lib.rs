//! Synchronization orchestration engine for autosync
//!
//! Keeps a working directory in step with its remote: save events are
//! debounced into commit-and-push cycles, the remote is polled on a
//! randomized cadence, and every failure is classified once and handled to
//! a terminal status.

pub mod classify;
pub mod config;
pub mod conflict;
pub mod debouncer;
pub mod error;
pub mod orchestrator;
pub mod poller;
mod recovery;
pub mod scheduler;
pub mod status;

pub use classify::{ErrorKind, SemanticError, classify, classify_text};
pub use config::{
    SettingsSource, SharedSettings, SyncSettings, WORKSPACE_CONFIG_FILE, global_config_path,
};
pub use conflict::{ConflictFile, ConflictRegion, collect_conflict_files, contains_markers, scan};
pub use debouncer::ChangeDebouncer;
pub use error::{Error, Result};
pub use orchestrator::{SyncOrchestrator, SyncSession};
pub use poller::{PullOutcome, Puller, RemotePoller};
pub use scheduler::{PauseGuard, Scheduler};
pub use status::{LogReporter, Notifier, StatusSink, SyncStatus};
