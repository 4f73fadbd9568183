//! Shared test utilities for the autosync workspace.
//!
//! A dev-dependency only, never published.
//!
//! # Modules
//!
//! - [`engine`] - [`TestEngine`], a full engine over scripted collaborators
//! - [`git`] - real repository fixtures (clones sharing a bare remote)
//! - [`scripted`] - [`ScriptedVcs`], an in-memory VCS with scripted failures
//! - [`reporter`] - [`RecordingReporter`], captures statuses and notifications

pub mod engine;
pub mod git;
pub mod reporter;
pub mod scripted;

pub use engine::{TestEngine, settle};
pub use git::{RemoteSetup, git, init_repo};
pub use reporter::{Notification, RecordingReporter};
pub use scripted::{Op, ScriptedVcs};
