//! Version-control capability for autosync
//!
//! The sync engine never builds command lines itself. It talks to a [`Vcs`]
//! implementation through semantic operations (commit, push, fetch, ...) and
//! receives either structured output or a [`VcsError`] carrying the raw
//! failure text that the engine classifies.

pub mod capability;
pub mod command;
pub mod error;
pub mod git;
pub mod history;

pub use capability::Vcs;
pub use command::GitCommand;
pub use error::{Result, VcsError};
pub use git::{DEFAULT_REMOTE, GitCli, repository_root};
pub use history::CommitRecord;
