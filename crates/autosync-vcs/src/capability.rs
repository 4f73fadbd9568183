//! The VCS capability trait consumed by the sync engine

use std::path::Path;

use async_trait::async_trait;

use crate::Result;
use crate::history::CommitRecord;

/// Semantic version-control operations.
///
/// Every operation either resolves with structured output or fails with a
/// [`VcsError`](crate::VcsError). Implementations bound each call with a
/// fixed timeout; a timeout is reported as a failure, never as a hang.
#[async_trait]
pub trait Vcs: Send + Sync {
    /// Whether the underlying tool can be executed at all
    async fn is_available(&self) -> bool;

    /// Whether `path` lies inside a repository
    async fn has_local_repository(&self, path: &Path) -> bool;

    /// Whether the repository has a born branch to commit on top of
    async fn is_initialized(&self) -> Result<bool>;

    /// Create whatever the repository needs before the first sync
    async fn initialize_repository(&self) -> Result<()>;

    /// Whether the configured remote exists
    async fn has_remote(&self) -> Result<bool>;

    /// Whether the working copy differs from the last commit.
    ///
    /// This is ground truth. A save event with byte-identical content does
    /// not count.
    async fn has_uncommitted_changes(&self) -> Result<bool>;

    /// Record every working-copy change in a new commit
    async fn commit(&self, message: &str) -> Result<()>;

    /// Publish local commits to the remote
    async fn push(&self) -> Result<()>;

    /// Download remote history without touching the working copy
    async fn fetch(&self) -> Result<()>;

    /// Whether the remote has commits the local revision lacks
    async fn is_behind_remote(&self) -> Result<bool>;

    /// Integrate fetched remote history into the local revision
    async fn reconcile_with_remote(&self) -> Result<()>;

    /// Paths (relative to the working directory) that carry unresolved conflicts
    async fn list_conflicted_files(&self) -> Result<Vec<String>>;

    /// Commit history from the current revision, most recent first
    async fn commit_history(&self, limit: usize, offset: usize) -> Result<Vec<CommitRecord>>;

    /// Paths touched by `revision`
    async fn changed_files(&self, revision: &str) -> Result<Vec<String>>;
}
