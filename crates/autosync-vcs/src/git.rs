//! `git` implementation of the VCS capability
//!
//! Commands that touch the network or the working copy go through the `git`
//! executable so they honour the user's credential helpers and hooks.
//! Read-only inspection uses `git2` directly.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use async_trait::async_trait;
use git2::{ErrorCode, Repository};

use crate::capability::Vcs;
use crate::command::GitCommand;
use crate::history::{self, CommitRecord};
use crate::{Result, VcsError};

/// Default remote name
pub const DEFAULT_REMOTE: &str = "origin";

/// Message used for the empty commit that gives a fresh repository a branch
const INITIAL_COMMIT_MESSAGE: &str = "Initialize repository";

/// Extended regex matching a conflict start marker at the beginning of a line
const CONFLICT_START_PATTERN: &str = "^<{7}( |$)";

/// Top-level working directory of the repository containing `path`.
///
/// `None` outside a repository and for bare repositories.
pub fn repository_root(path: &Path) -> Option<PathBuf> {
    let repo = Repository::discover(path).ok()?;
    repo.workdir().map(Path::to_path_buf)
}

/// A working directory synchronized through the `git` executable.
#[derive(Debug, Clone)]
pub struct GitCli {
    git: GitCommand,
    remote: String,
}

impl GitCli {
    /// Create a capability for `workdir`, pushing to and fetching from `remote`.
    pub fn new(workdir: impl Into<PathBuf>, remote: impl Into<String>, timeout: Duration) -> Self {
        Self {
            git: GitCommand::new(workdir, timeout),
            remote: remote.into(),
        }
    }

    /// Working directory this capability operates on
    pub fn workdir(&self) -> &Path {
        self.git.workdir()
    }

    /// Remote name used for push and fetch
    pub fn remote(&self) -> &str {
        &self.remote
    }

    fn open(&self) -> Result<Repository> {
        Repository::discover(self.workdir()).map_err(|_| VcsError::RepositoryNotFound {
            path: self.workdir().display().to_string(),
        })
    }

    async fn current_branch(&self) -> Result<String> {
        self.git.run(&["rev-parse", "--abbrev-ref", "HEAD"]).await
    }

    /// `<remote>/<branch>` for the current branch, if that remote-tracking ref exists
    async fn tracking_branch(&self) -> Result<Option<String>> {
        let branch = self.current_branch().await?;
        let refname = format!("refs/remotes/{}/{}", self.remote, branch);

        let exists = self.open()?.find_reference(&refname).is_ok();
        if exists {
            Ok(Some(format!("{}/{}", self.remote, branch)))
        } else {
            tracing::debug!(reference = %refname, "No remote-tracking branch");
            Ok(None)
        }
    }
}

#[async_trait]
impl Vcs for GitCli {
    async fn is_available(&self) -> bool {
        match self.git.run(&["--version"]).await {
            Ok(version) => {
                tracing::debug!(version = %version, "Git available");
                true
            }
            Err(e) => {
                tracing::warn!(error = %e, "Git unavailable");
                false
            }
        }
    }

    async fn has_local_repository(&self, path: &Path) -> bool {
        Repository::discover(path).is_ok()
    }

    async fn is_initialized(&self) -> Result<bool> {
        let repo = self.open()?;
        match repo.head() {
            Ok(_) => Ok(true),
            Err(e) if matches!(e.code(), ErrorCode::UnbornBranch | ErrorCode::NotFound) => {
                Ok(false)
            }
            Err(e) => Err(e.into()),
        }
    }

    async fn initialize_repository(&self) -> Result<()> {
        self.git
            .run(&["commit", "--allow-empty", "-m", INITIAL_COMMIT_MESSAGE])
            .await?;
        Ok(())
    }

    async fn has_remote(&self) -> Result<bool> {
        Ok(self.open()?.find_remote(&self.remote).is_ok())
    }

    async fn has_uncommitted_changes(&self) -> Result<bool> {
        let status = self.git.run(&["status", "--porcelain"]).await?;
        Ok(!status.is_empty())
    }

    async fn commit(&self, message: &str) -> Result<()> {
        self.git.run(&["add", "-A"]).await?;

        match self.git.run(&["commit", "-m", message]).await {
            Ok(_) => Ok(()),
            Err(e) if e.output().is_some_and(|out| out.contains("nothing to commit")) => {
                tracing::debug!("Nothing to commit");
                Ok(())
            }
            Err(e) => Err(e),
        }
    }

    async fn push(&self) -> Result<()> {
        self.git.run(&["push", "-u", &self.remote, "HEAD"]).await?;
        Ok(())
    }

    async fn fetch(&self) -> Result<()> {
        self.git.run(&["fetch", &self.remote]).await?;
        Ok(())
    }

    async fn is_behind_remote(&self) -> Result<bool> {
        let Some(tracking) = self.tracking_branch().await? else {
            return Ok(false);
        };

        let range = format!("HEAD..{tracking}");
        let count = self.git.run(&["rev-list", "--count", &range]).await?;
        Ok(count.parse::<usize>().unwrap_or(0) > 0)
    }

    async fn reconcile_with_remote(&self) -> Result<()> {
        let Some(tracking) = self.tracking_branch().await? else {
            return Ok(());
        };

        self.git.run(&["merge", "--no-edit", &tracking]).await?;
        Ok(())
    }

    async fn list_conflicted_files(&self) -> Result<Vec<String>> {
        let mut files = BTreeSet::new();

        let unmerged = self
            .git
            .run(&["diff", "--name-only", "--diff-filter=U"])
            .await?;
        files.extend(unmerged.lines().map(str::to_string));

        // Markers committed through a conflict stay in tracked files
        match self
            .git
            .run(&["grep", "-l", "-I", "-E", CONFLICT_START_PATTERN])
            .await
        {
            Ok(matched) => files.extend(matched.lines().map(str::to_string)),
            // grep exits 1 when nothing matches
            Err(e) if e.exit_code() == Some(1) => {}
            Err(e) => return Err(e),
        }

        files.retain(|f| !f.is_empty());
        Ok(files.into_iter().collect())
    }

    async fn commit_history(&self, limit: usize, offset: usize) -> Result<Vec<CommitRecord>> {
        let repo = self.open()?;
        history::list_commits(&repo, limit, offset)
    }

    async fn changed_files(&self, revision: &str) -> Result<Vec<String>> {
        if revision.is_empty() || revision.starts_with('-') {
            return Err(VcsError::InvalidRevision {
                revision: revision.to_string(),
            });
        }

        let listing = self
            .git
            .run(&[
                "diff-tree",
                "--root",
                "--no-commit-id",
                "--name-only",
                "-r",
                revision,
            ])
            .await?;

        Ok(listing.lines().map(str::to_string).collect())
    }
}
