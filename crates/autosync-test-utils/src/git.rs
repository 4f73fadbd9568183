//! Real git repository fixtures.
//!
//! All fixtures shell out to the `git` CLI and panic on failure, so a broken
//! fixture fails the test at the line that set it up.

use std::fs;
use std::path::{Path, PathBuf};
use std::process::Command;

use tempfile::TempDir;

/// Run `git` in `dir` and return trimmed stdout.
///
/// # Panics
/// Panics if git cannot be spawned or exits non-zero.
pub fn git(dir: &Path, args: &[&str]) -> String {
    let output = Command::new("git")
        .args(args)
        .current_dir(dir)
        .output()
        .unwrap_or_else(|e| panic!("git: failed to run `git {args:?}`: {e}"));
    if !output.status.success() {
        panic!(
            "git: `git {args:?}` failed in {}:\n{}",
            dir.display(),
            String::from_utf8_lossy(&output.stderr)
        );
    }
    String::from_utf8_lossy(&output.stdout).trim().to_string()
}

fn configure_identity(dir: &Path) {
    git(dir, &["config", "user.email", "test@test.com"]);
    git(dir, &["config", "user.name", "Test User"]);
    git(dir, &["config", "commit.gpgsign", "false"]);
}

/// Initialise an empty repository on `main` with a test identity.
///
/// No commit is made, so HEAD is unborn.
///
/// # Panics
/// Panics if any git operation fails.
pub fn init_repo(path: &Path) {
    git(path, &["init"]);
    git(path, &["symbolic-ref", "HEAD", "refs/heads/main"]);
    configure_identity(path);
}

/// A bare remote plus a first clone (`alice`) whose initial commit of
/// `notes.md` is already pushed to `main`.
///
/// Further clones of the same remote come from [`RemoteSetup::clone_as`].
pub struct RemoteSetup {
    temp: TempDir,
}

impl RemoteSetup {
    /// # Panics
    /// Panics if any filesystem or git operation fails.
    pub fn new() -> Self {
        let temp = TempDir::new().unwrap_or_else(|e| panic!("RemoteSetup: temp dir: {e}"));
        let remote = temp.path().join("remote.git");
        let alice = temp.path().join("alice");
        fs::create_dir_all(&remote).unwrap_or_else(|e| panic!("RemoteSetup: {e}"));
        fs::create_dir_all(&alice).unwrap_or_else(|e| panic!("RemoteSetup: {e}"));

        git(&remote, &["init", "--bare"]);
        git(&remote, &["symbolic-ref", "HEAD", "refs/heads/main"]);

        init_repo(&alice);
        fs::write(alice.join("notes.md"), "line one\n")
            .unwrap_or_else(|e| panic!("RemoteSetup: failed to write notes.md: {e}"));
        git(&alice, &["add", "."]);
        git(&alice, &["commit", "-m", "Initial commit"]);
        git(&alice, &["remote", "add", "origin", &remote.to_string_lossy()]);
        git(&alice, &["push", "-u", "origin", "main"]);

        Self { temp }
    }

    /// Path of the bare remote
    pub fn remote(&self) -> PathBuf {
        self.temp.path().join("remote.git")
    }

    /// Working directory of the first clone
    pub fn alice(&self) -> PathBuf {
        self.temp.path().join("alice")
    }

    /// Clone the remote into a sibling directory named `name`.
    ///
    /// # Panics
    /// Panics if the clone fails.
    pub fn clone_as(&self, name: &str) -> PathBuf {
        git(
            self.temp.path(),
            &["clone", &self.remote().to_string_lossy(), name],
        );
        let dir = self.temp.path().join(name);
        configure_identity(&dir);
        dir
    }

    /// Subject line of the newest commit on the remote's `main`
    pub fn remote_head_subject(&self) -> String {
        git(&self.remote(), &["log", "-1", "--format=%s", "main"])
    }

    /// Number of commits on the remote's `main`
    pub fn remote_commit_count(&self) -> usize {
        git(&self.remote(), &["rev-list", "--count", "main"])
            .parse()
            .unwrap_or_else(|e| panic!("RemoteSetup: bad commit count: {e}"))
    }
}

impl Default for RemoteSetup {
    fn default() -> Self {
        Self::new()
    }
}
