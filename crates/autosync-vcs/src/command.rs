//! Bounded execution of the `git` executable

use std::path::{Path, PathBuf};
use std::process::Stdio;
use std::time::Duration;

use tokio::process::Command;

use crate::{Result, VcsError};

const GIT: &str = "git";

/// Runs `git` subcommands in a fixed working directory.
///
/// Each invocation is bounded by `timeout`. When the timeout elapses the
/// child process is killed and [`VcsError::Timeout`] is returned. Prompts
/// are disabled and the locale pinned so failure text stays classifiable.
#[derive(Debug, Clone)]
pub struct GitCommand {
    workdir: PathBuf,
    timeout: Duration,
}

impl GitCommand {
    /// Create a runner for `workdir` with a per-command timeout
    pub fn new(workdir: impl Into<PathBuf>, timeout: Duration) -> Self {
        Self {
            workdir: workdir.into(),
            timeout,
        }
    }

    /// Working directory every command runs in
    pub fn workdir(&self) -> &Path {
        &self.workdir
    }

    /// Per-command timeout
    pub fn timeout(&self) -> Duration {
        self.timeout
    }

    /// Run `git <args>` and return its trimmed stdout.
    ///
    /// A non-zero exit becomes [`VcsError::CommandFailed`] with both output
    /// streams captured.
    pub async fn run(&self, args: &[&str]) -> Result<String> {
        let command = args.join(" ");

        if !self.workdir.is_dir() {
            return Err(VcsError::RepositoryNotFound {
                path: self.workdir.display().to_string(),
            });
        }

        tracing::debug!(command = %command, workdir = %self.workdir.display(), "Running git");

        let output = Command::new(GIT)
            .args(args)
            .current_dir(&self.workdir)
            .env("GIT_TERMINAL_PROMPT", "0")
            .env("LC_ALL", "C")
            .stdin(Stdio::null())
            .kill_on_drop(true)
            .output();

        let output = match tokio::time::timeout(self.timeout, output).await {
            Ok(Ok(output)) => output,
            Ok(Err(source)) => {
                return Err(VcsError::Spawn {
                    program: GIT.to_string(),
                    source,
                });
            }
            Err(_) => {
                tracing::warn!(command = %command, timeout = ?self.timeout, "Git command timed out");
                return Err(VcsError::Timeout {
                    command,
                    seconds: self.timeout.as_secs(),
                });
            }
        };

        let stdout = String::from_utf8_lossy(&output.stdout).to_string();
        if output.status.success() {
            Ok(stdout.trim().to_string())
        } else {
            let stderr = String::from_utf8_lossy(&output.stderr);
            let code = output.status.code().unwrap_or(-1);
            tracing::debug!(command = %command, code, stderr = %stderr.trim(), "Git command failed");
            Err(VcsError::command_failed(command, code, stdout, stderr))
        }
    }
}
