//! Error types for autosync-vcs

/// Result type for VCS operations
pub type Result<T> = std::result::Result<T, VcsError>;

/// Raw failure returned by a VCS operation.
///
/// The engine does not match on variants. It classifies the pair
/// `(message(), output())`, so every variant must render the text the
/// underlying tool produced.
#[derive(Debug, thiserror::Error)]
pub enum VcsError {
    /// The executable could not be started at all
    #[error("{program}: command not found ({source})")]
    Spawn {
        program: String,
        #[source]
        source: std::io::Error,
    },

    /// The command did not finish within the configured timeout
    #[error("`git {command}` timed out after {seconds}s")]
    Timeout { command: String, seconds: u64 },

    /// The command exited with a non-zero status
    #[error("`git {command}` failed (exit code {code}): {stderr}")]
    CommandFailed {
        command: String,
        code: i32,
        stdout: String,
        stderr: String,
    },

    #[error("Git error: {0}")]
    Git(#[from] git2::Error),

    #[error("Repository not found at {path}")]
    RepositoryNotFound { path: String },

    #[error("Invalid revision: {revision}")]
    InvalidRevision { revision: String },
}

impl VcsError {
    /// Build a command failure from captured output
    pub fn command_failed(
        command: impl Into<String>,
        code: i32,
        stdout: impl Into<String>,
        stderr: impl Into<String>,
    ) -> Self {
        Self::CommandFailed {
            command: command.into(),
            code,
            stdout: stdout.into(),
            stderr: stderr.into().trim().to_string(),
        }
    }

    /// Primary failure text
    pub fn message(&self) -> String {
        self.to_string()
    }

    /// Secondary captured output, if the failure carried any
    pub fn output(&self) -> Option<&str> {
        match self {
            Self::CommandFailed { stdout, .. } if !stdout.trim().is_empty() => Some(stdout),
            _ => None,
        }
    }

    /// Exit code of a failed command
    pub fn exit_code(&self) -> Option<i32> {
        match self {
            Self::CommandFailed { code, .. } => Some(*code),
            _ => None,
        }
    }
}
