//! Error types for autosync-cli

/// Result type for CLI operations
pub type Result<T> = std::result::Result<T, CliError>;

/// Errors that can occur in CLI operations
#[derive(Debug, thiserror::Error)]
pub enum CliError {
    /// Error from autosync-core
    #[error(transparent)]
    Core(#[from] autosync_core::Error),

    /// Error from autosync-vcs
    #[error(transparent)]
    Vcs(#[from] autosync_vcs::VcsError),

    /// File watcher error
    #[error("File watcher error: {0}")]
    Watch(#[from] notify::Error),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// JSON output error
    #[error(transparent)]
    Json(#[from] serde_json::Error),

    /// TOML output error
    #[error(transparent)]
    Toml(#[from] toml::ser::Error),

    /// User-facing error with a message
    #[error("{message}")]
    User { message: String },
}

impl CliError {
    /// Create a new user error with the given message
    pub fn user(message: impl Into<String>) -> Self {
        Self::User {
            message: message.into(),
        }
    }
}
