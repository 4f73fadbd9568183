//! Error types for autosync-core

use std::path::PathBuf;

/// Result type for autosync-core operations
pub type Result<T> = std::result::Result<T, Error>;

/// Errors that can occur in autosync-core operations
///
/// Sync failures never surface here. They are classified and turned into
/// status transitions. This type covers configuration and plumbing.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    /// Configuration file not found at expected path
    #[error("Configuration not found at {path}")]
    ConfigNotFound { path: PathBuf },

    /// Settings that parse but cannot be used
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },

    /// A scheduled task reported a failure
    #[error("Task '{key}' failed: {message}")]
    TaskFailed { key: String, message: String },

    // Transparent wrappers for underlying crate errors
    /// VCS error from autosync-vcs
    #[error(transparent)]
    Vcs(#[from] autosync_vcs::VcsError),

    /// Standard I/O error
    #[error(transparent)]
    Io(#[from] std::io::Error),

    /// TOML deserialization error
    #[error(transparent)]
    TomlDe(#[from] toml::de::Error),

    /// TOML serialization error
    #[error(transparent)]
    TomlSer(#[from] toml::ser::Error),
}
