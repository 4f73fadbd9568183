//! Administrative settings
//!
//! Settings are looked up in the workspace first (`.autosync.toml`), then in
//! the user configuration directory (`autosync/config.toml`), and fall back
//! to defaults. The engine re-reads them through [`SettingsSource`] at every
//! cycle instead of caching values.

use std::fs;
use std::path::{Path, PathBuf};
use std::sync::RwLock;
use std::time::Duration;

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Workspace-local settings file name
pub const WORKSPACE_CONFIG_FILE: &str = ".autosync.toml";

/// Directory under the user config dir holding the global settings file
const GLOBAL_CONFIG_DIR: &str = "autosync";
const GLOBAL_CONFIG_FILE: &str = "config.toml";

/// Tunables of the synchronization engine
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct SyncSettings {
    /// Master switch for the auto-commit and auto-pull paths
    pub auto_sync: bool,
    pub pull_interval_min_secs: u64,
    pub pull_interval_max_secs: u64,
    /// Inactivity after the last save before committing
    pub quiet_period_secs: u64,
    /// Network retries before going offline
    pub max_network_retries: u32,
    pub retry_backoff_secs: u64,
    /// Per-command timeout for the VCS executable
    pub command_timeout_secs: u64,
    pub remote: String,
}

impl Default for SyncSettings {
    fn default() -> Self {
        Self {
            auto_sync: true,
            pull_interval_min_secs: 300,
            pull_interval_max_secs: 600,
            quiet_period_secs: 60,
            max_network_retries: 3,
            retry_backoff_secs: 30,
            command_timeout_secs: 30,
            remote: "origin".to_string(),
        }
    }
}

impl SyncSettings {
    /// Resolve settings for `workspace` using the documented lookup order.
    pub fn load(workspace: &Path) -> Result<Self> {
        match Self::locate(workspace) {
            Some(path) => Self::load_from(&path),
            None => {
                tracing::debug!("No settings file found, using defaults");
                Ok(Self::default())
            }
        }
    }

    /// First existing settings file for `workspace`, if any
    pub fn locate(workspace: &Path) -> Option<PathBuf> {
        let local = workspace.join(WORKSPACE_CONFIG_FILE);
        if local.is_file() {
            return Some(local);
        }
        global_config_path().filter(|path| path.is_file())
    }

    /// Load and validate a settings file.
    ///
    /// # Errors
    ///
    /// Returns [`Error::ConfigNotFound`] if the file does not exist, and
    /// [`Error::InvalidConfig`] if the values are inconsistent.
    pub fn load_from(path: &Path) -> Result<Self> {
        if !path.exists() {
            return Err(Error::ConfigNotFound {
                path: path.to_path_buf(),
            });
        }

        let content = fs::read_to_string(path)?;
        let settings: SyncSettings = toml::from_str(&content)?;
        settings.validate()?;

        tracing::debug!(path = %path.display(), "Loaded settings");
        Ok(settings)
    }

    /// Write settings with write-to-temp-then-rename.
    pub fn save(&self, path: &Path) -> Result<()> {
        self.validate()?;
        let content = toml::to_string_pretty(self)?;

        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }

        let temp_path = path.with_extension("toml.tmp");
        fs::write(&temp_path, &content)?;
        fs::rename(&temp_path, path)?;

        tracing::debug!(path = %path.display(), "Saved settings");
        Ok(())
    }

    pub fn validate(&self) -> Result<()> {
        if self.pull_interval_min_secs > self.pull_interval_max_secs {
            return Err(Error::InvalidConfig {
                message: format!(
                    "pull_interval_min_secs ({}) exceeds pull_interval_max_secs ({})",
                    self.pull_interval_min_secs, self.pull_interval_max_secs
                ),
            });
        }
        if self.command_timeout_secs == 0 {
            return Err(Error::InvalidConfig {
                message: "command_timeout_secs must be positive".to_string(),
            });
        }
        if self.remote.trim().is_empty() {
            return Err(Error::InvalidConfig {
                message: "remote must not be empty".to_string(),
            });
        }
        Ok(())
    }

    pub fn quiet_period(&self) -> Duration {
        Duration::from_secs(self.quiet_period_secs)
    }

    pub fn retry_backoff(&self) -> Duration {
        Duration::from_secs(self.retry_backoff_secs)
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Bounds of the randomized pull cadence
    pub fn pull_interval(&self) -> (Duration, Duration) {
        (
            Duration::from_secs(self.pull_interval_min_secs),
            Duration::from_secs(self.pull_interval_max_secs),
        )
    }
}

/// Path of the per-user settings file
pub fn global_config_path() -> Option<PathBuf> {
    dirs::config_dir().map(|dir| dir.join(GLOBAL_CONFIG_DIR).join(GLOBAL_CONFIG_FILE))
}

/// Read access to the current settings plus the one toggle the engine owns
pub trait SettingsSource: Send + Sync {
    /// Snapshot of the settings as of now
    fn current(&self) -> SyncSettings;

    fn set_auto_sync(&self, enabled: bool);
}

/// In-memory settings shared between the engine and its host
#[derive(Debug, Default)]
pub struct SharedSettings {
    inner: RwLock<SyncSettings>,
}

impl SharedSettings {
    pub fn new(settings: SyncSettings) -> Self {
        Self {
            inner: RwLock::new(settings),
        }
    }

    /// Replace every value, e.g. after the settings file changed
    pub fn replace(&self, settings: SyncSettings) {
        *self.inner.write().unwrap_or_else(|e| e.into_inner()) = settings;
    }
}

impl SettingsSource for SharedSettings {
    fn current(&self) -> SyncSettings {
        self.inner.read().unwrap_or_else(|e| e.into_inner()).clone()
    }

    fn set_auto_sync(&self, enabled: bool) {
        self.inner.write().unwrap_or_else(|e| e.into_inner()).auto_sync = enabled;
    }
}
