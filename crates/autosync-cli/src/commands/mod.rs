//! Command implementations for autosync-cli

pub mod config;
pub mod conflicts;
pub mod log;
pub mod status;
pub mod sync;
pub mod watch;

pub use config::run_config;
pub use conflicts::run_conflicts;
pub use log::{run_log, run_show};
pub use status::run_status;
pub use sync::run_sync;
pub use watch::run_watch;
