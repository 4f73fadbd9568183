//! Config command implementation

use std::path::Path;

use autosync_core::{SyncSettings, WORKSPACE_CONFIG_FILE};
use colored::Colorize;

use crate::context::resolve_root;
use crate::error::{CliError, Result};

/// Show effective settings, or write a default settings file
pub fn run_config(dir: &Path, init: bool) -> Result<()> {
    let root = resolve_root(dir)?;

    if init {
        let path = root.join(WORKSPACE_CONFIG_FILE);
        if path.exists() {
            return Err(CliError::user(format!(
                "{} already exists",
                path.display()
            )));
        }
        SyncSettings::default().save(&path)?;
        println!("{} {}", "Created".green().bold(), path.display());
        return Ok(());
    }

    let settings = SyncSettings::load(&root)?;
    match SyncSettings::locate(&root) {
        Some(path) => println!("{} {}", "#".dimmed(), path.display().to_string().dimmed()),
        None => println!("{}", "# built-in defaults".dimmed()),
    }
    print!("{}", toml::to_string_pretty(&settings)?);
    Ok(())
}
