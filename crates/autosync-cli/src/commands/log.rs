//! History commands: `log` and `show`

use std::path::Path;

use autosync_vcs::CommitRecord;
use chrono::Local;
use colored::Colorize;
use serde_json::{Value, json};

use crate::context::Workspace;
use crate::error::Result;

/// Print a page of commit history
pub async fn run_log(dir: &Path, limit: usize, offset: usize, json: bool) -> Result<()> {
    let workspace = Workspace::open(dir)?;
    let commits = workspace.orchestrator.history(limit, offset).await?;

    if json {
        let entries: Vec<Value> = commits.iter().map(commit_json).collect();
        println!("{}", serde_json::to_string_pretty(&entries)?);
        return Ok(());
    }

    if commits.is_empty() {
        println!("{}", "No commits".dimmed());
        return Ok(());
    }

    for commit in &commits {
        let when = commit.timestamp.with_timezone(&Local).format("%Y-%m-%d %H:%M");
        println!(
            "{} {} {}",
            commit.hash.yellow(),
            commit.message,
            format!("({}, {})", commit.author, when).dimmed()
        );
    }
    Ok(())
}

/// Print the files touched by a revision
pub async fn run_show(dir: &Path, revision: &str) -> Result<()> {
    let workspace = Workspace::open(dir)?;
    let files = workspace.orchestrator.changed_files(revision).await?;

    if files.is_empty() {
        println!("{}", "No files changed".dimmed());
        return Ok(());
    }
    for file in &files {
        println!("  {} {}", "M".cyan(), file);
    }
    Ok(())
}

fn commit_json(commit: &CommitRecord) -> Value {
    json!({
        "hash": commit.hash,
        "id": commit.id,
        "message": commit.message,
        "author": commit.author,
        "timestamp": commit.timestamp.to_rfc3339(),
    })
}
