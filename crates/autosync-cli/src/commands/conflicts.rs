//! Conflicts command implementation

use std::path::Path;

use colored::Colorize;

use crate::context::Workspace;
use crate::error::Result;

/// List files that still carry conflict markers
pub async fn run_conflicts(dir: &Path, json: bool) -> Result<()> {
    let workspace = Workspace::open(dir)?;
    let files = workspace.orchestrator.conflicts().await?;

    if json {
        println!("{}", serde_json::to_string_pretty(&files)?);
        return Ok(());
    }

    if files.is_empty() {
        println!("{}", "No conflicts".green());
        return Ok(());
    }

    println!("{}:", "Files with conflicts".bold());
    for file in &files {
        let lines: Vec<String> = file
            .regions
            .iter()
            .map(|r| format!("{}-{}", r.start_line, r.end_line))
            .collect();
        let noun = if file.count == 1 { "region" } else { "regions" };
        println!(
            "  {} {} ({} {}, lines {})",
            "!".red(),
            file.relative_path.cyan(),
            file.count,
            noun,
            lines.join(", ")
        );
    }
    println!();
    println!(
        "Resolve the marked regions, then run {} to publish the result.",
        "autosync sync".cyan()
    );

    Ok(())
}
