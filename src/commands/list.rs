use super::{print_header, EXIT_OK};
use crate::error::Result;
use crate::workspace::{scan_workspaces, Workspace};
use colored::Colorize;
use prettytable::{format, Table};
use serde::Serialize;
use std::path::Path;

/// Workspace summary for JSON output
#[derive(Debug, Serialize)]
pub struct WorkspaceSummary<'a> {
    /// Workspace ID
    pub id: &'a str,
    /// Display name
    pub name: String,
    /// Folder path or URI
    pub folder: Option<&'a str>,
    /// Workspace definition file
    pub workspace_file: Option<&'a str>,
    /// Session files on disk
    pub sessions_on_disk: usize,
    /// Entries in the index
    pub sessions_in_index: usize,
    /// Session IDs missing from the index
    pub missing_from_index: Vec<String>,
    /// Index entries without a file
    pub orphaned_in_index: Vec<String>,
    /// Whether a repair would change the index
    pub needs_repair: bool,
}

impl<'a> From<&'a Workspace> for WorkspaceSummary<'a> {
    fn from(ws: &'a Workspace) -> Self {
        Self {
            id: &ws.id,
            name: ws.display_name(),
            folder: ws.folder.as_deref(),
            workspace_file: ws.workspace_file.as_deref(),
            sessions_on_disk: ws.sessions_on_disk.len(),
            sessions_in_index: ws.sessions_in_index.len(),
            missing_from_index: ws.missing_from_index().into_iter().collect(),
            orphaned_in_index: ws.orphaned_in_index().into_iter().collect(),
            needs_repair: ws.needs_repair(),
        }
    }
}

/// List all workspaces that have chat sessions
pub fn run_list(storage_root: &Path, json: bool) -> Result<u8> {
    let report = scan_workspaces(storage_root)?;

    if json {
        let summaries: Vec<WorkspaceSummary<'_>> =
            report.workspaces.iter().map(WorkspaceSummary::from).collect();
        println!("{}", serde_json::to_string_pretty(&summaries)?);
        return Ok(EXIT_OK);
    }

    print_header("Workspaces with Chat Sessions");

    for failure in &report.failures {
        println!(
            "{} Failed to scan {}: {}",
            "Warning:".yellow(),
            failure.id,
            failure.error
        );
    }

    if report.workspaces.is_empty() {
        println!("{}", "No workspaces with chat sessions found.".yellow());
        println!("Storage root: {}", storage_root.display());
        return Ok(EXIT_OK);
    }

    let mut table = Table::new();
    table.set_format(*format::consts::FORMAT_BORDERS_ONLY);
    table.add_row(prettytable::row![
        "#".bold(),
        "Workspace".bold(),
        "ID".bold(),
        "On Disk".bold(),
        "Indexed".bold(),
        "Missing".bold(),
        "Orphaned".bold(),
        "Status".bold()
    ]);

    for (i, ws) in report.workspaces.iter().enumerate() {
        let status = if ws.needs_repair() {
            "NEEDS REPAIR".yellow()
        } else {
            "HEALTHY".green()
        };
        table.add_row(prettytable::row![
            i + 1,
            ws.display_name(),
            ws.id.cyan(),
            ws.sessions_on_disk.len(),
            ws.sessions_in_index.len(),
            ws.missing_from_index().len(),
            ws.orphaned_in_index().len(),
            status
        ]);
    }

    println!("Found {} workspace(s):", report.workspaces.len());
    table.printstd();
    println!();

    let needs_repair: Vec<&Workspace> = report.needing_repair().collect();
    if let Some(first) = needs_repair.first() {
        println!(
            "Summary: {} workspace(s) need repair",
            needs_repair.len().to_string().yellow()
        );
        println!();
        println!(
            "To repair all workspaces:        {}",
            "chat-history-repair repair".cyan()
        );
        println!(
            "To repair a specific workspace:  {}",
            format!("chat-history-repair repair {}", first.id).cyan()
        );
    } else {
        println!("{}", "All workspaces are healthy!".green());
    }
    println!();

    Ok(EXIT_OK)
}
