use super::{
    confirm_editor_closed, is_aborted, print_header, print_workspace_details,
    require_confirmation, Confirmer, EXIT_FAILURE, EXIT_OK,
};
use crate::cli::RepairArgs;
use crate::config::RepairDefaults;
use crate::error::{Result, RepairError};
use crate::repair::{repair_workspace, RepairOptions, RepairResult};
use crate::resolver::{find_recoverable_orphans, recover_orphan, FolderNameMatcher, OrphanMatch};
use crate::workspace::{load_workspace, scan_workspaces, short_id, Workspace};
use colored::Colorize;
use std::path::Path;

/// Effective flags after merging CLI arguments with configured defaults
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RepairPlan {
    /// Preview only
    pub dry_run: bool,
    /// Skip prompts
    pub assume_yes: bool,
    /// Drop orphaned entries
    pub remove_orphans: bool,
    /// Copy orphans back from other workspaces
    pub recover_orphans: bool,
}

impl RepairPlan {
    /// Merge CLI flags with config defaults; either source can enable a flag
    pub fn new(args: &RepairArgs, defaults: &RepairDefaults) -> Self {
        Self {
            dry_run: args.dry_run,
            assume_yes: args.yes,
            remove_orphans: args.remove_orphans || defaults.remove_orphans,
            recover_orphans: args.recover_orphans || defaults.recover_orphans,
        }
    }

    fn options(&self) -> RepairOptions {
        RepairOptions {
            dry_run: self.dry_run,
            remove_orphans: self.remove_orphans,
        }
    }

    fn needs_prompt(&self) -> bool {
        !self.dry_run && !self.assume_yes
    }
}

/// Entry point for `repair`
pub fn run_repair(
    storage_root: &Path,
    args: &RepairArgs,
    defaults: &RepairDefaults,
    confirmer: &mut dyn Confirmer,
) -> Result<u8> {
    let plan = RepairPlan::new(args, defaults);

    match execute(storage_root, args.workspace_id.as_deref(), plan, confirmer) {
        Err(e) if is_aborted(&e) => Ok(EXIT_FAILURE),
        outcome => outcome,
    }
}

fn execute(
    storage_root: &Path,
    workspace_id: Option<&str>,
    plan: RepairPlan,
    confirmer: &mut dyn Confirmer,
) -> Result<u8> {
    if plan.needs_prompt() {
        confirm_editor_closed(confirmer)?;
    }

    match workspace_id {
        Some(id) => repair_single(storage_root, id, plan, confirmer),
        None => repair_all(storage_root, plan, confirmer),
    }
}

fn print_mode_banners(plan: RepairPlan) {
    if plan.dry_run {
        println!("{}", "DRY RUN MODE - No changes will be made".cyan().bold());
        println!();
    }
    if plan.remove_orphans {
        println!("REMOVE ORPHANS MODE - Orphaned index entries will be removed");
        println!();
    }
    if plan.recover_orphans {
        println!("RECOVER ORPHANS MODE - Orphaned sessions will be copied from other workspaces");
        println!();
    }
}

fn print_orphan_match(ws: &Workspace, orphan: &OrphanMatch, indent: &str) {
    println!(
        "{}Session {}... found in workspace: {}",
        indent,
        short_id(&orphan.session_id),
        orphan.source_display_name
    );
    if orphan.same_project {
        let project = ws.project_name().unwrap_or_default();
        println!(
            "{}   {}",
            indent,
            format!("Same project folder: '{}' - likely belongs here!", project).green()
        );
    }
}

fn print_orphan_counts(ws: &Workspace, plan: RepairPlan, indent: &str) {
    let missing = ws.missing_from_index().len();
    if missing > 0 {
        println!("{}{} {}", indent, "Missing from index:".yellow(), missing);
    }
    let orphaned = ws.orphaned_in_index().len();
    if orphaned > 0 {
        let note = if plan.remove_orphans {
            "(will be removed)"
        } else {
            "(will be kept - use --remove-orphans to remove)"
        };
        println!("{}Orphaned in index: {} {}", indent, orphaned, note);
    }
}

/// Copy each match into `target`; returns how many copies succeeded
fn recover_into(target: &mut Workspace, orphans: &[OrphanMatch], indent: &str) -> usize {
    let mut recovered = 0;
    for orphan in orphans {
        match recover_orphan(target, orphan) {
            Ok(_) => {
                println!(
                    "{}{} Copied {}... from {}",
                    indent,
                    "OK".green(),
                    short_id(&orphan.session_id),
                    orphan.source_display_name
                );
                recovered += 1;
            }
            Err(e) => {
                println!(
                    "{}{} Failed to copy {}...: {:#}",
                    indent,
                    "FAILED".red(),
                    short_id(&orphan.session_id),
                    e
                );
            }
        }
    }
    recovered
}

fn print_warnings(result: &RepairResult, indent: &str) {
    for warning in &result.warnings {
        println!("{}{} {}", indent, "Warning:".yellow(), warning);
    }
}

fn print_next_steps(plan: RepairPlan, rerun: &str) {
    if plan.dry_run {
        println!("To apply these changes, run without --dry-run:");
        println!("   {}", rerun.cyan());
    } else {
        println!("Next Steps:");
        println!("   1. Start the editor");
        println!("   2. Open the Chat view");
        println!("   3. Your sessions should now be visible!");
        println!();
        println!("Backups were created for every modified database.");
    }
    println!();
}

fn repair_single(
    storage_root: &Path,
    workspace_id: &str,
    plan: RepairPlan,
    confirmer: &mut dyn Confirmer,
) -> Result<u8> {
    let mut workspace = match load_workspace(storage_root, workspace_id) {
        Ok(ws) => ws,
        Err(e) => {
            if let Some(RepairError::WorkspaceNotFound(id)) = e.downcast_ref::<RepairError>() {
                println!("{} Workspace ID '{}' not found", "Error:".red().bold(), id);
                println!();
                println!("Run `chat-history-repair list` to see available workspaces.");
                return Ok(EXIT_FAILURE);
            }
            return Err(e);
        }
    };

    print_header("Chat History Repair - Single Workspace");
    print_mode_banners(plan);

    println!("Workspace: {}", workspace.display_name().bold());
    print_workspace_details(&workspace, "   ");
    println!();

    if !workspace.needs_repair() {
        println!("{}", "This workspace doesn't need repair!".green());
        return Ok(EXIT_OK);
    }

    print_orphan_counts(&workspace, plan, "");

    let mut recoverable = Vec::new();
    if !workspace.orphaned_in_index().is_empty() {
        let all = scan_workspaces(storage_root)?;
        recoverable = find_recoverable_orphans(&workspace, &all.workspaces, &FolderNameMatcher);
        for orphan in &recoverable {
            print_orphan_match(&workspace, orphan, "   ");
        }
        if !recoverable.is_empty() && !plan.recover_orphans {
            println!(
                "   Use --recover-orphans to copy these {} session(s) back",
                recoverable.len()
            );
        }
    }
    println!();

    if plan.recover_orphans && !recoverable.is_empty() {
        if plan.dry_run {
            println!("DRY RUN: Would recover these sessions:");
            for orphan in &recoverable {
                println!(
                    "   {}... from {}",
                    short_id(&orphan.session_id),
                    orphan.source_display_name
                );
            }
        } else {
            println!("Recovering orphaned sessions...");
            recover_into(&mut workspace, &recoverable, "   ");
        }
        println!();
    }

    if plan.needs_prompt() {
        println!("This will modify the database for this workspace.");
        println!("A backup will be created before making changes.");
        println!();
        require_confirmation(confirmer, "Proceed with repair?", "")?;
    }

    println!("Repairing workspace...");
    let result = repair_workspace(&workspace, plan.options());
    print_warnings(&result, "   ");

    if !result.success {
        println!(
            "{} {}",
            "Repair failed:".red().bold(),
            result.error.as_deref().unwrap_or("unknown error")
        );
        return Ok(EXIT_FAILURE);
    }

    print_header(if plan.dry_run {
        "DRY RUN COMPLETE"
    } else {
        "REPAIR COMPLETE"
    });
    println!("Summary:");
    if result.sessions_restored > 0 {
        let verb = if plan.dry_run { "to restore" } else { "restored" };
        println!("   Sessions {}: {}", verb, result.sessions_restored);
        for session in &result.restored_sessions {
            println!("      {}  {}", short_id(&session.id).cyan(), session.title);
        }
    }
    if result.sessions_removed > 0 {
        println!("   Orphaned entries removed: {}", result.sessions_removed);
    }
    if let Some(backup) = &result.backup_path {
        println!("   Backup: {}", backup.display());
    }
    println!();

    print_next_steps(plan, &format!("chat-history-repair repair {}", workspace_id));
    Ok(EXIT_OK)
}

fn repair_all(storage_root: &Path, plan: RepairPlan, confirmer: &mut dyn Confirmer) -> Result<u8> {
    print_header("Chat History Repair - Auto Repair");
    print_mode_banners(plan);

    println!("Scanning workspaces in {}...", storage_root.display());
    let mut report = scan_workspaces(storage_root)?;
    for failure in &report.failures {
        println!(
            "{} Failed to scan {}: {}",
            "Warning:".yellow(),
            failure.id,
            failure.error
        );
    }

    if report.workspaces.is_empty() {
        println!("No workspaces with chat sessions found.");
        return Ok(EXIT_OK);
    }
    println!(
        "   Found {} workspace(s) with chat sessions",
        report.workspaces.len()
    );
    println!();

    let targets: Vec<usize> = report
        .workspaces
        .iter()
        .enumerate()
        .filter(|(_, ws)| ws.needs_repair())
        .map(|(i, _)| i)
        .collect();

    if targets.is_empty() {
        println!("{}", "All workspaces are healthy! No repairs needed.".green());
        return Ok(EXIT_OK);
    }

    println!("Found {} workspace(s) needing repair:", targets.len());
    println!();

    let mut total_missing = 0;
    let mut total_orphaned = 0;
    let mut recoverable: Vec<(usize, Vec<OrphanMatch>)> = Vec::new();

    for (n, &i) in targets.iter().enumerate() {
        let ws = &report.workspaces[i];
        println!("{}. Workspace: {}", n + 1, ws.display_name().bold());
        print_workspace_details(ws, "   ");
        print_orphan_counts(ws, plan, "   ");
        total_missing += ws.missing_from_index().len();
        total_orphaned += ws.orphaned_in_index().len();

        let found = find_recoverable_orphans(ws, &report.workspaces, &FolderNameMatcher);
        for orphan in &found {
            print_orphan_match(ws, orphan, "      ");
        }
        if !found.is_empty() {
            recoverable.push((i, found));
        }
        println!();
    }

    let recoverable_count: usize = recoverable.iter().map(|(_, found)| found.len()).sum();
    println!("Total issues:");
    println!("   Sessions to restore: {}", total_missing);
    println!("   Orphaned entries: {}", total_orphaned);
    if recoverable_count > 0 {
        println!("   Orphans found in other workspaces: {}", recoverable_count);
        if plan.recover_orphans {
            println!("      Will be recovered (copied back)");
        } else {
            println!("      (Use --recover-orphans to copy them back)");
        }
    }
    println!();

    if plan.recover_orphans && recoverable_count > 0 {
        if plan.dry_run {
            println!("DRY RUN: Would recover these sessions:");
            for (_, found) in &recoverable {
                for orphan in found {
                    println!(
                        "   {}... from {}",
                        short_id(&orphan.session_id),
                        orphan.source_display_name
                    );
                }
            }
            println!();
        } else {
            println!("Recovering orphaned sessions from other workspaces...");
            println!();
            let mut total_recovered = 0;
            for (i, found) in &recoverable {
                let target = &mut report.workspaces[*i];
                println!("   Recovering to: {}", target.display_name());
                total_recovered += recover_into(target, found, "      ");
                println!();
            }
            println!("Recovered {} session(s)", total_recovered);
            println!();
        }
    }

    if plan.needs_prompt() {
        println!("This will modify the database for these workspaces.");
        println!("Backups will be created before making changes.");
        println!();
        require_confirmation(confirmer, "Proceed with repair?", "")?;
    }

    println!("Repairing workspaces...");
    println!();

    let mut success_count = 0;
    let mut fail_count = 0;
    let mut total_restored = 0;
    let mut total_removed = 0;

    for &i in &targets {
        let ws = &report.workspaces[i];
        println!("   Repairing: {}", ws.display_name());
        if let Some(folder) = &ws.folder {
            println!("      Path: {}", folder);
        }

        let result = repair_workspace(ws, plan.options());
        print_warnings(&result, "      ");
        if result.success {
            if result.sessions_restored > 0 {
                let verb = if plan.dry_run { "Will restore" } else { "Restored" };
                println!(
                    "      {} {} session(s)",
                    verb.green(),
                    result.sessions_restored
                );
            }
            if result.sessions_removed > 0 {
                let verb = if plan.dry_run { "Will remove" } else { "Removed" };
                println!(
                    "      {} {} orphaned entr{}",
                    verb,
                    result.sessions_removed,
                    if result.sessions_removed == 1 { "y" } else { "ies" }
                );
            }
            total_restored += result.sessions_restored;
            total_removed += result.sessions_removed;
            success_count += 1;
        } else {
            println!(
                "      {} {}",
                "Failed:".red(),
                result.error.as_deref().unwrap_or("unknown error")
            );
            fail_count += 1;
        }
        println!();
    }

    print_header(if plan.dry_run {
        "DRY RUN COMPLETE"
    } else {
        "REPAIR COMPLETE"
    });
    println!("Results:");
    println!("   Workspaces repaired: {}", success_count);
    if fail_count > 0 {
        println!("   {} {}", "Failed:".red(), fail_count);
    }
    println!("   Total sessions restored: {}", total_restored);
    if total_removed > 0 {
        println!("   Total orphaned entries removed: {}", total_removed);
    }
    println!();

    print_next_steps(plan, "chat-history-repair repair");

    Ok(if fail_count == 0 {
        EXIT_OK
    } else {
        EXIT_FAILURE
    })
}
