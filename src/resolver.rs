//! Cross-workspace orphan resolution
//!
//! An orphaned index entry points at a session file that is gone from its
//! own workspace. The file sometimes survives under a different workspace
//! directory (the host creates a new workspace ID when a folder is moved or
//! reopened through another path). This module finds such copies and, when
//! asked, copies them back.

use crate::error::{Result, RepairError};
use crate::workspace::{project_name, Workspace};
use serde::Serialize;
use std::path::PathBuf;

/// Decides whether two workspace folders belong to the same project
pub trait ProjectMatcher {
    /// `None` means the folder is unknown
    fn same_project(&self, a: Option<&str>, b: Option<&str>) -> bool;
}

/// Matches folders by their final path component, ignoring case
///
/// Two unrelated checkouts that share a directory name will match; the
/// result is a hint for the operator, not proof of ownership.
#[derive(Debug, Clone, Copy, Default)]
pub struct FolderNameMatcher;

impl ProjectMatcher for FolderNameMatcher {
    fn same_project(&self, a: Option<&str>, b: Option<&str>) -> bool {
        let (Some(a), Some(b)) = (a.and_then(project_name), b.and_then(project_name)) else {
            return false;
        };
        a.to_lowercase() == b.to_lowercase()
    }
}

/// An orphaned session found as a file in another workspace
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct OrphanMatch {
    /// The orphaned session ID
    pub session_id: String,
    /// Workspace that holds the file
    pub source_workspace_id: String,
    /// Display name of the source workspace
    pub source_display_name: String,
    /// Path of the session file in the source workspace
    pub source_file: PathBuf,
    /// Whether both workspaces look like the same project
    pub same_project: bool,
}

/// Find `session_id` as a session file in a workspace other than `current`
///
/// Workspaces are checked in the order given; the first hit wins.
pub fn find_orphan_source(
    session_id: &str,
    current: &Workspace,
    all: &[Workspace],
    matcher: &dyn ProjectMatcher,
) -> Option<OrphanMatch> {
    all.iter()
        .find(|ws| ws.id != current.id && ws.sessions_on_disk.contains(session_id))
        .map(|ws| OrphanMatch {
            session_id: session_id.to_string(),
            source_workspace_id: ws.id.clone(),
            source_display_name: ws.display_name(),
            source_file: ws.session_file(session_id),
            same_project: matcher.same_project(current.folder.as_deref(), ws.folder.as_deref()),
        })
}

/// Resolve every orphan of `current`, in session ID order
pub fn find_recoverable_orphans(
    current: &Workspace,
    all: &[Workspace],
    matcher: &dyn ProjectMatcher,
) -> Vec<OrphanMatch> {
    current
        .orphaned_in_index()
        .iter()
        .filter_map(|id| find_orphan_source(id, current, all, matcher))
        .collect()
}

/// Copy an orphan's session file into `target` and record it as on disk
///
/// The session directory is created if needed. An existing file at the
/// destination is left alone and reported as an error.
pub fn recover_orphan(target: &mut Workspace, orphan: &OrphanMatch) -> Result<PathBuf> {
    let destination = target.session_file(&orphan.session_id);
    if destination.exists() {
        return Err(RepairError::Recovery(format!(
            "{} already exists",
            destination.display()
        ))
        .into());
    }

    std::fs::create_dir_all(target.sessions_dir()).map_err(|e| {
        RepairError::Recovery(format!(
            "Failed to create {}: {}",
            target.sessions_dir().display(),
            e
        ))
    })?;

    std::fs::copy(&orphan.source_file, &destination).map_err(|e| {
        RepairError::Recovery(format!(
            "Failed to copy {} to {}: {}",
            orphan.source_file.display(),
            destination.display(),
            e
        ))
    })?;

    target.sessions_on_disk.insert(orphan.session_id.clone());
    tracing::info!(
        session = %orphan.session_id,
        from = %orphan.source_workspace_id,
        to = %target.id,
        "Recovered orphaned session"
    );
    Ok(destination)
}
