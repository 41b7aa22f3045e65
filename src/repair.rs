//! Index rebuild and repair
//!
//! Rebuilding reads every session file of a workspace in sorted ID order
//! and produces a fresh index entry for each. Repair wraps the rebuild with
//! the backup and the write, and turns any workspace-level failure into a
//! [`RepairResult`] instead of an error so batch runs can carry on.

use crate::error::Result;
use crate::session::SessionFile;
use crate::storage::{ChatSessionIndex, IndexLookup, INDEX_VERSION};
use crate::workspace::Workspace;
use serde::Serialize;
use std::path::PathBuf;

/// Flags controlling a repair
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RepairOptions {
    /// Compute the new index without writing anything
    pub dry_run: bool,
    /// Drop index entries whose session file is missing
    pub remove_orphans: bool,
}

/// A session that was missing from the index and is now in it
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RestoredSession {
    /// Session ID
    pub id: String,
    /// Derived title
    pub title: String,
    /// Last exchange timestamp
    pub last_message_date: i64,
}

/// The index computed from a workspace's session files
#[derive(Debug, Clone)]
pub struct RebuiltIndex {
    /// The new index record
    pub index: ChatSessionIndex,
    /// Previously missing sessions that made it into `index`
    pub restored: Vec<RestoredSession>,
    /// Per-session problems; those sessions were left out
    pub warnings: Vec<String>,
}

/// Outcome of repairing one workspace
#[derive(Debug, Clone, Default, Serialize)]
pub struct RepairResult {
    /// True when the index was rebuilt (and written, unless dry run)
    pub success: bool,
    /// Number of missing sessions added to the index
    pub sessions_restored: usize,
    /// Number of orphaned entries dropped
    pub sessions_removed: usize,
    /// Workspace-level failure, when `success` is false
    pub error: Option<String>,
    /// Sessions added to the index
    pub restored_sessions: Vec<RestoredSession>,
    /// Non-fatal per-session problems
    pub warnings: Vec<String>,
    /// Backup written before the index update
    pub backup_path: Option<PathBuf>,
}

/// Rebuild the index for `workspace` from its session files
///
/// With `remove_orphans` off, the stored index is the starting point and
/// entries without a session file survive untouched; with it on, the
/// rebuild starts empty. Every session with a file gets a freshly
/// generated entry. A session file that cannot be parsed is skipped and reported in
/// `warnings`.
pub fn rebuild_index(workspace: &Workspace, remove_orphans: bool) -> RebuiltIndex {
    let mut index = ChatSessionIndex::default();
    if !remove_orphans {
        match workspace.index_store().read_index() {
            IndexLookup::Found(existing) => index.entries = existing.entries,
            IndexLookup::Missing => {}
            IndexLookup::Invalid(reason) => {
                tracing::warn!(workspace = %workspace.id, "Existing index unusable: {}", reason);
            }
        }
    }
    index.version = INDEX_VERSION;

    let missing = workspace.missing_from_index();
    let mut restored = Vec::new();
    let mut warnings = Vec::new();

    // BTreeSet iteration is already sorted by ID.
    for session_id in &workspace.sessions_on_disk {
        let path = workspace.session_file(session_id);
        let session = match SessionFile::load(session_id, &path) {
            Ok(session) => session,
            Err(e) => {
                tracing::warn!(workspace = %workspace.id, session = %session_id, "Skipping session: {:#}", e);
                warnings.push(format!("{:#}", e));
                continue;
            }
        };

        let metadata = session.metadata(session_id);
        if let Err(e) = index.insert(&metadata.to_index_entry()) {
            tracing::warn!(workspace = %workspace.id, session = %session_id, "Skipping session: {}", e);
            warnings.push(format!("Failed to encode index entry for {}: {}", session_id, e));
            continue;
        }
        if missing.contains(session_id) {
            restored.push(RestoredSession {
                id: session_id.clone(),
                title: metadata.title,
                last_message_date: metadata.last_message_date,
            });
        }
    }

    RebuiltIndex {
        index,
        restored,
        warnings,
    }
}

/// Back up the database and store `index` in it
///
/// Returns the backup path.
pub fn write_rebuilt_index(workspace: &Workspace, index: &ChatSessionIndex) -> Result<PathBuf> {
    let store = workspace.index_store();
    let backup = store.backup()?;
    store.write_index(index)?;
    Ok(backup)
}

/// Repair one workspace's index
///
/// Never returns an error: failures are reported through
/// [`RepairResult::error`] with `success` set to false.
pub fn repair_workspace(workspace: &Workspace, options: RepairOptions) -> RepairResult {
    tracing::debug!(
        workspace = %workspace.id,
        dry_run = options.dry_run,
        remove_orphans = options.remove_orphans,
        "Repairing workspace"
    );

    let rebuilt = rebuild_index(workspace, options.remove_orphans);
    let mut result = RepairResult {
        warnings: rebuilt.warnings,
        ..Default::default()
    };

    if !options.dry_run {
        match write_rebuilt_index(workspace, &rebuilt.index) {
            Ok(backup) => result.backup_path = Some(backup),
            Err(e) => {
                tracing::error!(workspace = %workspace.id, "Repair failed: {:#}", e);
                result.error = Some(format!("{:#}", e));
                return result;
            }
        }
    }

    result.success = true;
    result.sessions_restored = rebuilt.restored.len();
    result.restored_sessions = rebuilt.restored;
    if options.remove_orphans {
        result.sessions_removed = workspace.orphaned_in_index().len();
    }
    result
}
