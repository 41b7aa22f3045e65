//! Workspace discovery
//!
//! The host keeps one directory per workspace under its storage root. Each
//! directory may hold a `workspace.json` metadata file, a `chatSessions/`
//! directory of session files, and the `state.vscdb` database carrying the
//! session index. Scanning is read-only and never aborts on a single bad
//! workspace.

use crate::error::{Result, RepairError};
use crate::session::SESSIONS_DIR;
use crate::storage::{IndexLookup, IndexStore, STATE_DB_FILE};
use anyhow::Context;
use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Metadata file name inside a workspace directory
pub const WORKSPACE_METADATA_FILE: &str = "workspace.json";

const WORKSPACE_FILE_EXTENSION: &str = ".code-workspace";

/// `workspace.json` as written by the host
#[derive(Debug, Clone, Default, Deserialize)]
pub struct WorkspaceMetadata {
    /// Folder the workspace was opened on
    #[serde(default)]
    pub folder: Option<FolderRef>,
    /// Multi-root workspace definition file
    #[serde(default)]
    pub workspace: Option<String>,
}

/// The `folder` field appears either as a URI string or as an object
#[derive(Debug, Clone, Deserialize)]
#[serde(untagged)]
pub enum FolderRef {
    /// `"folder": "file:///home/me/project"`
    Uri(String),
    /// `"folder": {"path": "/home/me/project"}`
    Object {
        /// Folder path
        path: String,
    },
    /// Any other shape; treated as absent
    Other(serde_json::Value),
}

impl FolderRef {
    fn into_path(self) -> Option<String> {
        match self {
            FolderRef::Uri(uri) => Some(uri),
            FolderRef::Object { path } => Some(path),
            FolderRef::Other(_) => None,
        }
    }
}

impl WorkspaceMetadata {
    /// Read `workspace.json` from a workspace directory
    ///
    /// Returns `None` when the file is absent or cannot be parsed.
    pub fn load(workspace_dir: &Path) -> Option<Self> {
        let path = workspace_dir.join(WORKSPACE_METADATA_FILE);
        if !path.exists() {
            return None;
        }
        let parsed = std::fs::read_to_string(&path)
            .map_err(anyhow::Error::from)
            .and_then(|s| serde_json::from_str::<Self>(&s).map_err(anyhow::Error::from));
        match parsed {
            Ok(metadata) => Some(metadata),
            Err(e) => {
                tracing::warn!(path = %path.display(), "Ignoring unreadable workspace metadata: {}", e);
                None
            }
        }
    }

    /// Split into (folder, workspace file); a folder takes precedence
    pub fn into_association(self) -> (Option<String>, Option<String>) {
        match self.folder {
            Some(folder) => (folder.into_path(), None),
            None => (None, self.workspace),
        }
    }
}

/// Final path component of a folder path or `file://` URI
///
/// Returns `None` for an empty path or one without a usable last component.
pub fn project_name(folder: &str) -> Option<String> {
    let path = match url::Url::parse(folder) {
        Ok(url) if url.scheme() == "file" => match url.to_file_path() {
            Ok(path) => path.to_string_lossy().into_owned(),
            Err(()) => url.path().to_string(),
        },
        Ok(url) if url.has_host() || url.path().starts_with('/') => url.path().to_string(),
        _ => folder.to_string(),
    };

    let is_separator = |c: char| c == '/' || c == '\\';
    path.trim_end_matches(is_separator)
        .rsplit(is_separator)
        .next()
        .filter(|name| !name.is_empty())
        .map(str::to_string)
}

/// One workspace directory with its on-disk and indexed session sets
#[derive(Debug, Clone, Serialize)]
pub struct Workspace {
    /// Directory name
    pub id: String,
    /// Workspace directory
    pub path: PathBuf,
    /// Folder path or URI, when the workspace was opened on a folder
    pub folder: Option<String>,
    /// Workspace definition file, when opened from one
    pub workspace_file: Option<String>,
    /// Session IDs with a `<id>.json` file in `chatSessions/`
    pub sessions_on_disk: BTreeSet<String>,
    /// Session IDs present in the stored index
    pub sessions_in_index: BTreeSet<String>,
}

impl Workspace {
    /// Load a workspace from its directory
    ///
    /// Unreadable metadata and an unreadable index are tolerated (logged and
    /// treated as absent). Only a failure to list the session directory is
    /// returned as an error.
    pub fn load(workspace_dir: &Path) -> Result<Self> {
        let id = workspace_dir
            .file_name()
            .map(|n| n.to_string_lossy().into_owned())
            .ok_or_else(|| {
                RepairError::Storage(format!(
                    "Invalid workspace directory: {}",
                    workspace_dir.display()
                ))
            })?;

        let (folder, workspace_file) = WorkspaceMetadata::load(workspace_dir)
            .map(WorkspaceMetadata::into_association)
            .unwrap_or((None, None));

        let sessions_on_disk = list_session_ids(&workspace_dir.join(SESSIONS_DIR))?;

        let store = IndexStore::new(workspace_dir.join(STATE_DB_FILE));
        let sessions_in_index = match store.read_index() {
            IndexLookup::Found(index) => index.entries.into_keys().collect(),
            IndexLookup::Missing => BTreeSet::new(),
            IndexLookup::Invalid(reason) => {
                tracing::warn!(workspace = %id, "Treating index as empty: {}", reason);
                BTreeSet::new()
            }
        };

        Ok(Self {
            id,
            path: workspace_dir.to_path_buf(),
            folder,
            workspace_file,
            sessions_on_disk,
            sessions_in_index,
        })
    }

    /// Directory holding the session files
    pub fn sessions_dir(&self) -> PathBuf {
        self.path.join(SESSIONS_DIR)
    }

    /// Path of the session file for `session_id`
    pub fn session_file(&self, session_id: &str) -> PathBuf {
        self.sessions_dir().join(format!("{}.json", session_id))
    }

    /// Path to the state database
    pub fn db_path(&self) -> PathBuf {
        self.path.join(STATE_DB_FILE)
    }

    /// Index store for this workspace
    pub fn index_store(&self) -> IndexStore {
        IndexStore::new(self.db_path())
    }

    /// Session files that exist but are not in the index
    pub fn missing_from_index(&self) -> BTreeSet<String> {
        self.sessions_on_disk
            .difference(&self.sessions_in_index)
            .cloned()
            .collect()
    }

    /// Index entries without a session file
    pub fn orphaned_in_index(&self) -> BTreeSet<String> {
        self.sessions_in_index
            .difference(&self.sessions_on_disk)
            .cloned()
            .collect()
    }

    /// True when the index and the session files disagree
    pub fn needs_repair(&self) -> bool {
        self.sessions_on_disk != self.sessions_in_index
    }

    /// True when at least one session file exists
    pub fn has_sessions(&self) -> bool {
        !self.sessions_on_disk.is_empty()
    }

    /// Project name from the folder, if known
    pub fn project_name(&self) -> Option<String> {
        self.folder.as_deref().and_then(project_name)
    }

    /// Short identifier, the first 8 characters of the ID
    pub fn short_id(&self) -> &str {
        short_id(&self.id)
    }

    /// Human-readable name for listings
    pub fn display_name(&self) -> String {
        if let Some(name) = self.project_name() {
            return format!("{} ({}...) [Folder]", name, self.short_id());
        }
        if let Some(name) = self.workspace_file.as_deref().and_then(project_name) {
            let name = name
                .strip_suffix(WORKSPACE_FILE_EXTENSION)
                .unwrap_or(&name)
                .to_string();
            return format!("{} ({}...) [Workspace File]", name, self.short_id());
        }
        format!("Unknown ({}...)", self.short_id())
    }
}

/// First 8 characters of an ID, or the whole ID if shorter
pub fn short_id(id: &str) -> &str {
    match id.char_indices().nth(8) {
        Some((idx, _)) => &id[..idx],
        None => id,
    }
}

fn list_session_ids(sessions_dir: &Path) -> Result<BTreeSet<String>> {
    let mut ids = BTreeSet::new();
    if !sessions_dir.is_dir() {
        return Ok(ids);
    }
    for entry in WalkDir::new(sessions_dir).min_depth(1).max_depth(1) {
        let entry = entry
            .with_context(|| format!("Failed to list {}", sessions_dir.display()))?;
        let path = entry.path();
        if !entry.file_type().is_file() || path.extension().map_or(true, |e| e != "json") {
            continue;
        }
        if let Some(stem) = path.file_stem() {
            ids.insert(stem.to_string_lossy().into_owned());
        }
    }
    Ok(ids)
}

/// A workspace directory that could not be scanned
#[derive(Debug, Clone)]
pub struct ScanFailure {
    /// Directory name
    pub id: String,
    /// What went wrong
    pub error: String,
}

/// Result of scanning a storage root
#[derive(Debug, Clone, Default)]
pub struct ScanReport {
    /// Workspaces with at least one session file, in directory-name order
    pub workspaces: Vec<Workspace>,
    /// Directories that failed to load
    pub failures: Vec<ScanFailure>,
}

impl ScanReport {
    /// Workspaces whose index disagrees with their session files
    pub fn needing_repair(&self) -> impl Iterator<Item = &Workspace> {
        self.workspaces.iter().filter(|ws| ws.needs_repair())
    }

    /// Look up a scanned workspace by ID
    pub fn get(&self, id: &str) -> Option<&Workspace> {
        self.workspaces.iter().find(|ws| ws.id == id)
    }
}

/// Scan every workspace directory under `storage_root`
///
/// A missing root yields an empty report. Workspaces without session files
/// are left out. Directories are visited in file-name order.
pub fn scan_workspaces(storage_root: &Path) -> Result<ScanReport> {
    let mut report = ScanReport::default();
    if !storage_root.is_dir() {
        tracing::debug!(root = %storage_root.display(), "Storage root does not exist");
        return Ok(report);
    }

    let walker = WalkDir::new(storage_root)
        .min_depth(1)
        .max_depth(1)
        .sort_by_file_name();

    for entry in walker {
        let entry = entry
            .with_context(|| format!("Failed to list {}", storage_root.display()))?;
        if !entry.file_type().is_dir() {
            continue;
        }
        let id = entry.file_name().to_string_lossy().into_owned();
        match Workspace::load(entry.path()) {
            Ok(ws) if ws.has_sessions() => report.workspaces.push(ws),
            Ok(_) => {}
            Err(e) => {
                tracing::warn!(workspace = %id, "Failed to scan workspace: {:#}", e);
                report.failures.push(ScanFailure {
                    id,
                    error: format!("{:#}", e),
                });
            }
        }
    }

    tracing::debug!(
        root = %storage_root.display(),
        workspaces = report.workspaces.len(),
        failures = report.failures.len(),
        "Scan complete"
    );
    Ok(report)
}

/// Load a single workspace by ID
///
/// Unlike [`scan_workspaces`] this returns the workspace even when it has
/// no session files, so a targeted repair can still clean up its index.
pub fn load_workspace(storage_root: &Path, id: &str) -> Result<Workspace> {
    let dir = storage_root.join(id);
    if id.is_empty() || !dir.is_dir() {
        return Err(RepairError::WorkspaceNotFound(id.to_string()).into());
    }
    Workspace::load(&dir)
}
