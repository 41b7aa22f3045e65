//! chat-history-repair - chat session index reconciliation library
//!
//! The editor stores each chat session as a JSON file in a workspace's
//! `chatSessions/` directory and lists sessions from an index kept in the
//! workspace's `state.vscdb` SQLite database. When the two drift apart,
//! sessions vanish from the UI even though their files are intact. This
//! library finds the drift and rebuilds the index from the files.
//!
//! # Architecture
//!
//! - `workspace`: scans the storage root and loads on-disk and indexed session sets
//! - `resolver`: locates orphaned sessions in other workspaces and copies them back
//! - `repair`: rebuilds the index from session files and writes it with a backup
//! - `session`: session file model and title/timestamp derivation
//! - `storage`: state database access (index read/write, backups)
//! - `config`: configuration management and storage root resolution
//! - `commands` / `cli`: the command-line front end
//! - `error`: error types and result alias
//!
//! # Example
//!
//! ```no_run
//! use chat_history_repair::repair::{repair_workspace, RepairOptions};
//! use chat_history_repair::workspace::scan_workspaces;
//! use std::path::Path;
//!
//! fn main() -> anyhow::Result<()> {
//!     let report = scan_workspaces(Path::new("/home/me/.config/Code/User/workspaceStorage"))?;
//!     for ws in report.needing_repair() {
//!         let result = repair_workspace(ws, RepairOptions { dry_run: true, remove_orphans: false });
//!         println!("{}: {} session(s) to restore", ws.id, result.sessions_restored);
//!     }
//!     Ok(())
//! }
//! ```

pub mod cli;
pub mod commands;
pub mod config;
pub mod error;
pub mod repair;
pub mod resolver;
pub mod session;
pub mod storage;
pub mod workspace;

// Re-export commonly used types
pub use config::Config;
pub use error::{RepairError, Result};
pub use repair::{repair_workspace, RepairOptions, RepairResult};
pub use resolver::{find_orphan_source, recover_orphan, FolderNameMatcher, ProjectMatcher};
pub use workspace::{scan_workspaces, ScanReport, Workspace};
