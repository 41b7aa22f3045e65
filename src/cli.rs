//! Command-line interface definition for chat-history-repair
//!
//! This module defines the CLI structure using clap's derive API,
//! providing commands for listing workspaces and repairing their indexes.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;

/// chat-history-repair - Restore chat sessions missing from the editor's session list
///
/// Rebuilds each workspace's chat session index from the session files on
/// disk. Close the editor completely before repairing.
#[derive(Parser, Debug, Clone)]
#[command(name = "chat-history-repair")]
#[command(version, about, long_about = None)]
pub struct Cli {
    /// Path to configuration file
    #[arg(short, long)]
    pub config: Option<String>,

    /// Workspace storage directory (overrides config and platform default)
    #[arg(long, value_name = "DIR", env = "CHAT_REPAIR_STORAGE_ROOT")]
    pub storage_root: Option<PathBuf>,

    /// Enable verbose logging
    #[arg(short, long)]
    pub verbose: bool,

    /// Command to execute
    #[command(subcommand)]
    pub command: Commands,
}

/// Available commands
#[derive(Subcommand, Debug, Clone)]
pub enum Commands {
    /// List workspaces that have chat sessions
    List {
        /// Print machine-readable JSON instead of a table
        #[arg(long)]
        json: bool,
    },

    /// Repair one workspace, or every workspace that needs it
    Repair(RepairArgs),
}

/// Arguments for the `repair` command
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct RepairArgs {
    /// Workspace ID to repair; all workspaces needing repair when omitted
    pub workspace_id: Option<String>,

    /// Preview changes without modifying anything
    #[arg(long)]
    pub dry_run: bool,

    /// Skip confirmation prompts
    #[arg(short, long)]
    pub yes: bool,

    /// Remove index entries whose session file is missing
    #[arg(long)]
    pub remove_orphans: bool,

    /// Copy orphaned sessions back from other workspaces
    #[arg(long)]
    pub recover_orphans: bool,
}

impl Cli {
    /// Parse command line arguments
    ///
    /// # Returns
    ///
    /// Returns the parsed CLI structure
    pub fn parse_args() -> Self {
        Self::parse()
    }
}
