//! Error types for chat-history-repair
//!
//! This module defines the error taxonomy used throughout the repair engine,
//! using `thiserror` for ergonomic error handling.

use thiserror::Error;

/// Main error type for repair operations
///
/// Per-item problems (a malformed session file, unreadable metadata) are
/// never raised through this type; they are downgraded to warnings at the
/// point where processing can continue. What remains here are the failures
/// that end a workspace repair or the whole run.
#[derive(Error, Debug)]
pub enum RepairError {
    /// Configuration-related errors
    #[error("Configuration error: {0}")]
    Config(String),

    /// Workspace state database errors (open, read, write, backup)
    #[error("Storage error: {0}")]
    Storage(String),

    /// The requested workspace ID does not exist under the storage root
    #[error("Workspace '{0}' not found")]
    WorkspaceNotFound(String),

    /// The operator declined a confirmation prompt; the CLI maps this to
    /// exit status 1 without printing an error
    #[error("Aborted by user")]
    Aborted,

    /// A session file could not be parsed
    #[error("Failed to parse session {id}: {message}")]
    SessionParse {
        /// Session ID (file stem)
        id: String,
        /// Underlying parse failure
        message: String,
    },

    /// Copying an orphaned session from another workspace failed
    #[error("Recovery error: {0}")]
    Recovery(String),

    /// Terminal prompt errors
    #[error("Prompt error: {0}")]
    Prompt(String),
}

/// Result type alias for repair operations
///
/// This is a convenience alias that uses `anyhow::Error` as the error type,
/// allowing for rich error context and easy error propagation.
pub type Result<T> = anyhow::Result<T>;
