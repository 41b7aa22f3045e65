//! Chat session files
//!
//! A session is one JSON file in a workspace's `chatSessions/` directory,
//! named `<session id>.json`. Only the handful of fields needed to rebuild
//! an index entry are modeled here; everything else in the file is ignored.

use crate::error::{Result, RepairError};
use crate::storage::types::timestamp_from_value;
use crate::storage::{IndexEntry, DEFAULT_INITIAL_LOCATION};
use serde::Deserialize;
use std::path::Path;

/// Title used when a session has no usable first message
pub const PLACEHOLDER_TITLE: &str = "Untitled Session";

/// Maximum title length in characters, including the ellipsis
pub const MAX_TITLE_CHARS: usize = 100;

const ELLIPSIS: &str = "...";

/// Directory inside a workspace that holds session files
pub const SESSIONS_DIR: &str = "chatSessions";

/// The parts of a session file this tool reads
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct SessionFile {
    /// Request/response exchanges in order
    #[serde(default)]
    pub requests: Option<Vec<Exchange>>,
    /// Where the host opens the session
    #[serde(default)]
    pub initial_location: Option<String>,
}

/// One request/response exchange
#[derive(Debug, Clone, Default, Deserialize)]
pub struct Exchange {
    /// The user's message
    #[serde(default)]
    pub message: Option<ExchangeMessage>,
    /// When the exchange happened (epoch milliseconds)
    #[serde(default)]
    pub timestamp: Option<serde_json::Value>,
}

/// The user message of an exchange
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ExchangeMessage {
    /// Message parts in order
    #[serde(default)]
    pub parts: Vec<MessagePart>,
}

/// A single message part; only text-bearing parts matter for titles
#[derive(Debug, Clone, Default, Deserialize)]
pub struct MessagePart {
    /// Text content, when the part carries any
    #[serde(default)]
    pub text: Option<String>,
}

/// Metadata derived from a session file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionMetadata {
    /// Session ID (file stem)
    pub id: String,
    /// Display title, never empty
    pub title: String,
    /// Timestamp of the last exchange, 0 when unknown
    pub last_message_date: i64,
    /// True when the session has no exchanges
    pub is_empty: bool,
    /// Display-location hint
    pub initial_location: String,
}

impl SessionFile {
    /// Parse session JSON
    pub fn parse(id: &str, contents: &str) -> Result<Self> {
        let file = serde_json::from_str(contents).map_err(|e| RepairError::SessionParse {
            id: id.to_string(),
            message: e.to_string(),
        })?;
        Ok(file)
    }

    /// Read and parse a session file
    pub fn load(id: &str, path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path).map_err(|e| RepairError::SessionParse {
            id: id.to_string(),
            message: format!("Failed to read {}: {}", path.display(), e),
        })?;
        Self::parse(id, &contents)
    }

    /// Derive index metadata for the session with the given ID
    pub fn metadata(&self, id: &str) -> SessionMetadata {
        let initial_location = self
            .initial_location
            .clone()
            .unwrap_or_else(|| DEFAULT_INITIAL_LOCATION.to_string());

        let requests = match self.requests.as_deref() {
            Some(requests) if !requests.is_empty() => requests,
            _ => {
                return SessionMetadata {
                    id: id.to_string(),
                    title: PLACEHOLDER_TITLE.to_string(),
                    last_message_date: 0,
                    is_empty: true,
                    initial_location,
                }
            }
        };

        let first_text = requests[0]
            .message
            .as_ref()
            .and_then(|m| m.parts.iter().find_map(|p| p.text.as_deref()));
        let title = first_text.map(derive_title).unwrap_or_else(|| PLACEHOLDER_TITLE.to_string());

        let last_message_date = requests
            .last()
            .and_then(|r| r.timestamp.as_ref())
            .map(timestamp_from_value)
            .unwrap_or(0);

        SessionMetadata {
            id: id.to_string(),
            title,
            last_message_date,
            is_empty: false,
            initial_location,
        }
    }
}

impl SessionMetadata {
    /// Build the index entry for this session
    pub fn to_index_entry(&self) -> IndexEntry {
        IndexEntry {
            session_id: self.id.clone(),
            title: self.title.clone(),
            last_message_date: self.last_message_date,
            is_imported: false,
            initial_location: self.initial_location.clone(),
            is_empty: self.is_empty,
        }
    }
}

/// Turn first-message text into a display title
///
/// The text is trimmed; anything longer than [`MAX_TITLE_CHARS`] characters
/// keeps its first 97 characters followed by `...`. Blank text yields
/// [`PLACEHOLDER_TITLE`].
pub fn derive_title(text: &str) -> String {
    let trimmed = text.trim();
    if trimmed.is_empty() {
        return PLACEHOLDER_TITLE.to_string();
    }
    if trimmed.chars().count() > MAX_TITLE_CHARS {
        let keep = MAX_TITLE_CHARS - ELLIPSIS.len();
        let mut title: String = trimmed.chars().take(keep).collect();
        title.push_str(ELLIPSIS);
        return title;
    }
    trimmed.to_string()
}
