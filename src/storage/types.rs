use serde::Serialize;
use serde_json::value::{to_raw_value, RawValue};
use serde_json::Value;
use std::collections::BTreeMap;

/// Version tag written with every rebuilt index
pub const INDEX_VERSION: u32 = 1;

/// Location hint used when a session file does not carry one
pub const DEFAULT_INITIAL_LOCATION: &str = "panel";

/// The chat session index record stored in a workspace's state database
///
/// Entries are held as raw JSON text keyed by session ID. Only the keys are
/// compared against the files on disk, and an entry this tool does not
/// regenerate is written back byte for byte as it was read, whatever its
/// shape. A `BTreeMap` keeps the serialized record stable across runs on
/// unchanged input.
#[derive(Debug, Clone, Serialize)]
pub struct ChatSessionIndex {
    /// Record format version
    pub version: u32,
    /// Index entries by session ID
    pub entries: BTreeMap<String, Box<RawValue>>,
}

impl Default for ChatSessionIndex {
    fn default() -> Self {
        Self {
            version: INDEX_VERSION,
            entries: BTreeMap::new(),
        }
    }
}

impl PartialEq for ChatSessionIndex {
    fn eq(&self, other: &Self) -> bool {
        self.version == other.version
            && self.entries.len() == other.entries.len()
            && self
                .entries
                .iter()
                .zip(&other.entries)
                .all(|((ka, va), (kb, vb))| ka == kb && va.get() == vb.get())
    }
}

impl ChatSessionIndex {
    /// Decode a stored index record
    ///
    /// The record must be a JSON object. A missing `entries` field means no
    /// entries; an `entries` value that is not an object is rejected. The
    /// shape of individual entries is never checked.
    pub fn from_json(raw: &str) -> std::result::Result<Self, String> {
        let mut record: BTreeMap<String, Box<RawValue>> = serde_json::from_str(raw)
            .map_err(|e| format!("index record is not a JSON object: {}", e))?;

        let version = record
            .get("version")
            .and_then(|v| serde_json::from_str::<u32>(v.get()).ok())
            .unwrap_or(INDEX_VERSION);

        let entries = match record.remove("entries") {
            None => BTreeMap::new(),
            Some(raw_entries) => serde_json::from_str(raw_entries.get()).map_err(|_| {
                format!(
                    "index entries must be an object, found {}",
                    json_kind(raw_entries.get())
                )
            })?,
        };

        Ok(Self { version, entries })
    }

    /// Insert or replace the entry for `entry.session_id`
    pub fn insert(&mut self, entry: &IndexEntry) -> serde_json::Result<()> {
        let raw = to_raw_value(entry)?;
        self.entries.insert(entry.session_id.clone(), raw);
        Ok(())
    }
}

fn json_kind(raw: &str) -> &'static str {
    match serde_json::from_str::<Value>(raw) {
        Ok(Value::Null) => "null",
        Ok(Value::Bool(_)) => "a boolean",
        Ok(Value::Number(_)) => "a number",
        Ok(Value::String(_)) => "a string",
        Ok(Value::Array(_)) => "an array",
        Ok(Value::Object(_)) => "an object",
        Err(_) => "invalid JSON",
    }
}

/// One session's entry in the index, as generated from its session file
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct IndexEntry {
    /// Session ID; equals the session file stem
    pub session_id: String,
    /// Display title
    pub title: String,
    /// Epoch milliseconds of the last exchange, 0 when unknown
    pub last_message_date: i64,
    /// Whether the host imported this session; never set by this tool
    pub is_imported: bool,
    /// Where the host opens the session
    pub initial_location: String,
    /// True when the session holds no exchanges
    pub is_empty: bool,
}

/// Integer or float timestamps; anything else becomes 0.
pub(crate) fn timestamp_from_value(value: &Value) -> i64 {
    value
        .as_i64()
        .or_else(|| value.as_f64().map(|f| f as i64))
        .unwrap_or(0)
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn sample_entry(id: &str) -> IndexEntry {
        IndexEntry {
            session_id: id.to_string(),
            title: "Hello".to_string(),
            last_message_date: 1_700_000_000_000,
            is_imported: false,
            initial_location: "panel".to_string(),
            is_empty: false,
        }
    }

    #[test]
    fn test_index_entry_uses_camel_case_keys() {
        let value = serde_json::to_value(sample_entry("abc")).unwrap();
        assert_eq!(
            value,
            json!({
                "sessionId": "abc",
                "title": "Hello",
                "lastMessageDate": 1_700_000_000_000i64,
                "isImported": false,
                "initialLocation": "panel",
                "isEmpty": false
            })
        );
    }

    #[test]
    fn test_from_json_keeps_entries_untouched() {
        let raw = r#"{"version":1,"entries":{"loose":{"sessionId":"loose","title":null},"sparse":{"title":"x","sessionId":"sparse"},"odd":42}}"#;
        let index = ChatSessionIndex::from_json(raw).unwrap();
        assert_eq!(index.entries.len(), 3);
        assert_eq!(index.entries["loose"].get(), r#"{"sessionId":"loose","title":null}"#);
        assert_eq!(index.entries["sparse"].get(), r#"{"title":"x","sessionId":"sparse"}"#);
        assert_eq!(index.entries["odd"].get(), "42");
        assert_eq!(
            serde_json::to_string(&index).unwrap(),
            r#"{"version":1,"entries":{"loose":{"sessionId":"loose","title":null},"odd":42,"sparse":{"title":"x","sessionId":"sparse"}}}"#
        );
    }

    #[test]
    fn test_from_json_defaults() {
        let index = ChatSessionIndex::from_json(r#"{"version": "weird"}"#).unwrap();
        assert_eq!(index.version, INDEX_VERSION);
        assert!(index.entries.is_empty());
    }

    #[test]
    fn test_from_json_rejects_bad_shapes() {
        assert!(ChatSessionIndex::from_json("{not json").is_err());
        assert!(ChatSessionIndex::from_json("[1, 2]").is_err());
        let err = ChatSessionIndex::from_json(r#"{"entries": []}"#).unwrap_err();
        assert!(err.contains("an array"), "{}", err);
    }

    #[test]
    fn test_insert_replaces_entry() {
        let mut index =
            ChatSessionIndex::from_json(r#"{"entries":{"abc":{"title":null}}}"#).unwrap();
        index.insert(&sample_entry("abc")).unwrap();
        assert_eq!(
            serde_json::to_string(&index).unwrap(),
            r#"{"version":1,"entries":{"abc":{"sessionId":"abc","title":"Hello","lastMessageDate":1700000000000,"isImported":false,"initialLocation":"panel","isEmpty":false}}}"#
        );
    }

    #[test]
    fn test_equality_compares_raw_text() {
        let a = ChatSessionIndex::from_json(r#"{"entries":{"x":{"a":1}}}"#).unwrap();
        let b = ChatSessionIndex::from_json(r#"{"entries":{"x":{"a":1}}}"#).unwrap();
        let c = ChatSessionIndex::from_json(r#"{"entries":{"x":{"a":2}}}"#).unwrap();
        assert_eq!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_timestamp_from_value() {
        assert_eq!(timestamp_from_value(&json!(12)), 12);
        assert_eq!(timestamp_from_value(&json!(12.9)), 12);
        assert_eq!(timestamp_from_value(&json!("12")), 0);
        assert_eq!(timestamp_from_value(&Value::Null), 0);
    }
}
