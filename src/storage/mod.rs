//! Workspace state database access
//!
//! Each workspace keeps a small SQLite key-value database (`state.vscdb`)
//! with a single `ItemTable(key, value)` table. The chat session index is
//! one JSON value in that table. This module reads it, writes it back in a
//! single transaction, and takes the backup copy that precedes every write.

use crate::error::{Result, RepairError};
use anyhow::Context;
use chrono::Local;
use rusqlite::{params, Connection, OpenFlags, OptionalExtension};
use std::path::{Path, PathBuf};

pub mod types;
pub use types::{ChatSessionIndex, IndexEntry, DEFAULT_INITIAL_LOCATION, INDEX_VERSION};

/// Key under which the host stores the chat session index
pub const INDEX_KEY: &str = "chat.ChatSessionStore.index";

/// File name of the per-workspace state database
pub const STATE_DB_FILE: &str = "state.vscdb";

/// Outcome of looking up the index record
///
/// Reading never fails from the caller's point of view: a missing file,
/// table, or key is `Missing`, and anything that exists but cannot be
/// decoded is `Invalid` with the reason.
#[derive(Debug, Clone, PartialEq)]
pub enum IndexLookup {
    /// No database file, no `ItemTable`, or no index key
    Missing,
    /// The record exists but could not be read or decoded
    Invalid(String),
    /// The decoded index
    Found(ChatSessionIndex),
}

impl IndexLookup {
    /// Returns the index when one was found
    pub fn into_index(self) -> Option<ChatSessionIndex> {
        match self {
            IndexLookup::Found(index) => Some(index),
            _ => None,
        }
    }
}

/// Access to one workspace's state database
#[derive(Debug, Clone)]
pub struct IndexStore {
    db_path: PathBuf,
}

impl IndexStore {
    /// Create a store for the database at `db_path`
    ///
    /// Nothing is opened until an operation runs; every operation opens and
    /// closes its own connection.
    pub fn new<P: Into<PathBuf>>(db_path: P) -> Self {
        Self {
            db_path: db_path.into(),
        }
    }

    /// Path to the database file
    pub fn db_path(&self) -> &Path {
        &self.db_path
    }

    /// Read the chat session index
    pub fn read_index(&self) -> IndexLookup {
        if !self.db_path.exists() {
            return IndexLookup::Missing;
        }

        let conn = match Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_ONLY)
        {
            Ok(conn) => conn,
            Err(e) => return IndexLookup::Invalid(format!("Failed to open database: {}", e)),
        };

        let has_table: bool = match conn
            .query_row(
                "SELECT 1 FROM sqlite_master WHERE type = 'table' AND name = 'ItemTable'",
                [],
                |_| Ok(true),
            )
            .optional()
        {
            Ok(found) => found.unwrap_or(false),
            Err(e) => return IndexLookup::Invalid(format!("Failed to inspect database: {}", e)),
        };
        if !has_table {
            return IndexLookup::Missing;
        }

        let raw: Option<String> = match conn
            .query_row(
                "SELECT value FROM ItemTable WHERE key = ?",
                params![INDEX_KEY],
                |row| value_as_text(row.get_ref(0)?),
            )
            .optional()
        {
            Ok(raw) => raw,
            Err(e) => return IndexLookup::Invalid(format!("Failed to query index: {}", e)),
        };

        match raw {
            None => IndexLookup::Missing,
            Some(json) => match ChatSessionIndex::from_json(&json) {
                Ok(index) => IndexLookup::Found(index),
                Err(reason) => IndexLookup::Invalid(format!("Malformed index record: {}", reason)),
            },
        }
    }

    /// Copy the database file to a fresh timestamped backup path
    ///
    /// The backup name is `<db>.backup.<YYYYmmdd_HHMMSS>`; when a backup with
    /// that name already exists a `-N` suffix is appended so earlier backups
    /// are never overwritten.
    pub fn backup(&self) -> Result<PathBuf> {
        if !self.db_path.exists() {
            return Err(RepairError::Storage(format!(
                "Database not found: {}",
                self.db_path.display()
            ))
            .into());
        }

        let stamp = Local::now().format("%Y%m%d_%H%M%S").to_string();
        let backup_path = next_backup_path(&self.db_path, &stamp);

        std::fs::copy(&self.db_path, &backup_path)
            .with_context(|| format!("Failed to create backup {}", backup_path.display()))
            .map_err(|e| RepairError::Storage(format!("{:#}", e)))?;

        tracing::info!(
            db = %self.db_path.display(),
            backup = %backup_path.display(),
            "Created database backup"
        );
        Ok(backup_path)
    }

    /// Replace the stored index with `index`
    ///
    /// The database file must already exist. The upsert runs in a single
    /// transaction so a partially written index is never persisted.
    pub fn write_index(&self, index: &ChatSessionIndex) -> Result<()> {
        if !self.db_path.exists() {
            return Err(RepairError::Storage(format!(
                "Database not found: {}",
                self.db_path.display()
            ))
            .into());
        }

        let mut conn = Connection::open_with_flags(&self.db_path, OpenFlags::SQLITE_OPEN_READ_WRITE)
            .context("Failed to open database")
            .map_err(|e| RepairError::Storage(format!("{:#}", e)))?;

        let index_json = serde_json::to_string(index)
            .context("Failed to serialize index")
            .map_err(|e| RepairError::Storage(format!("{:#}", e)))?;

        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| RepairError::Storage(format!("{:#}", e)))?;

        tx.execute(
            "CREATE TABLE IF NOT EXISTS ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
            [],
        )
        .context("Failed to create ItemTable")
        .map_err(|e| RepairError::Storage(format!("{:#}", e)))?;

        tx.execute(
            "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?, ?)",
            params![INDEX_KEY, index_json],
        )
        .context("Failed to write index")
        .map_err(|e| RepairError::Storage(format!("{:#}", e)))?;

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| RepairError::Storage(format!("{:#}", e)))?;

        tracing::debug!(
            db = %self.db_path.display(),
            entries = index.entries.len(),
            "Wrote chat session index"
        );
        Ok(())
    }
}

/// The host writes values as TEXT, but older databases hold BLOBs.
fn value_as_text(value: rusqlite::types::ValueRef<'_>) -> rusqlite::Result<String> {
    use rusqlite::types::ValueRef;
    match value {
        ValueRef::Text(bytes) | ValueRef::Blob(bytes) => {
            Ok(String::from_utf8_lossy(bytes).into_owned())
        }
        other => Err(rusqlite::Error::InvalidColumnType(
            0,
            "value".to_string(),
            other.data_type(),
        )),
    }
}

fn next_backup_path(db_path: &Path, stamp: &str) -> PathBuf {
    let base = format!("{}.backup.{}", db_path.display(), stamp);
    let mut candidate = PathBuf::from(&base);
    let mut n = 1;
    while candidate.exists() {
        candidate = PathBuf::from(format!("{}-{}", base, n));
        n += 1;
    }
    candidate
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    /// Helper: create a state database with an empty `ItemTable`.
    fn create_state_db(dir: &Path) -> PathBuf {
        let db_path = dir.join(STATE_DB_FILE);
        let conn = Connection::open(&db_path).expect("open db");
        conn.execute(
            "CREATE TABLE ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
            [],
        )
        .expect("create table");
        db_path
    }

    fn put_raw(db_path: &Path, value: &str) {
        let conn = Connection::open(db_path).expect("open db");
        conn.execute(
            "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?, ?)",
            params![INDEX_KEY, value],
        )
        .expect("insert");
    }

    fn sample_entry(id: &str) -> IndexEntry {
        IndexEntry {
            session_id: id.to_string(),
            title: format!("Title {}", id),
            last_message_date: 42,
            is_imported: false,
            initial_location: DEFAULT_INITIAL_LOCATION.to_string(),
            is_empty: false,
        }
    }

    #[test]
    fn test_read_index_missing_file() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join(STATE_DB_FILE));
        assert_eq!(store.read_index(), IndexLookup::Missing);
        assert!(!store.db_path().exists(), "reading must not create the file");
    }

    #[test]
    fn test_read_index_missing_table() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join(STATE_DB_FILE);
        Connection::open(&db_path)
            .unwrap()
            .execute("CREATE TABLE other (x INTEGER)", [])
            .unwrap();
        assert_eq!(IndexStore::new(db_path).read_index(), IndexLookup::Missing);
    }

    #[test]
    fn test_read_index_missing_key() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(create_state_db(dir.path()));
        assert_eq!(store.read_index(), IndexLookup::Missing);
    }

    #[test]
    fn test_read_index_malformed_json_is_invalid() {
        let dir = tempdir().unwrap();
        let db_path = create_state_db(dir.path());
        put_raw(&db_path, "{not json");
        let lookup = IndexStore::new(db_path).read_index();
        assert!(matches!(lookup, IndexLookup::Invalid(_)));
        assert!(lookup.into_index().is_none());
    }

    #[test]
    fn test_read_index_tolerates_loosely_typed_entries() {
        let dir = tempdir().unwrap();
        let db_path = create_state_db(dir.path());
        put_raw(
            &db_path,
            r#"{"version":1,"entries":{"a":{"sessionId":"a","title":null},"b":"text","c":{"sessionId":"c"}}}"#,
        );
        let index = IndexStore::new(db_path)
            .read_index()
            .into_index()
            .expect("loose entries must not invalidate the record");
        let keys: Vec<_> = index.entries.keys().map(String::as_str).collect();
        assert_eq!(keys, vec!["a", "b", "c"]);
    }

    #[test]
    fn test_read_index_rejects_non_object_entries() {
        let dir = tempdir().unwrap();
        let db_path = create_state_db(dir.path());
        put_raw(&db_path, r#"{"version":1,"entries":["a"]}"#);
        assert!(matches!(
            IndexStore::new(db_path).read_index(),
            IndexLookup::Invalid(_)
        ));
    }

    #[test]
    fn test_write_then_read_index() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(create_state_db(dir.path()));

        let mut index = ChatSessionIndex::default();
        index.insert(&sample_entry("a")).unwrap();
        index.insert(&sample_entry("b")).unwrap();
        store.write_index(&index).expect("write failed");

        assert_eq!(store.read_index(), IndexLookup::Found(index));
    }

    #[test]
    fn test_write_index_replaces_existing_record() {
        let dir = tempdir().unwrap();
        let db_path = create_state_db(dir.path());
        put_raw(&db_path, r#"{"version":1,"entries":{"old":{"sessionId":"old"}}}"#);
        let store = IndexStore::new(&db_path);

        let mut index = ChatSessionIndex::default();
        index.insert(&sample_entry("new")).unwrap();
        store.write_index(&index).expect("write failed");

        let count: i64 = Connection::open(&db_path)
            .unwrap()
            .query_row(
                "SELECT count(*) FROM ItemTable WHERE key = ?",
                params![INDEX_KEY],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
        let stored = store.read_index().into_index().unwrap();
        assert!(stored.entries.contains_key("new"));
        assert!(!stored.entries.contains_key("old"));
    }

    #[test]
    fn test_write_index_fails_without_database() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join(STATE_DB_FILE));
        assert!(store.write_index(&ChatSessionIndex::default()).is_err());
        assert!(!store.db_path().exists());
    }

    #[test]
    fn test_backup_is_byte_identical() {
        let dir = tempdir().unwrap();
        let db_path = create_state_db(dir.path());
        put_raw(&db_path, r#"{"version":1,"entries":{}}"#);
        let store = IndexStore::new(&db_path);

        let backup = store.backup().expect("backup failed");
        assert_eq!(
            std::fs::read(&db_path).unwrap(),
            std::fs::read(&backup).unwrap()
        );
        assert!(backup
            .file_name()
            .unwrap()
            .to_string_lossy()
            .starts_with("state.vscdb.backup."));
    }

    #[test]
    fn test_backup_never_overwrites_previous_backup() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(create_state_db(dir.path()));

        let first = store.backup().expect("first backup");
        let second = store.backup().expect("second backup");
        let third = store.backup().expect("third backup");
        assert_ne!(first, second);
        assert_ne!(second, third);
        assert!(first.exists() && second.exists() && third.exists());
    }

    #[test]
    fn test_backup_fails_without_database() {
        let dir = tempdir().unwrap();
        let store = IndexStore::new(dir.path().join(STATE_DB_FILE));
        assert!(store.backup().is_err());
    }

    #[test]
    fn test_next_backup_path_appends_counter() {
        let dir = tempdir().unwrap();
        let db_path = dir.path().join(STATE_DB_FILE);
        let first = next_backup_path(&db_path, "20240101_000000");
        std::fs::write(&first, b"x").unwrap();
        let second = next_backup_path(&db_path, "20240101_000000");
        assert!(second.to_string_lossy().ends_with("20240101_000000-1"));
    }
}
