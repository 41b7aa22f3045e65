use chat_history_repair::session::SESSIONS_DIR;
use chat_history_repair::storage::{IndexStore, INDEX_KEY, STATE_DB_FILE};
use chat_history_repair::workspace::WORKSPACE_METADATA_FILE;
use rusqlite::{params, Connection};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use tempfile::TempDir;

/// A synthetic workspace storage root.
pub struct StorageFixture {
    pub root: TempDir,
}

#[allow(dead_code)]
impl StorageFixture {
    pub fn new() -> Self {
        Self {
            root: TempDir::new().expect("failed to create tempdir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.root.path()
    }

    pub fn workspace_dir(&self, id: &str) -> PathBuf {
        self.root.path().join(id)
    }

    pub fn db_path(&self, id: &str) -> PathBuf {
        self.workspace_dir(id).join(STATE_DB_FILE)
    }

    pub fn session_path(&self, id: &str, session_id: &str) -> PathBuf {
        self.workspace_dir(id)
            .join(SESSIONS_DIR)
            .join(format!("{}.json", session_id))
    }

    pub fn write_metadata(&self, id: &str, metadata: Value) {
        let dir = self.workspace_dir(id);
        fs::create_dir_all(&dir).expect("create workspace dir");
        fs::write(dir.join(WORKSPACE_METADATA_FILE), metadata.to_string())
            .expect("write workspace.json");
    }

    pub fn write_session_raw(&self, id: &str, session_id: &str, contents: &str) {
        let path = self.session_path(id, session_id);
        fs::create_dir_all(path.parent().unwrap()).expect("create sessions dir");
        fs::write(path, contents).expect("write session");
    }

    pub fn write_session(&self, id: &str, session_id: &str, text: &str, timestamp: i64) {
        let body = json!({
            "version": 3,
            "requests": [{
                "message": {"text": text, "parts": [{"kind": "text", "text": text}]},
                "timestamp": timestamp
            }],
            "initialLocation": "panel"
        });
        self.write_session_raw(id, session_id, &body.to_string());
    }

    /// Create the state database, optionally with an index naming `indexed`.
    pub fn create_db(&self, id: &str, indexed: Option<&[&str]>) {
        fs::create_dir_all(self.workspace_dir(id)).expect("create workspace dir");
        let conn = Connection::open(self.db_path(id)).expect("open db");
        conn.execute(
            "CREATE TABLE IF NOT EXISTS ItemTable (key TEXT UNIQUE ON CONFLICT REPLACE, value BLOB)",
            [],
        )
        .expect("create table");
        conn.execute(
            "INSERT INTO ItemTable (key, value) VALUES (?, ?)",
            params!["workbench.panel.chat", "{}"],
        )
        .expect("insert unrelated key");

        if let Some(ids) = indexed {
            let entries: serde_json::Map<String, Value> = ids
                .iter()
                .map(|sid| {
                    (
                        sid.to_string(),
                        json!({
                            "sessionId": sid,
                            "title": format!("Indexed {}", sid),
                            "lastMessageDate": 1,
                            "isImported": false,
                            "initialLocation": "panel",
                            "isEmpty": false
                        }),
                    )
                })
                .collect();
            conn.execute(
                "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?, ?)",
                params![INDEX_KEY, json!({"version": 1, "entries": entries}).to_string()],
            )
            .expect("insert index");
        }
    }

    /// Store `raw` as the index record verbatim.
    pub fn put_raw_index(&self, id: &str, raw: &str) {
        let conn = Connection::open(self.db_path(id)).expect("open db");
        conn.execute(
            "INSERT OR REPLACE INTO ItemTable (key, value) VALUES (?, ?)",
            params![INDEX_KEY, raw],
        )
        .expect("insert index");
    }

    /// Raw JSON text of one stored index entry.
    pub fn stored_entry_text(&self, id: &str, session_id: &str) -> String {
        IndexStore::new(self.db_path(id))
            .read_index()
            .into_index()
            .expect("index present")
            .entries
            .get(session_id)
            .unwrap_or_else(|| panic!("no entry for {}", session_id))
            .get()
            .to_string()
    }

    /// One stored index entry, decoded.
    pub fn stored_entry(&self, id: &str, session_id: &str) -> Value {
        serde_json::from_str(&self.stored_entry_text(id, session_id)).expect("entry is JSON")
    }

    pub fn backups(&self, id: &str) -> Vec<PathBuf> {
        let mut found: Vec<PathBuf> = fs::read_dir(self.workspace_dir(id))
            .expect("read workspace dir")
            .filter_map(|e| e.ok())
            .map(|e| e.path())
            .filter(|p| {
                p.file_name()
                    .map(|n| n.to_string_lossy().contains(".backup."))
                    .unwrap_or(false)
            })
            .collect();
        found.sort();
        found
    }

    pub fn unrelated_value(&self, id: &str) -> Option<String> {
        let conn = Connection::open(self.db_path(id)).expect("open db");
        conn.query_row(
            "SELECT value FROM ItemTable WHERE key = 'workbench.panel.chat'",
            [],
            |r| r.get(0),
        )
        .ok()
    }
}
