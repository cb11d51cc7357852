//! Checkpoint storage for sessions
//!
//! A checkpoint is the full message history of a session, saved under the
//! session id after every successful turn and loaded when the session is
//! resumed.

use crate::agent::Session;
use crate::config::StorageConfig;
use crate::error::{Result, StepwiseError};
use anyhow::Context;
use chrono::{DateTime, Utc};
use directories::ProjectDirs;
use rusqlite::{params, Connection, OptionalExtension};
use std::path::{Path, PathBuf};

pub mod memory;
pub mod types;

pub use memory::MemoryCheckpointStore;
pub use types::{Checkpoint, StoredSession};

const UNTITLED: &str = "Untitled session";

/// Save and restore session histories by id
///
/// `load` and `delete` match the id exactly. Interactive lookups that accept
/// a shortened id go through `resolve` first.
pub trait CheckpointStore: Send + Sync {
    /// Save the session, replacing any earlier checkpoint under its id
    fn save(&self, session: &Session, model: Option<&str>) -> Result<()>;

    /// Load the checkpoint stored under exactly `id`
    fn load(&self, id: &str) -> Result<Option<Checkpoint>>;

    /// All stored sessions, most recently updated first
    fn list(&self) -> Result<Vec<StoredSession>>;

    /// Delete the checkpoint stored under exactly `id`; returns whether one existed
    fn delete(&self, id: &str) -> Result<bool>;

    /// Resolve an id or unique prefix to a stored id; an exact match wins
    ///
    /// # Errors
    ///
    /// Returns `StepwiseError::Storage` when a prefix matches more than one
    /// session
    fn resolve(&self, id: &str) -> Result<Option<String>> {
        let ids: Vec<String> = self.list()?.into_iter().map(|s| s.id).collect();
        resolve_id(&ids, id)
    }
}

fn resolve_id(ids: &[String], wanted: &str) -> Result<Option<String>> {
    if wanted.is_empty() {
        return Ok(None);
    }
    if ids.iter().any(|id| id == wanted) {
        return Ok(Some(wanted.to_string()));
    }
    let matches: Vec<&String> = ids.iter().filter(|id| id.starts_with(wanted)).collect();
    match matches.as_slice() {
        [] => Ok(None),
        [only] => Ok(Some((*only).clone())),
        _ => Err(StepwiseError::Storage(format!(
            "Session id prefix '{}' is ambiguous ({} matches)",
            wanted,
            matches.len()
        ))
        .into()),
    }
}

pub(crate) fn session_title(session: &Session) -> String {
    session.title().unwrap_or_else(|| UNTITLED.to_string())
}

/// SQLite-backed checkpoint store
pub struct SqliteCheckpointStore {
    db_path: PathBuf,
}

impl SqliteCheckpointStore {
    /// Open the store described by configuration
    ///
    /// Uses `storage.path` when set, otherwise `history.db` in the platform
    /// data directory.
    pub fn open(config: &StorageConfig) -> Result<Self> {
        if let Some(path) = &config.path {
            return Self::new_with_path(path);
        }

        let proj_dirs = ProjectDirs::from("dev", "stepwise", "stepwise")
            .ok_or_else(|| StepwiseError::Storage("Could not determine data directory".into()))?;

        let data_dir = proj_dirs.data_dir();
        std::fs::create_dir_all(data_dir)
            .context("Failed to create data directory")
            .map_err(|e| StepwiseError::Storage(e.to_string()))?;

        Self::new_with_path(data_dir.join("history.db"))
    }

    /// Open a store at a specific database file
    ///
    /// # Examples
    ///
    /// ```
    /// use stepwise::storage::SqliteCheckpointStore;
    ///
    /// let dir = tempfile::tempdir().unwrap();
    /// let store = SqliteCheckpointStore::new_with_path(dir.path().join("h.db")).unwrap();
    /// ```
    pub fn new_with_path<P: Into<PathBuf>>(db_path: P) -> Result<Self> {
        let db_path = db_path.into();

        if let Some(parent) = db_path.parent() {
            std::fs::create_dir_all(parent)
                .context("Failed to create parent directory for database")
                .map_err(|e| StepwiseError::Storage(e.to_string()))?;
        }

        let store = Self { db_path };
        store.init()?;
        Ok(store)
    }

    /// Path of the database file
    pub fn path(&self) -> &Path {
        &self.db_path
    }

    fn connect(&self) -> Result<Connection> {
        Ok(Connection::open(&self.db_path)
            .context("Failed to open database")
            .map_err(|e| StepwiseError::Storage(e.to_string()))?)
    }

    fn init(&self) -> Result<()> {
        let conn = self.connect()?;
        conn.execute(
            "CREATE TABLE IF NOT EXISTS sessions (
                id TEXT PRIMARY KEY,
                title TEXT NOT NULL,
                created_at TEXT NOT NULL,
                updated_at TEXT NOT NULL,
                model TEXT,
                messages JSON NOT NULL
            )",
            [],
        )
        .context("Failed to create tables")
        .map_err(|e| StepwiseError::Storage(e.to_string()))?;
        Ok(())
    }
}

fn parse_timestamp(raw: &str) -> DateTime<Utc> {
    DateTime::parse_from_rfc3339(raw)
        .map(|dt| dt.with_timezone(&Utc))
        .unwrap_or_else(|_| Utc::now())
}

impl CheckpointStore for SqliteCheckpointStore {
    fn save(&self, session: &Session, model: Option<&str>) -> Result<()> {
        let mut conn = self.connect()?;

        let messages_json = serde_json::to_string(session.conversation.messages())
            .context("Failed to serialize messages")
            .map_err(|e| StepwiseError::Storage(e.to_string()))?;
        let title = session_title(session);
        let now = Utc::now().to_rfc3339();

        let tx = conn
            .transaction()
            .context("Failed to start transaction")
            .map_err(|e| StepwiseError::Storage(e.to_string()))?;

        // created_at survives updates
        tx.execute(
            "INSERT INTO sessions (id, title, created_at, updated_at, model, messages)
             VALUES (?1, ?2, ?3, ?3, ?4, ?5)
             ON CONFLICT(id) DO UPDATE SET
                title = excluded.title,
                updated_at = excluded.updated_at,
                model = excluded.model,
                messages = excluded.messages",
            params![session.id, title, now, model, messages_json],
        )
        .context("Failed to save session")
        .map_err(|e| StepwiseError::Storage(e.to_string()))?;

        tx.commit()
            .context("Failed to commit transaction")
            .map_err(|e| StepwiseError::Storage(e.to_string()))?;

        tracing::debug!(
            session = %session.id,
            messages = session.conversation.len(),
            "Checkpoint saved"
        );
        Ok(())
    }

    fn load(&self, id: &str) -> Result<Option<Checkpoint>> {
        let conn = self.connect()?;
        let row = conn
            .query_row(
                "SELECT title, model, messages FROM sessions WHERE id = ?1",
                params![id],
                |row| {
                    let title: String = row.get(0)?;
                    let model: Option<String> = row.get(1)?;
                    let messages_json: String = row.get(2)?;
                    Ok((title, model, messages_json))
                },
            )
            .optional()
            .context("Failed to query session")
            .map_err(|e| StepwiseError::Storage(e.to_string()))?;

        match row {
            Some((title, model, messages_json)) => {
                let messages = serde_json::from_str(&messages_json)
                    .context("Failed to deserialize messages")
                    .map_err(|e| StepwiseError::Storage(e.to_string()))?;
                Ok(Some(Checkpoint {
                    id: id.to_string(),
                    title,
                    model,
                    messages,
                }))
            }
            None => Ok(None),
        }
    }

    fn list(&self) -> Result<Vec<StoredSession>> {
        let conn = self.connect()?;
        let mut stmt = conn
            .prepare(
                "SELECT id, title, created_at, updated_at, model, messages
                 FROM sessions
                 ORDER BY updated_at DESC",
            )
            .context("Failed to prepare statement")
            .map_err(|e| StepwiseError::Storage(e.to_string()))?;

        let rows = stmt
            .query_map([], |row| {
                let created_at: String = row.get(2)?;
                let updated_at: String = row.get(3)?;
                let messages_json: String = row.get(5)?;

                let message_count = serde_json::from_str::<serde_json::Value>(&messages_json)
                    .ok()
                    .and_then(|v| v.as_array().map(|a| a.len()))
                    .unwrap_or(0);

                Ok(StoredSession {
                    id: row.get(0)?,
                    title: row.get(1)?,
                    created_at: parse_timestamp(&created_at),
                    updated_at: parse_timestamp(&updated_at),
                    model: row.get(4)?,
                    message_count,
                })
            })
            .context("Failed to query sessions")
            .map_err(|e| StepwiseError::Storage(e.to_string()))?;

        Ok(rows
            .filter_map(|row| match row {
                Ok(session) => Some(session),
                Err(e) => {
                    tracing::warn!("Skipping unreadable session row: {}", e);
                    None
                }
            })
            .collect())
    }

    fn delete(&self, id: &str) -> Result<bool> {
        let conn = self.connect()?;
        let deleted = conn
            .execute("DELETE FROM sessions WHERE id = ?1", params![id])
            .context("Failed to delete session")
            .map_err(|e| StepwiseError::Storage(e.to_string()))?;
        Ok(deleted > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::{Message, ToolCall};
    use std::thread::sleep;
    use std::time::Duration;
    use tempfile::tempdir;

    fn create_test_store() -> (SqliteCheckpointStore, tempfile::TempDir) {
        let dir = tempdir().expect("failed to create tempdir");
        let store = SqliteCheckpointStore::new_with_path(dir.path().join("history.db"))
            .expect("failed to create store");
        (store, dir)
    }

    fn session_with(id: &str, prompt: &str) -> Session {
        let mut session = Session::with_id(id);
        session.conversation.add_user_message(prompt);
        session.conversation.push(Message::assistant("ok"));
        session
    }

    #[test]
    fn test_init_creates_table() {
        let (store, _dir) = create_test_store();
        let conn = Connection::open(store.path()).unwrap();
        let count: i64 = conn
            .query_row(
                "SELECT count(*) FROM sqlite_master WHERE type='table' AND name='sessions'",
                [],
                |r| r.get(0),
            )
            .unwrap();
        assert_eq!(count, 1);
    }

    #[test]
    fn test_save_and_load_round_trip_with_tool_messages() {
        let (store, _dir) = create_test_store();
        let mut session = Session::with_id("weather-1");
        session.conversation.add_user_message("Weather in Paris?");
        session
            .conversation
            .push(Message::assistant_with_tools(vec![ToolCall::new(
                "c1",
                "get_weather",
                r#"{"city":"Paris"}"#,
            )]));
        session
            .conversation
            .add_tool_result("c1", "The weather in Paris is Sunny +18°C.");
        session.conversation.push(Message::assistant("Sunny, 18°C."));

        store.save(&session, Some("llama-3.3-70b-versatile")).unwrap();

        let checkpoint = store.load("weather-1").unwrap().unwrap();
        assert_eq!(checkpoint.id, "weather-1");
        assert_eq!(checkpoint.title, "Weather in Paris?");
        assert_eq!(checkpoint.model.as_deref(), Some("llama-3.3-70b-versatile"));
        assert_eq!(checkpoint.messages, session.conversation.messages());
    }

    #[test]
    fn test_save_updates_and_preserves_created_at() {
        let (store, _dir) = create_test_store();
        let mut session = session_with("s1", "first");
        store.save(&session, None).unwrap();
        let before = store.list().unwrap().remove(0);

        sleep(Duration::from_millis(10));
        session.conversation.add_user_message("second");
        store.save(&session, None).unwrap();

        let after = store.list().unwrap().remove(0);
        assert_eq!(after.created_at, before.created_at);
        assert!(after.updated_at > before.updated_at);
        assert_eq!(after.message_count, 3);
    }

    #[test]
    fn test_load_missing_returns_none() {
        let (store, _dir) = create_test_store();
        assert!(store.load("nope").unwrap().is_none());
    }

    #[test]
    fn test_prefix_resolution() {
        let (store, _dir) = create_test_store();
        store.save(&session_with("abc123", "one"), None).unwrap();
        store.save(&session_with("abd456", "two"), None).unwrap();

        assert_eq!(store.resolve("abc").unwrap().as_deref(), Some("abc123"));
        assert!(store.resolve("ab").is_err());
        assert!(store.resolve("zzz").unwrap().is_none());
    }

    #[test]
    fn test_load_and_delete_match_exact_id_only() {
        let (store, _dir) = create_test_store();
        store.save(&session_with("workshop", "plan"), None).unwrap();

        assert!(store.load("work").unwrap().is_none());
        assert!(!store.delete("work").unwrap());
        assert_eq!(store.list().unwrap().len(), 1);
        assert!(store.delete("workshop").unwrap());
        assert!(store.list().unwrap().is_empty());
    }

    #[test]
    fn test_list_skips_unreadable_rows() {
        let (store, _dir) = create_test_store();
        store.save(&session_with("good", "fine"), None).unwrap();

        let conn = Connection::open(store.path()).unwrap();
        conn.execute(
            "INSERT INTO sessions (id, title, created_at, updated_at, model, messages)
             VALUES ('bad', X'00FF', 'x', 'x', NULL, '[]')",
            [],
        )
        .unwrap();

        let listed = store.list().unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, "good");
    }

    #[test]
    fn test_untitled_session() {
        let (store, _dir) = create_test_store();
        store.save(&Session::with_id("empty"), None).unwrap();
        let sessions = store.list().unwrap();
        assert_eq!(sessions[0].title, UNTITLED);
        assert_eq!(sessions[0].message_count, 0);
    }

    #[test]
    fn test_open_uses_configured_path() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("nested").join("store.db");
        let config = StorageConfig {
            path: Some(path.to_string_lossy().into_owned()),
        };
        let store = SqliteCheckpointStore::open(&config).unwrap();
        assert_eq!(store.path(), path.as_path());
        assert!(path.exists());
    }

    #[test]
    fn test_resolve_id_exact_wins_over_prefix() {
        let ids = vec!["ab".to_string(), "abc".to_string()];
        assert_eq!(resolve_id(&ids, "ab").unwrap().as_deref(), Some("ab"));
        assert!(resolve_id(&ids, "").unwrap().is_none());
    }
}
