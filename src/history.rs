//! Durable log of completed runs.
//!
//! The whole list lives as one JSON document under [`HISTORY_KEY`] in a
//! key-value store and is read and rewritten wholesale on every mutation.
//! Storage problems never reach the caller: unreadable data is an empty
//! history and failed writes are logged and dropped.

use std::collections::HashMap;
use std::path::{Path, PathBuf};

use rusqlite::{params, Connection, OptionalExtension};
use serde::{Deserialize, Serialize};

use crate::metrics::{format_distance, format_elapsed, format_pace};

pub const HISTORY_KEY: &str = "strinex_runs";
pub const HISTORY_CAPACITY: usize = 50;

#[derive(Debug, thiserror::Error)]
pub enum HistoryError {
    #[error("sqlite: {0}")]
    Sqlite(#[from] rusqlite::Error),
    #[error("json: {0}")]
    Json(#[from] serde_json::Error),
    #[error("io: {0}")]
    Io(#[from] std::io::Error),
}

/// Immutable summary of one completed run
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RunRecord {
    /// Completion time in Unix milliseconds
    pub id: i64,
    pub distance_km: f64,
    pub duration_seconds: u64,
    pub pace_min_per_km: f64,
    pub calories_kcal: Option<u32>,
    pub completed_at_label: String,
    pub gps_point_count: usize,
}

/// Display-ready run summary handed to the coaching service
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CoachingPayload {
    pub distance: String,
    pub duration: String,
    pub pace: String,
    pub calories: Option<String>,
    pub timestamp: String,
    pub gps_points: usize,
}

impl RunRecord {
    pub fn coaching_payload(&self) -> CoachingPayload {
        CoachingPayload {
            distance: format!("{} km", format_distance(self.distance_km)),
            duration: format_elapsed(self.duration_seconds),
            pace: format!("{} /km", format_pace(self.pace_min_per_km)),
            calories: self.calories_kcal.map(|c| format!("{c} kcal")),
            timestamp: self.completed_at_label.clone(),
            gps_points: self.gps_point_count,
        }
    }
}

pub trait KvStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError>;
    fn set(&mut self, key: &str, value: &str) -> Result<(), HistoryError>;
}

/// SQLite-backed key-value table
#[derive(Debug)]
pub struct SqliteKvStore {
    conn: Connection,
}

impl SqliteKvStore {
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self, HistoryError> {
        if let Some(parent) = path.as_ref().parent() {
            std::fs::create_dir_all(parent)?;
        }
        Self::init(Connection::open(path)?)
    }

    pub fn open_in_memory() -> Result<Self, HistoryError> {
        Self::init(Connection::open_in_memory()?)
    }

    fn init(conn: Connection) -> Result<Self, HistoryError> {
        conn.execute(
            r#"
            CREATE TABLE IF NOT EXISTS kv (
                key TEXT PRIMARY KEY,
                value TEXT NOT NULL,
                updated_at DATETIME DEFAULT CURRENT_TIMESTAMP
            )
            "#,
            [],
        )?;
        Ok(Self { conn })
    }

    pub fn default_path() -> PathBuf {
        crate::app_dirs::AppDirs::db_path().unwrap_or_else(|| PathBuf::from("strinex_history.db"))
    }
}

impl KvStore for SqliteKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError> {
        let value = self
            .conn
            .query_row("SELECT value FROM kv WHERE key = ?1", [key], |row| row.get(0))
            .optional()?;
        Ok(value)
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HistoryError> {
        self.conn.execute(
            r#"
            INSERT INTO kv (key, value) VALUES (?1, ?2)
            ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = CURRENT_TIMESTAMP
            "#,
            params![key, value],
        )?;
        Ok(())
    }
}

#[derive(Debug, Default, Clone)]
pub struct MemoryKvStore {
    values: HashMap<String, String>,
}

impl MemoryKvStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_value(key: &str, value: &str) -> Self {
        let mut store = Self::new();
        store.values.insert(key.to_string(), value.to_string());
        store
    }
}

impl KvStore for MemoryKvStore {
    fn get(&self, key: &str) -> Result<Option<String>, HistoryError> {
        Ok(self.values.get(key).cloned())
    }

    fn set(&mut self, key: &str, value: &str) -> Result<(), HistoryError> {
        self.values.insert(key.to_string(), value.to_string());
        Ok(())
    }
}

/// Newest-first run log capped at [`HISTORY_CAPACITY`]
pub struct RunHistory {
    store: Box<dyn KvStore>,
}

impl RunHistory {
    pub fn new(store: Box<dyn KvStore>) -> Self {
        Self { store }
    }

    pub fn in_memory() -> Self {
        Self::new(Box::new(MemoryKvStore::new()))
    }

    fn load(&self) -> Result<Vec<RunRecord>, HistoryError> {
        match self.store.get(HISTORY_KEY)? {
            Some(raw) => Ok(serde_json::from_str(&raw)?),
            None => Ok(Vec::new()),
        }
    }

    fn write(&mut self, runs: &[RunRecord]) {
        let result = serde_json::to_string(runs)
            .map_err(HistoryError::from)
            .and_then(|json| self.store.set(HISTORY_KEY, &json));
        if let Err(e) = result {
            tracing::warn!(error = %e, "failed to persist run history");
        }
    }

    /// All runs, newest first
    pub fn list(&self) -> Vec<RunRecord> {
        self.load().unwrap_or_else(|e| {
            tracing::warn!(error = %e, "run history unreadable, treating as empty");
            Vec::new()
        })
    }

    pub fn len(&self) -> usize {
        self.list().len()
    }

    pub fn is_empty(&self) -> bool {
        self.list().is_empty()
    }

    pub fn get(&self, id: i64) -> Option<RunRecord> {
        self.list().into_iter().find(|r| r.id == id)
    }

    pub fn latest(&self) -> Option<RunRecord> {
        self.list().into_iter().next()
    }

    pub fn save(&mut self, record: RunRecord) {
        let mut runs = self.list();
        runs.insert(0, record);
        runs.truncate(HISTORY_CAPACITY);
        self.write(&runs);
    }

    /// Removing an unknown id is a no-op
    pub fn delete(&mut self, id: i64) {
        let mut runs = self.list();
        let before = runs.len();
        runs.retain(|r| r.id != id);
        if runs.len() != before {
            self.write(&runs);
        }
    }

    pub fn clear(&mut self) {
        self.write(&[]);
    }

    /// Creation-time id that never collides with the newest stored run
    pub fn next_id(&self, now_ms: i64) -> i64 {
        match self.latest() {
            Some(newest) if newest.id >= now_ms => newest.id + 1,
            _ => now_ms,
        }
    }
}
