use chrono::{DateTime, Local, TimeZone};
use rusqlite::{params, Connection};
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::sink::{CaptureRecord, CaptureSink, SinkError};

/// SQLite-backed capture sink.
///
/// Schema: a single `captures` table of (timestamp_ms, movement_level,
/// frame_path), indexed by timestamp. WAL mode lets an external reader poll
/// the file while the monitor writes.
pub struct SqliteSink {
    conn: Connection,
}

impl SqliteSink {
    /// Open (or create) the database at `path`, creating its parent directory.
    pub fn open(path: &Path) -> Result<Self, SinkError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SinkError::Directory(parent.display().to_string(), e))?;
        }

        let conn = Connection::open(path)?;
        conn.execute_batch("PRAGMA journal_mode=WAL; PRAGMA synchronous=NORMAL;")?;
        Self::init(conn, path)
    }

    /// In-memory database, mostly for tests.
    #[allow(dead_code)]
    pub fn open_in_memory() -> Result<Self, SinkError> {
        Self::init(Connection::open_in_memory()?, Path::new(":memory:"))
    }

    fn init(conn: Connection, path: &Path) -> Result<Self, SinkError> {
        conn.execute_batch(
            "CREATE TABLE IF NOT EXISTS captures (
                id             INTEGER PRIMARY KEY AUTOINCREMENT,
                timestamp_ms   INTEGER NOT NULL,
                movement_level REAL    NOT NULL,
                frame_path     TEXT
            );
            CREATE INDEX IF NOT EXISTS idx_captures_time
                ON captures(timestamp_ms);",
        )?;

        info!(path = path.display().to_string(), "capture database opened");
        Ok(Self { conn })
    }

    /// Insert one record. Returns the new row id.
    pub fn insert(&self, record: &CaptureRecord) -> Result<i64, SinkError> {
        let timestamp_ms = record.captured_at.timestamp_millis();
        let frame_path = record.frame_path.display().to_string();
        self.conn.execute(
            "INSERT INTO captures (timestamp_ms, movement_level, frame_path)
             VALUES (?1, ?2, ?3)",
            params![timestamp_ms, record.movement_level, frame_path],
        )?;
        let id = self.conn.last_insert_rowid();
        debug!(id, timestamp_ms, frame_path, "inserted capture record");
        Ok(id)
    }

    /// The most recent `limit` records, newest first.
    #[allow(dead_code)]
    pub fn recent(&self, limit: usize) -> Result<Vec<CaptureRecord>, SinkError> {
        let mut stmt = self.conn.prepare(
            "SELECT timestamp_ms, movement_level, frame_path
             FROM captures ORDER BY timestamp_ms DESC, id DESC LIMIT ?1",
        )?;
        let rows = stmt.query_map(params![limit as i64], |row| {
            let timestamp_ms: i64 = row.get(0)?;
            let frame_path: Option<String> = row.get(2)?;
            Ok(CaptureRecord {
                captured_at: local_from_millis(timestamp_ms),
                movement_level: row.get(1)?,
                frame_path: frame_path.map(PathBuf::from).unwrap_or_default(),
            })
        })?;
        Ok(rows.collect::<Result<Vec<_>, _>>()?)
    }
}

impl CaptureSink for SqliteSink {
    fn record(&mut self, record: &CaptureRecord) -> Result<(), SinkError> {
        self.insert(record).map(|_| ())
    }

    fn name(&self) -> &str {
        "sqlite"
    }
}

fn local_from_millis(ms: i64) -> DateTime<Local> {
    Local
        .timestamp_millis_opt(ms)
        .single()
        .unwrap_or_else(Local::now)
}
