//! Alert Store - Append-only alert persistence
//!
//! `AlertStore` is the seam the scoring pass writes through. The SQLite
//! implementation keeps the `alerts` table layout:
//!
//! ```sql
//! alerts(id INTEGER PRIMARY KEY AUTOINCREMENT, ts TEXT, src TEXT, dst TEXT,
//!        proto TEXT, score REAL, metadata TEXT)
//! ```

use std::path::{Path, PathBuf};

use chrono::{DateTime, NaiveDateTime, SecondsFormat, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection};

use super::record::AlertRecord;
use crate::constants::UNKNOWN_LABEL;
use crate::logic::error::{Result, SentinelError};

/// Offset-less layouts other writers use: ISO 8601 with `T`, and SQLite's `CURRENT_TIMESTAMP`
const NAIVE_TS_FORMATS: &[&str] = &["%Y-%m-%dT%H:%M:%S%.f", "%Y-%m-%d %H:%M:%S%.f"];

/// Parse a stored timestamp; offset-less values are read as UTC
fn parse_ts(raw: &str) -> Option<DateTime<Utc>> {
    if let Ok(ts) = DateTime::parse_from_rfc3339(raw) {
        return Some(ts.with_timezone(&Utc));
    }
    NAIVE_TS_FORMATS
        .iter()
        .find_map(|fmt| NaiveDateTime::parse_from_str(raw, fmt).ok())
        .map(|naive| naive.and_utc())
}

/// Durable, append-only alert sink
pub trait AlertStore: Send + Sync {
    /// Append one alert and return its row id
    fn insert(&self, alert: &AlertRecord) -> Result<i64>;

    /// Most recent alerts, newest insertion first
    fn recent(&self, limit: usize) -> Result<Vec<AlertRecord>>;
}

/// SQLite-backed store, one connection shared behind a mutex
pub struct SqliteAlertStore {
    conn: Mutex<Connection>,
    path: Option<PathBuf>,
}

impl SqliteAlertStore {
    /// Open or create the database at the given path
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| SentinelError::Persistence(format!("Cannot create {}: {}", parent.display(), e)))?;
        }

        let conn = Connection::open(path)
            .map_err(|e| SentinelError::Persistence(format!("Failed to open database {}: {}", path.display(), e)))?;

        let store = Self {
            conn: Mutex::new(conn),
            path: Some(path.to_path_buf()),
        };
        store.init_schema()?;
        Ok(store)
    }

    /// Open an in-memory database (for testing)
    pub fn open_in_memory() -> Result<Self> {
        let store = Self {
            conn: Mutex::new(Connection::open_in_memory()?),
            path: None,
        };
        store.init_schema()?;
        Ok(store)
    }

    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn init_schema(&self) -> Result<()> {
        self.conn.lock().execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS alerts (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                ts TEXT,
                src TEXT,
                dst TEXT,
                proto TEXT,
                score REAL,
                metadata TEXT
            );
            "#,
        )?;
        Ok(())
    }

    /// Total rows
    pub fn count(&self) -> Result<u64> {
        let n: i64 = self.conn.lock().query_row("SELECT COUNT(*) FROM alerts", [], |row| row.get(0))?;
        Ok(n as u64)
    }
}

impl AlertStore for SqliteAlertStore {
    fn insert(&self, alert: &AlertRecord) -> Result<i64> {
        let metadata = serde_json::to_string(&alert.metadata)?;
        let conn = self.conn.lock();

        conn.execute(
            "INSERT INTO alerts (ts, src, dst, proto, score, metadata) VALUES (?1, ?2, ?3, ?4, ?5, ?6)",
            params![
                alert.ts.to_rfc3339_opts(SecondsFormat::Micros, true),
                alert.src,
                alert.dst,
                alert.proto,
                alert.score,
                metadata
            ],
        )?;
        Ok(conn.last_insert_rowid())
    }

    fn recent(&self, limit: usize) -> Result<Vec<AlertRecord>> {
        let conn = self.conn.lock();
        let mut stmt = conn.prepare(
            "SELECT id, ts, src, dst, proto, score, metadata FROM alerts ORDER BY id DESC LIMIT ?1",
        )?;

        let rows = stmt
            .query_map(params![limit as i64], |row| {
                Ok((
                    row.get::<_, i64>(0)?,
                    row.get::<_, Option<String>>(1)?,
                    row.get::<_, Option<String>>(2)?,
                    row.get::<_, Option<String>>(3)?,
                    row.get::<_, Option<String>>(4)?,
                    row.get::<_, Option<f64>>(5)?,
                    row.get::<_, Option<String>>(6)?,
                ))
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        let label = |v: Option<String>| v.unwrap_or_else(|| UNKNOWN_LABEL.to_string());

        Ok(rows
            .into_iter()
            .filter_map(|(id, ts, src, dst, proto, score, metadata)| {
                let ts = match ts.as_deref().and_then(parse_ts) {
                    Some(ts) => ts,
                    None => {
                        log::warn!("Skipping alert {} with unreadable timestamp {:?}", id, ts);
                        return None;
                    }
                };

                // Rows written by other tools may carry non-JSON metadata
                let metadata = match metadata {
                    Some(raw) => serde_json::from_str(&raw).unwrap_or(serde_json::Value::String(raw)),
                    None => serde_json::Value::Null,
                };

                Some(AlertRecord {
                    id: Some(id),
                    ts,
                    src: label(src),
                    dst: label(dst),
                    proto: label(proto),
                    score: score.unwrap_or(f64::NAN),
                    metadata,
                })
            })
            .collect())
    }
}
