use chrono::{DateTime, Utc};
use rusqlite::{params, Connection};
use serde::{de::DeserializeOwned, Serialize};
use std::path::Path;
use std::sync::Mutex;
use thiserror::Error;
use tracing::{debug, info, warn};

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("SQLite error: {0}")]
    Sqlite(#[from] rusqlite::Error),

    #[error("Failed to (de)serialize cached results: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("Could not create cache directory: {0}")]
    Io(#[from] std::io::Error),

    #[error("Refusing to cache an empty result list")]
    EmptyResults,

    #[error("Cache connection lock poisoned")]
    Poisoned,

    #[error("Corrupt timestamp in cache entry {id}: {value}")]
    BadTimestamp { id: i64, value: String },
}

pub type Result<T> = std::result::Result<T, CacheError>;

/// One row of the cache, minus the payload
#[derive(Debug, Clone, PartialEq)]
pub struct EntrySummary {
    pub id: i64,
    pub mode: String,
    pub query: String,
    pub timestamp: DateTime<Utc>,
    pub result_count: usize,
}

#[derive(Debug, Clone, Default, PartialEq)]
pub struct CacheStats {
    pub entries: usize,
    pub records: usize,
    pub oldest: Option<DateTime<Utc>>,
    pub newest: Option<DateTime<Utc>>,
}

/// Query cache on top of SQLite.
///
/// Entries are keyed by exact `(mode, query)` text and are append-only: no
/// TTL, no updates. If two writers race on the same query both rows land
/// and `lookup` keeps answering with the oldest readable one.
pub struct CacheManager {
    conn: Mutex<Connection>,
}

impl CacheManager {
    /// Open (or create) the cache database at `db_path`
    pub fn new<P: AsRef<Path>>(db_path: P) -> Result<Self> {
        let db_path = db_path.as_ref();
        if let Some(parent) = db_path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let conn = Connection::open(db_path)?;
        Self::init_schema(&conn)?;
        debug!("Opened query cache at {}", db_path.display());

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    /// Throwaway cache that lives as long as the handle
    pub fn in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()?;
        Self::init_schema(&conn)?;

        Ok(Self {
            conn: Mutex::new(conn),
        })
    }

    fn init_schema(conn: &Connection) -> Result<()> {
        conn.execute(
            "CREATE TABLE IF NOT EXISTS grant_queries (
                id INTEGER PRIMARY KEY AUTOINCREMENT,
                mode TEXT NOT NULL,
                query TEXT NOT NULL,
                timestamp TEXT NOT NULL,
                result_count INTEGER NOT NULL,
                results TEXT NOT NULL
            )",
            [],
        )?;

        // Not UNIQUE: concurrent sessions may both write the same key
        conn.execute(
            "CREATE INDEX IF NOT EXISTS idx_grant_queries_key
             ON grant_queries(mode, query)",
            [],
        )?;

        Ok(())
    }

    fn conn(&self) -> Result<std::sync::MutexGuard<'_, Connection>> {
        self.conn.lock().map_err(|_| CacheError::Poisoned)
    }

    /// Results of the oldest readable entry stored for `(mode, query)`.
    ///
    /// Rows whose payload no longer decodes as `T` are skipped, so a
    /// corrupt first entry doesn't shadow a good one written later.
    pub fn lookup<T: DeserializeOwned>(&self, mode: &str, query: &str) -> Result<Option<Vec<T>>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, results FROM grant_queries
             WHERE mode = ?1 AND query = ?2
             ORDER BY id ASC",
        )?;
        let rows = stmt.query_map(params![mode, query], |row| {
            Ok((row.get::<_, i64>(0)?, row.get::<_, String>(1)?))
        })?;

        for row in rows {
            let (id, json) = row?;
            match serde_json::from_str::<Vec<T>>(&json) {
                Ok(results) => {
                    debug!("Cache hit for {}:{:?} ({} results)", mode, query, results.len());
                    return Ok(Some(results));
                }
                Err(e) => warn!("Skipping unreadable cache entry {}: {}", id, e),
            }
        }

        debug!("Cache miss for {}:{:?}", mode, query);
        Ok(None)
    }

    /// Append a new entry and return its row id
    pub fn store<T: Serialize>(&self, mode: &str, query: &str, results: &[T]) -> Result<i64> {
        if results.is_empty() {
            return Err(CacheError::EmptyResults);
        }

        let payload = serde_json::to_string(results)?;
        let timestamp = Utc::now().to_rfc3339();

        let conn = self.conn()?;
        conn.execute(
            "INSERT INTO grant_queries (mode, query, timestamp, result_count, results)
             VALUES (?1, ?2, ?3, ?4, ?5)",
            params![mode, query, timestamp, results.len() as i64, payload],
        )?;
        let id = conn.last_insert_rowid();

        info!("Cached {} results for {}:{:?}", results.len(), mode, query);
        Ok(id)
    }

    /// Every entry, oldest first
    pub fn entries(&self) -> Result<Vec<EntrySummary>> {
        let conn = self.conn()?;
        let mut stmt = conn.prepare(
            "SELECT id, mode, query, timestamp, result_count
             FROM grant_queries
             ORDER BY id ASC",
        )?;

        let rows = stmt.query_map([], |row| {
            Ok((
                row.get::<_, i64>(0)?,
                row.get::<_, String>(1)?,
                row.get::<_, String>(2)?,
                row.get::<_, String>(3)?,
                row.get::<_, i64>(4)?,
            ))
        })?;

        let mut entries = Vec::new();
        for row in rows {
            let (id, mode, query, timestamp, result_count) = row?;
            entries.push(EntrySummary {
                id,
                mode,
                query,
                timestamp: parse_timestamp(id, &timestamp)?,
                result_count: result_count.max(0) as usize,
            });
        }

        Ok(entries)
    }

    pub fn stats(&self) -> Result<CacheStats> {
        let entries = self.entries()?;

        Ok(CacheStats {
            entries: entries.len(),
            records: entries.iter().map(|e| e.result_count).sum(),
            oldest: entries.iter().map(|e| e.timestamp).min(),
            newest: entries.iter().map(|e| e.timestamp).max(),
        })
    }

    /// Drop every entry; returns how many went
    pub fn clear(&self) -> Result<usize> {
        let conn = self.conn()?;
        let removed = conn.execute("DELETE FROM grant_queries", [])?;
        info!("Cleared {} cache entries", removed);
        Ok(removed)
    }
}

fn parse_timestamp(id: i64, value: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(value)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|_| CacheError::BadTimestamp {
            id,
            value: value.to_string(),
        })
}
