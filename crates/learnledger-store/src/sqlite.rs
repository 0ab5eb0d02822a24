use std::path::{Path, PathBuf};
use std::time::Duration;

use rusqlite::{params, Connection, OptionalExtension, TransactionBehavior};

use crate::{BatchOp, RecordStore, ScanIter, StoreError, WriteBatch};

#[derive(Debug, Clone)]
pub struct SqliteOptions {
    pub busy_timeout_ms: u64,
    /// Negative values are KB units, as in `PRAGMA cache_size`.
    pub cache_pages: i64,
}

impl Default for SqliteOptions {
    fn default() -> Self {
        // Busy timeout (default 5000ms; override with LEARNLEDGER_SQLITE_BUSY_MS)
        let busy_timeout_ms = std::env::var("LEARNLEDGER_SQLITE_BUSY_MS")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(5000);
        let cache_pages = std::env::var("LEARNLEDGER_SQLITE_CACHE_PAGES")
            .ok()
            .and_then(|s| s.parse().ok())
            .unwrap_or(-20000);
        Self {
            busy_timeout_ms,
            cache_pages,
        }
    }
}

/// Durable store over a single SQLite table. Keys are stored as blobs so the
/// composite-key separator survives and ordering stays bytewise.
#[derive(Debug, Clone)]
pub struct SqliteStore {
    db_path: PathBuf,
    options: SqliteOptions,
}

impl SqliteStore {
    pub fn open(path: &Path) -> Result<Self, StoreError> {
        Self::open_with(path, SqliteOptions::default())
    }

    pub fn open_with(path: &Path, options: SqliteOptions) -> Result<Self, StoreError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent)
                .map_err(|e| StoreError::Backend(format!("create {}: {e}", parent.display())))?;
        }
        let store = Self {
            db_path: path.to_path_buf(),
            options,
        };
        let conn = store.conn()?;
        conn.pragma_update(None, "journal_mode", "WAL")?;
        conn.pragma_update(None, "synchronous", "NORMAL")?;
        let _ = conn.pragma_update(None, "cache_size", store.options.cache_pages);
        let _ = conn.pragma_update(None, "temp_store", "MEMORY");
        Self::init_schema(&conn)?;
        tracing::debug!(path = %store.db_path.display(), "sqlite record store opened");
        Ok(store)
    }

    fn init_schema(conn: &Connection) -> Result<(), StoreError> {
        conn.execute_batch(
            r#"
            CREATE TABLE IF NOT EXISTS records (
              key BLOB PRIMARY KEY,
              value BLOB NOT NULL
            ) WITHOUT ROWID;
            "#,
        )?;
        Ok(())
    }

    fn conn(&self) -> Result<Connection, StoreError> {
        let conn = Connection::open(&self.db_path)?;
        conn.busy_timeout(Duration::from_millis(self.options.busy_timeout_ms))?;
        Ok(conn)
    }

    pub fn db_path(&self) -> &Path {
        &self.db_path
    }
}

fn key_from_blob(raw: Vec<u8>) -> Result<String, StoreError> {
    String::from_utf8(raw).map_err(|e| StoreError::Backend(format!("non utf-8 key: {e}")))
}

impl RecordStore for SqliteStore {
    fn get(&self, key: &str) -> Result<Option<Vec<u8>>, StoreError> {
        let conn = self.conn()?;
        let value = conn
            .query_row(
                "SELECT value FROM records WHERE key=?1",
                params![key.as_bytes()],
                |row| row.get::<_, Vec<u8>>(0),
            )
            .optional()?;
        Ok(value)
    }

    fn scan_range(&self, low: &str, high: &str) -> Result<ScanIter<'_>, StoreError> {
        let conn = self.conn()?;
        let mut stmt =
            conn.prepare("SELECT key,value FROM records WHERE key>=?1 AND key<?2 ORDER BY key ASC")?;
        let mut rows = stmt.query(params![low.as_bytes(), high.as_bytes()])?;
        let mut out: Vec<Result<(String, Vec<u8>), StoreError>> = Vec::new();
        loop {
            match rows.next() {
                Ok(Some(row)) => {
                    let pair = row
                        .get::<_, Vec<u8>>(0)
                        .map_err(StoreError::from)
                        .and_then(key_from_blob)
                        .and_then(|k| Ok((k, row.get::<_, Vec<u8>>(1)?)));
                    out.push(pair);
                }
                Ok(None) => break,
                Err(e) => {
                    // Hand the failure to the consumer at the point it happened.
                    out.push(Err(e.into()));
                    break;
                }
            }
        }
        Ok(Box::new(out.into_iter()))
    }

    fn write(&self, batch: WriteBatch) -> Result<(), StoreError> {
        let mut conn = self.conn()?;
        let tx = conn.transaction_with_behavior(TransactionBehavior::Immediate)?;
        for (key, expected) in batch.expectations() {
            let current: Option<Vec<u8>> = tx
                .query_row(
                    "SELECT value FROM records WHERE key=?1",
                    params![key.as_bytes()],
                    |row| row.get(0),
                )
                .optional()?;
            if &current != expected {
                return Err(StoreError::Conflict { key: key.clone() });
            }
        }
        for op in batch.ops() {
            match op {
                BatchOp::Put { key, value } => {
                    tx.execute(
                        "INSERT OR REPLACE INTO records(key,value) VALUES(?1,?2)",
                        params![key.as_bytes(), value],
                    )?;
                }
                BatchOp::Delete { key } => {
                    tx.execute("DELETE FROM records WHERE key=?1", params![key.as_bytes()])?;
                }
            }
        }
        tx.commit()?;
        Ok(())
    }
}
