//! SqliteMedium - 共有ファイル上のジョブテーブル
//!
//! One database file per namespace (`<dir>/<namespace>.sqlite3`) holding a
//! single `~jobs` table. The composite primary key
//! `(table_name, key_hash)` is the only synchronization primitive: every
//! process opening the same file competes through it.
//!
//! # 実装詳細
//! - rusqlite は同期 API なので spawn_blocking で実行
//! - 各 `SqliteJobTable` は自分専用の Connection を持つ
//! - WAL + busy_timeout で他プロセスの書き込み中は待機する

use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, params};

use crate::config::SqliteConfig;
use crate::domain::{JobRecord, JobStatus, KeyHash, Namespace, RecordFilter, StorageError};
use crate::ports::{InsertOutcome, JobTable, JobTableFactory};

const DECLARE_SQL: &str = r#"
CREATE TABLE IF NOT EXISTS "~jobs" (
    table_name    TEXT    NOT NULL,
    key_hash      TEXT    NOT NULL,
    status        TEXT    NOT NULL CHECK (status IN ('reserved', 'error', 'ignore')),
    key           TEXT,
    error_message TEXT    NOT NULL DEFAULT '',
    error_stack   TEXT,
    host          TEXT    NOT NULL DEFAULT '',
    pid           INTEGER NOT NULL DEFAULT 0,
    timestamp     TEXT    NOT NULL,
    PRIMARY KEY (table_name, key_hash)
);
"#;

const COLUMNS: &str =
    "table_name, key_hash, status, key, error_message, error_stack, host, pid, timestamp";

const INSERT_SQL: &str = r#"INSERT INTO "~jobs" (table_name, key_hash, status, key, error_message, error_stack, host, pid, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#;

const REPLACE_SQL: &str = r#"INSERT OR REPLACE INTO "~jobs" (table_name, key_hash, status, key, error_message, error_stack, host, pid, timestamp) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)"#;

const FILTER_SQL: &str = "(?1 IS NULL OR table_name = ?1) AND (?2 IS NULL OR status = ?2)";

/// Timestamps are stored as fixed-width RFC 3339 text so that text order
/// is time order.
const TIMESTAMP_FORMAT: &str = "%Y-%m-%dT%H:%M:%S%.6fZ";

/// SQLite-backed medium rooted at a directory.
#[derive(Debug, Clone)]
pub struct SqliteMedium {
    dir: PathBuf,
    busy_timeout: Duration,
}

impl SqliteMedium {
    pub fn new(config: &SqliteConfig) -> Self {
        Self {
            dir: config.dir.clone(),
            busy_timeout: Duration::from_millis(config.busy_timeout_ms),
        }
    }

    pub fn dir(&self) -> &Path {
        &self.dir
    }

    /// Database file backing `namespace`.
    pub fn database_path(&self, namespace: &Namespace) -> PathBuf {
        self.dir.join(format!("{namespace}.sqlite3"))
    }
}

#[async_trait]
impl JobTableFactory for SqliteMedium {
    async fn open(&self, namespace: &Namespace) -> Result<Arc<dyn JobTable>, StorageError> {
        let dir = self.dir.clone();
        let path = self.database_path(namespace);
        let busy_timeout = self.busy_timeout;

        let conn = {
            let path = path.clone();
            tokio::task::spawn_blocking(move || declare(&dir, &path, busy_timeout))
                .await
                .map_err(|e| StorageError::Task(e.to_string()))??
        };
        tracing::debug!(path = %path.display(), "opened sqlite job table");

        Ok(Arc::new(SqliteJobTable {
            conn: Arc::new(Mutex::new(conn)),
            path,
        }))
    }
}

/// Open the database and declare `~jobs` if absent.
fn declare(dir: &Path, path: &Path, busy_timeout: Duration) -> Result<Connection, StorageError> {
    std::fs::create_dir_all(dir)?;
    let conn = Connection::open(path)?;
    conn.busy_timeout(busy_timeout)?;
    conn.pragma_update_and_check(None, "journal_mode", "WAL", |row| {
        row.get::<_, String>(0)
    })?;
    conn.execute_batch(DECLARE_SQL)?;
    // fails on a pre-existing table with a different layout
    conn.prepare(&format!(r#"SELECT {COLUMNS} FROM "~jobs" LIMIT 0"#))?;
    Ok(conn)
}

/// Job table inside one SQLite database file.
pub struct SqliteJobTable {
    // Connection is !Sync; the mutex only serializes this handle's own calls
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl SqliteJobTable {
    pub fn path(&self) -> &Path {
        &self.path
    }

    async fn call<R, F>(&self, f: F) -> Result<R, StorageError>
    where
        F: FnOnce(&Connection) -> Result<R, StorageError> + Send + 'static,
        R: Send + 'static,
    {
        let conn = Arc::clone(&self.conn);
        tokio::task::spawn_blocking(move || {
            let conn = conn.lock().map_err(|_| StorageError::Poisoned)?;
            f(&conn)
        })
        .await
        .map_err(|e| StorageError::Task(e.to_string()))?
    }
}

fn write(conn: &Connection, sql: &str, record: &JobRecord) -> Result<usize, rusqlite::Error> {
    let key = record.key.as_ref().map(|k| k.to_string());
    conn.execute(
        sql,
        params![
            record.work_unit,
            record.key_hash.as_str(),
            record.status.as_str(),
            key,
            record.error_message,
            record.error_stack,
            record.host,
            record.pid,
            record.timestamp.format(TIMESTAMP_FORMAT).to_string(),
        ],
    )
}

fn is_duplicate_key(err: &rusqlite::Error) -> bool {
    matches!(
        err,
        rusqlite::Error::SqliteFailure(e, _)
            if e.extended_code == rusqlite::ffi::SQLITE_CONSTRAINT_PRIMARYKEY
    )
}

/// Row as stored, before validation.
struct StoredRow {
    table_name: String,
    key_hash: String,
    status: String,
    key: Option<String>,
    error_message: String,
    error_stack: Option<String>,
    host: String,
    pid: u32,
    timestamp: String,
}

impl StoredRow {
    fn from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<Self> {
        Ok(Self {
            table_name: row.get(0)?,
            key_hash: row.get(1)?,
            status: row.get(2)?,
            key: row.get(3)?,
            error_message: row.get(4)?,
            error_stack: row.get(5)?,
            host: row.get(6)?,
            pid: row.get(7)?,
            timestamp: row.get(8)?,
        })
    }
}

impl TryFrom<StoredRow> for JobRecord {
    type Error = StorageError;

    fn try_from(row: StoredRow) -> Result<Self, Self::Error> {
        let key_hash = KeyHash::parse(&row.key_hash)
            .ok_or_else(|| StorageError::Corrupt(format!("bad key_hash '{}'", row.key_hash)))?;
        let status = row
            .status
            .parse::<JobStatus>()
            .map_err(|e| StorageError::Corrupt(e.to_string()))?;
        let key = row
            .key
            .map(|k| serde_json::from_str(&k))
            .transpose()
            .map_err(|e| StorageError::Corrupt(format!("bad key copy: {e}")))?;
        let timestamp = DateTime::parse_from_rfc3339(&row.timestamp)
            .map_err(|e| StorageError::Corrupt(format!("bad timestamp '{}': {e}", row.timestamp)))?
            .with_timezone(&Utc);

        Ok(JobRecord {
            work_unit: row.table_name,
            key_hash,
            status,
            key,
            error_message: row.error_message,
            error_stack: row.error_stack,
            host: row.host,
            pid: row.pid,
            timestamp,
        })
    }
}

#[async_trait]
impl JobTable for SqliteJobTable {
    async fn insert(&self, record: JobRecord) -> Result<InsertOutcome, StorageError> {
        self.call(move |conn| match write(conn, INSERT_SQL, &record) {
            Ok(_) => Ok(InsertOutcome::Inserted),
            Err(e) if is_duplicate_key(&e) => Ok(InsertOutcome::Duplicate),
            Err(e) => Err(e.into()),
        })
        .await
    }

    async fn replace(&self, record: JobRecord) -> Result<(), StorageError> {
        self.call(move |conn| {
            write(conn, REPLACE_SQL, &record)?;
            Ok(())
        })
        .await
    }

    async fn delete(&self, work_unit: &str, key_hash: &KeyHash) -> Result<bool, StorageError> {
        let work_unit = work_unit.to_string();
        let key_hash = key_hash.clone();
        self.call(move |conn| {
            let n = conn.execute(
                r#"DELETE FROM "~jobs" WHERE table_name = ?1 AND key_hash = ?2"#,
                params![work_unit, key_hash.as_str()],
            )?;
            Ok(n > 0)
        })
        .await
    }

    async fn get(
        &self,
        work_unit: &str,
        key_hash: &KeyHash,
    ) -> Result<Option<JobRecord>, StorageError> {
        let work_unit = work_unit.to_string();
        let key_hash = key_hash.clone();
        self.call(move |conn| {
            let row = conn
                .query_row(
                    &format!(
                        r#"SELECT {COLUMNS} FROM "~jobs" WHERE table_name = ?1 AND key_hash = ?2"#
                    ),
                    params![work_unit, key_hash.as_str()],
                    StoredRow::from_row,
                )
                .optional()?;
            row.map(JobRecord::try_from).transpose()
        })
        .await
    }

    async fn list(&self, filter: &RecordFilter) -> Result<Vec<JobRecord>, StorageError> {
        let filter = filter.clone();
        self.call(move |conn| {
            let mut stmt = conn.prepare(&format!(
                r#"SELECT {COLUMNS} FROM "~jobs" WHERE {FILTER_SQL} ORDER BY timestamp, key_hash"#
            ))?;
            let rows = stmt.query_map(
                params![filter.work_unit, filter.status.map(JobStatus::as_str)],
                StoredRow::from_row,
            )?;
            let mut records = Vec::new();
            for row in rows {
                records.push(JobRecord::try_from(row?)?);
            }
            Ok(records)
        })
        .await
    }

    async fn delete_where(&self, filter: &RecordFilter) -> Result<u64, StorageError> {
        let filter = filter.clone();
        self.call(move |conn| {
            let n = conn.execute(
                &format!(r#"DELETE FROM "~jobs" WHERE {FILTER_SQL}"#),
                params![filter.work_unit, filter.status.map(JobStatus::as_str)],
            )?;
            Ok(n as u64)
        })
        .await
    }

    async fn drop_table(&self) -> Result<(), StorageError> {
        self.call(|conn| {
            conn.execute_batch(r#"DROP TABLE IF EXISTS "~jobs";"#)?;
            Ok(())
        })
        .await
    }
}
