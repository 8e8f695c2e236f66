//! Durable work queue holding one entry per attempted recording transfer.
//!
//! Entries are the only persistent state of the sync: they form the audit
//! trail and are the sole source of the resume cursor.

use fs2::FileExt;
use log::debug;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions};
use sqlx::Row;
use std::fmt;
use std::fs::File;
use std::future::Future;
use std::path::Path;
use std::str::FromStr;
use tokio::runtime::Runtime;

use crate::error::{Result, SyncError};
use crate::queries::{ddl, queue_entries};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum QueueStatus {
    Pending,
    InProgress,
    Done,
    Failed,
}

impl QueueStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            QueueStatus::Pending => "PENDING",
            QueueStatus::InProgress => "IN_PROGRESS",
            QueueStatus::Done => "DONE",
            QueueStatus::Failed => "FAILED",
        }
    }

    /// Entries only move forward: PENDING -> IN_PROGRESS -> {DONE, FAILED}
    pub fn can_transition_to(&self, next: QueueStatus) -> bool {
        matches!(
            (self, next),
            (QueueStatus::Pending, QueueStatus::InProgress)
                | (QueueStatus::InProgress, QueueStatus::Done)
                | (QueueStatus::InProgress, QueueStatus::Failed)
        )
    }
}

impl fmt::Display for QueueStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for QueueStatus {
    type Err = String;

    fn from_str(s: &str) -> std::result::Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().replace('-', "_").as_str() {
            "PENDING" | "NEW" => Ok(QueueStatus::Pending),
            "IN_PROGRESS" => Ok(QueueStatus::InProgress),
            "DONE" => Ok(QueueStatus::Done),
            "FAILED" => Ok(QueueStatus::Failed),
            other => Err(format!("Unknown queue status '{}'", other)),
        }
    }
}

/// One persisted work record
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QueueEntry {
    pub id: i64,
    pub queue_name: String,
    /// Correlation key: the recording's queue call id as text
    pub reference: String,
    /// Derived filename, kept as a human-auditable identity
    pub data: String,
    /// Structured copy of the reference when it parsed as an integer
    pub queue_call_id: Option<i64>,
    pub status: QueueStatus,
    pub message: Option<String>,
    pub created_at: String,
    pub updated_at: String,
}

/// Storage operations the sync pipeline needs from the work queue
pub trait WorkQueue {
    fn get_entries(&self, queue_name: &str, status: QueueStatus) -> Result<Vec<QueueEntry>>;

    /// Insert a PENDING entry and return its id
    fn create_entry(&self, queue_name: &str, reference: &str, data: &str) -> Result<i64>;

    fn set_status(&self, entry_id: i64, status: QueueStatus) -> Result<()>;

    /// Mark an entry FAILED, keeping the failure reason on the entry
    fn set_failed(&self, entry_id: i64, message: &str) -> Result<()>;
}

/// SQLite-backed work queue with an embedded runtime for blocking use
pub struct SqliteWorkQueue {
    pool: SqlitePool,
    runtime: Runtime,
}

impl SqliteWorkQueue {
    /// Open (creating if needed) the work queue database at `path`
    pub fn open(path: &Path) -> Result<Self> {
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)?;
            }
        }
        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .journal_mode(SqliteJournalMode::Wal);
        Self::connect(options, 4)
    }

    /// In-memory database, kept alive on a single pooled connection
    pub fn open_in_memory() -> Result<Self> {
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?;
        Self::connect(options, 1)
    }

    fn connect(options: SqliteConnectOptions, max_connections: u32) -> Result<Self> {
        let runtime = tokio::runtime::Builder::new_current_thread()
            .enable_all()
            .build()?;
        let pool = runtime.block_on(
            SqlitePoolOptions::new()
                .max_connections(max_connections)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options),
        )?;
        let queue = Self { pool, runtime };
        queue.init_schema()?;
        Ok(queue)
    }

    fn block_on<F, T>(&self, fut: F) -> Result<T>
    where
        F: Future<Output = std::result::Result<T, sqlx::Error>>,
    {
        self.runtime.block_on(fut).map_err(SyncError::from)
    }

    fn init_schema(&self) -> Result<()> {
        self.block_on(async {
            sqlx::query(&ddl::create_queue_entries_table())
                .execute(&self.pool)
                .await?;
            sqlx::query(&ddl::create_queue_status_index())
                .execute(&self.pool)
                .await?;
            Ok(())
        })
    }

    fn fetch_entries(&self, sql: &str) -> Result<Vec<QueueEntry>> {
        let rows = self.block_on(sqlx::query(sql).fetch_all(&self.pool))?;
        rows.iter().map(entry_from_row).collect()
    }

    pub fn get_entry(&self, entry_id: i64) -> Result<Option<QueueEntry>> {
        let sql = queue_entries::select_by_id(entry_id);
        Ok(self.fetch_entries(&sql)?.into_iter().next())
    }

    /// Every entry of a queue in insertion order
    pub fn all_entries(&self, queue_name: &str) -> Result<Vec<QueueEntry>> {
        self.fetch_entries(&queue_entries::select_all(queue_name))
    }

    fn transition(&self, entry_id: i64, status: QueueStatus, message: Option<&str>) -> Result<()> {
        let current = self
            .get_entry(entry_id)?
            .ok_or_else(|| SyncError::Store(format!("Queue entry {} not found", entry_id)))?;
        if !current.status.can_transition_to(status) {
            return Err(SyncError::InvalidTransition {
                entry_id,
                from: current.status,
                to: status,
            });
        }
        let now = chrono::Utc::now().to_rfc3339();
        let sql = queue_entries::update_status(entry_id, status.as_str(), message, &now);
        self.block_on(sqlx::query(&sql).execute(&self.pool))?;
        debug!("[Queue] Entry {} {} -> {}", entry_id, current.status, status);
        Ok(())
    }
}

fn entry_from_row(row: &sqlx::sqlite::SqliteRow) -> Result<QueueEntry> {
    let status: String = row.try_get("status")?;
    Ok(QueueEntry {
        id: row.try_get("id")?,
        queue_name: row.try_get("queue_name")?,
        reference: row.try_get("reference")?,
        data: row.try_get("data")?,
        queue_call_id: row.try_get("queue_call_id")?,
        status: status.parse().map_err(SyncError::Store)?,
        message: row.try_get("message")?,
        created_at: row.try_get("created_at")?,
        updated_at: row.try_get("updated_at")?,
    })
}

impl WorkQueue for SqliteWorkQueue {
    fn get_entries(&self, queue_name: &str, status: QueueStatus) -> Result<Vec<QueueEntry>> {
        self.fetch_entries(&queue_entries::select_by_status(queue_name, status.as_str()))
    }

    fn create_entry(&self, queue_name: &str, reference: &str, data: &str) -> Result<i64> {
        let now = chrono::Utc::now().to_rfc3339();
        let sql = queue_entries::insert(
            queue_name,
            reference,
            data,
            reference.trim().parse().ok(),
            QueueStatus::Pending.as_str(),
            &now,
        );
        let result = self.block_on(sqlx::query(&sql).execute(&self.pool))?;
        Ok(result.last_insert_rowid())
    }

    fn set_status(&self, entry_id: i64, status: QueueStatus) -> Result<()> {
        self.transition(entry_id, status, None)
    }

    fn set_failed(&self, entry_id: i64, message: &str) -> Result<()> {
        self.transition(entry_id, QueueStatus::Failed, Some(message))
    }
}

/// Take the single-writer lock next to the work queue database.
/// The lock is held until the returned file is dropped.
pub fn acquire_run_lock(database_path: &Path) -> Result<File> {
    if let Some(parent) = database_path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent)?;
        }
    }
    let lock_path = database_path.with_extension("lock");
    let lock_file = File::create(&lock_path)?;
    lock_file.try_lock_exclusive().map_err(|_| {
        SyncError::Locked(format!(
            "Another sync run is already active. Lock file: {}",
            lock_path.display()
        ))
    })?;
    Ok(lock_file)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_roundtrip_and_aliases() {
        for status in [
            QueueStatus::Pending,
            QueueStatus::InProgress,
            QueueStatus::Done,
            QueueStatus::Failed,
        ] {
            assert_eq!(status.as_str().parse::<QueueStatus>().unwrap(), status);
        }
        assert_eq!("new".parse::<QueueStatus>().unwrap(), QueueStatus::Pending);
        assert_eq!(
            "in-progress".parse::<QueueStatus>().unwrap(),
            QueueStatus::InProgress
        );
        assert!("bogus".parse::<QueueStatus>().is_err());
    }

    #[test]
    fn test_lifecycle_in_memory() {
        let queue = SqliteWorkQueue::open_in_memory().unwrap();
        let id = queue.create_entry("Q", "101", "Sales_x_101.mp3").unwrap();

        let entry = queue.get_entry(id).unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Pending);
        assert_eq!(entry.queue_call_id, Some(101));

        queue.set_status(id, QueueStatus::InProgress).unwrap();
        queue.set_status(id, QueueStatus::Done).unwrap();

        let done = queue.get_entries("Q", QueueStatus::Done).unwrap();
        assert_eq!(done.len(), 1);
        assert_eq!(done[0].data, "Sales_x_101.mp3");
        assert!(queue.get_entries("Other", QueueStatus::Done).unwrap().is_empty());
    }

    #[test]
    fn test_rejects_backward_transition() {
        let queue = SqliteWorkQueue::open_in_memory().unwrap();
        let id = queue.create_entry("Q", "7", "a_7.mp3").unwrap();

        let err = queue.set_status(id, QueueStatus::Done).unwrap_err();
        assert!(matches!(err, SyncError::InvalidTransition { .. }));

        queue.set_status(id, QueueStatus::InProgress).unwrap();
        queue.set_failed(id, "upload timed out").unwrap();
        let entry = queue.get_entry(id).unwrap().unwrap();
        assert_eq!(entry.status, QueueStatus::Failed);
        assert_eq!(entry.message.as_deref(), Some("upload timed out"));

        assert!(queue.set_status(id, QueueStatus::Done).is_err());
    }

    #[test]
    fn test_non_numeric_reference_has_no_structured_id() {
        let queue = SqliteWorkQueue::open_in_memory().unwrap();
        let id = queue.create_entry("Q", "legacy", "a_9.mp3").unwrap();
        assert_eq!(queue.get_entry(id).unwrap().unwrap().queue_call_id, None);
    }

    #[test]
    fn test_file_database_persists_and_locks() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("state").join("queue.sqlite");
        {
            let queue = SqliteWorkQueue::open(&path).unwrap();
            queue.create_entry("Q", "1", "a_1.mp3").unwrap();
        }
        let queue = SqliteWorkQueue::open(&path).unwrap();
        assert_eq!(queue.all_entries("Q").unwrap().len(), 1);

        let _lock = acquire_run_lock(&path).unwrap();
        assert!(matches!(
            acquire_run_lock(&path),
            Err(SyncError::Locked(_))
        ));
    }
}
