//! SQLite-backed `RecordStore`.
//!
//! Provides the durable timer table with synchronous operations plus
//! `_async` variants that run on the blocking thread pool.

use chrono::{DateTime, Utc};
use rusqlite::{Connection, OptionalExtension, TransactionBehavior, params};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, MutexGuard};
use std::time::Duration;

use super::derive::derive_id;
use super::types::{RetentionPolicy, TimerRecord, UpsertOutcome};
use crate::constants::SQLITE_BUSY_TIMEOUT_MS;
use crate::error::{Error, Result};

/// Schema applied on every open; idempotent.
const SCHEMA: &str = include_str!("schema.sql");

const SELECT_BY_ID: &str =
    "SELECT id, name, seconds, last_updated FROM timestamps WHERE id = ?1";
const SELECT_ALL: &str =
    "SELECT id, name, seconds, last_updated FROM timestamps ORDER BY name, id";
const INSERT: &str =
    "INSERT INTO timestamps (id, name, seconds, last_updated) VALUES (?1, ?2, ?3, ?4)";
const UPDATE: &str =
    "UPDATE timestamps SET name = ?2, seconds = ?3, last_updated = ?4 WHERE id = ?1";

/// Durable table of timer records.
///
/// # Thread Safety
///
/// `RecordStore` is `Clone` and can be shared across threads. The underlying
/// connection is protected by a Mutex, so every operation (including the
/// read-then-write inside [`RecordStore::upsert`]) is serialized.
#[derive(Clone)]
pub struct RecordStore {
    conn: Arc<Mutex<Connection>>,
    path: Option<PathBuf>,
}

impl RecordStore {
    /// Opens or creates the timer database at the given path.
    ///
    /// Creates parent directories if needed and applies the schema.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let path = path.as_ref();

        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            std::fs::create_dir_all(parent).map_err(|e| {
                Error::io(
                    format!("creating database directory {}", parent.display()),
                    e,
                )
            })?;
        }

        let conn = Connection::open(path)
            .map_err(|e| Error::storage(format!("opening {}", path.display()), e))?;

        Self::init(conn, Some(path.to_path_buf()))
    }

    /// Opens a private in-memory database. Contents vanish on drop.
    pub fn open_in_memory() -> Result<Self> {
        let conn = Connection::open_in_memory()
            .map_err(|e| Error::storage("opening in-memory database", e))?;
        Self::init(conn, None)
    }

    fn init(conn: Connection, path: Option<PathBuf>) -> Result<Self> {
        conn.busy_timeout(Duration::from_millis(SQLITE_BUSY_TIMEOUT_MS))
            .map_err(|e| Error::storage("setting busy timeout", e))?;
        conn.execute_batch(SCHEMA)
            .map_err(|e| Error::storage("creating schema", e))?;

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Path to the database file, `None` for in-memory stores.
    pub fn path(&self) -> Option<&Path> {
        self.path.as_deref()
    }

    fn lock(&self) -> Result<MutexGuard<'_, Connection>> {
        self.conn
            .lock()
            .map_err(|e| Error::Internal(format!("database lock poisoned: {e}")))
    }

    /// Looks up a record by id.
    pub fn get_by_id(&self, id: i64) -> Result<Option<TimerRecord>> {
        let conn = self.lock()?;
        conn.query_row(SELECT_BY_ID, params![id], record_from_row)
            .optional()
            .map_err(|e| Error::storage(format!("reading timer {id}"), e))
    }

    /// Looks up a record by name via its derived id.
    pub fn get_by_name(&self, name: &str) -> Result<Option<TimerRecord>> {
        self.get_by_id(derive_id(name))
    }

    /// Inserts a new record.
    ///
    /// Fails with [`Error::Conflict`] if `id` is already present.
    pub fn insert(
        &self,
        id: i64,
        name: &str,
        seconds: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        check_seconds(seconds)?;
        let conn = self.lock()?;
        conn.execute(INSERT, params![id, name, seconds, timestamp.timestamp()])
            .map(|_| ())
            .map_err(|e| {
                if e.sqlite_error_code() == Some(rusqlite::ErrorCode::ConstraintViolation) {
                    Error::Conflict { id }
                } else {
                    Error::storage(format!("inserting timer {id}"), e)
                }
            })
    }

    /// Replaces name, seconds and timestamp of an existing record.
    ///
    /// Fails with [`Error::NotFound`] if `id` is absent.
    pub fn update(
        &self,
        id: i64,
        name: &str,
        seconds: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        check_seconds(seconds)?;
        let conn = self.lock()?;
        let affected = conn
            .execute(UPDATE, params![id, name, seconds, timestamp.timestamp()])
            .map_err(|e| Error::storage(format!("updating timer {id}"), e))?;

        if affected == 0 {
            return Err(Error::NotFound { id });
        }
        Ok(())
    }

    /// Writes `seconds` for `name`, creating the record if needed.
    ///
    /// The existence check and the write share one `IMMEDIATE` transaction,
    /// so two concurrent upserts of a new name never both try to insert.
    pub fn upsert(
        &self,
        name: &str,
        seconds: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        check_seconds(seconds)?;
        let id = derive_id(name);
        let ts = timestamp.timestamp();

        let mut conn = self.lock()?;
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .map_err(|e| Error::storage("beginning upsert transaction", e))?;

        let exists: bool = tx
            .query_row(
                "SELECT EXISTS(SELECT 1 FROM timestamps WHERE id = ?1)",
                params![id],
                |row| row.get(0),
            )
            .map_err(|e| Error::storage(format!("checking timer {id}"), e))?;

        let outcome = if exists {
            tx.execute(UPDATE, params![id, name, seconds, ts])
                .map_err(|source| Error::Write {
                    id,
                    outcome: UpsertOutcome::Updated,
                    source,
                })?;
            UpsertOutcome::Updated
        } else {
            tx.execute(INSERT, params![id, name, seconds, ts])
                .map_err(|source| Error::Write {
                    id,
                    outcome: UpsertOutcome::Inserted,
                    source,
                })?;
            UpsertOutcome::Inserted
        };

        tx.commit()
            .map_err(|e| Error::storage("committing upsert", e))?;
        Ok(outcome)
    }

    /// Deletes a record by id.
    ///
    /// Fails with [`Error::NotFound`] if nothing was deleted.
    pub fn delete_by_id(&self, id: i64) -> Result<()> {
        let conn = self.lock()?;
        let affected = conn
            .execute("DELETE FROM timestamps WHERE id = ?1", params![id])
            .map_err(|e| Error::storage(format!("deleting timer {id}"), e))?;

        if affected == 0 {
            return Err(Error::NotFound { id });
        }
        Ok(())
    }

    /// Returns every record, ordered by name.
    pub fn list_all(&self) -> Result<Vec<TimerRecord>> {
        let conn = self.lock()?;
        let mut stmt = conn
            .prepare(SELECT_ALL)
            .map_err(|e| Error::storage("preparing timer listing", e))?;

        stmt.query_map([], record_from_row)
            .map_err(|e| Error::storage("listing timers", e))?
            .collect::<rusqlite::Result<Vec<_>>>()
            .map_err(|e| Error::storage("reading timer rows", e))
    }

    /// Deletes every record last written before `policy.cutoff(now)`.
    ///
    /// Returns the number of records removed.
    pub fn delete_older_than(&self, policy: &RetentionPolicy, now: DateTime<Utc>) -> Result<usize> {
        let cutoff = policy.cutoff(now).timestamp();
        let conn = self.lock()?;
        conn.execute(
            "DELETE FROM timestamps WHERE last_updated < ?1",
            params![cutoff],
        )
        .map_err(|e| Error::storage("evicting stale timers", e))
    }

    /// Number of stored records.
    pub fn count(&self) -> Result<usize> {
        let conn = self.lock()?;
        let count: i64 = conn
            .query_row("SELECT COUNT(*) FROM timestamps", [], |row| row.get(0))
            .map_err(|e| Error::storage("counting timers", e))?;
        Ok(usize::try_from(count).unwrap_or(0))
    }

    // =========================================================================
    // Async variants
    // =========================================================================

    /// Async version of [`RecordStore::get_by_id`].
    pub async fn get_by_id_async(&self, id: i64) -> Result<Option<TimerRecord>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.get_by_id(id)).await?
    }

    /// Async version of [`RecordStore::get_by_name`].
    pub async fn get_by_name_async(&self, name: String) -> Result<Option<TimerRecord>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.get_by_name(&name)).await?
    }

    /// Async version of [`RecordStore::insert`].
    pub async fn insert_async(
        &self,
        id: i64,
        name: String,
        seconds: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.insert(id, &name, seconds, timestamp)).await?
    }

    /// Async version of [`RecordStore::update`].
    pub async fn update_async(
        &self,
        id: i64,
        name: String,
        seconds: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.update(id, &name, seconds, timestamp)).await?
    }

    /// Async version of [`RecordStore::upsert`].
    pub async fn upsert_async(
        &self,
        name: String,
        seconds: i64,
        timestamp: DateTime<Utc>,
    ) -> Result<UpsertOutcome> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.upsert(&name, seconds, timestamp)).await?
    }

    /// Async version of [`RecordStore::delete_by_id`].
    pub async fn delete_by_id_async(&self, id: i64) -> Result<()> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.delete_by_id(id)).await?
    }

    /// Async version of [`RecordStore::list_all`].
    pub async fn list_all_async(&self) -> Result<Vec<TimerRecord>> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.list_all()).await?
    }

    /// Async version of [`RecordStore::delete_older_than`].
    pub async fn delete_older_than_async(
        &self,
        policy: RetentionPolicy,
        now: DateTime<Utc>,
    ) -> Result<usize> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.delete_older_than(&policy, now)).await?
    }

    /// Async version of [`RecordStore::count`].
    pub async fn count_async(&self) -> Result<usize> {
        let store = self.clone();
        tokio::task::spawn_blocking(move || store.count()).await?
    }
}

fn check_seconds(seconds: i64) -> Result<()> {
    if seconds < 0 {
        return Err(Error::InvalidRequest(format!(
            "seconds must be non-negative, got {seconds}"
        )));
    }
    Ok(())
}

fn record_from_row(row: &rusqlite::Row<'_>) -> rusqlite::Result<TimerRecord> {
    let ts: i64 = row.get(3)?;
    let last_updated =
        DateTime::from_timestamp(ts, 0).ok_or(rusqlite::Error::IntegralValueOutOfRange(3, ts))?;

    Ok(TimerRecord {
        id: row.get(0)?,
        name: row.get(1)?,
        seconds: row.get(2)?,
        last_updated,
    })
}
