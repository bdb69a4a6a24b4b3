//! SqliteLessonStore - SQLite WAL storage for lesson records
//!
//! One row per lesson. Terminal transitions are a conditional `UPDATE ...
//! WHERE status = 'generating'`, so a second writer observes zero affected
//! rows instead of overwriting the first outcome.

use std::path::Path;

use async_trait::async_trait;
use chrono::{DateTime, TimeZone, Utc};
use parking_lot::Mutex;
use rusqlite::{params, Connection, OptionalExtension, Row, TransactionBehavior};
use uuid::Uuid;

use super::LessonStore;
use crate::error::{ForgeError, Result, ResultExt, StorageError};
use crate::lesson::{outline_fingerprint, LessonRecord, LessonStatus};

const SELECT_COLUMNS: &str = "id, title, outline, status, generated_content, error_message, created_at_ms, updated_at_ms";

/// SQLite-backed [`LessonStore`]
pub struct SqliteLessonStore {
    conn: Mutex<Connection>,
}

impl std::fmt::Debug for SqliteLessonStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SqliteLessonStore").finish_non_exhaustive()
    }
}

impl SqliteLessonStore {
    /// Open (or create) the database in WAL mode. `":memory:"` opens a
    /// private in-memory database.
    pub fn open(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() {
                std::fs::create_dir_all(parent)
                    .with_context(|| format!("Creating database directory '{}'", parent.display()))?;
            }
        }

        let conn = Connection::open(path)
            .with_context(|| format!("Opening SQLite database '{}'", path.display()))?;

        conn.execute_batch(
            "PRAGMA journal_mode = WAL;
             PRAGMA synchronous = NORMAL;
             PRAGMA busy_timeout = 5000;",
        )
        .context("Configuring SQLite WAL pragmas")?;

        let store = Self {
            conn: Mutex::new(conn),
        };
        store.migrate()?;
        Ok(store)
    }

    /// Idempotent schema setup
    fn migrate(&self) -> Result<()> {
        self.conn
            .lock()
            .execute_batch(
                "
            CREATE TABLE IF NOT EXISTS lessons (
                id                TEXT PRIMARY KEY,
                title             TEXT NOT NULL,
                outline           TEXT NOT NULL,
                outline_hash      TEXT NOT NULL,
                status            TEXT NOT NULL CHECK (status IN ('generating', 'generated', 'failed')),
                generated_content TEXT,
                error_message     TEXT,
                created_at_ms     INTEGER NOT NULL,
                updated_at_ms     INTEGER NOT NULL
            );

            CREATE INDEX IF NOT EXISTS idx_lessons_created
                ON lessons(created_at_ms DESC);

            CREATE INDEX IF NOT EXISTS idx_lessons_outline_hash
                ON lessons(outline_hash, created_at_ms DESC);
            ",
            )
            .context("Migrating lessons schema")?;
        Ok(())
    }

    fn read_row(row: &Row<'_>) -> rusqlite::Result<RawLesson> {
        Ok(RawLesson {
            id: row.get(0)?,
            title: row.get(1)?,
            outline: row.get(2)?,
            status: row.get(3)?,
            generated_content: row.get(4)?,
            error_message: row.get(5)?,
            created_at_ms: row.get(6)?,
            updated_at_ms: row.get(7)?,
        })
    }

    fn load(conn: &Connection, id: Uuid) -> Result<Option<LessonRecord>> {
        let sql = format!("SELECT {} FROM lessons WHERE id = ?1", SELECT_COLUMNS);
        let raw = conn
            .query_row(&sql, params![id.to_string()], Self::read_row)
            .optional()
            .context("Query lesson by id")?;
        raw.map(RawLesson::into_record).transpose()
    }

    /// Apply a transition in memory, then persist it only if the row is
    /// still generating.
    fn transition<F>(&self, id: Uuid, apply: F) -> Result<LessonRecord>
    where
        F: FnOnce(&mut LessonRecord) -> std::result::Result<(), StorageError>,
    {
        let conn = self.conn.lock();
        let mut record = Self::load(&conn, id)?.ok_or(ForgeError::LessonNotFound(id))?;
        let from = record.status();
        apply(&mut record)?;

        let updated = conn
            .execute(
                "UPDATE lessons
                 SET title = ?2, status = ?3, generated_content = ?4, error_message = ?5, updated_at_ms = ?6
                 WHERE id = ?1 AND status = 'generating'",
                params![
                    id.to_string(),
                    record.title,
                    record.status().as_str(),
                    record.generated_content(),
                    record.error_message(),
                    record.updated_at.timestamp_millis()
                ],
            )
            .context("UPDATE lessons status")?;

        if updated == 0 {
            return Err(StorageError::InvalidTransition {
                from,
                to: record.status(),
            }
            .into());
        }
        Ok(record)
    }

    fn insert(conn: &Connection, record: &LessonRecord) -> Result<()> {
        conn.execute(
            "INSERT INTO lessons
             (id, title, outline, outline_hash, status, generated_content, error_message, created_at_ms, updated_at_ms)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9)",
            params![
                record.id.to_string(),
                record.title,
                record.outline,
                outline_fingerprint(&record.outline),
                record.status().as_str(),
                record.generated_content(),
                record.error_message(),
                record.created_at.timestamp_millis(),
                record.updated_at.timestamp_millis()
            ],
        )
        .context("INSERT lessons")?;
        tracing::debug!("Stored lesson {} ({})", record.id, record.status());
        Ok(())
    }

    fn newest_blocking(
        conn: &Connection,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<LessonRecord>> {
        let sql = format!(
            "SELECT {} FROM lessons
             WHERE outline_hash = ?1
               AND (status = 'generating' OR (status = 'generated' AND created_at_ms >= ?2))
             ORDER BY created_at_ms DESC LIMIT 1",
            SELECT_COLUMNS
        );
        let raw = conn
            .query_row(&sql, params![fingerprint, since.timestamp_millis()], Self::read_row)
            .optional()
            .context("Query duplicate lesson")?;
        raw.map(RawLesson::into_record).transpose()
    }
}

struct RawLesson {
    id: String,
    title: String,
    outline: String,
    status: String,
    generated_content: Option<String>,
    error_message: Option<String>,
    created_at_ms: i64,
    updated_at_ms: i64,
}

impl RawLesson {
    fn into_record(self) -> Result<LessonRecord> {
        let corrupt = |reason: String| StorageError::CorruptRecord {
            id: self.id.clone(),
            reason,
        };
        let id = Uuid::parse_str(&self.id).map_err(|e| corrupt(format!("bad id: {}", e)))?;
        let status: LessonStatus = self.status.parse().map_err(corrupt)?;
        let created_at = from_millis(self.created_at_ms)
            .ok_or_else(|| corrupt("bad created_at".to_string()))?;
        let updated_at = from_millis(self.updated_at_ms)
            .ok_or_else(|| corrupt("bad updated_at".to_string()))?;

        Ok(LessonRecord::restore(
            id,
            self.title,
            self.outline,
            status,
            self.generated_content,
            self.error_message,
            created_at,
            updated_at,
        )?)
    }
}

fn from_millis(ms: i64) -> Option<DateTime<Utc>> {
    Utc.timestamp_millis_opt(ms).single()
}

fn collect_records(
    rows: impl Iterator<Item = rusqlite::Result<RawLesson>>,
) -> Result<Vec<LessonRecord>> {
    rows.map(|row| row.context("Read lesson row")?.into_record())
        .collect()
}

#[async_trait]
impl LessonStore for SqliteLessonStore {
    async fn create(&self, record: &LessonRecord) -> Result<()> {
        let conn = self.conn.lock();
        Self::insert(&conn, record)
    }

    async fn mark_generated(&self, id: Uuid, title: &str, content: &str) -> Result<LessonRecord> {
        self.transition(id, |record| record.complete(title, content))
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<LessonRecord> {
        self.transition(id, |record| record.fail(message))
    }

    async fn get(&self, id: Uuid) -> Result<Option<LessonRecord>> {
        let conn = self.conn.lock();
        Self::load(&conn, id)
    }

    async fn list(&self, limit: usize) -> Result<Vec<LessonRecord>> {
        let conn = self.conn.lock();
        let sql = format!(
            "SELECT {} FROM lessons ORDER BY created_at_ms DESC, rowid DESC LIMIT ?1",
            SELECT_COLUMNS
        );
        let mut stmt = conn.prepare(&sql).context("Prepare lesson listing")?;
        let rows = stmt
            .query_map(params![limit as i64], Self::read_row)
            .context("Query lesson listing")?;
        collect_records(rows)
    }

    async fn find_duplicate(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<LessonRecord>> {
        let conn = self.conn.lock();
        Self::newest_blocking(&conn, fingerprint, since)
    }

    async fn create_unless_duplicate(
        &self,
        record: &LessonRecord,
        since: DateTime<Utc>,
    ) -> Result<Option<LessonRecord>> {
        let mut conn = self.conn.lock();
        // IMMEDIATE holds the database write lock from the lookup to the insert
        let tx = conn
            .transaction_with_behavior(TransactionBehavior::Immediate)
            .context("BEGIN IMMEDIATE")?;

        if let Some(existing) = Self::newest_blocking(&tx, &outline_fingerprint(&record.outline), since)? {
            return Ok(Some(existing));
        }
        Self::insert(&tx, record)?;
        tx.commit().context("COMMIT lesson admission")?;
        Ok(None)
    }
}
