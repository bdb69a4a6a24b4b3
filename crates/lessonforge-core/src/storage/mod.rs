//! Lesson persistence
//!
//! [`LessonStore`] is the only write path for lesson records. Implementations
//! apply status transitions atomically, so a record moves from `generating` to
//! a terminal status exactly once even when two writers race.
//!
//! # Architecture
//!
//! ```text
//! ┌───────────────────────────────────────────────┐
//! │                  LessonStore                  │
//! ├───────────────────────┬───────────────────────┤
//! │  SqliteLessonStore    │  MemoryLessonStore    │
//! │  (WAL, one row/lesson)│  (tests, ephemeral)   │
//! └───────────────────────┴───────────────────────┘
//! ```
//!
//! # Example
//!
//! ```no_run
//! use lessonforge_core::storage::{LessonStore, SqliteLessonStore};
//! use lessonforge_core::LessonRecord;
//!
//! # async fn example() -> lessonforge_core::Result<()> {
//! let store = SqliteLessonStore::open(".lessonforge/lessons.db")?;
//! let record = LessonRecord::generating("Explain photosynthesis");
//! store.create(&record).await?;
//! store.mark_generated(record.id, "Photosynthesis", "'use client'; ...").await?;
//! # Ok(())
//! # }
//! ```

pub mod memory_store;
pub mod sqlite_store;

pub use memory_store::MemoryLessonStore;
pub use sqlite_store::SqliteLessonStore;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use uuid::Uuid;

use crate::error::Result;
use crate::lesson::{LessonRecord, LessonStatus};

/// Persistence seam for lesson records
#[async_trait]
pub trait LessonStore: Send + Sync {
    /// Insert a freshly admitted record
    async fn create(&self, record: &LessonRecord) -> Result<()>;

    /// `generating -> generated`. Fails if the record is already terminal.
    async fn mark_generated(&self, id: Uuid, title: &str, content: &str) -> Result<LessonRecord>;

    /// `generating -> failed`. Fails if the record is already terminal.
    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<LessonRecord>;

    async fn get(&self, id: Uuid) -> Result<Option<LessonRecord>>;

    /// Newest first
    async fn list(&self, limit: usize) -> Result<Vec<LessonRecord>>;

    /// A record with the same outline fingerprint that is still generating,
    /// or that was created at or after `since` and did not fail.
    async fn find_duplicate(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<LessonRecord>>;

    /// [`find_duplicate`](Self::find_duplicate) and [`create`](Self::create)
    /// as one atomic step. Returns the blocking record instead of inserting
    /// when there is one; two concurrent calls for the same outline never both
    /// insert.
    async fn create_unless_duplicate(
        &self,
        record: &LessonRecord,
        since: DateTime<Utc>,
    ) -> Result<Option<LessonRecord>>;
}

/// Whether a stored record blocks a new request with the same outline
pub(crate) fn blocks_duplicate(record: &LessonRecord, since: DateTime<Utc>) -> bool {
    match record.status() {
        LessonStatus::Generating => true,
        LessonStatus::Generated => record.created_at >= since,
        LessonStatus::Failed => false,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_duplicate_policy() {
        let now = Utc::now();
        let mut record = LessonRecord::generating("Explain photosynthesis");
        // still generating blocks regardless of age
        assert!(blocks_duplicate(&record, now + Duration::hours(1)));

        record.complete("t", "src").unwrap();
        assert!(blocks_duplicate(&record, now - Duration::minutes(5)));
        assert!(!blocks_duplicate(&record, now + Duration::minutes(5)));

        let mut failed = LessonRecord::generating("Explain photosynthesis");
        failed.fail("rejected").unwrap();
        assert!(!blocks_duplicate(&failed, now - Duration::minutes(5)));
    }
}
