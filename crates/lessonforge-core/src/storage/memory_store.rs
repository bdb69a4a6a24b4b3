//! In-process lesson store

use std::collections::HashMap;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use uuid::Uuid;

use super::{blocks_duplicate, LessonStore};
use crate::error::{ForgeError, Result};
use crate::lesson::{outline_fingerprint, LessonRecord};

/// Records held in a map behind a single lock; each transition is applied
/// under the write guard.
#[derive(Debug, Default)]
pub struct MemoryLessonStore {
    records: RwLock<HashMap<Uuid, LessonRecord>>,
}

impl MemoryLessonStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.records.read().len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.read().is_empty()
    }

    fn transition<F>(&self, id: Uuid, apply: F) -> Result<LessonRecord>
    where
        F: FnOnce(&mut LessonRecord) -> std::result::Result<(), crate::error::StorageError>,
    {
        let mut records = self.records.write();
        let record = records.get_mut(&id).ok_or(ForgeError::LessonNotFound(id))?;
        apply(record)?;
        Ok(record.clone())
    }
}

#[async_trait]
impl LessonStore for MemoryLessonStore {
    async fn create(&self, record: &LessonRecord) -> Result<()> {
        self.records.write().insert(record.id, record.clone());
        Ok(())
    }

    async fn mark_generated(&self, id: Uuid, title: &str, content: &str) -> Result<LessonRecord> {
        self.transition(id, |record| record.complete(title, content))
    }

    async fn mark_failed(&self, id: Uuid, message: &str) -> Result<LessonRecord> {
        self.transition(id, |record| record.fail(message))
    }

    async fn get(&self, id: Uuid) -> Result<Option<LessonRecord>> {
        Ok(self.records.read().get(&id).cloned())
    }

    async fn list(&self, limit: usize) -> Result<Vec<LessonRecord>> {
        let mut records: Vec<LessonRecord> = self.records.read().values().cloned().collect();
        records.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        records.truncate(limit);
        Ok(records)
    }

    async fn find_duplicate(
        &self,
        fingerprint: &str,
        since: DateTime<Utc>,
    ) -> Result<Option<LessonRecord>> {
        Ok(newest_blocking(&self.records.read(), fingerprint, since))
    }

    async fn create_unless_duplicate(
        &self,
        record: &LessonRecord,
        since: DateTime<Utc>,
    ) -> Result<Option<LessonRecord>> {
        let mut records = self.records.write();
        let fingerprint = outline_fingerprint(&record.outline);
        if let Some(existing) = newest_blocking(&records, &fingerprint, since) {
            return Ok(Some(existing));
        }
        records.insert(record.id, record.clone());
        Ok(None)
    }
}

fn newest_blocking(
    records: &HashMap<Uuid, LessonRecord>,
    fingerprint: &str,
    since: DateTime<Utc>,
) -> Option<LessonRecord> {
    records
        .values()
        .filter(|r| outline_fingerprint(&r.outline) == fingerprint)
        .filter(|r| blocks_duplicate(r, since))
        .max_by_key(|r| r.created_at)
        .cloned()
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::StorageError;
    use crate::lesson::LessonStatus;
    use chrono::Duration;

    #[tokio::test]
    async fn test_create_and_complete() {
        let store = MemoryLessonStore::new();
        let record = LessonRecord::generating("Explain the water cycle");
        store.create(&record).await.unwrap();

        let done = store.mark_generated(record.id, "Water cycle", "src").await.unwrap();
        assert_eq!(done.status(), LessonStatus::Generated);

        let err = store.mark_failed(record.id, "late").await.unwrap_err();
        assert!(matches!(
            err,
            ForgeError::Storage(StorageError::InvalidTransition { .. })
        ));
        let stored = store.get(record.id).await.unwrap().unwrap();
        assert_eq!(stored.generated_content(), Some("src"));
    }

    #[tokio::test]
    async fn test_unknown_id() {
        let store = MemoryLessonStore::new();
        let id = Uuid::new_v4();
        assert!(matches!(
            store.mark_failed(id, "x").await,
            Err(ForgeError::LessonNotFound(missing)) if missing == id
        ));
    }

    #[tokio::test]
    async fn test_find_duplicate_by_fingerprint() {
        let store = MemoryLessonStore::new();
        let record = LessonRecord::generating("Explain   the water cycle");
        store.create(&record).await.unwrap();

        let since = Utc::now() - Duration::minutes(5);
        let found = store
            .find_duplicate(&outline_fingerprint("explain the water cycle"), since)
            .await
            .unwrap();
        assert_eq!(found.map(|r| r.id), Some(record.id));

        store.mark_failed(record.id, "rejected").await.unwrap();
        let found = store
            .find_duplicate(&outline_fingerprint("explain the water cycle"), since)
            .await
            .unwrap();
        assert!(found.is_none());
    }

    #[tokio::test]
    async fn test_create_unless_duplicate() {
        let store = MemoryLessonStore::new();
        let since = Utc::now() - Duration::minutes(5);
        let first = LessonRecord::generating("Explain the water cycle");
        assert!(store.create_unless_duplicate(&first, since).await.unwrap().is_none());

        let second = LessonRecord::generating("explain  the WATER cycle");
        let blocking = store.create_unless_duplicate(&second, since).await.unwrap();
        assert_eq!(blocking.map(|r| r.id), Some(first.id));
        assert_eq!(store.len(), 1);

        store.mark_failed(first.id, "rejected").await.unwrap();
        assert!(store.create_unless_duplicate(&second, since).await.unwrap().is_none());
        assert_eq!(store.len(), 2);
    }
}
