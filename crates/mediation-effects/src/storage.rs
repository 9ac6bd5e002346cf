//! In-memory record store
//!
//! Keeps records in insertion order so that tag queries return results in a
//! stable order. Record ids are unique per record type; `add_record` rejects
//! a second record with the same id, which is the unique constraint the
//! coordinator relies on for singleton records.

use async_trait::async_trait;
use indexmap::IndexMap;
use mediation_core::effects::{RecordStorageEffects, StorageError, StorageRecord, TagFilter};
use std::sync::Arc;
use tokio::sync::RwLock;

type RecordKey = (String, String);

/// In-memory record store
#[derive(Debug, Clone, Default)]
pub struct MemoryRecordStore {
    records: Arc<RwLock<IndexMap<RecordKey, StorageRecord>>>,
}

impl MemoryRecordStore {
    /// Create an empty store
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of stored records of `record_type`
    pub async fn count(&self, record_type: &str) -> usize {
        let records = self.records.read().await;
        records.keys().filter(|(t, _)| t == record_type).count()
    }

    fn key(record_type: &str, id: &str) -> RecordKey {
        (record_type.to_string(), id.to_string())
    }
}

#[async_trait]
impl RecordStorageEffects for MemoryRecordStore {
    async fn add_record(&self, record: StorageRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        let key = Self::key(&record.record_type, &record.id);
        if records.contains_key(&key) {
            return Err(StorageError::DuplicateId {
                record_type: record.record_type,
                id: record.id,
            });
        }
        records.insert(key, record);
        Ok(())
    }

    async fn get_record(&self, record_type: &str, id: &str) -> Result<StorageRecord, StorageError> {
        let records = self.records.read().await;
        records
            .get(&Self::key(record_type, id))
            .cloned()
            .ok_or_else(|| StorageError::not_found_by_id(record_type, id))
    }

    async fn update_record(&self, record: StorageRecord) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        match records.get_mut(&Self::key(&record.record_type, &record.id)) {
            Some(existing) => {
                *existing = record;
                Ok(())
            }
            None => Err(StorageError::not_found_by_id(&record.record_type, &record.id)),
        }
    }

    async fn delete_record(&self, record_type: &str, id: &str) -> Result<(), StorageError> {
        let mut records = self.records.write().await;
        records
            .shift_remove(&Self::key(record_type, id))
            .map(|_| ())
            .ok_or_else(|| StorageError::not_found_by_id(record_type, id))
    }

    async fn find_records(
        &self,
        record_type: &str,
        filter: &TagFilter,
    ) -> Result<Vec<StorageRecord>, StorageError> {
        let records = self.records.read().await;
        Ok(records
            .values()
            .filter(|r| r.record_type == record_type && r.matches(filter))
            .cloned()
            .collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use assert_matches::assert_matches;
    use mediation_core::effects::tag_filter;

    fn record(id: &str, key: &str) -> StorageRecord {
        StorageRecord::new("route", id, "{}").with_tag("recipient_key", key)
    }

    #[tokio::test]
    async fn add_rejects_duplicate_ids() {
        let store = MemoryRecordStore::new();
        store.add_record(record("r1", "k1")).await.unwrap();
        assert_matches!(
            store.add_record(record("r1", "k2")).await,
            Err(StorageError::DuplicateId { .. })
        );
        assert_eq!(store.count("route").await, 1);
    }

    #[tokio::test]
    async fn unique_lookup_distinguishes_missing_and_ambiguous() {
        let store = MemoryRecordStore::new();
        store.add_record(record("r1", "k1")).await.unwrap();
        store.add_record(record("r2", "k1")).await.unwrap();
        store.add_record(record("r3", "k2")).await.unwrap();

        let found = store
            .find_unique_record("route", &tag_filter([("recipient_key", "k2")]))
            .await
            .unwrap();
        assert_eq!(found.id, "r3");

        assert_matches!(
            store
                .find_unique_record("route", &tag_filter([("recipient_key", "k1")]))
                .await,
            Err(StorageError::Duplicate { count: 2, .. })
        );
        assert_matches!(
            store
                .find_unique_record("route", &tag_filter([("recipient_key", "k9")]))
                .await,
            Err(StorageError::NotFound { .. })
        );
    }

    #[tokio::test]
    async fn queries_preserve_insertion_order_after_delete() {
        let store = MemoryRecordStore::new();
        for (id, key) in [("a", "k"), ("b", "k"), ("c", "k")] {
            store.add_record(record(id, key)).await.unwrap();
        }
        store.delete_record("route", "b").await.unwrap();

        let ids: Vec<String> = store
            .find_records("route", &TagFilter::new())
            .await
            .unwrap()
            .into_iter()
            .map(|r| r.id)
            .collect();
        assert_eq!(ids, vec!["a".to_string(), "c".to_string()]);
    }

    #[tokio::test]
    async fn update_and_delete_require_existing_record() {
        let store = MemoryRecordStore::new();
        assert!(store.update_record(record("r1", "k1")).await.unwrap_err().is_not_found());
        assert!(store.delete_record("route", "r1").await.unwrap_err().is_not_found());
        assert!(store.get_record("route", "r1").await.unwrap_err().is_not_found());
    }
}
