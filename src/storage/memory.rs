use async_trait::async_trait;
use dashmap::DashMap;
use serde_json::Value;
use crate::record::{Key, Record};
use super::traits::{DocumentStore, StorageError};

/// In-process document store.
///
/// Useful for embedding without a database and for tests.
pub struct InMemoryStore {
    data: DashMap<Key, Value>,
}

impl InMemoryStore {
    #[must_use]
    pub fn new() -> Self {
        Self {
            data: DashMap::new(),
        }
    }

    /// Build a store pre-populated with `records` (later duplicates win).
    #[must_use]
    pub fn with_records(records: impl IntoIterator<Item = Record>) -> Self {
        let store = Self::new();
        for record in records {
            store.data.insert(record.key, record.value);
        }
        store
    }

    /// Get current record count
    #[must_use]
    pub fn len(&self) -> usize {
        self.data.len()
    }

    /// Check if empty
    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.data.is_empty()
    }

    /// Read a value directly, bypassing any cache.
    #[must_use]
    pub fn peek(&self, key: &str) -> Option<Value> {
        self.data.get(key).map(|r| r.value().clone())
    }

    /// Clear all records
    pub fn clear(&self) {
        self.data.clear();
    }
}

impl Default for InMemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DocumentStore for InMemoryStore {
    async fn find_all(&self) -> Result<Vec<Record>, StorageError> {
        Ok(self
            .data
            .iter()
            .map(|r| Record::new(r.key().clone(), r.value().clone()))
            .collect())
    }

    async fn find_one(&self, key: &Key) -> Result<Option<Record>, StorageError> {
        Ok(self
            .data
            .get(key)
            .map(|r| Record::new(key.clone(), r.value().clone())))
    }

    async fn save(&self, record: &Record) -> Result<(), StorageError> {
        self.data.insert(record.key.clone(), record.value.clone());
        Ok(())
    }

    async fn delete(&self, key: &Key) -> Result<bool, StorageError> {
        Ok(self.data.remove(key).is_some())
    }

    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.data.len() as u64)
    }
}
