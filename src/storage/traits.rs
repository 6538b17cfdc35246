use async_trait::async_trait;
use crate::record::{Key, Record};
use thiserror::Error;

#[derive(Error, Debug)]
pub enum StorageError {
    #[error("Record not found")]
    NotFound,
    #[error("Storage backend error: {0}")]
    Backend(String),
    #[error("Malformed record '{key}': {reason}")]
    Malformed {
        key: String,
        reason: String,
    },
}

/// Persistence capability consumed by the cache.
///
/// Implementations enforce key uniqueness: [`save`](DocumentStore::save) is an
/// atomic upsert, so two concurrent saves for the same key never produce two
/// records.
#[async_trait]
pub trait DocumentStore: Send + Sync {
    /// Fetch every record, in the store's iteration order.
    async fn find_all(&self) -> Result<Vec<Record>, StorageError>;

    async fn find_one(&self, key: &Key) -> Result<Option<Record>, StorageError>;

    /// Insert or update the record for `record.key`.
    async fn save(&self, record: &Record) -> Result<(), StorageError>;

    /// Remove the record for `key`. Returns whether a record was removed.
    async fn delete(&self, key: &Key) -> Result<bool, StorageError>;

    /// Count records in the store.
    /// Default implementation falls back to a full fetch.
    async fn count(&self) -> Result<u64, StorageError> {
        Ok(self.find_all().await?.len() as u64)
    }

    /// Connectivity probe for health checks.
    async fn ping(&self) -> Result<(), StorageError> {
        Ok(())
    }

    /// Release connections. Called once on shutdown.
    async fn close(&self) {}
}
