//! Write-through mutations: `set` and `delete`.
//!
//! Both hold the per-key lock across lookup, store write and cache update.
//! Cache effects already applied are never rolled back; store errors are
//! returned to the caller.

use std::time::Instant;

use serde::Serialize;
use serde_json::Value;
use tracing::{debug, error, warn};

use crate::config::{ValidationMode, WriteOrder};
use crate::record::{value_size, Record};
use crate::storage::traits::{DocumentStore, StorageError};

use super::{CacheError, SetOutcome, WriteThroughCache};

impl WriteThroughCache {
    /// Write `value` for `key` through to the store and the cache.
    ///
    /// Looks up the existing record to report [`SetOutcome::Created`] or
    /// [`SetOutcome::Updated`], then upserts it. The cache update happens
    /// after the store acknowledges (`PersistThenCache`) or before it
    /// (`CacheThenPersist`), see [`WriteOrder`].
    ///
    /// # Errors
    ///
    /// - [`CacheError::InvalidKey`] / [`CacheError::InvalidValue`] for an empty
    ///   or over-long key or a `null` value (strict validation; permissive returns
    ///   `Ok(SetOutcome::Skipped)`)
    /// - [`CacheError::Store`] if the lookup or the save fails
    #[tracing::instrument(skip(self, value), fields(outcome = tracing::field::Empty))]
    pub async fn set(&self, key: &str, value: Value) -> Result<SetOutcome, CacheError> {
        let start = Instant::now();

        let Some(key) = self.validate_key("set", key)? else {
            return Ok(SetOutcome::Skipped);
        };
        if value.is_null() {
            crate::metrics::record_validation_rejected("set", "null_value");
            return match self.config.validation {
                ValidationMode::Strict => Err(CacheError::InvalidValue { key: key.into_inner() }),
                ValidationMode::Permissive => {
                    debug!("Ignoring set with null value");
                    Ok(SetOutcome::Skipped)
                }
            };
        }

        let _gate = self.sync_gate.read().await;
        let store = self.writable_store()?;
        let _guard = self.key_locks.lock(key.as_str()).await;

        let existing = store.find_one(&key).await.map_err(|e| {
            error!(error = %e, "Store lookup failed");
            crate::metrics::record_error("store", "find_one", "backend");
            e
        })?;
        let outcome = if existing.is_some() { SetOutcome::Updated } else { SetOutcome::Created };

        let record = Record::new(key, value);
        match self.config.write_order {
            WriteOrder::PersistThenCache => {
                self.persist(store.as_ref(), &record).await?;
                self.table.set(&record.key, record.value);
            }
            WriteOrder::CacheThenPersist => {
                self.table.set(&record.key, record.value.clone());
                self.pending.insert(record.key.as_str().to_owned());
                crate::metrics::record_operation("cache", "set", "success");

                if let Err(e) = self.persist(store.as_ref(), &record).await {
                    warn!(error = %e, "Cached value is not durable");
                    self.update_gauge_metrics();
                    return Err(e);
                }
                self.pending.remove(record.key.as_str());
            }
        }

        tracing::Span::current().record("outcome", tracing::field::debug(outcome));
        debug!("Set written through");
        crate::metrics::record_latency("all", "set", start.elapsed());
        self.update_gauge_metrics();
        Ok(outcome)
    }

    /// Serialize `value` and [`set`](Self::set) it.
    pub async fn set_as<T: Serialize + ?Sized>(&self, key: &str, value: &T) -> Result<SetOutcome, CacheError> {
        let value = serde_json::to_value(value)
            .map_err(|source| CacheError::Serialization { key: key.to_string(), source })?;
        self.set(key, value).await
    }

    async fn persist(&self, store: &dyn DocumentStore, record: &Record) -> Result<(), CacheError> {
        let start = Instant::now();
        match store.save(record).await {
            Ok(()) => {
                crate::metrics::record_operation("store", "set", "success");
                crate::metrics::record_bytes_written("store", value_size(&record.value));
                crate::metrics::record_latency("store", "set", start.elapsed());
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Store save failed");
                crate::metrics::record_operation("store", "set", "error");
                crate::metrics::record_error("store", "set", error_type(&e));
                Err(e.into())
            }
        }
    }

    /// Delete `key` from the store and the cache.
    ///
    /// The store record is deleted if the lookup finds one. The cache entry
    /// is removed unconditionally, even when the lookup or the delete
    /// fails, and then any store error is returned.
    ///
    /// Returns whether anything was removed from either layer. Deleting an
    /// absent key is `Ok(false)`.
    #[tracing::instrument(skip(self))]
    pub async fn delete(&self, key: &str) -> Result<bool, CacheError> {
        let start = Instant::now();

        let Some(key) = self.validate_key("delete", key)? else {
            return Ok(false);
        };

        let _gate = self.sync_gate.read().await;
        let store = self.writable_store()?;
        let _guard = self.key_locks.lock(key.as_str()).await;

        let store_result = match store.find_one(&key).await {
            Ok(Some(_)) => store.delete(&key).await,
            Ok(None) => Ok(false),
            Err(e) => Err(e),
        };

        let in_cache = self.table.delete(key.as_str());
        self.pending.remove(key.as_str());
        self.update_gauge_metrics();

        match store_result {
            Ok(in_store) => {
                debug!(in_store, in_cache, "Delete written through");
                crate::metrics::record_operation("store", "delete", "success");
                crate::metrics::record_latency("all", "delete", start.elapsed());
                Ok(in_store || in_cache)
            }
            Err(e) => {
                error!(error = %e, in_cache, "Store delete failed; cache entry removed anyway");
                crate::metrics::record_operation("store", "delete", "error");
                crate::metrics::record_error("store", "delete", error_type(&e));
                Err(e.into())
            }
        }
    }
}

fn error_type(e: &StorageError) -> &'static str {
    match e {
        StorageError::NotFound => "not_found",
        StorageError::Backend(_) => "backend",
        StorageError::Malformed { .. } => "malformed",
    }
}
