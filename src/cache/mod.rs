// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Write-through cache controller.
//!
//! The [`WriteThroughCache`] ties together:
//! - the in-memory [`CacheTable`], which serves every read
//! - a [`DocumentStore`] handle, which every mutation writes through to
//! - the sync step that hydrates the table when the host signals readiness
//!
//! # Lifecycle
//!
//! ```text
//! Init → Connected → Syncing → Ready → Closed
//! ```
//!
//! # Example
//!
//! ```rust
//! use std::sync::Arc;
//! use recondb::{WriteThroughCache, CacheConfig, CacheState, InMemoryStore};
//! use serde_json::json;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let store = Arc::new(InMemoryStore::new());
//! let cache = WriteThroughCache::new(CacheConfig::default(), Some(store)).unwrap();
//! assert_eq!(cache.state(), CacheState::Connected);
//!
//! cache.set("greeting", json!("hello")).await.unwrap();
//! assert_eq!(cache.get("greeting").unwrap(), Some(json!("hello")));
//! # }
//! ```

mod types;
mod locks;
mod lifecycle;
mod sync;
mod write;

pub use types::{CacheState, SetOutcome, SyncReport, HealthCheck, CacheError};

use std::collections::HashMap;
use std::sync::Arc;
use dashmap::DashSet;
use serde::de::DeserializeOwned;
use serde_json::Value;
use tokio::sync::{watch, RwLock};
use tracing::debug;

use crate::config::{CacheConfig, ValidationMode};
use crate::record::{Key, KeyError};
use crate::storage::traits::DocumentStore;
use crate::table::CacheTable;

use locks::KeyLocks;

/// Write-through cache over a document store.
///
/// # Consistency
///
/// Reads are served from memory only and never wait on the store. After
/// `set` returns `Ok`, `get` returns the new value. With
/// [`WriteOrder::CacheThenPersist`](crate::WriteOrder::CacheThenPersist) the
/// value may be visible before the store has acknowledged it; such keys are
/// reported by [`pending_keys`](Self::pending_keys) until it does, and a crash
/// in that window loses the write.
///
/// # Thread Safety
///
/// The cache is `Send + Sync`; share it behind an `Arc`.
pub struct WriteThroughCache {
    pub(super) config: CacheConfig,

    /// Lifecycle state (broadcast to watchers)
    pub(super) state: watch::Sender<CacheState>,
    pub(super) state_rx: watch::Receiver<CacheState>,

    pub(super) table: CacheTable,

    /// Set at construction or by `start()`
    pub(super) store: Option<Arc<dyn DocumentStore>>,

    /// Keys whose cached value the store has not acknowledged yet
    pub(super) pending: DashSet<String>,

    pub(super) key_locks: KeyLocks,

    /// Mutations share it; a sync takes it exclusively so an older snapshot
    /// can never overwrite a newer write.
    pub(super) sync_gate: RwLock<()>,
}

impl WriteThroughCache {
    /// Create a cache.
    ///
    /// Pass `Some(store)` to use an existing connection; the cache starts in
    /// `Connected`. Pass `None` to have [`start()`](Self::start) connect using
    /// `config.store_url`; the cache starts in `Init`.
    ///
    /// # Errors
    ///
    /// [`CacheError::Config`] if the config is invalid, or if there is neither
    /// a store handle nor a `store_url`.
    pub fn new(config: CacheConfig, store: Option<Arc<dyn DocumentStore>>) -> Result<Self, CacheError> {
        config.validate().map_err(CacheError::Config)?;

        if store.is_none() && config.store_url.is_none() {
            return Err(CacheError::Config(
                "no document store handle supplied and no store_url configured".to_string(),
            ));
        }

        let initial = if store.is_some() { CacheState::Connected } else { CacheState::Init };
        let (state_tx, state_rx) = watch::channel(initial);
        crate::metrics::set_cache_state(initial.as_u8());

        Ok(Self {
            config,
            state: state_tx,
            state_rx,
            table: CacheTable::new(),
            store,
            pending: DashSet::new(),
            key_locks: KeyLocks::new(),
            sync_gate: RwLock::new(()),
        })
    }

    /// Get current lifecycle state.
    #[must_use]
    pub fn state(&self) -> CacheState {
        *self.state_rx.borrow()
    }

    /// Get a receiver to watch state changes.
    #[must_use]
    pub fn state_receiver(&self) -> watch::Receiver<CacheState> {
        self.state_rx.clone()
    }

    /// True once the cache has been hydrated and not closed.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.state() == CacheState::Ready
    }

    #[must_use]
    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    /// The store handle, if connected.
    #[must_use]
    pub fn store(&self) -> Option<&Arc<dyn DocumentStore>> {
        self.store.as_ref()
    }

    pub(super) fn set_state(&self, state: CacheState) {
        let _ = self.state.send(state);
        crate::metrics::set_cache_state(state.as_u8());
    }

    /// Store handle for a mutation, or why there is none.
    pub(super) fn writable_store(&self) -> Result<&Arc<dyn DocumentStore>, CacheError> {
        match self.state() {
            CacheState::Closed => Err(CacheError::Closed),
            _ => self.store.as_ref().ok_or(CacheError::NotConnected),
        }
    }

    /// Validate a caller-supplied key.
    ///
    /// `Ok(None)` means the key was invalid and validation is permissive.
    pub(super) fn validate_key(&self, operation: &str, key: &str) -> Result<Option<Key>, CacheError> {
        match Key::new(key) {
            Ok(key) => Ok(Some(key)),
            Err(e) => {
                let reason = match e {
                    KeyError::Empty => "empty_key",
                    KeyError::TooLong { .. } => "key_too_long",
                };
                crate::metrics::record_validation_rejected(operation, reason);
                match self.config.validation {
                    ValidationMode::Strict => Err(e.into()),
                    ValidationMode::Permissive => {
                        debug!(operation, error = %e, "Ignoring call with invalid key");
                        Ok(None)
                    }
                }
            }
        }
    }

    // --- Reads (cache only) ---

    /// Get the cached value for `key`.
    ///
    /// Never touches the store. A missing key is `Ok(None)`.
    ///
    /// # Errors
    ///
    /// [`CacheError::InvalidKey`] for an empty or over-long key under strict
    /// validation.
    pub fn get(&self, key: &str) -> Result<Option<Value>, CacheError> {
        let Some(key) = self.validate_key("get", key)? else {
            return Ok(None);
        };
        let value = self.table.get(key.as_str());
        let status = if value.is_some() { "hit" } else { "miss" };
        crate::metrics::record_operation("cache", "get", status);
        Ok(value)
    }

    /// Get and deserialize the cached value for `key`.
    pub fn get_as<T: DeserializeOwned>(&self, key: &str) -> Result<Option<T>, CacheError> {
        match self.get(key)? {
            Some(value) => serde_json::from_value(value)
                .map(Some)
                .map_err(|source| CacheError::Serialization { key: key.to_string(), source }),
            None => Ok(None),
        }
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.table.contains(key)
    }

    /// Snapshot of every cached entry.
    #[must_use]
    pub fn collection(&self) -> HashMap<String, Value> {
        self.table.entries()
    }

    /// Number of cached entries.
    #[must_use]
    #[inline]
    pub fn len(&self) -> usize {
        self.table.len()
    }

    #[must_use]
    #[inline]
    pub fn is_empty(&self) -> bool {
        self.table.is_empty()
    }

    /// Keys whose latest cached value the store has not acknowledged.
    #[must_use]
    pub fn pending_keys(&self) -> Vec<String> {
        self.pending.iter().map(|k| k.key().clone()).collect()
    }

    /// False while `key` has a write the store has not acknowledged.
    #[must_use]
    pub fn is_durable(&self, key: &str) -> bool {
        !self.pending.contains(key)
    }

    /// Push current entry and pending-write counts to the gauges.
    pub fn update_gauge_metrics(&self) {
        crate::metrics::set_cache_entries(self.table.len());
        crate::metrics::set_pending_writes(self.pending.len());
    }
}
