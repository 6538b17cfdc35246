//! # recondb
//!
//! A write-through key-value cache: an in-memory table backed by a
//! persistent document store.
//!
//! ## Architecture
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────┐
//! │                    WriteThroughCache                        │
//! │  • get / collection served from memory only                │
//! │  • set / delete written through under a per-key lock       │
//! └─────────────────────────────────────────────────────────────┘
//!            │ reads & writes                 │ writes
//!            ▼                                ▼
//! ┌──────────────────────────┐   ┌──────────────────────────────┐
//! │       CacheTable         │   │        DocumentStore         │
//! │  • DashMap key → value   │◀──│  • SQLite / MySQL / memory   │
//! │  • no TTL, no eviction   │   │  • atomic upsert by key      │
//! └──────────────────────────┘   └──────────────────────────────┘
//!                      ▲
//!                      └── sync(): bulk load when the host signals ready
//! ```
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use std::sync::Arc;
//! use recondb::{WriteThroughCache, CacheConfig, ready_signal};
//! use serde_json::json;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), recondb::CacheError> {
//!     let config = CacheConfig {
//!         store_url: Some("sqlite:recondb.db?mode=rwc".into()),
//!         ..Default::default()
//!     };
//!
//!     // Fails fast without a store handle or a store_url
//!     let mut cache = WriteThroughCache::new(config, None)?;
//!     cache.start().await?;
//!     let cache = Arc::new(cache);
//!
//!     // Hydrate once the host says it is ready
//!     let (trigger, signal) = ready_signal();
//!     let hydration = cache.spawn_sync_on_ready(signal);
//!     trigger.fire();
//!     hydration.await.expect("sync task panicked")?;
//!
//!     cache.set("guild.42.prefix", json!("!")).await?;
//!     assert_eq!(cache.get("guild.42.prefix")?, Some(json!("!")));
//!
//!     cache.delete("guild.42.prefix").await?;
//!     cache.shutdown().await;
//!     Ok(())
//! }
//! ```
//!
//! ## Consistency
//!
//! - Read-after-write: once `set` returns `Ok`, `get` returns the value.
//! - Per-key writes are serialized, so cache and store agree on the last
//!   writer and concurrent creates never duplicate a record.
//! - `delete` always removes the cache entry, even when the store fails.
//! - Under [`WriteOrder::CacheThenPersist`] a crash between the cache update
//!   and the store acknowledgement loses the write; see
//!   [`WriteThroughCache::pending_keys`].
//!
//! ## Modules
//!
//! - [`cache`]: the [`WriteThroughCache`] controller and sync step
//! - [`table`]: the in-memory [`CacheTable`]
//! - [`storage`]: document store adapters (SQL, memory)
//! - [`signal`]: host readiness signal
//! - [`resilience`]: connection retry

pub mod config;
pub mod record;
pub mod table;
pub mod signal;
pub mod storage;
pub mod resilience;
pub mod cache;
pub mod metrics;

pub use config::{CacheConfig, WriteOrder, SyncPolicy, ValidationMode};
pub use record::{Key, Record, KeyError};
pub use table::CacheTable;
pub use signal::{ready_signal, ReadySignal, ReadyTrigger};
pub use cache::{WriteThroughCache, CacheState, SetOutcome, SyncReport, HealthCheck, CacheError};
pub use storage::traits::{DocumentStore, StorageError};
pub use storage::memory::InMemoryStore;
pub use storage::sql::{SqlStore, SqlStoreOptions};
pub use resilience::retry::RetryConfig;
