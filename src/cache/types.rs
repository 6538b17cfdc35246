//! Public types for the write-through cache.

use std::time::Duration;
use thiserror::Error;

use crate::record::KeyError;
use crate::storage::traits::StorageError;

/// Lifecycle of the cache and its store handle.
///
/// ```text
/// Init → Connected → Syncing → Ready → Closed
///   └──→ Failed
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CacheState {
    /// Constructed, no store connection yet
    Init,
    /// Store connected, cache not yet hydrated
    Connected,
    /// Bulk load in progress
    Syncing,
    /// Hydrated from the store at least once
    Ready,
    /// Shut down; mutations are rejected
    Closed,
    /// Store connection could not be established
    Failed,
}

impl CacheState {
    /// Numeric form for the state gauge.
    #[must_use]
    pub fn as_u8(self) -> u8 {
        match self {
            Self::Init => 0,
            Self::Connected => 1,
            Self::Syncing => 2,
            Self::Ready => 3,
            Self::Closed => 4,
            Self::Failed => 5,
        }
    }
}

impl std::fmt::Display for CacheState {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Init => write!(f, "Init"),
            Self::Connected => write!(f, "Connected"),
            Self::Syncing => write!(f, "Syncing"),
            Self::Ready => write!(f, "Ready"),
            Self::Closed => write!(f, "Closed"),
            Self::Failed => write!(f, "Failed"),
        }
    }
}

/// What a `set` call did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SetOutcome {
    /// No record existed for the key
    Created,
    /// An existing record was overwritten
    Updated,
    /// Arguments were invalid and permissive validation is on; nothing changed
    Skipped,
}

/// Result of a bulk sync.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SyncReport {
    /// Records returned by the store
    pub fetched: usize,
    /// Records written into the cache (includes duplicates)
    pub applied: usize,
    /// Records whose key appeared earlier in the same fetch
    pub duplicates: usize,
    /// Records not applied because the cached value is pending durability
    pub kept_pending: usize,
    /// Stale cache keys dropped (Replace policy only)
    pub removed: usize,
    pub elapsed: Duration,
}

/// Snapshot of cache health, suitable for `/ready` and `/health` endpoints.
#[derive(Debug, Clone)]
pub struct HealthCheck {
    pub state: CacheState,
    pub ready: bool,
    pub entries: usize,
    pub pending_writes: usize,
    /// `None` when no store is connected
    pub store_connected: Option<bool>,
    pub store_latency_ms: Option<u64>,
    pub healthy: bool,
}

#[derive(Error, Debug)]
pub enum CacheError {
    #[error("Configuration error: {0}")]
    Config(String),
    #[error("Invalid key: {0}")]
    InvalidKey(#[from] KeyError),
    #[error("Invalid value for '{key}': value must not be null")]
    InvalidValue { key: String },
    #[error("Document store is not connected")]
    NotConnected,
    #[error("Cache is closed")]
    Closed,
    #[error("Readiness signal dropped before firing")]
    ReadinessLost,
    #[error("Value for '{key}' could not be converted: {source}")]
    Serialization {
        key: String,
        #[source]
        source: serde_json::Error,
    },
    #[error(transparent)]
    Store(#[from] StorageError),
}
