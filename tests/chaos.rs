//! Chaos Testing for recondb
//!
//! Failure scenarios driven by store wrappers that inject errors at chosen
//! calls, return malformed data, or stall to widen race windows.
//!
//! # Running Chaos Tests
//! ```bash
//! cargo test --test chaos -- --nocapture
//! ```

use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::Arc;
use std::time::Duration;
use async_trait::async_trait;
use serde_json::json;

use recondb::{
    CacheConfig, CacheError, CacheState, DocumentStore, InMemoryStore, Key, Record,
    StorageError, SyncPolicy, WriteOrder, WriteThroughCache,
};

// =============================================================================
// Failing Store Wrapper - Precise Error Injection
// =============================================================================

/// Which store operations should fail.
#[derive(Default)]
struct FailOn {
    find_all: AtomicBool,
    find_one: AtomicBool,
    save: AtomicBool,
    delete: AtomicBool,
}

/// Wraps an [`InMemoryStore`] and fails the flagged operations.
struct FailingStore {
    inner: InMemoryStore,
    fail: FailOn,
    error_msg: String,
}

impl FailingStore {
    fn new(inner: InMemoryStore) -> Self {
        Self {
            inner,
            fail: FailOn::default(),
            error_msg: "injected failure".to_string(),
        }
    }

    fn maybe_fail(&self, flag: &AtomicBool) -> Result<(), StorageError> {
        if flag.load(Ordering::SeqCst) {
            Err(StorageError::Backend(self.error_msg.clone()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl DocumentStore for FailingStore {
    async fn find_all(&self) -> Result<Vec<Record>, StorageError> {
        self.maybe_fail(&self.fail.find_all)?;
        self.inner.find_all().await
    }

    async fn find_one(&self, key: &Key) -> Result<Option<Record>, StorageError> {
        self.maybe_fail(&self.fail.find_one)?;
        self.inner.find_one(key).await
    }

    async fn save(&self, record: &Record) -> Result<(), StorageError> {
        self.maybe_fail(&self.fail.save)?;
        self.inner.save(record).await
    }

    async fn delete(&self, key: &Key) -> Result<bool, StorageError> {
        self.maybe_fail(&self.fail.delete)?;
        self.inner.delete(key).await
    }
}

/// Returns a fixed record list from `find_all`, including duplicates or
/// null values the in-memory store cannot hold.
struct ScriptedStore {
    records: Vec<Record>,
}

#[async_trait]
impl DocumentStore for ScriptedStore {
    async fn find_all(&self) -> Result<Vec<Record>, StorageError> {
        Ok(self.records.clone())
    }

    async fn find_one(&self, key: &Key) -> Result<Option<Record>, StorageError> {
        Ok(self.records.iter().rev().find(|r| &r.key == key).cloned())
    }

    async fn save(&self, _record: &Record) -> Result<(), StorageError> {
        Ok(())
    }

    async fn delete(&self, _key: &Key) -> Result<bool, StorageError> {
        Ok(false)
    }
}

/// A store whose lookup is not atomic with its write, and which yields
/// between the two. Counts overlapping operations per key and records
/// creations so a duplicate create is observable.
struct RacyStore {
    inner: InMemoryStore,
    in_flight: AtomicUsize,
    max_in_flight: AtomicUsize,
    creates: AtomicUsize,
}

impl RacyStore {
    fn new() -> Self {
        Self {
            inner: InMemoryStore::new(),
            in_flight: AtomicUsize::new(0),
            max_in_flight: AtomicUsize::new(0),
            creates: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl DocumentStore for RacyStore {
    async fn find_all(&self) -> Result<Vec<Record>, StorageError> {
        self.inner.find_all().await
    }

    async fn find_one(&self, key: &Key) -> Result<Option<Record>, StorageError> {
        let now = self.in_flight.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_in_flight.fetch_max(now, Ordering::SeqCst);
        tokio::time::sleep(Duration::from_millis(5)).await;
        self.inner.find_one(key).await
    }

    async fn save(&self, record: &Record) -> Result<(), StorageError> {
        if self.inner.find_one(&record.key).await?.is_none() {
            self.creates.fetch_add(1, Ordering::SeqCst);
        }
        tokio::task::yield_now().await;
        let result = self.inner.save(record).await;
        self.in_flight.fetch_sub(1, Ordering::SeqCst);
        result
    }

    async fn delete(&self, key: &Key) -> Result<bool, StorageError> {
        self.inner.delete(key).await
    }
}

fn record(k: &str, v: serde_json::Value) -> Record {
    Record::new(Key::new(k).unwrap(), v)
}

fn cache_over<S: DocumentStore + 'static>(store: Arc<S>, config: CacheConfig) -> WriteThroughCache {
    WriteThroughCache::new(config, Some(store)).unwrap()
}

// =============================================================================
// Sync Failures
// =============================================================================

#[tokio::test]
async fn chaos_failed_sync_leaves_cache_untouched() {
    let store = Arc::new(FailingStore::new(InMemoryStore::with_records(vec![
        record("a", json!(1)),
        record("b", json!(2)),
    ])));
    let cache = cache_over(store.clone(), CacheConfig::default());

    cache.set("local", json!("kept")).await.unwrap();
    store.fail.find_all.store(true, Ordering::SeqCst);

    let result = cache.sync().await;
    assert!(matches!(result, Err(CacheError::Store(StorageError::Backend(_)))));

    let snapshot = cache.collection();
    assert_eq!(snapshot.len(), 1);
    assert_eq!(snapshot.get("local"), Some(&json!("kept")));
    assert_eq!(cache.state(), CacheState::Connected);

    // Recovers once the store does
    store.fail.find_all.store(false, Ordering::SeqCst);
    let report = cache.sync().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(cache.state(), CacheState::Ready);
}

#[tokio::test]
async fn chaos_null_record_fails_sync_atomically() {
    let store = Arc::new(ScriptedStore {
        records: vec![
            record("a", json!(1)),
            record("broken", serde_json::Value::Null),
            record("c", json!(3)),
        ],
    });
    let cache = cache_over(store, CacheConfig::default());

    let result = cache.sync().await;
    assert!(matches!(
        result,
        Err(CacheError::Store(StorageError::Malformed { key, .. })) if key == "broken"
    ));
    assert!(cache.is_empty());
}

#[tokio::test]
async fn chaos_duplicate_keys_last_write_wins() {
    let store = Arc::new(ScriptedStore {
        records: vec![
            record("dup", json!("first")),
            record("other", json!(0)),
            record("dup", json!("second")),
        ],
    });
    let cache = cache_over(store, CacheConfig::default());

    let report = cache.sync().await.unwrap();
    assert_eq!(report.fetched, 3);
    assert_eq!(report.duplicates, 1);
    assert_eq!(cache.get("dup").unwrap(), Some(json!("second")));
    assert_eq!(cache.len(), 2);
}

#[tokio::test]
async fn chaos_failed_replace_sync_removes_nothing() {
    let store = Arc::new(FailingStore::new(InMemoryStore::new()));
    let config = CacheConfig { sync_policy: SyncPolicy::Replace, ..Default::default() };
    let cache = cache_over(store.clone(), config);

    cache.set("a", json!(1)).await.unwrap();
    store.inner.clear();
    store.fail.find_all.store(true, Ordering::SeqCst);

    assert!(cache.sync().await.is_err());
    assert_eq!(cache.get("a").unwrap(), Some(json!(1)));
}

// =============================================================================
// Write Failures
// =============================================================================

#[tokio::test]
async fn chaos_lookup_failure_propagates_and_skips_cache() {
    let store = Arc::new(FailingStore::new(InMemoryStore::new()));
    store.fail.find_one.store(true, Ordering::SeqCst);
    let cache = cache_over(store.clone(), CacheConfig::default());

    let result = cache.set("a", json!(1)).await;
    assert!(matches!(result, Err(CacheError::Store(_))));
    assert!(!cache.contains("a"));
    assert!(store.inner.is_empty());
}

#[tokio::test]
async fn chaos_persist_then_cache_save_failure_leaves_cache_unchanged() {
    let store = Arc::new(FailingStore::new(InMemoryStore::new()));
    let cache = cache_over(store.clone(), CacheConfig::default());

    cache.set("a", json!("old")).await.unwrap();
    store.fail.save.store(true, Ordering::SeqCst);

    let result = cache.set("a", json!("new")).await;
    assert!(matches!(result, Err(CacheError::Store(StorageError::Backend(msg))) if msg == "injected failure"));
    assert_eq!(cache.get("a").unwrap(), Some(json!("old")));
    assert!(cache.is_durable("a"));
}

#[tokio::test]
async fn chaos_cache_then_persist_save_failure_marks_pending() {
    let store = Arc::new(FailingStore::new(InMemoryStore::new()));
    let config = CacheConfig { write_order: WriteOrder::CacheThenPersist, ..Default::default() };
    let cache = cache_over(store.clone(), config);

    store.fail.save.store(true, Ordering::SeqCst);
    let result = cache.set("a", json!("unacked")).await;

    assert!(result.is_err());
    // Cache reflects intent; the store does not
    assert_eq!(cache.get("a").unwrap(), Some(json!("unacked")));
    assert!(store.inner.peek("a").is_none());
    assert!(!cache.is_durable("a"));
    assert_eq!(cache.pending_keys(), vec!["a".to_string()]);

    let health = cache.health_check().await;
    assert_eq!(health.pending_writes, 1);
    assert!(!health.healthy);

    // A later successful write clears the flag
    store.fail.save.store(false, Ordering::SeqCst);
    cache.set("a", json!("acked")).await.unwrap();
    assert!(cache.is_durable("a"));
    assert_eq!(store.inner.peek("a"), Some(json!("acked")));
}

#[tokio::test]
async fn chaos_sync_keeps_unacknowledged_value() {
    let store = Arc::new(FailingStore::new(InMemoryStore::with_records(vec![
        record("a", json!("old")),
    ])));
    let config = CacheConfig {
        write_order: WriteOrder::CacheThenPersist,
        sync_policy: SyncPolicy::Replace,
        ..Default::default()
    };
    let cache = cache_over(store.clone(), config);
    cache.sync().await.unwrap();

    store.fail.save.store(true, Ordering::SeqCst);
    assert!(cache.set("a", json!("new")).await.is_err());
    assert!(!cache.is_durable("a"));

    let report = cache.sync().await.unwrap();

    // The stored value is older than the pending write, so it is not applied
    assert_eq!(report.kept_pending, 1);
    assert_eq!(report.removed, 0);
    assert_eq!(cache.get("a").unwrap(), Some(json!("new")));
    assert!(!cache.is_durable("a"));
    assert_eq!(store.inner.peek("a"), Some(json!("old")));

    // Once the store accepts a write the key converges
    store.fail.save.store(false, Ordering::SeqCst);
    cache.set("a", json!("new")).await.unwrap();
    assert!(cache.is_durable("a"));
    cache.sync().await.unwrap();
    assert_eq!(cache.get("a").unwrap(), Some(json!("new")));
    assert!(cache.health_check().await.healthy);
}

#[tokio::test]
async fn chaos_delete_removes_cache_entry_when_store_fails() {
    let store = Arc::new(FailingStore::new(InMemoryStore::new()));
    let cache = cache_over(store.clone(), CacheConfig::default());
    cache.set("a", json!(1)).await.unwrap();

    store.fail.delete.store(true, Ordering::SeqCst);
    let result = cache.delete("a").await;

    assert!(matches!(result, Err(CacheError::Store(_))));
    assert!(!cache.contains("a"));
    // Store still has it; a later sync would bring it back
    assert_eq!(store.inner.peek("a"), Some(json!(1)));
}

#[tokio::test]
async fn chaos_delete_removes_cache_entry_when_lookup_fails() {
    let store = Arc::new(FailingStore::new(InMemoryStore::new()));
    let cache = cache_over(store.clone(), CacheConfig::default());
    cache.set("a", json!(1)).await.unwrap();

    store.fail.find_one.store(true, Ordering::SeqCst);
    assert!(cache.delete("a").await.is_err());
    assert!(!cache.contains("a"));
}

#[tokio::test]
async fn chaos_delete_clears_pending_flag() {
    let store = Arc::new(FailingStore::new(InMemoryStore::new()));
    let config = CacheConfig { write_order: WriteOrder::CacheThenPersist, ..Default::default() };
    let cache = cache_over(store.clone(), config);

    store.fail.save.store(true, Ordering::SeqCst);
    let _ = cache.set("a", json!(1)).await;
    assert!(!cache.is_durable("a"));

    assert!(cache.delete("a").await.unwrap());
    assert!(cache.is_durable("a"));
    assert!(cache.pending_keys().is_empty());
}

// =============================================================================
// Races
// =============================================================================

#[tokio::test]
async fn chaos_concurrent_create_race_produces_one_record() {
    let store = Arc::new(RacyStore::new());
    let cache = Arc::new(cache_over(store.clone(), CacheConfig::default()));

    let mut handles = Vec::new();
    for i in 0..8 {
        let cache = cache.clone();
        handles.push(tokio::spawn(async move { cache.set("x", json!(format!("v{}", i))).await }));
    }
    for handle in handles {
        handle.await.unwrap().unwrap();
    }

    assert_eq!(store.max_in_flight.load(Ordering::SeqCst), 1);
    assert_eq!(store.creates.load(Ordering::SeqCst), 1);
    assert_eq!(store.inner.len(), 1);
    assert_eq!(cache.get("x").unwrap(), store.inner.peek("x"));
}

#[tokio::test]
async fn chaos_sync_concurrent_with_writes_never_reverts_them() {
    let store = Arc::new(RacyStore::new());
    let cache = Arc::new(cache_over(store.clone(), CacheConfig::default()));

    let writer = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for i in 0..20 {
                cache.set(&format!("k{}", i % 4), json!(i)).await.unwrap();
            }
        })
    };
    let syncer = {
        let cache = cache.clone();
        tokio::spawn(async move {
            for _ in 0..5 {
                cache.sync().await.unwrap();
                tokio::task::yield_now().await;
            }
        })
    };
    writer.await.unwrap();
    syncer.await.unwrap();

    for i in 0..4 {
        let key = format!("k{}", i);
        assert_eq!(cache.get(&key).unwrap(), store.inner.peek(&key));
    }
}
