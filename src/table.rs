//! In-memory cache table.
//!
//! The table is the single source of truth for reads. It is a `DashMap`, so
//! lookups are safe while writes and syncs run on other tasks. Nothing here
//! touches the document store.

use std::collections::HashMap;

use dashmap::DashMap;
use serde_json::Value;

use crate::record::{Key, Record};

#[derive(Debug, Default)]
pub struct CacheTable {
    entries: DashMap<String, Value>,
}

impl CacheTable {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn get(&self, key: &str) -> Option<Value> {
        self.entries.get(key).map(|e| e.value().clone())
    }

    /// Overwrite-or-insert. Returns the previous value.
    pub fn set(&self, key: &Key, value: Value) -> Option<Value> {
        self.entries.insert(key.as_str().to_owned(), value)
    }

    /// Remove `key`; a no-op if absent. Returns whether it was present.
    pub fn delete(&self, key: &str) -> bool {
        self.entries.remove(key).is_some()
    }

    #[must_use]
    pub fn contains(&self, key: &str) -> bool {
        self.entries.contains_key(key)
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.entries.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    /// Snapshot copy of every entry. Later writes are not reflected.
    #[must_use]
    pub fn entries(&self) -> HashMap<String, Value> {
        self.entries
            .iter()
            .map(|e| (e.key().clone(), e.value().clone()))
            .collect()
    }

    #[must_use]
    pub fn keys(&self) -> Vec<String> {
        self.entries.iter().map(|e| e.key().clone()).collect()
    }

    /// Apply `records` in order; duplicates resolve last-write-wins.
    pub fn apply(&self, records: Vec<Record>) -> usize {
        let mut applied = 0;
        for record in records {
            self.entries.insert(record.key.into_inner(), record.value);
            applied += 1;
        }
        applied
    }

    /// Drop every key for which `keep` returns false. Returns the number removed.
    pub fn retain(&self, mut keep: impl FnMut(&str) -> bool) -> usize {
        let before = self.entries.len();
        self.entries.retain(|k, _| keep(k));
        before.saturating_sub(self.entries.len())
    }
}
