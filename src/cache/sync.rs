//! Bulk hydration of the cache table from the store.
//!
//! The full result set is fetched and validated before the table is
//! touched: a failed fetch or a malformed record leaves the table exactly as
//! it was. Records are applied in store order, so a duplicated key resolves
//! to its last occurrence. Keys with a write pending durability keep their
//! cached value.

use std::collections::HashSet;
use std::time::Instant;

use tracing::{error, info, warn};

use crate::config::SyncPolicy;
use crate::storage::traits::StorageError;

use super::{CacheError, CacheState, SyncReport, WriteThroughCache};

impl WriteThroughCache {
    /// Load every store record into the cache.
    ///
    /// Called by [`on_ready`](Self::on_ready); may also be called directly to
    /// re-sync. Waits for in-flight `set`/`delete` calls to finish and blocks
    /// new ones until it completes.
    ///
    /// With [`SyncPolicy::Merge`] cached keys missing from the store are kept;
    /// with [`SyncPolicy::Replace`] they are dropped. Either way a key whose
    /// write is still pending durability keeps its cached value and stays
    /// pending; the stored record for it is not applied.
    ///
    /// # Errors
    ///
    /// [`CacheError::Store`] if the fetch fails or a record is malformed; the
    /// cache table is left untouched and the state reverts.
    #[tracing::instrument(skip(self), fields(policy = ?self.config.sync_policy))]
    pub async fn sync(&self) -> Result<SyncReport, CacheError> {
        let _gate = self.sync_gate.write().await;
        let store = self.writable_store()?;

        let start = Instant::now();
        let previous = self.state();
        self.set_state(CacheState::Syncing);

        let fetched = store.find_all().await.and_then(|records| {
            if let Some(bad) = records.iter().find(|r| !r.has_value()) {
                return Err(StorageError::Malformed {
                    key: bad.key.to_string(),
                    reason: "null value".to_string(),
                });
            }
            Ok(records)
        });
        let records = match fetched {
            Ok(records) => records,
            Err(e) => {
                error!(error = %e, "Sync failed; cache left unchanged");
                crate::metrics::record_operation("store", "sync", "error");
                crate::metrics::record_error("store", "sync", "fetch");
                self.set_state(previous);
                return Err(e.into());
            }
        };

        let fetched = records.len();
        let present: HashSet<String> = records.iter().map(|r| r.key.as_str().to_owned()).collect();
        let duplicates = fetched - present.len();
        if duplicates > 0 {
            warn!(duplicates, "Store returned duplicate keys; last occurrence wins");
        }

        let removed = match self.config.sync_policy {
            SyncPolicy::Merge => 0,
            SyncPolicy::Replace => self
                .table
                .retain(|key| present.contains(key) || self.pending.contains(key)),
        };
        // A pending key holds a newer write than anything the store returned
        let (records, unacked): (Vec<_>, Vec<_>) = records
            .into_iter()
            .partition(|r| !self.pending.contains(r.key.as_str()));
        let kept_pending = unacked.len();
        if kept_pending > 0 {
            warn!(kept_pending, "Keeping unacknowledged cached values over stored ones");
        }
        let applied = self.table.apply(records);

        let report = SyncReport {
            fetched,
            applied,
            duplicates,
            kept_pending,
            removed,
            elapsed: start.elapsed(),
        };

        self.set_state(CacheState::Ready);
        self.update_gauge_metrics();
        crate::metrics::record_operation("store", "sync", "success");
        crate::metrics::record_sync(fetched, removed, report.elapsed);
        info!(fetched, removed, entries = self.table.len(), "Cache hydrated from store");
        Ok(report)
    }
}
