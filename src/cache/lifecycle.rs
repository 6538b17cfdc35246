//! Cache lifecycle: connect, sync on readiness, health, shutdown.

use std::sync::Arc;
use std::time::Instant;

use tokio::task::JoinHandle;
use tracing::{error, info, warn};

use crate::signal::ReadySignal;
use crate::storage::sql::SqlStore;

use super::{CacheError, CacheState, HealthCheck, SyncReport, WriteThroughCache};

impl WriteThroughCache {
    /// Connect to the store if no handle was supplied at construction.
    ///
    /// Uses `config.store_url` with a bounded startup retry. A no-op when a
    /// store handle already exists.
    ///
    /// # Errors
    ///
    /// [`CacheError::Store`] if the connection cannot be established; the
    /// state becomes `Failed`.
    #[tracing::instrument(skip(self))]
    pub async fn start(&mut self) -> Result<(), CacheError> {
        if self.store.is_some() {
            info!("Store handle already present, nothing to connect");
            return Ok(());
        }
        let Some(url) = self.config.store_url.clone() else {
            return Err(CacheError::Config("no store_url configured".to_string()));
        };

        let start = Instant::now();
        info!(collection = %self.config.collection, "Connecting to document store...");
        match SqlStore::new(&url, self.config.sql_options()).await {
            Ok(store) => {
                self.store = Some(Arc::new(store));
                self.set_state(CacheState::Connected);
                crate::metrics::set_store_healthy(true);
                crate::metrics::record_connect(start.elapsed());
                info!(elapsed_ms = start.elapsed().as_millis() as u64, "Document store connected");
                Ok(())
            }
            Err(e) => {
                error!(error = %e, "Failed to connect to document store");
                self.set_state(CacheState::Failed);
                crate::metrics::set_store_healthy(false);
                crate::metrics::record_connection_error("sql");
                Err(e.into())
            }
        }
    }

    /// Wait for the host's readiness signal, then [`sync`](Self::sync).
    ///
    /// # Errors
    ///
    /// [`CacheError::ReadinessLost`] if the trigger is dropped without
    /// firing, otherwise whatever `sync` returns.
    pub async fn on_ready(&self, mut signal: ReadySignal) -> Result<SyncReport, CacheError> {
        if !signal.wait().await {
            warn!("Readiness trigger dropped before firing; cache not hydrated");
            return Err(CacheError::ReadinessLost);
        }
        info!("Host ready, hydrating cache");
        self.sync().await
    }

    /// Run [`on_ready`](Self::on_ready) on a background task.
    pub fn spawn_sync_on_ready(self: &Arc<Self>, signal: ReadySignal) -> JoinHandle<Result<SyncReport, CacheError>> {
        let cache = Arc::clone(self);
        tokio::spawn(async move { cache.on_ready(signal).await })
    }

    /// Probe the store and collect internal state.
    pub async fn health_check(&self) -> HealthCheck {
        let state = self.state();
        let ready = state == CacheState::Ready;
        let entries = self.table.len();
        let pending_writes = self.pending.len();

        let (store_connected, store_latency_ms) = match &self.store {
            Some(store) if state != CacheState::Closed => {
                let start = Instant::now();
                match store.ping().await {
                    Ok(()) => (Some(true), Some(start.elapsed().as_millis() as u64)),
                    Err(e) => {
                        warn!(error = %e, "Store ping failed");
                        (Some(false), None)
                    }
                }
            }
            _ => (None, None),
        };
        crate::metrics::set_store_healthy(store_connected == Some(true));

        let healthy = ready && store_connected == Some(true) && pending_writes == 0;

        HealthCheck {
            state,
            ready,
            entries,
            pending_writes,
            store_connected,
            store_latency_ms,
            healthy,
        }
    }

    /// Stop accepting mutations and release the store.
    ///
    /// Waits for in-flight mutations and syncs. Reads keep serving the
    /// cache. Calling it twice is harmless.
    pub async fn shutdown(&self) {
        let _gate = self.sync_gate.write().await;
        if self.state() == CacheState::Closed {
            return;
        }
        if !self.pending.is_empty() {
            warn!(pending = self.pending.len(), "Shutting down with writes the store never acknowledged");
        }
        self.set_state(CacheState::Closed);
        if let Some(store) = &self.store {
            store.close().await;
        }
        info!(entries = self.table.len(), "Cache closed");
    }
}
