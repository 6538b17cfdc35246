// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Metrics instrumentation for recondb.
//!
//! Uses the `metrics` crate for backend-agnostic metrics collection.
//! The host application is responsible for installing an exporter.
//!
//! # Metric Naming Convention
//! - `recondb_` prefix for all metrics
//! - `_total` suffix for counters
//! - `_seconds` suffix for duration histograms
//!
//! # Labels
//! - `layer`: cache, store
//! - `operation`: get, set, delete, sync, connect
//! - `status`: success, error, rejected, hit, miss

use metrics::{counter, gauge, histogram};
use std::time::Duration;

/// Record an operation outcome
pub fn record_operation(layer: &str, operation: &str, status: &str) {
    counter!(
        "recondb_operations_total",
        "layer" => layer.to_string(),
        "operation" => operation.to_string(),
        "status" => status.to_string()
    )
    .increment(1);
}

/// Record operation latency
pub fn record_latency(layer: &str, operation: &str, duration: Duration) {
    histogram!(
        "recondb_operation_seconds",
        "layer" => layer.to_string(),
        "operation" => operation.to_string()
    )
    .record(duration.as_secs_f64());
}

/// Record bytes written to a layer
pub fn record_bytes_written(layer: &str, bytes: usize) {
    counter!(
        "recondb_bytes_written_total",
        "layer" => layer.to_string()
    )
    .increment(bytes as u64);
}

/// Set current cache entry count
pub fn set_cache_entries(count: usize) {
    gauge!("recondb_cache_entries").set(count as f64);
}

/// Set number of keys whose latest write is not yet acknowledged by the store
pub fn set_pending_writes(count: usize) {
    gauge!("recondb_pending_writes").set(count as f64);
}

/// Record a rejected argument
pub fn record_validation_rejected(operation: &str, reason: &str) {
    counter!(
        "recondb_validation_rejected_total",
        "operation" => operation.to_string(),
        "reason" => reason.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// SYNC - Bulk hydration
// ═══════════════════════════════════════════════════════════════════════════

/// Record a completed sync
pub fn record_sync(fetched: usize, removed: usize, duration: Duration) {
    counter!("recondb_sync_runs_total").increment(1);
    counter!("recondb_sync_records_total").increment(fetched as u64);
    counter!("recondb_sync_stale_removed_total").increment(removed as u64);
    histogram!("recondb_sync_seconds").record(duration.as_secs_f64());
}

// ═══════════════════════════════════════════════════════════════════════════
// ERROR TRACKING
// ═══════════════════════════════════════════════════════════════════════════

/// Record an error with category for alerting
pub fn record_error(layer: &str, operation: &str, error_type: &str) {
    counter!(
        "recondb_errors_total",
        "layer" => layer.to_string(),
        "operation" => operation.to_string(),
        "error_type" => error_type.to_string()
    )
    .increment(1);
}

/// Record a connection error
pub fn record_connection_error(backend: &str) {
    counter!(
        "recondb_connection_errors_total",
        "backend" => backend.to_string()
    )
    .increment(1);
}

// ═══════════════════════════════════════════════════════════════════════════
// HEALTH
// ═══════════════════════════════════════════════════════════════════════════

/// Set store health status (1 = healthy, 0 = unhealthy)
pub fn set_store_healthy(healthy: bool) {
    gauge!("recondb_store_healthy").set(if healthy { 1.0 } else { 0.0 });
}

/// Set cache lifecycle state (0 = Init .. 5 = Failed)
pub fn set_cache_state(state: u8) {
    gauge!("recondb_cache_state").set(state as f64);
}

/// Record connect duration
pub fn record_connect(duration: Duration) {
    histogram!("recondb_connect_seconds").record(duration.as_secs_f64());
}
