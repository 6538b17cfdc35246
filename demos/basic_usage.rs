// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic recondb usage example.
//!
//! Demonstrates:
//! 1. Opening a SQLite-backed cache in a temporary directory
//! 2. Hydrating the cache once the host signals ready
//! 3. Writing, reading and deleting a few JSON entries
//! 4. Displaying health and metrics
//! 5. Clean shutdown
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;

use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use recondb::{ready_signal, CacheConfig, WriteThroughCache};
use serde_json::json;

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║              recondb: Basic Usage Example                     ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Configure and connect
    // ─────────────────────────────────────────────────────────────────────────
    let dir = tempfile::TempDir::new()?;
    let config = CacheConfig {
        store_url: Some(format!("sqlite:{}?mode=rwc", dir.path().join("demo.db").display())),
        collection: "demo_settings".into(),
        ..Default::default()
    };

    let mut cache = WriteThroughCache::new(config, None)?;
    println!("📦 State: {}", cache.state());
    cache.start().await?;
    println!("   ✅ Connected! State: {}", cache.state());
    let cache = Arc::new(cache);

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Hydrate when the host is ready
    // ─────────────────────────────────────────────────────────────────────────
    let (trigger, signal) = ready_signal();
    let hydration = cache.spawn_sync_on_ready(signal);
    println!("\n⏳ Waiting for the host to signal ready...");
    trigger.fire();
    let report = hydration.await??;
    println!("   ✅ Hydrated {} records in {:?}", report.fetched, report.elapsed);

    // ─────────────────────────────────────────────────────────────────────────
    // 3. Write, read, delete
    // ─────────────────────────────────────────────────────────────────────────
    let entries = vec![
        ("guild.1.prefix", json!("!")),
        ("guild.1.locale", json!("en-GB")),
        ("guild.2.prefix", json!("?")),
        ("user.alice", json!({"xp": 1200, "roles": ["mod"]})),
    ];

    println!("\n📝 Writing {} entries...", entries.len());
    for (key, value) in &entries {
        let start = std::time::Instant::now();
        let outcome = cache.set(key, value.clone()).await?;
        println!("   └─ {} → {} ({:?}, {:?})", key, value, outcome, start.elapsed());
    }

    println!("\n📖 Reading back from memory...");
    for (key, _) in &entries {
        let start = std::time::Instant::now();
        let value = cache.get(key)?;
        println!("   └─ {} → {:?} ({:?})", key, value, start.elapsed());
    }

    println!("\n🗑️  Deleting guild.2.prefix...");
    let existed = cache.delete("guild.2.prefix").await?;
    println!("   └─ existed in store: {}, now cached: {}", existed, cache.contains("guild.2.prefix"));

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Health and metrics
    // ─────────────────────────────────────────────────────────────────────────
    let health = cache.health_check().await;
    println!("\n🩺 Health");
    println!("   └─ state={} ready={} entries={} pending={} store_connected={:?} healthy={}",
        health.state, health.ready, health.entries, health.pending_writes,
        health.store_connected, health.healthy);

    println!("\n📈 Metrics:");
    cache.update_gauge_metrics();
    dump_metrics(&snapshotter);

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Shutdown
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🛑 Shutting down...");
    cache.shutdown().await;
    println!("   ✅ State: {}", cache.state());

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

/// Print captured metrics grouped by kind
fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines: Vec<(String, String)> = Vec::new();

    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let name = if labels.is_empty() {
            key.name().to_string()
        } else {
            format!("{}{{{}}}", key.name(), labels.join(","))
        };

        let rendered = match value {
            DebugValue::Counter(v) => format!("counter {}", v),
            DebugValue::Gauge(v) => format!("gauge {:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let count = samples.len();
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("histogram count={} sum={:.4}", count, sum)
            }
        };
        lines.push((name, rendered));
    }

    lines.sort();
    if lines.is_empty() {
        println!("   └─ (no metrics recorded)");
    }
    for (name, rendered) in &lines {
        println!("   └─ {} = {}", name, rendered);
    }
}
