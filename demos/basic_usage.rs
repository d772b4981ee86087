// Copyright (c) 2025-2026 Adrian Robinson. Licensed under the AGPL-3.0.
// See LICENSE file in the project root for full license text.

//! Basic skew-store usage example.
//!
//! Demonstrates:
//! 1. Building a provider over the in-memory store with a skewed clock
//! 2. Saving documents that carry instants
//! 3. Inspecting the raw `_times` side-tree the store receives
//! 4. Loading, syncing and querying with instants restored
//! 5. Displaying metrics
//!
//! # Run
//!
//! ```bash
//! cargo run --example basic_usage
//! ```

use std::sync::Arc;

use chrono::{Duration, Utc};
use metrics_util::debugging::{DebugValue, DebuggingRecorder, Snapshotter};
use serde_json::json;
use skew_store::storage::QueryOptions;
use skew_store::{Document, DocumentStore, MemoryStore, ProviderConfig, StorageProvider};

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let recorder = DebuggingRecorder::new();
    let snapshotter = recorder.snapshotter();
    recorder.install().expect("failed to install metrics recorder");

    tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::try_from_default_env()
                .unwrap_or_else(|_| "skew_store=debug".into()),
        )
        .with_target(false)
        .compact()
        .init();

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║             skew-store: Basic Usage Example                   ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    // ─────────────────────────────────────────────────────────────────────────
    // 1. Store with a server clock 1.5 s ahead of ours
    // ─────────────────────────────────────────────────────────────────────────
    let store = Arc::new(MemoryStore::new());
    store.set_clock_offset_ms(1_500);
    let provider = StorageProvider::new(store.clone(), ProviderConfig::default())?;
    println!("📦 Provider ready (server offset: +1500 ms)");

    // ─────────────────────────────────────────────────────────────────────────
    // 2. Save a few tasks
    // ─────────────────────────────────────────────────────────────────────────
    let now = Utc::now();
    let tasks = [
        ("write docs", now - Duration::hours(2), 3i64),
        ("fix bug", now - Duration::minutes(30), 1),
        ("review", now - Duration::minutes(5), 2),
    ];

    let mut ids = Vec::new();
    for (title, created, priority) in tasks {
        let doc: Document = [
            ("title", Document::from(title)),
            ("priority", Document::from(priority)),
            ("createdAt", Document::from(created)),
            ("history", Document::Array(vec![Document::from(created), Document::from("opened")])),
        ]
        .into_iter()
        .collect();
        let id = provider.save("tasks", None, doc).await?;
        println!("   └─ Saved '{title}' as {id}");
        ids.push(id);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 3. What the store actually holds
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n🔍 Raw record as stored:");
    if let Some(raw) = store.read("tasks", &ids[0]).await? {
        println!("{}", serde_json::to_string_pretty(&raw)?);
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 4. Load, sync and query
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📖 Loaded back:");
    if let Some(doc) = provider.load("tasks", &ids[0]).await? {
        println!("   └─ {}", serde_json::to_string(&doc)?);
    }

    let (tx, mut rx) = tokio::sync::mpsc::unbounded_channel();
    let initial = provider
        .sync("tasks", &ids[1], move |change| {
            let _ = tx.send(change);
        })
        .await?;
    let title = initial.and_then(|d| d.get("title").cloned());
    println!("\n🔄 Syncing {} (initial title: {:?})", ids[1], title);

    let done: Document = [
        ("title", Document::from("fix bug")),
        ("priority", Document::from(1i64)),
        ("doneAt", Document::from(Utc::now())),
    ]
    .into_iter()
    .collect();
    provider.save("tasks", Some(&ids[1]), done).await?;
    if let Some(change) = rx.recv().await {
        println!("   └─ Change delivered: {}", serde_json::to_string(&change?)?);
    }
    provider.unsync("tasks", &ids[1]);

    println!("\n🔎 Two most urgent tasks:");
    let urgent = provider
        .query_once("tasks", &QueryOptions::new().sort_by("priority").limit(2))
        .await?;
    for (id, doc) in &urgent {
        println!("   └─ {id}: {}", serde_json::to_string(doc)?);
    }

    println!("\n🕒 Oldest task by server creation time:");
    let oldest = provider
        .query_once("tasks", &QueryOptions::new().sort_by("_times/createdAt").limit(1))
        .await?;
    for (id, doc) in &oldest {
        println!("   └─ {id}: {}", json!(doc.get("title")));
    }

    // ─────────────────────────────────────────────────────────────────────────
    // 5. Metrics
    // ─────────────────────────────────────────────────────────────────────────
    println!("\n📈 Metrics:");
    dump_metrics(&snapshotter);

    println!("\n╔═══════════════════════════════════════════════════════════════╗");
    println!("║                    Example complete!                          ║");
    println!("╚═══════════════════════════════════════════════════════════════╝\n");

    Ok(())
}

fn dump_metrics(snapshotter: &Snapshotter) {
    let mut lines = Vec::new();
    for (composite_key, _, _, value) in snapshotter.snapshot().into_vec() {
        let (_, key) = composite_key.into_parts();
        let labels: Vec<_> = key.labels().map(|l| format!("{}={}", l.key(), l.value())).collect();
        let label_str = if labels.is_empty() {
            String::new()
        } else {
            format!("{{{}}}", labels.join(","))
        };

        let rendered = match value {
            DebugValue::Counter(v) => format!("{v}"),
            DebugValue::Gauge(v) => format!("{:.2}", v.into_inner()),
            DebugValue::Histogram(samples) => {
                let sum: f64 = samples.iter().map(|v| v.into_inner()).sum();
                format!("count={} sum={sum:.6}s", samples.len())
            }
        };
        lines.push(format!("{}{} = {}", key.name(), label_str, rendered));
    }
    lines.sort();
    for line in lines {
        println!("   └─ {line}");
    }
}
