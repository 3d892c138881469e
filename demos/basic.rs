//! Basic example demonstrating windowed deduplication.
//!
//! A burst of identical events is written once, re-emitted with its duplicate
//! count when the window elapses, and finally summarized by the sweeper once
//! the entry goes idle.

use log_dedup::{DedupEngine, DedupLayer, JsonLinesSink};
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info};
use tracing_subscriber::prelude::*;

#[tokio::main]
async fn main() {
    let engine = DedupEngine::builder()
        .with_duplicate_window(Duration::from_millis(500))
        .with_cache_expiry(Duration::from_secs(1))
        .with_cleanup_interval(Duration::from_millis(250))
        .build()
        .expect("valid configuration");
    engine.start();

    let layer = DedupLayer::builder()
        .with_engine(engine.clone())
        .with_sink(Arc::new(JsonLinesSink::stdout()))
        .build()
        .expect("sink configured");

    tracing_subscriber::registry().with(layer).init();

    println!("=== Burst of 10 identical errors (only the first is written) ===");
    for _ in 0..10 {
        error!(host = "db-1", "connection reset");
    }

    println!("\n=== Different field values are different records ===");
    for user in ["alice", "bob", "alice"] {
        info!(user, "login");
    }

    tokio::time::sleep(Duration::from_millis(600)).await;
    println!("\n=== Window elapsed: next occurrence carries duplicate_count=10 ===");
    error!(host = "db-1", "connection reset");
    error!(host = "db-1", "connection reset");

    println!("\n=== Waiting for the sweeper to summarize the idle burst ===");
    tokio::time::sleep(Duration::from_secs(2)).await;

    engine.stop().await;

    let snapshot = engine.metrics().snapshot();
    println!(
        "\nforwarded={} suppressed={} reemitted={} summaries={}",
        snapshot.records_forwarded,
        snapshot.records_suppressed,
        snapshot.records_reemitted,
        snapshot.summaries_emitted,
    );
}
