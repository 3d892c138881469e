//! # log-dedup
//!
//! Content-addressed log deduplication for long-running agents.
//!
//! A [`DedupEngine`] sits between a log producer and its consumer. Records with
//! identical content (level, message and attributes, ignoring timestamps and
//! call sites) are forwarded once; repeats inside a configurable window are
//! suppressed and counted. When a window elapses, the next occurrence is
//! forwarded carrying `duplicate_count`, `first_seen` and `last_seen`. A
//! background sweeper evicts idle entries and emits a summary for each one
//! that absorbed duplicates, so no burst goes unreported.
//!
//! ## Quick Start
//!
//! ```rust,no_run
//! use log_dedup::{DedupEngine, DedupLayer, JsonLinesSink};
//! use std::sync::Arc;
//! use std::time::Duration;
//! use tracing_subscriber::prelude::*;
//!
//! # #[tokio::main]
//! # async fn main() {
//! let engine = DedupEngine::builder()
//!     .with_duplicate_window(Duration::from_secs(60))
//!     .build()
//!     .unwrap();
//! engine.start();
//!
//! let layer = DedupLayer::builder()
//!     .with_engine(engine.clone())
//!     .with_sink(Arc::new(JsonLinesSink::stdout()))
//!     .build()
//!     .unwrap();
//!
//! tracing_subscriber::registry().with(layer).init();
//!
//! tracing::warn!(table = "processes", "osquery query timed out");
//!
//! engine.stop().await;
//! # }
//! ```
//!
//! ## Using the Engine Directly
//!
//! The engine does not depend on `tracing`. Any producer can hand it a
//! [`Record`] and a [`Next`] continuation:
//!
//! ```rust
//! use log_dedup::{DedupEngine, Level, Next, Record};
//! use std::sync::Arc;
//! use std::time::Duration;
//!
//! let engine = DedupEngine::builder()
//!     .with_duplicate_window(Duration::from_secs(30))
//!     .build()
//!     .unwrap();
//! let next: Next = Arc::new(|record: Record| {
//!     println!("{}", record.message);
//!     Ok(())
//! });
//!
//! let record = Record::new(Level::Error, "enrollment failed").with_attr("status", 503i64);
//! engine.middleware(record.clone(), &next).unwrap();
//! engine.middleware(record, &next).unwrap(); // suppressed
//! ```
//!
//! ## What Counts as "The Same" Record
//!
//! Digests cover the level, the message and every attribute except
//! [`EXCLUDED_KEYS`]: `ts`, `time`, `caller`, `source`, `original.time`,
//! `original.source`, and the engine's own marker keys. Attribute order does
//! not matter. Differing values for any other key produce distinct digests.
//!
//! ## Runtime Control
//!
//! - [`DedupEngine::set_duplicate_window`] changes the window at any time.
//!   Zero disables deduplication: records pass through untouched and the
//!   cache is left alone.
//! - [`DedupEngine::start`] / [`DedupEngine::stop`] control the sweeper.
//!   Both are idempotent; `stop` returns only once the sweeper has exited.
//!
//! ## Observability
//!
//! ```rust
//! # use log_dedup::DedupEngine;
//! # let engine = DedupEngine::new();
//! let snapshot = engine.metrics().snapshot();
//! println!(
//!     "forwarded={} suppressed={} summaries={} tracked={}",
//!     snapshot.records_forwarded,
//!     snapshot.records_suppressed,
//!     snapshot.summaries_emitted,
//!     engine.entry_count(),
//! );
//! ```
//!
//! The engine logs its own lifecycle and sweep activity under the
//! `log_dedup` target. [`DedupLayer`] never feeds those events back into the
//! engine.

// Domain layer - pure deduplication logic
pub mod domain;

// Application layer - orchestration
pub mod application;

// Infrastructure layer - external adapters
pub mod infrastructure;

// Re-export commonly used types for convenience
pub use domain::{
    digest::{
        ContentDigest, DUPLICATE_COUNT_KEY, EXCLUDED_KEYS, FIRST_SEEN_KEY, LAST_SEEN_KEY,
        ORIGINAL_MSG_KEY,
    },
    entry::{DuplicateSummary, WindowStats},
    record::{Attr, CallSite, Level, Record, Value},
};

pub use application::{
    config::{BuildError, DedupConfig},
    engine::{DedupEngine, DedupEngineBuilder},
    metrics::{Metrics, MetricsSnapshot},
    ports::{next_from_sink, Clock, Next, RecordSink, SinkError},
};

pub use infrastructure::{
    clock::SystemClock,
    layer::{DedupLayer, DedupLayerBuilder, LayerBuildError},
    sink::JsonLinesSink,
};
