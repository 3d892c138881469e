//! Ports (interfaces) for the application layer.
//!
//! In hexagonal architecture, ports define the interfaces that the application
//! layer needs. Infrastructure adapters implement these ports.

use crate::domain::record::Record;
use chrono::{DateTime, Utc};
use std::fmt::Debug;
use std::sync::Arc;
use std::time::Instant;

/// Error returned by a downstream consumer.
#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    /// Writing the record failed.
    #[error("failed to write record: {0}")]
    Io(#[from] std::io::Error),
    /// The record could not be encoded.
    #[error("failed to encode record: {0}")]
    Encode(#[from] serde_json::Error),
    /// The consumer refused the record.
    #[error("record rejected: {0}")]
    Rejected(String),
}

/// The downstream continuation a caller hands to the engine.
///
/// Forwarded records are passed to it verbatim. It must be safe to call from
/// several threads at once: sweep summaries are emitted from the background
/// task while hot-path calls may be forwarding concurrently.
pub type Next = Arc<dyn Fn(Record) -> Result<(), SinkError> + Send + Sync>;

/// A consumer of records, for callers that prefer a trait object to a closure.
pub trait RecordSink: Send + Sync + Debug {
    /// Consume one record.
    fn consume(&self, record: Record) -> Result<(), SinkError>;
}

/// Wrap a sink as a [`Next`] continuation.
pub fn next_from_sink<K>(sink: Arc<K>) -> Next
where
    K: RecordSink + 'static,
{
    Arc::new(move |record| sink.consume(record))
}

/// Port for obtaining current time.
///
/// Window and expiry arithmetic runs on monotonic instants; `wall_time` maps
/// an instant onto the wall clock for the timestamps attached to records.
pub trait Clock: Send + Sync + Debug {
    /// Get the current instant.
    fn now(&self) -> Instant;

    /// Wall-clock time corresponding to `instant`.
    fn wall_time(&self, instant: Instant) -> DateTime<Utc>;
}
