//! Observability metrics for deduplication.
//!
//! Provides counters describing what the engine did with the records it saw.

use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

/// Counters tracking deduplication activity.
///
/// All metrics use atomic operations for thread-safe updates and reads.
/// Clones share the same counters.
#[derive(Debug, Clone)]
pub struct Metrics {
    inner: Arc<MetricsInner>,
}

#[derive(Debug, Default)]
struct MetricsInner {
    /// Records forwarded unmodified (first occurrences and disabled passes)
    records_forwarded: AtomicU64,
    /// Records suppressed inside a duplicate window
    records_suppressed: AtomicU64,
    /// Records forwarded with duplicate metadata after a window elapsed
    records_reemitted: AtomicU64,
    /// Entries removed by the sweep
    entries_evicted: AtomicU64,
    /// Summary records handed to the downstream consumer
    summaries_emitted: AtomicU64,
    /// Summary records the downstream consumer failed on, or that had no consumer
    summary_failures: AtomicU64,
}

impl Metrics {
    /// Create a new metrics tracker.
    pub fn new() -> Self {
        Self {
            inner: Arc::new(MetricsInner::default()),
        }
    }

    pub(crate) fn record_forwarded(&self) {
        self.inner.records_forwarded.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_suppressed(&self) {
        self.inner.records_suppressed.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_reemitted(&self) {
        self.inner.records_reemitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_evictions(&self, count: usize) {
        self.inner
            .entries_evicted
            .fetch_add(count as u64, Ordering::Relaxed);
    }

    pub(crate) fn record_summary(&self) {
        self.inner.summaries_emitted.fetch_add(1, Ordering::Relaxed);
    }

    pub(crate) fn record_summary_failure(&self) {
        self.inner.summary_failures.fetch_add(1, Ordering::Relaxed);
    }

    pub fn records_forwarded(&self) -> u64 {
        self.inner.records_forwarded.load(Ordering::Relaxed)
    }

    pub fn records_suppressed(&self) -> u64 {
        self.inner.records_suppressed.load(Ordering::Relaxed)
    }

    pub fn records_reemitted(&self) -> u64 {
        self.inner.records_reemitted.load(Ordering::Relaxed)
    }

    pub fn entries_evicted(&self) -> u64 {
        self.inner.entries_evicted.load(Ordering::Relaxed)
    }

    pub fn summaries_emitted(&self) -> u64 {
        self.inner.summaries_emitted.load(Ordering::Relaxed)
    }

    pub fn summary_failures(&self) -> u64 {
        self.inner.summary_failures.load(Ordering::Relaxed)
    }

    /// Get a snapshot of all metrics.
    pub fn snapshot(&self) -> MetricsSnapshot {
        MetricsSnapshot {
            records_forwarded: self.records_forwarded(),
            records_suppressed: self.records_suppressed(),
            records_reemitted: self.records_reemitted(),
            entries_evicted: self.entries_evicted(),
            summaries_emitted: self.summaries_emitted(),
            summary_failures: self.summary_failures(),
        }
    }
}

impl Default for Metrics {
    fn default() -> Self {
        Self::new()
    }
}

/// A point-in-time snapshot of metrics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MetricsSnapshot {
    pub records_forwarded: u64,
    pub records_suppressed: u64,
    pub records_reemitted: u64,
    pub entries_evicted: u64,
    pub summaries_emitted: u64,
    pub summary_failures: u64,
}

impl MetricsSnapshot {
    /// Total records seen on the hot path.
    pub fn total_records(&self) -> u64 {
        self.records_forwarded
            .saturating_add(self.records_suppressed)
            .saturating_add(self.records_reemitted)
    }

    /// Ratio of suppressed records to all hot-path records (0.0 to 1.0).
    ///
    /// Returns 0.0 if no records have been processed.
    pub fn suppression_rate(&self) -> f64 {
        let total = self.total_records();
        if total == 0 {
            0.0
        } else {
            self.records_suppressed as f64 / total as f64
        }
    }
}
