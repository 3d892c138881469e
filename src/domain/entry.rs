//! Per-digest cache entries and the summaries built from them.

use crate::domain::digest::{
    DUPLICATE_COUNT_KEY, FIRST_SEEN_KEY, LAST_SEEN_KEY, ORIGINAL_MSG_KEY,
};
use crate::domain::record::{Attr, CallSite, Level, Record};
use chrono::{DateTime, Utc};
use std::time::{Duration, Instant};

/// Frozen copy of the record that created an entry.
///
/// Used to rebuild a faithful summary if the entry is evicted while holding
/// duplicates.
#[derive(Debug, Clone, PartialEq)]
pub struct RecordSnapshot {
    pub level: Level,
    pub message: String,
    pub attrs: Vec<Attr>,
    pub call_site: Option<CallSite>,
}

impl RecordSnapshot {
    pub fn of(record: &Record) -> Self {
        Self {
            level: record.level,
            message: record.message.clone(),
            attrs: record.attrs.clone(),
            call_site: record.call_site.clone(),
        }
    }
}

/// Occurrence statistics for one duplicate window.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct WindowStats {
    pub count: u64,
    pub first_seen: Instant,
    pub last_seen: Instant,
}

impl WindowStats {
    /// Append `duplicate_count`, `first_seen` and `last_seen` to a record.
    pub fn decorate(&self, record: &mut Record, to_wall: impl Fn(Instant) -> DateTime<Utc>) {
        record.add(DUPLICATE_COUNT_KEY, self.count);
        record.add(FIRST_SEEN_KEY, to_wall(self.first_seen));
        record.add(LAST_SEEN_KEY, to_wall(self.last_seen));
    }
}

/// Tracking state for a single content digest.
///
/// Invariants: `count >= 1` and `last_seen >= first_seen`.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    first_seen: Instant,
    last_seen: Instant,
    count: u64,
    snapshot: RecordSnapshot,
}

impl CacheEntry {
    /// Entry for the first observation of a digest.
    pub fn new(record: &Record, now: Instant) -> Self {
        Self {
            first_seen: now,
            last_seen: now,
            count: 1,
            snapshot: RecordSnapshot::of(record),
        }
    }

    pub fn count(&self) -> u64 {
        self.count
    }

    #[cfg(test)]
    pub fn first_seen(&self) -> Instant {
        self.first_seen
    }

    pub fn last_seen(&self) -> Instant {
        self.last_seen
    }

    pub fn stats(&self) -> WindowStats {
        WindowStats {
            count: self.count,
            first_seen: self.first_seen,
            last_seen: self.last_seen,
        }
    }

    /// Whether the duplicate window anchored at `first_seen` has elapsed.
    pub fn window_elapsed(&self, now: Instant, window: Duration) -> bool {
        now.saturating_duration_since(self.first_seen) >= window
    }

    /// Whether the entry has been idle for longer than `expiry`.
    pub fn is_expired(&self, now: Instant, expiry: Duration) -> bool {
        now.saturating_duration_since(self.last_seen) > expiry
    }

    /// Count another occurrence inside the current window.
    pub fn record_duplicate(&mut self, now: Instant) {
        self.count = self.count.saturating_add(1);
        self.last_seen = self.last_seen.max(now);
    }

    /// Close the current window and start a fresh one at `now`.
    ///
    /// Returns the statistics of the window that just closed. The new window
    /// counts the triggering occurrence, so `count` restarts at 1.
    pub fn restart(&mut self, now: Instant) -> WindowStats {
        let closed = self.stats();
        let now = now.max(self.last_seen);
        self.first_seen = now;
        self.last_seen = now;
        self.count = 1;
        closed
    }

    /// Stage this entry for summary emission, if it holds real duplicates.
    pub fn into_summary(self) -> Option<DuplicateSummary> {
        (self.count > 1).then(|| DuplicateSummary {
            stats: self.stats(),
            snapshot: self.snapshot,
        })
    }
}

/// A summary of an evicted burst, staged for emission after the store lock
/// is released.
#[derive(Debug, Clone)]
pub struct DuplicateSummary {
    pub snapshot: RecordSnapshot,
    pub stats: WindowStats,
}

impl DuplicateSummary {
    /// Rebuild the summary record.
    ///
    /// The record carries the original level, message, attributes and call
    /// site, plus the duplicate metadata and `original_msg`.
    pub fn to_record(
        &self,
        time: DateTime<Utc>,
        to_wall: impl Fn(Instant) -> DateTime<Utc>,
    ) -> Record {
        let mut record = Record {
            time,
            level: self.snapshot.level,
            message: self.snapshot.message.clone(),
            attrs: self.snapshot.attrs.clone(),
            call_site: self.snapshot.call_site.clone(),
        };
        record.add(DUPLICATE_COUNT_KEY, self.stats.count);
        record.add(ORIGINAL_MSG_KEY, self.snapshot.message.clone());
        record.add(FIRST_SEEN_KEY, to_wall(self.stats.first_seen));
        record.add(LAST_SEEN_KEY, to_wall(self.stats.last_seen));
        record
    }
}
