//! Cache entry store.
//!
//! A digest-keyed map behind a single reader/writer lock. Every mutation
//! happens under the write lock, and nothing is ever emitted while the lock is
//! held: callers get plain data back and forward it after the guard drops.

use crate::domain::digest::ContentDigest;
use crate::domain::entry::{CacheEntry, DuplicateSummary, WindowStats};
use crate::domain::record::Record;
use ahash::RandomState;
use parking_lot::RwLock;
use std::collections::HashMap;
use std::time::{Duration, Instant};

/// What the hot path should do with a record.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Observation {
    /// First occurrence of the digest: forward unmodified.
    First,
    /// Occurrence inside the current window: suppress.
    Duplicate,
    /// The window elapsed: forward decorated with the closed window's stats.
    WindowClosed(WindowStats),
}

/// Outcome of one sweep over the store.
#[derive(Debug, Default)]
pub struct SweepOutcome {
    /// Summaries for evicted entries that held duplicates.
    pub summaries: Vec<DuplicateSummary>,
    /// Entries removed because they were idle past the expiry.
    pub expired: usize,
    /// Entries removed to bring the store back to its size bound.
    pub evicted_oldest: usize,
    /// Entries left after the sweep.
    pub remaining: usize,
}

impl SweepOutcome {
    pub fn removed(&self) -> usize {
        self.expired + self.evicted_oldest
    }
}

/// The engine's only shared mutable state.
#[derive(Debug, Default)]
pub struct CacheStore {
    entries: RwLock<HashMap<ContentDigest, CacheEntry, RandomState>>,
}

impl CacheStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record one occurrence of `digest` and decide its fate.
    ///
    /// Decisions for a single digest are totally ordered by write-lock
    /// acquisition.
    pub fn observe(
        &self,
        digest: ContentDigest,
        record: &Record,
        now: Instant,
        window: Duration,
    ) -> Observation {
        let mut entries = self.entries.write();
        match entries.get_mut(&digest) {
            None => {
                entries.insert(digest, CacheEntry::new(record, now));
                Observation::First
            }
            Some(entry) if entry.window_elapsed(now, window) => {
                Observation::WindowClosed(entry.restart(now))
            }
            Some(entry) => {
                entry.record_duplicate(now);
                Observation::Duplicate
            }
        }
    }

    /// Evict expired entries, then the least recently seen until at most
    /// `max_entries` remain.
    ///
    /// Summaries are staged only for entries with `count > 1`.
    pub fn sweep(&self, now: Instant, expiry: Duration, max_entries: usize) -> SweepOutcome {
        let mut outcome = SweepOutcome::default();
        let mut entries = self.entries.write();

        let expired: Vec<ContentDigest> = entries
            .iter()
            .filter(|(_, entry)| entry.is_expired(now, expiry))
            .map(|(digest, _)| *digest)
            .collect();
        for digest in expired {
            if let Some(entry) = entries.remove(&digest) {
                outcome.expired += 1;
                outcome.summaries.extend(entry.into_summary());
            }
        }

        if entries.len() > max_entries {
            let mut by_age: Vec<(Instant, ContentDigest)> = entries
                .iter()
                .map(|(digest, entry)| (entry.last_seen(), *digest))
                .collect();
            by_age.sort_unstable();

            let excess = entries.len() - max_entries;
            for (_, digest) in by_age.into_iter().take(excess) {
                if let Some(entry) = entries.remove(&digest) {
                    outcome.evicted_oldest += 1;
                    outcome.summaries.extend(entry.into_summary());
                }
            }
        }

        outcome.remaining = entries.len();
        outcome
    }

    /// Number of tracked digests.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    #[cfg(test)]
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }

    /// Occurrence count for a digest in its current window.
    #[cfg(test)]
    pub fn count_of(&self, digest: &ContentDigest) -> Option<u64> {
        self.entries.read().get(digest).map(CacheEntry::count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Level;

    const WINDOW: Duration = Duration::from_secs(10);

    fn record(msg: &str) -> (Record, ContentDigest) {
        let record = Record::new(Level::Info, msg);
        let digest = ContentDigest::of(&record);
        (record, digest)
    }

    #[test]
    fn test_observe_state_machine() {
        let store = CacheStore::new();
        let (rec, digest) = record("hello");
        let t0 = Instant::now();

        assert_eq!(store.observe(digest, &rec, t0, WINDOW), Observation::First);
        assert_eq!(
            store.observe(digest, &rec, t0 + Duration::from_secs(1), WINDOW),
            Observation::Duplicate
        );
        assert_eq!(store.count_of(&digest), Some(2));

        let t1 = t0 + WINDOW;
        match store.observe(digest, &rec, t1, WINDOW) {
            Observation::WindowClosed(stats) => {
                assert_eq!(stats.count, 2);
                assert_eq!(stats.first_seen, t0);
                assert_eq!(stats.last_seen, t0 + Duration::from_secs(1));
            }
            other => panic!("expected window close, got {:?}", other),
        }
        assert_eq!(store.count_of(&digest), Some(1));
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sweep_expires_and_summarizes_duplicates_only() {
        let store = CacheStore::new();
        let t0 = Instant::now();
        let (single, single_digest) = record("single");
        let (dup, dup_digest) = record("dup");

        store.observe(single_digest, &single, t0, WINDOW);
        store.observe(dup_digest, &dup, t0, WINDOW);
        store.observe(dup_digest, &dup, t0, WINDOW);

        let outcome = store.sweep(t0 + Duration::from_secs(61), Duration::from_secs(60), 100);

        assert_eq!(outcome.expired, 2);
        assert_eq!(outcome.evicted_oldest, 0);
        assert_eq!(outcome.remaining, 0);
        assert_eq!(outcome.summaries.len(), 1);
        assert_eq!(outcome.summaries[0].snapshot.message, "dup");
        assert_eq!(outcome.summaries[0].stats.count, 2);
        assert!(store.is_empty());
    }

    #[test]
    fn test_sweep_keeps_fresh_entries() {
        let store = CacheStore::new();
        let t0 = Instant::now();
        let (rec, digest) = record("fresh");
        store.observe(digest, &rec, t0, WINDOW);

        let outcome = store.sweep(t0 + Duration::from_secs(60), Duration::from_secs(60), 100);

        assert_eq!(outcome.removed(), 0);
        assert_eq!(store.len(), 1);
    }

    #[test]
    fn test_sweep_evicts_oldest_beyond_capacity() {
        let store = CacheStore::new();
        let t0 = Instant::now();

        for i in 0..5u64 {
            let (rec, digest) = record(&format!("msg {}", i));
            let seen = t0 + Duration::from_secs(i);
            store.observe(digest, &rec, seen, WINDOW);
            if i < 2 {
                store.observe(digest, &rec, seen, WINDOW);
            }
        }

        let outcome = store.sweep(t0 + Duration::from_secs(5), Duration::from_secs(600), 3);

        assert_eq!(outcome.expired, 0);
        assert_eq!(outcome.evicted_oldest, 2);
        assert_eq!(outcome.remaining, 3);
        // Both evicted entries ("msg 0", "msg 1") held duplicates.
        let mut evicted: Vec<_> = outcome
            .summaries
            .iter()
            .map(|s| s.snapshot.message.as_str())
            .collect();
        evicted.sort_unstable();
        assert_eq!(evicted, vec!["msg 0", "msg 1"]);
        assert!(store.count_of(&record("msg 4").1).is_some());
    }

    #[test]
    fn test_concurrent_observe_counts_every_occurrence() {
        use std::sync::Arc;
        use std::thread;

        let store = Arc::new(CacheStore::new());
        let (rec, digest) = record("shared");
        let now = Instant::now();
        let mut handles = vec![];

        for _ in 0..8 {
            let store = Arc::clone(&store);
            let rec = rec.clone();
            handles.push(thread::spawn(move || {
                for _ in 0..100 {
                    store.observe(digest, &rec, now, Duration::from_secs(3600));
                }
            }));
        }
        for handle in handles {
            handle.join().unwrap();
        }

        assert_eq!(store.count_of(&digest), Some(800));
    }
}
