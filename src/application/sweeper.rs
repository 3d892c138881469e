//! Background cleanup of the cache.
//!
//! On every tick the sweeper evicts idle entries and trims the cache to its
//! size bound, then emits one summary record per evicted entry that absorbed
//! duplicates. Summaries go to the most recently observed downstream
//! consumer, after the store lock has been released.

use crate::application::engine::EngineInner;
use std::sync::atomic::Ordering;
use std::sync::Weak;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::{interval_at, Instant, MissedTickBehavior};

/// Releases the single-sweep guard, even if a consumer panics mid-emission.
struct SweepGuard<'a>(&'a EngineInner);

impl Drop for SweepGuard<'_> {
    fn drop(&mut self) {
        self.0.sweep_running.store(false, Ordering::Release);
    }
}

/// Run one sweep. Returns immediately if another sweep is in progress.
pub(crate) fn sweep(inner: &EngineInner) {
    if inner
        .sweep_running
        .compare_exchange(false, true, Ordering::AcqRel, Ordering::Acquire)
        .is_err()
    {
        return;
    }
    let _guard = SweepGuard(inner);

    let now = inner.clock.now();
    let outcome = inner.store.sweep(
        now,
        inner.config.cache_expiry,
        inner.config.max_cache_size,
    );

    if outcome.removed() > 0 {
        inner.metrics.record_evictions(outcome.removed());
        tracing::debug!(
            expired = outcome.expired,
            evicted_oldest = outcome.evicted_oldest,
            remaining = outcome.remaining,
            summaries = outcome.summaries.len(),
            "dedup cache swept"
        );
    }

    if outcome.summaries.is_empty() {
        return;
    }

    let Some(next) = inner.last_next() else {
        for _ in &outcome.summaries {
            inner.metrics.record_summary_failure();
        }
        return;
    };

    let emitted_at = inner.clock.wall_time(now);
    for summary in outcome.summaries {
        let record = summary.to_record(emitted_at, |instant| inner.clock.wall_time(instant));
        match next(record) {
            Ok(()) => inner.metrics.record_summary(),
            Err(err) => {
                inner.metrics.record_summary_failure();
                tracing::debug!(error = %err, "dedup summary rejected by consumer");
            }
        }
    }
}

/// The sweeper loop. Exits on shutdown or once the engine has been dropped,
/// then signals `finished`.
pub(crate) async fn run(
    engine: Weak<EngineInner>,
    period: Duration,
    mut shutdown: watch::Receiver<bool>,
    finished: watch::Sender<bool>,
) {
    let mut ticker = interval_at(Instant::now() + period, period);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

    loop {
        if *shutdown.borrow_and_update() {
            break;
        }

        tokio::select! {
            biased;
            changed = shutdown.changed() => {
                if changed.is_err() {
                    break;
                }
            }
            _ = ticker.tick() => {
                match engine.upgrade() {
                    Some(inner) => sweep(&inner),
                    None => break,
                }
            }
        }
    }

    tracing::trace!("dedup sweeper stopped");
    finished.send_replace(true);
}
