//! The deduplication engine.
//!
//! Every record passes through [`DedupEngine::middleware`], which hashes it,
//! consults the cache store, and either forwards it, suppresses it, or
//! forwards it decorated with the statistics of the window that just closed.
//! A background sweeper (see [`crate::application::sweeper`]) evicts idle
//! entries and emits summaries for the ones that held duplicates.

use crate::application::config::{BuildError, DedupConfig};
use crate::application::metrics::Metrics;
use crate::application::ports::{Clock, Next, SinkError};
use crate::application::store::{CacheStore, Observation};
use crate::application::sweeper;
use crate::domain::digest::ContentDigest;
use crate::domain::record::Record;
use crate::infrastructure::clock::SystemClock;
use parking_lot::{Mutex, RwLock};
use std::fmt;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;

/// Builder for constructing a [`DedupEngine`].
pub struct DedupEngineBuilder {
    config: DedupConfig,
    clock: Option<Arc<dyn Clock>>,
}

impl DedupEngineBuilder {
    /// Replace every option at once.
    pub fn with_config(mut self, config: DedupConfig) -> Self {
        self.config = config;
        self
    }

    /// How long an entry may sit idle before the sweep evicts it.
    pub fn with_cache_expiry(mut self, expiry: Duration) -> Self {
        self.config.cache_expiry = expiry;
        self
    }

    /// Soft bound on tracked digests, enforced at the end of each sweep.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_max_cache_size(mut self, max: usize) -> Self {
        self.config.max_cache_size = max;
        self
    }

    /// How often the background sweep runs.
    ///
    /// The value will be validated when `build()` is called.
    pub fn with_cleanup_interval(mut self, interval: Duration) -> Self {
        self.config.cleanup_interval = interval;
        self
    }

    /// Initial duplicate window. Zero disables deduplication.
    pub fn with_duplicate_window(mut self, window: Duration) -> Self {
        self.config.duplicate_window = window;
        self
    }

    /// Set a custom clock (mainly for testing).
    pub fn with_clock(mut self, clock: Arc<dyn Clock>) -> Self {
        self.clock = Some(clock);
        self
    }

    /// Build the engine. The sweeper is not running until [`DedupEngine::start`].
    ///
    /// # Errors
    /// Returns `BuildError` if the configuration is invalid.
    pub fn build(self) -> Result<DedupEngine, BuildError> {
        self.config.validate()?;

        let inner = EngineInner {
            duplicate_window_nanos: AtomicU64::new(duration_to_nanos(
                self.config.duplicate_window,
            )),
            config: self.config,
            store: CacheStore::new(),
            clock: self.clock.unwrap_or_else(|| Arc::new(SystemClock::new())),
            metrics: Metrics::new(),
            last_next: RwLock::new(None),
            sweep_running: AtomicBool::new(false),
            lifecycle: Mutex::new(Lifecycle::default()),
        };

        Ok(DedupEngine {
            inner: Arc::new(inner),
        })
    }
}

/// Handles for the running sweeper task.
#[derive(Debug, Default)]
struct Lifecycle {
    /// Present while a sweeper loop is running. Dropping it also stops the loop.
    shutdown: Option<watch::Sender<bool>>,
    /// Flips to `true` when the most recently started loop has exited.
    finished: Option<watch::Receiver<bool>>,
}

/// Shared engine state. The sweeper task holds a weak reference to it.
pub(crate) struct EngineInner {
    pub(crate) config: DedupConfig,
    duplicate_window_nanos: AtomicU64,
    pub(crate) store: CacheStore,
    pub(crate) clock: Arc<dyn Clock>,
    pub(crate) metrics: Metrics,
    /// Most recently observed downstream consumer, used for sweep summaries.
    last_next: RwLock<Option<Next>>,
    /// Test-and-set guard: at most one sweep at a time.
    pub(crate) sweep_running: AtomicBool,
    lifecycle: Mutex<Lifecycle>,
}

impl EngineInner {
    pub(crate) fn duplicate_window(&self) -> Duration {
        Duration::from_nanos(self.duplicate_window_nanos.load(Ordering::Acquire))
    }

    pub(crate) fn last_next(&self) -> Option<Next> {
        self.last_next.read().clone()
    }

    /// Remember `next` for sweep emissions (last writer wins).
    fn remember_next(&self, next: &Next) {
        if let Some(current) = self.last_next.read().as_ref() {
            if Arc::ptr_eq(current, next) {
                return;
            }
        }
        *self.last_next.write() = Some(Arc::clone(next));
    }
}

/// A stateful, content-addressed log deduplication engine.
///
/// Safe for concurrent use; clones share the same cache, window and sweeper.
///
/// # Example
///
/// ```
/// use log_dedup::{DedupEngine, Level, Next, Record};
/// use std::sync::Arc;
/// use std::time::Duration;
///
/// let engine = DedupEngine::builder()
///     .with_duplicate_window(Duration::from_secs(60))
///     .build()
///     .unwrap();
///
/// let next: Next = Arc::new(|record: Record| {
///     println!("{} {}", record.level, record.message);
///     Ok(())
/// });
///
/// // Forwarded unmodified.
/// engine.middleware(Record::new(Level::Info, "osquery extension connected"), &next).unwrap();
/// // Suppressed: same content inside the window.
/// engine.middleware(Record::new(Level::Info, "osquery extension connected"), &next).unwrap();
/// assert_eq!(engine.metrics().records_suppressed(), 1);
/// ```
#[derive(Clone)]
pub struct DedupEngine {
    inner: Arc<EngineInner>,
}

impl DedupEngine {
    /// Create a builder for configuring the engine.
    ///
    /// Defaults:
    /// - Cache expiry: 5 minutes
    /// - Max cache size: 2,000 entries
    /// - Cleanup interval: 1 minute
    /// - Duplicate window: 0 (deduplication disabled)
    pub fn builder() -> DedupEngineBuilder {
        DedupEngineBuilder {
            config: DedupConfig::default(),
            clock: None,
        }
    }

    /// Create an engine with default settings.
    ///
    /// # Panics
    /// This method cannot panic because all default values are valid.
    pub fn new() -> Self {
        Self::builder()
            .build()
            .expect("default configuration is always valid")
    }

    /// Run a record through the engine.
    ///
    /// Calls `next` exactly once for forwarded records (first occurrences and
    /// window re-emissions) and not at all for suppressed duplicates. An error
    /// from `next` is returned unchanged; suppression itself never fails.
    pub fn middleware(&self, record: Record, next: &Next) -> Result<(), SinkError> {
        let inner = &*self.inner;
        let window = inner.duplicate_window();
        if window.is_zero() {
            inner.metrics.record_forwarded();
            return next(record);
        }

        inner.remember_next(next);

        let digest = ContentDigest::of(&record);
        let now = inner.clock.now();

        // The store lock is released before anything is forwarded.
        match inner.store.observe(digest, &record, now, window) {
            Observation::First => {
                inner.metrics.record_forwarded();
                next(record)
            }
            Observation::Duplicate => {
                inner.metrics.record_suppressed();
                Ok(())
            }
            Observation::WindowClosed(stats) => {
                let mut record = record;
                stats.decorate(&mut record, |instant| inner.clock.wall_time(instant));
                inner.metrics.record_reemitted();
                next(record)
            }
        }
    }

    /// Change the duplicate window for all subsequent records.
    ///
    /// Zero disables deduplication. Re-enabling resumes with whatever is
    /// still cached.
    pub fn set_duplicate_window(&self, window: Duration) {
        self.inner
            .duplicate_window_nanos
            .store(duration_to_nanos(window), Ordering::Release);
    }

    /// The current duplicate window.
    pub fn duplicate_window(&self) -> Duration {
        self.inner.duplicate_window()
    }

    /// Start the background sweeper on the current tokio runtime.
    ///
    /// Idempotent: calling it while the sweeper runs does nothing. Outside a
    /// tokio runtime the sweeper cannot run; a warning is logged and the
    /// engine keeps deduplicating without evictions.
    pub fn start(&self) {
        let mut lifecycle = self.inner.lifecycle.lock();
        if lifecycle.shutdown.is_some() {
            return;
        }

        let runtime = match tokio::runtime::Handle::try_current() {
            Ok(runtime) => runtime,
            Err(err) => {
                tracing::warn!(error = %err, "dedup sweeper not started: no tokio runtime");
                return;
            }
        };

        let (shutdown_tx, shutdown) = watch::channel(false);
        let (finished_tx, finished_rx) = watch::channel(false);

        runtime.spawn(sweeper::run(
            Arc::downgrade(&self.inner),
            self.inner.config.cleanup_interval,
            shutdown,
            finished_tx,
        ));

        lifecycle.shutdown = Some(shutdown_tx);
        lifecycle.finished = Some(finished_rx);
        tracing::trace!(
            interval = ?self.inner.config.cleanup_interval,
            "dedup sweeper started"
        );
    }

    /// Stop the background sweeper and wait for it to exit.
    ///
    /// Idempotent and safe to call concurrently: every caller returns only
    /// once the loop has fully exited, and no sweep runs afterwards.
    pub async fn stop(&self) {
        let finished = {
            let mut lifecycle = self.inner.lifecycle.lock();
            if let Some(shutdown) = lifecycle.shutdown.take() {
                shutdown.send_replace(true);
            }
            lifecycle.finished.clone()
        };

        if let Some(mut finished) = finished {
            // An error means the task is gone, which is just as final.
            let _ = finished.wait_for(|done| *done).await;
        }
    }

    /// Whether the sweeper loop is currently running.
    pub fn is_running(&self) -> bool {
        self.inner.lifecycle.lock().shutdown.is_some()
    }

    /// Get a reference to the metrics.
    pub fn metrics(&self) -> &Metrics {
        &self.inner.metrics
    }

    /// Number of digests currently tracked.
    pub fn entry_count(&self) -> usize {
        self.inner.store.len()
    }

    /// Run one sweep immediately.
    #[cfg(any(test, feature = "test-helpers"))]
    pub fn sweep_now(&self) {
        sweeper::sweep(&self.inner);
    }

    #[cfg(test)]
    pub(crate) fn inner_for_tests(&self) -> &Arc<EngineInner> {
        &self.inner
    }
}

impl Default for DedupEngine {
    fn default() -> Self {
        Self::new()
    }
}

impl fmt::Debug for DedupEngine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupEngine")
            .field("config", &self.inner.config)
            .field("duplicate_window", &self.duplicate_window())
            .field("entries", &self.entry_count())
            .field("running", &self.is_running())
            .finish()
    }
}

fn duration_to_nanos(duration: Duration) -> u64 {
    duration.as_nanos().try_into().unwrap_or(u64::MAX)
}
