//! Tracing integration layer.
//!
//! Provides a `tracing_subscriber::Layer` that turns events into records and
//! runs them through a [`DedupEngine`] before handing them to a sink.

use crate::application::engine::DedupEngine;
use crate::application::ports::{next_from_sink, Next, RecordSink};
use crate::domain::record::{CallSite, Level, Record};
use crate::infrastructure::visitor::FieldVisitor;

use std::collections::BTreeSet;
use std::fmt;
use std::sync::Arc;
use tracing::Subscriber;
use tracing_subscriber::{layer::Context, Layer};

/// Events from this crate never re-enter the engine.
const OWN_TARGET: &str = "log_dedup";

fn is_own_target(target: &str) -> bool {
    target
        .strip_prefix(OWN_TARGET)
        .is_some_and(|rest| rest.is_empty() || rest.starts_with("::"))
}

/// Error returned when building a `DedupLayer` fails.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum LayerBuildError {
    /// No downstream sink or continuation was configured
    #[error("a sink or continuation is required")]
    MissingSink,
}

/// Builder for constructing a `DedupLayer`.
pub struct DedupLayerBuilder {
    engine: Option<DedupEngine>,
    next: Option<Next>,
    exempt_targets: BTreeSet<String>,
}

impl DedupLayerBuilder {
    /// Use an existing engine. Without one, a default engine is created
    /// (deduplication disabled until a window is set).
    pub fn with_engine(mut self, engine: DedupEngine) -> Self {
        self.engine = Some(engine);
        self
    }

    /// Send surviving records to `sink`.
    pub fn with_sink<K>(mut self, sink: Arc<K>) -> Self
    where
        K: RecordSink + 'static,
    {
        self.next = Some(next_from_sink(sink));
        self
    }

    /// Send surviving records to a continuation.
    pub fn with_next(mut self, next: Next) -> Self {
        self.next = Some(next);
        self
    }

    /// Forward events with this target straight to the sink, bypassing the engine.
    pub fn with_exempt_target(mut self, target: impl Into<String>) -> Self {
        self.exempt_targets.insert(target.into());
        self
    }

    /// Build the layer.
    ///
    /// # Errors
    /// Returns `LayerBuildError::MissingSink` if no sink was configured.
    pub fn build(self) -> Result<DedupLayer, LayerBuildError> {
        let next = self.next.ok_or(LayerBuildError::MissingSink)?;
        Ok(DedupLayer {
            engine: self.engine.unwrap_or_default(),
            next,
            exempt_targets: Arc::new(self.exempt_targets),
        })
    }
}

/// Tracing layer that deduplicates events.
///
/// Each event becomes a [`Record`]: its `message` field is the message, every
/// other field an attribute, and its callsite the record's call site. The
/// engine decides whether the record reaches the sink.
///
/// # Example
///
/// ```
/// use log_dedup::{DedupEngine, DedupLayer, JsonLinesSink};
/// use std::sync::Arc;
/// use std::time::Duration;
/// use tracing_subscriber::layer::SubscriberExt;
///
/// let engine = DedupEngine::builder()
///     .with_duplicate_window(Duration::from_secs(60))
///     .build()
///     .unwrap();
///
/// let layer = DedupLayer::builder()
///     .with_engine(engine.clone())
///     .with_sink(Arc::new(JsonLinesSink::stdout()))
///     .build()
///     .unwrap();
///
/// let subscriber = tracing_subscriber::registry().with(layer);
/// tracing::subscriber::with_default(subscriber, || {
///     for _ in 0..3 {
///         tracing::info!(peer = "10.0.0.7", "connection refused");
///     }
/// });
/// assert_eq!(engine.metrics().records_suppressed(), 2);
/// ```
#[derive(Clone)]
pub struct DedupLayer {
    engine: DedupEngine,
    next: Next,
    exempt_targets: Arc<BTreeSet<String>>,
}

impl DedupLayer {
    /// Create a builder for configuring the layer.
    pub fn builder() -> DedupLayerBuilder {
        DedupLayerBuilder {
            engine: None,
            next: None,
            exempt_targets: BTreeSet::new(),
        }
    }

    /// The engine this layer feeds.
    pub fn engine(&self) -> &DedupEngine {
        &self.engine
    }

    fn to_record(event: &tracing::Event<'_>) -> Record {
        let metadata = event.metadata();
        let mut visitor = FieldVisitor::new();
        event.record(&mut visitor);
        let (message, attrs) = visitor.into_parts();

        let mut record = Record::new(
            Level::from(metadata.level()),
            message.unwrap_or_else(|| metadata.name().to_string()),
        )
        .with_call_site(CallSite::from_metadata(metadata));
        record.attrs = attrs;
        record
    }
}

impl fmt::Debug for DedupLayer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DedupLayer")
            .field("engine", &self.engine)
            .field("exempt_targets", &self.exempt_targets)
            .finish()
    }
}

impl<S> Layer<S> for DedupLayer
where
    S: Subscriber,
{
    fn on_event(&self, event: &tracing::Event<'_>, _ctx: Context<'_, S>) {
        let target = event.metadata().target();
        if is_own_target(target) {
            return;
        }

        let record = Self::to_record(event);
        let result = if self.exempt_targets.contains(target) {
            (self.next)(record)
        } else {
            self.engine.middleware(record, &self.next)
        };

        if let Err(err) = result {
            tracing::warn!(target: "log_dedup::layer", error = %err, "dedup sink failed");
        }
    }
}
