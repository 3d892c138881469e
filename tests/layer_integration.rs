//! End-to-end: tracing events through `DedupLayer` into a JSON-lines sink.

use log_dedup::infrastructure::mocks::MockClock;
use log_dedup::{DedupEngine, DedupLayer, JsonLinesSink};
use parking_lot::Mutex;
use std::io::{self, Write};
use std::sync::Arc;
use std::time::{Duration, Instant};
use tracing::{error, info};
use tracing_subscriber::layer::SubscriberExt;

#[derive(Clone, Default)]
struct SharedBuffer(Arc<Mutex<Vec<u8>>>);

impl SharedBuffer {
    fn lines(&self) -> Vec<serde_json::Value> {
        let bytes = self.0.lock().clone();
        String::from_utf8(bytes)
            .unwrap()
            .lines()
            .map(|line| serde_json::from_str(line).unwrap())
            .collect()
    }
}

impl Write for SharedBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

fn setup() -> (DedupEngine, MockClock, SharedBuffer, DedupLayer) {
    let clock = MockClock::new(Instant::now());
    let engine = DedupEngine::builder()
        .with_duplicate_window(Duration::from_secs(60))
        .with_cache_expiry(Duration::from_secs(300))
        .with_clock(Arc::new(clock.clone()))
        .build()
        .unwrap();
    let buffer = SharedBuffer::default();
    let layer = DedupLayer::builder()
        .with_engine(engine.clone())
        .with_sink(Arc::new(JsonLinesSink::new(buffer.clone())))
        .build()
        .unwrap();
    (engine, clock, buffer, layer)
}

#[test]
fn test_repeated_events_are_written_once_then_decorated() {
    let (engine, clock, buffer, layer) = setup();
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..4 {
            error!(host = "db-1", code = 17i64, "connection reset");
        }
        clock.advance(Duration::from_secs(61));
        error!(host = "db-1", code = 17i64, "connection reset");
    });

    let lines = buffer.lines();
    assert_eq!(lines.len(), 2);

    assert_eq!(lines[0]["level"], "ERROR");
    assert_eq!(lines[0]["msg"], "connection reset");
    assert_eq!(lines[0]["fields"]["host"], "db-1");
    assert_eq!(lines[0]["fields"]["code"], 17);
    assert!(lines[0]["fields"].get("duplicate_count").is_none());
    assert!(lines[0]["source"]["line"].is_number());

    assert_eq!(lines[1]["fields"]["duplicate_count"], 4);
    assert!(lines[1]["fields"]["first_seen"].is_string());
    assert!(lines[1]["fields"]["last_seen"].is_string());

    assert_eq!(engine.metrics().records_suppressed(), 3);
    assert_eq!(engine.metrics().records_reemitted(), 1);
}

#[test]
fn test_field_values_distinguish_events() {
    let (_engine, _clock, buffer, layer) = setup();
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        info!(user = "alice", "login");
        info!(user = "bob", "login");
        info!(user = "alice", "login");
    });

    let lines = buffer.lines();
    assert_eq!(lines.len(), 2);
    assert_eq!(lines[0]["fields"]["user"], "alice");
    assert_eq!(lines[1]["fields"]["user"], "bob");
}

#[test]
fn test_disabled_engine_passes_every_event() {
    let (engine, _clock, buffer, layer) = setup();
    engine.set_duplicate_window(Duration::ZERO);
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        for _ in 0..3 {
            info!("heartbeat");
        }
    });

    assert_eq!(buffer.lines().len(), 3);
    assert_eq!(engine.entry_count(), 0);
}

#[test]
fn test_event_fields_named_like_record_keys_keep_record_intact() {
    let (_engine, _clock, buffer, layer) = setup();
    let subscriber = tracing_subscriber::registry().with(layer);

    tracing::subscriber::with_default(subscriber, || {
        info!(source = "osquery", level = "high", "event");
    });

    let lines = buffer.lines();
    assert_eq!(lines.len(), 1);
    assert_eq!(lines[0]["level"], "INFO");
    assert!(lines[0]["source"]["line"].is_number());
    assert_eq!(lines[0]["fields"]["level"], "high");
    assert_eq!(lines[0]["fields"]["source"], "osquery");
}
