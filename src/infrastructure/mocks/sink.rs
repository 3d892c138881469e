//! Capturing sink for testing.

use crate::application::ports::{next_from_sink, Next, RecordSink, SinkError};
use crate::domain::record::Record;
use parking_lot::Mutex;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

/// Sink that records everything it is handed.
///
/// Clones share the captured records, so a clone can be moved into the
/// engine's continuation while the test keeps inspecting the original.
///
/// # Examples
///
/// ```
/// use log_dedup::infrastructure::mocks::CaptureSink;
/// use log_dedup::{DedupEngine, Level, Record};
/// use std::time::Duration;
///
/// let engine = DedupEngine::builder()
///     .with_duplicate_window(Duration::from_secs(1))
///     .build()
///     .unwrap();
/// let capture = CaptureSink::new();
/// let next = capture.next();
///
/// engine.middleware(Record::new(Level::Info, "ping"), &next).unwrap();
/// engine.middleware(Record::new(Level::Info, "ping"), &next).unwrap();
/// assert_eq!(capture.count(), 1);
///
/// capture.clear();
/// assert_eq!(capture.count(), 0);
/// ```
#[derive(Debug, Clone, Default)]
pub struct CaptureSink {
    captured: Arc<Mutex<Vec<Record>>>,
    failing: Arc<AtomicBool>,
}

impl CaptureSink {
    /// Create a new capture sink.
    pub fn new() -> Self {
        Self::default()
    }

    /// A continuation that forwards into this sink.
    pub fn next(&self) -> Next {
        next_from_sink(Arc::new(self.clone()))
    }

    /// When `true`, every record is rejected and nothing is captured.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    /// Get all captured records.
    pub fn records(&self) -> Vec<Record> {
        self.captured.lock().clone()
    }

    /// Captured records with the given message.
    pub fn with_message(&self, message: &str) -> Vec<Record> {
        self.captured
            .lock()
            .iter()
            .filter(|record| record.message == message)
            .cloned()
            .collect()
    }

    /// Get the count of captured records.
    pub fn count(&self) -> usize {
        self.captured.lock().len()
    }

    /// Clear all captured records.
    pub fn clear(&self) {
        self.captured.lock().clear();
    }
}

impl RecordSink for CaptureSink {
    fn consume(&self, record: Record) -> Result<(), SinkError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(SinkError::Rejected(format!(
                "capture sink failing: {}",
                record.message
            )));
        }
        self.captured.lock().push(record);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::record::Level;

    #[test]
    fn test_capture_and_fail() {
        let sink = CaptureSink::new();
        let next = sink.next();

        next(Record::new(Level::Info, "a")).unwrap();
        next(Record::new(Level::Warn, "b")).unwrap();
        assert_eq!(sink.count(), 2);
        assert_eq!(sink.with_message("b").len(), 1);

        sink.set_failing(true);
        assert!(matches!(
            next(Record::new(Level::Info, "c")),
            Err(SinkError::Rejected(_))
        ));
        assert_eq!(sink.count(), 2);
    }
}
