//! Mock clock for testing.

use crate::application::ports::Clock;
use crate::infrastructure::clock::WallAnchor;
use chrono::{DateTime, Utc};
use parking_lot::Mutex;
use std::sync::Arc;
use std::time::{Duration, Instant};

/// Mock clock for testing.
///
/// Allows tests to control time progression explicitly, so window and expiry
/// decisions are deterministic. Wall-clock times are derived from the start
/// instant, which maps to the Unix epoch unless [`MockClock::with_wall`] is used.
///
/// # Examples
///
/// ```
/// use log_dedup::infrastructure::mocks::MockClock;
/// use log_dedup::Clock;
/// use std::time::{Duration, Instant};
///
/// let start = Instant::now();
/// let clock = MockClock::new(start);
///
/// clock.advance(Duration::from_secs(10));
/// assert_eq!(clock.now(), start + Duration::from_secs(10));
/// assert_eq!(clock.wall_time(clock.now()).timestamp(), 10);
/// ```
///
/// All clones share the same underlying time value, so advancing time in
/// one clone affects all clones.
#[derive(Debug, Clone)]
pub struct MockClock {
    current_time: Arc<Mutex<Instant>>,
    anchor: WallAnchor,
}

impl MockClock {
    /// Create a mock clock starting at a specific instant.
    pub fn new(start: Instant) -> Self {
        Self::with_wall(start, DateTime::<Utc>::default())
    }

    /// Create a mock clock whose `start` instant corresponds to `wall`.
    pub fn with_wall(start: Instant, wall: DateTime<Utc>) -> Self {
        Self {
            current_time: Arc::new(Mutex::new(start)),
            anchor: WallAnchor::new(start, wall),
        }
    }

    /// Advance the clock by a duration.
    pub fn advance(&self, duration: Duration) {
        *self.current_time.lock() += duration;
    }

    /// Set the clock to a specific instant.
    pub fn set(&self, instant: Instant) {
        *self.current_time.lock() = instant;
    }
}

impl Clock for MockClock {
    fn now(&self) -> Instant {
        *self.current_time.lock()
    }

    fn wall_time(&self, instant: Instant) -> DateTime<Utc> {
        self.anchor.wall_time(instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_mock_clock() {
        let start = Instant::now();
        let clock = MockClock::new(start);

        assert_eq!(clock.now(), start);

        clock.advance(Duration::from_secs(10));
        assert_eq!(clock.now(), start + Duration::from_secs(10));

        let new_time = start + Duration::from_secs(100);
        clock.set(new_time);
        assert_eq!(clock.now(), new_time);
        assert_eq!(clock.wall_time(new_time).timestamp(), 100);
    }

    #[test]
    fn test_clones_share_time() {
        let start = Instant::now();
        let clock = MockClock::new(start);
        let clone = clock.clone();

        std::thread::spawn(move || clone.advance(Duration::from_secs(5)))
            .join()
            .unwrap();

        assert_eq!(clock.now(), start + Duration::from_secs(5));
    }
}
