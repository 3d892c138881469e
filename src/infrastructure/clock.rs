//! Clock adapters for time operations.
//!
//! Provides SystemClock implementation for production use.
//!
//! # Testing
//!
//! See `MockClock` (in `crate::infrastructure::mocks`) for a controllable test clock.
//! Available with the `test-helpers` feature or in test builds:
//!
//! ```toml
//! [dev-dependencies]
//! log-dedup = { version = "*", features = ["test-helpers"] }
//! ```

use crate::application::ports::Clock;
use chrono::{DateTime, Utc};
use std::time::Instant;

/// A monotonic instant paired with the wall-clock time it was taken at.
///
/// Instants are mapped to wall time by their offset from the anchor, so a
/// window's `first_seen`/`last_seen` stay ordered even if the system clock
/// is stepped.
#[derive(Debug, Clone, Copy)]
pub(crate) struct WallAnchor {
    instant: Instant,
    wall: DateTime<Utc>,
}

impl WallAnchor {
    pub(crate) fn new(instant: Instant, wall: DateTime<Utc>) -> Self {
        Self { instant, wall }
    }

    pub(crate) fn now() -> Self {
        Self::new(Instant::now(), Utc::now())
    }

    pub(crate) fn wall_time(&self, instant: Instant) -> DateTime<Utc> {
        let shifted = if instant >= self.instant {
            chrono::Duration::from_std(instant - self.instant)
                .ok()
                .and_then(|offset| self.wall.checked_add_signed(offset))
        } else {
            chrono::Duration::from_std(self.instant - instant)
                .ok()
                .and_then(|offset| self.wall.checked_sub_signed(offset))
        };
        shifted.unwrap_or(self.wall)
    }
}

/// System clock implementation using `Instant::now()`.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    anchor: WallAnchor,
}

impl SystemClock {
    /// Create a new system clock anchored at the current time.
    pub fn new() -> Self {
        Self {
            anchor: WallAnchor::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Instant {
        Instant::now()
    }

    fn wall_time(&self, instant: Instant) -> DateTime<Utc> {
        self.anchor.wall_time(instant)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Duration;

    #[test]
    fn test_system_clock() {
        let clock = SystemClock::new();
        let t1 = clock.now();
        std::thread::sleep(Duration::from_millis(10));
        let t2 = clock.now();

        assert!(t2 > t1);
        assert!(clock.wall_time(t2) > clock.wall_time(t1));
    }

    #[test]
    fn test_anchor_maps_offsets_both_ways() {
        let instant = Instant::now();
        let wall = DateTime::parse_from_rfc3339("2024-05-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc);
        let anchor = WallAnchor::new(instant, wall);

        assert_eq!(anchor.wall_time(instant), wall);
        assert_eq!(
            anchor.wall_time(instant + Duration::from_millis(1500)),
            wall + chrono::Duration::milliseconds(1500)
        );
        if let Some(earlier) = instant.checked_sub(Duration::from_secs(2)) {
            assert_eq!(
                anchor.wall_time(earlier),
                wall - chrono::Duration::seconds(2)
            );
        }
    }
}
