//! Deterministic wall clock.

use casework_core::effects::PhysicalTimeEffects;
use chrono::{DateTime, Duration, TimeZone, Utc};
use parking_lot::Mutex;
use std::sync::Arc;

/// Controllable time source for deterministic testing.
///
/// Clones share the same instant. With a tick configured, every read
/// advances the clock afterwards, so consecutive placeholders get distinct
/// ids.
#[derive(Debug, Clone)]
pub struct ControllableClock {
    now: Arc<Mutex<DateTime<Utc>>>,
    tick: Duration,
}

impl ControllableClock {
    /// Clock frozen at `start`.
    pub fn new(start: DateTime<Utc>) -> Self {
        Self {
            now: Arc::new(Mutex::new(start)),
            tick: Duration::zero(),
        }
    }

    /// Clock frozen at a Unix millisecond timestamp.
    pub fn at_millis(timestamp_ms: i64) -> Self {
        Self::new(Utc.timestamp_millis_opt(timestamp_ms).unwrap())
    }

    /// Default test epoch: 2024-06-01T12:00:00Z.
    pub fn fixed() -> Self {
        Self::new(Utc.with_ymd_and_hms(2024, 6, 1, 12, 0, 0).unwrap())
    }

    /// Advance by `tick` after every read.
    pub fn with_tick(mut self, tick: Duration) -> Self {
        self.tick = tick;
        self
    }

    /// Move the clock forward.
    pub fn advance(&self, by: Duration) {
        let mut now = self.now.lock();
        *now += by;
    }

    /// Set the absolute instant.
    pub fn set(&self, instant: DateTime<Utc>) {
        *self.now.lock() = instant;
    }

    /// Current instant without ticking.
    pub fn peek(&self) -> DateTime<Utc> {
        *self.now.lock()
    }
}

impl Default for ControllableClock {
    fn default() -> Self {
        Self::fixed()
    }
}

impl PhysicalTimeEffects for ControllableClock {
    fn physical_time(&self) -> DateTime<Utc> {
        let mut now = self.now.lock();
        let read = *now;
        *now += self.tick;
        read
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_frozen_clock_repeats() {
        let clock = ControllableClock::fixed();
        assert_eq!(clock.physical_time(), clock.physical_time());
    }

    #[test]
    fn test_tick_advances_per_read() {
        let clock = ControllableClock::at_millis(1_000).with_tick(Duration::milliseconds(5));
        assert_eq!(clock.current_timestamp_ms(), 1_000);
        assert_eq!(clock.current_timestamp_ms(), 1_005);
        assert_eq!(clock.peek().timestamp_millis(), 1_010);
    }

    #[test]
    fn test_clones_share_time() {
        let clock = ControllableClock::fixed();
        let other = clock.clone();
        clock.advance(Duration::minutes(3));
        assert_eq!(other.peek(), clock.peek());
    }
}
