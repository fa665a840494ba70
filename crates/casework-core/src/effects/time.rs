//! Wall-clock time effect.
//!
//! Optimistic projections stamp records with "now"; routing that read through
//! a trait keeps projections deterministic under test.

use chrono::{DateTime, SecondsFormat, Utc};

/// Wall-clock source for timestamps and placeholder ids.
pub trait PhysicalTimeEffects: Send + Sync {
    /// Current UTC time.
    fn physical_time(&self) -> DateTime<Utc>;

    /// Current time rendered as RFC 3339 with millisecond precision.
    fn now_iso8601(&self) -> String {
        self.physical_time()
            .to_rfc3339_opts(SecondsFormat::Millis, true)
    }

    /// Current Unix timestamp in milliseconds.
    fn current_timestamp_ms(&self) -> i64 {
        self.physical_time().timestamp_millis()
    }
}

/// Production clock backed by the system time.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl PhysicalTimeEffects for SystemClock {
    fn physical_time(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    struct Fixed(DateTime<Utc>);

    impl PhysicalTimeEffects for Fixed {
        fn physical_time(&self) -> DateTime<Utc> {
            self.0
        }
    }

    #[test]
    fn test_iso8601_rendering() {
        let clock = Fixed(Utc.with_ymd_and_hms(2024, 3, 1, 12, 30, 0).unwrap());
        assert_eq!(clock.now_iso8601(), "2024-03-01T12:30:00.000Z");
        assert_eq!(clock.current_timestamp_ms(), 1_709_296_200_000);
    }

    #[test]
    fn test_system_clock_moves() {
        let clock = SystemClock;
        assert!(clock.current_timestamp_ms() > 0);
    }
}
