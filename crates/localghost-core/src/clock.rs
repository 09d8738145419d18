//! Clock abstraction so grant-expiry logic can be exercised deterministically.

use chrono::{DateTime, Utc};
use std::sync::atomic::{AtomicI64, Ordering};

/// A source of the current time.
///
/// Every component that stamps or compares timestamps (the token manager,
/// the permission store) takes a `&dyn Clock` rather than calling
/// `Utc::now()` directly, so tests can advance time past a grant's expiry
/// without sleeping.
pub trait Clock: Send + Sync {
    /// The current UTC time.
    fn now(&self) -> DateTime<Utc>;
}

/// The real wall clock.
#[derive(Debug, Clone, Copy, Default)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> DateTime<Utc> {
        Utc::now()
    }
}

/// A manually advanceable clock, for exercising expiry scenarios (S5 in the
/// end-to-end test matrix: a `TEMPORARY` grant must be gone 5 minutes and one
/// second after issuance).
#[derive(Debug)]
pub struct TestClock {
    epoch_millis: AtomicI64,
}

impl TestClock {
    /// Start the clock at the given instant.
    #[must_use]
    pub fn at(start: DateTime<Utc>) -> Self {
        Self {
            epoch_millis: AtomicI64::new(start.timestamp_millis()),
        }
    }

    /// Start the clock at the real current time.
    #[must_use]
    pub fn now() -> Self {
        Self::at(Utc::now())
    }

    /// Move the clock forward.
    pub fn advance(&self, duration: chrono::Duration) {
        self.epoch_millis
            .fetch_add(duration.num_milliseconds(), Ordering::SeqCst);
    }
}

impl Clock for TestClock {
    fn now(&self) -> DateTime<Utc> {
        let millis = self.epoch_millis.load(Ordering::SeqCst);
        DateTime::from_timestamp_millis(millis).unwrap_or_else(Utc::now)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn system_clock_advances_on_its_own() {
        let clock = SystemClock;
        let a = clock.now();
        let b = clock.now();
        assert!(b >= a);
    }

    #[test]
    fn test_clock_holds_still_until_advanced() {
        let start = Utc::now();
        let clock = TestClock::at(start);
        assert_eq!(clock.now().timestamp_millis(), start.timestamp_millis());
        clock.advance(chrono::Duration::seconds(301));
        assert!(clock.now() > start);
        assert!((clock.now() - start).num_seconds() >= 301);
    }
}
