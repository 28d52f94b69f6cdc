//! Clock

use std::fmt;

use jiff::{SignedDuration, Timestamp};
use parking_lot::Mutex;

/// Source of the current time. Every TTL and promotion window check reads
/// the time through this, so tests can pin it.
pub trait Clock: Send + Sync + fmt::Debug {
    fn now(&self) -> Timestamp;
}

#[derive(Debug, Default, Clone, Copy)]
pub struct SystemClock;

impl Clock for SystemClock {
    fn now(&self) -> Timestamp {
        Timestamp::now()
    }
}

/// Clock that only moves when told to.
#[derive(Debug)]
pub struct ManualClock {
    now: Mutex<Timestamp>,
}

impl ManualClock {
    #[must_use]
    pub fn new(start: Timestamp) -> Self {
        Self {
            now: Mutex::new(start),
        }
    }

    /// Move forward by `duration`. Saturates at the end of representable time.
    pub fn advance(&self, duration: SignedDuration) {
        let mut now = self.now.lock();

        *now = now.checked_add(duration).unwrap_or(Timestamp::MAX);
    }

    pub fn set(&self, at: Timestamp) {
        *self.now.lock() = at;
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Timestamp {
        *self.now.lock()
    }
}

#[cfg(test)]
mod tests {
    use testresult::TestResult;

    use super::*;

    #[test]
    fn manual_clock_only_moves_when_advanced() -> TestResult {
        let start = Timestamp::from_second(1_760_000_000)?;
        let clock = ManualClock::new(start);

        assert_eq!(clock.now(), start);

        clock.advance(SignedDuration::from_mins(31));

        assert_eq!(clock.now(), start.checked_add(SignedDuration::from_mins(31))?);

        clock.set(start);

        assert_eq!(clock.now(), start);

        Ok(())
    }
}
