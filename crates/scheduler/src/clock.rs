//! Time sources for the two schedulers.

use std::sync::atomic::{AtomicI64, Ordering};
use std::time::Instant;

/// A monotonic clock in the scheduler's own time unit.
pub trait Clock: Send + Sync {
    fn now(&self) -> i64;
}

/// Counts host simulation steps. Advanced once per tick.
#[derive(Debug, Default)]
pub struct TickCounter {
    ticks: AtomicI64,
}

impl TickCounter {
    pub fn new() -> Self {
        Self::default()
    }

    /// Advance by one tick and return the new value.
    pub fn advance(&self) -> i64 {
        self.ticks.fetch_add(1, Ordering::AcqRel) + 1
    }
}

impl Clock for TickCounter {
    fn now(&self) -> i64 {
        self.ticks.load(Ordering::Acquire)
    }
}

/// Milliseconds elapsed since the clock was created.
#[derive(Debug)]
pub struct MonotonicClock {
    epoch: Instant,
}

impl MonotonicClock {
    pub fn new() -> Self {
        Self {
            epoch: Instant::now(),
        }
    }
}

impl Default for MonotonicClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for MonotonicClock {
    fn now(&self) -> i64 {
        i64::try_from(self.epoch.elapsed().as_millis()).unwrap_or(i64::MAX)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn tick_counter_advances_by_one() {
        let clock = TickCounter::new();
        assert_eq!(clock.now(), 0);
        assert_eq!(clock.advance(), 1);
        assert_eq!(clock.advance(), 2);
        assert_eq!(clock.now(), 2);
    }

    #[test]
    fn monotonic_clock_never_goes_backwards() {
        let clock = MonotonicClock::new();
        let first = clock.now();
        std::thread::sleep(std::time::Duration::from_millis(5));
        let second = clock.now();
        assert!(second >= first + 5);
    }
}
