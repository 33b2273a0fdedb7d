//! Monotonic time source used to pace sampling.

use std::cell::Cell;
use std::time::{Duration, Instant};

/// Monotonic clock measured from an arbitrary origin.
pub trait Clock {
    /// Time elapsed since the clock's origin.
    fn now(&self) -> Duration;

    /// Suspend until `now() >= deadline`. Returns immediately when the
    /// deadline has already passed.
    fn sleep_until(&self, deadline: Duration);
}

impl<K: Clock + ?Sized> Clock for &K {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep_until(&self, deadline: Duration) {
        (**self).sleep_until(deadline)
    }
}

impl<K: Clock + ?Sized> Clock for Box<K> {
    fn now(&self) -> Duration {
        (**self).now()
    }

    fn sleep_until(&self, deadline: Duration) {
        (**self).sleep_until(deadline)
    }
}

/// Wall clock backed by `Instant`; sleeps through the scheduler.
#[derive(Debug, Clone, Copy)]
pub struct SystemClock {
    origin: Instant,
}

impl SystemClock {
    pub fn new() -> Self {
        Self {
            origin: Instant::now(),
        }
    }
}

impl Default for SystemClock {
    fn default() -> Self {
        Self::new()
    }
}

impl Clock for SystemClock {
    fn now(&self) -> Duration {
        self.origin.elapsed()
    }

    fn sleep_until(&self, deadline: Duration) {
        let now = self.now();
        if deadline > now {
            std::thread::sleep(deadline - now);
        }
    }
}

/// Virtual clock: time only moves through `advance` and `sleep_until`.
///
/// Used for replays and for checking pacing without waiting in real time.
#[derive(Debug, Default)]
pub struct ManualClock {
    now: Cell<Duration>,
    slept: Cell<Duration>,
}

impl ManualClock {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn advance(&self, by: Duration) {
        self.now.set(self.now.get() + by);
    }

    /// Total time spent inside `sleep_until`
    pub fn slept(&self) -> Duration {
        self.slept.get()
    }
}

impl Clock for ManualClock {
    fn now(&self) -> Duration {
        self.now.get()
    }

    fn sleep_until(&self, deadline: Duration) {
        let now = self.now.get();
        if deadline > now {
            self.slept.set(self.slept.get() + (deadline - now));
            self.now.set(deadline);
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn manual_clock_sleeps_forward_only() {
        let clock = ManualClock::new();
        clock.advance(Duration::from_millis(5));
        clock.sleep_until(Duration::from_millis(20));
        assert_eq!(clock.now(), Duration::from_millis(20));
        assert_eq!(clock.slept(), Duration::from_millis(15));

        clock.sleep_until(Duration::from_millis(10));
        assert_eq!(clock.now(), Duration::from_millis(20));
        assert_eq!(clock.slept(), Duration::from_millis(15));
    }

    #[test]
    fn system_clock_waits_out_deadline() {
        let clock = SystemClock::new();
        let deadline = clock.now() + Duration::from_millis(15);
        clock.sleep_until(deadline);
        assert!(clock.now() >= deadline);
    }
}
