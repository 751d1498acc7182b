//! Time base shared by the capture path and every bounded wait.

/// Microsecond instant.
pub type Instant = fugit::TimerInstantU64<1_000_000>;

/// Microsecond duration.
pub type Duration = fugit::TimerDurationU64<1_000_000>;

/// Monotonic clock plus the low-power wait used while polling.
pub trait Timebase {
    fn now(&self) -> Instant;

    /// Give up the core until the next interrupt or scheduler tick.
    ///
    /// # Note
    /// On target this is `wfi` or a cooperative yield. It must never spin at
    /// full speed.
    fn relax(&self);
}

/// Poll `ready` until it holds or `timeout` elapses.
///
/// # Returns
/// Whether the condition was observed. Failure is only reported after the
/// full timeout has passed, never on the first poll.
pub fn wait_until<T: Timebase + ?Sized>(
    timebase: &T,
    timeout: Duration,
    mut ready: impl FnMut() -> bool,
) -> bool {
    let start = timebase.now();
    loop {
        if ready() {
            return true;
        }
        if timebase.now() - start >= timeout {
            return false;
        }
        timebase.relax();
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use super::*;
    use core::cell::Cell;

    /// Simulated clock that advances by a fixed tick on every `relax()`.
    pub struct SimClock {
        now: Cell<u64>,
        tick: u64,
    }

    impl SimClock {
        pub fn new(tick: Duration) -> Self {
            Self {
                now: Cell::new(0),
                tick: tick.ticks(),
            }
        }

        pub fn advance(&self, by: Duration) {
            self.now.set(self.now.get() + by.ticks());
        }
    }

    impl Timebase for SimClock {
        fn now(&self) -> Instant {
            Instant::from_ticks(self.now.get())
        }

        fn relax(&self) {
            self.advance(Duration::from_ticks(self.tick));
        }
    }
}

#[cfg(test)]
mod tests {
    use super::testing::SimClock;
    use super::*;

    #[test]
    fn ready_immediately() {
        let clock = SimClock::new(Duration::millis(1));
        assert!(wait_until(&clock, Duration::millis(10), || true));
        assert_eq!(clock.now(), Instant::from_ticks(0));
    }

    #[test]
    fn times_out_after_full_interval() {
        let clock = SimClock::new(Duration::millis(1));
        assert!(!wait_until(&clock, Duration::millis(10), || false));
        assert_eq!(clock.now() - Instant::from_ticks(0), Duration::millis(10));
    }

    #[test]
    fn observes_late_condition() {
        let clock = SimClock::new(Duration::millis(1));
        let mut polls = 0;
        assert!(wait_until(&clock, Duration::millis(10), || {
            polls += 1;
            polls == 4
        }));
        assert_eq!(clock.now(), Instant::from_ticks(3_000));
    }
}
