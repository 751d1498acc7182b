//! Synchronization between the sweep task and the codec buffer interrupt.
//!
//! The sweep task arms a capture with a settle deadline and a buffer count.
//! The interrupt handler is the only writer of the accumulator and, once
//! armed, the only one decrementing the counter.

use core::cell::{Cell, RefCell};
use core::sync::atomic::{AtomicU16, Ordering};

use critical_section::Mutex;
use vna_dsp::Accumulator;

use crate::{
    design_parameters::CAPTURE_TIMEOUT,
    sampler::Sample,
    time::{wait_until, Duration, Instant, Timebase},
    Complex, Error,
};

pub struct Capture {
    ready_at: Mutex<Cell<u64>>,
    remaining: AtomicU16,
    reload: AtomicU16,
    accumulator: Mutex<RefCell<Accumulator>>,
}

impl Default for Capture {
    fn default() -> Self {
        Self::new()
    }
}

impl Capture {
    pub const fn new() -> Self {
        Self {
            ready_at: Mutex::new(Cell::new(0)),
            remaining: AtomicU16::new(0),
            reload: AtomicU16::new(0),
            accumulator: Mutex::new(RefCell::new(Accumulator {
                sample: Complex::new(0.0, 0.0),
                reference: Complex::new(0.0, 0.0),
            })),
        }
    }

    /// Arm a capture.
    ///
    /// # Args
    /// * `now` - Current time.
    /// * `delay` - Settling time before buffers count.
    /// * `bandwidth` - Bandwidth code. `bandwidth + 1` buffers are
    ///   accumulated after one discarded startup buffer.
    pub fn start(&self, now: Instant, delay: Duration, bandwidth: u16) {
        let count = bandwidth.saturating_add(2);
        critical_section::with(|cs| {
            self.ready_at.borrow(cs).set((now + delay).ticks())
        });
        self.reload.store(count, Ordering::Relaxed);
        self.remaining.store(count, Ordering::Release);
    }

    /// Buffer-complete interrupt handler.
    ///
    /// # Args
    /// * `now` - Interrupt timestamp.
    /// * `buffer` - Interleaved `[reference, sample]` pairs.
    pub fn on_buffer(&self, now: Instant, buffer: &[i16]) {
        let remaining = self.remaining.load(Ordering::Acquire);
        if remaining == 0 {
            return;
        }
        let consumed = critical_section::with(|cs| {
            if now.ticks() < self.ready_at.borrow(cs).get() {
                return false;
            }
            let mut accumulator = self.accumulator.borrow_ref_mut(cs);
            if remaining >= self.reload.load(Ordering::Relaxed) {
                // First buffer after arming carries switching transients.
                accumulator.reset();
            } else {
                accumulator.process(buffer);
            }
            true
        });
        if consumed {
            // A concurrent timeout may have zeroed the counter; never wrap it.
            let _ = self.remaining.compare_exchange(
                remaining,
                remaining - 1,
                Ordering::AcqRel,
                Ordering::Relaxed,
            );
        }
    }

    pub fn is_complete(&self) -> bool {
        self.remaining.load(Ordering::Acquire) == 0
    }

    /// Wait for the armed capture to complete.
    ///
    /// On timeout the counter is forced to zero so the interrupt stops
    /// consuming buffers. The accumulator is left untouched.
    pub fn wait<T: Timebase + ?Sized>(&self, timebase: &T) -> Result<(), Error> {
        self.wait_timeout(timebase, CAPTURE_TIMEOUT)
    }

    pub fn wait_timeout<T: Timebase + ?Sized>(
        &self,
        timebase: &T,
        timeout: Duration,
    ) -> Result<(), Error> {
        if wait_until(timebase, timeout, || self.is_complete()) {
            Ok(())
        } else {
            self.remaining.store(0, Ordering::Release);
            log::warn!("Capture timed out");
            Err(Error::HardwareTimeout)
        }
    }

    /// Reduce the accumulated capture.
    pub fn sample(&self, sampler: &impl Sample) -> Complex<f32> {
        critical_section::with(|cs| sampler.sample(&self.accumulator.borrow_ref(cs)))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::{sampler::Sampler, time::testing::SimClock};

    // IF tone: three periods per buffer.
    fn buffer(reference: i16, sample: i16) -> [i16; 96] {
        let mut buf = [0; 96];
        for (i, pair) in buf.chunks_exact_mut(2).enumerate() {
            let c = (core::f32::consts::TAU * 3. * i as f32 / 48.).cos();
            pair[0] = (reference as f32 * c) as i16;
            pair[1] = (sample as f32 * c) as i16;
        }
        buf
    }

    #[test]
    fn respects_deadline_and_drops_first_buffer() {
        let capture = Capture::new();
        let t0 = Instant::from_ticks(1_000);
        capture.start(t0, Duration::micros(100), 1);
        // Before the deadline: ignored.
        capture.on_buffer(t0, &buffer(100, 100));
        assert_eq!(capture.remaining.load(Ordering::Relaxed), 3);
        let t1 = t0 + Duration::micros(100);
        // Startup buffer resets, then two buffers accumulate.
        capture.on_buffer(t1, &buffer(i16::MAX, 1));
        capture.on_buffer(t1, &buffer(100, 50));
        assert!(!capture.is_complete());
        capture.on_buffer(t1, &buffer(100, 50));
        assert!(capture.is_complete());
        // No further buffers are consumed.
        capture.on_buffer(t1, &buffer(1, 1000));
        critical_section::with(|cs| {
            let accu = capture.accumulator.borrow_ref(cs);
            let mut expect = Accumulator::default();
            expect.process(&buffer(100, 50));
            expect.process(&buffer(100, 50));
            assert_eq!(*accu, expect);
        });
    }

    #[test]
    fn timeout_forces_counter_and_keeps_accumulator() {
        let clock = SimClock::new(Duration::millis(1));
        let capture = Capture::new();
        capture.start(clock.now(), Duration::from_ticks(0), 3);
        capture.on_buffer(clock.now(), &buffer(10, 10));
        capture.on_buffer(clock.now(), &buffer(1_000, 700));
        assert_eq!(
            capture.wait_timeout(&clock, Duration::millis(5)),
            Err(Error::HardwareTimeout)
        );
        assert!(capture.is_complete());
        assert_eq!(clock.now(), Instant::from_ticks(5_000));
        let gamma = capture.sample(&Sampler::Gamma);
        assert!((gamma.re - 0.7).abs() < 1e-3);
        // Late interrupt after the timeout does not wrap the counter.
        capture.on_buffer(clock.now(), &buffer(10, 10));
        assert_eq!(capture.remaining.load(Ordering::Relaxed), 0);
    }
}
