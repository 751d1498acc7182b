//! Measurement buffers shared between the sweep task and readers.
//!
//! Access is arbitrated by a single role word: idle, sweeping (the producer
//! holds a [MeasurementGuard]) or copying (one reader holds a [Snapshot]).
//! Both guards are only obtainable through a compare-and-swap from idle, so
//! the producer never writes while a reader copies and vice versa.

use core::cell::UnsafeCell;
use core::sync::atomic::{AtomicU16, AtomicU32, AtomicU8, Ordering};

use num_enum::{IntoPrimitive, TryFromPrimitive};

use crate::{
    design_parameters::{
        COPY_RELEASE_TIMEOUT, GENERATION_TIMEOUT, SNAPSHOT_ACQUIRE_TIMEOUT,
    },
    sweep::Channel,
    time::{wait_until, Duration, Timebase},
    Complex, Error,
};

#[derive(Copy, Clone, Debug, PartialEq, Eq, IntoPrimitive, TryFromPrimitive)]
#[repr(u8)]
enum Role {
    Idle = 0,
    Sweeping = 1,
    Copying = 2,
}

/// Per-channel measurement buffer.
pub type Measured<const N: usize> = [[Complex<f32>; N]; 2];

pub struct SweepBuffers<const N: usize> {
    role: AtomicU8,
    generation: AtomicU32,
    points: AtomicU16,
    measured: UnsafeCell<Measured<N>>,
}

// Note(unsafe): `measured` is only reachable through a guard, and guards are
// handed out by the role compare-and-swap, one at a time.
unsafe impl<const N: usize> Sync for SweepBuffers<N> {}

impl<const N: usize> Default for SweepBuffers<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> SweepBuffers<N> {
    pub const fn new() -> Self {
        Self {
            role: AtomicU8::new(Role::Idle as u8),
            generation: AtomicU32::new(0),
            points: AtomicU16::new(0),
            measured: UnsafeCell::new([[Complex::new(0.0, 0.0); N]; 2]),
        }
    }

    fn role(&self) -> Role {
        // Only valid discriminants are ever stored.
        Role::try_from(self.role.load(Ordering::Acquire)).unwrap_or(Role::Idle)
    }

    fn claim(&self, role: Role) -> bool {
        self.role
            .compare_exchange(
                Role::Idle.into(),
                role.into(),
                Ordering::Acquire,
                Ordering::Relaxed,
            )
            .is_ok()
    }

    fn unclaim(&self) {
        self.role.store(Role::Idle.into(), Ordering::Release);
    }

    /// Number of fully completed passes.
    pub fn generation(&self) -> u32 {
        self.generation.load(Ordering::Acquire)
    }

    /// Point count published by the last pass.
    pub fn points(&self) -> u16 {
        self.points.load(Ordering::Relaxed)
    }

    pub fn sweep_in_progress(&self) -> bool {
        self.role() == Role::Sweeping
    }

    pub fn copy_in_progress(&self) -> bool {
        self.role() == Role::Copying
    }

    /// Block briefly until any in-flight reader copy has finished.
    pub fn wait_for_copy_release<T: Timebase + ?Sized>(
        &self,
        timebase: &T,
    ) -> Result<(), Error> {
        if wait_until(timebase, COPY_RELEASE_TIMEOUT, || !self.copy_in_progress())
        {
            Ok(())
        } else {
            Err(Error::ResourceBusy)
        }
    }

    /// Claim the producer role.
    pub fn begin_measurement(&self) -> Result<MeasurementGuard<'_, N>, Error> {
        if self.claim(Role::Sweeping) {
            Ok(MeasurementGuard { buffers: self })
        } else {
            Err(Error::ResourceBusy)
        }
    }

    /// Obtain a read-only view of one channel.
    ///
    /// Spins, relaxing between attempts, until neither a pass nor another
    /// copy is in progress.
    pub fn acquire<T: Timebase + ?Sized>(
        &self,
        channel: Channel,
        timebase: &T,
    ) -> Result<Snapshot<'_, N>, Error> {
        self.acquire_timeout(channel, timebase, SNAPSHOT_ACQUIRE_TIMEOUT)
    }

    pub fn acquire_timeout<T: Timebase + ?Sized>(
        &self,
        channel: Channel,
        timebase: &T,
        timeout: Duration,
    ) -> Result<Snapshot<'_, N>, Error> {
        if !wait_until(timebase, timeout, || self.claim(Role::Copying)) {
            log::warn!("Snapshot of {:?} timed out", channel);
            return Err(Error::ResourceBusy);
        }
        Ok(Snapshot {
            buffers: self,
            channel,
            generation: self.generation(),
            points: self.points.load(Ordering::Relaxed),
        })
    }

    /// Wait for the first completed pass after start-up.
    pub fn wait_for_generation<T: Timebase + ?Sized>(
        &self,
        timebase: &T,
    ) -> Result<u32, Error> {
        if wait_until(timebase, GENERATION_TIMEOUT, || self.generation() != 0) {
            Ok(self.generation())
        } else {
            Err(Error::ResourceBusy)
        }
    }
}

/// Exclusive write access for one pass. Dropping it ends the measurement.
pub struct MeasurementGuard<'a, const N: usize> {
    buffers: &'a SweepBuffers<N>,
}

impl<const N: usize> MeasurementGuard<'_, N> {
    pub fn measured(&self) -> &Measured<N> {
        // Note(unsafe): The sweeping role excludes every other reference.
        unsafe { &*self.buffers.measured.get() }
    }

    pub fn measured_mut(&mut self) -> &mut Measured<N> {
        // Note(unsafe): The sweeping role excludes every other reference and
        // this guard is borrowed mutably.
        unsafe { &mut *self.buffers.measured.get() }
    }

    /// Publish the point count readers will see.
    pub fn set_points(&mut self, points: u16) {
        self.buffers.points.store(points, Ordering::Relaxed);
    }

    /// End the measurement and, if the pass completed, advance the
    /// generation.
    pub fn end(self, completed: bool) {
        let buffers = self.buffers;
        drop(self);
        if completed {
            buffers.generation.fetch_add(1, Ordering::AcqRel);
        }
    }
}

impl<const N: usize> Drop for MeasurementGuard<'_, N> {
    fn drop(&mut self) {
        self.buffers.unclaim();
    }
}

/// Read-only, generation-tagged view of one channel.
pub struct Snapshot<'a, const N: usize> {
    buffers: &'a SweepBuffers<N>,
    channel: Channel,
    generation: u32,
    points: u16,
}

impl<const N: usize> Snapshot<'_, N> {
    pub fn channel(&self) -> Channel {
        self.channel
    }

    pub fn generation(&self) -> u32 {
        self.generation
    }

    pub fn points(&self) -> u16 {
        self.points
    }

    pub fn data(&self) -> &[Complex<f32>] {
        // Note(unsafe): The copying role excludes the producer.
        let measured = unsafe { &*self.buffers.measured.get() };
        &measured[self.channel.index()][..(self.points as usize).min(N)]
    }

    /// Give the token back.
    ///
    /// # Returns
    /// Whether no pass completed since acquisition. A `false` result means
    /// the copy must be redone.
    pub fn release(self) -> bool {
        self.buffers.generation() == self.generation
    }
}

impl<const N: usize> Drop for Snapshot<'_, N> {
    fn drop(&mut self) {
        self.buffers.unclaim();
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::time::{testing::SimClock, Instant};

    #[test]
    fn acquire_times_out_while_sweeping() {
        let clock = SimClock::new(Duration::millis(1));
        let buffers = SweepBuffers::<4>::new();
        let guard = buffers.begin_measurement().unwrap();
        assert!(buffers.sweep_in_progress());
        let result = buffers.acquire(Channel::S11, &clock);
        assert!(matches!(result, Err(Error::ResourceBusy)));
        assert_eq!(clock.now(), Instant::from_ticks(0) + SNAPSHOT_ACQUIRE_TIMEOUT);
        assert!(buffers.sweep_in_progress());
        drop(guard);
        assert!(buffers.acquire(Channel::S11, &clock).is_ok());
    }

    #[test]
    fn roles_are_exclusive() {
        let clock = SimClock::new(Duration::millis(1));
        let buffers = SweepBuffers::<4>::new();
        let snapshot = buffers.acquire(Channel::S21, &clock).unwrap();
        assert!(buffers.copy_in_progress());
        assert!(matches!(buffers.begin_measurement(), Err(Error::ResourceBusy)));
        assert!(matches!(
            buffers.acquire_timeout(Channel::S11, &clock, Duration::millis(3)),
            Err(Error::ResourceBusy)
        ));
        assert_eq!(
            buffers.wait_for_copy_release(&clock),
            Err(Error::ResourceBusy)
        );
        assert!(snapshot.release());
        assert!(!buffers.copy_in_progress());
        assert!(buffers.wait_for_copy_release(&clock).is_ok());
        assert!(buffers.begin_measurement().is_ok());
    }

    #[test]
    fn generation_counts_completed_passes_only() {
        let clock = SimClock::new(Duration::millis(1));
        let buffers = SweepBuffers::<4>::new();
        assert_eq!(buffers.wait_for_generation(&clock), Err(Error::ResourceBusy));

        let mut guard = buffers.begin_measurement().unwrap();
        guard.set_points(3);
        guard.measured_mut()[1][2] = Complex::new(0.5, -0.5);
        guard.end(false);
        assert_eq!(buffers.generation(), 0);
        assert!(!buffers.sweep_in_progress());

        buffers.begin_measurement().unwrap().end(true);
        assert_eq!(buffers.wait_for_generation(&clock), Ok(1));

        let snapshot = buffers.acquire(Channel::S21, &clock).unwrap();
        assert_eq!(snapshot.generation(), 1);
        assert_eq!(snapshot.points(), 3);
        assert_eq!(snapshot.data().len(), 3);
        assert_eq!(snapshot.data()[2], Complex::new(0.5, -0.5));
        assert!(snapshot.release());
    }
}
