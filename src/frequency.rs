use serde::{Deserialize, Serialize};

/// Integer sweep frequency plan.
///
/// Point frequencies are `start + step·i` plus a carried share of the
/// division remainder, so the last point lands exactly on `stop` and two
/// evaluations of the same plan always agree.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct FrequencyPlan {
    start: u32,
    stop: u32,
    points: u16,
    step: u32,
    remainder: u32,
}

impl FrequencyPlan {
    /// # Args
    /// * `start` - First frequency in Hz.
    /// * `stop` - Last frequency in Hz. Must not be below `start`.
    /// * `points` - Number of points in the sweep.
    pub fn new(start: u32, stop: u32, points: u16) -> Self {
        let mut plan = Self::default();
        plan.set(start, stop, points);
        plan
    }

    /// Rebuild the plan.
    ///
    /// # Note
    /// The plan does not reorder its bounds; an inverted range collapses to
    /// `start` for every point.
    pub fn set(&mut self, start: u32, stop: u32, points: u16) {
        debug_assert!(start <= stop);
        let span = stop.saturating_sub(start);
        let intervals = intervals(points);
        *self = Self {
            start,
            stop,
            points,
            step: if intervals == 0 { 1 } else { span / intervals },
            remainder: if intervals == 0 { 0 } else { span % intervals },
        };
    }

    /// Frequency of point `index`.
    pub fn get(&self, index: u16) -> u32 {
        debug_assert!(index < self.points.max(1));
        let intervals = intervals(self.points) as u64;
        if intervals == 0 {
            return self.start;
        }
        let i = index as u64;
        let carry = (intervals / 2 + self.remainder as u64 * i) / intervals;
        (self.start as u64 + self.step as u64 * i + carry) as u32
    }

    /// Nominal frequency increment between points.
    pub fn step(&self) -> u32 {
        self.step
    }

    pub fn start(&self) -> u32 {
        self.start
    }

    pub fn stop(&self) -> u32 {
        self.stop
    }

    pub fn points(&self) -> u16 {
        self.points
    }

    /// Whether this plan describes the given range and point count.
    pub fn matches(&self, start: u32, stop: u32, points: u16) -> bool {
        self.start == start && self.stop == stop && self.points == points
    }

    pub fn iter(&self) -> impl Iterator<Item = u32> + '_ {
        (0..self.points).map(|i| self.get(i))
    }
}

fn intervals(points: u16) -> u32 {
    points.saturating_sub(1) as u32
}
