use super::{Calibration, Terms};
use crate::hardware::HarmonicBands;

impl<const N: usize> Calibration<N> {
    /// Error terms at `frequency`.
    ///
    /// # Args
    /// * `index` - Calibration plan index when the sweep runs on the
    ///   calibration plan itself. `None` interpolates.
    /// * `frequency` - Query frequency in Hz.
    /// * `bands` - Harmonic band oracle of the signal source.
    ///
    /// # Returns
    /// Terms copied from the nearest stored point outside the calibrated span
    /// or on an exact point, otherwise linearly interpolated. A bracket that
    /// straddles a harmonic band boundary is shifted by one point into the
    /// query frequency's band and extrapolated.
    pub fn interpolate(
        &self,
        index: Option<usize>,
        frequency: u32,
        bands: &(impl HarmonicBands + ?Sized),
    ) -> Terms {
        if let Some(index) = index {
            return self.terms_at(index);
        }
        let plan = &self.plan;
        let last = plan.points().saturating_sub(1);
        if last == 0 || frequency <= plan.start() {
            return self.terms_at(0);
        }
        if frequency >= plan.stop() {
            return self.terms_at(last as usize);
        }

        let span = (plan.stop() - plan.start()) as u64;
        let mut idx = ((frequency - plan.start()) as u64 * last as u64 / span) as u16;
        let f0 = plan.get(idx);
        let f1 = plan.get(idx + 1);
        if frequency == f0 {
            return self.terms_at(idx as usize);
        }
        let delta = f1 - f0;
        let mut k = if delta == 0 {
            0.0
        } else {
            (frequency - f0) as f32 / delta as f32
        };

        let band = bands.harmonic_band(f0);
        if band != bands.harmonic_band(f1) {
            if band == bands.harmonic_band(frequency) {
                // Extrapolate from the two points below.
                if idx == 0 {
                    return self.terms_at(0);
                }
                idx -= 1;
                k += 1.0;
            } else {
                // Extrapolate from the two points above.
                if idx + 1 >= last {
                    return self.terms_at(last as usize);
                }
                idx += 1;
                k -= 1.0;
            }
        }

        let (lo, hi) = (self.terms_at(idx as usize), self.terms_at(idx as usize + 1));
        core::array::from_fn(|t| lo[t] + (hi[t] - lo[t]) * k)
    }
}
