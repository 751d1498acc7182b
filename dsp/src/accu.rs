use num_complex::Complex;
use num_traits::Zero;

include!(concat!(env!("OUT_DIR"), "/mixer_table.rs"));

/// Quadrature accumulator for the interleaved `[reference, sample]` audio stream.
///
/// Both channels are mixed against the same IF table and summed until reset.
/// The real part of each accumulated phasor is the cosine product, the
/// imaginary part the sine product.
#[derive(Copy, Clone, Default, Debug, PartialEq)]
pub struct Accumulator {
    pub sample: Complex<f32>,
    pub reference: Complex<f32>,
}

impl Accumulator {
    pub fn reset(&mut self) {
        *self = Self::default();
    }

    /// Mix one buffer into the accumulator.
    ///
    /// # Args
    /// * `buffer` - Interleaved `[reference, sample]` pairs. Pairs beyond
    ///   [MIXER_LEN] are ignored.
    pub fn process(&mut self, buffer: &[i16]) {
        for (pair, &(sin, cos)) in buffer.chunks_exact(2).zip(MIXER.iter()) {
            let reference = pair[0] as f32;
            let sample = pair[1] as f32;
            self.sample.re += sample * cos;
            self.sample.im += sample * sin;
            self.reference.re += reference * cos;
            self.reference.im += reference * sin;
        }
    }

    /// Complex ratio of the sample phasor to the reference phasor.
    ///
    /// # Returns
    /// Zero if the reference did not register any signal.
    pub fn gamma(&self) -> Complex<f32> {
        if self.reference.norm_sqr() == 0.0 {
            return Complex::zero();
        }
        self.sample / self.reference
    }

    /// Scaled sample amplitude as `(sine, cosine)` sums.
    pub fn amplitude(&self) -> Complex<f32> {
        Complex::new(self.sample.im, self.sample.re) * 1e-9
    }

    /// Scaled reference amplitude as `(sine, cosine)` sums.
    pub fn reference_amplitude(&self) -> Complex<f32> {
        Complex::new(self.reference.im, self.reference.re) * 1e-9
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::complex_isclose;

    fn tone(amplitude: [f32; 2], phase: [f32; 2]) -> [i16; 2 * MIXER_LEN] {
        let mut buffer = [0i16; 2 * MIXER_LEN];
        for (i, pair) in buffer.chunks_exact_mut(2).enumerate() {
            let arg = 2. * core::f32::consts::PI * 3. * i as f32
                / MIXER_LEN as f32;
            pair[0] = (amplitude[0] * (arg + phase[0]).cos()) as i16;
            pair[1] = (amplitude[1] * (arg + phase[1]).cos()) as i16;
        }
        buffer
    }

    #[test]
    fn gamma_is_ratio_of_phasors() {
        let mut accu = Accumulator::default();
        accu.process(&tone([10_000., 5_000.], [0., 0.]));
        let gamma = accu.gamma();
        assert!(complex_isclose(gamma, Complex::new(0.5, 0.0), 1e-3, 1e-3));
    }

    #[test]
    fn gamma_tracks_phase_shift() {
        let mut accu = Accumulator::default();
        let shift = core::f32::consts::FRAC_PI_2;
        accu.process(&tone([8_000., 8_000.], [0., shift]));
        // A leading cosine shows up as a negative sine product.
        let gamma = accu.gamma();
        assert!(complex_isclose(gamma, Complex::new(0.0, -1.0), 1e-3, 2e-3));
    }

    #[test]
    fn silent_reference_yields_zero() {
        let accu = Accumulator {
            sample: Complex::new(1.0, 1.0),
            reference: Complex::zero(),
        };
        assert_eq!(accu.gamma(), Complex::zero());
    }

    #[test]
    fn reset_clears_everything() {
        let mut accu = Accumulator::default();
        accu.process(&tone([1_000., 1_000.], [0., 0.]));
        assert_ne!(accu, Accumulator::default());
        accu.reset();
        assert_eq!(accu, Accumulator::default());
    }

    #[test]
    fn amplitude_swaps_and_scales() {
        let accu = Accumulator {
            sample: Complex::new(2e9, 1e9),
            reference: Complex::new(4e9, 3e9),
        };
        assert!(complex_isclose(
            accu.amplitude(),
            Complex::new(1.0, 2.0),
            1e-6,
            0.
        ));
        assert!(complex_isclose(
            accu.reference_amplitude(),
            Complex::new(3.0, 4.0),
            1e-6,
            0.
        ));
    }
}
