#[allow(unused_imports)]
use num_traits::Float;
use serde::{Deserialize, Serialize};

use crate::Complex;

/// Largest accepted smoothing factor.
pub const SMOOTH_FACTOR_MAX: u8 = 8;

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum SmoothMode {
    /// `(v0 + 2 v1 + v2) / 4`
    #[default]
    Arithmetic,
    /// Cube root of `|v0 v1 v2|`, signed like `v0 + v1 + v2`.
    Geometric,
}

impl SmoothMode {
    fn mean(self, v0: f32, v1: f32, v2: f32) -> f32 {
        match self {
            SmoothMode::Arithmetic => (v0 + 2.0 * v1 + v2) * 0.25,
            SmoothMode::Geometric => {
                let v = (v0 * v1 * v2).abs().cbrt();
                if v0 + v1 + v2 < 0.0 {
                    -v
                } else {
                    v
                }
            }
        }
    }
}

/// Three-point smoothing over the interior of `data`.
///
/// `factor` selects `2^(factor-1)` passes, limited to `len - 2`. Zero
/// disables smoothing. Real and imaginary parts are filtered independently
/// and the end points are never modified.
pub fn smooth(data: &mut [Complex<f32>], factor: u8, mode: SmoothMode) {
    if factor == 0 || data.len() <= 2 {
        return;
    }
    let factor = factor.min(SMOOTH_FACTOR_MAX);
    let passes = (1usize << (factor - 1)).min(data.len() - 2);
    for _ in 0..passes {
        let mut prev = data[0];
        for j in 1..data.len() - 1 {
            let old = data[j];
            let next = data[j + 1];
            data[j] = Complex::new(
                mode.mean(prev.re, old.re, next.re),
                mode.mean(prev.im, old.im, next.im),
            );
            prev = old;
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use vna_dsp::testing::complex_allclose;

    fn real(values: &[f32]) -> std::vec::Vec<Complex<f32>> {
        values.iter().map(|v| Complex::new(*v, -*v)).collect()
    }

    #[test]
    fn disabled_and_short() {
        let mut data = real(&[1., 5., 1.]);
        smooth(&mut data, 0, SmoothMode::Arithmetic);
        assert_eq!(data, real(&[1., 5., 1.]));
        let mut data = real(&[1., 5.]);
        smooth(&mut data, 3, SmoothMode::Arithmetic);
        assert_eq!(data, real(&[1., 5.]));
    }

    #[test]
    fn arithmetic_single_pass() {
        let mut data = real(&[0., 4., 0., 4., 0.]);
        smooth(&mut data, 1, SmoothMode::Arithmetic);
        // Each output uses the unsmoothed left neighbour.
        assert!(complex_allclose(&data, &real(&[0., 2., 2., 2., 0.]), 1e-6, 0.));
    }

    #[test]
    fn pass_count_limited_by_length() {
        let mut a = real(&[0., 4., 0., 4., 0.]);
        // 2^7 passes requested, only 3 possible.
        smooth(&mut a, 8, SmoothMode::Arithmetic);
        let mut c = real(&[0., 4., 0., 4., 0.]);
        for _ in 0..3 {
            smooth(&mut c, 1, SmoothMode::Arithmetic);
        }
        assert!(complex_allclose(&a, &c, 1e-6, 0.));
    }

    #[test]
    fn geometric_keeps_sign() {
        let mut data = real(&[-1., -8., -1.]);
        smooth(&mut data, 1, SmoothMode::Geometric);
        assert!(complex_allclose(&data, &real(&[-1., -2., -1.]), 1e-5, 0.));
    }
}
