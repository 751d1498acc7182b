// Power series coefficients 1/(m!)^2 for m = 2..=12.
const BESSEL_I0: [f32; 11] = [
    2.5000000000000000e-01,
    2.7777777777777778e-02,
    1.7361111111111111e-03,
    6.9444444444444444e-05,
    1.9290123456790123e-06,
    3.9367598891408415e-08,
    6.1511873267825649e-10,
    7.5940584281266233e-12,
    7.5940584281266233e-14,
    6.2760813455591928e-16,
    4.3583898233049950e-18,
];

/// Modified Bessel function of the first kind, order zero.
///
/// # Args
/// * `z` - The squared half argument, `(x/2)^2`.
pub fn bessel_i0(z: f32) -> f32 {
    let mut term = z;
    let mut acc = 1.0 + z;
    for k in BESSEL_I0.iter() {
        term *= z;
        acc += term * k;
    }
    acc
}

/// Unnormalized Kaiser window value.
///
/// # Args
/// * `k` - Sample index in `[0, n)`.
/// * `n` - Window length.
/// * `beta` - Shape parameter. Zero selects a rectangular window.
pub fn kaiser(k: u32, n: u32, beta: u16) -> f32 {
    if beta == 0 || n < 2 {
        return 1.0;
    }
    let n = (n - 1) as f32;
    let k = k as f32;
    let beta = beta as f32;
    bessel_i0(k * (n - k) * beta * beta / (n * n))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::isclose;

    #[test]
    fn bessel_reference_values() {
        assert_eq!(bessel_i0(0.0), 1.0);
        // I0(2) = 2.2795853
        assert!(isclose(bessel_i0(1.0), 2.279_585_3, 1e-6, 0.));
        // I0(6) = 67.234407
        assert!(isclose(bessel_i0(9.0), 67.234_41, 1e-5, 0.));
    }

    #[test]
    fn kaiser_is_symmetric_and_peaks_in_center() {
        let n = 21;
        for k in 0..n {
            assert_eq!(kaiser(k, n, 6), kaiser(n - 1 - k, n, 6));
        }
        assert_eq!(kaiser(0, n, 6), 1.0);
        assert!(isclose(kaiser(10, n, 6), bessel_i0(9.0), 1e-6, 0.));
        assert!(kaiser(10, n, 6) > kaiser(9, n, 6));
    }

    #[test]
    fn rectangular() {
        assert!((0..8).all(|k| kaiser(k, 8, 0) == 1.0));
    }
}
