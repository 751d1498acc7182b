//! Per-point correction math applied to raw receiver values.

#[allow(unused_imports)]
use num_traits::Float;
use vna_dsp::ComplexExt;

use crate::{
    calibration::{Term, Terms},
    Complex,
};

/// Denominators below this magnitude squared leave the value untouched.
const RENORMALIZE_EPSILON: f32 = 1e-9;

fn term(terms: &Terms, term: Term) -> Complex<f32> {
    terms[u8::from(term) as usize]
}

/// One-port error correction of a reflection value.
///
/// `S11a = (S11m - ED) / (ER + ES (S11m - ED))`
pub fn apply_ch0(s11: Complex<f32>, terms: &Terms) -> Complex<f32> {
    let d = s11 - term(terms, Term::Ed);
    let den = term(terms, Term::Er) + term(terms, Term::Es) * d;
    d.div_or(den, 0.0, d)
}

/// Response correction of a transmission value.
///
/// # Args
/// * `s21` - Measured transmission.
/// * `s11` - Corrected reflection of the same point, used only by
///   enhanced response.
/// * `terms` - Error terms at this frequency.
/// * `enhanced` - Also divide out the source match.
pub fn apply_ch1(
    s21: Complex<f32>,
    s11: Complex<f32>,
    terms: &Terms,
    enhanced: bool,
) -> Complex<f32> {
    let mut value = (s21 - term(terms, Term::Ex)) * term(terms, Term::Et);
    if enhanced {
        value *= Complex::new(1.0, 0.0) - term(terms, Term::Es) * s11;
    }
    value
}

/// Remove (or add, for negative delays) the phase rotation of a line with
/// `delay` seconds of electrical length at `frequency` Hz.
pub fn apply_edelay(value: Complex<f32>, delay: f32, frequency: u32) -> Complex<f32> {
    value.rotate_turns(delay * frequency as f32)
}

/// Linear gain of a dB offset.
pub fn offset_gain(db: f32) -> f32 {
    (db * (core::f32::consts::LN_10 / 20.0)).exp()
}

/// Re-reference `gamma` from `reference` ohms to `port` ohms.
///
/// `Γ' = (Γ - k) / (1 - kΓ)` with `k = (Z - Z0) / (Z + Z0)`.
pub fn renormalize(gamma: Complex<f32>, port: f32, reference: f32) -> Complex<f32> {
    let k = (port - reference) / (port + reference);
    let den = Complex::new(1.0 - gamma.re * k, -gamma.im * k);
    if den.norm_sqr() <= RENORMALIZE_EPSILON {
        return gamma;
    }
    (gamma - k) / den
}
