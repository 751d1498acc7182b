//! Reduction of the accumulated capture to one complex value per point.

use serde::{Deserialize, Serialize};
use vna_dsp::Accumulator;

use crate::Complex;

pub trait Sample {
    fn sample(&self, accumulator: &Accumulator) -> Complex<f32>;
}

/// Sample-to-reference ratio; the normal measurement.
#[derive(Copy, Clone, Debug, Default)]
pub struct Gamma;

/// Scaled sample channel amplitude.
#[derive(Copy, Clone, Debug, Default)]
pub struct Amplitude;

/// Scaled reference channel amplitude.
#[derive(Copy, Clone, Debug, Default)]
pub struct ReferenceAmplitude;

impl Sample for Gamma {
    fn sample(&self, accumulator: &Accumulator) -> Complex<f32> {
        accumulator.gamma()
    }
}

impl Sample for Amplitude {
    fn sample(&self, accumulator: &Accumulator) -> Complex<f32> {
        accumulator.amplitude()
    }
}

impl Sample for ReferenceAmplitude {
    fn sample(&self, accumulator: &Accumulator) -> Complex<f32> {
        accumulator.reference_amplitude()
    }
}

/// Runtime-selectable sampler.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Sampler {
    #[default]
    Gamma,
    Amplitude,
    ReferenceAmplitude,
}

impl Sample for Sampler {
    fn sample(&self, accumulator: &Accumulator) -> Complex<f32> {
        match self {
            Self::Gamma => Gamma.sample(accumulator),
            Self::Amplitude => Amplitude.sample(accumulator),
            Self::ReferenceAmplitude => ReferenceAmplitude.sample(accumulator),
        }
    }
}
