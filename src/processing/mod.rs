//! Post-processing of a completed pass.

use serde::{Deserialize, Serialize};

use crate::{snapshot::Measured, sweep::{Channel, SweepMask}};

pub mod smoothing;
pub mod transform;

pub use smoothing::{smooth, SmoothMode};
pub use transform::{TdFunction, TdWindow, TimeDomain};

/// Display domain of the measured data.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Domain {
    #[default]
    Frequency,
    Time,
}

/// Processing options applied after every completed pass.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq)]
pub struct Options {
    pub smooth_factor: u8,
    pub smooth_mode: SmoothMode,
    pub domain: Domain,
    pub function: TdFunction,
    pub window: TdWindow,
}

/// Smooth and, in the time domain, transform every channel `mask` measures.
///
/// # Args
/// * `measured` - Pass results, modified in place.
/// * `points` - Valid points per channel.
pub fn process<const N: usize>(
    time_domain: &mut TimeDomain,
    options: &Options,
    measured: &mut Measured<N>,
    points: u16,
    mask: SweepMask,
) {
    let points = (points as usize).min(N);
    for channel in [Channel::S11, Channel::S21] {
        if !mask.measures(channel) {
            continue;
        }
        let data = &mut measured[channel.index()];
        smooth(&mut data[..points], options.smooth_factor, options.smooth_mode);
        if options.domain == Domain::Time {
            time_domain.transform(data, points, options.function, options.window);
        }
    }
}
