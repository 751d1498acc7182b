//! Run-time settings of the analyzer.
//!
//! # Design
//! Settings form a `miniconf` tree so that the console and the storage layer
//! can get and set individual leaves by path (for example `/sweep/points`).
//! Values taken from the tree are sanitized before they reach the
//! measurement core.

use miniconf::Tree;

use crate::{
    design_parameters::{BANDWIDTH_1000, CAL_LOAD_R, SWEEP_POINTS_MAX, SWEEP_POINTS_MIN},
    frequency::FrequencyPlan,
    processing::{self, smoothing::SMOOTH_FACTOR_MAX, Domain, SmoothMode, TdFunction, TdWindow},
    sampler::Sampler,
    sweep::{Channel, SweepConfig},
};

/// Number of display traces.
pub const TRACES_MAX: usize = 4;

#[derive(Clone, Debug, Tree)]
#[tree(meta(doc, typename))]
pub struct Sweep {
    /// First frequency in Hz.
    pub start: u32,
    /// Last frequency in Hz.
    pub stop: u32,
    /// Number of points.
    pub points: u16,
    /// Bandwidth code.
    ///
    /// Number of additional codec buffers accumulated per point.
    pub bandwidth: u16,
    /// Passes averaged per calibration standard.
    pub averaging: u16,
}

impl Default for Sweep {
    fn default() -> Self {
        Self {
            start: 50_000,
            stop: 900_000_000,
            points: 101,
            bandwidth: BANDWIDTH_1000,
            averaging: 1,
        }
    }
}

#[derive(Clone, Debug, Tree)]
#[tree(meta(doc, typename))]
pub struct Trace {
    /// Whether the trace is shown and its channel measured.
    pub enabled: bool,
    /// Receiver channel the trace displays.
    #[tree(with=miniconf::leaf)]
    pub channel: Channel,
}

#[derive(Clone, Debug, Tree)]
#[tree(meta(doc, typename))]
pub struct Correction {
    /// Electrical delay per channel in seconds.
    pub electrical_delay: [f32; 2],
    /// Transmission gain offset in dB.
    pub s21_offset: f32,
    /// Port impedance the reflection data is renormalized to, in ohms.
    pub port_impedance: f32,
    /// Impedance of the calibration load, in ohms.
    pub reference_impedance: f32,
}

impl Default for Correction {
    fn default() -> Self {
        Self {
            electrical_delay: [0.0; 2],
            s21_offset: 0.0,
            port_impedance: CAL_LOAD_R,
            reference_impedance: CAL_LOAD_R,
        }
    }
}

#[derive(Clone, Debug, Default, Tree)]
#[tree(meta(doc, typename))]
pub struct Processing {
    /// Value reduced from the receiver accumulators at each point.
    #[tree(with=miniconf::leaf)]
    pub sampler: Sampler,
    /// Smoothing strength (0 disables, 1-8).
    pub smooth_factor: u8,
    #[tree(with=miniconf::leaf)]
    pub smooth_mode: SmoothMode,
    #[tree(with=miniconf::leaf)]
    pub domain: Domain,
    /// Time domain function.
    #[tree(with=miniconf::leaf)]
    pub function: TdFunction,
    /// Time domain window.
    #[tree(with=miniconf::leaf)]
    pub window: TdWindow,
}

#[derive(Clone, Debug, Tree)]
#[tree(meta(doc, typename))]
pub struct Settings {
    pub sweep: Sweep,
    pub traces: [Trace; TRACES_MAX],
    pub correction: Correction,
    pub processing: Processing,
}

impl Default for Settings {
    fn default() -> Self {
        let trace = |channel| Trace {
            enabled: true,
            channel,
        };
        Self {
            sweep: Sweep::default(),
            traces: [
                trace(Channel::S11),
                trace(Channel::S21),
                trace(Channel::S11),
                trace(Channel::S21),
            ],
            correction: Correction::default(),
            processing: Processing::default(),
        }
    }
}

impl Settings {
    /// Force every value into its valid range.
    pub fn sanitize(&mut self) {
        let sweep = &mut self.sweep;
        sweep.points = sweep
            .points
            .clamp(SWEEP_POINTS_MIN, SWEEP_POINTS_MAX as u16);
        if sweep.start > sweep.stop {
            core::mem::swap(&mut sweep.start, &mut sweep.stop);
        }
        sweep.averaging = sweep.averaging.max(1);
        self.processing.smooth_factor = self.processing.smooth_factor.min(SMOOTH_FACTOR_MAX);
    }

    pub fn plan(&self) -> FrequencyPlan {
        FrequencyPlan::new(self.sweep.start, self.sweep.stop, self.sweep.points)
    }

    /// Whether any enabled trace displays `channel`.
    pub fn measures(&self, channel: Channel) -> bool {
        self.traces
            .iter()
            .any(|t| t.enabled && t.channel == channel)
    }

    pub fn sweep_config(&self) -> SweepConfig {
        SweepConfig {
            bandwidth: self.sweep.bandwidth,
            electrical_delay: self.correction.electrical_delay,
            s21_offset: self.correction.s21_offset,
            port_impedance: self.correction.port_impedance,
            reference_impedance: self.correction.reference_impedance,
            sampler: self.processing.sampler,
        }
    }

    pub fn processing(&self) -> processing::Options {
        let p = &self.processing;
        processing::Options {
            smooth_factor: p.smooth_factor,
            smooth_mode: p.smooth_mode,
            domain: p.domain,
            function: p.function,
            window: p.window,
        }
    }
}
