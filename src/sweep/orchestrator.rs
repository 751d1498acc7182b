use strum::IntoEnumIterator;

use super::{correction, Channel, Progress, SweepMask};
use crate::{
    calibration::{Calibration, Sweeper, Terms},
    capture::Capture,
    design_parameters::{
        BANDWIDTH_100, BANDWIDTH_1000, CAL_LOAD_R, DELAY_CHANNEL_CHANGE, DELAY_SWEEP_START,
        SWEEP_POINTS_MAX, SWEEP_TIME_SLICE,
    },
    frequency::FrequencyPlan,
    hardware::Frontend,
    sampler::Sampler,
    snapshot::{Measured, SweepBuffers},
    time::Duration,
    Complex, Error,
};

/// Where a pass stands between calls to [Orchestrator::execute].
#[derive(Debug, Copy, Clone, PartialEq, Eq, Default)]
pub enum PassState {
    /// Next call starts from point 0.
    #[default]
    Idle,
    /// Resumable. The value is the next point to measure.
    Stepping(u16),
    /// The last pass measured every point.
    Completed,
    /// The last pass hit a capture timeout.
    Aborted,
}

/// Per-pass measurement parameters.
#[derive(Debug, Copy, Clone, PartialEq)]
pub struct SweepConfig {
    /// Bandwidth code, see [crate::design_parameters::BANDWIDTH_100].
    pub bandwidth: u16,
    /// Electrical delay per channel in seconds.
    pub electrical_delay: [f32; 2],
    /// Transmission gain offset in dB.
    pub s21_offset: f32,
    /// Renormalization impedance in ohms.
    pub port_impedance: f32,
    /// Impedance of the calibration load in ohms.
    pub reference_impedance: f32,
    pub sampler: Sampler,
}

impl Default for SweepConfig {
    fn default() -> Self {
        Self {
            bandwidth: BANDWIDTH_1000,
            electrical_delay: [0.0; 2],
            s21_offset: 0.0,
            port_impedance: CAL_LOAD_R,
            reference_impedance: CAL_LOAD_R,
            sampler: Sampler::Gamma,
        }
    }
}

/// Drives one frequency sweep, point by point, on behalf of the
/// measurement task.
///
/// A breakable pass may return early and is resumed by the next call. The
/// resume point survives between calls; changing the plan resets it.
pub struct Orchestrator<'a, F, const N: usize = SWEEP_POINTS_MAX> {
    frontend: F,
    capture: &'a Capture,
    plan: FrequencyPlan,
    config: SweepConfig,
    state: PassState,
    progress: Progress,
}

impl<'a, F: Frontend, const N: usize> Orchestrator<'a, F, N> {
    /// # Args
    /// * `frontend` - Board surface.
    /// * `capture` - Capture state shared with the codec interrupt.
    /// * `plan` - Initial frequency plan. At most `N` points are measured.
    pub fn new(frontend: F, capture: &'a Capture, plan: FrequencyPlan) -> Self {
        Self {
            frontend,
            capture,
            plan,
            config: SweepConfig::default(),
            state: PassState::Idle,
            progress: Progress::new(),
        }
    }

    pub fn frontend(&self) -> &F {
        &self.frontend
    }

    pub fn frontend_mut(&mut self) -> &mut F {
        &mut self.frontend
    }

    pub fn plan(&self) -> &FrequencyPlan {
        &self.plan
    }

    /// Replace the frequency plan. Any partial pass restarts from point 0.
    pub fn set_plan(&mut self, plan: FrequencyPlan) {
        if plan != self.plan {
            self.plan = plan;
            self.reset_progress();
        }
    }

    pub fn config(&self) -> &SweepConfig {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut SweepConfig {
        &mut self.config
    }

    pub fn set_sampler(&mut self, sampler: Sampler) {
        self.config.sampler = sampler;
    }

    pub fn state(&self) -> PassState {
        self.state
    }

    pub fn progress(&self) -> &Progress {
        &self.progress
    }

    /// Make the next pass start from point 0.
    pub fn reset_progress(&mut self) {
        self.state = PassState::Idle;
    }

    /// Points measured by one pass.
    pub fn points(&self) -> u16 {
        self.plan.points().min(N as u16)
    }

    fn next_point(&self) -> u16 {
        match self.state {
            PassState::Stepping(point) => point,
            PassState::Completed => self.points(),
            PassState::Idle | PassState::Aborted => 0,
        }
    }

    /// Run (or resume) a measurement pass.
    ///
    /// # Args
    /// * `measured` - Result storage, written at the measured points only.
    /// * `calibration` - Error terms used when `mask` applies calibration.
    /// * `break_on_operation` - Yield to pending UI input and to the time
    ///   slice. A non-breakable pass always restarts from point 0 and runs
    ///   to the end.
    /// * `mask` - Channels and corrections for this pass.
    ///
    /// # Returns
    /// `Ok(true)` once every point of the plan has been measured, `Ok(false)`
    /// when the pass yielded (or had nothing to do) and `Err` when a capture
    /// timed out. After an error the next pass starts from point 0.
    pub fn execute(
        &mut self,
        measured: &mut Measured<N>,
        calibration: Option<&Calibration<N>>,
        break_on_operation: bool,
        mask: SweepMask,
    ) -> Result<bool, Error> {
        let points = self.points();
        if !break_on_operation || self.next_point() >= points {
            self.reset_progress();
            self.progress.end(&mut self.frontend);
        }
        if break_on_operation && mask.is_empty() {
            self.progress.end(&mut self.frontend);
            return Ok(false);
        }

        // Latency bound for the UI: one point while input waits.
        let budget = if !break_on_operation {
            u16::MAX
        } else if self.frontend.input_pending() {
            1
        } else {
            SWEEP_POINTS_MAX as u16
        };
        let offset = if mask.s21_offset() {
            correction::offset_gain(self.config.s21_offset)
        } else {
            1.0
        };

        let mut point = self.next_point();
        if point == 0 {
            self.progress
                .begin(&mut self.frontend, self.config.bandwidth >= BANDWIDTH_100);
        }
        let slice_start = self.frontend.now();
        let mut processed = 0u16;
        self.state = PassState::Stepping(point);

        while point < points {
            if processed >= budget {
                break;
            }
            if break_on_operation {
                if processed > 0 && self.frontend.input_pending() {
                    break;
                }
                if self.frontend.now() - slice_start >= SWEEP_TIME_SLICE {
                    break;
                }
            }
            if let Err(err) = self.measure_point(point, measured, calibration, mask, offset) {
                log::warn!("sweep aborted at point {}: {}", point, err);
                self.state = PassState::Aborted;
                self.progress.end(&mut self.frontend);
                return Err(err);
            }
            self.progress.update(&mut self.frontend, point, points);
            point += 1;
            processed += 1;
            self.state = PassState::Stepping(point);
        }

        if point < points {
            return Ok(false);
        }
        self.state = PassState::Completed;
        self.progress.end(&mut self.frontend);
        Ok(true)
    }

    fn measure_point(
        &mut self,
        point: u16,
        measured: &mut Measured<N>,
        calibration: Option<&Calibration<N>>,
        mask: SweepMask,
        offset: f32,
    ) -> Result<(), Error> {
        let frequency = self.plan.get(point);
        let index = (!mask.interpolate()).then_some(point as usize);
        let (delay, extra) = if mask.measures_any() {
            let delay = self.frontend.set_frequency(frequency);
            (delay, self.frontend.take_settling_cycles())
        } else {
            (Duration::from_ticks(0), 0)
        };
        let calibration = calibration.filter(|_| mask.apply_calibration());
        let enhanced = calibration.is_some_and(|cal| cal.status().enhanced_response());

        let cycles = extra as u16 + 1;
        let mut value = [Complex::new(0.0, 0.0); 2];
        let mut terms: Option<Terms> = None;
        for cycle in 0..cycles {
            let last = cycle + 1 == cycles;
            let start_delay = if cycle == 0 {
                DELAY_SWEEP_START
            } else {
                Duration::from_ticks(0)
            };
            let mut channel_delay = delay;
            for channel in Channel::iter().filter(|c| mask.measures(*c)) {
                self.frontend.select_channel(channel);
                self.capture
                    .start(self.frontend.now(), channel_delay + start_delay, self.config.bandwidth);
                channel_delay = DELAY_CHANNEL_CHANGE;

                // Interpolate while the capture runs.
                if last && terms.is_none() {
                    terms = calibration.map(|cal| cal.interpolate(index, frequency, &self.frontend));
                }
                self.capture.wait(&self.frontend)?;

                let mut v = self.capture.sample(&self.config.sampler);
                if let Some(terms) = terms.as_ref().filter(|_| last) {
                    v = match channel {
                        Channel::S11 => correction::apply_ch0(v, terms),
                        Channel::S21 => correction::apply_ch1(v, value[0], terms, enhanced),
                    };
                }
                if mask.edelay(channel) {
                    v = correction::apply_edelay(
                        v,
                        self.config.electrical_delay[channel.index()],
                        frequency,
                    );
                }
                if channel == Channel::S21 {
                    v *= offset;
                }
                value[channel.index()] = v;
                measured[channel.index()][point as usize] = v;
            }
        }

        if mask.renormalize() && mask.ch0() {
            measured[0][point as usize] =
                correction::renormalize(
                    value[0],
                    self.config.port_impedance,
                    self.config.reference_impedance,
                );
        }
        Ok(())
    }

    /// Borrow this orchestrator together with the shared buffers for
    /// complete, non-breakable passes.
    pub fn session<'s>(&'s mut self, buffers: &'s SweepBuffers<N>) -> SweepSession<'s, 'a, F, N> {
        SweepSession {
            orchestrator: self,
            buffers,
        }
    }
}

/// Complete passes run outside the measurement task's regular cycle, such as
/// calibration collection and console scans.
///
/// Every pass claims the shared buffers like the measurement task does, so
/// readers never observe a partial pass.
pub struct SweepSession<'s, 'a, F, const N: usize> {
    orchestrator: &'s mut Orchestrator<'a, F, N>,
    buffers: &'s SweepBuffers<N>,
}

impl<F: Frontend, const N: usize> SweepSession<'_, '_, F, N> {
    /// Run one complete pass over `mask`, publishing the result as a new
    /// generation.
    pub fn scan(
        &mut self,
        calibration: Option<&Calibration<N>>,
        mask: SweepMask,
    ) -> Result<(), Error> {
        self.run(calibration, mask, |_| {})
    }

    fn run(
        &mut self,
        calibration: Option<&Calibration<N>>,
        mask: SweepMask,
        inspect: impl FnOnce(&Measured<N>),
    ) -> Result<(), Error> {
        self.buffers
            .wait_for_copy_release(self.orchestrator.frontend())?;
        let mut guard = self.buffers.begin_measurement()?;
        guard.set_points(self.orchestrator.points());
        let result = self
            .orchestrator
            .execute(guard.measured_mut(), calibration, false, mask);
        let completed = matches!(result, Ok(true));
        if completed {
            inspect(guard.measured());
        }
        guard.end(completed);
        match result {
            Ok(true) => Ok(()),
            Ok(false) => Err(Error::ResourceBusy),
            Err(err) => Err(err),
        }
    }
}

impl<F: Frontend, const N: usize> Sweeper for SweepSession<'_, '_, F, N> {
    fn plan(&self) -> FrequencyPlan {
        FrequencyPlan::new(
            self.orchestrator.plan.start(),
            self.orchestrator.plan.stop(),
            self.orchestrator.points(),
        )
    }

    fn bandwidth(&self) -> u16 {
        self.orchestrator.config.bandwidth
    }

    fn set_bandwidth(&mut self, bandwidth: u16) {
        self.orchestrator.config.bandwidth = bandwidth;
    }

    fn sweep(
        &mut self,
        mask: SweepMask,
        channel: Channel,
        sink: &mut dyn FnMut(usize, Complex<f32>),
    ) -> Result<(), Error> {
        let points = self.orchestrator.points() as usize;
        self.run(None, mask, |measured| {
            measured[channel.index()][..points]
                .iter()
                .enumerate()
                .for_each(|(i, v)| sink(i, *v));
        })
    }
}
