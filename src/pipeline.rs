//! Glue between the settings, the calibration and the sweep orchestrator.

use crate::{
    calibration::{storage, CalStatus, Calibration, Standard},
    hardware::Frontend,
    settings::Settings,
    snapshot::{Measured, SweepBuffers},
    sweep::{Channel, Orchestrator, SweepMask},
    Error,
};

/// Mask policy: what one pass measures and which corrections it applies.
///
/// # Args
/// * `settings` - Enabled traces and correction settings.
/// * `status` - Calibration state.
pub fn active_channel_mask(settings: &Settings, status: CalStatus) -> SweepMask {
    let correction = &settings.correction;
    let port = correction.port_impedance;
    SweepMask::DEFAULT
        .with_ch0(settings.measures(Channel::S11))
        .with_ch1(settings.measures(Channel::S21))
        .with_apply_calibration(status.apply())
        .with_interpolate(status.interpolated())
        .with_edelay_s11(correction.electrical_delay[0] != 0.0)
        .with_edelay_s21(correction.electrical_delay[1] != 0.0)
        .with_s21_offset(correction.s21_offset != 0.0)
        .with_renormalize(port != correction.reference_impedance && port > 1.0)
}

pub struct Pipeline<'a, F, const N: usize> {
    orchestrator: Orchestrator<'a, F, N>,
    calibration: Calibration<N>,
    settings: Settings,
}

impl<'a, F: Frontend, const N: usize> Pipeline<'a, F, N> {
    pub fn new(orchestrator: Orchestrator<'a, F, N>, settings: Settings) -> Self {
        let mut pipeline = Self {
            orchestrator,
            calibration: Calibration::new(),
            settings: Settings::default(),
        };
        pipeline.apply_settings(settings);
        pipeline
    }

    pub fn orchestrator(&self) -> &Orchestrator<'a, F, N> {
        &self.orchestrator
    }

    pub fn orchestrator_mut(&mut self) -> &mut Orchestrator<'a, F, N> {
        &mut self.orchestrator
    }

    pub fn calibration(&self) -> &Calibration<N> {
        &self.calibration
    }

    pub fn calibration_mut(&mut self) -> &mut Calibration<N> {
        &mut self.calibration
    }

    pub fn settings(&self) -> &Settings {
        &self.settings
    }

    /// Sanitize and adopt new settings.
    ///
    /// A changed frequency plan restarts the current pass and re-evaluates
    /// the need for calibration interpolation.
    pub fn apply_settings(&mut self, mut settings: Settings) {
        settings.sanitize();
        let plan = settings.plan();
        if plan != *self.orchestrator.plan() {
            log::debug!("plan {:?}", plan);
        }
        self.orchestrator.set_plan(plan);
        *self.orchestrator.config_mut() = settings.sweep_config();
        self.calibration.update_interpolation(self.orchestrator.plan());
        self.settings = settings;
    }

    pub fn active_channel_mask(&self) -> SweepMask {
        active_channel_mask(&self.settings, self.calibration.status())
    }

    /// One pass of the orchestrator with the current calibration.
    pub fn execute(
        &mut self,
        measured: &mut Measured<N>,
        break_on_operation: bool,
        mask: SweepMask,
    ) -> Result<bool, Error> {
        self.orchestrator
            .execute(measured, Some(&self.calibration), break_on_operation, mask)
    }

    /// Measure `standard` with the configured averaging.
    pub fn calibrate(
        &mut self,
        standard: Standard,
        buffers: &SweepBuffers<N>,
    ) -> Result<(), Error> {
        let averaging = self.settings.sweep.averaging;
        self.calibration
            .collect(standard, &mut self.orchestrator.session(buffers), averaging)
    }

    /// Compute the error terms from the collected standards.
    pub fn finish_calibration(&mut self) {
        self.calibration.done();
        self.calibration.update_interpolation(self.orchestrator.plan());
    }

    /// Load a stored calibration and check it against the active plan.
    ///
    /// The stored interpolation flag describes the plan that was active
    /// when the record was saved, so it is re-evaluated here.
    pub fn restore_calibration(
        &mut self,
        bytes: &[u8],
        slot: u16,
    ) -> Result<(), storage::Error> {
        let result = self.calibration.restore(bytes, slot);
        self.calibration.update_interpolation(self.orchestrator.plan());
        result
    }

    /// One complete pass outside the regular measurement cycle.
    pub fn scan(&mut self, buffers: &SweepBuffers<N>, mask: SweepMask) -> Result<(), Error> {
        self.orchestrator
            .session(buffers)
            .scan(Some(&self.calibration), mask)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn mask_policy() {
        let mut settings = Settings::default();
        let status = CalStatus::DEFAULT;
        assert_eq!(
            active_channel_mask(&settings, status),
            SweepMask::DEFAULT.with_ch0(true).with_ch1(true)
        );

        settings.traces.iter_mut().for_each(|t| t.channel = Channel::S11);
        settings.correction.electrical_delay[1] = 1e-9;
        settings.correction.s21_offset = -3.0;
        settings.correction.port_impedance = 75.0;
        let status = status.with_apply(true).with_interpolated(true);
        let mask = active_channel_mask(&settings, status);
        assert!(mask.ch0() && !mask.ch1());
        assert!(mask.apply_calibration() && mask.interpolate());
        assert!(!mask.edelay_s11() && mask.edelay_s21());
        assert!(mask.s21_offset() && mask.renormalize());

        // Degenerate port impedance never renormalizes.
        settings.correction.port_impedance = 0.5;
        assert!(!active_channel_mask(&settings, status).renormalize());
    }
}
