//! The measurement task's loop body.

use crate::{
    design_parameters::ENGINE_IDLE_DELAY,
    event_bus::{Event, Publisher},
    hardware::Frontend,
    pipeline::Pipeline,
    processing::{self, TimeDomain},
    snapshot::SweepBuffers,
    sweep::{PassState, SweepMask},
    time::wait_until,
    Error,
};

/// Outcome of one engine tick that attempted a pass.
#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct SweepResult {
    pub mask: SweepMask,
    /// Every point of the plan was measured.
    pub completed: bool,
}

/// Host policy plugged into the engine.
pub trait MeasurementPort<F, const N: usize> {
    /// Periodic housekeeping, called first on every tick.
    fn service(&mut self, _pipeline: &mut Pipeline<'_, F, N>) {}

    /// Whether a pass may start now.
    ///
    /// # Returns
    /// `Some(break_on_operation)` to run a pass, `None` to idle.
    fn can_start_sweep(&mut self) -> Option<bool>;

    /// Called after every attempted pass, completed or not.
    fn handle_result(&mut self, result: SweepResult);
}

pub struct Engine<'a, P, B, F, const N: usize> {
    port: P,
    pipeline: Pipeline<'a, F, N>,
    buffers: &'a SweepBuffers<N>,
    bus: Option<&'a B>,
    time_domain: TimeDomain,
}

impl<'a, P, B, F, const N: usize> Engine<'a, P, B, F, N>
where
    P: MeasurementPort<F, N>,
    B: Publisher,
    F: Frontend,
{
    pub fn new(
        port: P,
        pipeline: Pipeline<'a, F, N>,
        buffers: &'a SweepBuffers<N>,
        bus: Option<&'a B>,
    ) -> Self {
        Self {
            port,
            pipeline,
            buffers,
            bus,
            time_domain: TimeDomain::new(),
        }
    }

    pub fn port(&self) -> &P {
        &self.port
    }

    pub fn port_mut(&mut self) -> &mut P {
        &mut self.port
    }

    pub fn pipeline(&self) -> &Pipeline<'a, F, N> {
        &self.pipeline
    }

    pub fn pipeline_mut(&mut self) -> &mut Pipeline<'a, F, N> {
        &mut self.pipeline
    }

    fn publish(&self, event: Event) {
        if let Some(bus) = self.bus {
            bus.publish(event);
        }
    }

    /// Service the port and, if it allows, run one pass.
    ///
    /// # Returns
    /// The pass outcome as reported to the port, or `None` if the engine
    /// idled for [ENGINE_IDLE_DELAY].
    pub fn tick(&mut self) -> Option<SweepResult> {
        self.port.service(&mut self.pipeline);
        let Some(break_on_operation) = self.port.can_start_sweep() else {
            wait_until(self.pipeline.orchestrator().frontend(), ENGINE_IDLE_DELAY, || false);
            return None;
        };

        let mask = self.pipeline.active_channel_mask();
        let completed = match self.run(break_on_operation, mask) {
            Ok(completed) => completed,
            Err(err) => {
                log::debug!("pass not completed: {}", err);
                false
            }
        };
        let result = SweepResult { mask, completed };
        self.port.handle_result(result);
        Some(result)
    }

    fn run(&mut self, break_on_operation: bool, mask: SweepMask) -> Result<bool, Error> {
        self.buffers
            .wait_for_copy_release(self.pipeline.orchestrator().frontend())?;
        let mut guard = self.buffers.begin_measurement()?;
        guard.set_points(self.pipeline.orchestrator().points());
        // A pass resumed after a yield has already been announced.
        if !matches!(self.pipeline.orchestrator().state(), PassState::Stepping(_)) {
            self.publish(Event::SweepStarted(mask));
        }
        let result = self
            .pipeline
            .execute(guard.measured_mut(), break_on_operation, mask);
        let completed = matches!(result, Ok(true));
        if completed {
            let options = self.pipeline.settings().processing();
            let points = self.pipeline.orchestrator().points();
            processing::process(
                &mut self.time_domain,
                &options,
                guard.measured_mut(),
                points,
                mask,
            );
        }
        guard.end(completed);
        if completed {
            self.publish(Event::SweepCompleted(mask));
        }
        result
    }
}
