//! Collaborator interfaces to the board.
//!
//! The measurement core never touches peripherals directly. The signal
//! source, codec input multiplexer, indicators and UI input sources are
//! reached through these traits.

use crate::{sweep::Channel, time::Duration, time::Timebase};

/// Discrete sub-ranges of the signal source's output multiplier.
pub trait HarmonicBands {
    /// Band index of `frequency`.
    ///
    /// # Note
    /// Two frequencies with the same band index are safe to interpolate
    /// between. Nothing else is assumed about the numbering.
    fn harmonic_band(&self, frequency: u32) -> u32;
}

/// Programmable RF source plus local oscillator.
pub trait SignalSource: HarmonicBands {
    /// Retune to `frequency`.
    ///
    /// # Returns
    /// The settling delay required before the first capture.
    fn set_frequency(&mut self, frequency: u32) -> Duration;

    /// Extra settling cycles requested by the last retune. Reading clears the
    /// request.
    fn take_settling_cycles(&mut self) -> u8 {
        0
    }
}

/// Board surface used by the sweep orchestrator.
pub trait Frontend: SignalSource + Timebase {
    /// Route `channel` to the codec input.
    fn select_channel(&mut self, channel: Channel);

    /// Whether console, touch or lever input is waiting for the UI.
    fn input_pending(&mut self) -> bool {
        false
    }

    /// Sweep activity LED.
    fn set_activity(&mut self, _active: bool) {}

    /// Paint `width` pixels of the progress bar starting at `x`.
    ///
    /// # Args
    /// * `filled` - Paint as completed (true) or clear (false).
    fn draw_progress(&mut self, _x: u16, _width: u16, _filled: bool) {}
}
