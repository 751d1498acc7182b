use crate::{design_parameters::PROGRESS_WIDTH, hardware::Frontend};

/// Sweep progress bar and activity LED state.
///
/// Drawing is batched: fewer than two new pixels are held back until the
/// next update, or flushed by [Progress::end].
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
pub struct Progress {
    drawn: u16,
    pending: u16,
    bar: bool,
    led: bool,
}

impl Progress {
    pub const fn new() -> Self {
        Self {
            drawn: 0,
            pending: 0,
            bar: false,
            led: false,
        }
    }

    /// Turn on the activity indicator and start a fresh bar.
    ///
    /// # Args
    /// * `show` - Whether the bar is painted at all for this pass.
    pub fn begin(&mut self, frontend: &mut impl Frontend, show: bool) {
        if !self.led {
            frontend.set_activity(true);
            self.led = true;
        }
        self.drawn = 0;
        self.pending = 0;
        self.bar = show;
    }

    /// Advance the bar to cover point `point` of `points`.
    pub fn update(&mut self, frontend: &mut impl Frontend, point: u16, points: u16) {
        if !self.bar || points < 2 {
            return;
        }
        let pixels = (point as u32 * PROGRESS_WIDTH as u32 / (points as u32 - 1))
            .min(PROGRESS_WIDTH as u32) as u16;
        if pixels <= self.drawn {
            return;
        }
        let draw = pixels - self.drawn;
        if draw >= 2 || pixels >= PROGRESS_WIDTH {
            frontend.draw_progress(self.drawn, draw, true);
            self.drawn += draw;
            self.pending = 0;
        } else {
            self.pending = draw;
        }
    }

    /// Flush held-back pixels, erase the bar and turn the activity
    /// indicator off. Idempotent.
    pub fn end(&mut self, frontend: &mut impl Frontend) {
        if self.bar {
            if self.pending > 0 {
                frontend.draw_progress(self.drawn, self.pending, true);
                self.drawn += self.pending;
            }
            if self.drawn > 0 {
                frontend.draw_progress(0, self.drawn, false);
            }
            self.drawn = 0;
            self.pending = 0;
            self.bar = false;
        }
        if self.led {
            frontend.set_activity(false);
            self.led = false;
        }
    }

    /// Pixels currently painted.
    pub fn drawn(&self) -> u16 {
        self.drawn
    }

    pub fn is_active(&self) -> bool {
        self.led
    }
}
