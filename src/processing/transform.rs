//! Frequency to time domain conversion of a sweep.

use serde::{Deserialize, Serialize};
use vna_dsp::{bessel_i0, fft, kaiser, Direction};

use crate::{design_parameters::FFT_SIZE, Complex};

#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TdFunction {
    #[default]
    LowpassImpulse,
    LowpassStep,
    Bandpass,
}

impl TdFunction {
    fn is_lowpass(self) -> bool {
        matches!(self, TdFunction::LowpassImpulse | TdFunction::LowpassStep)
    }
}

/// Kaiser window applied before the transform.
#[derive(Copy, Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum TdWindow {
    /// Rectangular.
    Minimum,
    #[default]
    Normal,
    Maximum,
}

impl TdWindow {
    pub fn beta(self) -> u16 {
        match self {
            TdWindow::Minimum => 0,
            TdWindow::Normal => 6,
            TdWindow::Maximum => 13,
        }
    }
}

/// Scratch buffer and cached window normalization for the transform.
pub struct TimeDomain {
    cached: Option<(TdFunction, TdWindow, usize)>,
    scale: f32,
    buffer: [Complex<f32>; FFT_SIZE],
}

impl Default for TimeDomain {
    fn default() -> Self {
        Self::new()
    }
}

impl TimeDomain {
    pub const fn new() -> Self {
        Self {
            cached: None,
            scale: 1.0,
            buffer: [Complex::new(0.0, 0.0); FFT_SIZE],
        }
    }

    fn window_offset(function: TdFunction, points: usize) -> usize {
        if function.is_lowpass() {
            points
        } else {
            0
        }
    }

    fn window_scale(&mut self, function: TdFunction, window: TdWindow, points: usize) -> f32 {
        if self.cached == Some((function, window, points)) {
            return self.scale;
        }
        let beta = window.beta();
        let offset = Self::window_offset(function, points);
        let size = (points + offset) as u32;
        let sum = match function {
            TdFunction::LowpassStep => {
                let beta = beta as f32;
                FFT_SIZE as f32 * bessel_i0(beta * beta / 4.0)
            }
            _ => {
                let sum: f32 = (0..points)
                    .map(|i| kaiser((i + offset) as u32, size, beta))
                    .sum();
                if function == TdFunction::LowpassImpulse {
                    2.0 * sum
                } else {
                    sum
                }
            }
        };
        self.scale = 1.0 / sum;
        self.cached = Some((function, window, points));
        self.scale
    }

    /// Replace `points` frequency samples in `data` by their time domain
    /// response.
    ///
    /// # Args
    /// * `data` - Channel data. Up to [FFT_SIZE] entries are overwritten.
    /// * `points` - Valid frequency points at the start of `data`.
    /// * `function` - Lowpass variants treat the data as the positive half
    ///   of a real signal's spectrum.
    /// * `window` - Window shape.
    pub fn transform(
        &mut self,
        data: &mut [Complex<f32>],
        points: usize,
        function: TdFunction,
        window: TdWindow,
    ) {
        let points = points.min(data.len()).min(FFT_SIZE);
        if points == 0 {
            return;
        }
        let scale = self.window_scale(function, window, points);
        let offset = Self::window_offset(function, points);
        let size = (points + offset) as u32;
        let beta = window.beta();

        let buf = &mut self.buffer;
        for (i, (b, d)) in buf.iter_mut().zip(data[..points].iter()).enumerate() {
            *b = *d * (kaiser((i + offset) as u32, size, beta) * scale);
        }
        buf[points..].fill(Complex::new(0.0, 0.0));
        if function.is_lowpass() {
            for i in 1..points {
                buf[FFT_SIZE - i] = buf[i].conj();
            }
        }

        fft(buf, Direction::Inverse);

        if function.is_lowpass() {
            buf[..points].iter_mut().for_each(|v| v.im = 0.0);
        }
        if function == TdFunction::LowpassStep {
            for i in 1..points {
                buf[i].re += buf[i - 1].re;
            }
        }
        let len = data.len().min(FFT_SIZE);
        data[..len].copy_from_slice(&buf[..len]);
    }
}
