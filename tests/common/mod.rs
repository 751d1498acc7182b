#![allow(dead_code)]

use core::cell::Cell;

use nanovna::{
    capture::Capture,
    hardware::{Frontend, HarmonicBands, SignalSource},
    sweep::Channel,
    time::{Duration, Instant, Timebase},
    Complex,
};

/// One codec buffer: 48 samples at 192 kHz.
pub const BUFFER_PERIOD: u64 = 250;

const REFERENCE: f32 = 10_000.;

/// Interleaved `[reference, sample]` buffer of the 12 kHz IF with the sample
/// carrying `gamma` relative to the reference.
pub fn tone(gamma: Complex<f32>) -> [i16; 96] {
    let (amplitude, phase) = gamma.to_polar();
    let mut buf = [0; 96];
    for (i, pair) in buf.chunks_exact_mut(2).enumerate() {
        let theta = core::f32::consts::TAU * 3. * i as f32 / 48.;
        pair[0] = (REFERENCE * theta.cos()).round() as i16;
        pair[1] = (REFERENCE * amplitude * (theta - phase).cos()).round() as i16;
    }
    buf
}

/// Reflectometer error model of the simulated bridge.
#[derive(Copy, Clone, Debug)]
pub struct ErrorModel {
    pub directivity: Complex<f32>,
    pub source_match: Complex<f32>,
    pub tracking: Complex<f32>,
}

impl ErrorModel {
    pub const IDEAL: Self = Self {
        directivity: Complex::new(0., 0.),
        source_match: Complex::new(0., 0.),
        tracking: Complex::new(1., 0.),
    };

    pub fn measure(&self, actual: Complex<f32>) -> Complex<f32> {
        self.directivity
            + self.tracking * actual / (Complex::new(1., 0.) - self.source_match * actual)
    }
}

/// Board double. Every `relax()` is one codec buffer period delivered to the
/// capture the way the buffer interrupt would.
pub struct Rig<'a> {
    capture: &'a Capture,
    now: Cell<u64>,
    channel: Cell<Channel>,
    frequency: Cell<u32>,
    pub model: Cell<ErrorModel>,
    /// Actual reflection of the device under test.
    pub reflection: Cell<Complex<f32>>,
    pub transmission: Cell<Complex<f32>>,
    pub pending: Cell<bool>,
    pub stalled: Cell<bool>,
    pub retunes: Cell<usize>,
}

impl<'a> Rig<'a> {
    pub fn new(capture: &'a Capture) -> Self {
        Self {
            capture,
            now: Cell::new(0),
            channel: Cell::new(Channel::S11),
            frequency: Cell::new(0),
            model: Cell::new(ErrorModel::IDEAL),
            reflection: Cell::new(Complex::new(0., 0.)),
            transmission: Cell::new(Complex::new(0., 0.)),
            pending: Cell::new(false),
            stalled: Cell::new(false),
            retunes: Cell::new(0),
        }
    }

    fn received(&self) -> Complex<f32> {
        match self.channel.get() {
            Channel::S11 => self.model.get().measure(self.reflection.get()),
            Channel::S21 => self.transmission.get(),
        }
    }
}

impl HarmonicBands for Rig<'_> {
    fn harmonic_band(&self, _frequency: u32) -> u32 {
        0
    }
}

impl SignalSource for Rig<'_> {
    fn set_frequency(&mut self, frequency: u32) -> Duration {
        self.frequency.set(frequency);
        self.retunes.set(self.retunes.get() + 1);
        Duration::micros(10)
    }
}

impl Timebase for Rig<'_> {
    fn now(&self) -> Instant {
        Instant::from_ticks(self.now.get())
    }

    fn relax(&self) {
        self.now.set(self.now.get() + BUFFER_PERIOD);
        if !self.stalled.get() {
            self.capture.on_buffer(self.now(), &tone(self.received()));
        }
    }
}

impl Frontend for Rig<'_> {
    fn select_channel(&mut self, channel: Channel) {
        self.channel.set(channel);
    }

    fn input_pending(&mut self) -> bool {
        self.pending.get()
    }
}

pub fn assert_close(a: Complex<f32>, b: Complex<f32>, tol: f32) {
    assert!((a - b).norm() < tol, "{a} != {b}");
}
