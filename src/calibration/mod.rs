//! Error-term calibration.
//!
//! Raw standard measurements and the error terms derived from them share five
//! per-point slots. Computing a derived term overwrites the raw slot and moves
//! the status bit from the standard to the term.

use bitbybit::bitfield;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use num_traits::Zero;
use strum::{EnumCount, EnumIter};
use vna_dsp::ComplexExt;

use crate::{
    design_parameters::{BANDWIDTH_100, NO_SAVE_SLOT},
    frequency::FrequencyPlan,
    sweep::{Channel, SweepMask},
    Complex, Error,
};

mod interpolate;
pub mod storage;

/// Squared magnitude below which a denominator is treated as zero.
const DEGENERATE: f32 = 1e-20;

/// Calibration standards, by storage slot.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
    EnumIter,
    EnumCount,
)]
#[repr(u8)]
pub enum Standard {
    Load = 0,
    Open = 1,
    Short = 2,
    Thru = 3,
    Isolation = 4,
}

/// Error terms, by storage slot.
#[derive(
    Copy,
    Clone,
    Debug,
    PartialEq,
    Eq,
    IntoPrimitive,
    TryFromPrimitive,
    EnumIter,
    EnumCount,
)]
#[repr(u8)]
pub enum Term {
    /// Directivity.
    Ed = 0,
    /// Source match.
    Es = 1,
    /// Reflection tracking.
    Er = 2,
    /// Transmission tracking, stored inverted.
    Et = 3,
    /// Isolation.
    Ex = 4,
}

pub const TERM_COUNT: usize = Term::COUNT;

/// All error terms at one frequency, indexed by [Term].
pub type Terms = [Complex<f32>; TERM_COUNT];

#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct CalStatus {
    #[bit(0, rw)]
    pub load: bool,
    #[bit(1, rw)]
    pub open: bool,
    #[bit(2, rw)]
    pub short: bool,
    #[bit(3, rw)]
    pub thru: bool,
    #[bit(4, rw)]
    pub isolation: bool,
    #[bit(5, rw)]
    pub es: bool,
    #[bit(6, rw)]
    pub er: bool,
    #[bit(7, rw)]
    pub et: bool,
    #[bit(8, rw)]
    pub apply: bool,
    #[bit(9, rw)]
    pub interpolated: bool,
    #[bit(10, rw)]
    pub enhanced_response: bool,
}

impl Standard {
    fn slot(self) -> usize {
        u8::from(self) as usize
    }

    /// Receiver channel the standard is measured on.
    pub fn channel(self) -> Channel {
        match self {
            Self::Load | Self::Open | Self::Short => Channel::S11,
            Self::Thru | Self::Isolation => Channel::S21,
        }
    }

    /// Status after a measurement of this standard. A failed measurement
    /// leaves the slot partially written, so `valid` is false then.
    fn collected(self, status: CalStatus, valid: bool) -> CalStatus {
        let status = status.with_apply(false);
        match self {
            Self::Load => status.with_load(valid),
            Self::Open => status.with_open(valid).with_es(false).with_er(false),
            Self::Short => status.with_short(valid).with_es(false).with_er(false),
            Self::Thru => status.with_thru(valid).with_et(false),
            Self::Isolation => status.with_isolation(valid),
        }
    }
}

impl Term {
    fn slot(self) -> usize {
        u8::from(self) as usize
    }
}

/// One complete non-breakable measurement pass, as needed by [Calibration::collect].
pub trait Sweeper {
    /// Frequency plan the next pass will use.
    fn plan(&self) -> FrequencyPlan;

    fn bandwidth(&self) -> u16;

    fn set_bandwidth(&mut self, bandwidth: u16);

    /// Run one full pass over `mask` and hand every point of `channel` to `sink`.
    fn sweep(
        &mut self,
        mask: SweepMask,
        channel: Channel,
        sink: &mut dyn FnMut(usize, Complex<f32>),
    ) -> Result<(), Error>;
}

/// Calibration tables for up to `N` points.
#[derive(Clone, Debug)]
pub struct Calibration<const N: usize> {
    status: CalStatus,
    plan: FrequencyPlan,
    data: [[Complex<f32>; N]; TERM_COUNT],
    save_slot: u16,
}

impl<const N: usize> Default for Calibration<N> {
    fn default() -> Self {
        Self::new()
    }
}

impl<const N: usize> Calibration<N> {
    pub fn new() -> Self {
        Self {
            status: CalStatus::DEFAULT,
            plan: FrequencyPlan::default(),
            data: [[Complex::zero(); N]; TERM_COUNT],
            save_slot: NO_SAVE_SLOT,
        }
    }

    pub fn status(&self) -> CalStatus {
        self.status
    }

    /// Frequency plan the tables were recorded on.
    pub fn plan(&self) -> &FrequencyPlan {
        &self.plan
    }

    /// Storage slot this calibration was last saved to or loaded from.
    pub fn save_slot(&self) -> u16 {
        self.save_slot
    }

    pub fn set_save_slot(&mut self, slot: u16) {
        self.save_slot = slot;
    }

    /// Forget all standards and terms.
    pub fn reset(&mut self) {
        self.status = CalStatus::DEFAULT;
    }

    pub fn set_enhanced_response(&mut self, enabled: bool) {
        self.status = self.status.with_enhanced_response(enabled);
    }

    /// Flag whether sweeps over `plan` need interpolated terms.
    pub fn update_interpolation(&mut self, plan: &FrequencyPlan) {
        let mismatch =
            !self.plan.matches(plan.start(), plan.stop(), plan.points());
        self.status = self.status.with_interpolated(mismatch);
    }

    /// Term values at calibration point `index`.
    pub fn terms_at(&self, index: usize) -> Terms {
        core::array::from_fn(|slot| self.data[slot][index])
    }

    /// The points of one term over the calibration plan.
    pub fn term(&self, term: Term) -> &[Complex<f32>] {
        &self.data[term.slot()][..self.points()]
    }

    /// The points of one raw standard over the calibration plan.
    pub fn standard(&self, standard: Standard) -> &[Complex<f32>] {
        &self.data[standard.slot()][..self.points()]
    }

    fn points(&self) -> usize {
        (self.plan.points() as usize).min(N)
    }

    /// Measure `standard` and store it in its slot.
    ///
    /// A sweep plan that differs from the calibration plan discards the
    /// calibration and adopts the new plan. The bandwidth is raised to at
    /// least [BANDWIDTH_100] for the duration of the measurement.
    ///
    /// # Args
    /// * `standard` - The standard connected to the port.
    /// * `sweeper` - Runs the measurement passes.
    /// * `averaging` - Number of passes averaged. Zero counts as one.
    pub fn collect(
        &mut self,
        standard: Standard,
        sweeper: &mut impl Sweeper,
        averaging: u16,
    ) -> Result<(), Error> {
        let plan = sweeper.plan();
        debug_assert!(plan.points() as usize <= N);
        if !self.plan.matches(plan.start(), plan.stop(), plan.points()) {
            log::debug!("calibration plan reset to {:?}", plan);
            self.status = CalStatus::DEFAULT;
            self.plan = plan;
        }

        let bandwidth = sweeper.bandwidth();
        if bandwidth < BANDWIDTH_100 {
            sweeper.set_bandwidth(BANDWIDTH_100);
        }
        let result = self.measure(standard, sweeper, averaging.max(1));
        sweeper.set_bandwidth(bandwidth);
        self.status = standard.collected(self.status, result.is_ok());
        result
    }

    fn measure(
        &mut self,
        standard: Standard,
        sweeper: &mut impl Sweeper,
        count: u16,
    ) -> Result<(), Error> {
        let channel = standard.channel();
        let points = self.points();
        let slot = &mut self.data[standard.slot()];
        for pass in 0..count {
            sweeper.sweep(SweepMask::raw(channel), channel, &mut |i, value| {
                if i >= points {
                    return;
                }
                if pass == 0 {
                    slot[i] = value;
                } else {
                    slot[i] += value;
                }
            })?;
        }
        if count > 1 {
            let scale = 1.0 / count as f32;
            slot[..points].iter_mut().for_each(|v| *v *= scale);
        }
        Ok(())
    }

    /// Derive the error terms from the collected standards and enable
    /// correction.
    ///
    /// Terms without a standard behind them default to neutral values
    /// (ED=EX=ES=0, ER=ET=1), so every term is defined once APPLY is set.
    pub fn done(&mut self) {
        let status = self.status;
        if !status.load() {
            self.fill(Term::Ed.slot(), Complex::zero());
        }
        if !status.isolation() {
            self.fill(Term::Ex.slot(), Complex::zero());
        }

        if status.short() && status.open() {
            self.calc_es();
            self.calc_er(-1.0);
        } else if status.open() {
            self.data[Standard::Short.slot()] = self.data[Standard::Open.slot()];
            self.status = self.status.with_open(false);
            self.fill(Term::Es.slot(), Complex::zero());
            self.calc_er(1.0);
        } else if status.short() {
            self.fill(Term::Es.slot(), Complex::zero());
            self.calc_er(-1.0);
        }

        if self.status.thru() {
            self.calc_et();
        }

        let status = self.status;
        if !status.et() {
            self.fill(Term::Et.slot(), Complex::new(1.0, 0.0));
        }
        if !status.er() {
            self.fill(Term::Er.slot(), Complex::new(1.0, 0.0));
        }
        if !status.es() {
            self.fill(Term::Es.slot(), Complex::zero());
        }
        self.status = self.status.with_apply(true);
        self.save_slot = NO_SAVE_SLOT;
        log::info!(
            "calibration done: status {:#05x}, {} points",
            self.status.raw_value(),
            self.points()
        );
    }

    fn fill(&mut self, slot: usize, value: Complex<f32>) {
        let points = self.points();
        self.data[slot][..points].fill(value);
    }

    // ES = (S_open' + S_short') / (S_open' - S_short')
    fn calc_es(&mut self) {
        for i in 0..self.points() {
            let ed = self.data[Term::Ed.slot()][i];
            let open = self.data[Standard::Open.slot()][i] - ed;
            let short = self.data[Standard::Short.slot()][i] - ed;
            self.data[Term::Es.slot()][i] =
                (open + short).div_or(open - short, DEGENERATE, Complex::zero());
        }
        self.status = self.status.with_open(false).with_es(true);
    }

    // ER = sign·(1 - sign·ES)·S_short'
    fn calc_er(&mut self, sign: f32) {
        for i in 0..self.points() {
            let short = self.data[Standard::Short.slot()][i]
                - self.data[Term::Ed.slot()][i];
            let es = self.data[Term::Es.slot()][i];
            self.data[Term::Er.slot()][i] =
                (Complex::new(1.0, 0.0) - es * sign) * short * sign;
        }
        self.status = self.status.with_short(false).with_er(true);
    }

    // ET = 1 / (S_thru - EX), stored inverted
    fn calc_et(&mut self) {
        let one = Complex::new(1.0, 0.0);
        for i in 0..self.points() {
            let thru = self.data[Standard::Thru.slot()][i]
                - self.data[Term::Ex.slot()][i];
            self.data[Term::Et.slot()][i] = one.div_or(thru, DEGENERATE, one);
        }
        self.status = self.status.with_thru(false).with_et(true);
    }
}
