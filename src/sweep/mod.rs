use bitbybit::bitfield;
use num_enum::{IntoPrimitive, TryFromPrimitive};
use serde::{Deserialize, Serialize};
use strum::{EnumCount, EnumIter};

pub mod correction;
mod orchestrator;
pub use orchestrator::*;
mod progress;
pub use progress::*;

/// Receiver channel.
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
    Serialize,
    Deserialize,
)]
#[repr(u8)]
pub enum Channel {
    /// Reflection.
    S11 = 0,
    /// Transmission.
    S21 = 1,
}

impl Channel {
    pub fn index(self) -> usize {
        u8::from(self) as usize
    }
}

/// Per-pass measurement options.
#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct SweepMask {
    #[bit(0, rw)]
    pub ch0: bool,
    #[bit(1, rw)]
    pub ch1: bool,
    #[bit(2, rw)]
    pub edelay_s11: bool,
    #[bit(3, rw)]
    pub edelay_s21: bool,
    #[bit(4, rw)]
    pub s21_offset: bool,
    #[bit(5, rw)]
    pub apply_calibration: bool,
    #[bit(6, rw)]
    pub interpolate: bool,
    #[bit(7, rw)]
    pub renormalize: bool,
}

impl SweepMask {
    /// Mask measuring only `channel` with no correction applied.
    pub fn raw(channel: Channel) -> Self {
        Self::DEFAULT.with_channel(channel, true)
    }

    pub fn measures(&self, channel: Channel) -> bool {
        match channel {
            Channel::S11 => self.ch0(),
            Channel::S21 => self.ch1(),
        }
    }

    pub fn with_channel(self, channel: Channel, enabled: bool) -> Self {
        match channel {
            Channel::S11 => self.with_ch0(enabled),
            Channel::S21 => self.with_ch1(enabled),
        }
    }

    /// Whether any receiver channel is selected.
    pub fn measures_any(&self) -> bool {
        self.ch0() || self.ch1()
    }

    pub fn is_empty(&self) -> bool {
        self.raw_value() == 0
    }

    pub fn edelay(&self, channel: Channel) -> bool {
        match channel {
            Channel::S11 => self.edelay_s11(),
            Channel::S21 => self.edelay_s21(),
        }
    }
}
