//! Console scan output.
//!
//! A scan runs one complete pass and prints frequency and channel data per
//! point, either as text lines or as a little-endian binary stream.

use bitbybit::bitfield;

use crate::{
    calibration::CalStatus,
    frequency::FrequencyPlan,
    settings::Settings,
    snapshot::{Measured, SweepBuffers},
    sweep::{Channel, SweepMask},
    time::Timebase,
    Complex, Error,
};

/// Attempts to obtain both channels from the same generation.
pub const DUMP_RETRIES: usize = 3;

const NEWLINE: &str = "\r\n";

/// Output selection of a scan.
#[bitfield(u16, default = 0)]
#[derive(Debug, PartialEq, Eq)]
pub struct ScanMask {
    #[bit(0, rw)]
    pub out_frequency: bool,
    #[bit(1, rw)]
    pub out_data0: bool,
    #[bit(2, rw)]
    pub out_data1: bool,
    #[bit(3, rw)]
    pub no_calibration: bool,
    #[bit(4, rw)]
    pub no_edelay: bool,
    #[bit(5, rw)]
    pub no_s21_offset: bool,
    #[bit(7, rw)]
    pub binary: bool,
}

impl ScanMask {
    pub fn outputs(&self, channel: Channel) -> bool {
        match channel {
            Channel::S11 => self.out_data0(),
            Channel::S21 => self.out_data1(),
        }
    }
}

/// Sweep mask of a scan.
///
/// # Args
/// * `settings` - Current correction settings.
/// * `status` - Calibration state.
/// * `out` - Requested output. Without one, both channels are measured.
/// * `interpolate` - The scan plan differs from the calibration plan.
pub fn scan_sweep_mask(
    settings: &Settings,
    status: CalStatus,
    out: Option<ScanMask>,
    interpolate: bool,
) -> SweepMask {
    let out = out.unwrap_or(ScanMask::DEFAULT);
    let (ch0, ch1) = if out.raw_value() == 0 {
        (true, true)
    } else {
        (out.out_data0(), out.out_data1())
    };
    let correction = &settings.correction;
    SweepMask::DEFAULT
        .with_ch0(ch0)
        .with_ch1(ch1)
        .with_apply_calibration(status.apply() && !out.no_calibration())
        .with_edelay_s11(correction.electrical_delay[0] != 0.0 && !out.no_edelay())
        .with_edelay_s21(correction.electrical_delay[1] != 0.0 && !out.no_edelay())
        .with_s21_offset(correction.s21_offset != 0.0 && !out.no_s21_offset())
        .with_interpolate(interpolate)
}

/// Copy the channels selected by `out` from one and the same generation.
///
/// # Returns
/// The number of valid points, or `Err(ResourceBusy)` if every attempt was
/// torn by a newer pass (or a snapshot could not be taken at all).
pub fn dump_consistent<T: Timebase + ?Sized, const N: usize>(
    buffers: &SweepBuffers<N>,
    timebase: &T,
    out: ScanMask,
    copy: &mut Measured<N>,
) -> Result<u16, Error> {
    'attempt: for attempt in 0..DUMP_RETRIES {
        let mut seen: Option<(u32, u16)> = None;
        for channel in [Channel::S11, Channel::S21] {
            if !out.outputs(channel) {
                continue;
            }
            let snapshot = buffers.acquire(channel, timebase)?;
            let tag = (snapshot.generation(), snapshot.points());
            let data = snapshot.data();
            copy[channel.index()][..data.len()].copy_from_slice(data);
            if !snapshot.release() || seen.is_some_and(|s| s != tag) {
                log::debug!("dump torn on attempt {}", attempt);
                continue 'attempt;
            }
            seen = Some(tag);
        }
        return Ok(seen.map_or(buffers.points(), |(_, points)| points));
    }
    Err(Error::ResourceBusy)
}

fn pair(v: Complex<f32>) -> [u8; 8] {
    let mut b = [0; 8];
    b[..4].copy_from_slice(&v.re.to_le_bytes());
    b[4..].copy_from_slice(&v.im.to_le_bytes());
    b
}

/// Binary scan output.
///
/// Layout: `u16` mask, `u16` points, then per point an optional `u32`
/// frequency and optional `f32` pairs for each channel, all little-endian.
pub fn write_binary<W: embedded_io::Write, const N: usize>(
    w: &mut W,
    out: ScanMask,
    plan: &FrequencyPlan,
    measured: &Measured<N>,
    points: u16,
) -> Result<(), W::Error> {
    let points = points.min(N as u16);
    w.write_all(&out.raw_value().to_le_bytes())?;
    w.write_all(&points.to_le_bytes())?;
    for i in 0..points {
        if out.out_frequency() {
            w.write_all(&plan.get(i).to_le_bytes())?;
        }
        for channel in [Channel::S11, Channel::S21] {
            if out.outputs(channel) {
                w.write_all(&pair(measured[channel.index()][i as usize]))?;
            }
        }
    }
    w.flush()
}

/// Text scan output, one line per point.
pub fn write_text<W: core::fmt::Write, const N: usize>(
    w: &mut W,
    out: ScanMask,
    plan: &FrequencyPlan,
    measured: &Measured<N>,
    points: u16,
) -> core::fmt::Result {
    for i in 0..points.min(N as u16) {
        if out.out_frequency() {
            write!(w, "{} ", plan.get(i))?;
        }
        for channel in [Channel::S11, Channel::S21] {
            if out.outputs(channel) {
                let v = measured[channel.index()][i as usize];
                write!(w, "{:.6} {:.6} ", v.re, v.im)?;
            }
        }
        w.write_str(NEWLINE)?;
    }
    Ok(())
}
