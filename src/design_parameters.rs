use crate::time::Duration;

/// Maximum number of points in a sweep and in the calibration tables.
pub const SWEEP_POINTS_MAX: usize = 401;

/// Minimum number of points accepted from settings.
pub const SWEEP_POINTS_MIN: u16 = 11;

/// Audio codec sample rate in Hz.
pub const AUDIO_ADC_FREQ: u32 = 192_000;

/// Intermediate frequency of the receiver in Hz.
pub const FREQUENCY_IF: u32 = 12_000;

/// Sample pairs per interrupt-delivered buffer.
pub const AUDIO_SAMPLES_COUNT: usize = vna_dsp::MIXER_LEN;

/// Interleaved `[reference, sample]` buffer length.
pub const AUDIO_BUFFER_LEN: usize = AUDIO_SAMPLES_COUNT * 2;

/// Time-domain transform length.
pub const FFT_SIZE: usize = if SWEEP_POINTS_MAX > 256 { 512 } else { 256 };

// Bandwidth codes are the number of extra buffers accumulated per point. One
// buffer spans AUDIO_ADC_FREQ / AUDIO_SAMPLES_COUNT = 4 kHz.
pub const BANDWIDTH_4000: u16 = 1 - 1;
pub const BANDWIDTH_2000: u16 = 2 - 1;
pub const BANDWIDTH_1000: u16 = 4 - 1;
pub const BANDWIDTH_333: u16 = 12 - 1;
pub const BANDWIDTH_100: u16 = 40 - 1;
pub const BANDWIDTH_30: u16 = 132 - 1;

/// Settling time after switching the codec input channel.
pub const DELAY_CHANNEL_CHANGE: Duration = Duration::micros(100);

/// Additional settling time for the first cycle of every point.
#[cfg(not(feature = "f303"))]
pub const DELAY_SWEEP_START: Duration = Duration::micros(100);
#[cfg(feature = "f303")]
pub const DELAY_SWEEP_START: Duration = Duration::micros(2000);

/// Settling time reported by the source after a harmonic band change.
pub const DELAY_BAND_CHANGE: Duration = Duration::micros(5000);

/// Deadline for one capture (all buffers of one channel at one point).
pub const CAPTURE_TIMEOUT: Duration = Duration::millis(500);

/// Deadline for a reader to obtain the copy token.
pub const SNAPSHOT_ACQUIRE_TIMEOUT: Duration = Duration::millis(2000);

/// Deadline for the producer to wait on an in-flight reader copy.
pub const COPY_RELEASE_TIMEOUT: Duration = Duration::millis(2000);

/// Deadline for the first completed sweep after start-up.
pub const GENERATION_TIMEOUT: Duration = Duration::millis(1000);

/// Deadline for the sweep task to acknowledge a pause request.
pub const PAUSE_TIMEOUT: Duration = Duration::millis(1000);

/// Wall-clock slice a breakable sweep pass may run before yielding.
pub const SWEEP_TIME_SLICE: Duration = Duration::millis(8);

/// Idle wait of the measurement task when no sweep may start.
pub const ENGINE_IDLE_DELAY: Duration = Duration::millis(1);

/// Progress bar width in pixels.
pub const PROGRESS_WIDTH: u16 = 320;

/// Reference impedance of the calibration load in ohms.
pub const CAL_LOAD_R: f32 = 50.0;

/// Marks the active calibration as not stored in any slot.
pub const NO_SAVE_SLOT: u16 = 0xFFFF;
