use num_complex::Complex;

include!(concat!(env!("OUT_DIR"), "/twiddle_table.rs"));

#[derive(Copy, Clone, Debug, PartialEq, Eq)]
pub enum Direction {
    Forward,
    Inverse,
}

/// In-place radix-2 decimation-in-time FFT.
///
/// The transform is unnormalized in both directions: a forward then inverse
/// pass scales the input by `data.len()`.
///
/// # Args
/// * `data` - Samples. The length must be a power of two no larger than
///   [FFT_SIZE_MAX].
/// * `direction` - Sign of the twiddle exponent.
pub fn fft(data: &mut [Complex<f32>], direction: Direction) {
    let n = data.len();
    assert!(n.is_power_of_two() && n <= FFT_SIZE_MAX);
    if n < 2 {
        return;
    }

    let levels = n.trailing_zeros();
    for i in 0..n {
        let j = i.reverse_bits() >> (usize::BITS - levels);
        if j > i {
            data.swap(i, j);
        }
    }

    let mut size = 2;
    while size <= n {
        let half = size / 2;
        let stride = FFT_SIZE_MAX / size;
        for start in (0..n).step_by(size) {
            for k in 0..half {
                let (cos, sin) = TWIDDLE[k * stride];
                let w = match direction {
                    Direction::Forward => Complex::new(cos, -sin),
                    Direction::Inverse => Complex::new(cos, sin),
                };
                let t = data[start + k + half] * w;
                data[start + k + half] = data[start + k] - t;
                data[start + k] += t;
            }
        }
        size <<= 1;
    }
}
