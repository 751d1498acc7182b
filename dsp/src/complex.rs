use num_complex::Complex;
use num_traits::Float;

pub trait ComplexExt {
    /// Rotate by `turns` full revolutions (`2π·turns` radians).
    fn rotate_turns(self, turns: f32) -> Self;

    /// Division that substitutes `fallback` when the squared magnitude of the
    /// denominator is at or below `epsilon`.
    fn div_or(self, denominator: Self, epsilon: f32, fallback: Self) -> Self;
}

impl ComplexExt for Complex<f32> {
    fn rotate_turns(self, turns: f32) -> Self {
        // Only the fractional turn matters; reducing first keeps precision
        // for long delays at high frequency.
        let (sin, cos) =
            (core::f32::consts::TAU * (turns - turns.floor())).sin_cos();
        Complex::new(
            self.re * cos - self.im * sin,
            self.im * cos + self.re * sin,
        )
    }

    fn div_or(self, denominator: Self, epsilon: f32, fallback: Self) -> Self {
        if denominator.norm_sqr() <= epsilon {
            fallback
        } else {
            self / denominator
        }
    }
}
