#![cfg_attr(not(test), no_std)]

pub use num_complex::Complex;

mod accu;
pub use accu::*;
mod complex;
pub use complex::*;
mod fft;
pub use fft::*;
mod window;
pub use window::*;

pub mod testing;
