use std::env;
use std::f64::consts::PI;
use std::fs::File;
use std::io::prelude::*;
use std::path::Path;

fn write_mixer_table() {
    // 12 kHz IF sampled at 192 kHz: three full periods per 48 sample buffer.
    const SAMPLES: usize = 48;
    const PERIODS: usize = 3;

    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("mixer_table.rs");
    let mut file = File::create(dest_path).unwrap();

    writeln!(file, "pub const MIXER_LEN: usize = {};", SAMPLES).unwrap();
    write!(file, "pub(crate) const MIXER: [(f32, f32); MIXER_LEN] = [")
        .unwrap();
    for i in 0..SAMPLES {
        if i % 2 == 0 {
            write!(file, "\n   ").unwrap();
        }
        let (sin, cos) =
            (2. * PI * (PERIODS * i) as f64 / SAMPLES as f64).sin_cos();
        write!(file, " ({:e}, {:e}),", sin as f32, cos as f32).unwrap();
    }
    writeln!(file, "\n];").unwrap();
}

fn write_twiddle_table() {
    const DEPTH: usize = 9;

    let out_dir = env::var_os("OUT_DIR").unwrap();
    let dest_path = Path::new(&out_dir).join("twiddle_table.rs");
    let mut file = File::create(dest_path).unwrap();

    writeln!(file, "pub const FFT_SIZE_MAX: usize = 1 << {};", DEPTH).unwrap();
    write!(file, "pub(crate) const TWIDDLE: [(f32, f32); FFT_SIZE_MAX / 2] = [")
        .unwrap();
    // Only the first half turn is needed by a radix-2 butterfly.
    for i in 0..(1 << (DEPTH - 1)) {
        if i % 2 == 0 {
            write!(file, "\n   ").unwrap();
        }
        let (sin, cos) = (2. * PI * i as f64 / (1 << DEPTH) as f64).sin_cos();
        write!(file, " ({:e}, {:e}),", cos as f32, sin as f32).unwrap();
    }
    writeln!(file, "\n];").unwrap();
}

fn main() {
    write_mixer_table();
    write_twiddle_table();
    println!("cargo:rerun-if-changed=build.rs");
}
