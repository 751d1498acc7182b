mod common;

use common::{assert_close, ErrorModel, Rig};
use nanovna::{
    calibration::Standard,
    capture::Capture,
    design_parameters::BANDWIDTH_4000,
    pipeline::Pipeline,
    settings::Settings,
    snapshot::SweepBuffers,
    sweep::{Orchestrator, SweepMask},
    Complex,
};

const N: usize = 21;

const BRIDGE: ErrorModel = ErrorModel {
    directivity: Complex::new(0.15, 0.05),
    source_match: Complex::new(0.2, -0.1),
    tracking: Complex::new(0.9, 0.1),
};

fn settings() -> Settings {
    let mut s = Settings::default();
    s.sweep.start = 1_000_000;
    s.sweep.stop = 21_000_000;
    s.sweep.points = N as u16;
    s.sweep.bandwidth = BANDWIDTH_4000;
    s
}

fn calibrated<'a>(capture: &'a Capture, buffers: &SweepBuffers<N>) -> Pipeline<'a, Rig<'a>, N> {
    let settings = settings();
    let rig = Rig::new(capture);
    rig.model.set(BRIDGE);
    let orchestrator = Orchestrator::new(rig, capture, settings.plan());
    let mut pipeline = Pipeline::new(orchestrator, settings);
    for (standard, gamma) in [
        (Standard::Load, 0.),
        (Standard::Open, 1.),
        (Standard::Short, -1.),
    ] {
        pipeline
            .orchestrator()
            .frontend()
            .reflection
            .set(Complex::new(gamma, 0.));
        pipeline.calibrate(standard, buffers).unwrap();
    }
    pipeline.finish_calibration();
    pipeline
}

#[test]
fn one_port_correction_recovers_reflection() {
    let capture = Capture::new();
    let buffers = SweepBuffers::<N>::new();
    let mut pipeline = calibrated(&capture, &buffers);
    assert_eq!(buffers.generation(), 3);

    let status = pipeline.calibration().status();
    assert!(status.apply() && status.es() && status.er());
    assert!(!status.interpolated());

    let dut = Complex::new(0.3, 0.2);
    pipeline.orchestrator().frontend().reflection.set(dut);
    let mask = pipeline.active_channel_mask();
    assert!(mask.apply_calibration() && !mask.interpolate());

    let mut measured = [[Complex::new(0., 0.); N]; 2];
    assert_eq!(pipeline.execute(&mut measured, false, mask), Ok(true));
    for v in &measured[0] {
        assert_close(*v, dut, 1e-2);
    }

    // The uncorrected reading is visibly off.
    let raw = SweepMask::DEFAULT.with_ch0(true);
    pipeline.execute(&mut measured, false, raw).unwrap();
    let bridged = BRIDGE.measure(dut);
    assert_close(measured[0][0], bridged, 1e-2);
    assert!((bridged - dut).norm() > 0.1);
    assert!((measured[0][0] - dut).norm() > 0.1);
}

#[test]
fn sub_span_uses_interpolated_terms() {
    let capture = Capture::new();
    let buffers = SweepBuffers::<N>::new();
    let mut pipeline = calibrated(&capture, &buffers);

    let mut s = pipeline.settings().clone();
    s.sweep.start = 3_500_000;
    s.sweep.stop = 13_500_000;
    s.sweep.points = 11;
    pipeline.apply_settings(s);
    assert!(pipeline.calibration().status().interpolated());

    let dut = Complex::new(-0.2, 0.4);
    pipeline.orchestrator().frontend().reflection.set(dut);
    let mask = pipeline.active_channel_mask();
    assert!(mask.interpolate());

    let mut measured = [[Complex::new(0., 0.); N]; 2];
    assert_eq!(pipeline.execute(&mut measured, false, mask), Ok(true));
    for v in &measured[0][..11] {
        assert_close(*v, dut, 1e-2);
    }
}

#[test]
fn new_standard_invalidates_correction() {
    let capture = Capture::new();
    let buffers = SweepBuffers::<N>::new();
    let mut pipeline = calibrated(&capture, &buffers);
    pipeline.calibrate(Standard::Open, &buffers).unwrap();
    let status = pipeline.calibration().status();
    assert!(!status.apply() && !status.es());
    assert!(!pipeline.active_channel_mask().apply_calibration());
}

#[test]
fn restored_calibration_follows_the_active_plan() {
    let capture = Capture::new();
    let buffers = SweepBuffers::<N>::new();
    let source = calibrated(&capture, &buffers);
    assert!(!source.calibration().status().interpolated());
    let mut buf = [0u8; 2048];
    let bytes = source.calibration().to_record().encode(&mut buf).unwrap();

    let other = Capture::new();
    let mut s = settings();
    s.sweep.start = 3_500_000;
    s.sweep.stop = 13_500_000;
    s.sweep.points = 11;
    let rig = Rig::new(&other);
    rig.model.set(BRIDGE);
    let orchestrator = Orchestrator::new(rig, &other, s.plan());
    let mut pipeline = Pipeline::new(orchestrator, s);
    pipeline.restore_calibration(bytes, 1).unwrap();

    // Saved on the full span, loaded on a sub-span.
    let status = pipeline.calibration().status();
    assert!(status.apply() && status.interpolated());
    assert_eq!(pipeline.calibration().save_slot(), 1);

    let dut = Complex::new(0.25, -0.3);
    pipeline.orchestrator().frontend().reflection.set(dut);
    let mask = pipeline.active_channel_mask();
    assert!(mask.apply_calibration() && mask.interpolate());
    let mut measured = [[Complex::new(0., 0.); N]; 2];
    assert_eq!(pipeline.execute(&mut measured, false, mask), Ok(true));
    for v in &measured[0][..11] {
        assert_close(*v, dut, 1e-2);
    }

    // Back on the calibration span the exact terms apply again.
    pipeline.apply_settings(settings());
    assert!(!pipeline.calibration().status().interpolated());
}
