mod common;

use lumen_core::align::flow::{flow_to_motion_field, DenseOpticalFlow, FlowVector};
use lumen_core::frame::GyroHomography;
use lumen_core::pipeline::config::FlowParams;
use ndarray::Array2;

use common::smooth_frame;

#[test]
fn test_identical_frames_have_near_zero_flow() {
    let luma = smooth_frame(64, 64, 0.0, 0.0).luminance();
    let mut engine = DenseOpticalFlow::new(FlowParams::default(), 3);
    engine.set_reference(luma.clone());

    let result = engine.compute(&luma, None).unwrap();
    assert!(result.is_valid, "coverage {}", result.coverage);
    assert!(result.average_flow < 0.1, "flow {}", result.average_flow);
    assert!(result.coverage > 0.5);
}

#[test]
fn test_subpixel_shift_recovered() {
    let reference = smooth_frame(64, 64, 0.0, 0.0).luminance();
    let target = smooth_frame(64, 64, 0.6, 0.0).luminance();

    let mut engine = DenseOpticalFlow::new(FlowParams::default(), 3);
    engine.set_reference(reference);
    let result = engine.compute(&target, None).unwrap();

    // Mean flow over confident pixels should track the injected shift.
    let mut sum_dx = 0.0f32;
    let mut count = 0usize;
    for fv in result.flow.iter() {
        if fv.confidence > 0.3 {
            sum_dx += fv.dx;
            count += 1;
        }
    }
    assert!(count > 0);
    let mean_dx = sum_dx / count as f32;
    assert!(
        (mean_dx - 0.6).abs() < 0.3,
        "mean dx {mean_dx}, expected about 0.6"
    );
}

#[test]
fn test_missing_reference_errors() {
    let engine = DenseOpticalFlow::new(FlowParams::default(), 3);
    let target = smooth_frame(32, 32, 0.0, 0.0).luminance();
    assert!(engine.compute(&target, None).is_err());
}

#[test]
fn test_flow_to_motion_field_rounds_and_invalidates() {
    let mut flow = Array2::from_elem((32, 64), FlowVector::new(1.4, -0.6, 0.9));
    // Right half has no confident vectors.
    for row in 0..32 {
        for col in 32..64 {
            flow[[row, col]] = FlowVector::new(5.0, 5.0, 0.05);
        }
    }

    let field = flow_to_motion_field(&flow, 32, 0.3);
    assert_eq!(field.dim(), (1, 2));

    let confident = &field[[0, 0]];
    assert!(confident.is_valid());
    assert_eq!((confident.dx, confident.dy), (1, -1));

    assert!(!field[[0, 1]].is_valid());
}

#[test]
fn test_gyro_translation_seeds_flow() {
    // Pure-translation homography: flow equals the translation everywhere.
    let homography = GyroHomography::new([1.0, 0.0, 3.0, 0.0, 1.0, -2.0, 0.0, 0.0, 1.0]);
    assert!(homography.is_valid);
    for &(x, y) in &[(0.0f32, 0.0f32), (17.0, 5.0), (100.0, 42.0)] {
        let (dx, dy) = homography.initial_flow(x, y);
        approx::assert_abs_diff_eq!(dx, 3.0, epsilon = 1e-5);
        approx::assert_abs_diff_eq!(dy, -2.0, epsilon = 1e-5);
    }
}

#[test]
fn test_flow_deterministic() {
    let reference = smooth_frame(96, 96, 0.0, 0.0).luminance();
    let target = smooth_frame(96, 96, 0.4, 0.3).luminance();

    let mut engine = DenseOpticalFlow::new(FlowParams::default(), 3);
    engine.set_reference(reference);

    let a = engine.compute(&target, None).unwrap();
    let b = engine.compute(&target, None).unwrap();
    for (fa, fb) in a.flow.iter().zip(b.flow.iter()) {
        assert_eq!(fa.dx.to_bits(), fb.dx.to_bits());
        assert_eq!(fa.dy.to_bits(), fb.dy.to_bits());
        assert_eq!(fa.confidence.to_bits(), fb.confidence.to_bits());
    }
}
