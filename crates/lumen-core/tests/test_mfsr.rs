mod common;

use lumen_core::align::FrameAlignment;
use lumen_core::mfsr::{Accumulator, MfsrResult, MultiFrameSr};
use lumen_core::pipeline::config::MfsrParams;

use common::{checkerboard, constant_frame, luminances, smooth_frame, smooth_pattern};

fn run_identity_burst(frames: usize, scale: usize, size: usize) -> MfsrResult {
    let frame = checkerboard(size, size, 8);
    let burst: Vec<_> = (0..frames).map(|_| frame.clone()).collect();
    let luma = luminances(&burst);
    let alignments: Vec<_> = (0..frames)
        .map(|_| FrameAlignment::identity(size, size, 32))
        .collect();

    let sr = MultiFrameSr::new(MfsrParams {
        scale_factor: scale,
        ..MfsrParams::default()
    });
    sr.process(&burst, &luma, 0, &alignments).unwrap()
}

#[test]
fn test_identity_burst_scale2() {
    // Identical frames reconstruct the input on the even grid.
    let size = 64;
    let result = run_identity_burst(8, 2, size);

    assert_eq!(result.image.width(), size * 2);
    assert_eq!(result.image.height(), size * 2);
    assert_eq!(result.frames_contributed, 8);
    assert!((result.coverage - 1.0).abs() < 1e-6, "coverage {}", result.coverage);

    let input = checkerboard(size, size, 8);
    for row in 0..size {
        for col in 0..size {
            let out = result.image.red[[row * 2, col * 2]];
            let expected = input.red[[row, col]];
            assert!(
                (out - expected).abs() < 1e-5,
                "({row},{col}): {out} vs {expected}"
            );
        }
    }
}

#[test]
fn test_output_in_range_and_finite() {
    let result = run_identity_burst(4, 3, 48);
    for plane in [&result.image.red, &result.image.green, &result.image.blue] {
        assert!(plane.iter().all(|&v| v.is_finite() && (0.0..=1.0).contains(&v)));
    }
}

#[test]
fn test_invalid_alignment_skipped() {
    let size = 32;
    let frame = checkerboard(size, size, 4);
    let burst = vec![frame.clone(), frame.clone(), frame];
    let luma = luminances(&burst);
    let alignments = vec![
        FrameAlignment::identity(size, size, 32),
        FrameAlignment::invalid(),
        FrameAlignment::identity(size, size, 32),
    ];

    let sr = MultiFrameSr::new(MfsrParams::default());
    let result = sr.process(&burst, &luma, 0, &alignments).unwrap();
    assert_eq!(result.frames_contributed, 2);
}

#[test]
fn test_half_pixel_dither_reconstruction() {
    // Four frames with half-pixel shifts reconstruct a 2x image.
    let size = 64;
    let shifts = [(0.0, 0.0), (0.5, 0.0), (0.0, 0.5), (0.5, 0.5)];
    let burst: Vec<_> = shifts
        .iter()
        .map(|&(dx, dy)| smooth_frame(size, size, dx, dy))
        .collect();
    let luma = luminances(&burst);
    let alignments: Vec<_> = (0..4)
        .map(|_| FrameAlignment::identity(size, size, 32))
        .collect();

    let sr = MultiFrameSr::new(MfsrParams {
        scale_factor: 2,
        ..MfsrParams::default()
    });
    let result = sr.process(&burst, &luma, 0, &alignments).unwrap();

    assert!(result.coverage >= 0.95, "coverage {}", result.coverage);
    assert_eq!(result.frames_contributed, 4);
    assert!(
        result.average_subpixel_shift > 0.25,
        "subpixel shift {}",
        result.average_subpixel_shift
    );

    // Compare the interior against the supersampled ground truth.
    let mut error_sum = 0.0f64;
    let mut count = 0usize;
    for row in 8..(size * 2 - 8) {
        for col in 8..(size * 2 - 8) {
            let truth = smooth_pattern(col as f32 / 2.0, row as f32 / 2.0);
            error_sum += (result.image.green[[row, col]] - truth).abs() as f64;
            count += 1;
        }
    }
    let mae = (error_sum / count as f64) as f32;
    assert!(mae < 0.05, "reconstruction MAE {mae}");
}

#[test]
fn test_gap_fill_converges_scale4() {
    // Sparse seeds at 4x spacing fill to near-complete coverage.
    let mut acc = Accumulator::new(64, 64);
    for row in (0..64).step_by(4) {
        for col in (0..64).step_by(4) {
            acc.deposit(row, col, [0.6, 0.6, 0.6], 1.0);
        }
    }
    assert!(acc.coverage() < 0.1);

    acc.fill_gaps(3);
    assert!(acc.coverage() >= 0.98, "coverage {}", acc.coverage());

    let image = acc.normalize();
    for plane in [&image.red, &image.green, &image.blue] {
        assert!(plane.iter().all(|v| v.is_finite()));
    }
    // Filled cells inherit the uniform seed value exactly.
    assert!((image.red[[1, 1]] - 0.6).abs() < 1e-5);
    assert!((image.red[[2, 2]] - 0.6).abs() < 1e-5);
}

#[test]
fn test_gap_fill_inverse_distance_average() {
    let mut acc = Accumulator::new(1, 3);
    acc.deposit(0, 0, [1.0, 1.0, 1.0], 1.0);
    acc.deposit(0, 2, [0.0, 0.0, 0.0], 1.0);

    acc.fill_gaps(1);
    let image = acc.normalize();
    // Equidistant neighbors average to 0.5.
    assert!((image.red[[0, 1]] - 0.5).abs() < 1e-6);
}

#[test]
fn test_empty_accumulator_stays_black() {
    let mut acc = Accumulator::new(16, 16);
    acc.fill_gaps(3);
    assert_eq!(acc.coverage(), 0.0);

    let image = acc.normalize();
    assert!(image.red.iter().all(|&v| v == 0.0));
}

#[test]
fn test_reference_index_validated() {
    let frame = constant_frame(16, 16, 0.5);
    let burst = vec![frame.clone(), frame];
    let luma = luminances(&burst);
    let alignments = vec![
        FrameAlignment::identity(16, 16, 32),
        FrameAlignment::identity(16, 16, 32),
    ];

    let sr = MultiFrameSr::new(MfsrParams::default());
    assert!(sr.process(&burst, &luma, 5, &alignments).is_err());
}

#[test]
fn test_deterministic_reconstruction() {
    let a = run_identity_burst(4, 2, 48);
    let b = run_identity_burst(4, 2, 48);
    for (pa, pb) in [
        (&a.image.red, &b.image.red),
        (&a.image.green, &b.image.green),
        (&a.image.blue, &b.image.blue),
    ] {
        assert!(pa.iter().zip(pb.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }
}
