mod common;

use lumen_core::align::{warp, AlignmentField, FrameAlignment, TileAligner};
use lumen_core::pipeline::config::AlignmentParams;

use common::{max_abs_diff, noise_frame, noise_plane, shift_frame_integer};

#[test]
fn test_identical_frames_align_to_zero() {
    let luma = noise_plane(64, 64, 11);
    let mut aligner = TileAligner::new(AlignmentParams::default());
    aligner.set_reference(luma.clone());

    let alignment = aligner.align(&luma);
    assert!(alignment.is_valid);
    assert!((alignment.confidence - 1.0).abs() < 1e-3);
    assert_eq!(alignment.average_motion, 0.0);

    let AlignmentField::Tiles { field, .. } = &alignment.field else {
        panic!("tile aligner must produce a tile field");
    };
    for mv in field.iter() {
        assert_eq!((mv.dx, mv.dy), (0, 0));
        assert!(mv.cost < 1e-6, "cost {}", mv.cost);
    }
}

#[test]
fn test_integer_shift_burst() {
    // White noise shifted by exactly (+1, 0).
    let reference = noise_frame(64, 64, 21);
    let shifted = shift_frame_integer(&reference, 1, 0);

    let params = AlignmentParams {
        tile_size: 32,
        search_radius: 2,
        ..AlignmentParams::default()
    };
    let mut aligner = TileAligner::new(params);
    aligner.set_reference(reference.luminance());

    let alignment = aligner.align(&shifted.luminance());
    assert!(alignment.is_valid);
    assert!((alignment.average_motion - 1.0).abs() < 1e-6);

    let AlignmentField::Tiles { field, .. } = &alignment.field else {
        panic!("tile aligner must produce a tile field");
    };
    for mv in field.iter() {
        assert_eq!((mv.dx, mv.dy), (1, 0), "cost {}", mv.cost);
        assert!(mv.cost < 1e-5);
    }
}

#[test]
fn test_alignment_without_reference_is_invalid() {
    let aligner = TileAligner::new(AlignmentParams::default());
    let alignment = aligner.align(&noise_plane(32, 32, 3));
    assert!(!alignment.is_valid);
}

#[test]
fn test_warp_identity_is_identity() {
    let frame = noise_frame(48, 48, 31);
    let identity = FrameAlignment::identity(48, 48, 32);
    let warped = warp(&frame, &identity);
    assert!(max_abs_diff(&frame, &warped) < 1e-6);
}

#[test]
fn test_warp_undoes_integer_shift() {
    let reference = noise_frame(64, 64, 41);
    let shifted = shift_frame_integer(&reference, 2, 1);

    let params = AlignmentParams {
        tile_size: 32,
        search_radius: 4,
        ..AlignmentParams::default()
    };
    let mut aligner = TileAligner::new(params);
    aligner.set_reference(reference.luminance());
    let alignment = aligner.align(&shifted.luminance());

    let warped = warp(&shifted, &alignment);

    // Interior pixels must match the reference exactly; the border strip
    // carries clamped samples.
    let mut max = 0.0f32;
    for row in 4..60 {
        for col in 4..60 {
            for (a, b) in [
                (&warped.red, &reference.red),
                (&warped.green, &reference.green),
                (&warped.blue, &reference.blue),
            ] {
                max = max.max((a[[row, col]] - b[[row, col]]).abs());
            }
        }
    }
    assert!(max < 1e-5, "interior mismatch {max}");
}

#[test]
fn test_resample_to_coarser_tile_grid() {
    let luma = noise_plane(64, 64, 51);
    let shifted = {
        let mut plane = luma.clone();
        for row in 0..64 {
            for col in (1..64).rev() {
                plane[[row, col]] = luma[[row, col - 1]];
            }
        }
        plane
    };

    let params = AlignmentParams {
        tile_size: 16,
        search_radius: 2,
        ..AlignmentParams::default()
    };
    let mut aligner = TileAligner::new(params);
    aligner.set_reference(luma.clone());
    let alignment = aligner.align(&shifted);

    // Resampled onto a 32px grid the motion stays (+1, 0).
    let field = alignment.to_motion_field(64, 64, 32);
    assert_eq!(field.dim(), (2, 2));
    for mv in field.iter() {
        assert_eq!((mv.dx, mv.dy), (1, 0));
    }
}
