mod common;

use lumen_core::frame::RgbFrame;
use lumen_core::pipeline::config::BurstConfig;
use lumen_core::pipeline::types::{CancelToken, FallbackReason, NoOpSink, PipelineResult};
use lumen_core::tiled::fallback::bilinear_upscale;
use lumen_core::tiled::TiledPipeline;
use ndarray::Array2;

use common::{constant_frame, luminances, max_abs_diff, smooth_frame};

fn run(config: BurstConfig, frames: &[RgbFrame], reference: usize) -> PipelineResult {
    let luma = luminances(frames);
    TiledPipeline::new(config)
        .process(frames, &luma, reference, None, &CancelToken::new(), &NoOpSink)
        .unwrap()
}

fn dithered_burst(size: usize) -> Vec<RgbFrame> {
    [(0.0, 0.0), (0.5, 0.0), (0.0, 0.5), (0.5, 0.5)]
        .iter()
        .map(|&(dx, dy)| smooth_frame(size, size, dx, dy))
        .collect()
}

fn tiled_config(tile: usize, overlap: usize) -> BurstConfig {
    let mut config = BurstConfig::default();
    config.tiled.tile_width = tile;
    config.tiled.tile_height = tile;
    config.tiled.overlap = overlap;
    config
}

#[test]
fn test_tiled_matches_single_tile() {
    // The tile decomposition is invisible up to blending tolerance.
    let burst = dithered_burst(96);

    let tiled = run(tiled_config(48, 16), &burst, 0);
    let single = run(tiled_config(256, 16), &burst, 0);

    assert!(tiled.success && !tiled.used_fallback);
    assert!(single.success && !single.used_fallback);
    assert_eq!(single.tiles_processed, 1);
    assert!(tiled.tiles_processed > 1);

    let diff = max_abs_diff(&tiled.output, &single.output);
    assert!(diff <= 2.0 / 255.0, "tiled vs single-tile diff {diff}");
}

#[test]
fn test_zero_overlap_seams_match() {
    // With overlap 0 the tiles partition the image exactly.
    let frame = constant_frame(96, 96, 0.6);
    let burst = vec![frame.clone(), frame.clone(), frame.clone(), frame];

    let tiled = run(tiled_config(48, 0), &burst, 0);
    let single = run(tiled_config(256, 0), &burst, 0);

    assert!(tiled.success);
    let diff = max_abs_diff(&tiled.output, &single.output);
    assert!(diff < 1e-5, "seam diff {diff}");
    assert!(tiled
        .output
        .red
        .iter()
        .all(|&v| (v - 0.6).abs() < 1e-4));
}

#[test]
fn test_tile_larger_than_image() {
    // One tile spans the whole image.
    let burst = dithered_burst(64);
    let result = run(tiled_config(256, 32), &burst, 0);

    assert!(result.success);
    assert_eq!(result.tiles_processed, 1);
    assert_eq!(result.output.width(), 128);
    assert_eq!(result.output.height(), 128);
}

#[test]
fn test_excessive_motion_falls_back() {
    // A 120px global shift trips the motion screen.
    let size = 256;
    let mut ramp = constant_frame(size, size, 0.0);
    for row in 0..size {
        for col in 0..size {
            let v = (row + col) as f32 / (2 * size) as f32;
            ramp.red[[row, col]] = v;
            ramp.green[[row, col]] = v;
            ramp.blue[[row, col]] = v;
        }
    }
    let shifted = common::shift_frame_integer(&ramp, 120, 0);
    let burst = vec![ramp.clone(), shifted];

    let result = run(BurstConfig::default(), &burst, 0);

    assert!(result.success);
    assert!(result.used_fallback);
    assert_eq!(result.fallback_reason, FallbackReason::ExcessiveMotion);
    assert_eq!(result.tiles_processed, 0);
    assert_eq!(result.frames_used, 1);

    let expected = bilinear_upscale(&ramp, 2);
    assert!(max_abs_diff(&result.output, &expected) < 1e-6);
}

#[test]
fn test_single_frame_falls_back_to_bilinear() {
    // One frame cannot super-resolve; output is the bilinear upscale.
    let frame = smooth_frame(64, 64, 0.0, 0.0);
    let result = run(BurstConfig::default(), std::slice::from_ref(&frame), 0);

    assert!(result.success);
    assert!(result.used_fallback);
    assert_eq!(result.fallback_reason, FallbackReason::AlignmentFailed);

    let expected = bilinear_upscale(&frame, 2);
    assert!(max_abs_diff(&result.output, &expected) < 1e-5);

    // Odd output samples sit halfway between input samples.
    let mid = (frame.red[[10, 10]] + frame.red[[10, 11]]) / 2.0;
    assert!((result.output.red[[20, 21]] - mid).abs() < 1e-5);
}

#[test]
fn test_memory_budget_fallback() {
    let burst = dithered_burst(64);
    let mut config = BurstConfig::default();
    config.tiled.max_memory_mb = 0;

    let result = run(config, &burst, 0);
    assert!(result.used_fallback);
    assert_eq!(result.fallback_reason, FallbackReason::MemoryExceeded);
}

#[test]
fn test_cancellation_before_tiles() {
    let burst = dithered_burst(64);
    let luma = luminances(&burst);
    let cancel = CancelToken::new();
    cancel.cancel();

    let result = TiledPipeline::new(BurstConfig::default())
        .process(&burst, &luma, 0, None, &cancel, &NoOpSink)
        .unwrap();

    assert!(result.cancelled);
    assert!(!result.success);
    assert_eq!(result.tiles_processed, 0);
}

#[test]
fn test_empty_burst_is_invalid_input() {
    let frames: Vec<RgbFrame> = Vec::new();
    let luma: Vec<Array2<f32>> = Vec::new();
    let result =
        TiledPipeline::new(BurstConfig::default()).process(&frames, &luma, 0, None, &CancelToken::new(), &NoOpSink);
    assert!(result.is_err());
}

#[test]
fn test_deterministic_output() {
    // Identical inputs and parameters give byte-identical output.
    let burst = dithered_burst(96);
    let a = run(tiled_config(48, 16), &burst, 0);
    let b = run(tiled_config(48, 16), &burst, 0);

    for (pa, pb) in [
        (&a.output.red, &b.output.red),
        (&a.output.green, &b.output.green),
        (&a.output.blue, &b.output.blue),
    ] {
        assert!(pa.iter().zip(pb.iter()).all(|(x, y)| x.to_bits() == y.to_bits()));
    }
}

#[test]
fn test_output_finite_and_clamped() {
    // Every output value is finite and inside [0, 1].
    let burst = dithered_burst(96);
    let result = run(tiled_config(48, 16), &burst, 1);

    for plane in [&result.output.red, &result.output.green, &result.output.blue] {
        assert!(plane.iter().all(|&v| v.is_finite() && (0.0..=1.0).contains(&v)));
    }
}
