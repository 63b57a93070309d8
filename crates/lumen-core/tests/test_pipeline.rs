mod common;

use std::sync::{Arc, Mutex};

use lumen_core::error::LumenError;
use lumen_core::pipeline::config::{AlignmentMode, BurstConfig};
use lumen_core::pipeline::types::{PipelineStage, ProgressSink};
use lumen_core::pipeline::BurstPipeline;
use lumen_core::sanitize::{sanitize, ImageStats};

use common::{constant_frame, luminances, noise_frame, shift_frame_integer, smooth_frame};

#[test]
fn test_merge_of_shifted_burst_recovers_reference() {
    let reference = noise_frame(64, 64, 61);
    let burst = vec![
        reference.clone(),
        shift_frame_integer(&reference, 1, 0),
        shift_frame_integer(&reference, 0, 1),
        shift_frame_integer(&reference, 2, 1),
    ];
    let luma = luminances(&burst);

    let pipeline = BurstPipeline::new(BurstConfig::default()).unwrap();
    let alignments = pipeline.align(&luma, 0).unwrap();
    let result = pipeline.merge(&burst, &alignments, 0).unwrap();

    assert!(result.success);
    assert_eq!(result.output_width, 64);
    assert_eq!(result.output_height, 64);
    assert_eq!(result.sanitized_pixels, 0);

    // Warped frames agree with the reference away from the borders.
    let mut max = 0.0f32;
    for row in 4..60 {
        for col in 4..60 {
            max = max.max((result.output.red[[row, col]] - reference.red[[row, col]]).abs());
        }
    }
    assert!(max < 1e-4, "merge deviates from reference: {max}");
}

#[test]
fn test_mfsr_identity_burst_through_facade() {
    let frame = smooth_frame(64, 64, 0.0, 0.0);
    let burst: Vec<_> = (0..4).map(|_| frame.clone()).collect();
    let luma = luminances(&burst);

    let pipeline = BurstPipeline::new(BurstConfig::default()).unwrap();
    let result = pipeline.mfsr(&burst, &luma, 0, None).unwrap();

    assert!(result.success);
    assert!(!result.used_fallback);
    assert_eq!(result.output_width, 128);
    assert_eq!(result.output_height, 128);
    assert_eq!(result.sanitized_pixels, 0);
    assert!(result.coverage > 0.9);
}

#[test]
fn test_dense_flow_mode_alignment() {
    let mut config = BurstConfig::default();
    config.alignment.mode = AlignmentMode::DenseFlow;
    config.alignment.pyramid_levels = 3;

    let reference = smooth_frame(64, 64, 0.0, 0.0);
    let burst = vec![reference.clone(), smooth_frame(64, 64, 0.5, 0.0)];
    let luma = luminances(&burst);

    let pipeline = BurstPipeline::new(config).unwrap();
    let alignments = pipeline.align(&luma, 0).unwrap();

    assert!(alignments[0].is_valid);
    assert!((alignments[0].confidence - 1.0).abs() < 1e-6);
    assert!(alignments[1].is_valid, "flow coverage {}", alignments[1].confidence);
}

#[test]
fn test_hybrid_mode_alignment() {
    let mut config = BurstConfig::default();
    config.alignment.mode = AlignmentMode::Hybrid;
    config.alignment.pyramid_levels = 3;

    let reference = noise_frame(64, 64, 71);
    let burst = vec![reference.clone(), shift_frame_integer(&reference, 2, 0)];
    let luma = luminances(&burst);

    let pipeline = BurstPipeline::new(config).unwrap();
    let alignments = pipeline.align(&luma, 0).unwrap();
    assert!(alignments[1].is_valid);
}

#[test]
fn test_cancelled_pipeline_refuses_work() {
    let pipeline = BurstPipeline::new(BurstConfig::default()).unwrap();
    pipeline.cancel();

    let burst = vec![constant_frame(32, 32, 0.5), constant_frame(32, 32, 0.5)];
    let luma = luminances(&burst);
    assert!(matches!(
        pipeline.align(&luma, 0),
        Err(LumenError::Cancelled)
    ));
}

#[test]
fn test_progress_sink_receives_stages() {
    #[derive(Default)]
    struct RecordingSink {
        stages: Mutex<Vec<(PipelineStage, f32)>>,
    }
    impl ProgressSink for RecordingSink {
        fn report(&self, stage: PipelineStage, fraction: f32, _message: &str) {
            self.stages.lock().unwrap().push((stage, fraction));
        }
    }

    let sink = Arc::new(RecordingSink::default());
    let mut pipeline = BurstPipeline::new(BurstConfig::default()).unwrap();
    pipeline.set_progress_sink(sink.clone());

    let frame = smooth_frame(64, 64, 0.0, 0.0);
    let burst: Vec<_> = (0..3).map(|_| frame.clone()).collect();
    let luma = luminances(&burst);
    pipeline.mfsr(&burst, &luma, 0, None).unwrap();

    let stages = sink.stages.lock().unwrap();
    assert!(stages.iter().all(|&(_, f)| (0.0..=1.0).contains(&f)));
    assert!(stages.iter().any(|&(s, _)| s == PipelineStage::ProcessingTiles));
    assert!(stages.iter().any(|&(s, _)| s == PipelineStage::Complete));
}

#[test]
fn test_sanitizer_replaces_and_counts() {
    // Exact replacement count; the frame is healthy afterwards.
    let mut frame = constant_frame(16, 16, 0.5);
    frame.red[[0, 0]] = f32::NAN;
    frame.green[[1, 1]] = f32::INFINITY;
    frame.blue[[2, 2]] = f32::NEG_INFINITY;

    let before = ImageStats::scan(&frame);
    assert!(!before.healthy());
    assert_eq!(before.nan_count, 1);
    assert_eq!(before.inf_count, 2);

    let replaced = sanitize(&mut frame);
    assert_eq!(replaced, 3);

    let after = ImageStats::scan(&frame);
    assert!(after.healthy());
    assert_eq!(frame.red[[0, 0]], 0.0);
}

#[test]
fn test_merge_input_validation() {
    let pipeline = BurstPipeline::new(BurstConfig::default()).unwrap();
    let frame = constant_frame(16, 16, 0.5);

    // Fewer than two frames.
    let alignments = vec![lumen_core::align::FrameAlignment::identity(16, 16, 32)];
    assert!(pipeline
        .merge(std::slice::from_ref(&frame), &alignments, 0)
        .is_err());

    // Reference out of range.
    let burst = vec![frame.clone(), frame];
    let alignments = vec![
        lumen_core::align::FrameAlignment::identity(16, 16, 32),
        lumen_core::align::FrameAlignment::identity(16, 16, 32),
    ];
    assert!(pipeline.merge(&burst, &alignments, 9).is_err());
}
