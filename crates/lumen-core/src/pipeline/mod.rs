//! Engine facade: configuration, alignment, merging, super-resolution,
//! progress and cancellation.

pub mod config;
pub mod types;

use std::sync::Arc;

use ndarray::Array2;
use tracing::info;

use crate::align::{self, align_burst, FrameAlignment};
use crate::error::{LumenError, Result};
use crate::frame::{GyroHomography, RgbFrame};
use crate::merge::FrameMerger;
use crate::sanitize::{self, ImageStats};
use crate::tiled::TiledPipeline;

use self::config::{BurstConfig, MergeMethod};
use self::types::{CancelToken, NoOpSink, PipelineResult, PipelineStage, ProgressSink};

pub struct BurstPipeline {
    config: BurstConfig,
    cancel: CancelToken,
    sink: Arc<dyn ProgressSink>,
}

impl BurstPipeline {
    /// Create a pipeline with a validated configuration.
    pub fn new(config: BurstConfig) -> Result<Self> {
        config.validate()?;
        Ok(Self {
            config,
            cancel: CancelToken::new(),
            sink: Arc::new(NoOpSink),
        })
    }

    /// Replace the configuration. Invalid options are rejected and the
    /// previous configuration stays in effect.
    pub fn configure(&mut self, config: BurstConfig) -> Result<()> {
        config.validate()?;
        self.config = config;
        Ok(())
    }

    pub fn config(&self) -> &BurstConfig {
        &self.config
    }

    pub fn set_progress_sink(&mut self, sink: Arc<dyn ProgressSink>) {
        self.sink = sink;
    }

    /// Request cooperative cancellation of the running operation.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Token that can be handed to another thread to cancel this pipeline.
    pub fn cancel_token(&self) -> CancelToken {
        self.cancel.clone()
    }

    /// Align every frame of the burst toward the reference with the
    /// configured mode. The reference entry is the identity alignment.
    pub fn align(
        &self,
        luma: &[Array2<f32>],
        reference: usize,
    ) -> Result<Vec<FrameAlignment>> {
        if self.cancel.is_cancelled() {
            return Err(LumenError::Cancelled);
        }
        self.sink
            .report(PipelineStage::Aligning, 0.0, "Aligning frames");
        align_burst(
            luma,
            reference,
            &self.config.alignment,
            &self.config.flow,
            None,
        )
    }

    /// Warp the burst into the reference's coordinates and fuse it into a
    /// same-resolution output.
    pub fn merge(
        &self,
        frames: &[RgbFrame],
        alignments: &[FrameAlignment],
        reference: usize,
    ) -> Result<PipelineResult> {
        if frames.len() < 2 {
            return Err(LumenError::InvalidInput(
                "merge needs at least 2 frames".into(),
            ));
        }
        if frames.len() != alignments.len() {
            return Err(LumenError::InvalidInput(
                "frame count must match alignment count".into(),
            ));
        }
        if reference >= frames.len() {
            return Err(LumenError::InvalidInput(format!(
                "reference index {} out of range for {} frames",
                reference,
                frames.len()
            )));
        }
        if self.cancel.is_cancelled() {
            return Err(LumenError::Cancelled);
        }

        let (h, w) = frames[0].dim();
        self.sink.report(PipelineStage::Merging, 0.0, "Merging frames");

        let warped: Vec<RgbFrame> = frames
            .iter()
            .enumerate()
            .map(|(i, frame)| {
                if i == reference {
                    frame.clone()
                } else {
                    align::warp(frame, &alignments[i])
                }
            })
            .collect();

        if self.cancel.is_cancelled() {
            return Err(LumenError::Cancelled);
        }

        let merger = FrameMerger::new(self.config.merge.clone());
        let merged = match self.config.merge.method {
            MergeMethod::Mean => merger.merge_with_weights(&warped, alignments)?,
            _ => merger.merge(&warped)?,
        };

        let mut result = PipelineResult::empty(w, h);
        result.output = merged;
        result.output_width = w;
        result.output_height = h;
        result.frames_used = frames.len();
        result.coverage = 1.0;

        let mut motion_sum = 0.0f32;
        let mut motion_count = 0usize;
        for (i, alignment) in alignments.iter().enumerate() {
            if i != reference {
                motion_sum += alignment.average_motion;
                motion_count += 1;
            }
        }
        result.average_flow = if motion_count > 0 {
            motion_sum / motion_count as f32
        } else {
            0.0
        };

        self.finish(result, "merge")
    }

    /// Multi-frame super-resolution through the constant-memory tiled
    /// driver.
    pub fn mfsr(
        &self,
        frames: &[RgbFrame],
        luma: &[Array2<f32>],
        reference: usize,
        gyro: Option<&[GyroHomography]>,
    ) -> Result<PipelineResult> {
        let driver = TiledPipeline::new(self.config.clone());
        let result = driver.process(frames, luma, reference, gyro, &self.cancel, self.sink.as_ref())?;
        if result.cancelled {
            return Ok(result);
        }
        self.finish(result, "mfsr")
    }

    /// Final numeric safety pass shared by both output paths.
    fn finish(&self, mut result: PipelineResult, stage: &str) -> Result<PipelineResult> {
        result.sanitized_pixels = sanitize::sanitize(&mut result.output);
        if self.config.check_image_stats {
            ImageStats::scan(&result.output).log(stage);
        }
        if result.sanitized_pixels > 0 {
            info!(
                stage,
                sanitized = result.sanitized_pixels,
                "Replaced non-finite output values"
            );
        }
        if !result.used_fallback {
            result.success = true;
        }
        self.sink.report(PipelineStage::Complete, 1.0, "Complete");
        Ok(result)
    }
}
