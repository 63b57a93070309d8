use std::fmt;
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use crate::frame::RgbFrame;

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq)]
pub enum PipelineStage {
    Ingest,
    Aligning,
    Merging,
    MotionCheck,
    ProcessingTiles,
    Fallback,
    Complete,
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Ingest => write!(f, "Ingesting frames"),
            Self::Aligning => write!(f, "Aligning frames"),
            Self::Merging => write!(f, "Merging frames"),
            Self::MotionCheck => write!(f, "Checking global motion"),
            Self::ProcessingTiles => write!(f, "Processing tiles"),
            Self::Fallback => write!(f, "Single-frame fallback"),
            Self::Complete => write!(f, "Complete"),
        }
    }
}

/// Thread-safe progress sink for the pipeline.
///
/// The default implementation discards everything, so embedders only
/// implement what they need.
pub trait ProgressSink: Send + Sync {
    fn report(&self, _stage: PipelineStage, _fraction: f32, _message: &str) {}
}

/// Sink that discards all progress.
pub struct NoOpSink;
impl ProgressSink for NoOpSink {}

/// Cooperative cancellation flag, checked between stages and at tile
/// boundaries.
#[derive(Clone, Default)]
pub struct CancelToken(Arc<AtomicBool>);

impl CancelToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.0.store(true, Ordering::Relaxed);
    }

    pub fn is_cancelled(&self) -> bool {
        self.0.load(Ordering::Relaxed)
    }
}

/// Why the pipeline fell back to a single-frame upscale.
#[derive(Clone, Copy, Debug, PartialEq, Default)]
pub enum FallbackReason {
    #[default]
    None,
    ExcessiveMotion,
    LowCoverage,
    FlowFailed,
    MemoryExceeded,
    AlignmentFailed,
}

impl fmt::Display for FallbackReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "none"),
            Self::ExcessiveMotion => write!(f, "excessive motion"),
            Self::LowCoverage => write!(f, "low coverage"),
            Self::FlowFailed => write!(f, "optical flow failed"),
            Self::MemoryExceeded => write!(f, "memory budget exceeded"),
            Self::AlignmentFailed => write!(f, "alignment failed"),
        }
    }
}

/// Final pipeline output plus diagnostics.
#[derive(Clone, Debug)]
pub struct PipelineResult {
    pub output: RgbFrame,
    pub input_width: usize,
    pub input_height: usize,
    pub output_width: usize,
    pub output_height: usize,
    pub tiles_processed: usize,
    pub tiles_failed: usize,
    pub average_flow: f32,
    pub coverage: f32,
    pub average_subpixel_shift: f32,
    pub frames_used: usize,
    pub fallback_reason: FallbackReason,
    pub used_fallback: bool,
    pub cancelled: bool,
    pub sanitized_pixels: usize,
    pub success: bool,
}

impl PipelineResult {
    /// Empty result scaffold for the given input dimensions.
    pub fn empty(input_width: usize, input_height: usize) -> Self {
        Self {
            output: RgbFrame::black(0, 0),
            input_width,
            input_height,
            output_width: 0,
            output_height: 0,
            tiles_processed: 0,
            tiles_failed: 0,
            average_flow: 0.0,
            coverage: 0.0,
            average_subpixel_shift: 0.0,
            frames_used: 0,
            fallback_reason: FallbackReason::None,
            used_fallback: false,
            cancelled: false,
            sanitized_pixels: 0,
            success: false,
        }
    }
}
