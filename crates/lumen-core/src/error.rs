use thiserror::Error;

#[derive(Error, Debug)]
pub enum LumenError {
    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Frame {index} is {width}x{height}, expected {expected_width}x{expected_height}")]
    DimensionMismatch {
        index: usize,
        width: usize,
        height: usize,
        expected_width: usize,
        expected_height: usize,
    },

    #[error("Reference frame not set")]
    ReferenceNotSet,

    #[error("Alignment failed: {0}")]
    AlignmentFailed(String),

    #[error("Optical flow coverage {coverage:.2} below minimum {minimum:.2}")]
    FlowFailed { coverage: f32, minimum: f32 },

    #[error("Accumulator coverage {coverage:.2} below minimum fill rate")]
    LowCoverage { coverage: f32 },

    #[error("Failed to allocate scratch buffer ({bytes} bytes)")]
    AllocationFailure { bytes: usize },

    #[error("Operation cancelled")]
    Cancelled,

    #[error("Numeric fault after {stage}: {count} non-finite values")]
    NumericFault { stage: String, count: usize },
}

pub type Result<T> = std::result::Result<T, LumenError>;
