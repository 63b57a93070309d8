use std::fmt;

use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_FALLBACK_MOTION_PX, DEFAULT_FLOW_CONVERGENCE, DEFAULT_FLOW_ITERATIONS,
    DEFAULT_FLOW_WINDOW, DEFAULT_HIGH_CONFIDENCE, DEFAULT_HUBER_DELTA, DEFAULT_MAX_MEMORY_MB,
    DEFAULT_MIN_COVERAGE, DEFAULT_MIN_EIGEN, DEFAULT_MIN_VALID_CONFIDENCE, DEFAULT_PYRAMID_LEVELS,
    DEFAULT_SCALE_FACTOR, DEFAULT_SEARCH_RADIUS, DEFAULT_SR_OVERLAP, DEFAULT_SR_TILE,
    DEFAULT_TILE_SIZE, DEFAULT_TRIM_RATIO, DEFAULT_WIENER_NOISE_VAR, DEFAULT_WIENER_WINDOW,
    DEFAULT_ROBUSTNESS_THRESHOLD,
};
use crate::error::{LumenError, Result};

/// Alignment algorithm for the same-resolution merge path.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum AlignmentMode {
    /// HDR+ style tile-based integer alignment.
    #[default]
    TileBased,
    /// Dense per-pixel Lucas-Kanade flow.
    DenseFlow,
    /// Tile-based alignment seeding dense flow refinement.
    Hybrid,
}

impl fmt::Display for AlignmentMode {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::TileBased => write!(f, "Tile-based"),
            Self::DenseFlow => write!(f, "Dense flow"),
            Self::Hybrid => write!(f, "Hybrid"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AlignmentParams {
    /// Tile edge length in pixels. Must be even and at least 8.
    #[serde(default = "default_tile_size")]
    pub tile_size: usize,
    /// Full-search radius around the initial motion, in pixels.
    #[serde(default = "default_search_radius")]
    pub search_radius: i32,
    /// Pyramid depth for coarse-to-fine alignment (1-6).
    #[serde(default = "default_pyramid_levels")]
    pub pyramid_levels: usize,
    #[serde(default)]
    pub mode: AlignmentMode,
}

fn default_tile_size() -> usize {
    DEFAULT_TILE_SIZE
}
fn default_search_radius() -> i32 {
    DEFAULT_SEARCH_RADIUS
}
fn default_pyramid_levels() -> usize {
    DEFAULT_PYRAMID_LEVELS
}

impl Default for AlignmentParams {
    fn default() -> Self {
        Self {
            tile_size: DEFAULT_TILE_SIZE,
            search_radius: DEFAULT_SEARCH_RADIUS,
            pyramid_levels: DEFAULT_PYRAMID_LEVELS,
            mode: AlignmentMode::default(),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct FlowParams {
    /// Lucas-Kanade window edge length. Must be odd and at least 3.
    #[serde(default = "default_flow_window")]
    pub window_size: usize,
    #[serde(default = "default_flow_iterations")]
    pub max_iterations: usize,
    #[serde(default = "default_flow_convergence")]
    pub convergence_threshold: f32,
    #[serde(default = "default_min_eigen")]
    pub min_eigen_threshold: f32,
    /// Seed the coarsest level from a gyro homography when one is given.
    #[serde(default)]
    pub use_gyro_init: bool,
    /// Refined vectors below this confidence are discarded.
    #[serde(default = "default_min_valid_confidence")]
    pub min_valid_confidence: f32,
    /// Vectors above this confidence count toward coverage.
    #[serde(default = "default_high_confidence")]
    pub high_confidence: f32,
    /// Minimum coverage for a flow field to be valid.
    #[serde(default = "default_min_coverage")]
    pub min_coverage: f32,
}

fn default_flow_window() -> usize {
    DEFAULT_FLOW_WINDOW
}
fn default_flow_iterations() -> usize {
    DEFAULT_FLOW_ITERATIONS
}
fn default_flow_convergence() -> f32 {
    DEFAULT_FLOW_CONVERGENCE
}
fn default_min_eigen() -> f32 {
    DEFAULT_MIN_EIGEN
}
fn default_min_valid_confidence() -> f32 {
    DEFAULT_MIN_VALID_CONFIDENCE
}
fn default_high_confidence() -> f32 {
    DEFAULT_HIGH_CONFIDENCE
}
fn default_min_coverage() -> f32 {
    DEFAULT_MIN_COVERAGE
}

impl Default for FlowParams {
    fn default() -> Self {
        Self {
            window_size: DEFAULT_FLOW_WINDOW,
            max_iterations: DEFAULT_FLOW_ITERATIONS,
            convergence_threshold: DEFAULT_FLOW_CONVERGENCE,
            min_eigen_threshold: DEFAULT_MIN_EIGEN,
            use_gyro_init: false,
            min_valid_confidence: DEFAULT_MIN_VALID_CONFIDENCE,
            high_confidence: DEFAULT_HIGH_CONFIDENCE,
            min_coverage: DEFAULT_MIN_COVERAGE,
        }
    }
}

/// Per-channel aggregation policy for the same-resolution merger.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum MergeMethod {
    #[default]
    Mean,
    Trimmed,
    Huber,
    Median,
}

impl fmt::Display for MergeMethod {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Mean => write!(f, "Mean"),
            Self::Trimmed => write!(f, "Trimmed mean"),
            Self::Huber => write!(f, "Huber"),
            Self::Median => write!(f, "Median"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MergeParams {
    #[serde(default)]
    pub method: MergeMethod,
    /// Fraction trimmed from each end, in [0, 0.5).
    #[serde(default = "default_trim_ratio")]
    pub trim_ratio: f32,
    #[serde(default = "default_huber_delta")]
    pub huber_delta: f32,
    #[serde(default)]
    pub apply_wiener: bool,
    /// Wiener window edge length. Must be odd and at least 3.
    #[serde(default = "default_wiener_window")]
    pub wiener_window: usize,
    #[serde(default = "default_wiener_noise_var")]
    pub wiener_noise_var: f32,
}

fn default_trim_ratio() -> f32 {
    DEFAULT_TRIM_RATIO
}
fn default_huber_delta() -> f32 {
    DEFAULT_HUBER_DELTA
}
fn default_wiener_window() -> usize {
    DEFAULT_WIENER_WINDOW
}
fn default_wiener_noise_var() -> f32 {
    DEFAULT_WIENER_NOISE_VAR
}

impl Default for MergeParams {
    fn default() -> Self {
        Self {
            method: MergeMethod::default(),
            trim_ratio: DEFAULT_TRIM_RATIO,
            huber_delta: DEFAULT_HUBER_DELTA,
            apply_wiener: false,
            wiener_window: DEFAULT_WIENER_WINDOW,
            wiener_noise_var: DEFAULT_WIENER_NOISE_VAR,
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct MfsrParams {
    /// Output scale factor, one of 2, 3 or 4.
    #[serde(default = "default_scale_factor")]
    pub scale_factor: usize,
    /// Tile size for sub-pixel motion refinement.
    #[serde(default = "default_tile_size")]
    pub tile_size: usize,
    /// Gaussian-radial confidence-weighted splatting instead of plain
    /// bilinear.
    #[serde(default = "default_true")]
    pub use_weighted_accumulation: bool,
}

fn default_scale_factor() -> usize {
    DEFAULT_SCALE_FACTOR
}
fn default_true() -> bool {
    true
}

impl Default for MfsrParams {
    fn default() -> Self {
        Self {
            scale_factor: DEFAULT_SCALE_FACTOR,
            tile_size: DEFAULT_TILE_SIZE,
            use_weighted_accumulation: true,
        }
    }
}

/// Outlier rejection applied during tiled accumulation.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize, Default)]
pub enum Robustness {
    None,
    #[default]
    Huber,
    Tukey,
}

impl fmt::Display for Robustness {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Huber => write!(f, "Huber"),
            Self::Tukey => write!(f, "Tukey"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TiledParams {
    #[serde(default = "default_sr_tile")]
    pub tile_width: usize,
    #[serde(default = "default_sr_tile")]
    pub tile_height: usize,
    /// Overlap between adjacent tiles in input pixels. Must be even.
    #[serde(default = "default_sr_overlap")]
    pub overlap: usize,
    #[serde(default)]
    pub robustness: Robustness,
    /// Residual threshold in linear-light units.
    #[serde(default = "default_robustness_threshold")]
    pub robustness_threshold: f32,
    /// Advisory per-tile scratch budget.
    #[serde(default = "default_max_memory_mb")]
    pub max_memory_mb: usize,
    /// Estimated global motion beyond this many pixels skips MFSR.
    #[serde(default = "default_fallback_motion_px")]
    pub fallback_motion_px: f32,
}

fn default_sr_tile() -> usize {
    DEFAULT_SR_TILE
}
fn default_sr_overlap() -> usize {
    DEFAULT_SR_OVERLAP
}
fn default_robustness_threshold() -> f32 {
    DEFAULT_ROBUSTNESS_THRESHOLD
}
fn default_max_memory_mb() -> usize {
    DEFAULT_MAX_MEMORY_MB
}
fn default_fallback_motion_px() -> f32 {
    DEFAULT_FALLBACK_MOTION_PX
}

impl Default for TiledParams {
    fn default() -> Self {
        Self {
            tile_width: DEFAULT_SR_TILE,
            tile_height: DEFAULT_SR_TILE,
            overlap: DEFAULT_SR_OVERLAP,
            robustness: Robustness::default(),
            robustness_threshold: DEFAULT_ROBUSTNESS_THRESHOLD,
            max_memory_mb: DEFAULT_MAX_MEMORY_MB,
            fallback_motion_px: DEFAULT_FALLBACK_MOTION_PX,
        }
    }
}

/// Complete engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct BurstConfig {
    #[serde(default)]
    pub alignment: AlignmentParams,
    #[serde(default)]
    pub flow: FlowParams,
    #[serde(default)]
    pub merge: MergeParams,
    #[serde(default)]
    pub mfsr: MfsrParams,
    #[serde(default)]
    pub tiled: TiledParams,
    /// Scan stage outputs for NaN/Inf and log image statistics.
    #[serde(default = "default_true")]
    pub check_image_stats: bool,
}

impl Default for BurstConfig {
    fn default() -> Self {
        Self {
            alignment: AlignmentParams::default(),
            flow: FlowParams::default(),
            merge: MergeParams::default(),
            mfsr: MfsrParams::default(),
            tiled: TiledParams::default(),
            check_image_stats: true,
        }
    }
}

impl BurstConfig {
    /// Validate the bounds of every option.
    pub fn validate(&self) -> Result<()> {
        if self.alignment.tile_size < 8 || self.alignment.tile_size % 2 != 0 {
            return Err(invalid("alignment.tile_size must be even and >= 8"));
        }
        if self.alignment.search_radius < 1 {
            return Err(invalid("alignment.search_radius must be >= 1"));
        }
        if !(1..=6).contains(&self.alignment.pyramid_levels) {
            return Err(invalid("alignment.pyramid_levels must be in 1..=6"));
        }
        if self.flow.window_size < 3 || self.flow.window_size % 2 == 0 {
            return Err(invalid("flow.window_size must be odd and >= 3"));
        }
        if self.flow.max_iterations < 1 {
            return Err(invalid("flow.max_iterations must be >= 1"));
        }
        if !(0.0..0.5).contains(&self.merge.trim_ratio) {
            return Err(invalid("merge.trim_ratio must be in [0, 0.5)"));
        }
        if self.merge.wiener_window < 3 || self.merge.wiener_window % 2 == 0 {
            return Err(invalid("merge.wiener_window must be odd and >= 3"));
        }
        if !(2..=4).contains(&self.mfsr.scale_factor) {
            return Err(invalid("mfsr.scale_factor must be 2, 3 or 4"));
        }
        if self.mfsr.tile_size < 8 {
            return Err(invalid("mfsr.tile_size must be >= 8"));
        }
        if self.tiled.overlap % 2 != 0 {
            return Err(invalid("tiled.overlap must be even"));
        }
        if self.tiled.tile_width <= self.tiled.overlap
            || self.tiled.tile_height <= self.tiled.overlap
        {
            return Err(invalid("tiled tile size must exceed the overlap"));
        }
        Ok(())
    }
}

fn invalid(message: &str) -> LumenError {
    LumenError::InvalidInput(message.to_string())
}
