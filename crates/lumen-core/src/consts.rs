/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Separable 5-tap Gaussian kernel: [1, 4, 6, 4, 1] / 16.
pub const GAUSSIAN_KERNEL_5: [f32; 5] = [
    1.0 / 16.0,
    4.0 / 16.0,
    6.0 / 16.0,
    4.0 / 16.0,
    1.0 / 16.0,
];

/// Pyramid construction stops before a level smaller than this in either axis.
pub const MIN_PYRAMID_DIM: usize = 4;

pub const DEFAULT_TILE_SIZE: usize = 32;
pub const DEFAULT_SEARCH_RADIUS: i32 = 8;
pub const DEFAULT_PYRAMID_LEVELS: usize = 4;

pub const DEFAULT_FLOW_WINDOW: usize = 15;
pub const DEFAULT_FLOW_ITERATIONS: usize = 10;
pub const DEFAULT_FLOW_CONVERGENCE: f32 = 1e-2;
pub const DEFAULT_MIN_EIGEN: f32 = 1e-3;
/// Flow vectors below this confidence are not kept during refinement.
pub const DEFAULT_MIN_VALID_CONFIDENCE: f32 = 0.1;
/// Flow vectors above this confidence count toward coverage statistics.
pub const DEFAULT_HIGH_CONFIDENCE: f32 = 0.3;
/// A flow field is valid when at least this fraction of pixels is confident.
pub const DEFAULT_MIN_COVERAGE: f32 = 0.5;

pub const DEFAULT_TRIM_RATIO: f32 = 0.2;
pub const DEFAULT_HUBER_DELTA: f32 = 1.0;
pub const DEFAULT_WIENER_WINDOW: usize = 5;
pub const DEFAULT_WIENER_NOISE_VAR: f32 = 0.01;

pub const DEFAULT_SCALE_FACTOR: usize = 2;
/// Radius of the Lanczos reconstruction kernel used for tile splatting.
pub const LANCZOS_A: f32 = 2.0;
/// Sigma of the radial Gaussian splat used by weighted accumulation.
pub const GAUSSIAN_SPLAT_SIGMA: f32 = 0.7;
/// Splat contributions below this weight are dropped.
pub const MIN_SPLAT_WEIGHT: f32 = 0.01;
pub const GAP_FILL_PASSES: usize = 3;
/// Weight assigned to gap-filled cells so they normalize but stay
/// distinguishable from sampled cells.
pub const GAP_FILL_SENTINEL_WEIGHT: f32 = 1e-3;
/// Sub-pixel refinement is rejected when it worsens the SAD by this factor.
pub const SUBPIXEL_REJECT_FACTOR: f32 = 1.1;

pub const DEFAULT_SR_TILE: usize = 256;
pub const DEFAULT_SR_OVERLAP: usize = 32;
pub const DEFAULT_ROBUSTNESS_THRESHOLD: f32 = 0.8;
pub const DEFAULT_MAX_MEMORY_MB: usize = 200;
pub const DEFAULT_FALLBACK_MOTION_PX: f32 = 50.0;
/// A tile is kept only when at least this fraction of its cells is covered.
pub const MIN_TILE_COVERAGE: f32 = 0.5;

pub const GLOBAL_MOTION_BLOCK: usize = 16;
pub const GLOBAL_MOTION_STRIDE: usize = 32;
pub const GLOBAL_MOTION_RADIUS: i32 = 16;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f32 = 1e-10;
