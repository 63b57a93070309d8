//! Gaussian pyramid construction for coarse-to-fine alignment.

use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::{GAUSSIAN_KERNEL_5, MIN_PYRAMID_DIM, PARALLEL_PIXEL_THRESHOLD};

/// Ordered sequence of progressively downsampled luminance planes.
/// Level 0 is the input; each further level is blurred with the separable
/// [1,4,6,4,1]/16 kernel and subsampled by 2. Construction stops before a
/// level smaller than 4x4 in either dimension.
#[derive(Clone, Debug, Default)]
pub struct GaussianPyramid {
    levels: Vec<Array2<f32>>,
}

impl GaussianPyramid {
    /// Build a pyramid with up to `max_levels` levels. The input becomes
    /// level 0 without copying. At least one level is always produced.
    pub fn build(image: Array2<f32>, max_levels: usize) -> Self {
        let mut levels = Vec::with_capacity(max_levels.max(1));
        levels.push(image);

        for i in 1..max_levels {
            let downsampled = downsample_2x(&levels[i - 1]);
            let (h, w) = downsampled.dim();
            if h < MIN_PYRAMID_DIM || w < MIN_PYRAMID_DIM {
                break;
            }
            levels.push(downsampled);
        }

        Self { levels }
    }

    pub fn num_levels(&self) -> usize {
        self.levels.len()
    }

    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }

    /// Get a level, clamping the index to the available range.
    pub fn level(&self, level: usize) -> &Array2<f32> {
        let idx = level.min(self.levels.len().saturating_sub(1));
        &self.levels[idx]
    }

    pub fn width_at(&self, level: usize) -> usize {
        self.level(level).ncols()
    }

    pub fn height_at(&self, level: usize) -> usize {
        self.level(level).nrows()
    }
}

/// Blur with the separable 5-tap kernel (clamped borders), then take every
/// other pixel.
fn downsample_2x(src: &Array2<f32>) -> Array2<f32> {
    let (h, w) = src.dim();
    let dst_h = h / 2;
    let dst_w = w / 2;
    if dst_h == 0 || dst_w == 0 {
        return Array2::zeros((dst_h, dst_w));
    }

    let blurred = blur_vertical(&blur_horizontal(src));

    let mut dst = Array2::<f32>::zeros((dst_h, dst_w));
    for row in 0..dst_h {
        for col in 0..dst_w {
            dst[[row, col]] = blurred[[row * 2, col * 2]];
        }
    }
    dst
}

fn blur_horizontal(src: &Array2<f32>) -> Array2<f32> {
    let (h, w) = src.dim();

    let blur_row = |row: usize| -> Vec<f32> {
        let mut out = vec![0.0f32; w];
        for (col, value) in out.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (k, &weight) in GAUSSIAN_KERNEL_5.iter().enumerate() {
                let sx = (col as i64 + k as i64 - 2).clamp(0, w as i64 - 1) as usize;
                sum += src[[row, sx]] * weight;
            }
            *value = sum;
        }
        out
    };

    collect_rows(h, w, blur_row)
}

fn blur_vertical(src: &Array2<f32>) -> Array2<f32> {
    let (h, w) = src.dim();

    let blur_row = |row: usize| -> Vec<f32> {
        let mut out = vec![0.0f32; w];
        for (col, value) in out.iter_mut().enumerate() {
            let mut sum = 0.0;
            for (k, &weight) in GAUSSIAN_KERNEL_5.iter().enumerate() {
                let sy = (row as i64 + k as i64 - 2).clamp(0, h as i64 - 1) as usize;
                sum += src[[sy, col]] * weight;
            }
            *value = sum;
        }
        out
    };

    collect_rows(h, w, blur_row)
}

/// Run a per-row kernel over the image, in parallel for large planes, and
/// reassemble rows in order so the result is identical either way.
fn collect_rows<F>(h: usize, w: usize, row_fn: F) -> Array2<f32>
where
    F: Fn(usize) -> Vec<f32> + Sync,
{
    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(&row_fn).collect()
    } else {
        (0..h).map(&row_fn).collect()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            result[[row, col]] = val;
        }
    }
    result
}
