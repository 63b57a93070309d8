//! High-resolution scatter accumulator with gap filling.

use ndarray::Array2;
use tracing::warn;

use crate::consts::{EPSILON, GAP_FILL_SENTINEL_WEIGHT};
use crate::frame::RgbFrame;

/// Planar accumulation grid. A cell is empty until at least one sample has
/// been deposited; normalization divides by the accumulated weight.
pub struct Accumulator {
    sum_r: Array2<f32>,
    sum_g: Array2<f32>,
    sum_b: Array2<f32>,
    weight: Array2<f32>,
    samples: Array2<u32>,
}

impl Accumulator {
    pub fn new(height: usize, width: usize) -> Self {
        Self {
            sum_r: Array2::zeros((height, width)),
            sum_g: Array2::zeros((height, width)),
            sum_b: Array2::zeros((height, width)),
            weight: Array2::zeros((height, width)),
            samples: Array2::zeros((height, width)),
        }
    }

    pub fn width(&self) -> usize {
        self.weight.ncols()
    }

    pub fn height(&self) -> usize {
        self.weight.nrows()
    }

    /// Number of bytes one cell occupies across the planes.
    pub const CELL_BYTES: usize = 4 * std::mem::size_of::<f32>() + std::mem::size_of::<u32>();

    #[inline]
    pub fn deposit(&mut self, row: usize, col: usize, rgb: [f32; 3], weight: f32) {
        self.sum_r[[row, col]] += rgb[0] * weight;
        self.sum_g[[row, col]] += rgb[1] * weight;
        self.sum_b[[row, col]] += rgb[2] * weight;
        self.weight[[row, col]] += weight;
        self.samples[[row, col]] += 1;
    }

    #[inline]
    fn cell_value(&self, row: usize, col: usize) -> [f32; 3] {
        let w = self.weight[[row, col]];
        if w > EPSILON {
            [
                self.sum_r[[row, col]] / w,
                self.sum_g[[row, col]] / w,
                self.sum_b[[row, col]] / w,
            ]
        } else {
            [0.0, 0.0, 0.0]
        }
    }

    /// Fraction of cells that received at least one sample (or were filled).
    pub fn coverage(&self) -> f32 {
        let total = self.samples.len();
        if total == 0 {
            return 0.0;
        }
        let filled = self.samples.iter().filter(|&&s| s > 0).count();
        filled as f32 / total as f32
    }

    /// Fill empty cells from their 8-neighborhood, up to `passes` times.
    ///
    /// A cell is filled with the inverse-distance weighted average of its
    /// non-empty neighbors and marked with a small sentinel weight. Cells
    /// with no non-empty neighbor are retried on the next pass; anything
    /// still empty afterwards stays black. Processing is row-major, so the
    /// result is deterministic.
    pub fn fill_gaps(&mut self, passes: usize) {
        let (h, w) = self.weight.dim();

        let mut gaps: Vec<(usize, usize)> = Vec::new();
        for row in 0..h {
            for col in 0..w {
                if self.samples[[row, col]] == 0 {
                    gaps.push((row, col));
                }
            }
        }

        for _ in 0..passes {
            if gaps.is_empty() {
                break;
            }
            let mut remaining = Vec::new();

            for &(row, col) in &gaps {
                let mut sum = [0.0f32; 3];
                let mut total_weight = 0.0f32;

                for dy in -1i64..=1 {
                    for dx in -1i64..=1 {
                        if dx == 0 && dy == 0 {
                            continue;
                        }
                        let ny = row as i64 + dy;
                        let nx = col as i64 + dx;
                        if ny < 0 || ny >= h as i64 || nx < 0 || nx >= w as i64 {
                            continue;
                        }
                        let (ny, nx) = (ny as usize, nx as usize);
                        if self.samples[[ny, nx]] == 0 {
                            continue;
                        }
                        let dist = ((dx * dx + dy * dy) as f32).sqrt();
                        let neighbor_weight = 1.0 / dist;
                        let value = self.cell_value(ny, nx);
                        sum[0] += value[0] * neighbor_weight;
                        sum[1] += value[1] * neighbor_weight;
                        sum[2] += value[2] * neighbor_weight;
                        total_weight += neighbor_weight;
                    }
                }

                if total_weight > 0.0 {
                    let filled = [
                        sum[0] / total_weight,
                        sum[1] / total_weight,
                        sum[2] / total_weight,
                    ];
                    self.sum_r[[row, col]] = filled[0] * GAP_FILL_SENTINEL_WEIGHT;
                    self.sum_g[[row, col]] = filled[1] * GAP_FILL_SENTINEL_WEIGHT;
                    self.sum_b[[row, col]] = filled[2] * GAP_FILL_SENTINEL_WEIGHT;
                    self.weight[[row, col]] = GAP_FILL_SENTINEL_WEIGHT;
                    self.samples[[row, col]] = 1;
                } else {
                    remaining.push((row, col));
                }
            }

            gaps = remaining;
        }

        if !gaps.is_empty() {
            warn!(
                remaining = gaps.len(),
                "Accumulator cells left empty after gap filling"
            );
        }
    }

    /// Normalize into an RGB frame. Covered cells are sum/weight clamped to
    /// [0, 1]; empty cells stay black.
    pub fn normalize(&self) -> RgbFrame {
        let (h, w) = self.weight.dim();
        let mut output = RgbFrame::black(h, w);
        for row in 0..h {
            for col in 0..w {
                if self.weight[[row, col]] > EPSILON {
                    let value = self.cell_value(row, col);
                    output.red[[row, col]] = value[0].clamp(0.0, 1.0);
                    output.green[[row, col]] = value[1].clamp(0.0, 1.0);
                    output.blue[[row, col]] = value[2].clamp(0.0, 1.0);
                }
            }
        }
        output
    }
}
