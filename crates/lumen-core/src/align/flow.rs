//! Dense hierarchical Lucas-Kanade optical flow.
//!
//! Coarse-to-fine refinement over Gaussian pyramids with Scharr gradients.
//! Every pixel carries a sub-pixel displacement and a confidence derived
//! from the local structure tensor.

use ndarray::Array2;
use rayon::prelude::*;
use tracing::{debug, info};

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{LumenError, Result};
use crate::frame::{bilinear_sample, GyroHomography};
use crate::pipeline::config::FlowParams;
use crate::pyramid::GaussianPyramid;

use super::tile::MotionVector;

/// Sub-pixel displacement of one pixel with confidence in [0, 1].
#[derive(Clone, Copy, Debug, Default)]
pub struct FlowVector {
    pub dx: f32,
    pub dy: f32,
    pub confidence: f32,
}

impl FlowVector {
    pub fn new(dx: f32, dy: f32, confidence: f32) -> Self {
        Self { dx, dy, confidence }
    }

    pub fn magnitude(&self) -> f32 {
        (self.dx * self.dx + self.dy * self.dy).sqrt()
    }
}

/// Dense flow of one frame toward the reference, with aggregates.
#[derive(Clone, Debug)]
pub struct DenseFlowResult {
    pub flow: Array2<FlowVector>,
    pub average_flow: f32,
    pub coverage: f32,
    pub is_valid: bool,
}

/// Coarsest-level initialization for the flow field.
enum CoarseInit<'a> {
    Zero,
    Gyro(&'a GyroHomography),
    Tiles {
        field: &'a Array2<MotionVector>,
        tile_size: usize,
    },
}

pub struct DenseOpticalFlow {
    params: FlowParams,
    levels: usize,
    ref_pyramid: Option<GaussianPyramid>,
}

impl DenseOpticalFlow {
    pub fn new(params: FlowParams, levels: usize) -> Self {
        Self {
            params,
            levels,
            ref_pyramid: None,
        }
    }

    pub fn set_reference(&mut self, reference: Array2<f32>) {
        self.ref_pyramid = Some(GaussianPyramid::build(reference, self.levels));
    }

    /// Compute dense flow from the reference to `target`, optionally seeded
    /// by a gyro homography when the configuration enables it.
    pub fn compute(
        &self,
        target: &Array2<f32>,
        gyro: Option<&GyroHomography>,
    ) -> Result<DenseFlowResult> {
        let init = match gyro {
            Some(h) if self.params.use_gyro_init && h.is_valid => CoarseInit::Gyro(h),
            _ => CoarseInit::Zero,
        };
        self.compute_inner(target, init)
    }

    /// Compute dense flow seeded from a coarse tile motion field (hybrid
    /// alignment mode).
    pub fn compute_seeded(
        &self,
        target: &Array2<f32>,
        field: &Array2<MotionVector>,
        tile_size: usize,
    ) -> Result<DenseFlowResult> {
        self.compute_inner(target, CoarseInit::Tiles { field, tile_size })
    }

    fn compute_inner(&self, target: &Array2<f32>, init: CoarseInit) -> Result<DenseFlowResult> {
        let ref_pyramid = self.ref_pyramid.as_ref().ok_or(LumenError::ReferenceNotSet)?;

        let target_pyramid = GaussianPyramid::build(target.clone(), self.levels);
        let num_levels = ref_pyramid.num_levels().min(target_pyramid.num_levels());

        let coarse = ref_pyramid.level(num_levels - 1);
        let mut flow = self.initial_field(coarse.dim(), num_levels, &init);

        for level in (0..num_levels).rev() {
            let ref_level = ref_pyramid.level(level);
            let target_level = target_pyramid.level(level);

            if level < num_levels - 1 {
                flow = upsample_flow(&flow, ref_level.dim());
            }

            flow = self.refine_level(ref_level, target_level, flow);
            debug!(
                level,
                width = ref_level.ncols(),
                height = ref_level.nrows(),
                "Flow level refined"
            );
        }

        let mut total_flow = 0.0f32;
        let mut confident = 0usize;
        for fv in flow.iter() {
            if fv.confidence > self.params.high_confidence {
                total_flow += fv.magnitude();
                confident += 1;
            }
        }

        let total = flow.len().max(1);
        let average_flow = if confident > 0 {
            total_flow / confident as f32
        } else {
            0.0
        };
        let coverage = confident as f32 / total as f32;
        let is_valid = coverage > self.params.min_coverage;

        info!(
            average_flow,
            coverage, is_valid, "Dense optical flow complete"
        );

        Ok(DenseFlowResult {
            flow,
            average_flow,
            coverage,
            is_valid,
        })
    }

    fn initial_field(
        &self,
        (h, w): (usize, usize),
        num_levels: usize,
        init: &CoarseInit,
    ) -> Array2<FlowVector> {
        let scale = 1.0 / (1u32 << (num_levels - 1)) as f32;
        match init {
            CoarseInit::Zero => Array2::from_elem((h, w), FlowVector::default()),
            CoarseInit::Gyro(homography) => {
                let mut flow = Array2::from_elem((h, w), FlowVector::default());
                for row in 0..h {
                    for col in 0..w {
                        let (dx, dy) =
                            homography.initial_flow(col as f32 / scale, row as f32 / scale);
                        flow[[row, col]] = FlowVector::new(dx * scale, dy * scale, 1.0);
                    }
                }
                flow
            }
            CoarseInit::Tiles { field, tile_size } => {
                let mut flow = Array2::from_elem((h, w), FlowVector::default());
                if field.is_empty() {
                    return flow;
                }
                let (rows, cols) = field.dim();
                for row in 0..h {
                    for col in 0..w {
                        let full_x = (col as f32 / scale) as usize;
                        let full_y = (row as f32 / scale) as usize;
                        let mv = &field[[
                            (full_y / tile_size).min(rows - 1),
                            (full_x / tile_size).min(cols - 1),
                        ]];
                        flow[[row, col]] = FlowVector::new(
                            mv.dx as f32 * scale,
                            mv.dy as f32 * scale,
                            1.0,
                        );
                    }
                }
                flow
            }
        }
    }

    fn refine_level(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
        flow: Array2<FlowVector>,
    ) -> Array2<FlowVector> {
        let (grad_x, grad_y) = scharr_gradients(reference);
        let (h, w) = flow.dim();

        let refine_row = |row: usize| -> Vec<FlowVector> {
            let mut out = Vec::with_capacity(w);
            for col in 0..w {
                let current = flow[[row, col]];
                let refined = self.pixel_flow(
                    reference, target, &grad_x, &grad_y, col, row, current,
                );
                if refined.confidence > self.params.min_valid_confidence {
                    out.push(refined);
                } else {
                    out.push(current);
                }
            }
            out
        };

        let rows: Vec<Vec<FlowVector>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
            (0..h).into_par_iter().map(refine_row).collect()
        } else {
            (0..h).map(refine_row).collect()
        };

        let mut result = Array2::from_elem((h, w), FlowVector::default());
        for (row, row_data) in rows.into_iter().enumerate() {
            for (col, fv) in row_data.into_iter().enumerate() {
                result[[row, col]] = fv;
            }
        }
        result
    }

    /// Iterative Lucas-Kanade update for a single pixel.
    #[allow(clippy::too_many_arguments)]
    fn pixel_flow(
        &self,
        reference: &Array2<f32>,
        target: &Array2<f32>,
        grad_x: &Array2<f32>,
        grad_y: &Array2<f32>,
        x: usize,
        y: usize,
        initial: FlowVector,
    ) -> FlowVector {
        let (ref_h, ref_w) = reference.dim();
        let (tgt_h, tgt_w) = target.dim();
        let half = (self.params.window_size / 2) as i64;
        let min_valid = (self.params.window_size * self.params.window_size) / 4;

        let mut flow_x = initial.dx;
        let mut flow_y = initial.dy;

        let mut final_ixx = 0.0f32;
        let mut final_iyy = 0.0f32;
        let mut final_min_eigen = 0.0f32;

        for _ in 0..self.params.max_iterations {
            let mut sum_ixx = 0.0f32;
            let mut sum_ixy = 0.0f32;
            let mut sum_iyy = 0.0f32;
            let mut sum_ixt = 0.0f32;
            let mut sum_iyt = 0.0f32;
            let mut valid = 0usize;

            for wy in -half..=half {
                let py = y as i64 + wy;
                if py < 1 || py >= ref_h as i64 - 1 {
                    continue;
                }
                for wx in -half..=half {
                    let px = x as i64 + wx;
                    if px < 1 || px >= ref_w as i64 - 1 {
                        continue;
                    }

                    let tx = px as f32 + flow_x;
                    let ty = py as f32 + flow_y;
                    if tx < 0.0 || tx >= (tgt_w - 1) as f32 || ty < 0.0 || ty >= (tgt_h - 1) as f32
                    {
                        continue;
                    }

                    let ix = grad_x[[py as usize, px as usize]];
                    let iy = grad_y[[py as usize, px as usize]];
                    let it =
                        bilinear_sample(target, tx, ty) - reference[[py as usize, px as usize]];

                    sum_ixx += ix * ix;
                    sum_ixy += ix * iy;
                    sum_iyy += iy * iy;
                    sum_ixt += ix * it;
                    sum_iyt += iy * it;
                    valid += 1;
                }
            }

            if valid < min_valid {
                return FlowVector::new(flow_x, flow_y, 0.0);
            }

            final_ixx = sum_ixx;
            final_iyy = sum_iyy;

            let det = sum_ixx * sum_iyy - sum_ixy * sum_ixy;
            let discriminant =
                (sum_ixx - sum_iyy) * (sum_ixx - sum_iyy) + 4.0 * sum_ixy * sum_ixy;
            let min_eigen = 0.5 * (sum_ixx + sum_iyy - discriminant.max(0.0).sqrt());
            final_min_eigen = min_eigen;

            if det.abs() < 1e-6 || min_eigen < self.params.min_eigen_threshold {
                return FlowVector::new(flow_x, flow_y, 0.1);
            }

            let inv_det = 1.0 / det;
            let du = inv_det * (sum_iyy * (-sum_ixt) - sum_ixy * (-sum_iyt));
            let dv = inv_det * (sum_ixx * (-sum_iyt) - sum_ixy * (-sum_ixt));

            flow_x += du;
            flow_y += dv;

            if du.abs() < self.params.convergence_threshold
                && dv.abs() < self.params.convergence_threshold
            {
                break;
            }
        }

        let trace = final_ixx + final_iyy;
        let confidence = if trace > 0.0 {
            (final_min_eigen / (trace * 0.1)).min(1.0)
        } else {
            0.0
        };

        FlowVector::new(flow_x, flow_y, confidence)
    }
}

/// Scharr gradients normalized by the kernel weight (32), borders zeroed.
fn scharr_gradients(image: &Array2<f32>) -> (Array2<f32>, Array2<f32>) {
    const SCHARR_X: [[f32; 3]; 3] = [[-3.0, 0.0, 3.0], [-10.0, 0.0, 10.0], [-3.0, 0.0, 3.0]];
    const SCHARR_Y: [[f32; 3]; 3] = [[-3.0, -10.0, -3.0], [0.0, 0.0, 0.0], [3.0, 10.0, 3.0]];

    let (h, w) = image.dim();
    let mut grad_x = Array2::<f32>::zeros((h, w));
    let mut grad_y = Array2::<f32>::zeros((h, w));

    if h < 3 || w < 3 {
        return (grad_x, grad_y);
    }

    for y in 1..h - 1 {
        for x in 1..w - 1 {
            let mut gx = 0.0f32;
            let mut gy = 0.0f32;
            for ky in 0..3 {
                for kx in 0..3 {
                    let val = image[[y + ky - 1, x + kx - 1]];
                    gx += val * SCHARR_X[ky][kx];
                    gy += val * SCHARR_Y[ky][kx];
                }
            }
            grad_x[[y, x]] = gx / 32.0;
            grad_y[[y, x]] = gy / 32.0;
        }
    }

    (grad_x, grad_y)
}

/// Bilinearly upsample a flow field to the given dimensions, scaling the
/// displacements by 2 for the finer pyramid level.
fn upsample_flow(coarse: &Array2<FlowVector>, (fine_h, fine_w): (usize, usize)) -> Array2<FlowVector> {
    let (coarse_h, coarse_w) = coarse.dim();
    let scale_x = coarse_w as f32 / fine_w as f32;
    let scale_y = coarse_h as f32 / fine_h as f32;

    let mut fine = Array2::from_elem((fine_h, fine_w), FlowVector::default());
    for y in 0..fine_h {
        for x in 0..fine_w {
            let cx = x as f32 * scale_x;
            let cy = y as f32 * scale_y;
            let cx0 = (cx as usize).min(coarse_w - 1);
            let cy0 = (cy as usize).min(coarse_h - 1);
            let cx1 = (cx0 + 1).min(coarse_w - 1);
            let cy1 = (cy0 + 1).min(coarse_h - 1);
            let fx = cx - cx0 as f32;
            let fy = cy - cy0 as f32;

            let f00 = coarse[[cy0, cx0]];
            let f10 = coarse[[cy0, cx1]];
            let f01 = coarse[[cy1, cx0]];
            let f11 = coarse[[cy1, cx1]];

            let lerp = |a: f32, b: f32, c: f32, d: f32| {
                (1.0 - fx) * (1.0 - fy) * a + fx * (1.0 - fy) * b + (1.0 - fx) * fy * c + fx * fy * d
            };

            fine[[y, x]] = FlowVector::new(
                lerp(f00.dx, f10.dx, f01.dx, f11.dx) * 2.0,
                lerp(f00.dy, f10.dy, f01.dy, f11.dy) * 2.0,
                lerp(
                    f00.confidence,
                    f10.confidence,
                    f01.confidence,
                    f11.confidence,
                ),
            );
        }
    }
    fine
}

/// Downsample a dense flow field onto a tile grid by averaging
/// high-confidence vectors within each tile. Tiles with none are invalid.
pub fn flow_to_motion_field(
    flow: &Array2<FlowVector>,
    tile_size: usize,
    high_confidence: f32,
) -> Array2<MotionVector> {
    let (h, w) = flow.dim();
    let tiles_x = w.div_ceil(tile_size).max(1);
    let tiles_y = h.div_ceil(tile_size).max(1);

    let mut field = Array2::from_elem((tiles_y, tiles_x), MotionVector::invalid());
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let mut sum_dx = 0.0f32;
            let mut sum_dy = 0.0f32;
            let mut count = 0usize;

            let y_end = ((ty + 1) * tile_size).min(h);
            let x_end = ((tx + 1) * tile_size).min(w);
            for y in ty * tile_size..y_end {
                for x in tx * tile_size..x_end {
                    let fv = flow[[y, x]];
                    if fv.confidence > high_confidence {
                        sum_dx += fv.dx;
                        sum_dy += fv.dy;
                        count += 1;
                    }
                }
            }

            if count > 0 {
                field[[ty, tx]] = MotionVector::new(
                    (sum_dx / count as f32).round() as i32,
                    (sum_dy / count as f32).round() as i32,
                    0.0,
                );
            }
        }
    }
    field
}
