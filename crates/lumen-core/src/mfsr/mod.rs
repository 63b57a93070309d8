//! Multi-frame super-resolution accumulation.
//!
//! Shift-and-add reconstruction: every input pixel is scattered onto a
//! higher-resolution grid using per-tile sub-pixel motion, then the grid is
//! normalized and gap-filled.

pub mod accumulator;
pub mod subpixel;

use ndarray::Array2;
use tracing::{info, warn};

use crate::align::{FrameAlignment, MotionVector};
use crate::consts::{GAP_FILL_PASSES, GAUSSIAN_SPLAT_SIGMA, MIN_SPLAT_WEIGHT};
use crate::error::{LumenError, Result};
use crate::frame::RgbFrame;
use crate::pipeline::config::MfsrParams;

pub use self::accumulator::Accumulator;
pub use self::subpixel::SubpixelMotion;

/// Result of one super-resolution reconstruction.
#[derive(Clone, Debug)]
pub struct MfsrResult {
    pub image: RgbFrame,
    pub coverage: f32,
    pub average_subpixel_shift: f32,
    pub frames_contributed: usize,
}

pub struct MultiFrameSr {
    params: MfsrParams,
}

impl MultiFrameSr {
    pub fn new(params: MfsrParams) -> Self {
        Self { params }
    }

    /// Reconstruct an image at `scale_factor` times the input resolution.
    ///
    /// Frames whose alignment is invalid are skipped (except the
    /// reference, which always contributes with zero motion).
    pub fn process(
        &self,
        frames: &[RgbFrame],
        luma: &[Array2<f32>],
        reference: usize,
        alignments: &[FrameAlignment],
    ) -> Result<MfsrResult> {
        if frames.is_empty() {
            return Err(LumenError::InvalidInput("empty burst".into()));
        }
        if frames.len() != alignments.len() || frames.len() != luma.len() {
            return Err(LumenError::InvalidInput(
                "frame, luminance and alignment counts must match".into(),
            ));
        }
        if reference >= frames.len() {
            return Err(LumenError::InvalidInput(format!(
                "reference index {} out of range for {} frames",
                reference,
                frames.len()
            )));
        }

        let (in_h, in_w) = frames[0].dim();
        if in_h == 0 || in_w == 0 {
            return Err(LumenError::InvalidInput("zero-sized frame".into()));
        }

        let scale = self.params.scale_factor;
        let out_w = in_w * scale;
        let out_h = in_h * scale;
        info!(
            frames = frames.len(),
            in_w, in_h, out_w, out_h, scale, "Multi-frame super-resolution"
        );

        let mut acc = Accumulator::new(out_h, out_w);
        let ref_luma = &luma[reference];

        let tile_size = self.params.tile_size;
        let tiles_x = in_w.div_ceil(tile_size).max(1);
        let tiles_y = in_h.div_ceil(tile_size).max(1);

        let mut total_shift = 0.0f32;
        let mut shift_count = 0usize;
        let mut frames_contributed = 0usize;

        for (i, frame) in frames.iter().enumerate() {
            if i != reference && !alignments[i].is_valid {
                warn!(frame = i, "Skipping frame with invalid alignment");
                continue;
            }

            let motion = if i == reference {
                Array2::from_elem((tiles_y, tiles_x), SubpixelMotion::zero(1.0))
            } else {
                let coarse = alignments[i].to_motion_field(in_w, in_h, tile_size);
                let refined =
                    self.refine_motion_field(ref_luma, &luma[i], &coarse, tiles_x, tiles_y);
                for m in refined.iter() {
                    total_shift += m.fractional_shift();
                    shift_count += 1;
                }
                refined
            };

            self.scatter_frame(frame, &motion, &mut acc, scale);
            frames_contributed += 1;
        }

        acc.fill_gaps(GAP_FILL_PASSES);

        let coverage = acc.coverage();
        let average_subpixel_shift = if shift_count > 0 {
            total_shift / shift_count as f32
        } else {
            0.0
        };

        info!(
            frames_contributed,
            coverage, average_subpixel_shift, "Super-resolution complete"
        );

        Ok(MfsrResult {
            image: acc.normalize(),
            coverage,
            average_subpixel_shift,
            frames_contributed,
        })
    }

    /// Refine each tile of a coarse integer motion field to sub-pixel
    /// accuracy against the reference luminance.
    fn refine_motion_field(
        &self,
        reference: &Array2<f32>,
        frame: &Array2<f32>,
        coarse: &Array2<MotionVector>,
        tiles_x: usize,
        tiles_y: usize,
    ) -> Array2<SubpixelMotion> {
        if coarse.is_empty() {
            warn!("Empty motion field, using identity motion");
            return Array2::from_elem((tiles_y, tiles_x), SubpixelMotion::zero(0.5));
        }

        let tile_size = self.params.tile_size;
        let (rows, cols) = coarse.dim();
        let mut refined = Array2::from_elem((rows, cols), SubpixelMotion::zero(0.5));
        for ty in 0..rows {
            for tx in 0..cols {
                let integer = &coarse[[ty, tx]];
                let start = if integer.is_valid() {
                    integer.clone()
                } else {
                    MotionVector::new(0, 0, 0.0)
                };
                refined[[ty, tx]] =
                    subpixel::refine_tile(reference, frame, tx, ty, tile_size, &start);
            }
        }
        refined
    }

    /// Scatter every pixel of a frame into the accumulator using its
    /// tile's sub-pixel motion.
    fn scatter_frame(
        &self,
        frame: &RgbFrame,
        motion: &Array2<SubpixelMotion>,
        acc: &mut Accumulator,
        scale: usize,
    ) {
        let (in_h, in_w) = frame.dim();
        let out_w = acc.width();
        let out_h = acc.height();
        let tile_size = self.params.tile_size;
        let (rows, cols) = motion.dim();

        for y in 0..in_h {
            for x in 0..in_w {
                if !frame.pixel_is_finite(y, x) {
                    continue;
                }

                let m = motion[[(y / tile_size).min(rows - 1), (x / tile_size).min(cols - 1)]];

                let src_x = x as f32 - m.dx;
                let src_y = y as f32 - m.dy;
                if !src_x.is_finite() || !src_y.is_finite() {
                    continue;
                }

                let out_x = src_x * scale as f32;
                let out_y = src_y * scale as f32;
                let x0 = out_x.floor() as i64;
                let y0 = out_y.floor() as i64;

                let rgb = frame.pixel(y, x);

                for dy in 0..=1i64 {
                    for dx in 0..=1i64 {
                        let ox = x0 + dx;
                        let oy = y0 + dy;
                        if ox < 0 || ox >= out_w as i64 || oy < 0 || oy >= out_h as i64 {
                            continue;
                        }

                        let dist_x = (out_x - ox as f32).abs();
                        let dist_y = (out_y - oy as f32).abs();

                        let weight = if self.params.use_weighted_accumulation {
                            let dist = (dist_x * dist_x + dist_y * dist_y).sqrt();
                            gaussian_weight(dist, GAUSSIAN_SPLAT_SIGMA) * m.confidence
                        } else {
                            (1.0 - dist_x) * (1.0 - dist_y)
                        };

                        if weight > MIN_SPLAT_WEIGHT {
                            acc.deposit(oy as usize, ox as usize, rgb, weight);
                        }
                    }
                }
            }
        }
    }
}

/// Lanczos reconstruction weight, zero beyond the kernel radius.
pub fn lanczos_weight(distance: f32, a: f32) -> f32 {
    if distance == 0.0 {
        return 1.0;
    }
    if distance.abs() >= a {
        return 0.0;
    }
    let pi_d = std::f32::consts::PI * distance;
    let pi_d_a = pi_d / a;
    (pi_d.sin() / pi_d) * (pi_d_a.sin() / pi_d_a)
}

fn gaussian_weight(distance: f32, sigma: f32) -> f32 {
    (-(distance * distance) / (2.0 * sigma * sigma)).exp()
}
