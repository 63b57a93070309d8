//! Global-motion screening and the single-frame fallback path.

use ndarray::Array2;
use tracing::{debug, info};

use crate::consts::{GLOBAL_MOTION_BLOCK, GLOBAL_MOTION_RADIUS, GLOBAL_MOTION_STRIDE};
use crate::frame::RgbFrame;
use crate::pyramid::GaussianPyramid;

/// Coarse estimate of global motion between two luminance planes.
///
/// Runs a sparse block match (block 16, stride 32, radius 16) on a
/// pyramid level chosen so the search radius can measure displacements
/// beyond `fallback_threshold`, then scales the result back to full
/// resolution. Returns the mean displacement magnitude over all sampled
/// blocks, 0 when the image is too small to sample.
pub fn estimate_global_motion(
    reference: &Array2<f32>,
    frame: &Array2<f32>,
    fallback_threshold: f32,
) -> f32 {
    let (h, w) = reference.dim();
    let radius = GLOBAL_MOTION_RADIUS;
    let block = GLOBAL_MOTION_BLOCK;
    let stride = GLOBAL_MOTION_STRIDE;

    // Minimum level size that still fits a block plus the search margin.
    let min_dim = 2 * block + radius as usize + 4;

    let mut level = 0usize;
    while level < 3
        && (radius as f32 * (1u32 << level) as f32) < fallback_threshold
        && (w >> (level + 1)) >= min_dim
        && (h >> (level + 1)) >= min_dim
    {
        level += 1;
    }

    let ref_pyramid = GaussianPyramid::build(reference.clone(), level + 1);
    let frame_pyramid = GaussianPyramid::build(frame.clone(), level + 1);
    let level = level.min(ref_pyramid.num_levels() - 1).min(frame_pyramid.num_levels() - 1);
    let ref_level = ref_pyramid.level(level);
    let frame_level = frame_pyramid.level(level);
    let (lh, lw) = ref_level.dim();

    let mut total_motion = 0.0f32;
    let mut samples = 0usize;

    let y_limit = lh as i64 - block as i64 - radius as i64;
    let x_limit = lw as i64 - block as i64 - radius as i64;

    let mut y = block as i64;
    while y < y_limit {
        let mut x = block as i64;
        while x < x_limit {
            let mut best_sad = f32::INFINITY;
            let mut best_dx = 0i64;
            let mut best_dy = 0i64;

            let mut dy = -(radius as i64);
            while dy <= radius as i64 {
                let mut dx = -(radius as i64);
                while dx <= radius as i64 {
                    let mut sad = 0.0f32;
                    let mut by = 0i64;
                    while by < block as i64 {
                        let mut bx = 0i64;
                        while bx < block as i64 {
                            let ry = (y + by) as usize;
                            let rx = (x + bx) as usize;
                            let fy = y + by + dy;
                            let fx = x + bx + dx;
                            if fy >= 0 && (fy as usize) < lh && fx >= 0 && (fx as usize) < lw {
                                sad += (ref_level[[ry, rx]]
                                    - frame_level[[fy as usize, fx as usize]])
                                    .abs();
                            }
                            bx += 2;
                        }
                        by += 2;
                    }
                    if sad < best_sad {
                        best_sad = sad;
                        best_dx = dx;
                        best_dy = dy;
                    }
                    dx += 2;
                }
                dy += 2;
            }

            total_motion += ((best_dx * best_dx + best_dy * best_dy) as f32).sqrt();
            samples += 1;
            x += stride as i64;
        }
        y += stride as i64;
    }

    if samples == 0 {
        return 0.0;
    }

    let motion = (total_motion / samples as f32) * (1u32 << level) as f32;
    debug!(level, samples, motion, "Global motion estimate");
    motion
}

/// Bilinear single-frame upscale used when MFSR cannot run.
pub fn bilinear_upscale(frame: &RgbFrame, scale: usize) -> RgbFrame {
    let (in_h, in_w) = frame.dim();
    let out_h = in_h * scale;
    let out_w = in_w * scale;

    info!(in_w, in_h, scale, "Fallback bilinear upscale");

    let mut output = RgbFrame::black(out_h, out_w);
    for y in 0..out_h {
        let src_y = y as f32 / scale as f32;
        let y0 = (src_y as usize).min(in_h - 1);
        let y1 = (y0 + 1).min(in_h - 1);
        let fy = src_y - y0 as f32;

        for x in 0..out_w {
            let src_x = x as f32 / scale as f32;
            let x0 = (src_x as usize).min(in_w - 1);
            let x1 = (x0 + 1).min(in_w - 1);
            let fx = src_x - x0 as f32;

            for (plane_in, plane_out) in [
                (&frame.red, &mut output.red),
                (&frame.green, &mut output.green),
                (&frame.blue, &mut output.blue),
            ] {
                let top = plane_in[[y0, x0]] * (1.0 - fx) + plane_in[[y0, x1]] * fx;
                let bottom = plane_in[[y1, x0]] * (1.0 - fx) + plane_in[[y1, x1]] * fx;
                plane_out[[y, x]] = top * (1.0 - fy) + bottom * fy;
            }
        }
    }

    output
}
