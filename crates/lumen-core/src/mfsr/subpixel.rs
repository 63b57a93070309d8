//! Per-tile sub-pixel motion refinement.

use ndarray::Array2;

use crate::align::subpixel::{parabola_curvature, parabola_offset};
use crate::align::MotionVector;
use crate::consts::SUBPIXEL_REJECT_FACTOR;

/// Sub-pixel displacement of one tile with confidence in [0, 1].
#[derive(Clone, Copy, Debug)]
pub struct SubpixelMotion {
    pub dx: f32,
    pub dy: f32,
    pub confidence: f32,
}

impl SubpixelMotion {
    pub fn new(dx: f32, dy: f32, confidence: f32) -> Self {
        Self { dx, dy, confidence }
    }

    pub fn zero(confidence: f32) -> Self {
        Self::new(0.0, 0.0, confidence)
    }

    /// Euclidean length of the fractional part, used for diagnostics.
    pub fn fractional_shift(&self) -> f32 {
        let fx = self.dx - self.dx.floor();
        let fy = self.dy - self.dy.floor();
        (fx * fx + fy * fy).sqrt()
    }
}

/// Mean absolute difference between a reference tile at integer coordinates
/// and a target tile at fractional coordinates (bilinear sampling).
pub(crate) fn subpixel_sad(
    reference: &Array2<f32>,
    frame: &Array2<f32>,
    ref_x: i64,
    ref_y: i64,
    frame_x: f32,
    frame_y: f32,
    tile_size: usize,
) -> f32 {
    let (ref_h, ref_w) = reference.dim();
    let (frame_h, frame_w) = frame.dim();

    let mut sad = 0.0f32;
    let mut valid = 0usize;

    for dy in 0..tile_size as i64 {
        let ry = ref_y + dy;
        if ry < 0 || ry >= ref_h as i64 {
            continue;
        }
        let fy = frame_y + dy as f32;
        if fy < 0.0 || fy >= (frame_h - 1) as f32 {
            continue;
        }
        for dx in 0..tile_size as i64 {
            let rx = ref_x + dx;
            if rx < 0 || rx >= ref_w as i64 {
                continue;
            }
            let fx = frame_x + dx as f32;
            if fx < 0.0 || fx >= (frame_w - 1) as f32 {
                continue;
            }

            let x0 = fx.floor() as usize;
            let y0 = fy.floor() as usize;
            let x1 = (x0 + 1).min(frame_w - 1);
            let y1 = (y0 + 1).min(frame_h - 1);
            let wx = fx - x0 as f32;
            let wy = fy - y0 as f32;

            let interpolated = frame[[y0, x0]] * (1.0 - wx) * (1.0 - wy)
                + frame[[y0, x1]] * wx * (1.0 - wy)
                + frame[[y1, x0]] * (1.0 - wx) * wy
                + frame[[y1, x1]] * wx * wy;

            sad += (reference[[ry as usize, rx as usize]] - interpolated).abs();
            valid += 1;
        }
    }

    if valid > 0 {
        sad / valid as f32
    } else {
        f32::INFINITY
    }
}

/// Refine one tile's integer motion to sub-pixel accuracy.
///
/// Samples the SAD on a 3x3 grid around the integer winner, fits parabolas
/// along each axis, and keeps the fractional shift only when it does not
/// worsen the cost by more than 10%.
pub(crate) fn refine_tile(
    reference: &Array2<f32>,
    frame: &Array2<f32>,
    tile_x: usize,
    tile_y: usize,
    tile_size: usize,
    integer: &MotionVector,
) -> SubpixelMotion {
    let ref_x = (tile_x * tile_size) as i64;
    let ref_y = (tile_y * tile_size) as i64;

    let mut costs = [[0.0f32; 3]; 3];
    for dy in -1i64..=1 {
        for dx in -1i64..=1 {
            costs[(dy + 1) as usize][(dx + 1) as usize] = subpixel_sad(
                reference,
                frame,
                ref_x,
                ref_y,
                (ref_x + integer.dx as i64 + dx) as f32,
                (ref_y + integer.dy as i64 + dy) as f32,
                tile_size,
            );
        }
    }

    let mut dx_sub = parabola_offset(costs[1][0], costs[1][1], costs[1][2]);
    let mut dy_sub = parabola_offset(costs[0][1], costs[1][1], costs[2][1]);

    let curvature_x = parabola_curvature(costs[1][0], costs[1][1], costs[1][2]);
    let curvature_y = parabola_curvature(costs[0][1], costs[1][1], costs[2][1]);
    let curvature = (curvature_x + curvature_y) / 2.0;
    let mut confidence = if curvature > 0.0 {
        (curvature * 10.0).min(1.0)
    } else {
        0.5
    };

    let refined_cost = subpixel_sad(
        reference,
        frame,
        ref_x,
        ref_y,
        ref_x as f32 + integer.dx as f32 + dx_sub,
        ref_y as f32 + integer.dy as f32 + dy_sub,
        tile_size,
    );

    if refined_cost > costs[1][1] * SUBPIXEL_REJECT_FACTOR {
        dx_sub = 0.0;
        dy_sub = 0.0;
        confidence *= 0.5;
    }

    SubpixelMotion::new(
        integer.dx as f32 + dx_sub,
        integer.dy as f32 + dy_sub,
        confidence.clamp(0.0, 1.0),
    )
}
