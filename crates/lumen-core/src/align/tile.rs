//! HDR+ style tile-based alignment.
//!
//! Coarse-to-fine full search over a Gaussian pyramid. Each reference tile
//! receives the integer displacement that minimizes the mean absolute
//! luminance difference against the target frame.

use ndarray::Array2;
use tracing::{debug, warn};

use crate::align::{AlignmentField, FrameAlignment};
use crate::pipeline::config::AlignmentParams;
use crate::pyramid::GaussianPyramid;

/// Integer displacement of one alignment tile. `cost` is the mean absolute
/// difference in luminance units; non-finite cost marks an invalid tile.
#[derive(Clone, Debug)]
pub struct MotionVector {
    pub dx: i32,
    pub dy: i32,
    pub cost: f32,
}

impl MotionVector {
    pub fn new(dx: i32, dy: i32, cost: f32) -> Self {
        Self { dx, dy, cost }
    }

    pub fn invalid() -> Self {
        Self {
            dx: 0,
            dy: 0,
            cost: f32::INFINITY,
        }
    }

    pub fn is_valid(&self) -> bool {
        self.cost.is_finite()
    }

    pub fn magnitude(&self) -> f32 {
        ((self.dx * self.dx + self.dy * self.dy) as f32).sqrt()
    }
}

/// Tile-grid aligner. Set a reference once, then align any number of
/// same-sized target frames against it.
pub struct TileAligner {
    params: AlignmentParams,
    ref_pyramid: Option<GaussianPyramid>,
    image_width: usize,
    image_height: usize,
}

impl TileAligner {
    pub fn new(params: AlignmentParams) -> Self {
        Self {
            params,
            ref_pyramid: None,
            image_width: 0,
            image_height: 0,
        }
    }

    pub fn set_reference(&mut self, reference: Array2<f32>) {
        let (h, w) = reference.dim();
        self.image_width = w;
        self.image_height = h;
        let pyramid = GaussianPyramid::build(reference, self.params.pyramid_levels);
        debug!(
            width = w,
            height = h,
            levels = pyramid.num_levels(),
            "Tile aligner reference set"
        );
        self.ref_pyramid = Some(pyramid);
    }

    pub fn image_dim(&self) -> (usize, usize) {
        (self.image_height, self.image_width)
    }

    /// Align a target frame against the reference. Returns an invalid
    /// alignment when no reference has been set.
    pub fn align(&self, frame: &Array2<f32>) -> FrameAlignment {
        let Some(ref_pyramid) = &self.ref_pyramid else {
            warn!("Tile alignment requested before a reference was set");
            return FrameAlignment::invalid();
        };

        let frame_pyramid = GaussianPyramid::build(frame.clone(), self.params.pyramid_levels);
        let num_levels = ref_pyramid.num_levels().min(frame_pyramid.num_levels());
        let tile_size = self.params.tile_size;

        let coarse_w = ref_pyramid.width_at(num_levels - 1);
        let coarse_h = ref_pyramid.height_at(num_levels - 1);
        let mut current = Array2::from_elem(
            (
                coarse_h.div_ceil(tile_size).max(1),
                coarse_w.div_ceil(tile_size).max(1),
            ),
            MotionVector::new(0, 0, 0.0),
        );

        for level in (0..num_levels).rev() {
            let ref_level = ref_pyramid.level(level);
            let frame_level = frame_pyramid.level(level);
            let (lh, lw) = ref_level.dim();
            let tiles_x = lw.div_ceil(tile_size).max(1);
            let tiles_y = lh.div_ceil(tile_size).max(1);

            let mut refined = Array2::from_elem((tiles_y, tiles_x), MotionVector::invalid());
            for ty in 0..tiles_y {
                for tx in 0..tiles_x {
                    let initial = if level < num_levels - 1 {
                        let (src_rows, src_cols) = current.dim();
                        let coarse = &current[[
                            (ty / 2).min(src_rows - 1),
                            (tx / 2).min(src_cols - 1),
                        ]];
                        MotionVector::new(coarse.dx * 2, coarse.dy * 2, 0.0)
                    } else {
                        MotionVector::new(0, 0, 0.0)
                    };

                    refined[[ty, tx]] =
                        self.align_tile(ref_level, frame_level, tx, ty, &initial);
                }
            }

            current = refined;
        }

        let mut total_motion = 0.0f32;
        let mut total_cost = 0.0f32;
        let count = current.len();
        for mv in current.iter() {
            total_motion += mv.magnitude();
            total_cost += if mv.cost.is_finite() { mv.cost } else { 1.0 };
        }

        let average_motion = if count > 0 {
            total_motion / count as f32
        } else {
            0.0
        };
        let confidence = if count > 0 {
            (-total_cost / count as f32).exp()
        } else {
            0.0
        };

        debug!(
            average_motion,
            confidence, "Tile alignment complete"
        );

        FrameAlignment {
            field: AlignmentField::Tiles {
                field: current,
                tile_size,
            },
            average_motion,
            confidence,
            is_valid: confidence > 0.1,
        }
    }

    /// Full search in a square window around the initial motion.
    fn align_tile(
        &self,
        reference: &Array2<f32>,
        frame: &Array2<f32>,
        tx: usize,
        ty: usize,
        initial: &MotionVector,
    ) -> MotionVector {
        let tile_size = self.params.tile_size;
        let radius = self.params.search_radius;
        let ref_x = (tx * tile_size) as i64;
        let ref_y = (ty * tile_size) as i64;

        let mut best = MotionVector::invalid();
        for dy in -radius..=radius {
            for dx in -radius..=radius {
                let mx = initial.dx + dx;
                let my = initial.dy + dy;
                let cost = tile_sad(
                    reference,
                    frame,
                    ref_x,
                    ref_y,
                    ref_x + mx as i64,
                    ref_y + my as i64,
                    tile_size,
                );

                if cost < best.cost
                    || (cost == best.cost && candidate_rank(mx, my) < candidate_rank(best.dx, best.dy))
                {
                    best = MotionVector::new(mx, my, cost);
                }
            }
        }

        best
    }
}

/// Tie-break ordering for equal-cost candidates: smaller |dx|+|dy|, then
/// smaller dx, then smaller dy.
fn candidate_rank(dx: i32, dy: i32) -> (i32, i32, i32) {
    (dx.abs() + dy.abs(), dx, dy)
}

/// Mean absolute difference between a reference tile and a displaced target
/// tile. Only pixel pairs fully inside both frames count; +inf when none do.
pub(crate) fn tile_sad(
    reference: &Array2<f32>,
    frame: &Array2<f32>,
    ref_x: i64,
    ref_y: i64,
    frame_x: i64,
    frame_y: i64,
    tile_size: usize,
) -> f32 {
    let (ref_h, ref_w) = reference.dim();
    let (frame_h, frame_w) = frame.dim();

    let mut sad = 0.0f32;
    let mut valid = 0usize;

    for dy in 0..tile_size as i64 {
        let ry = ref_y + dy;
        let fy = frame_y + dy;
        if ry < 0 || ry >= ref_h as i64 || fy < 0 || fy >= frame_h as i64 {
            continue;
        }
        for dx in 0..tile_size as i64 {
            let rx = ref_x + dx;
            let fx = frame_x + dx;
            if rx < 0 || rx >= ref_w as i64 || fx < 0 || fx >= frame_w as i64 {
                continue;
            }
            sad += (reference[[ry as usize, rx as usize]]
                - frame[[fy as usize, fx as usize]])
                .abs();
            valid += 1;
        }
    }

    if valid > 0 {
        sad / valid as f32
    } else {
        f32::INFINITY
    }
}
