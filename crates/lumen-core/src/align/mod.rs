pub mod dispatcher;
pub mod flow;
pub mod subpixel;
pub mod tile;

use ndarray::Array2;

use crate::consts::DEFAULT_HIGH_CONFIDENCE;
use crate::frame::{bilinear_sample, RgbFrame};

pub use dispatcher::align_burst;
pub use flow::{flow_to_motion_field, DenseOpticalFlow, FlowVector};
pub use tile::{MotionVector, TileAligner};

/// Per-frame displacement field, either tile-grid integer motion or dense
/// per-pixel flow.
#[derive(Clone, Debug)]
pub enum AlignmentField {
    Tiles {
        field: Array2<MotionVector>,
        tile_size: usize,
    },
    Flow(Array2<FlowVector>),
}

/// Alignment of one frame toward the reference: a displacement field plus
/// scalar summaries.
#[derive(Clone, Debug)]
pub struct FrameAlignment {
    pub field: AlignmentField,
    pub average_motion: f32,
    pub confidence: f32,
    pub is_valid: bool,
}

impl FrameAlignment {
    /// Identity alignment for the reference frame: zero motion at every
    /// tile, full confidence.
    pub fn identity(width: usize, height: usize, tile_size: usize) -> Self {
        let tiles_x = width.div_ceil(tile_size).max(1);
        let tiles_y = height.div_ceil(tile_size).max(1);
        let field = Array2::from_elem((tiles_y, tiles_x), MotionVector::new(0, 0, 0.0));
        Self {
            field: AlignmentField::Tiles { field, tile_size },
            average_motion: 0.0,
            confidence: 1.0,
            is_valid: true,
        }
    }

    /// Alignment produced when no field could be computed.
    pub fn invalid() -> Self {
        Self {
            field: AlignmentField::Tiles {
                field: Array2::from_elem((0, 0), MotionVector::invalid()),
                tile_size: 1,
            },
            average_motion: 0.0,
            confidence: 0.0,
            is_valid: false,
        }
    }

    /// Resample the field onto a tile grid of `tile_size` covering a
    /// `width` x `height` image. Dense flow is averaged per tile; tile
    /// fields are looked up by tile center.
    pub fn to_motion_field(
        &self,
        width: usize,
        height: usize,
        tile_size: usize,
    ) -> Array2<MotionVector> {
        let tiles_x = width.div_ceil(tile_size).max(1);
        let tiles_y = height.div_ceil(tile_size).max(1);

        match &self.field {
            AlignmentField::Tiles {
                field,
                tile_size: src_size,
            } => {
                if *src_size == tile_size && field.dim() == (tiles_y, tiles_x) {
                    return field.clone();
                }
                let mut out =
                    Array2::from_elem((tiles_y, tiles_x), MotionVector::invalid());
                if field.is_empty() {
                    return out;
                }
                let (src_rows, src_cols) = field.dim();
                for ty in 0..tiles_y {
                    for tx in 0..tiles_x {
                        let center_x = tx * tile_size + tile_size / 2;
                        let center_y = ty * tile_size + tile_size / 2;
                        let sx = (center_x / src_size).min(src_cols - 1);
                        let sy = (center_y / src_size).min(src_rows - 1);
                        out[[ty, tx]] = field[[sy, sx]].clone();
                    }
                }
                out
            }
            AlignmentField::Flow(field) => {
                flow_to_motion_field(field, tile_size, DEFAULT_HIGH_CONFIDENCE)
            }
        }
    }
}

/// Resample a frame into the reference's coordinate system using its
/// alignment. Tile fields use the motion of the pixel's tile; dense flow is
/// applied per pixel. Sampling is bilinear with clamped coordinates.
pub fn warp(input: &RgbFrame, alignment: &FrameAlignment) -> RgbFrame {
    if !alignment.is_valid {
        return input.clone();
    }

    let (h, w) = input.dim();
    let mut output = RgbFrame::black(h, w);

    match &alignment.field {
        AlignmentField::Tiles { field, tile_size } => {
            if field.is_empty() {
                return input.clone();
            }
            let (rows, cols) = field.dim();
            for y in 0..h {
                for x in 0..w {
                    let mv = &field[[(y / tile_size).min(rows - 1), (x / tile_size).min(cols - 1)]];
                    let src_x = x as f32 + mv.dx as f32;
                    let src_y = y as f32 + mv.dy as f32;
                    output.red[[y, x]] = bilinear_sample(&input.red, src_x, src_y);
                    output.green[[y, x]] = bilinear_sample(&input.green, src_x, src_y);
                    output.blue[[y, x]] = bilinear_sample(&input.blue, src_x, src_y);
                }
            }
        }
        AlignmentField::Flow(field) => {
            if field.is_empty() {
                return input.clone();
            }
            let (rows, cols) = field.dim();
            for y in 0..h {
                for x in 0..w {
                    let fv = field[[
                        (y * rows / h.max(1)).min(rows - 1),
                        (x * cols / w.max(1)).min(cols - 1),
                    ]];
                    let src_x = x as f32 + fv.dx;
                    let src_y = y as f32 + fv.dy;
                    output.red[[y, x]] = bilinear_sample(&input.red, src_x, src_y);
                    output.green[[y, x]] = bilinear_sample(&input.green, src_x, src_y);
                    output.blue[[y, x]] = bilinear_sample(&input.blue, src_x, src_y);
                }
            }
        }
    }

    output
}
