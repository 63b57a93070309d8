//! Tile grid construction and padded cropping.

use ndarray::{s, Array2};

use crate::frame::RgbFrame;

/// One tile of the input image: core rectangle, overlap pads toward
/// neighboring tiles, and the scaled output rectangle.
#[derive(Clone, Debug)]
pub struct TileRegion {
    pub x: usize,
    pub y: usize,
    pub width: usize,
    pub height: usize,
    pub pad_left: usize,
    pub pad_top: usize,
    pub pad_right: usize,
    pub pad_bottom: usize,
    pub out_x: usize,
    pub out_y: usize,
    pub out_width: usize,
    pub out_height: usize,
}

impl TileRegion {
    pub fn padded_x(&self) -> usize {
        self.x - self.pad_left
    }

    pub fn padded_y(&self) -> usize {
        self.y - self.pad_top
    }

    pub fn padded_width(&self) -> usize {
        self.pad_left + self.width + self.pad_right
    }

    pub fn padded_height(&self) -> usize {
        self.pad_top + self.height + self.pad_bottom
    }

    pub fn has_left_neighbor(&self) -> bool {
        self.pad_left > 0
    }

    pub fn has_top_neighbor(&self) -> bool {
        self.pad_top > 0
    }

    pub fn has_right_neighbor(&self) -> bool {
        self.pad_right > 0
    }

    pub fn has_bottom_neighbor(&self) -> bool {
        self.pad_bottom > 0
    }
}

/// Cover a `width` x `height` image with tiles stepping by
/// `tile - overlap`. Border tiles are truncated; pads are half the overlap
/// on each side that has a neighbor.
pub fn compute_tile_grid(
    width: usize,
    height: usize,
    tile_width: usize,
    tile_height: usize,
    overlap: usize,
    scale: usize,
) -> Vec<TileRegion> {
    let step_x = tile_width - overlap;
    let step_y = tile_height - overlap;
    let tiles_x = width.div_ceil(step_x).max(1);
    let tiles_y = height.div_ceil(step_y).max(1);
    let half = overlap / 2;

    let mut tiles = Vec::with_capacity(tiles_x * tiles_y);
    for ty in 0..tiles_y {
        for tx in 0..tiles_x {
            let x = tx * step_x;
            let y = ty * step_y;
            if x >= width || y >= height {
                continue;
            }
            let w = tile_width.min(width - x);
            let h = tile_height.min(height - y);

            let pad_left = if tx > 0 { half.min(x) } else { 0 };
            let pad_top = if ty > 0 { half.min(y) } else { 0 };
            let pad_right = if tx < tiles_x - 1 {
                half.min(width - x - w)
            } else {
                0
            };
            let pad_bottom = if ty < tiles_y - 1 {
                half.min(height - y - h)
            } else {
                0
            };

            tiles.push(TileRegion {
                x,
                y,
                width: w,
                height: h,
                pad_left,
                pad_top,
                pad_right,
                pad_bottom,
                out_x: x * scale,
                out_y: y * scale,
                out_width: w * scale,
                out_height: h * scale,
            });
        }
    }

    tiles
}

/// Padded crop of one luminance plane.
pub fn crop_plane(source: &Array2<f32>, region: &TileRegion) -> Array2<f32> {
    let y0 = region.padded_y();
    let x0 = region.padded_x();
    let y1 = y0 + region.padded_height();
    let x1 = x0 + region.padded_width();
    source.slice(s![y0..y1, x0..x1]).to_owned()
}

/// Padded crop of an RGB frame.
pub fn crop_rgb(source: &RgbFrame, region: &TileRegion) -> RgbFrame {
    RgbFrame {
        red: crop_plane(&source.red, region),
        green: crop_plane(&source.green, region),
        blue: crop_plane(&source.blue, region),
    }
}
