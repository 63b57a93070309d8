use ndarray::Array2;

use crate::error::{LumenError, Result};

/// A planar float RGB frame.
/// Channel values are f32 in [0.0, 1.0], shape = (height, width).
#[derive(Clone, Debug)]
pub struct RgbFrame {
    pub red: Array2<f32>,
    pub green: Array2<f32>,
    pub blue: Array2<f32>,
}

impl RgbFrame {
    /// Create a black frame of the given dimensions.
    pub fn black(height: usize, width: usize) -> Self {
        Self {
            red: Array2::zeros((height, width)),
            green: Array2::zeros((height, width)),
            blue: Array2::zeros((height, width)),
        }
    }

    /// Assemble a frame from three equally sized channel planes.
    pub fn from_planes(red: Array2<f32>, green: Array2<f32>, blue: Array2<f32>) -> Result<Self> {
        if red.dim() != green.dim() || red.dim() != blue.dim() {
            return Err(LumenError::InvalidInput(
                "RGB channel planes must share dimensions".into(),
            ));
        }
        Ok(Self { red, green, blue })
    }

    pub fn width(&self) -> usize {
        self.red.ncols()
    }

    pub fn height(&self) -> usize {
        self.red.nrows()
    }

    /// (height, width), matching `Array2::dim`.
    pub fn dim(&self) -> (usize, usize) {
        self.red.dim()
    }

    #[inline]
    pub fn pixel(&self, row: usize, col: usize) -> [f32; 3] {
        [
            self.red[[row, col]],
            self.green[[row, col]],
            self.blue[[row, col]],
        ]
    }

    #[inline]
    pub fn pixel_is_finite(&self, row: usize, col: usize) -> bool {
        self.red[[row, col]].is_finite()
            && self.green[[row, col]].is_finite()
            && self.blue[[row, col]].is_finite()
    }

    /// Rec.601 luminance plane.
    pub fn luminance(&self) -> Array2<f32> {
        let (h, w) = self.dim();
        let mut luma = Array2::<f32>::zeros((h, w));
        for row in 0..h {
            for col in 0..w {
                luma[[row, col]] = 0.299 * self.red[[row, col]]
                    + 0.587 * self.green[[row, col]]
                    + 0.114 * self.blue[[row, col]];
            }
        }
        luma
    }

    /// Clamp every channel to [0, 1] in place.
    pub fn clamp_inplace(&mut self) {
        for plane in [&mut self.red, &mut self.green, &mut self.blue] {
            plane.mapv_inplace(|v| v.clamp(0.0, 1.0));
        }
    }
}

/// Bilinear sample from a luminance plane with clamp-to-edge semantics.
pub fn bilinear_sample(data: &Array2<f32>, x: f32, y: f32) -> f32 {
    let (h, w) = data.dim();
    if h == 0 || w == 0 {
        return 0.0;
    }

    let x = x.clamp(0.0, (w - 1) as f32);
    let y = y.clamp(0.0, (h - 1) as f32);

    let x0 = x.floor() as usize;
    let y0 = y.floor() as usize;
    let x1 = (x0 + 1).min(w - 1);
    let y1 = (y0 + 1).min(h - 1);

    let fx = x - x0 as f32;
    let fy = y - y0 as f32;

    let v00 = data[[y0, x0]];
    let v10 = data[[y0, x1]];
    let v01 = data[[y1, x0]];
    let v11 = data[[y1, x1]];

    (1.0 - fx) * (1.0 - fy) * v00
        + fx * (1.0 - fy) * v10
        + (1.0 - fx) * fy * v01
        + fx * fy * v11
}

/// A gyroscope-derived 3x3 homography (row-major) used to seed optical flow.
#[derive(Clone, Debug)]
pub struct GyroHomography {
    pub h: [f32; 9],
    pub is_valid: bool,
}

impl Default for GyroHomography {
    fn default() -> Self {
        Self {
            h: [1.0, 0.0, 0.0, 0.0, 1.0, 0.0, 0.0, 0.0, 1.0],
            is_valid: false,
        }
    }
}

impl GyroHomography {
    pub fn new(h: [f32; 9]) -> Self {
        Self { h, is_valid: true }
    }

    /// Apply the homography to a point.
    pub fn transform_point(&self, x: f32, y: f32) -> (f32, f32) {
        let mut w = self.h[6] * x + self.h[7] * y + self.h[8];
        if w.abs() < 1e-6 {
            w = 1.0;
        }
        (
            (self.h[0] * x + self.h[1] * y + self.h[2]) / w,
            (self.h[3] * x + self.h[4] * y + self.h[5]) / w,
        )
    }

    /// Displacement the homography predicts at a point.
    pub fn initial_flow(&self, x: f32, y: f32) -> (f32, f32) {
        let (nx, ny) = self.transform_point(x, y);
        (nx - x, ny - y)
    }
}
