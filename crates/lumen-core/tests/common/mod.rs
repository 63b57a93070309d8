use ndarray::Array2;

use lumen_core::frame::RgbFrame;

/// Frame filled with one constant value in every channel.
pub fn constant_frame(height: usize, width: usize, value: f32) -> RgbFrame {
    RgbFrame {
        red: Array2::from_elem((height, width), value),
        green: Array2::from_elem((height, width), value),
        blue: Array2::from_elem((height, width), value),
    }
}

/// Binary checkerboard with the given cell period.
pub fn checkerboard(height: usize, width: usize, period: usize) -> RgbFrame {
    let mut plane = Array2::<f32>::zeros((height, width));
    for row in 0..height {
        for col in 0..width {
            if ((row / period) + (col / period)) % 2 == 0 {
                plane[[row, col]] = 1.0;
            }
        }
    }
    RgbFrame {
        red: plane.clone(),
        green: plane.clone(),
        blue: plane,
    }
}

/// Smooth continuous test pattern, sampled at (x, y) in input-pixel units.
pub fn smooth_pattern(x: f32, y: f32) -> f32 {
    0.5 + 0.25 * (x * 0.35).sin() + 0.2 * (y * 0.27).cos()
}

/// Frame sampling the smooth pattern at integer pixel centers, optionally
/// shifted: the content moves by (+dx, +dy).
pub fn smooth_frame(height: usize, width: usize, dx: f32, dy: f32) -> RgbFrame {
    let mut plane = Array2::<f32>::zeros((height, width));
    for row in 0..height {
        for col in 0..width {
            plane[[row, col]] = smooth_pattern(col as f32 - dx, row as f32 - dy);
        }
    }
    RgbFrame {
        red: plane.clone(),
        green: plane.clone(),
        blue: plane,
    }
}

/// Deterministic white-noise plane from a simple LCG.
pub fn noise_plane(height: usize, width: usize, seed: u32) -> Array2<f32> {
    let mut state = seed.wrapping_mul(2654435761).wrapping_add(1);
    let mut plane = Array2::<f32>::zeros((height, width));
    for row in 0..height {
        for col in 0..width {
            state = state.wrapping_mul(1664525).wrapping_add(1013904223);
            plane[[row, col]] = (state >> 8) as f32 / (1u32 << 24) as f32;
        }
    }
    plane
}

pub fn noise_frame(height: usize, width: usize, seed: u32) -> RgbFrame {
    RgbFrame {
        red: noise_plane(height, width, seed),
        green: noise_plane(height, width, seed.wrapping_add(7)),
        blue: noise_plane(height, width, seed.wrapping_add(13)),
    }
}

/// Shift frame content by an integer (+dx, +dy); border pixels repeat.
pub fn shift_frame_integer(frame: &RgbFrame, dx: i64, dy: i64) -> RgbFrame {
    let (h, w) = frame.dim();
    let mut out = RgbFrame::black(h, w);
    for row in 0..h {
        for col in 0..w {
            let src_row = (row as i64 - dy).clamp(0, h as i64 - 1) as usize;
            let src_col = (col as i64 - dx).clamp(0, w as i64 - 1) as usize;
            out.red[[row, col]] = frame.red[[src_row, src_col]];
            out.green[[row, col]] = frame.green[[src_row, src_col]];
            out.blue[[row, col]] = frame.blue[[src_row, src_col]];
        }
    }
    out
}

pub fn luminances(frames: &[RgbFrame]) -> Vec<Array2<f32>> {
    frames.iter().map(|f| f.luminance()).collect()
}

/// Maximum absolute channel difference between two frames.
pub fn max_abs_diff(a: &RgbFrame, b: &RgbFrame) -> f32 {
    let mut max = 0.0f32;
    for (pa, pb) in [
        (&a.red, &b.red),
        (&a.green, &b.green),
        (&a.blue, &b.blue),
    ] {
        for (va, vb) in pa.iter().zip(pb.iter()) {
            max = max.max((va - vb).abs());
        }
    }
    max
}

/// Mean absolute channel difference between two frames.
pub fn mean_abs_diff(a: &RgbFrame, b: &RgbFrame) -> f32 {
    let mut sum = 0.0f64;
    let mut count = 0usize;
    for (pa, pb) in [
        (&a.red, &b.red),
        (&a.green, &b.green),
        (&a.blue, &b.blue),
    ] {
        for (va, vb) in pa.iter().zip(pb.iter()) {
            sum += (va - vb).abs() as f64;
            count += 1;
        }
    }
    (sum / count as f64) as f32
}
