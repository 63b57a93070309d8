//! Wiener post-filter for merged output.

use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::frame::RgbFrame;

/// Apply the local Wiener filter to each channel:
/// out = mean + max(0, var - noise_var) / var * (in - mean), clamped to [0,1].
pub fn wiener_filter(input: &RgbFrame, window: usize, noise_var: f32) -> RgbFrame {
    RgbFrame {
        red: wiener_channel(&input.red, window, noise_var),
        green: wiener_channel(&input.green, window, noise_var),
        blue: wiener_channel(&input.blue, window, noise_var),
    }
}

fn wiener_channel(input: &Array2<f32>, window: usize, noise_var: f32) -> Array2<f32> {
    let (h, w) = input.dim();
    let half = (window / 2) as i64;

    let filter_row = |row: usize| -> Vec<f32> {
        let mut out = vec![0.0f32; w];
        for (col, value) in out.iter_mut().enumerate() {
            let mut sum = 0.0f32;
            let mut sum_sq = 0.0f32;
            let mut count = 0u32;

            for dy in -half..=half {
                let py = (row as i64 + dy).clamp(0, h as i64 - 1) as usize;
                for dx in -half..=half {
                    let px = (col as i64 + dx).clamp(0, w as i64 - 1) as usize;
                    let v = input[[py, px]];
                    sum += v;
                    sum_sq += v * v;
                    count += 1;
                }
            }

            let mean = sum / count as f32;
            let variance = (sum_sq / count as f32 - mean * mean).max(0.0);

            let signal_var = (variance - noise_var).max(0.0);
            let gain = if variance > 1e-6 {
                signal_var / variance
            } else {
                0.0
            };

            let filtered = mean + gain * (input[[row, col]] - mean);
            *value = filtered.clamp(0.0, 1.0);
        }
        out
    };

    let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
        (0..h).into_par_iter().map(filter_row).collect()
    } else {
        (0..h).map(filter_row).collect()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, val) in row_data.into_iter().enumerate() {
            result[[row, col]] = val;
        }
    }
    result
}
