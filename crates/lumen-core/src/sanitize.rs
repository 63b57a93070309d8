//! Numerical safety scanning.
//!
//! Non-zero NaN/Inf counts indicate an upstream bug; the replacement pass
//! is a safety net, not a fix.

use tracing::{error, info, warn};

use crate::frame::RgbFrame;

/// Per-channel statistics of an RGB frame.
#[derive(Clone, Debug, Default)]
pub struct ImageStats {
    pub min: [f32; 3],
    pub max: [f32; 3],
    pub mean: [f32; 3],
    pub nan_count: usize,
    pub inf_count: usize,
    pub out_of_range: usize,
    pub total_values: usize,
}

impl ImageStats {
    pub fn scan(frame: &RgbFrame) -> Self {
        let mut stats = Self {
            min: [f32::INFINITY; 3],
            max: [f32::NEG_INFINITY; 3],
            ..Self::default()
        };

        for (channel, plane) in [&frame.red, &frame.green, &frame.blue].into_iter().enumerate() {
            let mut sum = 0.0f64;
            for &v in plane.iter() {
                stats.total_values += 1;
                if v.is_nan() {
                    stats.nan_count += 1;
                    continue;
                }
                if v.is_infinite() {
                    stats.inf_count += 1;
                    continue;
                }
                if !(0.0..=1.0).contains(&v) {
                    stats.out_of_range += 1;
                }
                stats.min[channel] = stats.min[channel].min(v);
                stats.max[channel] = stats.max[channel].max(v);
                sum += v as f64;
            }
            let count = plane.len().max(1);
            stats.mean[channel] = (sum / count as f64) as f32;
        }

        stats
    }

    /// The frame is numerically healthy when no NaN/Inf was found.
    pub fn healthy(&self) -> bool {
        self.nan_count == 0 && self.inf_count == 0
    }

    pub fn invalid_fraction(&self) -> f32 {
        if self.total_values == 0 {
            return 0.0;
        }
        (self.nan_count + self.inf_count) as f32 / self.total_values as f32
    }

    /// Log the statistics with severity matching health.
    pub fn log(&self, prefix: &str) {
        if self.healthy() {
            info!(
                prefix,
                min = ?self.min,
                max = ?self.max,
                mean = ?self.mean,
                "Image statistics healthy"
            );
        } else if self.invalid_fraction() < 0.001 {
            warn!(
                prefix,
                nan = self.nan_count,
                inf = self.inf_count,
                "Image contains a few non-finite values"
            );
        } else {
            error!(
                prefix,
                nan = self.nan_count,
                inf = self.inf_count,
                fraction = self.invalid_fraction(),
                "Image contains non-finite values"
            );
        }

        if self.out_of_range > 0 {
            warn!(
                prefix,
                out_of_range = self.out_of_range,
                "Values outside [0, 1] before final clamp"
            );
        }
    }
}

/// Replace every non-finite channel value with 0. Returns the number of
/// replaced values.
pub fn sanitize(frame: &mut RgbFrame) -> usize {
    let mut replaced = 0usize;
    for plane in [&mut frame.red, &mut frame.green, &mut frame.blue] {
        for v in plane.iter_mut() {
            if !v.is_finite() {
                *v = 0.0;
                replaced += 1;
            }
        }
    }
    replaced
}
