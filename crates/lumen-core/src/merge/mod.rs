//! Robust same-resolution burst merging.
//!
//! HDR+ style fusion of aligned frames: per-pixel robust aggregation with
//! an optional Wiener post-filter.

pub mod robust;
pub mod wiener;

use rayon::prelude::*;
use tracing::{debug, warn};

use crate::align::FrameAlignment;
use crate::consts::PARALLEL_PIXEL_THRESHOLD;
use crate::error::{LumenError, Result};
use crate::frame::RgbFrame;
use crate::pipeline::config::{MergeMethod, MergeParams};

use self::robust::{huber_mean, median, trimmed_mean};
use self::wiener::wiener_filter;

pub struct FrameMerger {
    params: MergeParams,
}

impl FrameMerger {
    pub fn new(params: MergeParams) -> Self {
        Self { params }
    }

    /// Fuse frames with the configured per-channel aggregation policy.
    /// Non-finite samples are skipped; channels with no finite sample go
    /// black. Output is clamped to [0, 1].
    pub fn merge(&self, frames: &[RgbFrame]) -> Result<RgbFrame> {
        let (h, w) = check_burst(frames)?;
        if frames.len() == 1 {
            let mut out = frames[0].clone();
            out.clamp_inplace();
            return Ok(out);
        }

        debug!(
            frames = frames.len(),
            width = w,
            height = h,
            method = ?self.params.method,
            "Merging burst"
        );

        let n = frames.len();
        let method = &self.params.method;
        let trim_ratio = self.params.trim_ratio;
        let huber_delta = self.params.huber_delta;

        let merge_row = |row: usize| -> Vec<[f32; 3]> {
            let mut scratch = vec![0.0f32; n];
            let mut out = Vec::with_capacity(w);
            for col in 0..w {
                let mut merged = [0.0f32; 3];
                for (channel, value) in merged.iter_mut().enumerate() {
                    let mut count = 0usize;
                    for frame in frames {
                        let plane = match channel {
                            0 => &frame.red,
                            1 => &frame.green,
                            _ => &frame.blue,
                        };
                        let v = plane[[row, col]];
                        if v.is_finite() {
                            scratch[count] = v;
                            count += 1;
                        }
                    }
                    let samples = &mut scratch[..count];
                    *value = if samples.is_empty() {
                        0.0
                    } else {
                        match method {
                            MergeMethod::Mean => {
                                samples.iter().sum::<f32>() / samples.len() as f32
                            }
                            MergeMethod::Trimmed => trimmed_mean(samples, trim_ratio),
                            MergeMethod::Huber => huber_mean(samples, huber_delta),
                            MergeMethod::Median => median(samples),
                        }
                        .clamp(0.0, 1.0)
                    };
                }
                out.push(merged);
            }
            out
        };

        let output = assemble_rows(h, w, n, merge_row);
        Ok(self.post_filter(output))
    }

    /// Weighted fusion: each frame contributes proportionally to its
    /// alignment confidence, penalized by average motion. Frames with an
    /// invalid alignment are down-weighted, not dropped.
    pub fn merge_with_weights(
        &self,
        frames: &[RgbFrame],
        alignments: &[FrameAlignment],
    ) -> Result<RgbFrame> {
        let (h, w) = check_burst(frames)?;
        if frames.len() != alignments.len() {
            return Err(LumenError::InvalidInput(
                "frame count must match alignment count".into(),
            ));
        }
        if frames.len() == 1 {
            let mut out = frames[0].clone();
            out.clamp_inplace();
            return Ok(out);
        }

        let n = frames.len();
        let mut weights = Vec::with_capacity(n);
        let mut total = 0.0f32;
        for alignment in alignments {
            let confidence = if alignment.is_valid {
                alignment.confidence
            } else {
                0.5
            };
            let weight = confidence * (-alignment.average_motion / 10.0).exp();
            weights.push(weight);
            total += weight;
        }
        if total > 0.0 {
            for weight in &mut weights {
                *weight /= total;
            }
        } else {
            weights.fill(1.0 / n as f32);
        }

        debug!(?weights, "Weighted merge");

        let merge_row = |row: usize| -> Vec<[f32; 3]> {
            let mut out = Vec::with_capacity(w);
            for col in 0..w {
                let mut sum = [0.0f32; 3];
                let mut valid_weight = 0.0f32;

                for (frame, &weight) in frames.iter().zip(weights.iter()) {
                    if !frame.pixel_is_finite(row, col) {
                        continue;
                    }
                    let [r, g, b] = frame.pixel(row, col);
                    sum[0] += r * weight;
                    sum[1] += g * weight;
                    sum[2] += b * weight;
                    valid_weight += weight;
                }

                if valid_weight > 0.0 {
                    let inv = 1.0 / valid_weight;
                    out.push([
                        (sum[0] * inv).clamp(0.0, 1.0),
                        (sum[1] * inv).clamp(0.0, 1.0),
                        (sum[2] * inv).clamp(0.0, 1.0),
                    ]);
                } else {
                    out.push([0.0, 0.0, 0.0]);
                }
            }
            out
        };

        let output = assemble_rows(h, w, n, merge_row);
        Ok(self.post_filter(output))
    }

    fn post_filter(&self, merged: RgbFrame) -> RgbFrame {
        if self.params.apply_wiener {
            wiener_filter(&merged, self.params.wiener_window, self.params.wiener_noise_var)
        } else {
            merged
        }
    }
}

fn check_burst(frames: &[RgbFrame]) -> Result<(usize, usize)> {
    let Some(first) = frames.first() else {
        return Err(LumenError::InvalidInput("empty burst".into()));
    };
    let (h, w) = first.dim();
    for (index, frame) in frames.iter().enumerate().skip(1) {
        if frame.dim() != (h, w) {
            warn!(index, "Frame size mismatch in burst");
            return Err(LumenError::DimensionMismatch {
                index,
                width: frame.width(),
                height: frame.height(),
                expected_width: w,
                expected_height: h,
            });
        }
    }
    Ok((h, w))
}

fn assemble_rows<F>(h: usize, w: usize, n: usize, merge_row: F) -> RgbFrame
where
    F: Fn(usize) -> Vec<[f32; 3]> + Sync,
{
    let rows: Vec<Vec<[f32; 3]>> = if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        (0..h).into_par_iter().map(&merge_row).collect()
    } else {
        (0..h).map(&merge_row).collect()
    };

    let mut output = RgbFrame::black(h, w);
    for (row, row_data) in rows.into_iter().enumerate() {
        for (col, [r, g, b]) in row_data.into_iter().enumerate() {
            output.red[[row, col]] = r;
            output.green[[row, col]] = g;
            output.blue[[row, col]] = b;
        }
    }
    output
}
