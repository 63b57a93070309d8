//! Tile-based super-resolution pipeline.
//!
//! Processes the burst in fixed-size input tiles so peak memory stays
//! constant regardless of image size. Each tile runs dense optical flow
//! and Lanczos-2 scatter accumulation, then its core region is blended
//! into the global output with triangular overlap weights.

pub mod fallback;
pub mod grid;

use ndarray::Array2;
use tracing::{info, warn};

use crate::align::flow::{DenseOpticalFlow, FlowVector};
use crate::consts::{GAP_FILL_PASSES, LANCZOS_A, MIN_TILE_COVERAGE};
use crate::error::{LumenError, Result};
use crate::frame::{GyroHomography, RgbFrame};
use crate::merge::robust::{huber_weight, tukey_biweight};
use crate::mfsr::{lanczos_weight, Accumulator};
use crate::pipeline::config::{BurstConfig, Robustness};
use crate::pipeline::types::{
    CancelToken, FallbackReason, PipelineResult, PipelineStage, ProgressSink,
};

use self::fallback::{bilinear_upscale, estimate_global_motion};
use self::grid::{compute_tile_grid, crop_plane, crop_rgb, TileRegion};

/// Result of one processed tile, dropped before the next tile begins.
struct TileOutcome {
    image: RgbFrame,
    coverage: f32,
    average_flow: f32,
    subpixel_shift_sum: f32,
    subpixel_shift_count: usize,
    flows_failed: usize,
    success: bool,
}

pub struct TiledPipeline {
    config: BurstConfig,
}

impl TiledPipeline {
    pub fn new(config: BurstConfig) -> Self {
        Self { config }
    }

    /// Run the tiled MFSR pipeline over a burst.
    pub fn process(
        &self,
        frames: &[RgbFrame],
        luma: &[Array2<f32>],
        reference: usize,
        gyro: Option<&[GyroHomography]>,
        cancel: &CancelToken,
        sink: &dyn ProgressSink,
    ) -> Result<PipelineResult> {
        let (h, w) = validate_burst(frames, luma, reference)?;
        let scale = self.config.mfsr.scale_factor;
        let tiled = &self.config.tiled;

        info!(
            frames = frames.len(),
            width = w,
            height = h,
            scale,
            "Starting tiled MFSR pipeline"
        );

        let mut result = PipelineResult::empty(w, h);
        result.output_width = w * scale;
        result.output_height = h * scale;
        result.frames_used = frames.len();

        if frames.len() < 2 {
            warn!("Need at least 2 frames for MFSR");
            return Ok(self.fallback(&frames[reference], FallbackReason::AlignmentFailed, result, sink));
        }

        if cancel.is_cancelled() {
            result.cancelled = true;
            return Ok(result);
        }

        // Advisory memory screen: a single tile's scratch must fit the
        // configured budget.
        let estimated = self.estimate_tile_bytes(frames.len(), w, h, scale);
        if estimated > tiled.max_memory_mb * 1024 * 1024 {
            warn!(
                estimated,
                budget_mb = tiled.max_memory_mb,
                "Per-tile scratch exceeds the memory budget"
            );
            return Ok(self.fallback(&frames[reference], FallbackReason::MemoryExceeded, result, sink));
        }

        sink.report(PipelineStage::MotionCheck, 0.0, "Estimating global motion");
        let mut max_motion = 0.0f32;
        for (i, frame_luma) in luma.iter().enumerate() {
            if i == reference {
                continue;
            }
            let motion =
                estimate_global_motion(&luma[reference], frame_luma, tiled.fallback_motion_px);
            max_motion = max_motion.max(motion);
        }
        info!(max_motion, "Global motion check");
        if max_motion > tiled.fallback_motion_px {
            warn!(
                max_motion,
                threshold = tiled.fallback_motion_px,
                "Excessive motion, skipping MFSR"
            );
            return Ok(self.fallback(&frames[reference], FallbackReason::ExcessiveMotion, result, sink));
        }

        if cancel.is_cancelled() {
            result.cancelled = true;
            return Ok(result);
        }

        let tiles = compute_tile_grid(w, h, tiled.tile_width, tiled.tile_height, tiled.overlap, scale);
        let total_tiles = tiles.len();
        info!(total_tiles, "Processing tiles");

        let mut output = RgbFrame::black(h * scale, w * scale);
        let mut weight_map = Array2::<f32>::zeros((h * scale, w * scale));

        let mut total_flow = 0.0f32;
        let mut total_coverage = 0.0f32;
        let mut shift_sum = 0.0f32;
        let mut shift_count = 0usize;
        let mut flows_attempted = 0usize;
        let mut flows_failed = 0usize;

        for (index, region) in tiles.iter().enumerate() {
            if cancel.is_cancelled() {
                result.cancelled = true;
                return Ok(result);
            }

            sink.report(
                PipelineStage::ProcessingTiles,
                index as f32 / total_tiles as f32,
                "Processing MFSR tiles",
            );

            let outcome = self.process_tile(frames, luma, reference, region, gyro);
            flows_attempted += frames.len() - 1;
            flows_failed += outcome.flows_failed;

            if outcome.success {
                blend_tile(&outcome.image, region, scale, tiled.overlap, &mut output, &mut weight_map);
                total_flow += outcome.average_flow;
                total_coverage += outcome.coverage;
                shift_sum += outcome.subpixel_shift_sum;
                shift_count += outcome.subpixel_shift_count;
                result.tiles_processed += 1;
            } else {
                warn!(tile = index, coverage = outcome.coverage, "Tile fell back");
                result.tiles_failed += 1;
            }
            // Tile scratch is dropped here, before the next tile begins.
        }

        if result.tiles_processed == 0 {
            let reason = if flows_attempted > 0 && flows_failed == flows_attempted {
                FallbackReason::FlowFailed
            } else {
                FallbackReason::LowCoverage
            };
            return Ok(self.fallback(&frames[reference], reason, result, sink));
        }

        // Normalize the blended output by the accumulated weights.
        let (oh, ow) = weight_map.dim();
        for y in 0..oh {
            for x in 0..ow {
                let weight = weight_map[[y, x]];
                if weight > 0.0 {
                    let inv = 1.0 / weight;
                    output.red[[y, x]] = (output.red[[y, x]] * inv).clamp(0.0, 1.0);
                    output.green[[y, x]] = (output.green[[y, x]] * inv).clamp(0.0, 1.0);
                    output.blue[[y, x]] = (output.blue[[y, x]] * inv).clamp(0.0, 1.0);
                }
            }
        }

        result.output = output;
        result.average_flow = total_flow / result.tiles_processed as f32;
        result.coverage = total_coverage / result.tiles_processed as f32;
        result.average_subpixel_shift = if shift_count > 0 {
            shift_sum / shift_count as f32
        } else {
            0.0
        };
        result.success = true;

        info!(
            tiles = result.tiles_processed,
            failed = result.tiles_failed,
            average_flow = result.average_flow,
            "Tiled MFSR complete"
        );
        sink.report(PipelineStage::Complete, 1.0, "MFSR complete");

        Ok(result)
    }

    /// Flow + scatter + normalize for one padded tile.
    fn process_tile(
        &self,
        frames: &[RgbFrame],
        luma: &[Array2<f32>],
        reference: usize,
        region: &TileRegion,
        gyro: Option<&[GyroHomography]>,
    ) -> TileOutcome {
        let scale = self.config.mfsr.scale_factor;
        let n = frames.len();

        let rgb_crops: Vec<RgbFrame> = frames.iter().map(|f| crop_rgb(f, region)).collect();
        let luma_crops: Vec<Array2<f32>> = luma.iter().map(|l| crop_plane(l, region)).collect();

        let (ph, pw) = luma_crops[reference].dim();

        let mut engine = DenseOpticalFlow::new(
            self.config.flow.clone(),
            self.config.alignment.pyramid_levels,
        );
        engine.set_reference(luma_crops[reference].clone());

        let mut flows: Vec<Array2<FlowVector>> = Vec::with_capacity(n);
        let mut total_flow = 0.0f32;
        let mut valid_flows = 0usize;
        let mut flows_failed = 0usize;
        let mut shift_sum = 0.0f32;
        let mut shift_count = 0usize;

        for i in 0..n {
            if i == reference {
                flows.push(Array2::from_elem((ph, pw), FlowVector::new(0.0, 0.0, 1.0)));
                continue;
            }

            let gyro_init = gyro.and_then(|g| g.get(i));
            match engine.compute(&luma_crops[i], gyro_init) {
                Ok(result) if result.is_valid => {
                    total_flow += result.average_flow;
                    valid_flows += 1;
                    for fv in result.flow.iter() {
                        if fv.confidence > self.config.flow.high_confidence {
                            let fx = fv.dx - fv.dx.floor();
                            let fy = fv.dy - fv.dy.floor();
                            shift_sum += (fx * fx + fy * fy).sqrt();
                            shift_count += 1;
                        }
                    }
                    flows.push(result.flow);
                }
                _ => {
                    flows_failed += 1;
                    flows.push(Array2::from_elem((ph, pw), FlowVector::new(0.0, 0.0, 0.5)));
                }
            }
        }

        let out_w = pw * scale;
        let out_h = ph * scale;
        let mut acc = Accumulator::new(out_h, out_w);
        let ref_crop = &rgb_crops[reference];

        for (frame_idx, crop) in rgb_crops.iter().enumerate() {
            let flow = &flows[frame_idx];
            self.scatter_tile(crop, ref_crop, flow, frame_idx == reference, &mut acc, scale);
        }

        acc.fill_gaps(GAP_FILL_PASSES);
        let coverage = acc.coverage();

        TileOutcome {
            image: acc.normalize(),
            coverage,
            average_flow: if valid_flows > 0 {
                total_flow / valid_flows as f32
            } else {
                0.0
            },
            subpixel_shift_sum: shift_sum,
            subpixel_shift_count: shift_count,
            flows_failed,
            success: coverage > MIN_TILE_COVERAGE,
        }
    }

    /// Lanczos-2 scatter of one cropped frame into the tile accumulator.
    fn scatter_tile(
        &self,
        crop: &RgbFrame,
        reference: &RgbFrame,
        flow: &Array2<FlowVector>,
        is_reference: bool,
        acc: &mut Accumulator,
        scale: usize,
    ) {
        let (ch, cw) = crop.dim();
        let out_w = acc.width();
        let out_h = acc.height();
        let robustness = self.config.tiled.robustness;
        let threshold = self.config.tiled.robustness_threshold;

        for y in 0..ch {
            for x in 0..cw {
                if !crop.pixel_is_finite(y, x) {
                    continue;
                }
                let fv = flow[[y, x]];

                let dst_x = (x as f32 - fv.dx) * scale as f32;
                let dst_y = (y as f32 - fv.dy) * scale as f32;
                if !dst_x.is_finite() || !dst_y.is_finite() {
                    continue;
                }
                if dst_x < 0.0
                    || dst_x >= (out_w - 1) as f32
                    || dst_y < 0.0
                    || dst_y >= (out_h - 1) as f32
                {
                    continue;
                }

                let rgb = crop.pixel(y, x);

                let robust = if is_reference {
                    1.0
                } else {
                    let ref_rgb = reference.pixel(y, x);
                    let dr = rgb[0] - ref_rgb[0];
                    let dg = rgb[1] - ref_rgb[1];
                    let db = rgb[2] - ref_rgb[2];
                    let residual = (dr * dr + dg * dg + db * db).sqrt();
                    match robustness {
                        Robustness::None => 1.0,
                        Robustness::Huber => huber_weight(residual, threshold),
                        Robustness::Tukey => tukey_biweight(residual, threshold),
                    }
                };

                let x0 = dst_x.floor() as i64 - 1;
                let y0 = dst_y.floor() as i64 - 1;

                for ky in 0..4i64 {
                    let py = y0 + ky;
                    if py < 0 || py >= out_h as i64 {
                        continue;
                    }
                    let wy = lanczos_weight((dst_y - py as f32).abs(), LANCZOS_A);
                    for kx in 0..4i64 {
                        let px = x0 + kx;
                        if px < 0 || px >= out_w as i64 {
                            continue;
                        }
                        let wx = lanczos_weight((dst_x - px as f32).abs(), LANCZOS_A);

                        let weight = wx * wy * fv.confidence * robust;
                        if weight <= 0.0 {
                            continue;
                        }
                        acc.deposit(py as usize, px as usize, rgb, weight);
                    }
                }
            }
        }
    }

    /// Rough upper bound of one tile's scratch allocation.
    fn estimate_tile_bytes(&self, n: usize, w: usize, h: usize, scale: usize) -> usize {
        let tiled = &self.config.tiled;
        let padded_w = (tiled.tile_width + tiled.overlap).min(w);
        let padded_h = (tiled.tile_height + tiled.overlap).min(h);
        let padded = padded_w * padded_h;

        // RGB + luminance crops and a flow field per frame, plus the
        // scaled accumulator planes.
        let per_pixel = n * (4 * std::mem::size_of::<f32>() + std::mem::size_of::<FlowVector>());
        padded * per_pixel + padded * scale * scale * Accumulator::CELL_BYTES
    }

    fn fallback(
        &self,
        reference: &RgbFrame,
        reason: FallbackReason,
        mut result: PipelineResult,
        sink: &dyn ProgressSink,
    ) -> PipelineResult {
        sink.report(PipelineStage::Fallback, 1.0, &reason.to_string());
        result.output = bilinear_upscale(reference, self.config.mfsr.scale_factor);
        result.fallback_reason = reason;
        result.used_fallback = true;
        result.frames_used = 1;
        result.success = true;
        result
    }
}

fn validate_burst(
    frames: &[RgbFrame],
    luma: &[Array2<f32>],
    reference: usize,
) -> Result<(usize, usize)> {
    let Some(first) = frames.first() else {
        return Err(LumenError::InvalidInput("empty burst".into()));
    };
    if frames.len() != luma.len() {
        return Err(LumenError::InvalidInput(
            "frame and luminance counts must match".into(),
        ));
    }
    if reference >= frames.len() {
        return Err(LumenError::InvalidInput(format!(
            "reference index {} out of range for {} frames",
            reference,
            frames.len()
        )));
    }

    let (h, w) = first.dim();
    if h == 0 || w == 0 {
        return Err(LumenError::InvalidInput("zero-sized frame".into()));
    }
    for (index, frame) in frames.iter().enumerate() {
        if frame.dim() != (h, w) || luma[index].dim() != (h, w) {
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

/// Blend a tile's core output region into the global output and weight map
/// with triangular per-axis weights that taper only toward sides that have
/// a neighboring tile.
fn blend_tile(
    tile: &RgbFrame,
    region: &TileRegion,
    scale: usize,
    overlap: usize,
    output: &mut RgbFrame,
    weight_map: &mut Array2<f32>,
) {
    let scaled_overlap = overlap * scale;
    let (out_h, out_w) = weight_map.dim();
    let core_x = region.pad_left * scale;
    let core_y = region.pad_top * scale;

    for y in 0..region.out_height {
        let gy = region.out_y + y;
        if gy >= out_h {
            break;
        }
        let wy = axis_weight(
            y,
            region.out_height,
            scaled_overlap,
            region.has_top_neighbor(),
            region.has_bottom_neighbor(),
        );
        for x in 0..region.out_width {
            let gx = region.out_x + x;
            if gx >= out_w {
                break;
            }
            let wx = axis_weight(
                x,
                region.out_width,
                scaled_overlap,
                region.has_left_neighbor(),
                region.has_right_neighbor(),
            );
            let weight = wx * wy;
            if weight <= 0.0 {
                continue;
            }

            let ty = core_y + y;
            let tx = core_x + x;
            output.red[[gy, gx]] += tile.red[[ty, tx]] * weight;
            output.green[[gy, gx]] += tile.green[[ty, tx]] * weight;
            output.blue[[gy, gx]] += tile.blue[[ty, tx]] * weight;
            weight_map[[gy, gx]] += weight;
        }
    }
}

/// Triangular blend weight along one axis: 0 at the tile edge rising to 1
/// one overlap-distance inside, applied only toward neighboring tiles.
fn axis_weight(pos: usize, size: usize, overlap: usize, taper_low: bool, taper_high: bool) -> f32 {
    if overlap == 0 {
        return 1.0;
    }
    if taper_low && pos < overlap {
        pos as f32 / overlap as f32
    } else if taper_high && pos + overlap >= size {
        (size - 1 - pos) as f32 / overlap as f32
    } else {
        1.0
    }
}
