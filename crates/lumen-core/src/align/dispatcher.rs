//! Alignment mode dispatch.

use ndarray::Array2;
use tracing::info;

use crate::error::{LumenError, Result};
use crate::frame::GyroHomography;
use crate::pipeline::config::{AlignmentMode, AlignmentParams, FlowParams};

use super::flow::DenseOpticalFlow;
use super::tile::TileAligner;
use super::{AlignmentField, FrameAlignment};

/// Align every frame of a burst toward the reference with the configured
/// mode. The reference entry is the identity alignment.
pub fn align_burst(
    luma: &[Array2<f32>],
    reference: usize,
    alignment: &AlignmentParams,
    flow: &FlowParams,
    gyro: Option<&[GyroHomography]>,
) -> Result<Vec<FrameAlignment>> {
    if luma.is_empty() {
        return Err(LumenError::InvalidInput("empty burst".into()));
    }
    if reference >= luma.len() {
        return Err(LumenError::InvalidInput(format!(
            "reference index {} out of range for {} frames",
            reference,
            luma.len()
        )));
    }

    let (h, w) = luma[reference].dim();
    info!(
        frames = luma.len(),
        reference,
        mode = ?alignment.mode,
        "Aligning burst"
    );

    let mut results = Vec::with_capacity(luma.len());

    match alignment.mode {
        AlignmentMode::TileBased => {
            let mut aligner = TileAligner::new(alignment.clone());
            aligner.set_reference(luma[reference].clone());
            for (i, frame) in luma.iter().enumerate() {
                if i == reference {
                    results.push(FrameAlignment::identity(w, h, alignment.tile_size));
                } else {
                    results.push(aligner.align(frame));
                }
            }
        }
        AlignmentMode::DenseFlow => {
            let mut engine = DenseOpticalFlow::new(flow.clone(), alignment.pyramid_levels);
            engine.set_reference(luma[reference].clone());
            for (i, frame) in luma.iter().enumerate() {
                if i == reference {
                    results.push(FrameAlignment::identity(w, h, alignment.tile_size));
                    continue;
                }
                let gyro_init = gyro.and_then(|g| g.get(i));
                let result = engine.compute(frame, gyro_init)?;
                results.push(FrameAlignment {
                    average_motion: result.average_flow,
                    confidence: result.coverage,
                    is_valid: result.is_valid,
                    field: AlignmentField::Flow(result.flow),
                });
            }
        }
        AlignmentMode::Hybrid => {
            let mut aligner = TileAligner::new(alignment.clone());
            aligner.set_reference(luma[reference].clone());
            let mut engine = DenseOpticalFlow::new(flow.clone(), alignment.pyramid_levels);
            engine.set_reference(luma[reference].clone());

            for (i, frame) in luma.iter().enumerate() {
                if i == reference {
                    results.push(FrameAlignment::identity(w, h, alignment.tile_size));
                    continue;
                }
                let coarse = aligner.align(frame);
                let seed = coarse.to_motion_field(w, h, alignment.tile_size);
                let result = engine.compute_seeded(frame, &seed, alignment.tile_size)?;
                results.push(FrameAlignment {
                    average_motion: result.average_flow,
                    confidence: result.coverage,
                    is_valid: result.is_valid,
                    field: AlignmentField::Flow(result.flow),
                });
            }
        }
    }

    Ok(results)
}
