//! Burst frame loading and result saving.

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use ndarray::Array2;

use lumen_core::frame::RgbFrame;

/// Load one image file into planar float RGB in [0, 1].
pub fn load_rgb(path: &Path) -> Result<RgbFrame> {
    let image = image::open(path)
        .with_context(|| format!("failed to open {}", path.display()))?
        .to_rgb32f();
    let (w, h) = (image.width() as usize, image.height() as usize);

    let mut red = Array2::<f32>::zeros((h, w));
    let mut green = Array2::<f32>::zeros((h, w));
    let mut blue = Array2::<f32>::zeros((h, w));
    for (x, y, pixel) in image.enumerate_pixels() {
        red[[y as usize, x as usize]] = pixel.0[0];
        green[[y as usize, x as usize]] = pixel.0[1];
        blue[[y as usize, x as usize]] = pixel.0[2];
    }

    RgbFrame::from_planes(red, green, blue).context("inconsistent channel planes")
}

/// Load a burst: either every file given explicitly, or every image in a
/// directory (sorted by name). All frames must share dimensions.
pub fn load_burst(inputs: &[PathBuf]) -> Result<Vec<RgbFrame>> {
    let mut paths: Vec<PathBuf> = Vec::new();
    for input in inputs {
        if input.is_dir() {
            let mut entries: Vec<PathBuf> = std::fs::read_dir(input)
                .with_context(|| format!("failed to read {}", input.display()))?
                .filter_map(|e| e.ok().map(|e| e.path()))
                .filter(|p| {
                    matches!(
                        p.extension().and_then(|e| e.to_str()),
                        Some("png" | "jpg" | "jpeg" | "tif" | "tiff")
                    )
                })
                .collect();
            entries.sort();
            paths.extend(entries);
        } else {
            paths.push(input.clone());
        }
    }

    if paths.is_empty() {
        bail!("no input frames found");
    }

    let mut frames = Vec::with_capacity(paths.len());
    for path in &paths {
        frames.push(load_rgb(path)?);
    }

    let dim = frames[0].dim();
    for (i, frame) in frames.iter().enumerate() {
        if frame.dim() != dim {
            bail!(
                "frame {} ({}) is {}x{}, expected {}x{}",
                i,
                paths[i].display(),
                frame.width(),
                frame.height(),
                dim.1,
                dim.0
            );
        }
    }

    Ok(frames)
}

/// Save a float RGB frame as an 8-bit image, format chosen by extension.
pub fn save_rgb(frame: &RgbFrame, path: &Path) -> Result<()> {
    let (h, w) = frame.dim();
    let mut buffer = image::RgbImage::new(w as u32, h as u32);
    for (x, y, pixel) in buffer.enumerate_pixels_mut() {
        let [r, g, b] = frame.pixel(y as usize, x as usize);
        pixel.0 = [to_u8(r), to_u8(g), to_u8(b)];
    }
    buffer
        .save(path)
        .with_context(|| format!("failed to write {}", path.display()))
}

fn to_u8(value: f32) -> u8 {
    if !value.is_finite() {
        return 0;
    }
    (value * 255.0 + 0.5).clamp(0.0, 255.0) as u8
}
