use std::path::PathBuf;
use std::sync::Arc;

use anyhow::Result;
use clap::{Args, ValueEnum};

use lumen_core::pipeline::config::Robustness;
use lumen_core::pipeline::BurstPipeline;

use crate::io::{load_burst, save_rgb};
use crate::progress::BarSink;
use crate::summary::print_result_summary;

#[derive(Clone, ValueEnum)]
pub enum RobustnessArg {
    None,
    Huber,
    Tukey,
}

impl From<&RobustnessArg> for Robustness {
    fn from(arg: &RobustnessArg) -> Self {
        match arg {
            RobustnessArg::None => Robustness::None,
            RobustnessArg::Huber => Robustness::Huber,
            RobustnessArg::Tukey => Robustness::Tukey,
        }
    }
}

#[derive(Args)]
pub struct UpscaleArgs {
    /// Input frames or a directory of frames
    pub inputs: Vec<PathBuf>,

    /// Output scale factor (2-4)
    #[arg(long, default_value = "2")]
    pub scale: usize,

    /// Reference frame index
    #[arg(long, default_value = "0")]
    pub reference: usize,

    /// Outlier rejection during accumulation
    #[arg(long, value_enum, default_value = "huber")]
    pub robustness: RobustnessArg,

    /// Tile size for the constant-memory driver
    #[arg(long, default_value = "256")]
    pub tile_size: usize,

    /// Overlap between tiles in pixels (even)
    #[arg(long, default_value = "32")]
    pub overlap: usize,

    /// Engine configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output file path
    #[arg(short, long, default_value = "upscaled.png")]
    pub output: PathBuf,
}

pub fn run(args: &UpscaleArgs) -> Result<()> {
    let frames = load_burst(&args.inputs)?;
    println!(
        "Upscaling {} frames ({}x{}) at {}x",
        frames.len(),
        frames[0].width(),
        frames[0].height(),
        args.scale
    );

    let mut config = super::load_config(args.config.as_ref())?;
    config.mfsr.scale_factor = args.scale;
    config.tiled.tile_width = args.tile_size;
    config.tiled.tile_height = args.tile_size;
    config.tiled.overlap = args.overlap;
    config.tiled.robustness = (&args.robustness).into();

    let mut pipeline = BurstPipeline::new(config)?;
    let sink = Arc::new(BarSink::new());
    pipeline.set_progress_sink(sink.clone());

    let luma: Vec<_> = frames.iter().map(|f| f.luminance()).collect();
    let result = pipeline.mfsr(&frames, &luma, args.reference, None)?;
    sink.finish();

    save_rgb(&result.output, &args.output)?;
    print_result_summary(&result);
    println!("Saved {}", args.output.display());

    Ok(())
}
