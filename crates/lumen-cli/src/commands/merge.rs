use std::path::PathBuf;

use anyhow::Result;
use clap::{Args, ValueEnum};

use lumen_core::pipeline::config::MergeMethod;
use lumen_core::pipeline::BurstPipeline;

use crate::io::{load_burst, save_rgb};
use crate::summary::print_result_summary;

#[derive(Clone, ValueEnum)]
pub enum MergeMethodArg {
    Mean,
    Trimmed,
    Huber,
    Median,
}

impl From<&MergeMethodArg> for MergeMethod {
    fn from(arg: &MergeMethodArg) -> Self {
        match arg {
            MergeMethodArg::Mean => MergeMethod::Mean,
            MergeMethodArg::Trimmed => MergeMethod::Trimmed,
            MergeMethodArg::Huber => MergeMethod::Huber,
            MergeMethodArg::Median => MergeMethod::Median,
        }
    }
}

#[derive(Args)]
pub struct MergeArgs {
    /// Input frames or a directory of frames
    pub inputs: Vec<PathBuf>,

    /// Reference frame index
    #[arg(long, default_value = "0")]
    pub reference: usize,

    /// Merge method
    #[arg(long, value_enum, default_value = "mean")]
    pub method: MergeMethodArg,

    /// Apply the Wiener post-filter
    #[arg(long)]
    pub wiener: bool,

    /// Engine configuration file (TOML)
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Output file path
    #[arg(short, long, default_value = "merged.png")]
    pub output: PathBuf,
}

pub fn run(args: &MergeArgs) -> Result<()> {
    let frames = load_burst(&args.inputs)?;
    println!(
        "Merging {} frames ({}x{})",
        frames.len(),
        frames[0].width(),
        frames[0].height()
    );

    let mut config = super::load_config(args.config.as_ref())?;
    config.merge.method = (&args.method).into();
    if args.wiener {
        config.merge.apply_wiener = true;
    }

    let pipeline = BurstPipeline::new(config)?;

    let luma: Vec<_> = frames.iter().map(|f| f.luminance()).collect();
    let alignments = pipeline.align(&luma, args.reference)?;
    let result = pipeline.merge(&frames, &alignments, args.reference)?;

    save_rgb(&result.output, &args.output)?;
    print_result_summary(&result);
    println!("Saved {}", args.output.display());

    Ok(())
}
