use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use console::Style;

use lumen_core::sanitize::ImageStats;

use crate::io::load_burst;

#[derive(Args)]
pub struct InfoArgs {
    /// Input frames or a directory of frames
    pub inputs: Vec<PathBuf>,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let frames = load_burst(&args.inputs)?;

    let label = Style::new().dim();
    let value = Style::new().bold().white();
    let bad = Style::new().yellow();

    println!();
    println!(
        "  {:<14}{}",
        label.apply_to("Frames"),
        value.apply_to(frames.len())
    );
    println!(
        "  {:<14}{}",
        label.apply_to("Dimensions"),
        value.apply_to(format!("{}x{}", frames[0].width(), frames[0].height()))
    );

    for (i, frame) in frames.iter().enumerate() {
        let stats = ImageStats::scan(frame);
        let health = if stats.healthy() {
            value.apply_to("healthy".to_string())
        } else {
            bad.apply_to(format!(
                "{} NaN, {} Inf",
                stats.nan_count, stats.inf_count
            ))
        };
        println!(
            "  {:<14}mean [{:.3} {:.3} {:.3}]  {}",
            label.apply_to(format!("Frame {i}")),
            stats.mean[0],
            stats.mean[1],
            stats.mean[2],
            health
        );
    }
    println!();

    Ok(())
}
