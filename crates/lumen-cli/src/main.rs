mod commands;
mod io;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "lumen", about = "Burst photography processing tool")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Show burst frame metadata and statistics
    Info(commands::info::InfoArgs),
    /// Align and merge a burst at input resolution
    Merge(commands::merge::MergeArgs),
    /// Multi-frame super-resolution (2x-4x)
    Upscale(commands::upscale::UpscaleArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Info(args) => commands::info::run(args),
        Commands::Merge(args) => commands::merge::run(args),
        Commands::Upscale(args) => commands::upscale::run(args),
    }
}
