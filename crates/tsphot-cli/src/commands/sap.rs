use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tsphot_core::photometry::config::{BackgroundMethod, PhotometryConfig, RecenterConfig};

use super::run::run_config;
use super::ApertureArgs;

#[derive(Args)]
pub struct SapArgs {
    /// Input SER file
    pub file: PathBuf,

    #[command(flatten)]
    pub aperture: ApertureArgs,

    /// Subtract the per-frame median sky outside the aperture
    #[arg(long)]
    pub subtract_background: bool,

    /// Number of centroid recentering passes (0 disables)
    #[arg(long, default_value = "0")]
    pub recenter: usize,

    /// Also save the median frame as PNG
    #[arg(long)]
    pub median_png: Option<PathBuf>,

    /// Output CSV path
    #[arg(short, long, default_value = "lightcurve.csv")]
    pub output: PathBuf,
}

pub fn run(args: &SapArgs) -> Result<()> {
    let mut config = PhotometryConfig::new(args.file.clone(), args.output.clone());
    config.aperture.radius = args.aperture.radius;
    config.aperture.center = args.aperture.center();
    config.time_range = args.aperture.time_range();
    config.median_frame_png = args.median_png.clone();
    config.background = if args.subtract_background {
        BackgroundMethod::Median
    } else {
        BackgroundMethod::None
    };
    config.recenter = RecenterConfig {
        enabled: args.recenter > 0,
        iterations: args.recenter,
    };

    run_config(&config)
}
