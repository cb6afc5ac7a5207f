use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use indicatif::{ProgressBar, ProgressStyle};
use tracing::debug;
use tsphot_core::photometry::config::PhotometryConfig;
use tsphot_core::photometry::{run_photometry, PipelineStage, ProgressReporter};

use crate::summary::{print_light_curve_summary, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Photometry config file (TOML)
    pub config: PathBuf,

    /// Override the input SER file
    #[arg(long)]
    pub input: Option<PathBuf>,

    /// Override the output CSV path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

/// Drives an indicatif bar from photometry stage events.
pub struct BarReporter {
    bar: ProgressBar,
}

impl BarReporter {
    pub fn new() -> Result<Self> {
        let bar = ProgressBar::new(1);
        bar.set_style(
            ProgressStyle::default_bar()
                .template("{msg:20} [{bar:40}] {pos}/{len}")?
                .progress_chars("=> "),
        );
        Ok(Self { bar })
    }

    pub fn finish(&self) {
        self.bar.finish_with_message("Done");
    }
}

impl ProgressReporter for BarReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        self.bar.set_message(stage.to_string());
        self.bar.set_length(total_items.unwrap_or(1) as u64);
        self.bar.set_position(0);
    }

    fn advance(&self, items_done: usize) {
        self.bar.set_position(items_done as u64);
    }

    fn finish_stage(&self) {
        if let Some(len) = self.bar.length() {
            self.bar.set_position(len);
        }
    }
}

pub fn run(args: &RunArgs) -> Result<()> {
    let contents = std::fs::read_to_string(&args.config)
        .with_context(|| format!("Failed to read config {}", args.config.display()))?;
    let mut config: PhotometryConfig =
        toml::from_str(&contents).context("Invalid photometry config")?;
    if let Some(ref input) = args.input {
        config.input = input.clone();
    }
    if let Some(ref output) = args.output {
        config.output = output.clone();
    }

    run_config(&config)
}

/// Run photometry for `config` with a progress bar and summaries.
pub fn run_config(config: &PhotometryConfig) -> Result<()> {
    debug!(?config, "Resolved photometry config");
    print_run_summary(config);

    let reporter = BarReporter::new()?;
    let curve = run_photometry(config, &reporter)
        .with_context(|| format!("Photometry failed for {}", config.input.display()))?;
    reporter.finish();

    println!();
    print_light_curve_summary(&curve);
    println!("Light curve saved to {}", config.output.display());
    Ok(())
}
