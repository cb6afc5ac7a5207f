mod commands;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "tsphot", about = "Time-series aperture photometry")]
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
    /// Show SER file metadata
    Info(commands::info::InfoArgs),
    /// Measure a simple aperture photometry light curve
    Sap(commands::sap::SapArgs),
    /// Print moments of one frame and save it as PNG
    Frame(commands::frame::FrameArgs),
    /// Print or save a default photometry config
    Config(commands::config::ConfigArgs),
    /// Run photometry from a TOML config
    Run(commands::run::RunArgs),
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
        Commands::Sap(args) => commands::sap::run(args),
        Commands::Frame(args) => commands::frame::run(args),
        Commands::Config(args) => commands::config::run(args),
        Commands::Run(args) => commands::run::run(args),
    }
}
