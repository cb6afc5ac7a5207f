use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use tsphot_core::aperture::{ApertureCenter, PixelCoord};
use tsphot_core::frame::{Frame, Scale};
use tsphot_core::io::image_io::save_frame_png;
use tsphot_core::io::ser::load_stack;
use tsphot_core::photometry::brightest_pixel;
use tsphot_core::photometry::config::CenterConfig;

use super::ApertureArgs;

#[derive(Clone, ValueEnum)]
pub enum ScaleArg {
    Linear,
    Log,
}

#[derive(Args)]
pub struct FrameArgs {
    /// Input SER file
    pub file: PathBuf,

    #[command(flatten)]
    pub aperture: ApertureArgs,

    /// Epoch index (negative values are rejected)
    #[arg(long, default_value = "0", allow_negative_numbers = true)]
    pub index: isize,

    /// Use the per-pixel median over all epochs instead of one epoch
    #[arg(long)]
    pub median: bool,

    /// Display stretch
    #[arg(long, value_enum, default_value = "log")]
    pub scale: ScaleArg,

    /// Reference star position as ROW,COL (repeatable)
    #[arg(long = "reference", value_parser = parse_coord)]
    pub references: Vec<PixelCoord>,

    /// Output PNG path
    #[arg(short, long, default_value = "frame.png")]
    pub output: PathBuf,
}

fn parse_coord(s: &str) -> std::result::Result<PixelCoord, String> {
    let (row, col) = s
        .split_once(',')
        .ok_or_else(|| format!("expected ROW,COL, got '{s}'"))?;
    let row = row.trim().parse::<f64>().map_err(|e| e.to_string())?;
    let col = col.trim().parse::<f64>().map_err(|e| e.to_string())?;
    Ok(PixelCoord::new(row, col))
}

pub fn run(args: &FrameArgs) -> Result<()> {
    let mut stack = load_stack(&args.file, args.aperture.time_range())?;

    let center = match args.aperture.center() {
        CenterConfig::Fixed(c) => c,
        _ => brightest_pixel(&stack)?,
    };
    stack.set_apertures(ApertureCenter::Fixed(center), args.aperture.radius)?;

    let frame: Frame<'_> = if args.median {
        stack.median_frame()?
    } else {
        stack
            .frame(args.index)
            .with_context(|| format!("Cannot select epoch {}", args.index))?
    };
    let frame = frame.with_reference_points(args.references.clone());

    let (rows, cols) = frame.shape();
    println!("Frame:       {}x{}", rows, cols);
    println!(
        "Aperture:    ({:.3}, {:.3}) r={:.2}",
        frame.center().row,
        frame.center().col,
        frame.radius()
    );
    match frame.moments() {
        Ok(m) => {
            println!("Flux (m00):  {:.3}", m.m00);
            println!("Centroid:    ({:.4}, {:.4})", m.m10, m.m01);
            println!("mu20:        {:.4}", m.mu20);
            println!("mu02:        {:.4}", m.mu02);
            println!("mu11:        {:.4}", m.mu11);
        }
        Err(e) => println!("Moments:     {}", e),
    }

    let scale = match args.scale {
        ScaleArg::Linear => Scale::Linear,
        ScaleArg::Log => Scale::Log,
    };
    save_frame_png(&frame, scale, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Saved to {}", args.output.display());
    Ok(())
}
