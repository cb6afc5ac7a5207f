use std::path::PathBuf;

use anyhow::Result;
use clap::Args;
use tsphot_core::io::ser::{ticks_to_julian_date, SerReader};

#[derive(Args)]
pub struct InfoArgs {
    /// Input SER file
    pub file: PathBuf,
}

pub fn run(args: &InfoArgs) -> Result<()> {
    let reader = SerReader::open(&args.file)?;
    let info = reader.source_info(&args.file);

    println!("File:        {}", info.filename.display());
    println!("Frames:      {}", info.total_frames);
    println!("Dimensions:  {}x{}", info.width, info.height);
    println!("Bit depth:   {}", info.bit_depth);
    println!("Color mode:  {}", info.color);

    if let Some(ref obs) = info.observer {
        println!("Observer:    {}", obs);
    }
    if let Some(ref tel) = info.telescope {
        println!("Telescope:   {}", tel);
    }
    if let Some(ref inst) = info.instrument {
        println!("Instrument:  {}", inst);
    }

    if let Some(start) = info.start_time {
        println!("Start:       JD {:.6}", start);
    }

    if info.has_timestamps && info.total_frames > 0 {
        let first = reader.timestamp(0).map(ticks_to_julian_date);
        let last = reader.timestamp(info.total_frames - 1).map(ticks_to_julian_date);
        if let (Some(first), Some(last)) = (first, last) {
            println!("Time span:   JD {:.6} .. {:.6}", first, last);
            println!("Duration:    {:.1} s", (last - first) * 86_400.0);
        }
    } else {
        println!("Timestamps:  none (frame index used as time)");
    }

    let frame_bytes = reader.header.frame_byte_size();
    let total_mb = (frame_bytes * info.total_frames) as f64 / (1024.0 * 1024.0);
    println!("Data size:   {:.1} MB", total_mb);

    Ok(())
}
