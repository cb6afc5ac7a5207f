pub mod config;
pub mod frame;
pub mod info;
pub mod run;
pub mod sap;

use clap::Args;
use tsphot_core::aperture::PixelCoord;
use tsphot_core::photometry::config::CenterConfig;
use tsphot_core::stack::TimeRange;

/// Aperture and epoch-selection options shared by several commands.
#[derive(Args, Clone)]
pub struct ApertureArgs {
    /// Aperture radius in pixels
    #[arg(short, long, default_value = "3.0")]
    pub radius: f64,

    /// Aperture center row (defaults to the brightest median pixel)
    #[arg(long, requires = "col")]
    pub row: Option<f64>,

    /// Aperture center column
    #[arg(long, requires = "row")]
    pub col: Option<f64>,

    /// Earliest epoch time to keep
    #[arg(long)]
    pub t_start: Option<f64>,

    /// Latest epoch time to keep
    #[arg(long)]
    pub t_end: Option<f64>,
}

impl ApertureArgs {
    pub fn center(&self) -> CenterConfig {
        match (self.row, self.col) {
            (Some(row), Some(col)) => CenterConfig::Fixed(PixelCoord::new(row, col)),
            _ => CenterConfig::Brightest,
        }
    }

    pub fn time_range(&self) -> Option<TimeRange> {
        if self.t_start.is_none() && self.t_end.is_none() {
            return None;
        }
        let default = TimeRange::default();
        Some(TimeRange::new(
            self.t_start.unwrap_or(default.start),
            self.t_end.unwrap_or(default.end),
        ))
    }
}
