use std::path::{Path, PathBuf};

use serde::{Deserialize, Serialize};

use crate::aperture::PixelCoord;
use crate::consts::{DEFAULT_APERTURE_RADIUS, DEFAULT_RECENTER_ITERATIONS};
use crate::error::Result;
use crate::stack::TimeRange;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PhotometryConfig {
    pub input: PathBuf,
    pub output: PathBuf,
    #[serde(default)]
    pub aperture: ApertureConfig,
    /// Keep only epochs inside this window (Julian dates for SER timestamps).
    #[serde(default)]
    pub time_range: Option<TimeRange>,
    #[serde(default)]
    pub background: BackgroundMethod,
    #[serde(default)]
    pub recenter: RecenterConfig,
    /// Reference star positions from an external catalog lookup.
    #[serde(default)]
    pub reference_points: Vec<PixelCoord>,
    /// Optional PNG of the median frame with the aperture drawn.
    #[serde(default)]
    pub median_frame_png: Option<PathBuf>,
}

impl PhotometryConfig {
    pub fn new(input: PathBuf, output: PathBuf) -> Self {
        Self {
            input,
            output,
            aperture: ApertureConfig::default(),
            time_range: None,
            background: BackgroundMethod::default(),
            recenter: RecenterConfig::default(),
            reference_points: Vec::new(),
            median_frame_png: None,
        }
    }

    /// Read a TOML config file.
    pub fn load(path: &Path) -> Result<Self> {
        let contents = std::fs::read_to_string(path)?;
        Ok(toml::from_str(&contents)?)
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ApertureConfig {
    /// Aperture radius in pixels.
    pub radius: f64,
    #[serde(default)]
    pub center: CenterConfig,
}

impl Default for ApertureConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_APERTURE_RADIUS,
            center: CenterConfig::default(),
        }
    }
}

/// Where the aperture goes.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub enum CenterConfig {
    /// Brightest pixel of the median frame.
    #[default]
    Brightest,
    /// One position for every epoch.
    Fixed(PixelCoord),
    /// One position per epoch, after any time-range filtering.
    PerEpoch(Vec<PixelCoord>),
}

impl std::fmt::Display for CenterConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Brightest => write!(f, "Brightest pixel"),
            Self::Fixed(c) => write!(f, "Fixed ({:.2}, {:.2})", c.row, c.col),
            Self::PerEpoch(centers) => write!(f, "Per epoch ({} positions)", centers.len()),
        }
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum BackgroundMethod {
    #[default]
    None,
    /// Median of the pixels outside the aperture, per epoch.
    Median,
}

impl std::fmt::Display for BackgroundMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::None => write!(f, "None"),
            Self::Median => write!(f, "Median"),
        }
    }
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct RecenterConfig {
    pub enabled: bool,
    pub iterations: usize,
}

impl Default for RecenterConfig {
    fn default() -> Self {
        Self {
            enabled: false,
            iterations: DEFAULT_RECENTER_ITERATIONS,
        }
    }
}
