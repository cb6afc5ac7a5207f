use serde::{Deserialize, Serialize};

use crate::aperture::PixelCoord;

/// One row of the stack's time table.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct EpochRecord {
    pub time: f64,
    pub cadence: i64,
    /// Aperture center for this epoch, recorded by `set_apertures`.
    pub center: Option<PixelCoord>,
}

/// Inclusive time window used to select epochs.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct TimeRange {
    pub start: f64,
    pub end: f64,
}

impl TimeRange {
    pub fn new(start: f64, end: f64) -> Self {
        Self { start, end }
    }

    pub fn contains(&self, time: f64) -> bool {
        time >= self.start && time <= self.end
    }
}

impl Default for TimeRange {
    fn default() -> Self {
        Self {
            start: f64::NEG_INFINITY,
            end: f64::INFINITY,
        }
    }
}
