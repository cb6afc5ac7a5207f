use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use crate::error::Result;
use crate::frame::{Frame, Moments};
use crate::stack::ImageStack;

use super::types::ProgressReporter;

/// One epoch of the photometric time series.
///
/// Moment columns are NaN when the epoch's aperture held no valid flux.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightCurveRow {
    pub time: f64,
    pub cadence: i64,
    pub center_row: f64,
    pub center_col: f64,
    pub sap_flux: f64,
    pub background: f64,
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub mu20: f64,
    pub mu02: f64,
    pub mu11: f64,
}

#[derive(Clone, Debug, Default)]
pub struct LightCurve {
    pub radius: f64,
    pub rows: Vec<LightCurveRow>,
}

impl LightCurve {
    /// Measure SAP flux, background and moments for every epoch of `stack`.
    pub fn measure(stack: &ImageStack, reporter: &dyn ProgressReporter) -> Result<Self> {
        let sap = stack.sap_flux()?;
        let background = stack.background();
        let frames: Vec<Frame<'_>> = stack.frames()?.collect();

        let done = AtomicUsize::new(0);
        let moments: Vec<Option<Moments>> = frames
            .par_iter()
            .map(|frame| {
                let m = frame.moments().ok();
                reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
                m
            })
            .collect();

        let degenerate = moments.iter().filter(|m| m.is_none()).count();
        if degenerate > 0 {
            warn!(epochs = degenerate, "Degenerate apertures, moments set to NaN");
        }

        let rows = stack
            .epochs()
            .iter()
            .zip(&frames)
            .zip(moments)
            .enumerate()
            .map(|(i, ((epoch, frame), m))| {
                let m = m.unwrap_or(Moments {
                    m00: f64::NAN,
                    m10: f64::NAN,
                    m01: f64::NAN,
                    mu20: f64::NAN,
                    mu02: f64::NAN,
                    mu11: f64::NAN,
                });
                LightCurveRow {
                    time: epoch.time,
                    cadence: epoch.cadence,
                    center_row: frame.center().row,
                    center_col: frame.center().col,
                    sap_flux: sap[i],
                    background: background.as_ref().map_or(f64::NAN, |b| b[i]),
                    m00: m.m00,
                    m10: m.m10,
                    m01: m.m01,
                    mu20: m.mu20,
                    mu02: m.mu02,
                    mu11: m.mu11,
                }
            })
            .collect();

        let radius = stack.radius().unwrap_or(f64::NAN);
        info!(epochs = stack.epoch_count(), radius, "Light curve measured");
        Ok(Self { radius, rows })
    }

    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn sap_flux(&self) -> Vec<f64> {
        self.rows.iter().map(|r| r.sap_flux).collect()
    }

    /// Median SAP flux over epochs with finite flux.
    pub fn median_flux(&self) -> Option<f64> {
        crate::stack::median::median_of_finite(&mut self.sap_flux())
    }
}
