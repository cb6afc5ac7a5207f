//! Epoch-ordered image cube with per-epoch apertures.

mod calibration;
mod epoch;
pub mod median;

use std::sync::Arc;

use ndarray::{Array2, Array3, ArrayView2, ArrayView3, ArrayViewMut2, Axis, CowArray, Ix3, Zip};
use rayon::prelude::*;
use tracing::{debug, info, warn};

use crate::aperture::{fill_weights, validate_radius, ApertureCenter, PixelCoord};
use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{PhotometryError, Result};
use crate::frame::Frame;

pub use calibration::{FluxCalibration, MedianBackground};
pub use epoch::{EpochRecord, TimeRange};

/// Aperture weights for every epoch, populated by [`ImageStack::set_apertures`].
#[derive(Clone, Debug)]
struct ApertureSet {
    radius: f64,
    weights: Array3<f64>,
}

/// A time series of images (epoch x row x column) and its time table.
#[derive(Clone, Debug)]
pub struct ImageStack {
    flux: Array3<f64>,
    epochs: Vec<EpochRecord>,
    apertures: Option<ApertureSet>,
    calibration: Option<Arc<dyn FluxCalibration>>,
}

impl ImageStack {
    /// Wrap a flux cube with one time and cadence number per epoch.
    pub fn new(flux: Array3<f64>, times: Vec<f64>, cadences: Vec<i64>) -> Result<Self> {
        let (n, rows, cols) = flux.dim();
        if n == 0 {
            return Err(PhotometryError::EmptySequence);
        }
        if rows == 0 || cols == 0 {
            return Err(PhotometryError::InvalidParameter(format!(
                "frame shape must be non-empty, got {rows}x{cols}"
            )));
        }
        if times.len() != n || cadences.len() != n {
            return Err(PhotometryError::InvalidParameter(format!(
                "flux cube has {} epochs but {} times and {} cadences",
                n,
                times.len(),
                cadences.len()
            )));
        }

        let epochs = times
            .into_iter()
            .zip(cadences)
            .map(|(time, cadence)| EpochRecord {
                time,
                cadence,
                center: None,
            })
            .collect();

        Ok(Self {
            flux,
            epochs,
            apertures: None,
            calibration: None,
        })
    }

    /// Attach a flux calibration applied by [`Self::flux`] and everything built on it.
    pub fn with_calibration(mut self, calibration: impl FluxCalibration + 'static) -> Self {
        self.calibration = Some(Arc::new(calibration));
        self
    }

    pub fn set_calibration(&mut self, calibration: Option<Arc<dyn FluxCalibration>>) {
        self.calibration = calibration;
    }

    pub fn epoch_count(&self) -> usize {
        self.epochs.len()
    }

    /// `(rows, cols)` of each frame.
    pub fn frame_shape(&self) -> (usize, usize) {
        let (_, rows, cols) = self.flux.dim();
        (rows, cols)
    }

    pub fn epochs(&self) -> &[EpochRecord] {
        &self.epochs
    }

    pub fn times(&self) -> Vec<f64> {
        self.epochs.iter().map(|e| e.time).collect()
    }

    /// Aperture radius, once apertures are set.
    pub fn radius(&self) -> Option<f64> {
        self.apertures.as_ref().map(|a| a.radius)
    }

    /// Aperture weight cube, once apertures are set.
    pub fn weights(&self) -> Option<ArrayView3<'_, f64>> {
        self.apertures.as_ref().map(|a| a.weights.view())
    }

    /// Aperture weights of one epoch, once apertures are set.
    pub fn epoch_weights(&self, index: usize) -> Option<ArrayView2<'_, f64>> {
        self.apertures
            .as_ref()
            .filter(|_| index < self.epoch_count())
            .map(|a| a.weights.index_axis(Axis(0), index))
    }

    /// The uncalibrated flux cube.
    pub fn raw_flux(&self) -> ArrayView3<'_, f64> {
        self.flux.view()
    }

    /// Compute aperture weights for every epoch and record the centers.
    ///
    /// A [`ApertureCenter::Fixed`] center is broadcast to all epochs; a
    /// [`ApertureCenter::PerEpoch`] sequence must match the epoch count.
    pub fn set_apertures(&mut self, center: impl Into<ApertureCenter>, radius: f64) -> Result<()> {
        validate_radius(radius)?;
        let n = self.epoch_count();
        let centers = center.into().resolve(n)?;

        let mut weights = Array3::<f64>::zeros(self.flux.raw_dim());
        if n >= PARALLEL_FRAME_THRESHOLD {
            weights
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .zip(centers.par_iter())
                .for_each(|(slice, &c)| fill_weights(slice, c, radius));
        } else {
            for (slice, &c) in weights.axis_iter_mut(Axis(0)).zip(centers.iter()) {
                fill_weights(slice, c, radius);
            }
        }

        for (epoch, center) in self.epochs.iter_mut().zip(centers) {
            epoch.center = Some(center);
        }
        self.apertures = Some(ApertureSet { radius, weights });
        debug!(epochs = n, radius, "Aperture weights computed");
        Ok(())
    }

    /// The flux cube photometry is measured on.
    ///
    /// Without a calibration this is a borrowed view of the raw cube; with
    /// one it is a corrected copy. The shape always matches the raw cube.
    pub fn flux(&self) -> CowArray<'_, f64, Ix3> {
        let Some(calibration) = &self.calibration else {
            return CowArray::from(self.flux.view());
        };

        let mut corrected = self.flux.clone();
        let weights = self.weights();
        let apply = |(i, image): (usize, ArrayViewMut2<'_, f64>)| {
            let w = weights.as_ref().map(|w| w.index_axis(Axis(0), i));
            calibration.calibrate(image, w);
        };
        if self.epoch_count() >= PARALLEL_FRAME_THRESHOLD {
            corrected
                .axis_iter_mut(Axis(0))
                .into_par_iter()
                .enumerate()
                .for_each(apply);
        } else {
            corrected.axis_iter_mut(Axis(0)).enumerate().for_each(apply);
        }
        CowArray::from(corrected)
    }

    /// Per-epoch background removed by the calibration, NaN where it could
    /// not be estimated. `None` without a calibration.
    pub fn background(&self) -> Option<Vec<f64>> {
        let calibration = self.calibration.as_ref()?;
        let weights = self.weights();
        let levels = self
            .flux
            .axis_iter(Axis(0))
            .enumerate()
            .map(|(i, image)| {
                let w = weights.as_ref().map(|w| w.index_axis(Axis(0), i));
                calibration.background(image, w).unwrap_or(f64::NAN)
            })
            .collect();
        Some(levels)
    }

    /// Simple aperture photometry: the weighted sum of finite pixels per epoch.
    pub fn sap_flux(&self) -> Result<Vec<f64>> {
        let apertures = self.require_apertures("sap_flux")?;
        let flux = self.flux();

        let epoch_sum = |i: usize| -> f64 {
            Zip::from(flux.index_axis(Axis(0), i))
                .and(apertures.weights.index_axis(Axis(0), i))
                .fold(0.0, |acc, &v, &w| if v.is_finite() { acc + v * w } else { acc })
        };

        let n = self.epoch_count();
        let sums = if n >= PARALLEL_FRAME_THRESHOLD {
            (0..n).into_par_iter().map(epoch_sum).collect()
        } else {
            (0..n).map(epoch_sum).collect()
        };
        Ok(sums)
    }

    /// Materialize the frame for epoch `index`.
    ///
    /// Negative or too-large indices fail with
    /// [`PhotometryError::IndexOutOfBounds`].
    pub fn frame(&self, index: isize) -> Result<Frame<'_>> {
        let total = self.epoch_count();
        let i = usize::try_from(index)
            .ok()
            .filter(|&i| i < total)
            .ok_or(PhotometryError::IndexOutOfBounds { index, total })?;

        let apertures = self.require_apertures("frame")?;
        let centers = self.aperture_centers()?;
        Ok(self.frame_at(i, centers[i], apertures))
    }

    /// Lazily materialize every frame in epoch order.
    ///
    /// The iterator is `Clone`, and each call yields fresh frames.
    pub fn frames(&self) -> Result<impl Iterator<Item = Frame<'_>> + Clone + '_> {
        let apertures = self.require_apertures("frames")?;
        let centers = self.aperture_centers()?;
        Ok((0..self.epoch_count()).map(move |i| self.frame_at(i, centers[i], apertures)))
    }

    /// Median over epochs, as a frame centered on the median aperture position.
    pub fn median_frame<'f>(&self) -> Result<Frame<'f>> {
        let apertures = self.require_apertures("median_frame")?;
        let centers = self.aperture_centers()?;

        let flux = self.flux();
        let image = median::nan_median_cube(flux.view());

        let mut rows: Vec<f64> = centers.iter().map(|c| c.row).collect();
        let mut cols: Vec<f64> = centers.iter().map(|c| c.col).collect();
        let center = PixelCoord::new(
            median::median_of_finite(&mut rows).unwrap_or_default(),
            median::median_of_finite(&mut cols).unwrap_or_default(),
        );

        let mut weights = Array2::<f64>::zeros(image.raw_dim());
        fill_weights(weights.view_mut(), center, apertures.radius);
        Frame::new(image, weights, center, apertures.radius)
    }

    /// Keep only the epochs whose time falls inside `range`.
    pub fn restrict_time_range(self, range: TimeRange) -> Result<Self> {
        let keep: Vec<usize> = self
            .epochs
            .iter()
            .enumerate()
            .filter(|(_, e)| range.contains(e.time))
            .map(|(i, _)| i)
            .collect();
        if keep.is_empty() {
            return Err(PhotometryError::EmptySequence);
        }
        info!(
            kept = keep.len(),
            total = self.epoch_count(),
            start = range.start,
            end = range.end,
            "Restricted stack to time range"
        );

        let flux = self.flux.select(Axis(0), &keep);
        let epochs = keep.iter().map(|&i| self.epochs[i]).collect();
        let apertures = self.apertures.map(|a| ApertureSet {
            radius: a.radius,
            weights: a.weights.select(Axis(0), &keep),
        });
        Ok(Self {
            flux,
            epochs,
            apertures,
            calibration: self.calibration,
        })
    }

    /// Move each epoch's aperture onto its measured centroid, `iterations` times.
    ///
    /// Epochs whose moments are degenerate keep their current center.
    pub fn recenter(&mut self, iterations: usize) -> Result<()> {
        for pass in 0..iterations {
            let radius = self.require_apertures("recenter")?.radius;
            let previous = self.aperture_centers()?;

            let moved: Vec<Option<PixelCoord>> = {
                let frames: Vec<Frame<'_>> = self.frames()?.collect();
                frames
                    .par_iter()
                    .map(|frame| {
                        frame
                            .moments()
                            .ok()
                            .map(|m| m.centroid())
                            .filter(PixelCoord::is_finite)
                    })
                    .collect()
            };

            let stuck = moved.iter().filter(|c| c.is_none()).count();
            if stuck > 0 {
                warn!(pass, epochs = stuck, "Degenerate moments, keeping previous centers");
            }

            let centers: Vec<PixelCoord> = moved
                .into_iter()
                .zip(previous)
                .map(|(new, old)| new.unwrap_or(old))
                .collect();
            self.set_apertures(ApertureCenter::PerEpoch(centers), radius)?;
            debug!(pass, "Recentered apertures");
        }
        Ok(())
    }

    fn frame_at<'a>(
        &'a self,
        i: usize,
        center: PixelCoord,
        apertures: &'a ApertureSet,
    ) -> Frame<'a> {
        let weights = apertures.weights.index_axis(Axis(0), i);
        let raw = self.flux.index_axis(Axis(0), i);
        let image = match &self.calibration {
            None => CowArray::from(raw),
            Some(calibration) => {
                let mut image = raw.to_owned();
                calibration.calibrate(image.view_mut(), Some(weights));
                CowArray::from(image)
            }
        };
        Frame::from_parts(image, CowArray::from(weights), center, apertures.radius)
    }

    fn require_apertures(&self, operation: &str) -> Result<&ApertureSet> {
        self.apertures.as_ref().ok_or_else(|| {
            PhotometryError::PreconditionViolation(format!(
                "{operation} called before set_apertures"
            ))
        })
    }

    fn aperture_centers(&self) -> Result<Vec<PixelCoord>> {
        self.epochs
            .iter()
            .map(|e| {
                e.center.ok_or_else(|| {
                    PhotometryError::PreconditionViolation("aperture center not recorded".into())
                })
            })
            .collect()
    }
}
