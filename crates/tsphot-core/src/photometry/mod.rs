//! End-to-end photometry run: load, place apertures, measure, write.

pub mod config;
mod light_curve;
mod types;

use std::sync::Arc;

use tracing::info;

use crate::aperture::{ApertureCenter, PixelCoord};
use crate::error::{PhotometryError, Result};
use crate::frame::Scale;
use crate::io::csv_writer::write_light_curve;
use crate::io::image_io::save_frame_png;
use crate::io::ser::load_stack;
use crate::stack::median::nan_median_cube;
use crate::stack::{FluxCalibration, ImageStack, MedianBackground};

use config::{BackgroundMethod, CenterConfig, PhotometryConfig};

pub use light_curve::{LightCurve, LightCurveRow};
pub use types::{NoOpReporter, PipelineStage, ProgressReporter};

/// Run photometry on the configured input and write the light curve CSV.
pub fn run_photometry(
    config: &PhotometryConfig,
    reporter: &dyn ProgressReporter,
) -> Result<LightCurve> {
    reporter.begin_stage(PipelineStage::Reading, None);
    let mut stack = load_stack(&config.input, config.time_range)?;
    reporter.finish_stage();

    let curve = measure_stack(&mut stack, config, reporter)?;

    reporter.begin_stage(PipelineStage::Writing, None);
    write_light_curve(&curve, &config.output)?;
    if let Some(ref png) = config.median_frame_png {
        let frame = stack
            .median_frame()?
            .with_reference_points(config.reference_points.clone());
        save_frame_png(&frame, Scale::Log, png)?;
        info!(path = %png.display(), "Median frame saved");
    }
    reporter.finish_stage();
    info!(output = %config.output.display(), "Light curve saved");

    Ok(curve)
}

/// Apply the configured background, apertures and recentering to `stack`,
/// then measure its light curve. Performs no file I/O.
pub fn measure_stack(
    stack: &mut ImageStack,
    config: &PhotometryConfig,
    reporter: &dyn ProgressReporter,
) -> Result<LightCurve> {
    match config.background {
        BackgroundMethod::None => stack.set_calibration(None),
        BackgroundMethod::Median => {
            let calibration: Arc<dyn FluxCalibration> = Arc::new(MedianBackground);
            stack.set_calibration(Some(calibration));
        }
    }

    reporter.begin_stage(PipelineStage::Apertures, None);
    let center = resolve_center(stack, &config.aperture.center)?;
    info!(center = %config.aperture.center, radius = config.aperture.radius, "Placing apertures");
    stack.set_apertures(center, config.aperture.radius)?;
    reporter.finish_stage();

    if config.recenter.enabled {
        let passes = config.recenter.iterations;
        reporter.begin_stage(PipelineStage::Recentering, Some(passes));
        for pass in 0..passes {
            stack.recenter(1)?;
            reporter.advance(pass + 1);
        }
        reporter.finish_stage();
    }

    reporter.begin_stage(PipelineStage::Photometry, Some(stack.epoch_count()));
    let curve = LightCurve::measure(stack, reporter)?;
    reporter.finish_stage();
    Ok(curve)
}

fn resolve_center(stack: &ImageStack, center: &CenterConfig) -> Result<ApertureCenter> {
    match center {
        CenterConfig::Fixed(c) => Ok(ApertureCenter::Fixed(*c)),
        CenterConfig::PerEpoch(centers) => Ok(ApertureCenter::PerEpoch(centers.clone())),
        CenterConfig::Brightest => brightest_pixel(stack).map(ApertureCenter::Fixed),
    }
}

/// Position of the brightest finite pixel of the median frame.
pub fn brightest_pixel(stack: &ImageStack) -> Result<PixelCoord> {
    let median = nan_median_cube(stack.flux().view());
    median
        .indexed_iter()
        .filter(|(_, v)| v.is_finite())
        .fold(None, |best: Option<((usize, usize), f64)>, (idx, &v)| match best {
            Some((_, b)) if b >= v => best,
            _ => Some((idx, v)),
        })
        .map(|((row, col), _)| PixelCoord::new(row as f64, col as f64))
        .ok_or_else(|| PhotometryError::InvalidParameter("stack has no finite pixels".into()))
}
