mod common;

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Mutex;

use approx::assert_abs_diff_eq;
use ndarray::{Array2, Array3};

use tsphot_core::aperture::PixelCoord;
use tsphot_core::io::csv_writer::{read_light_curve, write_light_curve};
use tsphot_core::io::ser::load_stack;
use tsphot_core::photometry::config::{BackgroundMethod, CenterConfig, PhotometryConfig};
use tsphot_core::photometry::{
    brightest_pixel, measure_stack, run_photometry, LightCurve, NoOpReporter, PipelineStage,
    ProgressReporter,
};
use tsphot_core::stack::{ImageStack, TimeRange};

use common::{build_ser_u16, constant_stack, gaussian_star, write_test_ser};

#[derive(Default)]
struct RecordingReporter {
    stages: Mutex<Vec<(PipelineStage, Option<usize>)>>,
    advances: Mutex<Vec<(PipelineStage, usize)>>,
    max_done: AtomicUsize,
}

impl RecordingReporter {
    fn stage_names(&self) -> Vec<PipelineStage> {
        self.stages.lock().unwrap().iter().map(|(s, _)| *s).collect()
    }

    fn advances_in(&self, stage: PipelineStage) -> Vec<usize> {
        let mut done: Vec<usize> = self
            .advances
            .lock()
            .unwrap()
            .iter()
            .filter(|(s, _)| *s == stage)
            .map(|(_, n)| *n)
            .collect();
        done.sort_unstable();
        done
    }
}

impl ProgressReporter for RecordingReporter {
    fn begin_stage(&self, stage: PipelineStage, total_items: Option<usize>) {
        self.stages.lock().unwrap().push((stage, total_items));
    }

    fn advance(&self, items_done: usize) {
        self.max_done.fetch_max(items_done, Ordering::Relaxed);
        let current = self.stages.lock().unwrap().last().map(|(s, _)| *s);
        if let Some(stage) = current {
            self.advances.lock().unwrap().push((stage, items_done));
        }
    }
}

/// Frames of a star on a 100 ADU sky whose brightness dips at epoch 2.
fn star_frames(n: usize) -> Vec<Array2<u16>> {
    (0..n)
        .map(|i| {
            let amplitude = if i == 2 { 1000.0 } else { 2000.0 };
            gaussian_star((20, 24), (9.0, 13.0), 1.3, amplitude, 100.0).mapv(|v| v.round() as u16)
        })
        .collect()
}

fn config_for(input: &std::path::Path, dir: &tempfile::TempDir) -> PhotometryConfig {
    PhotometryConfig::new(input.to_path_buf(), dir.path().join("curve.csv"))
}

#[test]
fn test_default_config() {
    let config = PhotometryConfig::new("in.ser".into(), "out.csv".into());
    assert_eq!(config.aperture.radius, 3.0);
    assert_eq!(config.aperture.center, CenterConfig::Brightest);
    assert_eq!(config.background, BackgroundMethod::None);
    assert!(!config.recenter.enabled);
    assert_eq!(config.recenter.iterations, 2);
    assert!(config.time_range.is_none());
    assert!(config.reference_points.is_empty());
    assert!(config.median_frame_png.is_none());
}

#[test]
fn test_config_toml_round_trip() {
    let mut config = PhotometryConfig::new("in.ser".into(), "out.csv".into());
    config.aperture.radius = 4.5;
    config.background = BackgroundMethod::Median;
    config.time_range = Some(TimeRange::new(1.0, 2.0));
    let text = toml::to_string(&config).unwrap();
    let parsed: PhotometryConfig = toml::from_str(&text).unwrap();
    assert_eq!(parsed.aperture.radius, 4.5);
    assert_eq!(parsed.background, BackgroundMethod::Median);
    assert_eq!(parsed.time_range, Some(TimeRange::new(1.0, 2.0)));
    assert_eq!(parsed.input, config.input);
}

#[test]
fn test_config_load_minimal_file() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("phot.toml");
    std::fs::write(
        &path,
        r#"
input = "night.ser"
output = "night.csv"

[aperture]
radius = 2.5
center = { Fixed = { row = 12.0, col = 11.5 } }

[recenter]
enabled = true
iterations = 3
"#,
    )
    .unwrap();

    let config = PhotometryConfig::load(&path).unwrap();
    assert_eq!(config.input.to_str(), Some("night.ser"));
    assert_eq!(config.aperture.radius, 2.5);
    assert_eq!(
        config.aperture.center,
        CenterConfig::Fixed(PixelCoord::new(12.0, 11.5))
    );
    assert!(config.recenter.enabled);
    assert_eq!(config.recenter.iterations, 3);
    assert_eq!(config.background, BackgroundMethod::None);
}

#[test]
fn test_config_load_rejects_bad_toml() {
    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("bad.toml");
    std::fs::write(&path, "input = 3").unwrap();
    assert!(PhotometryConfig::load(&path).is_err());
}

#[test]
fn test_display_impls() {
    assert_eq!(CenterConfig::Brightest.to_string(), "Brightest pixel");
    assert_eq!(
        CenterConfig::Fixed(PixelCoord::new(1.0, 2.5)).to_string(),
        "Fixed (1.00, 2.50)"
    );
    assert_eq!(BackgroundMethod::Median.to_string(), "Median");
    assert_eq!(PipelineStage::Photometry.to_string(), "Measuring flux");
}

#[test]
fn test_brightest_pixel() {
    let image = gaussian_star((16, 16), (4.0, 11.0), 1.0, 50.0, 1.0);
    let stack = constant_stack(&image, 3);
    assert_eq!(brightest_pixel(&stack).unwrap(), PixelCoord::new(4.0, 11.0));
}

#[test]
fn test_brightest_pixel_all_nan() {
    let image = Array2::<f64>::from_elem((4, 4), f64::NAN);
    let stack = constant_stack(&image, 2);
    assert!(brightest_pixel(&stack).is_err());
}

#[test]
fn test_measure_stack_rows() {
    let image = gaussian_star((20, 20), (10.0, 9.0), 1.3, 500.0, 0.0);
    let mut stack = constant_stack(&image, 4);
    let mut config = PhotometryConfig::new("unused".into(), "unused".into());
    config.aperture.radius = 5.0;

    let reporter = RecordingReporter::default();
    let curve = measure_stack(&mut stack, &config, &reporter).unwrap();

    assert_eq!(curve.len(), 4);
    assert_eq!(curve.radius, 5.0);
    let sap = stack.sap_flux().unwrap();
    for (i, row) in curve.rows.iter().enumerate() {
        assert_eq!(row.time, i as f64);
        assert_eq!(row.cadence, 100 + i as i64);
        assert_eq!((row.center_row, row.center_col), (10.0, 9.0));
        assert_eq!(row.sap_flux, sap[i]);
        assert_abs_diff_eq!(row.m00, row.sap_flux, epsilon = 1e-9);
        assert_abs_diff_eq!(row.m10, 10.0, epsilon = 1e-6);
        assert_abs_diff_eq!(row.m01, 9.0, epsilon = 1e-6);
        assert!(row.background.is_nan());
    }

    let stages = reporter.stage_names();
    assert_eq!(stages, vec![PipelineStage::Apertures, PipelineStage::Photometry]);
    assert_eq!(reporter.max_done.load(Ordering::Relaxed), 4);
}

#[test]
fn test_measure_stack_degenerate_epoch() {
    let star = gaussian_star((12, 12), (6.0, 6.0), 1.0, 100.0, 0.0);
    let mut flux = Array3::<f64>::zeros((3, 12, 12));
    flux.index_axis_mut(ndarray::Axis(0), 0).assign(&star);
    flux.index_axis_mut(ndarray::Axis(0), 2).assign(&star);
    let mut stack = ImageStack::new(flux, vec![0.0, 1.0, 2.0], vec![0, 1, 2]).unwrap();

    let mut config = PhotometryConfig::new("unused".into(), "unused".into());
    config.aperture.center = CenterConfig::Fixed(PixelCoord::new(6.0, 6.0));
    let curve = measure_stack(&mut stack, &config, &NoOpReporter).unwrap();

    let row = curve.rows[1];
    assert_eq!(row.sap_flux, 0.0);
    assert!(row.m00.is_nan() && row.m10.is_nan() && row.mu11.is_nan());
    assert!(curve.rows[0].m00.is_finite());
}

#[test]
fn test_measure_stack_with_background_and_recentering() {
    let frames: Vec<Array2<f64>> = star_frames(5).iter().map(|f| f.mapv(f64::from)).collect();
    let mut flux = Array3::<f64>::zeros((5, 20, 24));
    for (mut slice, frame) in flux.outer_iter_mut().zip(&frames) {
        slice.assign(frame);
    }
    let mut stack = ImageStack::new(flux, (0..5).map(|i| i as f64).collect(), (0..5).collect())
        .unwrap();

    let mut config = PhotometryConfig::new("unused".into(), "unused".into());
    config.aperture.radius = 5.0;
    config.aperture.center = CenterConfig::Fixed(PixelCoord::new(9.6, 12.4));
    config.background = BackgroundMethod::Median;
    config.recenter.enabled = true;
    config.recenter.iterations = 3;

    let reporter = RecordingReporter::default();
    let curve = measure_stack(&mut stack, &config, &reporter).unwrap();
    assert!(reporter
        .stages
        .lock()
        .unwrap()
        .contains(&(PipelineStage::Recentering, Some(3))));
    assert_eq!(reporter.advances_in(PipelineStage::Recentering), vec![1, 2, 3]);
    for row in &curve.rows {
        assert_eq!(row.background, 100.0);
        assert_abs_diff_eq!(row.center_row, 9.0, epsilon = 0.05);
        assert_abs_diff_eq!(row.center_col, 13.0, epsilon = 0.05);
    }
    // The dimmed epoch shows up as a transit-like drop.
    let sap = curve.sap_flux();
    assert!(sap[2] < 0.6 * sap[0], "{:?}", sap);
    assert_abs_diff_eq!(sap[0], sap[4], epsilon = 1e-6);
}

#[test]
fn test_light_curve_csv_round_trip() {
    let image = gaussian_star((12, 12), (6.0, 6.0), 1.0, 100.0, 0.0);
    let mut stack = constant_stack(&image, 3);
    let config = PhotometryConfig::new("unused".into(), "unused".into());
    let curve = measure_stack(&mut stack, &config, &NoOpReporter).unwrap();

    let dir = tempfile::tempdir().unwrap();
    let path = dir.path().join("curve.csv");
    write_light_curve(&curve, &path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let header = text.lines().next().unwrap();
    assert_eq!(
        header,
        "time,cadence,center_row,center_col,sap_flux,background,m00,m10,m01,mu20,mu02,mu11"
    );

    let rows = read_light_curve(&path).unwrap();
    assert_eq!(rows.len(), 3);
    assert_eq!(rows[1].cadence, curve.rows[1].cadence);
    assert_abs_diff_eq!(rows[1].sap_flux, curve.rows[1].sap_flux, epsilon = 1e-9);
    // Background is NaN without a calibration and survives the round trip.
    assert!(rows[1].background.is_nan());
}

#[test]
fn test_light_curve_row_json() {
    let curve = LightCurve::default();
    assert!(curve.is_empty());
    assert_eq!(curve.median_flux(), None);

    let image = gaussian_star((10, 10), (5.0, 5.0), 1.0, 100.0, 0.0);
    let mut stack = constant_stack(&image, 2);
    let curve = measure_stack(&mut stack, &PhotometryConfig::new("a".into(), "b".into()), &NoOpReporter)
        .unwrap();
    let json = serde_json::to_value(curve.rows[0]).unwrap();
    assert_eq!(json["cadence"], 100);
    assert_eq!(json["center_row"], 5.0);
}

#[test]
fn test_run_photometry_end_to_end() {
    let ser = write_test_ser(&build_ser_u16(&star_frames(6), None));
    let dir = tempfile::tempdir().unwrap();

    let mut config = config_for(ser.path(), &dir);
    config.aperture.radius = 4.0;
    config.background = BackgroundMethod::Median;
    config.time_range = Some(TimeRange::new(1.0, 4.0));
    config.reference_points = vec![PixelCoord::new(2.0, 3.0)];
    config.median_frame_png = Some(dir.path().join("median.png"));

    let reporter = RecordingReporter::default();
    let curve = run_photometry(&config, &reporter).unwrap();

    assert_eq!(curve.len(), 4);
    assert_eq!(curve.rows[0].time, 1.0);
    assert_eq!(curve.rows[0].cadence, 1);
    // Brightest pixel of the median frame.
    assert_eq!(curve.rows[0].center_row, 9.0);
    assert_eq!(curve.rows[0].center_col, 13.0);

    let written = read_light_curve(&config.output).unwrap();
    assert_eq!(written.len(), 4);
    assert!(dir.path().join("median.png").exists());

    let stages = reporter.stage_names();
    assert_eq!(stages.first(), Some(&PipelineStage::Reading));
    assert_eq!(stages.last(), Some(&PipelineStage::Writing));
}

#[test]
fn test_run_photometry_missing_input() {
    let dir = tempfile::tempdir().unwrap();
    let config = config_for(&dir.path().join("nope.ser"), &dir);
    assert!(run_photometry(&config, &NoOpReporter).is_err());
    assert!(!config.output.exists());
}

#[test]
fn test_loaded_stack_matches_frames() {
    let ser = write_test_ser(&build_ser_u16(&star_frames(3), None));
    let stack = load_stack(ser.path(), None).unwrap();
    assert_eq!(stack.raw_flux()[[0, 9, 13]], 2100.0);
    assert_eq!(stack.raw_flux()[[2, 9, 13]], 1100.0);
    assert_eq!(stack.raw_flux()[[1, 0, 0]], 100.0);
}
