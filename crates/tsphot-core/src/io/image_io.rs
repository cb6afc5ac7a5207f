use std::path::Path;

use image::{ImageFormat, Rgb, RgbImage};
use ndarray::Array2;

use crate::error::Result;
use crate::frame::{Frame, Scale};

const APERTURE_COLOR: Rgb<u8> = Rgb([0, 255, 0]);
const REFERENCE_COLOR: Rgb<u8> = Rgb([255, 165, 0]);

/// Min-max stretch a display image to 8-bit.
pub fn stretch_to_u8(data: &Array2<f64>) -> Array2<u8> {
    let (lo, hi) = data
        .iter()
        .filter(|v| v.is_finite())
        .fold((f64::INFINITY, f64::NEG_INFINITY), |(lo, hi), &v| {
            (lo.min(v), hi.max(v))
        });
    let span = hi - lo;
    data.mapv(|v| {
        if !v.is_finite() || !(span > 0.0) {
            0
        } else {
            (((v - lo) / span).clamp(0.0, 1.0) * 255.0).round() as u8
        }
    })
}

/// Save a frame as an RGB PNG: the rendered image in gray, the aperture
/// boundary (partially covered pixels) in green, reference points in orange.
pub fn save_frame_png(frame: &Frame<'_>, scale: Scale, path: &Path) -> Result<()> {
    let gray = stretch_to_u8(&frame.render(scale));
    let (h, w) = gray.dim();
    let weights = frame.weights();

    let mut img = RgbImage::new(w as u32, h as u32);
    for ((row, col), &val) in gray.indexed_iter() {
        let weight = weights[[row, col]];
        let pixel = if weight > 0.0 && weight < 1.0 {
            APERTURE_COLOR
        } else {
            Rgb([val, val, val])
        };
        img.put_pixel(col as u32, row as u32, pixel);
    }

    for point in frame.reference_points().unwrap_or_default() {
        let (row, col) = (point.row.round(), point.col.round());
        if row >= 0.0 && col >= 0.0 && (row as usize) < h && (col as usize) < w {
            img.put_pixel(col as u32, row as u32, REFERENCE_COLOR);
        }
    }

    img.save_with_format(path, ImageFormat::Png)?;
    Ok(())
}
