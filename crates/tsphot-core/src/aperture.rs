//! Fractional-pixel circular aperture weights.
//!
//! Pixel `(i, j)` covers the unit square centered on `(i, j)`. The weight of a
//! pixel is the exact area of that square lying inside the aperture circle,
//! computed analytically from signed corner integrals of the circle. Interior
//! pixels get 1, exterior pixels 0, boundary pixels a value in between.

use ndarray::{Array2, ArrayViewMut2};
use serde::{Deserialize, Serialize};

use crate::error::{PhotometryError, Result};

/// A sub-pixel position on the detector, in (row, column) pixel units.
#[derive(Clone, Copy, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PixelCoord {
    pub row: f64,
    pub col: f64,
}

impl PixelCoord {
    pub fn new(row: f64, col: f64) -> Self {
        Self { row, col }
    }

    pub fn is_finite(&self) -> bool {
        self.row.is_finite() && self.col.is_finite()
    }
}

impl From<(f64, f64)> for PixelCoord {
    fn from((row, col): (f64, f64)) -> Self {
        Self { row, col }
    }
}

/// Circular aperture: center and radius in pixels.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ApertureSpec {
    pub center: PixelCoord,
    pub radius: f64,
}

impl ApertureSpec {
    pub fn new(center: PixelCoord, radius: f64) -> Result<Self> {
        let spec = Self { center, radius };
        spec.validate()?;
        Ok(spec)
    }

    pub fn validate(&self) -> Result<()> {
        validate_radius(self.radius)?;
        validate_center(&self.center)
    }
}

/// Aperture placement across the epochs of a stack.
///
/// `Fixed` is broadcast to every epoch; `PerEpoch` must supply exactly one
/// center per epoch.
#[derive(Clone, Debug, PartialEq)]
pub enum ApertureCenter {
    Fixed(PixelCoord),
    PerEpoch(Vec<PixelCoord>),
}

impl ApertureCenter {
    /// Expand into one center per epoch.
    pub fn resolve(&self, epochs: usize) -> Result<Vec<PixelCoord>> {
        let centers = match self {
            Self::Fixed(center) => vec![*center; epochs],
            Self::PerEpoch(centers) => {
                if centers.len() != epochs {
                    return Err(PhotometryError::InvalidParameter(format!(
                        "expected {} aperture centers, got {}",
                        epochs,
                        centers.len()
                    )));
                }
                centers.clone()
            }
        };
        for center in &centers {
            validate_center(center)?;
        }
        Ok(centers)
    }
}

impl From<PixelCoord> for ApertureCenter {
    fn from(center: PixelCoord) -> Self {
        Self::Fixed(center)
    }
}

impl From<Vec<PixelCoord>> for ApertureCenter {
    fn from(centers: Vec<PixelCoord>) -> Self {
        Self::PerEpoch(centers)
    }
}

pub(crate) fn validate_radius(radius: f64) -> Result<()> {
    if radius.is_finite() && radius > 0.0 {
        Ok(())
    } else {
        Err(PhotometryError::InvalidParameter(format!(
            "aperture radius must be positive, got {radius}"
        )))
    }
}

fn validate_center(center: &PixelCoord) -> Result<()> {
    if center.is_finite() {
        Ok(())
    } else {
        Err(PhotometryError::InvalidParameter(format!(
            "aperture center must be finite, got ({}, {})",
            center.row, center.col
        )))
    }
}

/// Compute the aperture weight mask for a grid of `shape = (rows, cols)`.
///
/// A center outside the grid is allowed and yields a clipped or all-zero mask.
pub fn aperture_weights(shape: (usize, usize), spec: &ApertureSpec) -> Result<Array2<f64>> {
    let (rows, cols) = shape;
    if rows == 0 || cols == 0 {
        return Err(PhotometryError::InvalidParameter(format!(
            "grid shape must be non-empty, got {rows}x{cols}"
        )));
    }
    spec.validate()?;

    let mut weights = Array2::<f64>::zeros(shape);
    fill_weights(weights.view_mut(), spec.center, spec.radius);
    Ok(weights)
}

/// Write aperture weights into `out`. Inputs must already be validated.
pub(crate) fn fill_weights(mut out: ArrayViewMut2<'_, f64>, center: PixelCoord, radius: f64) {
    out.fill(0.0);
    let (rows, cols) = out.dim();

    let Some((row_lo, row_hi)) = pixel_span(center.row, radius, rows) else {
        return;
    };
    let Some((col_lo, col_hi)) = pixel_span(center.col, radius, cols) else {
        return;
    };

    for row in row_lo..=row_hi {
        let dr = row as f64 - center.row;
        for col in col_lo..=col_hi {
            let dc = col as f64 - center.col;
            out[[row, col]] = pixel_coverage(dr, dc, radius);
        }
    }
}

/// Inclusive index range of pixels along one axis that can touch the circle.
fn pixel_span(center: f64, radius: f64, len: usize) -> Option<(usize, usize)> {
    let lo = (center - radius - 0.5).floor().max(0.0);
    let hi = (center + radius + 0.5).ceil().min(len as f64 - 1.0);
    if hi < lo {
        None
    } else {
        Some((lo as usize, hi as usize))
    }
}

/// Fraction of the unit pixel at offset `(dr, dc)` from the center that lies
/// inside a circle of radius `r`.
fn pixel_coverage(dr: f64, dc: f64, r: f64) -> f64 {
    let r2 = r * r;

    let near_r = (dr.abs() - 0.5).max(0.0);
    let near_c = (dc.abs() - 0.5).max(0.0);
    if near_r * near_r + near_c * near_c >= r2 {
        return 0.0;
    }

    let far_r = dr.abs() + 0.5;
    let far_c = dc.abs() + 0.5;
    if far_r * far_r + far_c * far_c <= r2 {
        return 1.0;
    }

    let (r0, r1) = (dr - 0.5, dr + 0.5);
    let (c0, c1) = (dc - 0.5, dc + 0.5);
    let area = corner_area(r1, c1, r) - corner_area(r0, c1, r) - corner_area(r1, c0, r)
        + corner_area(r0, c0, r);
    area.clamp(0.0, 1.0)
}

/// Signed area of the circle inside the box spanned by the origin and `(x, y)`.
fn corner_area(x: f64, y: f64, r: f64) -> f64 {
    let area = quadrant_area(x.abs(), y.abs(), r);
    if (x < 0.0) != (y < 0.0) {
        -area
    } else {
        area
    }
}

/// Area of the circle inside `[0, x] x [0, y]` for non-negative `x`, `y`.
fn quadrant_area(x: f64, y: f64, r: f64) -> f64 {
    let x_circle = x.min(r);
    // Beyond this abscissa the circle is lower than `y`.
    let x_flat = x.min((r * r - y * y).max(0.0).sqrt());
    y * x_flat + segment_integral(x_circle, r) - segment_integral(x_flat, r)
}

/// Integral of sqrt(r^2 - t^2) over [0, x] for 0 <= x <= r.
fn segment_integral(x: f64, r: f64) -> f64 {
    let ratio = (x / r).clamp(-1.0, 1.0);
    0.5 * (x * (r * r - x * x).max(0.0).sqrt() + r * r * ratio.asin())
}
