use ndarray::{Array2, ArrayView2, CowArray, Ix2, Zip};
use serde::{Deserialize, Serialize};

use crate::aperture::{aperture_weights, validate_radius, ApertureSpec, PixelCoord};
use crate::error::{PhotometryError, Result};
use crate::stack::median::median_of_finite;

/// One epoch's image together with the aperture used to measure it.
///
/// The image and weights are either borrowed from an [`ImageStack`] or owned;
/// a frame never mutates them. Moments and renders work on local copies.
///
/// [`ImageStack`]: crate::stack::ImageStack
#[derive(Clone, Debug)]
pub struct Frame<'a> {
    image: CowArray<'a, f64, Ix2>,
    weights: CowArray<'a, f64, Ix2>,
    center: PixelCoord,
    radius: f64,
    reference_points: Option<Vec<PixelCoord>>,
}

/// Image moments of the aperture-weighted frame.
///
/// `m10`/`m01` are the centroid row/column; the `mu` terms are second-order
/// central moments about that centroid, normalized by `m00`.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct Moments {
    /// Total weighted intensity.
    pub m00: f64,
    pub m10: f64,
    pub m01: f64,
    pub mu20: f64,
    pub mu02: f64,
    pub mu11: f64,
}

impl Moments {
    pub fn centroid(&self) -> PixelCoord {
        PixelCoord::new(self.m10, self.m01)
    }
}

/// Display stretch for [`Frame::render`].
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum Scale {
    Linear,
    #[default]
    Log,
}

impl std::fmt::Display for Scale {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Linear => write!(f, "Linear"),
            Self::Log => write!(f, "Log"),
        }
    }
}

impl<'a> Frame<'a> {
    /// Build a frame from an image and a precomputed weight mask.
    ///
    /// Fails with [`PhotometryError::InvalidParameter`] on mismatched shapes
    /// or a radius that is not finite and positive.
    pub fn new(
        image: impl Into<CowArray<'a, f64, Ix2>>,
        weights: impl Into<CowArray<'a, f64, Ix2>>,
        center: PixelCoord,
        radius: f64,
    ) -> Result<Self> {
        validate_radius(radius)?;
        let image = image.into();
        let weights = weights.into();
        if image.dim() != weights.dim() {
            return Err(PhotometryError::InvalidParameter(format!(
                "image shape {:?} does not match weight shape {:?}",
                image.dim(),
                weights.dim()
            )));
        }
        Ok(Self {
            image,
            weights,
            center,
            radius,
            reference_points: None,
        })
    }

    /// Shapes are already known to agree, e.g. slices of one stack epoch.
    pub(crate) fn from_parts(
        image: CowArray<'a, f64, Ix2>,
        weights: CowArray<'a, f64, Ix2>,
        center: PixelCoord,
        radius: f64,
    ) -> Self {
        debug_assert_eq!(image.dim(), weights.dim());
        Self {
            image,
            weights,
            center,
            radius,
            reference_points: None,
        }
    }

    /// Attach reference pixel positions, e.g. catalog stars.
    pub fn with_reference_points(mut self, points: Vec<PixelCoord>) -> Self {
        self.reference_points = Some(points);
        self
    }

    pub fn image(&self) -> ArrayView2<'_, f64> {
        self.image.view()
    }

    pub fn weights(&self) -> ArrayView2<'_, f64> {
        self.weights.view()
    }

    pub fn center(&self) -> PixelCoord {
        self.center
    }

    pub fn radius(&self) -> f64 {
        self.radius
    }

    pub fn aperture(&self) -> ApertureSpec {
        ApertureSpec {
            center: self.center,
            radius: self.radius,
        }
    }

    pub fn reference_points(&self) -> Option<&[PixelCoord]> {
        self.reference_points.as_deref()
    }

    /// `(rows, cols)` of the image.
    pub fn shape(&self) -> (usize, usize) {
        self.image.dim()
    }

    /// Compute centroid and second-order central moments.
    ///
    /// Non-finite pixels contribute nothing. Fails with
    /// [`PhotometryError::DegenerateAperture`] when no finite pixel carries
    /// aperture weight or the total weighted intensity is exactly zero.
    pub fn moments(&self) -> Result<Moments> {
        let mut weighted = Array2::<f64>::zeros(self.image.raw_dim());
        let mut contributing = 0usize;
        Zip::from(&mut weighted)
            .and(&self.image)
            .and(&self.weights)
            .for_each(|out, &value, &weight| {
                if value.is_finite() && weight > 0.0 {
                    *out = value * weight;
                    contributing += 1;
                }
            });

        let mut m00 = 0.0f64;
        let mut sum_r = 0.0f64;
        let mut sum_c = 0.0f64;
        for ((row, col), &value) in weighted.indexed_iter() {
            m00 += value;
            sum_r += row as f64 * value;
            sum_c += col as f64 * value;
        }

        if contributing == 0 || m00 == 0.0 {
            return Err(PhotometryError::DegenerateAperture);
        }

        let m10 = sum_r / m00;
        let m01 = sum_c / m00;

        let mut mu20 = 0.0f64;
        let mut mu02 = 0.0f64;
        let mut mu11 = 0.0f64;
        for ((row, col), &value) in weighted.indexed_iter() {
            let dr = row as f64 - m10;
            let dc = col as f64 - m01;
            mu20 += dr * dr * value;
            mu02 += dc * dc * value;
            mu11 += dr * dc * value;
        }

        Ok(Moments {
            m00,
            m10,
            m01,
            mu20: mu20 / m00,
            mu02: mu02 / m00,
            mu11: mu11 / m00,
        })
    }

    /// Median-subtracted display image. Non-finite pixels render as 0; under
    /// [`Scale::Log`] so do negative log values.
    pub fn render(&self, scale: Scale) -> Array2<f64> {
        let mut finite: Vec<f64> = self.image.iter().copied().filter(|v| v.is_finite()).collect();
        let median = median_of_finite(&mut finite).unwrap_or(0.0);

        self.image.mapv(|v| {
            let z = v - median;
            let z = match scale {
                Scale::Linear => z,
                Scale::Log => z.log10(),
            };
            if !z.is_finite() || (scale == Scale::Log && z < 0.0) {
                0.0
            } else {
                z
            }
        })
    }
}

impl Frame<'static> {
    /// Build an owned frame, computing the aperture weights for `spec`.
    pub fn with_aperture(image: Array2<f64>, spec: &ApertureSpec) -> Result<Self> {
        let weights = aperture_weights(image.dim(), spec)?;
        Self::new(image, weights, spec.center, spec.radius)
    }
}
