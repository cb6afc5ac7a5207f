use std::fmt;

use ndarray::{ArrayView2, ArrayViewMut2, Zip};

use crate::consts::BACKGROUND_WEIGHT_CUTOFF;

use super::median::median_of_finite;

/// A per-epoch correction applied to the raw flux before photometry.
///
/// `weights` is the epoch's aperture mask when apertures have been set.
pub trait FluxCalibration: Send + Sync + fmt::Debug {
    /// Background level to remove from one epoch, if it can be estimated.
    fn background(&self, image: ArrayView2<'_, f64>, weights: Option<ArrayView2<'_, f64>>)
        -> Option<f64>;

    /// Correct one epoch's image in place. Subtracts [`Self::background`] by default.
    fn calibrate(&self, mut image: ArrayViewMut2<'_, f64>, weights: Option<ArrayView2<'_, f64>>) {
        if let Some(level) = self.background(image.view(), weights) {
            image.mapv_inplace(|v| v - level);
        }
    }
}

/// Sky background estimated as the median of finite pixels outside the aperture.
///
/// Without aperture weights every finite pixel takes part.
#[derive(Clone, Copy, Debug, Default)]
pub struct MedianBackground;

impl FluxCalibration for MedianBackground {
    fn background(
        &self,
        image: ArrayView2<'_, f64>,
        weights: Option<ArrayView2<'_, f64>>,
    ) -> Option<f64> {
        let mut sky = Vec::with_capacity(image.len());
        match weights {
            Some(weights) => Zip::from(&image).and(&weights).for_each(|&v, &w| {
                if w < BACKGROUND_WEIGHT_CUTOFF {
                    sky.push(v);
                }
            }),
            None => sky.extend(image.iter().copied()),
        }
        median_of_finite(&mut sky)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use ndarray::Array2;

    #[test]
    fn test_background_excludes_aperture() {
        let mut image = Array2::<f64>::from_elem((5, 5), 10.0);
        image[[2, 2]] = 1000.0;
        let mut weights = Array2::<f64>::zeros((5, 5));
        weights[[2, 2]] = 1.0;

        let level = MedianBackground.background(image.view(), Some(weights.view()));
        assert_eq!(level, Some(10.0));
    }

    #[test]
    fn test_calibrate_subtracts_level() {
        let mut image = Array2::<f64>::from_elem((4, 4), 7.0);
        image[[0, 0]] = f64::NAN;
        MedianBackground.calibrate(image.view_mut(), None);
        assert_eq!(image[[1, 1]], 0.0);
        assert!(image[[0, 0]].is_nan());
    }

    #[test]
    fn test_background_all_invalid() {
        let image = Array2::<f64>::from_elem((3, 3), f64::NAN);
        assert_eq!(MedianBackground.background(image.view(), None), None);
    }
}
