use ndarray::{s, Array2, ArrayView3, Axis};
use rayon::prelude::*;

use crate::consts::PARALLEL_PIXEL_THRESHOLD;

/// Per-pixel median across epochs, ignoring non-finite samples.
///
/// Pixels with no finite sample in any epoch are NaN in the result.
/// Parallelizes at the row level for images >= 256x256.
pub fn nan_median_cube(cube: ArrayView3<'_, f64>) -> Array2<f64> {
    let (n, h, w) = cube.dim();

    let median_row = |row: usize| -> Vec<f64> {
        let mut pixel_values = Vec::with_capacity(n);
        (0..w)
            .map(|col| {
                pixel_values.clear();
                pixel_values.extend(cube.slice(s![.., row, col]).iter().copied());
                median_of_finite(&mut pixel_values).unwrap_or(f64::NAN)
            })
            .collect()
    };

    let rows: Vec<Vec<f64>> = if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        (0..h).into_par_iter().map(median_row).collect()
    } else {
        (0..h).map(median_row).collect()
    };

    let mut result = Array2::<f64>::from_elem((h, w), f64::NAN);
    for (mut out, row_data) in result.axis_iter_mut(Axis(0)).zip(rows) {
        for (dst, val) in out.iter_mut().zip(row_data) {
            *dst = val;
        }
    }
    result
}

/// Median of the finite entries of `values`, or `None` if there are none.
///
/// Non-finite entries are dropped from `values`; the remaining order is
/// unspecified afterwards. Uses `select_nth_unstable` for O(n) selection.
pub fn median_of_finite(values: &mut Vec<f64>) -> Option<f64> {
    values.retain(|v| v.is_finite());
    let n = values.len();
    if n == 0 {
        return None;
    }

    let mid = n / 2;
    if n % 2 == 1 {
        Some(*values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1)
    } else {
        values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
        let upper = values[mid];
        let lower = values[..mid]
            .iter()
            .copied()
            .fold(f64::NEG_INFINITY, f64::max);
        Some((lower + upper) / 2.0)
    }
}
