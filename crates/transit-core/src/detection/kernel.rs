use ndarray::Array2;
use rayon::prelude::*;

use crate::consts::{FWHM_TO_SIGMA, PARALLEL_PIXEL_THRESHOLD};

/// Zero-mean ("lowered") circular Gaussian used as a matched filter.
///
/// Convolving with this kernel yields, at each pixel, the least-squares
/// amplitude of a Gaussian of the configured FWHM sitting on a locally
/// constant background. Pixels outside the circular footprint are zero.
#[derive(Clone, Debug)]
pub struct MatchedKernel {
    pub radius: usize,
    pub weights: Array2<f64>,
    pub footprint: Array2<bool>,
}

impl MatchedKernel {
    pub fn new(fwhm: f64) -> Self {
        let sigma = fwhm / FWHM_TO_SIGMA;
        let radius_f = (1.5 * sigma).max(2.0);
        let radius = radius_f.floor() as usize;
        let size = 2 * radius + 1;

        let mut gauss = Array2::<f64>::zeros((size, size));
        let mut footprint = Array2::<bool>::from_elem((size, size), false);
        for i in 0..size {
            for j in 0..size {
                let dy = i as f64 - radius as f64;
                let dx = j as f64 - radius as f64;
                let r2 = dx * dx + dy * dy;
                if r2 <= radius_f * radius_f {
                    footprint[[i, j]] = true;
                    gauss[[i, j]] = (-r2 / (2.0 * sigma * sigma)).exp();
                }
            }
        }

        let n = footprint.iter().filter(|&&m| m).count() as f64;
        let mean = gauss.sum() / n;
        let mut weights = Array2::<f64>::zeros((size, size));
        let mut norm = 0.0;
        for ((idx, &inside), &g) in footprint.indexed_iter().zip(gauss.iter()) {
            if inside {
                let lowered = g - mean;
                weights[idx] = lowered;
                norm += lowered * lowered;
            }
        }
        weights.mapv_inplace(|v| v / norm);

        Self {
            radius,
            weights,
            footprint,
        }
    }

    /// Footprint offsets `(drow, dcol)` in raster order.
    pub fn offsets(&self) -> Vec<(isize, isize)> {
        let r = self.radius as isize;
        self.footprint
            .indexed_iter()
            .filter(|(_, inside)| **inside)
            .map(|((i, j), _)| (i as isize - r, j as isize - r))
            .collect()
    }

    /// Matched-filter response of `data`. Pixels closer than `radius` to an
    /// edge have no full footprint and are left at zero.
    pub fn convolve(&self, data: &Array2<f32>) -> Array2<f32> {
        let (h, w) = data.dim();
        let r = self.radius;
        let mut out = Array2::<f32>::zeros((h, w));
        if h <= 2 * r || w <= 2 * r {
            return out;
        }

        let taps: Vec<(usize, usize, f64)> = self
            .weights
            .indexed_iter()
            .zip(self.footprint.iter())
            .filter(|(_, inside)| **inside)
            .map(|(((i, j), &k), _)| (i, j, k))
            .collect();

        let filter_row = |row: usize| -> Vec<f32> {
            (r..w - r)
                .map(|col| {
                    taps.iter()
                        .map(|&(i, j, k)| k * data[[row + i - r, col + j - r]] as f64)
                        .sum::<f64>() as f32
                })
                .collect()
        };

        let rows: Vec<Vec<f32>> = if h * w >= PARALLEL_PIXEL_THRESHOLD {
            (r..h - r).into_par_iter().map(filter_row).collect()
        } else {
            (r..h - r).map(filter_row).collect()
        };

        for (row, values) in (r..h - r).zip(rows) {
            for (col, v) in (r..w - r).zip(values) {
                out[[row, col]] = v;
            }
        }
        out
    }
}
