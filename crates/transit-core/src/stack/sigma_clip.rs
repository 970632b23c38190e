use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};

use crate::consts::{DEFAULT_CLIP_MAX_ITERATIONS, DEFAULT_CLIP_SIGMA, PARALLEL_PIXEL_THRESHOLD};
use crate::error::Result;
use crate::frame::{ensure_uniform_shape, Frame};
use crate::stats::sigma_clip_in_place;

/// Statistic reported for the samples that survive clipping.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CentralEstimator {
    #[default]
    Median,
    Mean,
}

impl std::fmt::Display for CentralEstimator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Median => write!(f, "Median"),
            Self::Mean => write!(f, "Mean"),
        }
    }
}

/// Parameters for sigma-clipped statistics.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SigmaClipParams {
    /// Values beyond mean +/- sigma*stddev are rejected (default: 3.0).
    pub sigma: f64,
    /// Upper bound on rejection passes; clipping normally stops earlier,
    /// once a pass rejects nothing (default: 5).
    pub max_iterations: usize,
    /// Estimator applied to the survivors (default: median).
    pub estimator: CentralEstimator,
}

impl Default for SigmaClipParams {
    fn default() -> Self {
        Self {
            sigma: DEFAULT_CLIP_SIGMA,
            max_iterations: DEFAULT_CLIP_MAX_ITERATIONS,
            estimator: CentralEstimator::default(),
        }
    }
}

/// Output of the robust combiner: the combined frame plus the per-pixel
/// standard deviation of the samples that survived rejection.
#[derive(Clone, Debug)]
pub struct CombinedFrame {
    pub frame: Frame,
    pub dispersion: Array2<f32>,
}

/// Stack frames using per-pixel sigma clipping.
///
/// Per pixel: gather the N samples, iteratively reject those more than
/// `sigma` standard deviations from the mean, then report the configured
/// central estimate and the spread of the survivors. Stacks of one or two
/// frames are combined without rejection.
pub fn sigma_clip_stack(frames: &[Frame], params: &SigmaClipParams) -> Result<CombinedFrame> {
    let (h, w) = ensure_uniform_shape(frames)?;
    let n = frames.len();

    let combine_row = |row: usize| -> (Vec<f32>, Vec<f32>) {
        let mut pixel_values = Vec::with_capacity(n);
        let mut centre = vec![0.0f32; w];
        let mut spread = vec![0.0f32; w];
        for col in 0..w {
            pixel_values.clear();
            pixel_values.extend(frames.iter().map(|f| f.data[[row, col]]));
            let stats = sigma_clip_in_place(&mut pixel_values, params);
            centre[col] = match params.estimator {
                CentralEstimator::Median => stats.median,
                CentralEstimator::Mean => stats.mean,
            } as f32;
            spread[col] = stats.std as f32;
        }
        (centre, spread)
    };

    let rows: Vec<(Vec<f32>, Vec<f32>)> = if h * w >= PARALLEL_PIXEL_THRESHOLD && n > 1 {
        (0..h).into_par_iter().map(combine_row).collect()
    } else {
        (0..h).map(combine_row).collect()
    };

    let mut result = Array2::<f32>::zeros((h, w));
    let mut dispersion = Array2::<f32>::zeros((h, w));
    for (row, (centre, spread)) in rows.into_iter().enumerate() {
        for col in 0..w {
            result[[row, col]] = centre[col];
            dispersion[[row, col]] = spread[col];
        }
    }

    Ok(CombinedFrame {
        frame: Frame::new(result),
        dispersion,
    })
}
