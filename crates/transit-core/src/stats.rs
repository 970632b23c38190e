//! Robust sample statistics shared by the combiner, the detector and the
//! photometric sky estimate.

use crate::consts::{EPSILON, MIN_CLIP_SAMPLES};
use crate::stack::sigma_clip::SigmaClipParams;

/// Summary of a sigma-clipped sample.
#[derive(Clone, Copy, Debug, PartialEq)]
pub struct ClippedStats {
    pub mean: f64,
    pub median: f64,
    /// Population standard deviation of the retained samples.
    pub std: f64,
    /// Number of samples surviving rejection.
    pub retained: usize,
}

impl ClippedStats {
    fn empty() -> Self {
        Self {
            mean: f64::NAN,
            median: f64::NAN,
            std: f64::NAN,
            retained: 0,
        }
    }
}

/// Sigma-clipped statistics of `values`, leaving the input untouched.
pub fn sigma_clipped_stats(values: &[f32], params: &SigmaClipParams) -> ClippedStats {
    let mut scratch = values.to_vec();
    sigma_clip_in_place(&mut scratch, params)
}

/// Sigma-clip `values` in place. On return `values` holds the survivors
/// (in unspecified order).
///
/// Samples farther than `sigma * std` from the current mean are rejected
/// until an iteration rejects nothing, the spread collapses, or the
/// iteration cap is hit. Non-finite samples are dropped up front. Fewer
/// than three samples are summarized without rejection.
pub fn sigma_clip_in_place(values: &mut Vec<f32>, params: &SigmaClipParams) -> ClippedStats {
    values.retain(|v| v.is_finite());
    if values.is_empty() {
        return ClippedStats::empty();
    }

    if values.len() >= MIN_CLIP_SAMPLES {
        for _ in 0..params.max_iterations {
            let (mean, std) = mean_std(values);
            if std < EPSILON {
                break;
            }
            let lo = mean - params.sigma * std;
            let hi = mean + params.sigma * std;
            let inside = |v: &f32| {
                let v = *v as f64;
                v >= lo && v <= hi
            };

            let survivors = values.iter().filter(|v| inside(*v)).count();
            if survivors == values.len() || survivors == 0 {
                break;
            }
            values.retain(|v| inside(v));
        }
    }

    let (mean, std) = mean_std(values);
    let median = median_in_place(values);
    ClippedStats {
        mean,
        median,
        std,
        retained: values.len(),
    }
}

/// Mean and population standard deviation, accumulated in f64.
pub fn mean_std(values: &[f32]) -> (f64, f64) {
    if values.is_empty() {
        return (f64::NAN, f64::NAN);
    }
    let n = values.len() as f64;
    let mean = values.iter().map(|&v| v as f64).sum::<f64>() / n;
    let var = values
        .iter()
        .map(|&v| {
            let d = v as f64 - mean;
            d * d
        })
        .sum::<f64>()
        / n;
    (mean, var.sqrt())
}

/// Median of `values` without reordering the caller's slice.
pub fn median(values: &[f32]) -> f64 {
    let mut scratch: Vec<f32> = values.iter().copied().filter(|v| v.is_finite()).collect();
    median_in_place(&mut scratch)
}

/// Median via `select_nth_unstable`; reorders `values`.
/// Even counts average the two middle samples.
pub fn median_in_place(values: &mut [f32]) -> f64 {
    let n = values.len();
    match n {
        0 => f64::NAN,
        1 => values[0] as f64,
        _ if n % 2 == 1 => {
            let mid = n / 2;
            *values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b)).1 as f64
        }
        _ => {
            let mid = n / 2;
            values.select_nth_unstable_by(mid, |a, b| a.total_cmp(b));
            let upper = values[mid] as f64;
            let lower = values[..mid]
                .iter()
                .copied()
                .fold(f32::NEG_INFINITY, f32::max) as f64;
            (lower + upper) / 2.0
        }
    }
}

/// Median of f64 samples, ignoring non-finite values.
pub fn median_f64(values: &[f64]) -> f64 {
    let mut finite: Vec<f64> = values.iter().copied().filter(|v| v.is_finite()).collect();
    let n = finite.len();
    if n == 0 {
        return f64::NAN;
    }
    finite.sort_unstable_by(|a, b| a.total_cmp(b));
    if n % 2 == 1 {
        finite[n / 2]
    } else {
        (finite[n / 2 - 1] + finite[n / 2]) / 2.0
    }
}
