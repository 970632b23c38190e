//! Per-frame refinement of catalog positions by iterative centroiding.
//!
//! Each reference position is refined with an intensity-weighted centre of
//! mass inside a small box, re-centring the box on every iteration. A star
//! that cannot be located near its reference position keeps the reference
//! coordinates, so index `i` always refers to the same catalog entry.

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::consts::{
    DEFAULT_RECENTER_BOX, DEFAULT_RECENTER_MAX_ITERATIONS, DEFAULT_RECENTER_TOLERANCE,
};
use crate::detection::SourcePosition;
use crate::frame::Frame;
use crate::stats::median_in_place;

/// Parameters for iterative centroid recentering.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecenterConfig {
    /// Side length of the centroiding box in pixels (even values are rounded up).
    pub box_size: usize,
    /// Maximum number of re-centring passes.
    pub max_iterations: usize,
    /// Stop once the centroid moves less than this many pixels.
    pub tolerance: f64,
}

impl Default for RecenterConfig {
    fn default() -> Self {
        Self {
            box_size: DEFAULT_RECENTER_BOX,
            max_iterations: DEFAULT_RECENTER_MAX_ITERATIONS,
            tolerance: DEFAULT_RECENTER_TOLERANCE,
        }
    }
}

impl RecenterConfig {
    fn half_box(&self) -> usize {
        (self.box_size | 1) / 2
    }
}

/// Recenter every catalog position on `frame`, preserving order and count.
pub fn recenter_positions(
    frame: &Frame,
    reference: &[SourcePosition],
    config: &RecenterConfig,
) -> Vec<SourcePosition> {
    let refined: Vec<Option<SourcePosition>> = reference
        .par_iter()
        .map(|pos| recenter_source(&frame.data, pos, config))
        .collect();

    let mut fallbacks = 0usize;
    let positions = refined
        .into_iter()
        .zip(reference)
        .map(|(found, original)| {
            found.unwrap_or_else(|| {
                fallbacks += 1;
                *original
            })
        })
        .collect();

    debug!(
        frame = frame.metadata.frame_index,
        sources = reference.len(),
        fallbacks,
        "Recentered positions"
    );
    positions
}

/// Refine one position. Returns `None` when the centroid cannot be trusted:
/// no positive signal in the box, or a drift beyond the original box.
pub fn recenter_source(
    data: &Array2<f32>,
    reference: &SourcePosition,
    config: &RecenterConfig,
) -> Option<SourcePosition> {
    if !reference.x.is_finite() || !reference.y.is_finite() {
        return None;
    }
    let half = config.half_box();
    let mut current = *reference;

    for _ in 0..config.max_iterations.max(1) {
        let next = window_centroid(data, &current, half)?;
        if (next.x - reference.x).abs() > half as f64 || (next.y - reference.y).abs() > half as f64
        {
            return None;
        }
        let shift = next.distance(&current);
        current = next;
        if shift < config.tolerance {
            break;
        }
    }
    Some(current)
}

/// Sky-subtracted centre of mass inside a box centred on the rounded
/// position and clipped to the frame. The box median is the sky level.
fn window_centroid(data: &Array2<f32>, centre: &SourcePosition, half: usize) -> Option<SourcePosition> {
    let (h, w) = data.dim();
    let (cr, cc) = (centre.y.round() as isize, centre.x.round() as isize);
    let half = half as isize;
    let r0 = (cr - half).max(0);
    let r1 = (cr + half).min(h as isize - 1);
    let c0 = (cc - half).max(0);
    let c1 = (cc + half).min(w as isize - 1);
    if r0 > r1 || c0 > c1 {
        return None;
    }
    let (r0, r1, c0, c1) = (r0 as usize, r1 as usize, c0 as usize, c1 as usize);

    let mut values: Vec<f32> = Vec::with_capacity((r1 - r0 + 1) * (c1 - c0 + 1));
    for row in r0..=r1 {
        for col in c0..=c1 {
            values.push(data[[row, col]]);
        }
    }
    let sky = median_in_place(&mut values);

    let mut sum_w = 0.0f64;
    let mut sum_x = 0.0f64;
    let mut sum_y = 0.0f64;
    for row in r0..=r1 {
        for col in c0..=c1 {
            let weight = data[[row, col]] as f64 - sky;
            if weight > 0.0 {
                sum_w += weight;
                sum_x += col as f64 * weight;
                sum_y += row as f64 * weight;
            }
        }
    }

    if sum_w > 0.0 && sum_w.is_finite() {
        Some(SourcePosition::new(sum_x / sum_w, sum_y / sum_w))
    } else {
        None
    }
}
