use rayon::prelude::*;
use tracing::debug;

use crate::consts::PARALLEL_FRAME_THRESHOLD;
use crate::error::{Result, TransitError};
use crate::frame::{ensure_uniform_shape, Frame};
use crate::stack::sigma_clip::{sigma_clip_stack, SigmaClipParams};
use crate::stats::median;

/// Combine raw bias frames into a master bias.
pub fn combine_bias(frames: &[Frame], params: &SigmaClipParams) -> Result<Frame> {
    ensure_uniform_shape(frames)?;
    Ok(sigma_clip_stack(frames, params)?.frame)
}

/// Combine raw darks into a master dark, subtracting the bias first when given.
pub fn combine_dark(
    frames: &[Frame],
    bias: Option<&Frame>,
    params: &SigmaClipParams,
) -> Result<Frame> {
    let corrected = correct_each(frames, |frame| subtract_references(frame, bias, None))?;
    Ok(sigma_clip_stack(&corrected, params)?.frame)
}

/// Combine raw flats into a normalized master flat.
///
/// Each frame has bias and dark removed (when given) and is divided by its
/// own median before combination, so every exposure contributes equally
/// regardless of illumination. Non-positive pixels of the combined flat are
/// replaced by its smallest positive value.
pub fn combine_flat(
    frames: &[Frame],
    bias: Option<&Frame>,
    dark: Option<&Frame>,
    params: &SigmaClipParams,
) -> Result<Frame> {
    let normalized = correct_each(frames, |frame| {
        let mut corrected = subtract_references(frame, bias, dark)?;
        let values: Vec<f32> = corrected.data.iter().copied().collect();
        let norm = median(&values);
        if !norm.is_finite() || norm <= 0.0 {
            return Err(TransitError::DegenerateStatistics(format!(
                "flat frame {} has non-positive median {norm}",
                frame.metadata.frame_index
            )));
        }
        debug!(frame = frame.metadata.frame_index, median = norm, "Normalizing flat");
        let norm = norm as f32;
        corrected.data.mapv_inplace(|v| v / norm);
        Ok(corrected)
    })?;

    let combined = sigma_clip_stack(&normalized, params)?.frame;
    clamp_non_positive(combined)
}

/// Replace every pixel <= 0 with the smallest positive pixel of the frame.
///
/// A frame without any positive pixel is a `DegenerateStatistics` error.
pub fn clamp_non_positive(mut frame: Frame) -> Result<Frame> {
    let min_positive = frame
        .data
        .iter()
        .copied()
        .filter(|&v| v > 0.0 && v.is_finite())
        .fold(f32::INFINITY, f32::min);
    if !min_positive.is_finite() {
        return Err(TransitError::DegenerateStatistics(
            "combined flat has no positive pixel".to_string(),
        ));
    }

    let mut replaced = 0usize;
    frame.data.mapv_inplace(|v| {
        if v > 0.0 {
            v
        } else {
            replaced += 1;
            min_positive
        }
    });
    if replaced > 0 {
        debug!(replaced, min_positive, "Clamped non-positive flat pixels");
    }
    Ok(frame)
}

/// `frame - bias - dark`, skipping whichever reference is absent.
pub fn subtract_references(
    frame: &Frame,
    bias: Option<&Frame>,
    dark: Option<&Frame>,
) -> Result<Frame> {
    let mut out = frame.clone();
    for reference in [bias, dark].into_iter().flatten() {
        frame.ensure_same_shape(reference)?;
        out.data -= &reference.data;
    }
    Ok(out)
}

/// Apply an independent per-frame correction, in parallel for larger stacks.
/// The first failure aborts the whole stack.
fn correct_each<F>(frames: &[Frame], correct: F) -> Result<Vec<Frame>>
where
    F: Fn(&Frame) -> Result<Frame> + Sync,
{
    ensure_uniform_shape(frames)?;
    if frames.len() >= PARALLEL_FRAME_THRESHOLD {
        frames.par_iter().map(&correct).collect()
    } else {
        frames.iter().map(&correct).collect()
    }
}
