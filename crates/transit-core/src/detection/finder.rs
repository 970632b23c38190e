use ndarray::Array2;
use tracing::{debug, info};

use crate::error::{Result, TransitError};
use crate::frame::Frame;
use crate::stats::sigma_clipped_stats;

use super::catalog::{SourceCatalog, SourcePosition};
use super::config::DetectionConfig;
use super::kernel::MatchedKernel;

/// Detect point sources on a reference frame.
///
/// Pipeline: sigma-clipped sky and noise -> matched filter -> local maxima
/// above `threshold_sigma * noise` -> sharpness cut -> weighted centroid ->
/// border margin cut. The output is in raster order of the peaks and is
/// fully determined by the frame and the configuration.
pub fn detect_sources(frame: &Frame, config: &DetectionConfig) -> Result<SourceCatalog> {
    if config.fwhm <= 0.0 || !config.fwhm.is_finite() {
        return Err(TransitError::InvalidConfig(format!(
            "fwhm must be positive, got {}",
            config.fwhm
        )));
    }

    let (h, w) = frame.shape();
    let pixels: Vec<f32> = frame.data.iter().copied().collect();
    let sky = sigma_clipped_stats(&pixels, &config.background);
    if sky.retained == 0 {
        return Ok(SourceCatalog::default());
    }
    let background = sky.median;
    let noise = sky.std;
    let threshold = config.threshold_sigma * noise;

    let kernel = MatchedKernel::new(config.fwhm);
    let subtracted = frame.data.mapv(|v| v - background as f32);
    let response = kernel.convolve(&subtracted);
    let offsets = kernel.offsets();

    let peaks = find_peaks(&response, kernel.radius, threshold, &offsets);
    debug!(peaks = peaks.len(), threshold, "Matched-filter peaks");

    let mut positions = Vec::new();
    let mut rejected_sharpness = 0usize;
    for (row, col) in peaks {
        let sharp = sharpness(&subtracted, &response, row, col, &offsets);
        if sharp < config.sharp_lo || sharp > config.sharp_hi {
            rejected_sharpness += 1;
            continue;
        }
        let pos = footprint_centroid(&subtracted, row, col, &offsets);
        if inside_margin(&pos, w, h, config.border_margin) {
            positions.push(pos);
        }
    }

    info!(
        sources = positions.len(),
        rejected_sharpness,
        background,
        noise,
        "Source detection complete"
    );

    Ok(SourceCatalog {
        positions,
        background,
        noise,
        threshold,
    })
}

/// Local maxima of the filter response above `threshold`. A peak must not
/// be exceeded anywhere in its footprint; equal values resolve to the one
/// earliest in raster order.
fn find_peaks(
    response: &Array2<f32>,
    radius: usize,
    threshold: f64,
    offsets: &[(isize, isize)],
) -> Vec<(usize, usize)> {
    let (h, w) = response.dim();
    let mut peaks = Vec::new();
    if h <= 2 * radius || w <= 2 * radius {
        return peaks;
    }
    let (lo_r, hi_r) = (radius as isize, (h - radius) as isize);
    let (lo_c, hi_c) = (radius as isize, (w - radius) as isize);

    for row in radius..h - radius {
        for col in radius..w - radius {
            let v = response[[row, col]];
            if (v as f64) <= threshold {
                continue;
            }
            let is_peak = offsets.iter().all(|&(dr, dc)| {
                if dr == 0 && dc == 0 {
                    return true;
                }
                let (nr, nc) = (row as isize + dr, col as isize + dc);
                if nr < lo_r || nr >= hi_r || nc < lo_c || nc >= hi_c {
                    return true;
                }
                let n = response[[nr as usize, nc as usize]];
                let earlier = dr < 0 || (dr == 0 && dc < 0);
                if earlier {
                    n < v
                } else {
                    n <= v
                }
            });
            if is_peak {
                peaks.push((row, col));
            }
        }
    }
    peaks
}

/// DAOFIND sharpness: central pixel minus the mean of the rest of the
/// footprint, relative to the filter amplitude. Roughly 0.6 for a
/// well-sampled star and well above 1 for a single hot pixel.
fn sharpness(
    data: &Array2<f32>,
    response: &Array2<f32>,
    row: usize,
    col: usize,
    offsets: &[(isize, isize)],
) -> f64 {
    let amplitude = response[[row, col]] as f64;
    if amplitude <= 0.0 {
        return f64::NAN;
    }
    let mut sum = 0.0;
    let mut n = 0usize;
    for &(dr, dc) in offsets {
        if dr == 0 && dc == 0 {
            continue;
        }
        sum += data[[(row as isize + dr) as usize, (col as isize + dc) as usize]] as f64;
        n += 1;
    }
    let centre = data[[row, col]] as f64;
    (centre - sum / n.max(1) as f64) / amplitude
}

fn footprint_centroid(
    data: &Array2<f32>,
    row: usize,
    col: usize,
    offsets: &[(isize, isize)],
) -> SourcePosition {
    let mut sum_w = 0.0;
    let mut sum_x = 0.0;
    let mut sum_y = 0.0;
    for &(dr, dc) in offsets {
        let v = data[[(row as isize + dr) as usize, (col as isize + dc) as usize]] as f64;
        if v > 0.0 {
            sum_w += v;
            sum_x += dc as f64 * v;
            sum_y += dr as f64 * v;
        }
    }
    if sum_w > 0.0 {
        SourcePosition::new(col as f64 + sum_x / sum_w, row as f64 + sum_y / sum_w)
    } else {
        SourcePosition::new(col as f64, row as f64)
    }
}

fn inside_margin(pos: &SourcePosition, width: usize, height: usize, margin: f64) -> bool {
    pos.x > margin
        && pos.x < width as f64 - margin
        && pos.y > margin
        && pos.y < height as f64 - margin
}
