//! Circular-aperture photometry with a sky annulus.

use std::io::{BufRead, Write};

use ndarray::Array2;
use rayon::prelude::*;
use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::cache::Artifact;
use crate::consts::{DEFAULT_APERTURE_RADIUS, DEFAULT_GAIN, DEFAULT_SKY_INNER, DEFAULT_SKY_OUTER};
use crate::detection::SourcePosition;
use crate::error::Result;
use crate::frame::Frame;
use crate::io::table::{read_table, write_table};
use crate::stack::sigma_clip::SigmaClipParams;
use crate::stats::sigma_clip_in_place;

/// Sky annulus radii, in pixels.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct SkyAnnulus {
    pub inner: f64,
    pub outer: f64,
}

impl Default for SkyAnnulus {
    fn default() -> Self {
        Self {
            inner: DEFAULT_SKY_INNER,
            outer: DEFAULT_SKY_OUTER,
        }
    }
}

/// Aperture photometry settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ApertureConfig {
    /// Aperture radius in pixels; pixels whose centre lies within it count.
    pub radius: f64,
    /// Local sky estimate. `None` measures raw aperture sums.
    pub sky: Option<SkyAnnulus>,
    /// Detector gain in electrons per ADU, for the Poisson term.
    pub gain: f64,
    /// Pixels at or above this level mark the measurement as saturated.
    pub saturation: Option<f32>,
    /// Clipping applied to the annulus pixels.
    pub sky_clip: SigmaClipParams,
}

impl Default for ApertureConfig {
    fn default() -> Self {
        Self {
            radius: DEFAULT_APERTURE_RADIUS,
            sky: Some(SkyAnnulus::default()),
            gain: DEFAULT_GAIN,
            saturation: None,
            sky_clip: SigmaClipParams::default(),
        }
    }
}

/// Quality flags attached to a measurement.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct MeasurementFlags {
    /// Aperture or annulus extended past the frame edge.
    pub clipped: bool,
    /// At least one aperture pixel reached the saturation level.
    pub saturated: bool,
}

/// Flux of one source in one frame.
#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct PhotometricMeasurement {
    pub position: SourcePosition,
    /// Sky-subtracted aperture sum, in ADU.
    pub flux: f64,
    /// 1-sigma uncertainty of `flux`.
    pub flux_err: f64,
    /// Per-pixel sky level.
    pub sky: f64,
    /// Per-pixel sky scatter.
    pub sky_err: f64,
    /// Number of in-frame pixels summed.
    pub aperture_pixels: usize,
    pub flags: MeasurementFlags,
}

impl PhotometricMeasurement {
    /// Whether the measurement can be used for relative photometry.
    pub fn is_valid(&self) -> bool {
        !self.flags.clipped
            && !self.flags.saturated
            && self.flux.is_finite()
            && self.flux_err.is_finite()
            && self.flux > 0.0
    }
}

/// Measure every position on one calibrated frame. Output order matches
/// `positions`; edge problems are flagged, never fatal.
pub fn measure_frame(
    frame: &Frame,
    positions: &[SourcePosition],
    config: &ApertureConfig,
) -> Vec<PhotometricMeasurement> {
    let measurements: Vec<PhotometricMeasurement> = positions
        .par_iter()
        .map(|pos| measure_source(&frame.data, pos, config))
        .collect();

    let flagged = measurements.iter().filter(|m| !m.is_valid()).count();
    debug!(
        frame = frame.metadata.frame_index,
        sources = measurements.len(),
        flagged,
        "Aperture photometry"
    );
    measurements
}

/// Measure a single source.
pub fn measure_source(
    data: &Array2<f32>,
    position: &SourcePosition,
    config: &ApertureConfig,
) -> PhotometricMeasurement {
    let (h, w) = data.dim();
    let r2 = config.radius * config.radius;
    let (in2, out2) = config
        .sky
        .map(|a| (a.inner * a.inner, a.outer * a.outer))
        .unwrap_or((f64::INFINITY, f64::NEG_INFINITY));
    let reach = config
        .sky
        .map_or(config.radius, |a| a.outer.max(config.radius));

    let mut flags = MeasurementFlags::default();
    let mut sum = 0.0f64;
    let mut n_pix = 0usize;
    let mut sky_values: Vec<f32> = Vec::new();

    let row_lo = (position.y - reach).floor() as isize;
    let row_hi = (position.y + reach).ceil() as isize;
    let col_lo = (position.x - reach).floor() as isize;
    let col_hi = (position.x + reach).ceil() as isize;

    for row in row_lo..=row_hi {
        for col in col_lo..=col_hi {
            let dx = col as f64 - position.x;
            let dy = row as f64 - position.y;
            let d2 = dx * dx + dy * dy;
            let in_aperture = d2 <= r2;
            let in_annulus = d2 >= in2 && d2 <= out2;
            if !in_aperture && !in_annulus {
                continue;
            }
            if row < 0 || col < 0 || row >= h as isize || col >= w as isize {
                flags.clipped = true;
                continue;
            }

            let v = data[[row as usize, col as usize]];
            if in_aperture {
                sum += v as f64;
                n_pix += 1;
                if config.saturation.is_some_and(|s| v >= s) {
                    flags.saturated = true;
                }
            }
            if in_annulus {
                sky_values.push(v);
            }
        }
    }

    let (sky, sky_err, n_sky) = if sky_values.is_empty() {
        (0.0, 0.0, 0usize)
    } else {
        let stats = sigma_clip_in_place(&mut sky_values, &config.sky_clip);
        (stats.median, stats.std, stats.retained)
    };

    if n_pix == 0 {
        return PhotometricMeasurement {
            position: *position,
            flux: f64::NAN,
            flux_err: f64::NAN,
            sky,
            sky_err,
            aperture_pixels: 0,
            flags,
        };
    }

    let npix = n_pix as f64;
    let flux = sum - npix * sky;
    let mut variance = flux.max(0.0) / config.gain + npix * sky_err * sky_err;
    if n_sky > 0 {
        variance += npix * npix * sky_err * sky_err / n_sky as f64;
    }

    PhotometricMeasurement {
        position: *position,
        flux,
        flux_err: variance.sqrt(),
        sky,
        sky_err,
        aperture_pixels: n_pix,
        flags,
    }
}

const PHOTOMETRY_COLUMNS: usize = 9;

impl Artifact for Vec<PhotometricMeasurement> {
    fn encode<W: Write>(&self, w: &mut W) -> Result<()> {
        write_table(
            w,
            Some("x y flux flux_err sky sky_err aperture_pixels clipped saturated"),
            self.iter().map(|m| {
                vec![
                    m.position.x,
                    m.position.y,
                    m.flux,
                    m.flux_err,
                    m.sky,
                    m.sky_err,
                    m.aperture_pixels as f64,
                    m.flags.clipped as u8 as f64,
                    m.flags.saturated as u8 as f64,
                ]
            }),
        )
    }

    fn decode<R: BufRead>(r: &mut R) -> Result<Self> {
        Ok(read_table(r, PHOTOMETRY_COLUMNS)?
            .into_iter()
            .map(|row| PhotometricMeasurement {
                position: SourcePosition::new(row[0], row[1]),
                flux: row[2],
                flux_err: row[3],
                sky: row[4],
                sky_err: row[5],
                aperture_pixels: row[6] as usize,
                flags: MeasurementFlags {
                    clipped: row[7] != 0.0,
                    saturated: row[8] != 0.0,
                },
            })
            .collect())
    }
}
