use serde::{Deserialize, Serialize};

use crate::consts::{
    DEFAULT_BORDER_MARGIN, DEFAULT_DETECTION_THRESHOLD_SIGMA, DEFAULT_FWHM, DEFAULT_SHARP_HI,
    DEFAULT_SHARP_LO,
};
use crate::stack::sigma_clip::SigmaClipParams;

/// Configuration for point-source detection on a reference frame.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct DetectionConfig {
    /// Expected PSF full width at half maximum, in pixels.
    #[serde(default = "default_fwhm")]
    pub fwhm: f64,
    /// Peaks must exceed this multiple of the background noise.
    #[serde(default = "default_threshold_sigma")]
    pub threshold_sigma: f64,
    /// Detections closer than this to any edge are discarded.
    #[serde(default = "default_border_margin")]
    pub border_margin: f64,
    /// Lower sharpness bound; rejects extended blobs.
    #[serde(default = "default_sharp_lo")]
    pub sharp_lo: f64,
    /// Upper sharpness bound; rejects hot pixels and cosmic rays.
    #[serde(default = "default_sharp_hi")]
    pub sharp_hi: f64,
    /// Clipping used to estimate sky level and noise.
    #[serde(default)]
    pub background: SigmaClipParams,
}

fn default_fwhm() -> f64 {
    DEFAULT_FWHM
}
fn default_threshold_sigma() -> f64 {
    DEFAULT_DETECTION_THRESHOLD_SIGMA
}
fn default_border_margin() -> f64 {
    DEFAULT_BORDER_MARGIN
}
fn default_sharp_lo() -> f64 {
    DEFAULT_SHARP_LO
}
fn default_sharp_hi() -> f64 {
    DEFAULT_SHARP_HI
}

impl Default for DetectionConfig {
    fn default() -> Self {
        Self {
            fwhm: DEFAULT_FWHM,
            threshold_sigma: DEFAULT_DETECTION_THRESHOLD_SIGMA,
            border_margin: DEFAULT_BORDER_MARGIN,
            sharp_lo: DEFAULT_SHARP_LO,
            sharp_hi: DEFAULT_SHARP_HI,
            background: SigmaClipParams::default(),
        }
    }
}
