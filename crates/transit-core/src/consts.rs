/// Minimum pixel count (h*w) to use row-level Rayon parallelism.
pub const PARALLEL_PIXEL_THRESHOLD: usize = 65_536;

/// Minimum frame count to use frame-level Rayon parallelism.
pub const PARALLEL_FRAME_THRESHOLD: usize = 4;

/// Small epsilon to avoid division by zero in floating-point comparisons.
pub const EPSILON: f64 = 1e-10;

/// Conversion factor between Gaussian FWHM and sigma (2 * sqrt(2 ln 2)).
pub const FWHM_TO_SIGMA: f64 = 2.354_820_045;

/// Default sigma-clipping rejection threshold, in standard deviations.
pub const DEFAULT_CLIP_SIGMA: f64 = 3.0;

/// Default cap on sigma-clipping iterations.
pub const DEFAULT_CLIP_MAX_ITERATIONS: usize = 5;

/// Fewer samples than this are combined without any rejection.
pub const MIN_CLIP_SAMPLES: usize = 3;

/// Default detection threshold as a multiple of the background noise.
pub const DEFAULT_DETECTION_THRESHOLD_SIGMA: f64 = 20.0;

/// Default expected PSF full width at half maximum, in pixels.
pub const DEFAULT_FWHM: f64 = 3.0;

/// Default margin (pixels) inside which detections near the edge are dropped.
pub const DEFAULT_BORDER_MARGIN: f64 = 150.0;

/// Default DAOFIND-style sharpness acceptance range.
pub const DEFAULT_SHARP_LO: f64 = 0.2;
pub const DEFAULT_SHARP_HI: f64 = 1.0;

/// Default recentering window side length, in pixels.
pub const DEFAULT_RECENTER_BOX: usize = 21;

/// Default recentering iteration cap.
pub const DEFAULT_RECENTER_MAX_ITERATIONS: usize = 10;

/// Default recentering convergence tolerance, in pixels.
pub const DEFAULT_RECENTER_TOLERANCE: f64 = 0.01;

/// Default photometric aperture radius, in pixels.
pub const DEFAULT_APERTURE_RADIUS: f64 = 8.0;

/// Default sky annulus radii, in pixels.
pub const DEFAULT_SKY_INNER: f64 = 12.0;
pub const DEFAULT_SKY_OUTER: f64 = 18.0;

/// Default detector gain in electrons per ADU.
pub const DEFAULT_GAIN: f64 = 1.0;

/// Magic bytes opening a cached binary frame.
pub const FRAME_MAGIC: &[u8; 8] = b"TRNFRM01";
