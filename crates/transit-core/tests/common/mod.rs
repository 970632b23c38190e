#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};

use ndarray::Array2;
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};

use transit_core::error::Result;
use transit_core::frame::Frame;
use transit_core::io::FrameSource;

/// Constant-valued frame.
pub fn make_frame(h: usize, w: usize, fill: f32) -> Frame {
    Frame::new(Array2::from_elem((h, w), fill))
}

/// Frame of constant background plus uniform noise in `[-amplitude, amplitude]`.
/// The same seed always yields the same frame.
pub fn noisy_frame(h: usize, w: usize, background: f32, amplitude: f32, seed: u64) -> Frame {
    let mut rng = StdRng::seed_from_u64(seed);
    let data = Array2::from_shape_fn((h, w), |_| {
        background + rng.random_range(-amplitude..=amplitude)
    });
    Frame::new(data)
}

/// Add a circular Gaussian of peak height `amplitude` centred on `(x, y)`.
pub fn add_gaussian(frame: &mut Frame, x: f64, y: f64, sigma: f64, amplitude: f64) {
    let reach = (6.0 * sigma).ceil() as isize;
    let (h, w) = frame.shape();
    let (cx, cy) = (x.round() as isize, y.round() as isize);
    for row in (cy - reach).max(0)..=(cy + reach).min(h as isize - 1) {
        for col in (cx - reach).max(0)..=(cx + reach).min(w as isize - 1) {
            let dx = col as f64 - x;
            let dy = row as f64 - y;
            let v = amplitude * (-(dx * dx + dy * dy) / (2.0 * sigma * sigma)).exp();
            frame.data[[row as usize, col as usize]] += v as f32;
        }
    }
}

/// Add a Gaussian whose pixel values sum to `flux`.
pub fn add_star_with_flux(frame: &mut Frame, x: f64, y: f64, sigma: f64, flux: f64) {
    let amplitude = flux / (2.0 * std::f64::consts::PI * sigma * sigma);
    add_gaussian(frame, x, y, sigma, amplitude);
}

/// Gaussian sigma for a given FWHM.
pub fn fwhm_to_sigma(fwhm: f64) -> f64 {
    fwhm / 2.354_820_045
}

/// In-memory frame source that counts how often frames are read.
pub struct CountingSource {
    pub frames: Vec<Frame>,
    pub reads: AtomicUsize,
}

impl CountingSource {
    pub fn new(frames: Vec<Frame>) -> Self {
        Self {
            frames,
            reads: AtomicUsize::new(0),
        }
    }

    pub fn reads(&self) -> usize {
        self.reads.load(Ordering::SeqCst)
    }
}

impl FrameSource for CountingSource {
    fn len(&self) -> usize {
        self.frames.len()
    }

    fn read_frame(&self, index: usize) -> Result<Frame> {
        self.reads.fetch_add(1, Ordering::SeqCst);
        self.frames.read_frame(index)
    }
}
