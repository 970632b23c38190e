use ndarray::Array2;

use crate::error::{Result, TransitError};

/// A single grayscale exposure.
/// Pixel values are f32 in raw detector units (ADU), not normalized.
#[derive(Clone, Debug, PartialEq)]
pub struct Frame {
    /// Pixel data, row-major, shape = (height, width)
    pub data: Array2<f32>,
    /// Optional per-frame metadata
    pub metadata: FrameMetadata,
}

impl Frame {
    pub fn new(data: Array2<f32>) -> Self {
        Self {
            data,
            metadata: FrameMetadata::default(),
        }
    }

    pub fn width(&self) -> usize {
        self.data.ncols()
    }

    pub fn height(&self) -> usize {
        self.data.nrows()
    }

    /// `(height, width)`, the same ordering as `Array2::dim`.
    pub fn shape(&self) -> (usize, usize) {
        self.data.dim()
    }

    /// Fail with `ShapeMismatch` unless `other` has this frame's shape.
    pub fn ensure_same_shape(&self, other: &Frame) -> Result<()> {
        if self.shape() != other.shape() {
            return Err(TransitError::ShapeMismatch {
                expected: self.shape(),
                found: other.shape(),
            });
        }
        Ok(())
    }
}

#[derive(Clone, Debug, Default, PartialEq)]
pub struct FrameMetadata {
    pub frame_index: usize,
    /// Observation time (any monotonic unit, e.g. JD or seconds).
    pub timestamp: Option<f64>,
    /// Source image name, used to derive cache keys.
    pub name: Option<String>,
}

/// Check that every frame in a stack shares the first frame's shape.
pub fn ensure_uniform_shape(frames: &[Frame]) -> Result<(usize, usize)> {
    let first = frames.first().ok_or(TransitError::EmptySequence)?;
    for frame in &frames[1..] {
        first.ensure_same_shape(frame)?;
    }
    Ok(first.shape())
}
