//! Lazy access to frame stacks.
//!
//! Builders take a [`FrameSource`] instead of materialized frames so that a
//! cache hit never has to read the raw exposures.

use std::path::PathBuf;

use crate::error::{Result, TransitError};
use crate::frame::Frame;
use crate::io::image_io::load_image;

/// An ordered, random-access sequence of frames.
pub trait FrameSource: Sync {
    /// Number of frames in the sequence.
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Read one frame. Implementations fill in `metadata.frame_index`.
    fn read_frame(&self, index: usize) -> Result<Frame>;

    /// Stable identity of a frame, used to derive cache keys.
    fn name(&self, index: usize) -> String {
        format!("frame{index:05}")
    }

    /// Observation time of a frame, if known without reading pixels.
    fn timestamp(&self, _index: usize) -> Option<f64> {
        None
    }

    /// Read every frame, failing on the first unreadable one.
    fn read_all(&self) -> Result<Vec<Frame>> {
        (0..self.len()).map(|i| self.read_frame(i)).collect()
    }
}

impl FrameSource for Vec<Frame> {
    fn len(&self) -> usize {
        self.as_slice().len()
    }

    fn read_frame(&self, index: usize) -> Result<Frame> {
        let mut frame = self
            .get(index)
            .cloned()
            .ok_or(TransitError::FrameIndexOutOfRange {
                index,
                total: self.as_slice().len(),
            })?;
        frame.metadata.frame_index = index;
        Ok(frame)
    }

    fn timestamp(&self, index: usize) -> Option<f64> {
        self.get(index).and_then(|f| f.metadata.timestamp)
    }

    fn name(&self, index: usize) -> String {
        self.get(index)
            .and_then(|f| f.metadata.name.clone())
            .unwrap_or_else(|| format!("frame{index:05}"))
    }
}

/// Image files on disk, read on demand.
#[derive(Clone, Debug, Default)]
pub struct ImageSequence {
    pub paths: Vec<PathBuf>,
    /// Observation times, one per path, when known.
    pub timestamps: Option<Vec<f64>>,
}

impl ImageSequence {
    pub fn new(paths: Vec<PathBuf>) -> Self {
        Self {
            paths,
            timestamps: None,
        }
    }

    pub fn with_timestamps(mut self, timestamps: Vec<f64>) -> Result<Self> {
        if timestamps.len() != self.paths.len() {
            return Err(TransitError::InvalidConfig(format!(
                "{} timestamps supplied for {} images",
                timestamps.len(),
                self.paths.len()
            )));
        }
        self.timestamps = Some(timestamps);
        Ok(self)
    }
}

impl FrameSource for ImageSequence {
    fn len(&self) -> usize {
        self.paths.len()
    }

    fn read_frame(&self, index: usize) -> Result<Frame> {
        let path = self
            .paths
            .get(index)
            .ok_or(TransitError::FrameIndexOutOfRange {
                index,
                total: self.paths.len(),
            })?;
        let mut frame = load_image(path).map_err(|e| TransitError::UnreadableInput {
            name: path.display().to_string(),
            reason: e.to_string(),
        })?;
        frame.metadata.frame_index = index;
        frame.metadata.timestamp = self.timestamp(index);
        Ok(frame)
    }

    fn timestamp(&self, index: usize) -> Option<f64> {
        self.timestamps
            .as_ref()
            .and_then(|t| t.get(index).copied())
    }

    fn name(&self, index: usize) -> String {
        self.paths
            .get(index)
            .and_then(|p| p.file_name())
            .map(|n| n.to_string_lossy().into_owned())
            .unwrap_or_else(|| format!("frame{index:05}"))
    }
}
