use thiserror::Error;

#[derive(Error, Debug)]
pub enum TransitError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Image format error: {0}")]
    Image(#[from] image::ImageError),

    #[error("Unreadable input frame {name}: {reason}")]
    UnreadableInput { name: String, reason: String },

    #[error("Frame index {index} out of range (total: {total})")]
    FrameIndexOutOfRange { index: usize, total: usize },

    #[error("Empty frame sequence")]
    EmptySequence,

    #[error("Frame shape mismatch: expected {expected:?}, found {found:?}")]
    ShapeMismatch {
        expected: (usize, usize),
        found: (usize, usize),
    },

    #[error("Degenerate statistics: {0}")]
    DegenerateStatistics(String),

    #[error("Invalid cached artifact: {0}")]
    InvalidArtifact(String),

    #[error("Invalid configuration: {0}")]
    InvalidConfig(String),
}

pub type Result<T> = std::result::Result<T, TransitError>;
