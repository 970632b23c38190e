//! Master bias/dark/flat synthesis and science-frame reduction.

pub mod master;
pub mod science;
pub mod synthesizer;

pub use master::{clamp_non_positive, combine_bias, combine_dark, combine_flat};
pub use science::CalibrationSet;
pub use synthesizer::CalibrationSynthesizer;
