pub mod sigma_clip;

pub use sigma_clip::{sigma_clip_stack, CentralEstimator, CombinedFrame, SigmaClipParams};
