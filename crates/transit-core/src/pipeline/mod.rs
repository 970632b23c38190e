pub mod config;
mod orchestrator;
mod types;

pub use config::{PipelineConfig, RecomputeFlags};
pub use orchestrator::{
    build_calibration, run_photometry, run_photometry_reported, CalibrationSources,
};
pub use types::{NoOpReporter, PhotometryRun, PipelineStage, ProgressReporter};
