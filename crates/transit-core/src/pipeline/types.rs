use crate::detection::SourcePosition;
use crate::lightcurve::{FramePhotometry, LightCurve};

/// Pipeline processing stage, used for progress reporting.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum PipelineStage {
    Calibration,
    Detection,
    Photometry,
    LightCurve,
}

impl std::fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Calibration => write!(f, "Building master frames"),
            Self::Detection => write!(f, "Detecting sources"),
            Self::Photometry => write!(f, "Measuring frames"),
            Self::LightCurve => write!(f, "Assembling light curve"),
        }
    }
}

/// Everything produced by a photometry run.
#[derive(Clone, Debug, Default)]
pub struct PhotometryRun {
    /// Reference catalog; index `i` names the same star in every frame.
    pub catalog: Vec<SourcePosition>,
    /// Per-frame measurements for the frames that processed cleanly.
    pub frames: Vec<FramePhotometry>,
    /// Indices of science frames that failed and were left out.
    pub failed_frames: Vec<usize>,
    /// Differential light curve, when a target and comparisons were usable.
    pub light_curve: Option<LightCurve>,
}

/// Thread-safe progress reporting for the pipeline.
///
/// Implementors can use this to drive progress bars, logging, or any other
/// UI feedback. All methods have default no-op implementations.
pub trait ProgressReporter: Send + Sync {
    /// A new pipeline stage has started. `total_items` is the number of
    /// work items in this stage (e.g., frame count), if known.
    fn begin_stage(&self, _stage: PipelineStage, _total_items: Option<usize>) {}

    /// One work item within the current stage has completed.
    fn advance(&self, _items_done: usize) {}

    /// The current stage is finished.
    fn finish_stage(&self) {}
}

/// Progress reporter that ignores every event.
pub struct NoOpReporter;
impl ProgressReporter for NoOpReporter {}
