use std::path::PathBuf;

use serde::{Deserialize, Serialize};

use crate::detection::DetectionConfig;
use crate::lightcurve::{EnsembleStatistic, LightCurveConfig};
use crate::photometry::ApertureConfig;
use crate::recenter::RecenterConfig;
use crate::stack::sigma_clip::SigmaClipParams;

/// Full reduction and photometry configuration, loadable from TOML.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct PipelineConfig {
    #[serde(default)]
    pub inputs: InputConfig,
    #[serde(default)]
    pub output: OutputConfig,
    #[serde(default)]
    pub calibration: CalibrationConfig,
    #[serde(default)]
    pub detection: DetectionConfig,
    #[serde(default)]
    pub recenter: RecenterConfig,
    #[serde(default)]
    pub aperture: ApertureConfig,
    #[serde(default)]
    pub light_curve: LightCurveSettings,
    #[serde(default)]
    pub recompute: RecomputeFlags,
}

/// Raw exposure lists. Empty calibration lists skip that correction.
#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct InputConfig {
    #[serde(default)]
    pub bias: Vec<PathBuf>,
    #[serde(default)]
    pub dark: Vec<PathBuf>,
    #[serde(default)]
    pub flat: Vec<PathBuf>,
    #[serde(default)]
    pub science: Vec<PathBuf>,
    /// Observation times of the science frames, one per file.
    #[serde(default)]
    pub timestamps: Option<Vec<f64>>,
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Directory holding master frames, catalogs, positions and photometry.
    pub cache_dir: PathBuf,
    /// Light-curve table destination.
    pub light_curve: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            cache_dir: PathBuf::from("reduced"),
            light_curve: PathBuf::from("light_curve.dat"),
        }
    }
}

/// Names of the master frames in the cache and the combiner settings.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct CalibrationConfig {
    pub bias_name: String,
    pub dark_name: String,
    pub flat_name: String,
    pub combine: SigmaClipParams,
}

impl Default for CalibrationConfig {
    fn default() -> Self {
        Self {
            bias_name: "MasterBias".to_string(),
            dark_name: "MasterDark".to_string(),
            flat_name: "MasterFlat".to_string(),
            combine: SigmaClipParams::default(),
        }
    }
}

/// Target and comparison-star selection.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCurveSettings {
    /// Index of the science frame sources are detected on.
    pub reference_frame: usize,
    pub target: usize,
    /// Explicit comparison stars; empty picks `auto_references` automatically.
    pub references: Vec<usize>,
    pub auto_references: usize,
    pub ensemble: EnsembleStatistic,
    pub normalize: bool,
}

impl Default for LightCurveSettings {
    fn default() -> Self {
        Self {
            reference_frame: 0,
            target: 0,
            references: Vec::new(),
            auto_references: 5,
            ensemble: EnsembleStatistic::default(),
            normalize: true,
        }
    }
}

impl LightCurveSettings {
    pub fn to_config(&self, references: Vec<usize>) -> LightCurveConfig {
        LightCurveConfig {
            target: self.target,
            references,
            ensemble: self.ensemble,
            normalize: self.normalize,
        }
    }
}

/// Cache bypass switches. Forcing a stage also forces every stage that
/// consumes its output.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RecomputeFlags {
    pub calibration: bool,
    pub detection: bool,
    pub recenter: bool,
    pub photometry: bool,
}

impl RecomputeFlags {
    pub fn all() -> Self {
        Self {
            calibration: true,
            detection: true,
            recenter: true,
            photometry: true,
        }
    }

    pub fn detection(&self) -> bool {
        self.calibration || self.detection
    }

    pub fn recenter(&self) -> bool {
        self.detection() || self.recenter
    }

    pub fn photometry(&self) -> bool {
        self.recenter() || self.photometry
    }
}
