//! Differential light curves: target flux relative to a comparison ensemble.

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use crate::error::{Result, TransitError};
use crate::io::table::write_table;
use crate::photometry::PhotometricMeasurement;
use crate::stats::median_f64;

/// Standard error of a median relative to that of a mean, for large
/// Gaussian samples (sqrt(pi / 2)).
const MEDIAN_ERROR_FACTOR: f64 = 1.253_314_137_315_500_3;

/// All measurements of one frame, in catalog order.
#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
pub struct FramePhotometry {
    pub frame_index: usize,
    pub timestamp: Option<f64>,
    pub measurements: Vec<PhotometricMeasurement>,
}

impl FramePhotometry {
    fn valid(&self, source: usize) -> Option<&PhotometricMeasurement> {
        self.measurements.get(source).filter(|m| m.is_valid())
    }
}

/// How per-frame reference fluxes are combined.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum EnsembleStatistic {
    #[default]
    Median,
    Mean,
}

impl std::fmt::Display for EnsembleStatistic {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Median => write!(f, "Median"),
            Self::Mean => write!(f, "Mean"),
        }
    }
}

#[derive(Clone, Debug, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LightCurveConfig {
    /// Catalog index of the target star.
    pub target: usize,
    /// Catalog indices of the comparison stars.
    pub references: Vec<usize>,
    pub ensemble: EnsembleStatistic,
    /// Divide the curve by its median relative flux.
    pub normalize: bool,
}

impl Default for LightCurveConfig {
    fn default() -> Self {
        Self {
            target: 0,
            references: Vec::new(),
            ensemble: EnsembleStatistic::default(),
            normalize: true,
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Serialize, Deserialize)]
pub struct LightCurvePoint {
    pub frame_index: usize,
    /// Observation time, or the frame index when timestamps are unknown.
    pub time: f64,
    pub flux: f64,
    pub flux_err: f64,
    /// Comparison stars that contributed in this frame.
    pub references_used: usize,
}

#[derive(Clone, Debug, Default, PartialEq, Serialize, Deserialize)]
pub struct LightCurve {
    pub target: usize,
    pub points: Vec<LightCurvePoint>,
}

impl LightCurve {
    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    /// Write `time flux flux_err` rows for external plotting.
    pub fn write_table(&self, path: &Path) -> Result<()> {
        let mut w = BufWriter::new(File::create(path)?);
        write_table(
            &mut w,
            Some("time flux flux_err"),
            self.points.iter().map(|p| vec![p.time, p.flux, p.flux_err]),
        )?;
        w.flush()?;
        Ok(())
    }
}

/// Build the relative light curve of `config.target`.
///
/// Every comparison star is first given a weight: its flux relative to the
/// mean comparison flux of the same frame, medianed over all frames. Ratios
/// taken within one frame do not change when that frame's transparency does,
/// so dimming one frame only rescales that frame's ensemble. In each frame
/// the weighted fluxes of the comparisons that measured cleanly are combined
/// into an ensemble, and the target flux is divided by it. A comparison with
/// a bad measurement is dropped for that frame only; a frame is dropped when
/// the target itself is bad or no comparison survives.
pub fn assemble_light_curve(
    frames: &[FramePhotometry],
    config: &LightCurveConfig,
) -> Result<LightCurve> {
    validate(frames, config)?;
    if frames.is_empty() {
        return Ok(LightCurve {
            target: config.target,
            points: Vec::new(),
        });
    }

    let scales = relative_weights(frames, &config.references);
    for (&r, &scale) in config.references.iter().zip(&scales) {
        if !usable_scale(scale) {
            warn!(reference = r, "Comparison star never measured cleanly");
        }
    }

    let mut points = Vec::with_capacity(frames.len());
    for frame in frames {
        let Some(target) = frame.valid(config.target) else {
            debug!(frame = frame.frame_index, "Target measurement unusable; frame skipped");
            continue;
        };

        let mut scaled = Vec::with_capacity(config.references.len());
        let mut frac_var = 0.0;
        for (&r, &scale) in config.references.iter().zip(&scales) {
            if !usable_scale(scale) {
                continue;
            }
            if let Some(m) = frame.valid(r) {
                scaled.push(m.flux / scale);
                frac_var += (m.flux_err / m.flux).powi(2);
            }
        }
        if scaled.is_empty() {
            debug!(frame = frame.frame_index, "No usable comparison star; frame skipped");
            continue;
        }

        let n = scaled.len() as f64;
        let ensemble = match config.ensemble {
            EnsembleStatistic::Median => median_f64(&scaled),
            EnsembleStatistic::Mean => scaled.iter().sum::<f64>() / n,
        };
        let mut ensemble_frac = frac_var.sqrt() / n;
        if config.ensemble == EnsembleStatistic::Median && scaled.len() > 2 {
            ensemble_frac *= MEDIAN_ERROR_FACTOR;
        }
        let relative = target.flux / ensemble;
        let target_frac = target.flux_err / target.flux;

        points.push(LightCurvePoint {
            frame_index: frame.frame_index,
            time: frame.timestamp.unwrap_or(frame.frame_index as f64),
            flux: relative,
            flux_err: relative * (target_frac.powi(2) + ensemble_frac.powi(2)).sqrt(),
            references_used: scaled.len(),
        });
    }

    if config.normalize {
        let level = median_f64(&points.iter().map(|p| p.flux).collect::<Vec<_>>());
        if level > 0.0 {
            for p in &mut points {
                p.flux /= level;
                p.flux_err /= level;
            }
        }
    }

    if frames.iter().all(|f| f.timestamp.is_some()) {
        points.sort_by(|a, b| a.time.total_cmp(&b.time));
    } else {
        for p in &mut points {
            p.time = p.frame_index as f64;
        }
        points.sort_by_key(|p| p.frame_index);
    }

    info!(
        target = config.target,
        frames = frames.len(),
        points = points.len(),
        "Light curve assembled"
    );

    Ok(LightCurve {
        target: config.target,
        points,
    })
}

/// Weight of each comparison star: the median over frames of its flux
/// divided by the mean flux of the comparisons valid in that frame.
fn relative_weights(frames: &[FramePhotometry], references: &[usize]) -> Vec<f64> {
    let mut ratios = vec![Vec::with_capacity(frames.len()); references.len()];
    for frame in frames {
        let fluxes: Vec<Option<f64>> = references
            .iter()
            .map(|&r| frame.valid(r).map(|m| m.flux))
            .collect();
        let valid: Vec<f64> = fluxes.iter().flatten().copied().collect();
        if valid.is_empty() {
            continue;
        }
        let level = valid.iter().sum::<f64>() / valid.len() as f64;
        if !usable_scale(level) {
            continue;
        }
        for (slot, flux) in ratios.iter_mut().zip(&fluxes) {
            if let Some(flux) = flux {
                slot.push(flux / level);
            }
        }
    }
    ratios.iter().map(|r| median_f64(r)).collect()
}

fn usable_scale(scale: f64) -> bool {
    scale.is_finite() && scale > 0.0
}

fn validate(frames: &[FramePhotometry], config: &LightCurveConfig) -> Result<()> {
    if config.references.is_empty() {
        return Err(TransitError::InvalidConfig(
            "at least one comparison star is required".to_string(),
        ));
    }
    if config.references.contains(&config.target) {
        return Err(TransitError::InvalidConfig(format!(
            "target {} is also listed as a comparison star",
            config.target
        )));
    }
    let sources = frames
        .iter()
        .map(|f| f.measurements.len())
        .max()
        .unwrap_or(0);
    if frames.is_empty() {
        return Ok(());
    }
    if let Some(&bad) = std::iter::once(&config.target)
        .chain(&config.references)
        .find(|&&i| i >= sources)
    {
        return Err(TransitError::InvalidConfig(format!(
            "source index {bad} out of range ({sources} sources measured)"
        )));
    }
    Ok(())
}

/// Pick up to `count` comparison stars: the brightest sources (by median
/// flux) that measured cleanly in every frame, excluding the target.
pub fn select_references(frames: &[FramePhotometry], target: usize, count: usize) -> Vec<usize> {
    let sources = frames
        .iter()
        .map(|f| f.measurements.len())
        .min()
        .unwrap_or(0);

    let mut candidates: Vec<(usize, f64)> = (0..sources)
        .filter(|&i| i != target)
        .filter(|&i| frames.iter().all(|f| f.valid(i).is_some()))
        .map(|i| {
            let fluxes: Vec<f64> = frames.iter().map(|f| f.measurements[i].flux).collect();
            (i, median_f64(&fluxes))
        })
        .collect();

    candidates.sort_by(|a, b| b.1.total_cmp(&a.1).then(a.0.cmp(&b.0)));
    candidates.into_iter().take(count).map(|(i, _)| i).collect()
}
