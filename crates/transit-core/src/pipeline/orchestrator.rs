use std::collections::HashMap;
use std::sync::atomic::{AtomicUsize, Ordering};

use rayon::prelude::*;
use tracing::{info, warn};

use crate::cache::{artifact_key, Artifact, ArtifactKind, ResultCache};
use crate::calibration::{CalibrationSet, CalibrationSynthesizer};
use crate::detection::{detect_sources, SourcePosition};
use crate::error::{Result, TransitError};
use crate::frame::Frame;
use crate::io::source::FrameSource;
use crate::lightcurve::{assemble_light_curve, select_references, FramePhotometry};
use crate::photometry::{measure_frame, PhotometricMeasurement};
use crate::recenter::recenter_positions;

use super::config::PipelineConfig;
use super::types::{NoOpReporter, PhotometryRun, PipelineStage, ProgressReporter};

/// Raw calibration stacks. `None` (or an empty source) skips that master.
#[derive(Clone, Copy, Default)]
pub struct CalibrationSources<'a> {
    pub bias: Option<&'a dyn FrameSource>,
    pub dark: Option<&'a dyn FrameSource>,
    pub flat: Option<&'a dyn FrameSource>,
}

/// Build (or load) the master frames.
///
/// A master that fails to build is logged and left out, so the science
/// frames are reduced without that correction instead of aborting the run.
pub fn build_calibration(
    sources: &CalibrationSources<'_>,
    config: &PipelineConfig,
    cache: &ResultCache,
    reporter: &dyn ProgressReporter,
) -> CalibrationSet {
    let names = &config.calibration;
    let synth = CalibrationSynthesizer::new(
        cache,
        names.combine.clone(),
        config.recompute.calibration,
    );
    reporter.begin_stage(PipelineStage::Calibration, Some(3));

    let bias = sources.bias.filter(|s| !s.is_empty()).and_then(|src| {
        synth
            .build_bias(&names.bias_name, src)
            .map_err(|e| warn!(error = %e, "Master bias unavailable; skipping bias correction"))
            .ok()
    });
    reporter.advance(1);

    let dark = sources.dark.filter(|s| !s.is_empty()).and_then(|src| {
        synth
            .build_dark(&names.dark_name, src, bias.as_ref())
            .map_err(|e| warn!(error = %e, "Master dark unavailable; skipping dark correction"))
            .ok()
    });
    reporter.advance(2);

    let flat = sources.flat.filter(|s| !s.is_empty()).and_then(|src| {
        synth
            .build_flat(&names.flat_name, src, bias.as_ref(), dark.as_ref())
            .map_err(|e| warn!(error = %e, "Master flat unavailable; skipping flat field"))
            .ok()
    });
    reporter.advance(3);
    reporter.finish_stage();

    info!(
        bias = bias.is_some(),
        dark = dark.is_some(),
        flat = flat.is_some(),
        "Calibration set ready"
    );
    CalibrationSet { bias, dark, flat }
}

/// Detect, recenter and measure every science frame, then assemble the
/// light curve.
///
/// Frame names must be unique, as they key the cached artifacts. Only a
/// failure on the reference frame is fatal. Any other frame that
/// cannot be read or measured is logged, listed in `failed_frames` and left
/// out of the light curve.
pub fn run_photometry_reported(
    science: &dyn FrameSource,
    calibration: &CalibrationSet,
    config: &PipelineConfig,
    cache: &ResultCache,
    reporter: &dyn ProgressReporter,
) -> Result<PhotometryRun> {
    if science.is_empty() {
        return Err(TransitError::EmptySequence);
    }
    let settings = &config.light_curve;
    if settings.reference_frame >= science.len() {
        return Err(TransitError::InvalidConfig(format!(
            "reference frame {} out of range ({} science frames)",
            settings.reference_frame,
            science.len()
        )));
    }

    ensure_unique_names(science)?;

    reporter.begin_stage(PipelineStage::Detection, Some(1));
    let catalog_key = artifact_key(&science.name(settings.reference_frame), ArtifactKind::Catalog);
    let catalog: Vec<SourcePosition> =
        cache.get_or_compute(&catalog_key, config.recompute.detection(), || {
            let frame = load_calibrated(science, settings.reference_frame, calibration)?;
            Ok(detect_sources(&frame, &config.detection)?.positions)
        })?;
    reporter.finish_stage();
    info!(sources = catalog.len(), key = %catalog_key, "Reference catalog ready");

    if catalog.is_empty() {
        warn!("No sources detected on the reference frame");
        return Ok(PhotometryRun::default());
    }

    let total = science.len();
    reporter.begin_stage(PipelineStage::Photometry, Some(total));
    let done = AtomicUsize::new(0);
    let results: Vec<Option<FramePhotometry>> = (0..total)
        .into_par_iter()
        .map(|index| {
            let outcome = process_frame(science, index, &catalog, calibration, config, cache);
            reporter.advance(done.fetch_add(1, Ordering::Relaxed) + 1);
            match outcome {
                Ok(frame) => Some(frame),
                Err(e) => {
                    warn!(frame = index, error = %e, "Frame skipped");
                    None
                }
            }
        })
        .collect();
    reporter.finish_stage();

    let failed_frames: Vec<usize> = results
        .iter()
        .enumerate()
        .filter(|(_, r)| r.is_none())
        .map(|(i, _)| i)
        .collect();
    let frames: Vec<FramePhotometry> = results.into_iter().flatten().collect();

    reporter.begin_stage(PipelineStage::LightCurve, None);
    let references = if settings.references.is_empty() {
        select_references(&frames, settings.target, settings.auto_references)
    } else {
        settings.references.clone()
    };
    let light_curve = if settings.target >= catalog.len() {
        warn!(target = settings.target, sources = catalog.len(), "Target not in catalog");
        None
    } else if references.is_empty() {
        warn!("No usable comparison stars; light curve not assembled");
        None
    } else {
        info!(target = settings.target, references = ?references, "Comparison ensemble");
        Some(assemble_light_curve(&frames, &settings.to_config(references))?)
    };
    reporter.finish_stage();

    Ok(PhotometryRun {
        catalog,
        frames,
        failed_frames,
        light_curve,
    })
}

/// [`run_photometry_reported`] without progress reporting.
pub fn run_photometry(
    science: &dyn FrameSource,
    calibration: &CalibrationSet,
    config: &PipelineConfig,
    cache: &ResultCache,
) -> Result<PhotometryRun> {
    run_photometry_reported(science, calibration, config, cache, &NoOpReporter)
}

/// Per-frame cache keys derive from frame names, so two frames sharing a
/// name would share (and lock) the same artifacts.
fn ensure_unique_names(science: &dyn FrameSource) -> Result<()> {
    let mut seen = HashMap::with_capacity(science.len());
    for index in 0..science.len() {
        if let Some(first) = seen.insert(science.name(index), index) {
            return Err(TransitError::InvalidConfig(format!(
                "science frames {first} and {index} are both named {:?}; frame names must be unique",
                science.name(index)
            )));
        }
    }
    Ok(())
}

fn load_calibrated(
    science: &dyn FrameSource,
    index: usize,
    calibration: &CalibrationSet,
) -> Result<Frame> {
    let raw = science.read_frame(index)?;
    calibration.apply(&raw)
}

/// Positions then photometry for one frame, each memoized by frame name.
/// The frame is only read when the photometry has to be recomputed.
fn process_frame(
    science: &dyn FrameSource,
    index: usize,
    catalog: &[SourcePosition],
    calibration: &CalibrationSet,
    config: &PipelineConfig,
    cache: &ResultCache,
) -> Result<FramePhotometry> {
    let name = science.name(index);
    let phot_key = artifact_key(&name, ArtifactKind::Photometry);
    let pos_key = artifact_key(&name, ArtifactKind::Positions);
    let flags = config.recompute;

    let measurements: Vec<PhotometricMeasurement> =
        cached_for_catalog(cache, &phot_key, flags.photometry(), catalog.len(), || {
            let frame = load_calibrated(science, index, calibration)?;
            let positions: Vec<SourcePosition> =
                cached_for_catalog(cache, &pos_key, flags.recenter(), catalog.len(), || {
                    Ok(recenter_positions(&frame, catalog, &config.recenter))
                })?;
            Ok(measure_frame(&frame, &positions, &config.aperture))
        })?;

    Ok(FramePhotometry {
        frame_index: index,
        timestamp: science.timestamp(index),
        measurements,
    })
}

/// Like [`ResultCache::get_or_compute`] for per-source tables, but a cached
/// table whose row count no longer matches the catalog is recomputed.
fn cached_for_catalog<T, F>(
    cache: &ResultCache,
    key: &str,
    force: bool,
    expected: usize,
    compute: F,
) -> Result<Vec<T>>
where
    Vec<T>: Artifact,
    F: FnMut() -> Result<Vec<T>>,
{
    let mut compute = compute;
    let table = cache.get_or_compute(key, force, &mut compute)?;
    if table.len() == expected {
        return Ok(table);
    }
    warn!(key, cached = table.len(), expected, "Stale cached table; recomputing");
    cache.get_or_compute(key, true, &mut compute)
}
