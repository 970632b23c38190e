use approx::assert_abs_diff_eq;

use transit_core::detection::SourcePosition;
use transit_core::error::TransitError;
use transit_core::lightcurve::{
    assemble_light_curve, select_references, EnsembleStatistic, FramePhotometry, LightCurveConfig,
};
use transit_core::photometry::{MeasurementFlags, PhotometricMeasurement};

// ---------------------------------------------------------------------------
// Helpers
// ---------------------------------------------------------------------------

fn measurement(flux: f64) -> PhotometricMeasurement {
    PhotometricMeasurement {
        position: SourcePosition::default(),
        flux,
        flux_err: flux.abs().sqrt(),
        sky: 100.0,
        sky_err: 1.0,
        aperture_pixels: 200,
        flags: MeasurementFlags::default(),
    }
}

fn frame(index: usize, time: Option<f64>, fluxes: &[f64]) -> FramePhotometry {
    FramePhotometry {
        frame_index: index,
        timestamp: time,
        measurements: fluxes.iter().map(|&f| measurement(f)).collect(),
    }
}

fn config(references: Vec<usize>) -> LightCurveConfig {
    LightCurveConfig {
        target: 0,
        references,
        ..Default::default()
    }
}

/// Five frames: constant target and references, with a 1% dip in frame 2.
fn transit_frames() -> Vec<FramePhotometry> {
    (0..5)
        .map(|i| {
            let target = if i == 2 { 9_900.0 } else { 10_000.0 };
            frame(i, Some(100.0 + i as f64), &[target, 20_000.0, 5_000.0, 40_000.0])
        })
        .collect()
}

// ---------------------------------------------------------------------------
// assemble_light_curve
// ---------------------------------------------------------------------------

#[test]
fn test_constant_star_normalizes_to_one() {
    let frames: Vec<FramePhotometry> = (0..5)
        .map(|i| frame(i, None, &[10_000.0, 20_000.0, 5_000.0]))
        .collect();
    let curve = assemble_light_curve(&frames, &config(vec![1, 2])).unwrap();
    assert_eq!(curve.len(), 5);
    for p in &curve.points {
        assert_abs_diff_eq!(p.flux, 1.0, epsilon = 1e-12);
        assert_eq!(p.references_used, 2);
    }
}

#[test]
fn test_transit_dip_preserved() {
    let curve = assemble_light_curve(&transit_frames(), &config(vec![1, 2, 3])).unwrap();
    assert_abs_diff_eq!(curve.points[2].flux, 0.99, epsilon = 1e-9);
    assert_abs_diff_eq!(curve.points[0].flux, 1.0, epsilon = 1e-9);
}

#[test]
fn test_transparency_loss_cancels() {
    let base = transit_frames();
    let mut dimmed = base.clone();
    for m in &mut dimmed[3].measurements {
        m.flux *= 0.7;
        m.flux_err *= 0.7;
    }
    for ensemble in [EnsembleStatistic::Median, EnsembleStatistic::Mean] {
        let cfg = LightCurveConfig {
            ensemble,
            ..config(vec![1, 2, 3])
        };
        let a = assemble_light_curve(&base, &cfg).unwrap();
        let b = assemble_light_curve(&dimmed, &cfg).unwrap();
        assert_abs_diff_eq!(a.points[3].flux, b.points[3].flux, epsilon = 1e-9);
    }
}

#[test]
fn test_transparency_loss_cancels_with_varying_references() {
    let base = vec![
        frame(0, None, &[50.0, 100.0, 200.0]),
        frame(1, None, &[55.0, 110.0, 190.0]),
        frame(2, None, &[60.0, 120.0, 180.0]),
        frame(3, None, &[52.0, 95.0, 210.0]),
    ];
    for dimmed_frame in [0, 2] {
        let mut dimmed = base.clone();
        for m in &mut dimmed[dimmed_frame].measurements {
            m.flux *= 0.5;
            m.flux_err *= 0.5;
        }
        for normalize in [false, true] {
            for ensemble in [EnsembleStatistic::Median, EnsembleStatistic::Mean] {
                let cfg = LightCurveConfig {
                    ensemble,
                    normalize,
                    ..config(vec![1, 2])
                };
                let a = assemble_light_curve(&base, &cfg).unwrap();
                let b = assemble_light_curve(&dimmed, &cfg).unwrap();
                assert_eq!(a.len(), b.len());
                for (pa, pb) in a.points.iter().zip(&b.points) {
                    assert_abs_diff_eq!(pa.flux, pb.flux, epsilon = 1e-9);
                    assert_abs_diff_eq!(pa.flux_err, pb.flux_err, epsilon = 1e-9);
                }
            }
        }
    }
}

#[test]
fn test_unnormalized_ratio_against_reference_mean() {
    let frames: Vec<FramePhotometry> = (0..3)
        .map(|i| frame(i, None, &[10_000.0, 20_000.0, 5_000.0]))
        .collect();
    let cfg = LightCurveConfig {
        normalize: false,
        ..config(vec![1, 2])
    };
    let curve = assemble_light_curve(&frames, &cfg).unwrap();
    // Weights 1.6 and 0.4 map both references onto their mean of 12500.
    for p in &curve.points {
        assert_abs_diff_eq!(p.flux, 0.8, epsilon = 1e-12);
        assert!(p.flux_err > 0.0);
    }
}

#[test]
fn test_median_ensemble_error_exceeds_mean_error() {
    let frames: Vec<FramePhotometry> = (0..3)
        .map(|i| frame(i, None, &[10_000.0, 20_000.0, 20_000.0, 20_000.0]))
        .collect();
    let err_for = |ensemble, references: Vec<usize>| {
        let cfg = LightCurveConfig {
            ensemble,
            normalize: false,
            ..config(references)
        };
        assemble_light_curve(&frames, &cfg).unwrap().points[0].flux_err
    };

    let median = err_for(EnsembleStatistic::Median, vec![1, 2, 3]);
    let mean = err_for(EnsembleStatistic::Mean, vec![1, 2, 3]);
    assert!(median > mean);

    // With two comparisons the median is the mean.
    let median = err_for(EnsembleStatistic::Median, vec![1, 2]);
    let mean = err_for(EnsembleStatistic::Mean, vec![1, 2]);
    assert_abs_diff_eq!(median, mean, epsilon = 1e-15);
}

#[test]
fn test_invalid_reference_dropped_for_that_frame() {
    let mut frames = transit_frames();
    frames[1].measurements[2].flags.clipped = true;
    let curve = assemble_light_curve(&frames, &config(vec![1, 2, 3])).unwrap();
    assert_eq!(curve.len(), 5);
    assert_eq!(curve.points[1].references_used, 2);
    assert_eq!(curve.points[0].references_used, 3);
    assert_abs_diff_eq!(curve.points[1].flux, 1.0, epsilon = 1e-9);
}

#[test]
fn test_invalid_target_drops_frame() {
    let mut frames = transit_frames();
    frames[4].measurements[0].flags.saturated = true;
    frames[0].measurements[0].flux = f64::NAN;
    let curve = assemble_light_curve(&frames, &config(vec![1, 2])).unwrap();
    let indices: Vec<usize> = curve.points.iter().map(|p| p.frame_index).collect();
    assert_eq!(indices, vec![1, 2, 3]);
}

#[test]
fn test_frame_without_usable_reference_dropped() {
    let mut frames = transit_frames();
    frames[2].measurements[1].flags.clipped = true;
    let curve = assemble_light_curve(&frames, &config(vec![1])).unwrap();
    assert_eq!(curve.len(), 4);
    assert!(curve.points.iter().all(|p| p.frame_index != 2));
}

#[test]
fn test_ordered_by_timestamp() {
    let mut frames = transit_frames();
    frames.reverse();
    frames[0].timestamp = Some(50.0);
    let curve = assemble_light_curve(&frames, &config(vec![1, 2])).unwrap();
    let times: Vec<f64> = curve.points.iter().map(|p| p.time).collect();
    let mut sorted = times.clone();
    sorted.sort_by(|a, b| a.total_cmp(b));
    assert_eq!(times, sorted);
    assert_eq!(curve.points[0].frame_index, 4);
}

#[test]
fn test_missing_timestamps_fall_back_to_frame_index() {
    let mut frames = transit_frames();
    frames[1].timestamp = None;
    frames.swap(0, 3);
    let curve = assemble_light_curve(&frames, &config(vec![1, 2])).unwrap();
    for (i, p) in curve.points.iter().enumerate() {
        assert_eq!(p.frame_index, i);
        assert_eq!(p.time, i as f64);
    }
}

#[test]
fn test_empty_frames_give_empty_curve() {
    let curve = assemble_light_curve(&[], &config(vec![1])).unwrap();
    assert!(curve.is_empty());
    assert_eq!(curve.target, 0);
}

#[test]
fn test_rejects_bad_configs() {
    let frames = transit_frames();

    let err = assemble_light_curve(&frames, &config(vec![])).unwrap_err();
    assert!(matches!(err, TransitError::InvalidConfig(_)));

    let err = assemble_light_curve(&frames, &config(vec![0, 1])).unwrap_err();
    assert!(matches!(err, TransitError::InvalidConfig(_)));

    let err = assemble_light_curve(&frames, &config(vec![1, 9])).unwrap_err();
    assert!(matches!(err, TransitError::InvalidConfig(_)));
}

#[test]
fn test_write_table() {
    let dir = tempfile::TempDir::new().unwrap();
    let path = dir.path().join("lc.dat");
    let curve = assemble_light_curve(&transit_frames(), &config(vec![1, 2, 3])).unwrap();
    curve.write_table(&path).unwrap();

    let text = std::fs::read_to_string(&path).unwrap();
    let mut lines = text.lines();
    assert_eq!(lines.next(), Some("# time flux flux_err"));
    assert_eq!(lines.count(), 5);
}

// ---------------------------------------------------------------------------
// select_references
// ---------------------------------------------------------------------------

#[test]
fn test_select_brightest_clean_references() {
    let mut frames = transit_frames();
    // Source 3 is the brightest but clipped once.
    frames[2].measurements[3].flags.clipped = true;
    let refs = select_references(&frames, 0, 5);
    assert_eq!(refs, vec![1, 2]);

    let refs = select_references(&transit_frames(), 0, 2);
    assert_eq!(refs, vec![3, 1]);
}

#[test]
fn test_select_excludes_target() {
    let refs = select_references(&transit_frames(), 3, 10);
    assert!(!refs.contains(&3));
    assert_eq!(refs, vec![1, 0, 2]);
}

#[test]
fn test_select_on_no_frames() {
    assert!(select_references(&[], 0, 3).is_empty());
}
