mod common;

use common::{add_gaussian, make_frame, noisy_frame};
use transit_core::detection::SourcePosition;
use transit_core::frame::Frame;
use transit_core::recenter::{recenter_positions, recenter_source, RecenterConfig};

fn field() -> (Frame, Vec<SourcePosition>) {
    let truth = vec![
        SourcePosition::new(40.3, 50.6),
        SourcePosition::new(90.8, 30.2),
        SourcePosition::new(70.0, 95.0),
    ];
    let mut frame = make_frame(128, 128, 100.0);
    for p in &truth {
        add_gaussian(&mut frame, p.x, p.y, 1.5, 500.0);
    }
    (frame, truth)
}

// ---------------------------------------------------------------------------
// recenter_source
// ---------------------------------------------------------------------------

#[test]
fn test_recenter_recovers_true_position() {
    let (frame, truth) = field();
    let cfg = RecenterConfig::default();
    for p in &truth {
        let start = SourcePosition::new(p.x + 2.4, p.y - 1.7);
        let found = recenter_source(&frame.data, &start, &cfg).unwrap();
        assert!(found.distance(p) < 0.05, "{found:?} vs {p:?}");
    }
}

#[test]
fn test_recenter_no_signal_returns_none() {
    let frame = make_frame(64, 64, 100.0);
    let start = SourcePosition::new(32.0, 32.0);
    assert!(recenter_source(&frame.data, &start, &RecenterConfig::default()).is_none());
}

#[test]
fn test_recenter_rejects_drift_beyond_box() {
    // The only star sits just over half a box from the reference; chasing
    // it walks the centroid out of the original window.
    let mut frame = make_frame(128, 128, 100.0);
    add_gaussian(&mut frame, 75.5, 75.5, 1.5, 500.0);
    let cfg = RecenterConfig {
        box_size: 11,
        ..Default::default()
    };
    let start = SourcePosition::new(70.0, 70.0);
    assert!(recenter_source(&frame.data, &start, &cfg).is_none());
}

#[test]
fn test_recenter_non_finite_reference() {
    let (frame, _) = field();
    let start = SourcePosition::new(f64::NAN, 10.0);
    assert!(recenter_source(&frame.data, &start, &RecenterConfig::default()).is_none());
}

// ---------------------------------------------------------------------------
// recenter_positions
// ---------------------------------------------------------------------------

#[test]
fn test_recenter_is_idempotent() {
    let (frame, truth) = field();
    let cfg = RecenterConfig::default();
    let start: Vec<SourcePosition> = truth
        .iter()
        .map(|p| SourcePosition::new(p.x - 1.2, p.y + 0.9))
        .collect();

    let once = recenter_positions(&frame, &start, &cfg);
    let twice = recenter_positions(&frame, &once, &cfg);
    for (a, b) in once.iter().zip(&twice) {
        assert!(a.distance(b) < 0.02);
    }
}

#[test]
fn test_recenter_preserves_order_and_count() {
    let (frame, truth) = field();
    let mut reference = truth.clone();
    // Empty sky: keeps its reference position.
    reference.insert(1, SourcePosition::new(15.0, 110.0));

    let out = recenter_positions(&frame, &reference, &RecenterConfig::default());
    assert_eq!(out.len(), 4);
    assert_eq!(out[1], SourcePosition::new(15.0, 110.0));
    assert!(out[0].distance(&truth[0]) < 0.05);
    assert!(out[2].distance(&truth[1]) < 0.05);
    assert!(out[3].distance(&truth[2]) < 0.05);
}

#[test]
fn test_recenter_tracks_shifted_frame() {
    let (_, truth) = field();
    let mut shifted = noisy_frame(128, 128, 100.0, 1.0, 21);
    for p in &truth {
        add_gaussian(&mut shifted, p.x + 1.5, p.y - 2.0, 1.5, 800.0);
    }
    let out = recenter_positions(&shifted, &truth, &RecenterConfig::default());
    for (found, p) in out.iter().zip(&truth) {
        assert!((found.x - (p.x + 1.5)).abs() < 0.2);
        assert!((found.y - (p.y - 2.0)).abs() < 0.2);
    }
}

#[test]
fn test_recenter_empty_reference() {
    let (frame, _) = field();
    assert!(recenter_positions(&frame, &[], &RecenterConfig::default()).is_empty());
}
