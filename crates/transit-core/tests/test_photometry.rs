mod common;

use approx::assert_relative_eq;

use common::{add_star_with_flux, make_frame, noisy_frame};
use transit_core::detection::SourcePosition;
use transit_core::photometry::{measure_frame, measure_source, ApertureConfig, SkyAnnulus};

const FLUX: f64 = 25_000.0;

// ---------------------------------------------------------------------------
// Flux recovery
// ---------------------------------------------------------------------------

#[test]
fn test_recovers_injected_flux_on_constant_sky() {
    let mut frame = make_frame(100, 100, 100.0);
    add_star_with_flux(&mut frame, 50.3, 49.6, 1.5, FLUX);

    let m = measure_source(&frame.data, &SourcePosition::new(50.3, 49.6), &ApertureConfig::default());
    assert_relative_eq!(m.flux, FLUX, max_relative = 0.01);
    assert!((m.sky - 100.0).abs() < 1e-3);
    assert!(m.sky_err < 1e-3);
    assert!(m.is_valid());
    assert!(!m.flags.clipped && !m.flags.saturated);
}

#[test]
fn test_recovers_flux_on_noisy_sky() {
    let mut frame = noisy_frame(100, 100, 100.0, 2.0, 17);
    add_star_with_flux(&mut frame, 50.0, 50.0, 1.5, FLUX);

    let m = measure_source(&frame.data, &SourcePosition::new(50.0, 50.0), &ApertureConfig::default());
    assert_relative_eq!(m.flux, FLUX, max_relative = 0.02);
    assert!((m.sky - 100.0).abs() < 0.5);
    assert!(m.sky_err > 0.5 && m.sky_err < 2.0);
    assert!(m.flux_err > FLUX.sqrt());
}

#[test]
fn test_aperture_pixel_count() {
    let frame = make_frame(60, 60, 10.0);
    let cfg = ApertureConfig {
        radius: 3.0,
        sky: None,
        ..Default::default()
    };
    let m = measure_source(&frame.data, &SourcePosition::new(30.0, 30.0), &cfg);
    // Lattice points within radius 3 of the origin.
    assert_eq!(m.aperture_pixels, 29);
    assert_relative_eq!(m.flux, 290.0, max_relative = 1e-9);
    assert_eq!(m.sky, 0.0);
}

#[test]
fn test_variance_formula() {
    let frame = make_frame(80, 80, 50.0);
    let cfg = ApertureConfig {
        gain: 2.0,
        ..Default::default()
    };
    let m = measure_source(&frame.data, &SourcePosition::new(40.0, 40.0), &cfg);
    // Flat sky: zero flux and zero sky scatter give zero variance.
    assert!(m.flux.abs() < 1e-6);
    assert!(m.flux_err.abs() < 1e-6);
    assert!(!m.is_valid(), "zero flux cannot serve as a reference");
}

#[test]
fn test_flux_error_grows_with_sky_noise() {
    let mut quiet = noisy_frame(100, 100, 100.0, 0.5, 3);
    let mut loud = noisy_frame(100, 100, 100.0, 8.0, 3);
    add_star_with_flux(&mut quiet, 50.0, 50.0, 1.5, FLUX);
    add_star_with_flux(&mut loud, 50.0, 50.0, 1.5, FLUX);
    let pos = SourcePosition::new(50.0, 50.0);
    let cfg = ApertureConfig::default();
    let a = measure_source(&quiet.data, &pos, &cfg);
    let b = measure_source(&loud.data, &pos, &cfg);
    assert!(b.flux_err > a.flux_err);
}

// ---------------------------------------------------------------------------
// Flags
// ---------------------------------------------------------------------------

#[test]
fn test_edge_aperture_is_clipped() {
    let mut frame = make_frame(100, 100, 100.0);
    add_star_with_flux(&mut frame, 5.0, 50.0, 1.5, FLUX);
    let m = measure_source(&frame.data, &SourcePosition::new(5.0, 50.0), &ApertureConfig::default());
    assert!(m.flags.clipped);
    assert!(!m.is_valid());
    assert!(m.flux.is_finite());
}

#[test]
fn test_annulus_off_frame_is_clipped() {
    let frame = make_frame(100, 100, 100.0);
    // Aperture fits, annulus does not.
    let m = measure_source(&frame.data, &SourcePosition::new(12.0, 50.0), &ApertureConfig::default());
    assert!(m.flags.clipped);
}

#[test]
fn test_fully_outside_gives_nan() {
    let frame = make_frame(50, 50, 100.0);
    let m = measure_source(&frame.data, &SourcePosition::new(-40.0, 25.0), &ApertureConfig::default());
    assert_eq!(m.aperture_pixels, 0);
    assert!(m.flux.is_nan());
    assert!(!m.is_valid());
}

#[test]
fn test_saturation_flag() {
    let mut frame = make_frame(100, 100, 100.0);
    add_star_with_flux(&mut frame, 50.0, 50.0, 1.5, FLUX);
    let cfg = ApertureConfig {
        saturation: Some(1000.0),
        ..Default::default()
    };
    let m = measure_source(&frame.data, &SourcePosition::new(50.0, 50.0), &cfg);
    assert!(m.flags.saturated);
    assert!(!m.is_valid());

    let relaxed = ApertureConfig {
        saturation: Some(60_000.0),
        ..Default::default()
    };
    let m = measure_source(&frame.data, &SourcePosition::new(50.0, 50.0), &relaxed);
    assert!(!m.flags.saturated);
}

// ---------------------------------------------------------------------------
// measure_frame
// ---------------------------------------------------------------------------

#[test]
fn test_measure_frame_preserves_order() {
    let mut frame = make_frame(120, 120, 100.0);
    let positions = vec![
        SourcePosition::new(30.0, 30.0),
        SourcePosition::new(90.0, 40.0),
        SourcePosition::new(60.0, 90.0),
    ];
    let fluxes = [5_000.0, 20_000.0, 10_000.0];
    for (p, &f) in positions.iter().zip(&fluxes) {
        add_star_with_flux(&mut frame, p.x, p.y, 1.5, f);
    }
    let cfg = ApertureConfig {
        radius: 6.0,
        sky: Some(SkyAnnulus {
            inner: 9.0,
            outer: 14.0,
        }),
        ..Default::default()
    };
    let measured = measure_frame(&frame, &positions, &cfg);
    assert_eq!(measured.len(), 3);
    for ((m, p), &f) in measured.iter().zip(&positions).zip(&fluxes) {
        assert_eq!(m.position, *p);
        assert_relative_eq!(m.flux, f, max_relative = 0.01);
    }
}

#[test]
fn test_measure_frame_empty_positions() {
    let frame = make_frame(10, 10, 1.0);
    assert!(measure_frame(&frame, &[], &ApertureConfig::default()).is_empty());
}
