use std::path::Path;

use console::Style;
use transit_core::calibration::CalibrationSet;
use transit_core::frame::Frame;
use transit_core::pipeline::{PhotometryRun, PipelineConfig};
use transit_core::stats::median;

struct Styles {
    title: Style,
    header: Style,
    label: Style,
    value: Style,
    method: Style,
    disabled: Style,
    path: Style,
}

impl Styles {
    fn new() -> Self {
        Self {
            title: Style::new().cyan().bold(),
            header: Style::new().cyan().bold(),
            label: Style::new().dim(),
            value: Style::new().bold().white(),
            method: Style::new().green(),
            disabled: Style::new().dim().yellow(),
            path: Style::new().underlined(),
        }
    }
}

fn rule(width: usize) -> String {
    "\u{2550}".repeat(width)
}

pub fn print_pipeline_summary(config: &PipelineConfig) {
    let s = Styles::new();
    let inputs = &config.inputs;

    println!();
    println!("  {}", s.title.apply_to("Transit Pipeline"));
    println!("  {}", s.title.apply_to(rule(16)));
    println!();

    println!(
        "  {:<14}{}",
        s.label.apply_to("Science"),
        s.value.apply_to(format!("{} frames", inputs.science.len()))
    );
    for (label, files) in [("Bias", &inputs.bias), ("Dark", &inputs.dark), ("Flat", &inputs.flat)] {
        if files.is_empty() {
            println!("  {:<14}{}", s.label.apply_to(label), s.disabled.apply_to("none"));
        } else {
            println!(
                "  {:<14}{}",
                s.label.apply_to(label),
                s.value.apply_to(format!("{} frames", files.len()))
            );
        }
    }
    println!(
        "  {:<14}{}",
        s.label.apply_to("Cache"),
        s.path.apply_to(config.output.cache_dir.display())
    );
    println!();

    println!("  {}", s.header.apply_to("Calibration"));
    let combine = &config.calibration.combine;
    println!(
        "    {:<12}{}",
        s.label.apply_to("Estimator"),
        s.method.apply_to(combine.estimator)
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Sigma"),
        s.value.apply_to(combine.sigma)
    );
    println!();

    println!("  {}", s.header.apply_to("Detection"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("FWHM"),
        s.value.apply_to(format!("{} px", config.detection.fwhm))
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Threshold"),
        s.value.apply_to(format!("{} sigma", config.detection.threshold_sigma))
    );
    println!();

    println!("  {}", s.header.apply_to("Photometry"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Aperture"),
        s.value.apply_to(format!("{} px", config.aperture.radius))
    );
    match config.aperture.sky {
        Some(sky) => println!(
            "    {:<12}{}",
            s.label.apply_to("Sky"),
            s.value.apply_to(format!("{}-{} px", sky.inner, sky.outer))
        ),
        None => println!("    {:<12}{}", s.label.apply_to("Sky"), s.disabled.apply_to("none")),
    }
    println!();

    let lc = &config.light_curve;
    println!("  {}", s.header.apply_to("Light Curve"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Target"),
        s.value.apply_to(lc.target)
    );
    if lc.references.is_empty() {
        println!(
            "    {:<12}{}",
            s.label.apply_to("References"),
            s.method.apply_to(format!("auto ({} brightest)", lc.auto_references))
        );
    } else {
        println!(
            "    {:<12}{:?}",
            s.label.apply_to("References"),
            lc.references
        );
    }
    println!(
        "    {:<12}{}",
        s.label.apply_to("Ensemble"),
        s.method.apply_to(lc.ensemble)
    );
    println!();
}

pub fn print_calibration_summary(set: &CalibrationSet, config: &PipelineConfig, root: &Path) {
    let s = Styles::new();
    let names = &config.calibration;

    println!();
    println!("  {}", s.title.apply_to("Master Frames"));
    println!("  {}", s.title.apply_to(rule(13)));
    println!();

    let masters = [
        (&names.bias_name, set.bias.as_ref()),
        (&names.dark_name, set.dark.as_ref()),
        (&names.flat_name, set.flat.as_ref()),
    ];
    for (name, frame) in masters {
        match frame {
            Some(frame) => println!(
                "  {:<14}{}",
                s.label.apply_to(name),
                s.value.apply_to(describe(frame))
            ),
            None => println!("  {:<14}{}", s.label.apply_to(name), s.disabled.apply_to("skipped")),
        }
    }
    println!();
    println!("  {:<14}{}", s.label.apply_to("Saved in"), s.path.apply_to(root.display()));
}

fn describe(frame: &Frame) -> String {
    let level = frame
        .data
        .as_slice()
        .map(median)
        .unwrap_or(f64::NAN);
    format!("{}x{}, median {:.3}", frame.width(), frame.height(), level)
}

pub fn print_run_summary(run: &PhotometryRun, total_frames: usize) {
    let s = Styles::new();

    println!();
    println!("  {}", s.header.apply_to("Results"));
    println!(
        "    {:<12}{}",
        s.label.apply_to("Sources"),
        s.value.apply_to(run.catalog.len())
    );
    println!(
        "    {:<12}{}",
        s.label.apply_to("Measured"),
        s.value.apply_to(format!("{}/{} frames", run.frames.len(), total_frames))
    );
    if !run.failed_frames.is_empty() {
        println!(
            "    {:<12}{:?}",
            s.label.apply_to("Failed"),
            run.failed_frames
        );
    }
    if let Some(ref curve) = run.light_curve {
        println!(
            "    {:<12}{}",
            s.label.apply_to("Points"),
            s.value.apply_to(curve.len())
        );
    }
}
