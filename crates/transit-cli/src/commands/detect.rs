use std::fs::File;
use std::io::{self, BufWriter, Write};
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use transit_core::detection::{detect_sources, DetectionConfig};
use transit_core::io::load_image;
use transit_core::io::table::write_table;

#[derive(Args)]
pub struct DetectArgs {
    /// Input image
    pub file: PathBuf,

    /// Expected stellar FWHM in pixels
    #[arg(long, default_value = "3.0")]
    pub fwhm: f64,

    /// Detection threshold in background standard deviations
    #[arg(long, default_value = "20.0")]
    pub threshold: f64,

    /// Discard detections this close to the image edge
    #[arg(long, default_value = "150")]
    pub border: f64,

    /// Write the catalog here instead of stdout
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn run(args: &DetectArgs) -> Result<()> {
    let frame = load_image(&args.file)
        .with_context(|| format!("Failed to read {}", args.file.display()))?;

    let config = DetectionConfig {
        fwhm: args.fwhm,
        threshold_sigma: args.threshold,
        border_margin: args.border,
        ..Default::default()
    };
    let catalog = detect_sources(&frame, &config)?;
    eprintln!(
        "{} sources (background {:.1}, noise {:.2}, threshold {:.1})",
        catalog.len(),
        catalog.background,
        catalog.noise,
        catalog.threshold
    );

    let rows = catalog.positions.iter().map(|p| vec![p.x, p.y]);
    match args.output {
        Some(ref path) => {
            let mut w = BufWriter::new(
                File::create(path)
                    .with_context(|| format!("Failed to create {}", path.display()))?,
            );
            write_table(&mut w, Some("x y"), rows)?;
            w.flush()?;
            eprintln!("Catalog saved to {}", path.display());
        }
        None => {
            let stdout = io::stdout();
            let mut w = stdout.lock();
            write_table(&mut w, Some("x y"), rows)?;
        }
    }
    Ok(())
}
