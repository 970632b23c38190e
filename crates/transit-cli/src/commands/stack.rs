use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::{Args, ValueEnum};
use transit_core::io::{save_tiff, FrameSource, ImageSequence};
use transit_core::stack::sigma_clip::{sigma_clip_stack, CentralEstimator, SigmaClipParams};
use transit_core::stats::mean_std;

#[derive(Clone, ValueEnum)]
pub enum EstimatorArg {
    Median,
    Mean,
}

#[derive(Args)]
pub struct StackArgs {
    /// Input images (same dimensions)
    #[arg(required = true, num_args = 1..)]
    pub files: Vec<PathBuf>,

    /// Rejection threshold in standard deviations
    #[arg(long, default_value = "3.0")]
    pub sigma: f64,

    /// Maximum clipping passes per pixel
    #[arg(long, default_value = "5")]
    pub iterations: usize,

    /// Central value reported for the surviving samples
    #[arg(long, value_enum, default_value = "median")]
    pub estimator: EstimatorArg,

    /// Output file path
    #[arg(short, long, default_value = "stacked.tiff")]
    pub output: PathBuf,
}

pub fn run(args: &StackArgs) -> Result<()> {
    let source = ImageSequence::new(args.files.clone());
    println!("Reading {} frames...", source.len());
    let frames = source.read_all().context("Failed to read input images")?;

    let params = SigmaClipParams {
        sigma: args.sigma,
        max_iterations: args.iterations,
        estimator: match args.estimator {
            EstimatorArg::Median => CentralEstimator::Median,
            EstimatorArg::Mean => CentralEstimator::Mean,
        },
    };
    println!(
        "Sigma-clip stacking (sigma={}, iterations={}, estimator={})",
        params.sigma, params.max_iterations, params.estimator
    );

    let combined = sigma_clip_stack(&frames, &params)?;
    let (mean_dispersion, _) = mean_std(
        combined
            .dispersion
            .as_slice()
            .context("Dispersion map is not contiguous")?,
    );
    println!("Mean per-pixel dispersion: {mean_dispersion:.3} ADU");

    save_tiff(&combined.frame, &args.output)
        .with_context(|| format!("Failed to write {}", args.output.display()))?;
    println!("Saved to {}", args.output.display());
    Ok(())
}
