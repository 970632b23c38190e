use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use clap::Args;
use tracing::info;
use transit_core::cache::ResultCache;
use transit_core::io::{FrameSource, ImageSequence};
use transit_core::pipeline::{
    build_calibration, run_photometry_reported, CalibrationSources, PipelineConfig, RecomputeFlags,
};

use crate::progress::BarReporter;
use crate::summary::{print_pipeline_summary, print_run_summary};

#[derive(Args)]
pub struct RunArgs {
    /// Pipeline config file (TOML)
    pub config: PathBuf,

    /// Recompute every stage, ignoring cached results
    #[arg(long)]
    pub force: bool,

    /// Override the light-curve output path
    #[arg(short, long)]
    pub output: Option<PathBuf>,
}

pub fn load_config(path: &Path) -> Result<PipelineConfig> {
    let contents = std::fs::read_to_string(path)
        .with_context(|| format!("Failed to read config {}", path.display()))?;
    let config: PipelineConfig = toml::from_str(&contents).context("Invalid pipeline config")?;
    info!(path = %path.display(), science = config.inputs.science.len(), "Loaded pipeline config");
    Ok(config)
}

pub fn run(args: &RunArgs) -> Result<()> {
    let mut config = load_config(&args.config)?;
    if args.force {
        config.recompute = RecomputeFlags::all();
    }
    if let Some(ref output) = args.output {
        config.output.light_curve = output.clone();
    }
    if config.inputs.science.is_empty() {
        bail!("No science frames listed under [inputs]");
    }

    print_pipeline_summary(&config);

    let cache = ResultCache::new(&config.output.cache_dir).with_context(|| {
        format!("Failed to open cache {}", config.output.cache_dir.display())
    })?;

    let bias = ImageSequence::new(config.inputs.bias.clone());
    let dark = ImageSequence::new(config.inputs.dark.clone());
    let flat = ImageSequence::new(config.inputs.flat.clone());
    let mut science = ImageSequence::new(config.inputs.science.clone());
    if let Some(ref times) = config.inputs.timestamps {
        science = science
            .with_timestamps(times.clone())
            .context("Timestamps do not match the science frames")?;
    }

    let reporter = BarReporter::new()?;
    let sources = CalibrationSources {
        bias: Some(&bias as &dyn FrameSource),
        dark: Some(&dark as &dyn FrameSource),
        flat: Some(&flat as &dyn FrameSource),
    };
    let calibration = build_calibration(&sources, &config, &cache, &reporter);
    let run = run_photometry_reported(&science, &calibration, &config, &cache, &reporter)?;
    reporter.finish();

    print_run_summary(&run, science.len());

    match run.light_curve {
        Some(ref curve) => {
            curve
                .write_table(&config.output.light_curve)
                .with_context(|| {
                    format!("Failed to write {}", config.output.light_curve.display())
                })?;
            println!("\nLight curve saved to {}", config.output.light_curve.display());
        }
        None => println!("\nNo light curve produced"),
    }
    Ok(())
}
