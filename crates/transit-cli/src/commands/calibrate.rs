use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;
use transit_core::cache::ResultCache;
use transit_core::io::{FrameSource, ImageSequence};
use transit_core::pipeline::{build_calibration, CalibrationSources, PipelineConfig};

use crate::progress::BarReporter;
use crate::summary::print_calibration_summary;

#[derive(Args)]
pub struct CalibrateArgs {
    /// Bias exposures
    #[arg(long, num_args = 1..)]
    pub bias: Vec<PathBuf>,

    /// Dark exposures
    #[arg(long, num_args = 1..)]
    pub dark: Vec<PathBuf>,

    /// Flat-field exposures
    #[arg(long, num_args = 1..)]
    pub flat: Vec<PathBuf>,

    /// Pipeline config file (TOML) for combiner settings and master names
    #[arg(long)]
    pub config: Option<PathBuf>,

    /// Directory the master frames are written to
    #[arg(long, default_value = "reduced")]
    pub cache_dir: PathBuf,

    /// Rebuild masters even when cached copies exist
    #[arg(long)]
    pub force: bool,
}

pub fn run(args: &CalibrateArgs) -> Result<()> {
    let mut config = match args.config {
        Some(ref path) => super::pipeline::load_config(path)?,
        None => PipelineConfig::default(),
    };
    config.recompute.calibration |= args.force;

    let cache = ResultCache::new(&args.cache_dir)
        .with_context(|| format!("Failed to open cache {}", args.cache_dir.display()))?;

    let bias = ImageSequence::new(args.bias.clone());
    let dark = ImageSequence::new(args.dark.clone());
    let flat = ImageSequence::new(args.flat.clone());
    let sources = CalibrationSources {
        bias: Some(&bias as &dyn FrameSource),
        dark: Some(&dark as &dyn FrameSource),
        flat: Some(&flat as &dyn FrameSource),
    };

    let reporter = BarReporter::new()?;
    let set = build_calibration(&sources, &config, &cache, &reporter);
    reporter.finish();

    print_calibration_summary(&set, &config, cache.root());
    Ok(())
}
