mod commands;
mod progress;
mod summary;

use anyhow::Result;
use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(name = "transit", about = "Transit photometry reduction tool")]
#[command(version)]
struct Cli {
    /// Enable verbose output
    #[arg(short, long, global = true)]
    verbose: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand)]
enum Commands {
    /// Combine images with a sigma-clipped stack
    Stack(commands::stack::StackArgs),
    /// Build master bias, dark and flat frames
    Calibrate(commands::calibrate::CalibrateArgs),
    /// Detect point sources on an image
    Detect(commands::detect::DetectArgs),
    /// Run the full reduction and photometry pipeline
    Run(commands::pipeline::RunArgs),
    /// Print or save a default pipeline config
    Config(commands::config::ConfigArgs),
}

fn main() -> Result<()> {
    let cli = Cli::parse();

    let filter = if cli.verbose {
        EnvFilter::new("debug")
    } else {
        EnvFilter::new("warn")
    };
    tracing_subscriber::fmt().with_env_filter(filter).init();

    match &cli.command {
        Commands::Stack(args) => commands::stack::run(args),
        Commands::Calibrate(args) => commands::calibrate::run(args),
        Commands::Detect(args) => commands::detect::run(args),
        Commands::Run(args) => commands::pipeline::run(args),
        Commands::Config(args) => commands::config::run(args),
    }
}
