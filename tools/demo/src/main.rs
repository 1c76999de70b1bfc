//! Demo CLI Tool
//!
//! Super-resolves every JPEG and PNG image of a directory with a trained
//! model and writes `<name>-sr.<ext>` files into the output directory.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use sr_core::cli::setup_cli_logging;
use sr_core::SessionConfig;
use sr_training::{backend_name, default_session, load_model, resolve_checkpoint, DefaultBackend, Resolver};
use std::path::PathBuf;
use tracing::info;

/// DIV2K Super-Resolution Demo
#[derive(Parser, Debug)]
#[command(name = "sr-demo", about = "Super-resolve a directory of images with a trained model")]
struct Args {
    /// Directory with input images
    #[arg(short, long, value_name = "DIR", default_value = "./demo")]
    indir: PathBuf,

    /// Directory for the super-resolved images
    #[arg(short, long, value_name = "DIR", default_value = "./output")]
    outdir: PathBuf,

    /// Trained model checkpoint (.mpk), or a training workspace to take its best checkpoint
    #[arg(short, long, value_name = "PATH")]
    model: PathBuf,

    /// Model configuration, defaults to model.json beside the checkpoint
    #[arg(long, value_name = "FILE")]
    model_config: Option<PathBuf>,

    /// Fraction of GPU memory the session may claim
    #[arg(long, value_name = "FRACTION", default_value_t = 0.8)]
    gpu_memory_fraction: f32,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_cli_logging(args.verbose)?;

    info!("DIV2K Super-Resolution - Demo");
    info!("Backend: {}", backend_name());

    let session = default_session::<DefaultBackend>(SessionConfig::new(args.gpu_memory_fraction))
        .context("Failed to create compute session")?;

    let checkpoint = resolve_checkpoint(&args.model)
        .with_context(|| format!("No checkpoint found at {}", args.model.display()))?;
    let (config, model) = load_model(&checkpoint, args.model_config.as_deref(), &session)
        .with_context(|| format!("Failed to load model: {}", checkpoint.display()))?;
    info!("Model: {} x{}", config.architecture, config.scale);

    let resolver = Resolver::new(model, session.device().clone());
    let results = resolver
        .resolve_directory(&args.indir, &args.outdir)
        .with_context(|| format!("Failed to resolve images in {}", args.indir.display()))?;

    println!("{}", "Super-Resolution Complete!".green().bold());
    for result in &results {
        println!(
            "  {} {}x{} -> {}x{} ({:.1} ms)",
            result.output.display(),
            result.input_size.0,
            result.input_size.1,
            result.output_size.0,
            result.output_size.1,
            result.inference_time_ms
        );
    }
    println!("  Wrote {} images to {}", results.len(), args.outdir.display());

    Ok(())
}
