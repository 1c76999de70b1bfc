//! Evaluation CLI Tool
//!
//! Reports per-image and mean PSNR of a trained model on whole DIV2K
//! validation images.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use sr_core::cli::setup_cli_logging;
use sr_core::{Downgrade, ImageIdRange, Scale, SessionConfig, Subset};
use sr_dataset::{DatasetSelection, FullsizeSequence};
use sr_training::{backend_name, default_session, load_model, resolve_checkpoint, DefaultBackend, Evaluator};
use std::path::PathBuf;
use tracing::{info, warn};

/// DIV2K Super-Resolution Benchmark
#[derive(Parser, Debug)]
#[command(name = "sr-evaluate", about = "Benchmark a trained model on DIV2K validation images")]
struct Args {
    /// Trained model checkpoint (.mpk), or a training workspace to take its best checkpoint
    #[arg(short, long, value_name = "PATH")]
    model: PathBuf,

    /// Model configuration, defaults to model.json beside the checkpoint
    #[arg(long, value_name = "FILE")]
    model_config: Option<PathBuf>,

    /// DIV2K dataset directory
    #[arg(long, value_name = "DIR", default_value = "./dataset")]
    dataset: PathBuf,

    /// Scale of the LR images, defaults to the model's scale
    #[arg(long)]
    scale: Option<Scale>,

    /// Degradation operator of the LR images
    #[arg(long, default_value = "bicubic")]
    downgrade: Downgrade,

    /// Validation image ids
    #[arg(long, value_name = "RANGE", default_value = "801-900")]
    images: ImageIdRange,

    /// Keep decoded images in memory
    #[arg(long)]
    cache_images: bool,

    /// Write the report as JSON to this file
    #[arg(short, long, value_name = "FILE")]
    output: Option<PathBuf>,

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

    info!("DIV2K Super-Resolution - Evaluation Tool");
    info!("Backend: {}", backend_name());

    let session = default_session::<DefaultBackend>(SessionConfig::new(args.gpu_memory_fraction))
        .context("Failed to create compute session")?;
    let checkpoint = resolve_checkpoint(&args.model)
        .with_context(|| format!("No checkpoint found at {}", args.model.display()))?;
    let (config, model) = load_model(&checkpoint, args.model_config.as_deref(), &session)
        .with_context(|| format!("Failed to load model: {}", checkpoint.display()))?;

    let scale = args.scale.unwrap_or(config.scale);
    if scale != config.scale {
        warn!("Evaluating a x{} model on x{scale} images", config.scale);
    }
    args.downgrade.check_scale(scale)?;

    let selection = DatasetSelection::new(
        &args.dataset,
        scale,
        Subset::Valid,
        args.downgrade,
        args.images.to_vec(),
    );
    let sequence = FullsizeSequence::new(&selection, args.cache_images)
        .context("Failed to open validation images")?;

    let evaluator = Evaluator::new(model, scale, session.device().clone());
    let report = evaluator.evaluate(&sequence)?;

    println!("{}", "Evaluation Results:".cyan().bold());
    for image in &report.per_image {
        println!("  {:04}: {:.4} dB", image.image_id, image.psnr);
    }
    println!(
        "  {} Mean PSNR over {} images: {}",
        "→".cyan(),
        report.num_images,
        format!("{:.4} dB", report.mean_psnr).green().bold()
    );

    if let Some(path) = &args.output {
        report
            .save_json(path)
            .with_context(|| format!("Failed to write report: {}", path.display()))?;
        info!("Report saved to: {}", path.display());
    }

    Ok(())
}
