//! Training CLI Tool
//!
//! Trains EDSR and WDSR super-resolution models on DIV2K. Settings are
//! resolved from defaults, an optional TOML file, an optional profile and
//! finally the command-line flags.

use anyhow::{Context, Result};
use clap::Parser;
use colored::Colorize;
use sr_core::cli::setup_cli_logging;
use sr_core::{Architecture, Downgrade, ImageIdRange, Profile, Scale, TrainConfig};
use sr_training::{backend_name, default_session, train, TrainingBackend};
use std::path::PathBuf;
use tracing::info;

/// DIV2K Super-Resolution Training Tool
#[derive(Parser, Debug)]
#[command(
    name = "sr-train",
    about = "Train EDSR and WDSR super-resolution models on DIV2K",
    long_about = "Train EDSR and WDSR super-resolution models on DIV2K. Each run writes \
                  checkpoints, history and logs to a timestamped directory below --outdir."
)]
struct Args {
    /// Path to a training configuration file (TOML)
    #[arg(short, long, value_name = "FILE")]
    config: Option<PathBuf>,

    /// Architecture preset applied before the other flags
    #[arg(long, value_name = "NAME")]
    profile: Option<Profile>,

    /// DIV2K dataset directory
    #[arg(long, value_name = "DIR")]
    dataset: Option<PathBuf>,

    /// Parent directory of the training workspace
    #[arg(long, value_name = "DIR")]
    outdir: Option<PathBuf>,

    /// Super-resolution scale (2, 3 or 4)
    #[arg(long)]
    scale: Option<Scale>,

    /// Degradation operator: bicubic, unknown, mild, difficult or wild
    #[arg(long)]
    downgrade: Option<Downgrade>,

    /// Training image ids, e.g. 1-800
    #[arg(long, value_name = "RANGE")]
    training_images: Option<ImageIdRange>,

    /// Validation image ids, e.g. 801-900
    #[arg(long, value_name = "RANGE")]
    validation_images: Option<ImageIdRange>,

    /// Validate on whole images and keep only improving checkpoints
    #[arg(long)]
    benchmark: bool,

    #[arg(long, value_name = "SIZE")]
    batch_size: Option<usize>,

    /// LR patch size of training crops
    #[arg(long, value_name = "SIZE")]
    patch_size: Option<u32>,

    /// Model architecture: edsr, wdsr-a or wdsr-b
    #[arg(long, value_name = "ARCH")]
    model: Option<Architecture>,

    #[arg(long, value_name = "N")]
    num_filters: Option<usize>,

    #[arg(long, value_name = "N")]
    num_res_blocks: Option<usize>,

    /// Channel expansion of WDSR residual blocks
    #[arg(long, value_name = "N")]
    res_expansion: Option<usize>,

    /// Scale residual branches by this factor
    #[arg(long, value_name = "FACTOR")]
    res_scaling: Option<f64>,

    /// Use weight-normalized convolutions
    #[arg(long)]
    weightnorm: bool,

    /// Batches used for data-based weight norm initialization
    #[arg(long, value_name = "N")]
    num_init_batches: Option<usize>,

    #[arg(long, value_name = "LR")]
    learning_rate: Option<f64>,

    /// Decay the learning rate every N epochs
    #[arg(long, value_name = "N")]
    learning_rate_step_size: Option<usize>,

    #[arg(long, value_name = "FACTOR")]
    learning_rate_decay: Option<f64>,

    #[arg(long, value_name = "N")]
    epochs: Option<usize>,

    #[arg(long, value_name = "N")]
    steps_per_epoch: Option<usize>,

    /// Validation batches per epoch, ignored with --benchmark
    #[arg(long, value_name = "N")]
    validation_steps: Option<usize>,

    /// Only save checkpoints that improve val_psnr
    #[arg(long)]
    save_best_models_only: bool,

    /// Copy matching weights from this checkpoint before training
    #[arg(long, value_name = "FILE")]
    pretrained_model: Option<PathBuf>,

    /// Print the architecture and parameter count
    #[arg(long)]
    print_model_summary: bool,

    /// Background batch loading threads, 0 loads inline
    #[arg(long, value_name = "N")]
    num_workers: Option<usize>,

    /// Maximum number of prefetched batches
    #[arg(long, value_name = "N")]
    max_queue_size: Option<usize>,

    /// Keep decoded images in memory
    #[arg(long)]
    cache_images: bool,

    #[arg(long, value_name = "SEED")]
    seed: Option<u64>,

    /// Fraction of GPU memory the session may claim
    #[arg(long, value_name = "FRACTION")]
    gpu_memory_fraction: Option<f32>,

    /// Verbose logging
    #[arg(short, long)]
    verbose: bool,

    /// Validate and print the configuration without training
    #[arg(long)]
    dry_run: bool,
}

fn main() -> Result<()> {
    let args = Args::parse();

    setup_cli_logging(args.verbose)?;

    info!("DIV2K Super-Resolution - Training Tool");
    info!("======================================");

    let mut config: TrainConfig = match &args.config {
        Some(path) => TrainConfig::from_toml_file(path).context("Failed to load configuration file")?,
        None => TrainConfig::default(),
    };

    if let Some(profile) = args.profile {
        info!("Applying profile {profile}");
        profile.apply(&mut config.model);
    }

    apply_overrides(&mut config, &args);

    config.validate().context("Invalid configuration")?;
    print_config_summary(&config);

    if args.dry_run {
        let resolved = toml::to_string_pretty(&config).context("Failed to serialize configuration")?;
        println!("{resolved}");
        info!("Configuration validated successfully (dry run)");
        return Ok(());
    }

    let session = default_session::<TrainingBackend>(config.session.clone())
        .context("Failed to create compute session")?;
    let summary = train(config, session).context("Training failed")?;

    println!();
    println!("{}", "Training Complete!".green().bold());
    println!("  Workspace: {}", summary.workspace.display());
    if let Some(best) = summary.best_val_psnr {
        println!("  Best val_psnr: {best:.4} dB");
    }
    if let Some(checkpoint) = &summary.best_checkpoint {
        println!("  Best model:    {}", checkpoint.display());
        println!();
        println!("{}", "Next steps:".cyan().bold());
        println!("  • Demo: sr-demo --model {}", summary.workspace.display());
        println!("  • Benchmark: sr-evaluate --model {}", summary.workspace.display());
    }

    Ok(())
}

fn apply_overrides(config: &mut TrainConfig, args: &Args) {
    let dataset = &mut config.dataset;
    if let Some(path) = &args.dataset {
        dataset.path = path.clone();
    }
    if let Some(scale) = args.scale {
        dataset.scale = scale;
    }
    if let Some(downgrade) = args.downgrade {
        dataset.downgrade = downgrade;
    }
    if let Some(ids) = args.training_images {
        dataset.training_images = ids;
    }
    if let Some(ids) = args.validation_images {
        dataset.validation_images = ids;
    }
    if let Some(patch_size) = args.patch_size {
        dataset.patch_size = patch_size;
    }
    if args.cache_images {
        dataset.cache_images = true;
    }

    let model = &mut config.model;
    if let Some(architecture) = args.model {
        model.architecture = architecture;
    }
    if let Some(num_filters) = args.num_filters {
        model.num_filters = num_filters;
    }
    if let Some(num_res_blocks) = args.num_res_blocks {
        model.num_res_blocks = num_res_blocks;
    }
    if let Some(res_expansion) = args.res_expansion {
        model.res_expansion = res_expansion;
    }
    if args.res_scaling.is_some() {
        model.res_scaling = args.res_scaling;
    }
    if args.weightnorm {
        model.weightnorm = true;
    }
    if let Some(num_init_batches) = args.num_init_batches {
        model.num_init_batches = num_init_batches;
    }
    if let Some(path) = &args.pretrained_model {
        model.pretrained_model = Some(path.clone());
    }

    let training = &mut config.training;
    if args.benchmark {
        training.benchmark = true;
    }
    if let Some(batch_size) = args.batch_size {
        training.batch_size = batch_size;
    }
    if let Some(lr) = args.learning_rate {
        training.learning_rate = lr;
    }
    if let Some(step_size) = args.learning_rate_step_size {
        training.learning_rate_step_size = step_size;
    }
    if let Some(decay) = args.learning_rate_decay {
        training.learning_rate_decay = decay;
    }
    if let Some(epochs) = args.epochs {
        training.epochs = epochs;
    }
    if let Some(steps) = args.steps_per_epoch {
        training.steps_per_epoch = steps;
    }
    if let Some(steps) = args.validation_steps {
        training.validation_steps = steps;
    }
    if args.save_best_models_only {
        training.save_best_models_only = true;
    }
    if args.print_model_summary {
        training.print_model_summary = true;
    }
    if let Some(seed) = args.seed {
        training.seed = seed;
    }

    if let Some(num_workers) = args.num_workers {
        config.loader.num_workers = num_workers;
    }
    if let Some(max_queue_size) = args.max_queue_size {
        config.loader.max_queue_size = max_queue_size;
    }
    if let Some(outdir) = &args.outdir {
        config.output.outdir = outdir.clone();
    }
    if let Some(fraction) = args.gpu_memory_fraction {
        config.session.gpu_memory_fraction = fraction;
    }
}

fn print_config_summary(config: &TrainConfig) {
    let dataset = &config.dataset;
    let model = &config.model;
    let training = &config.training;

    info!("");
    info!("Configuration Summary:");
    info!("  Backend: {}", backend_name());
    info!("  Dataset: {}", dataset.path.display());
    info!("  Scale: x{}, downgrade: {}", dataset.scale, dataset.downgrade);
    info!(
        "  Images: train {}, valid {}",
        dataset.training_images, dataset.validation_images
    );
    info!("  Model: {} ({} filters, {} blocks)", model.architecture, model.num_filters, model.num_res_blocks);
    info!("  Optimizer: {}", model.optimizer());
    info!("  Epochs: {} x {} steps", training.epochs, training.steps_per_epoch);
    info!("  Batch size: {}, patch size: {}", training.batch_size, dataset.patch_size);
    info!(
        "  Learning rate: {} (x{} every {} epochs)",
        training.learning_rate, training.learning_rate_decay, training.learning_rate_step_size
    );
    info!("  Benchmark: {}", training.benchmark);
    info!("  Output dir: {}", config.output.outdir.display());
    info!("");
}
