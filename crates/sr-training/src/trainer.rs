//! Training pipeline for EDSR and WDSR.
//!
//! This module implements the fit loop using the Burn framework:
//! - Cropped training batches from the prefetching loader
//! - MAE loss with automatic differentiation and Adam
//! - Step decay of the learning rate
//! - Validation on crops, or on whole images in benchmark mode
//! - Checkpoints, history and event log in a timestamped workspace

use std::path::PathBuf;
use std::sync::Arc;

use burn::{
    module::{AutodiffModule, Module},
    optim::{AdamConfig, GradientsParams, Optimizer},
    tensor::{backend::AutodiffBackend, ElementConversion},
};
use colored::Colorize;
use indicatif::{ProgressBar, ProgressStyle};
use sr_core::{Error, Result, TrainConfig};
use sr_dataset::{
    images_to_tensor, BatchLoader, CroppedSequence, DatasetSelection, FullsizeSequence,
    PairSequence, SrBatcher,
};
use tracing::{debug, info, warn};

use crate::backend::Session;
use crate::checkpoint::CheckpointManager;
use crate::history::{EpochMetrics, EventLog, History};
use crate::loss::{mae, psnr};
use crate::lr_schedule::{LearningRateScheduler, StepDecay};
use crate::model::{copy_weights, load_model, Phase, SrModel, SrModelConfig, MODEL_CONFIG_FILE};
use crate::workspace::Workspace;

/// Mixed into the training seed for the weight norm init batches.
const WEIGHTNORM_INIT_SEED: u64 = 0x5eed_0000_0000_1417;

/// Outcome of a training run
#[derive(Debug, Clone)]
pub struct TrainingSummary {
    pub workspace: PathBuf,
    pub history: History,
    pub best_val_psnr: Option<f64>,
    pub best_checkpoint: Option<PathBuf>,
}

/// Loss and PSNR averaged over the batches of one pass
#[derive(Debug, Clone, Copy, Default)]
struct PassMetrics {
    loss: f64,
    psnr: f64,
}

#[derive(Default)]
struct MetricAccumulator {
    loss: f64,
    psnr: f64,
    batches: usize,
}

impl MetricAccumulator {
    fn add(&mut self, loss: f64, psnr: f64) {
        self.loss += loss;
        self.psnr += psnr;
        self.batches += 1;
    }

    fn finish(&self) -> PassMetrics {
        let n = self.batches.max(1) as f64;
        PassMetrics {
            loss: self.loss / n,
            psnr: self.psnr / n,
        }
    }
}

/// Trainer for a super-resolution network on DIV2K
pub struct Trainer<B: AutodiffBackend> {
    config: TrainConfig,
    session: Session<B>,
    model_config: SrModelConfig,
    train_loader: BatchLoader,
    valid_loader: BatchLoader,
    validation_steps: usize,
    benchmark: bool,
}

impl<B: AutodiffBackend> Trainer<B> {
    /// Validate the configuration and open the training and validation data.
    pub fn new(config: TrainConfig, session: Session<B>) -> Result<Self> {
        config.validate()?;

        let dataset = &config.dataset;
        let training = &config.training;

        let train_selection = DatasetSelection::training(dataset);
        let train_sequence = CroppedSequence::new(
            &train_selection,
            training.batch_size,
            dataset.patch_size,
            dataset.cache_images,
        )?;
        info!(
            "Training data: {} images, {} batches of {}",
            train_sequence.num_images(),
            train_sequence.len(),
            training.batch_size
        );

        let valid_selection = DatasetSelection::validation(dataset);
        let benchmark = training.benchmark;
        let (valid_sequence, validation_steps): (Arc<dyn PairSequence>, usize) = if benchmark {
            let sequence = FullsizeSequence::new(&valid_selection, dataset.cache_images)?;
            let steps = sequence.len();
            (Arc::new(sequence), steps)
        } else {
            let sequence = CroppedSequence::new(
                &valid_selection,
                training.batch_size,
                dataset.patch_size,
                dataset.cache_images,
            )?;
            (Arc::new(sequence), training.validation_steps)
        };
        info!(
            "Validation data: {} batches per epoch{}",
            validation_steps,
            if benchmark { " (benchmark, full size)" } else { "" }
        );

        let model_config = SrModelConfig::from_settings(&config.model, dataset.scale);
        let train_loader = BatchLoader::new(Arc::new(train_sequence), &config.loader, training.seed);
        // Distinct seed so validation crops do not follow the training ones.
        let valid_loader = BatchLoader::new(
            valid_sequence,
            &config.loader,
            training.seed.wrapping_add(u32::MAX as u64),
        );

        Ok(Self {
            config,
            session,
            model_config,
            train_loader,
            valid_loader,
            validation_steps,
            benchmark,
        })
    }

    pub fn model_config(&self) -> &SrModelConfig {
        &self.model_config
    }

    pub fn validation_steps(&self) -> usize {
        self.validation_steps
    }

    /// Build the network, apply data-based init and pretrained weights.
    pub fn build_model(&self) -> Result<SrModel<B>> {
        B::seed(self.config.training.seed);
        let mut model = self.model_config.init(&self.session);

        let model_settings = &self.config.model;
        if model_settings.weightnorm && model_settings.num_init_batches > 0 {
            model = self.data_based_init(model, model_settings.num_init_batches)?;
        }

        if let Some(pretrained) = &model_settings.pretrained_model {
            let (_, source) = load_model::<B>(pretrained, None, &self.session)?;
            let (copied, report) = copy_weights(&source, model);
            if report.copied == 0 {
                warn!("No parameters of {} match the new model", pretrained.display());
            }
            model = copied;
        }

        Ok(model)
    }

    /// Training data on its own seed, so init crops differ from training crops.
    fn init_loader(&self) -> BatchLoader {
        self.train_loader
            .with_seed(self.config.training.seed ^ WEIGHTNORM_INIT_SEED)
    }

    fn data_based_init(&self, model: SrModel<B>, num_batches: usize) -> Result<SrModel<B>> {
        let mut images = Vec::new();
        for batch in self.init_loader().epoch(0, num_batches, true) {
            images.extend(batch?.lr);
        }
        info!(
            "Data-based weight norm initialization on {} LR patches",
            images.len()
        );
        let x = images_to_tensor::<B>(&images, self.session.device());
        Ok(model.data_based_init(x))
    }

    /// Run the full training schedule in a new workspace under the output directory.
    pub fn fit(&self) -> Result<TrainingSummary> {
        let workspace = Workspace::create(&self.config.output.outdir)?;
        self.fit_in(workspace)
    }

    pub fn fit_in(&self, workspace: Workspace) -> Result<TrainingSummary> {
        let training = &self.config.training;

        workspace.write_args(&self.config)?;
        self.model_config
            .save_json(&workspace.models_dir().join(MODEL_CONFIG_FILE))?;

        let mut model = self.build_model()?;
        if training.print_model_summary {
            self.print_model_summary(&model);
        }

        let mut optimizer = AdamConfig::new().init::<B, SrModel<B>>();
        let mut scheduler =
            LearningRateScheduler::new(StepDecay::from_params(training), training.learning_rate);
        let mut checkpoints =
            CheckpointManager::new(workspace.models_dir()).save_best_only(training.save_best_only());
        let events = EventLog::new(&workspace.log_dir())?;
        let mut history = History::new();
        let mut best_checkpoint = None;

        println!("{}", "Starting Training...".green().bold());
        println!(
            "  Optimizer: {}, epochs: {}, steps per epoch: {}",
            self.config.model.optimizer(),
            training.epochs,
            training.steps_per_epoch
        );

        for epoch in 0..training.epochs {
            let lr = scheduler.get_lr();
            println!(
                "{}",
                format!("Epoch {}/{}", epoch + 1, training.epochs).yellow().bold()
            );

            let (trained, train_metrics) = self.train_epoch(model, &mut optimizer, epoch, lr)?;
            model = trained;

            let valid_metrics = self.validate(&model, epoch)?;

            let metrics = EpochMetrics {
                epoch: epoch + 1,
                loss: train_metrics.loss,
                psnr: train_metrics.psnr,
                val_loss: valid_metrics.loss,
                val_psnr: valid_metrics.psnr,
                lr,
            };
            history.push(&metrics);
            history.save(&workspace.history_path())?;
            events.record(&metrics)?;

            let previous_best = checkpoints.best_psnr();
            let saved = checkpoints.on_epoch_end(epoch + 1, metrics.val_psnr, &model)?;
            let is_best = checkpoints.best_psnr() != previous_best;
            if let (true, Some(path)) = (is_best, saved) {
                best_checkpoint = Some(path);
            }

            println!(
                "  {} loss: {:.4} | psnr: {:.4} | val_loss: {:.4} | val_psnr: {:.4} | lr: {:.2e}{}",
                "→".cyan(),
                metrics.loss,
                metrics.psnr,
                metrics.val_loss,
                metrics.val_psnr,
                lr,
                if is_best { " (best)".green().to_string() } else { String::new() }
            );

            scheduler.step();
        }

        let best = history.best_val_psnr();
        if let Some((epoch, psnr)) = best {
            info!("Best val_psnr: {psnr:.4} (epoch {epoch})");
        }
        let best_val_psnr = best.map(|(_, psnr)| psnr);

        Ok(TrainingSummary {
            workspace: workspace.root().to_path_buf(),
            history,
            best_val_psnr,
            best_checkpoint,
        })
    }

    fn train_epoch<O>(
        &self,
        mut model: SrModel<B>,
        optimizer: &mut O,
        epoch: usize,
        lr: f64,
    ) -> Result<(SrModel<B>, PassMetrics)>
    where
        O: Optimizer<SrModel<B>, B>,
    {
        let steps = self.config.training.steps_per_epoch;
        let batcher = SrBatcher::<B>::new(self.session.device().clone());
        let progress = progress_bar(steps as u64, "steps");
        let mut accumulator = MetricAccumulator::default();

        for batch in self.train_loader.epoch(epoch, steps, true) {
            let batch = batcher.batch_pairs(batch?);

            let output = model.forward(batch.lr, Phase::Train);
            let batch_psnr: f64 = psnr(batch.hr.clone(), output.clone().detach(), Phase::Train)
                .into_scalar()
                .elem();
            let loss = mae(batch.hr, output, Phase::Train);
            let loss_value: f64 = loss.clone().into_scalar().elem();
            if !loss_value.is_finite() {
                progress.abandon();
                return Err(Error::Training(format!(
                    "loss diverged to {loss_value} in epoch {}",
                    epoch + 1
                )));
            }

            let grads = loss.backward();
            let grads = GradientsParams::from_grads(grads, &model);
            model = optimizer.step(lr, model, grads);

            accumulator.add(loss_value, batch_psnr);
            progress.set_message(format!("loss {loss_value:.4}"));
            progress.inc(1);
        }
        progress.finish_and_clear();

        let metrics = accumulator.finish();
        debug!(
            "epoch {} trained on {} batches, loss {:.4}",
            epoch + 1,
            accumulator.batches,
            metrics.loss
        );
        Ok((model, metrics))
    }

    fn validate(&self, model: &SrModel<B>, epoch: usize) -> Result<PassMetrics> {
        let inner_model = model.clone().valid();
        let batcher = SrBatcher::<B::InnerBackend>::new(self.session.device().clone());
        let progress = progress_bar(self.validation_steps as u64, "validation");
        let mut accumulator = MetricAccumulator::default();

        let batches = self
            .valid_loader
            .epoch(epoch, self.validation_steps, !self.benchmark);
        for batch in batches {
            let batch = batcher.batch_pairs(batch?);
            let output = inner_model.forward(batch.lr, Phase::Eval);
            let batch_psnr: f64 = psnr(batch.hr.clone(), output.clone(), Phase::Eval)
                .into_scalar()
                .elem();
            let loss: f64 = mae(batch.hr, output, Phase::Eval).into_scalar().elem();
            accumulator.add(loss, batch_psnr);
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(accumulator.finish())
    }

    fn print_model_summary(&self, model: &SrModel<B>) {
        let config = &self.model_config;
        println!("{}", "Model Summary:".cyan().bold());
        println!("  Architecture:    {}", config.architecture);
        println!("  Scale:           x{}", config.scale);
        println!("  Filters:         {}", config.num_filters);
        println!("  Residual blocks: {}", config.num_res_blocks);
        if config.architecture.is_wdsr() {
            println!("  Expansion:       {}", config.res_expansion);
        }
        if let Some(scaling) = config.res_scaling {
            println!("  Residual scale:  {scaling}");
        }
        println!("  Weight norm:     {}", config.weightnorm);
        println!("  Parameters:      {}", model.num_params());
    }
}

fn progress_bar(len: u64, unit: &str) -> ProgressBar {
    let progress = ProgressBar::new(len);
    let template = format!("[{{elapsed_precise}}] [{{bar:40.cyan/blue}}] {{pos}}/{{len}} {unit} {{msg}}");
    progress.set_style(
        ProgressStyle::default_bar()
            .template(&template)
            .unwrap_or_else(|_| ProgressStyle::default_bar())
            .progress_chars("=>-"),
    );
    progress
}

/// Train a new model as configured.
pub fn train<B: AutodiffBackend>(config: TrainConfig, session: Session<B>) -> Result<TrainingSummary> {
    Trainer::new(config, session)?.fit()
}
