//! Training and inference for EDSR and WDSR super-resolution networks.
//!
//! This crate provides:
//! - Backend selection and compute sessions
//! - The EDSR and WDSR architectures with optional weight normalization
//! - MAE loss, PSNR and the step decay schedule
//! - The training loop with checkpoints and history
//! - Directory inference and benchmark evaluation

pub mod backend;
pub mod checkpoint;
pub mod evaluator;
pub mod history;
pub mod inference;
pub mod loss;
pub mod lr_schedule;
pub mod model;
pub mod trainer;
pub mod workspace;

pub use backend::{backend_name, default_device, default_session, DefaultBackend, Session, TrainingBackend};
pub use checkpoint::{resolve_checkpoint, CheckpointManager};
pub use evaluator::{EvaluationReport, Evaluator, ImagePsnr};
pub use history::{EpochMetrics, EventLog, History};
pub use inference::{ResolvedImage, Resolver};
pub use lr_schedule::{LearningRateScheduler, StepDecay};
pub use model::{load_model, Phase, SrModel, SrModelConfig};
pub use trainer::{train, Trainer, TrainingSummary};
pub use workspace::Workspace;
