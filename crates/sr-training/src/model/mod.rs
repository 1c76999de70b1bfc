//! Super-resolution architectures and model artifacts.
//!
//! A saved model consists of the burn record (`*.mpk`, written with
//! [`CompactRecorder`]) and the [`SrModelConfig`] needed to rebuild the
//! network before loading it, stored as `model.json` next to the record.

pub mod common;
pub mod conv;
pub mod edsr;
pub mod transfer;
pub mod wdsr;

use burn::{
    config::Config,
    module::Module,
    record::CompactRecorder,
    tensor::{backend::Backend, Tensor},
};
use sr_core::{Architecture, Error, ModelConfig, Result as SrResult, Scale};
use std::fmt;
use std::path::{Path, PathBuf};
use tracing::info;

use crate::backend::Session;
pub use edsr::Edsr;
pub use transfer::{copy_weights, TransferReport};
pub use wdsr::Wdsr;

/// File name of the model configuration stored with checkpoints
pub const MODEL_CONFIG_FILE: &str = "model.json";

/// Extension of burn records written by [`CompactRecorder`]
pub const RECORD_EXTENSION: &str = "mpk";

/// Whether the network runs inside the training loop or for evaluation
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Phase {
    Train,
    Eval,
}

impl fmt::Display for Phase {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Phase::Train => write!(f, "train"),
            Phase::Eval => write!(f, "eval"),
        }
    }
}

/// Architecture and hyperparameters of a super-resolution network
#[derive(Config, Debug)]
pub struct SrModelConfig {
    pub architecture: Architecture,
    pub scale: Scale,
    #[config(default = 64)]
    pub num_filters: usize,
    #[config(default = 16)]
    pub num_res_blocks: usize,
    /// Width multiplier of WDSR blocks
    #[config(default = 4)]
    pub res_expansion: usize,
    pub res_scaling: Option<f64>,
    #[config(default = false)]
    pub weightnorm: bool,
}

impl SrModelConfig {
    pub fn from_settings(model: &ModelConfig, scale: Scale) -> Self {
        let mut config = Self::new(model.architecture, scale)
            .with_num_filters(model.num_filters)
            .with_num_res_blocks(model.num_res_blocks)
            .with_res_expansion(model.res_expansion)
            .with_weightnorm(model.weightnorm);
        config.res_scaling = model.res_scaling;
        config
    }

    /// Build the network on the session's device.
    pub fn init<B: Backend>(&self, session: &Session<B>) -> SrModel<B> {
        let device = session.device();
        match self.architecture {
            Architecture::Edsr => SrModel::Edsr(Edsr::new(self, device)),
            Architecture::WdsrA | Architecture::WdsrB => SrModel::Wdsr(Wdsr::new(self, device)),
        }
    }

    pub fn save_json(&self, path: &Path) -> SrResult<()> {
        self.save(path)
            .map_err(|e| Error::Model(format!("Failed to save model config {}: {e}", path.display())))
    }

    pub fn load_json(path: &Path) -> SrResult<Self> {
        if !path.exists() {
            return Err(Error::NotFound(format!(
                "Model config not found: {}",
                path.display()
            )));
        }
        Self::load(path)
            .map_err(|e| Error::Model(format!("Failed to load model config {}: {e:?}", path.display())))
    }
}

/// Any of the supported networks
#[derive(Module, Debug)]
pub enum SrModel<B: Backend> {
    Edsr(Edsr<B>),
    Wdsr(Wdsr<B>),
}

impl<B: Backend> SrModel<B> {
    /// `[N, 3, H, W]` on the 0-255 scale to the super-resolved batch.
    ///
    /// EDSR ignores `phase`. WDSR outputs `2 * scale` fewer pixels per
    /// side in [`Phase::Train`].
    pub fn forward(&self, x: Tensor<B, 4>, phase: Phase) -> Tensor<B, 4> {
        match self {
            SrModel::Edsr(model) => model.forward(x),
            SrModel::Wdsr(model) => model.forward(x, phase),
        }
    }

    /// Data-based weight norm initialization from a batch of LR images.
    pub fn data_based_init(self, x: Tensor<B, 4>) -> Self {
        match self {
            SrModel::Edsr(model) => SrModel::Edsr(model.data_based_init(x)),
            SrModel::Wdsr(model) => SrModel::Wdsr(model.data_based_init(x)),
        }
    }

    /// Save the record, returning the written path.
    pub fn save_record(&self, path: &Path) -> SrResult<PathBuf> {
        let path = record_path(path);
        if let Some(parent) = path.parent() {
            std::fs::create_dir_all(parent)?;
        }
        self.clone()
            .save_file(path.clone(), &CompactRecorder::new())
            .map_err(|e| Error::Model(format!("Failed to save model {}: {e:?}", path.display())))?;
        Ok(path)
    }

    /// Load a record into this network.
    pub fn load_record(self, path: &Path, device: &B::Device) -> SrResult<Self> {
        let path = record_path(path);
        if !path.exists() {
            return Err(Error::NotFound(format!("Model file not found: {}", path.display())));
        }
        self.load_file(path.clone(), &CompactRecorder::new(), device)
            .map_err(|e| Error::Model(format!("Failed to load model {}: {e:?}", path.display())))
    }
}

/// Path of the record for `path`, appending the record extension if missing.
pub fn record_path(path: &Path) -> PathBuf {
    match path.extension().and_then(|e| e.to_str()) {
        Some(RECORD_EXTENSION) => path.to_path_buf(),
        _ => PathBuf::from(format!("{}.{RECORD_EXTENSION}", path.display())),
    }
}

/// Location of the model configuration belonging to a saved record
pub fn config_path_for(record: &Path) -> PathBuf {
    record
        .parent()
        .unwrap_or_else(|| Path::new("."))
        .join(MODEL_CONFIG_FILE)
}

/// Rebuild and load a saved model.
///
/// The configuration is read from `config` or, if absent, from
/// [`MODEL_CONFIG_FILE`] in the record's directory.
pub fn load_model<B: Backend>(
    record: &Path,
    config: Option<&Path>,
    session: &Session<B>,
) -> SrResult<(SrModelConfig, SrModel<B>)> {
    let config_path = config.map(Path::to_path_buf).unwrap_or_else(|| config_path_for(record));
    let config = SrModelConfig::load_json(&config_path)?;
    let model = config.init(session).load_record(record, session.device())?;
    info!(
        "Loaded {} x{} model from {}",
        config.architecture,
        config.scale,
        record.display()
    );
    Ok((config, model))
}
