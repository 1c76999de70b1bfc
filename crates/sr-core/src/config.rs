//! Configuration structures for super-resolution training.
//!
//! Values are resolved in layers: [`TrainConfig::default`], then an optional
//! TOML file, then an optional [`Profile`](crate::profile::Profile), then
//! command-line overrides applied by the tools.

use crate::session::SessionConfig;
use crate::types::{Architecture, Downgrade, ImageIdRange, OptimizerKind, Scale};
use crate::{Error, Result};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

/// Complete configuration of a training run
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainConfig {
    /// Dataset selection and cropping
    pub dataset: DatasetConfig,
    /// Network architecture and hyperparameters
    pub model: ModelConfig,
    /// Optimization schedule
    pub training: TrainingParams,
    /// Background batch loading
    pub loader: LoaderConfig,
    /// Output locations
    pub output: OutputConfig,
    /// Compute session settings
    pub session: SessionConfig,
}

/// Dataset configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatasetConfig {
    /// DIV2K root directory
    pub path: PathBuf,
    /// Super-resolution scale
    pub scale: Scale,
    /// Degradation operator of the LR images
    pub downgrade: Downgrade,
    /// Image ids used for training
    pub training_images: ImageIdRange,
    /// Image ids used for validation
    pub validation_images: ImageIdRange,
    /// LR patch size of training crops
    pub patch_size: u32,
    /// Keep decoded images in memory
    pub cache_images: bool,
}

impl Default for DatasetConfig {
    fn default() -> Self {
        Self {
            path: PathBuf::from("./dataset"),
            scale: Scale::X2,
            downgrade: Downgrade::Bicubic,
            training_images: ImageIdRange::div2k_train(),
            validation_images: ImageIdRange::div2k_valid(),
            patch_size: 48,
            cache_images: false,
        }
    }
}

/// Model configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelConfig {
    /// Architecture type
    pub architecture: Architecture,
    /// Number of feature maps in the residual body
    pub num_filters: usize,
    /// Number of residual blocks
    pub num_res_blocks: usize,
    /// Channel expansion factor of WDSR blocks
    pub res_expansion: usize,
    /// Optional residual scaling factor
    pub res_scaling: Option<f64>,
    /// Use weight-normalized convolutions
    pub weightnorm: bool,
    /// Batches used for data-based weight norm initialization
    pub num_init_batches: usize,
    /// Copy matching weights from this model before training
    pub pretrained_model: Option<PathBuf>,
}

impl ModelConfig {
    pub fn optimizer(&self) -> OptimizerKind {
        OptimizerKind::from_weightnorm(self.weightnorm)
    }
}

impl Default for ModelConfig {
    fn default() -> Self {
        Self {
            architecture: Architecture::Edsr,
            num_filters: 64,
            num_res_blocks: 16,
            res_expansion: 4,
            res_scaling: None,
            weightnorm: false,
            num_init_batches: 0,
            pretrained_model: None,
        }
    }
}

/// Training hyperparameters
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct TrainingParams {
    pub epochs: usize,
    pub steps_per_epoch: usize,
    /// Validation batches per epoch, ignored in benchmark mode
    pub validation_steps: usize,
    pub batch_size: usize,
    pub learning_rate: f64,
    /// Decay the learning rate every this many epochs
    pub learning_rate_step_size: usize,
    pub learning_rate_decay: f64,
    /// Validate on whole images instead of crops
    pub benchmark: bool,
    pub save_best_models_only: bool,
    pub print_model_summary: bool,
    /// Seed for crop positions, shuffling and weight init
    pub seed: u64,
}

impl TrainingParams {
    /// Benchmark runs always keep only improving checkpoints.
    pub fn save_best_only(&self) -> bool {
        self.save_best_models_only || self.benchmark
    }
}

impl Default for TrainingParams {
    fn default() -> Self {
        Self {
            epochs: 300,
            steps_per_epoch: 1000,
            validation_steps: 100,
            batch_size: 16,
            learning_rate: 1e-3,
            learning_rate_step_size: 200,
            learning_rate_decay: 0.5,
            benchmark: false,
            save_best_models_only: false,
            print_model_summary: false,
            seed: 42,
        }
    }
}

/// Batch loader configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoaderConfig {
    /// Background worker threads, 0 loads on the training thread
    pub num_workers: usize,
    /// Maximum number of prefetched batches
    pub max_queue_size: usize,
}

impl Default for LoaderConfig {
    fn default() -> Self {
        Self {
            num_workers: 1,
            max_queue_size: 16,
        }
    }
}

/// Output configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct OutputConfig {
    /// Parent directory of timestamped training workspaces
    pub outdir: PathBuf,
}

impl Default for OutputConfig {
    fn default() -> Self {
        Self {
            outdir: PathBuf::from("./output"),
        }
    }
}

impl TrainConfig {
    /// Read a TOML file. Missing sections and keys keep their defaults.
    pub fn from_toml_file(path: &Path) -> Result<Self> {
        let content = fs::read_to_string(path)
            .map_err(|e| Error::Config(format!("Failed to read config {}: {e}", path.display())))?;
        toml::from_str(&content)
            .map_err(|e| Error::Config(format!("Failed to parse config {}: {e}", path.display())))
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        let dataset = &self.dataset;
        dataset.downgrade.check_scale(dataset.scale)?;
        if dataset.patch_size == 0 {
            return Err(Error::Config("patch size must be greater than 0".to_string()));
        }

        let model = &self.model;
        if model.num_filters == 0 || model.num_res_blocks == 0 {
            return Err(Error::Config(
                "num_filters and num_res_blocks must be greater than 0".to_string(),
            ));
        }
        if model.architecture.is_wdsr() && model.res_expansion == 0 {
            return Err(Error::Config("res_expansion must be greater than 0".to_string()));
        }
        if model.num_init_batches > 0 && !model.weightnorm {
            return Err(Error::Config(
                "num_init_batches requires weightnorm to be enabled".to_string(),
            ));
        }

        let training = &self.training;
        if training.epochs == 0 || training.steps_per_epoch == 0 {
            return Err(Error::Config(
                "epochs and steps_per_epoch must be greater than 0".to_string(),
            ));
        }
        if training.batch_size == 0 {
            return Err(Error::Config("batch size must be greater than 0".to_string()));
        }
        if !training.benchmark && training.validation_steps == 0 {
            return Err(Error::Config("validation_steps must be greater than 0".to_string()));
        }
        if training.learning_rate <= 0.0 {
            return Err(Error::Config("learning rate must be positive".to_string()));
        }
        if training.learning_rate_step_size == 0 {
            return Err(Error::Config(
                "learning_rate_step_size must be greater than 0".to_string(),
            ));
        }
        if training.learning_rate_decay <= 0.0 {
            return Err(Error::Config("learning_rate_decay must be positive".to_string()));
        }

        if self.loader.max_queue_size == 0 {
            return Err(Error::Config("max_queue_size must be greater than 0".to_string()));
        }

        self.session.validate()
    }

    /// Flatten the configuration into sorted `section.key` / value pairs.
    pub fn key_values(&self) -> Result<BTreeMap<String, String>> {
        let value = serde_json::to_value(self)?;
        let mut pairs = BTreeMap::new();
        flatten_value("", &value, &mut pairs);
        Ok(pairs)
    }
}

fn flatten_value(prefix: &str, value: &serde_json::Value, out: &mut BTreeMap<String, String>) {
    match value {
        serde_json::Value::Object(map) => {
            for (key, nested) in map {
                let key = if prefix.is_empty() {
                    key.clone()
                } else {
                    format!("{prefix}.{key}")
                };
                flatten_value(&key, nested, out);
            }
        }
        serde_json::Value::String(s) => {
            out.insert(prefix.to_string(), s.clone());
        }
        serde_json::Value::Null => {
            out.insert(prefix.to_string(), "None".to_string());
        }
        other => {
            out.insert(prefix.to_string(), other.to_string());
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_config_is_valid() {
        let config = TrainConfig::default();
        assert!(config.validate().is_ok());
        assert_eq!(config.dataset.patch_size, 48);
        assert_eq!(config.training.batch_size, 16);
        assert_eq!(config.model.optimizer(), OptimizerKind::Adam);
    }

    #[test]
    fn test_validation_errors() {
        let mut config = TrainConfig::default();
        config.training.batch_size = 0;
        assert!(matches!(config.validate(), Err(Error::Config(_))));

        let mut config = TrainConfig::default();
        config.dataset.downgrade = Downgrade::Mild;
        assert!(config.validate().is_err());
        config.dataset.scale = Scale::X4;
        assert!(config.validate().is_ok());

        let mut config = TrainConfig::default();
        config.model.num_init_batches = 4;
        assert!(config.validate().is_err());
        config.model.weightnorm = true;
        assert!(config.validate().is_ok());
    }

    #[test]
    fn test_benchmark_forces_best_only() {
        let mut params = TrainingParams::default();
        assert!(!params.save_best_only());
        params.benchmark = true;
        assert!(params.save_best_only());
    }

    #[test]
    fn test_from_toml_file() {
        let dir = tempfile::TempDir::new().unwrap();
        let path = dir.path().join("train.toml");
        fs::write(&path, "[training]\nepochs = 5\nbatch_size = 4\n").unwrap();

        let config = TrainConfig::from_toml_file(&path).unwrap();
        assert_eq!(config.training.epochs, 5);
        assert_eq!(config.training.batch_size, 4);
        assert_eq!(config.dataset.patch_size, 48);

        assert!(matches!(
            TrainConfig::from_toml_file(&dir.path().join("missing.toml")),
            Err(Error::Config(_))
        ));
        let broken = dir.path().join("broken.toml");
        fs::write(&broken, "[training\nepochs = ").unwrap();
        assert!(matches!(TrainConfig::from_toml_file(&broken), Err(Error::Config(_))));
    }

    #[test]
    fn test_partial_toml() {
        let config: TrainConfig = toml::from_str(
            r#"
            [dataset]
            scale = 4
            training_images = "1-100"

            [model]
            architecture = "wdsr-b"
            res_scaling = 0.1
            "#,
        )
        .unwrap();

        assert_eq!(config.dataset.scale, Scale::X4);
        assert_eq!(config.dataset.training_images.len(), 100);
        assert_eq!(config.model.architecture, Architecture::WdsrB);
        assert_eq!(config.model.res_scaling, Some(0.1));
        assert_eq!(config.training.epochs, 300);
    }

    #[test]
    fn test_key_values_sorted_and_dotted() {
        let pairs = TrainConfig::default().key_values().unwrap();
        assert_eq!(pairs.get("dataset.scale").map(String::as_str), Some("2"));
        assert_eq!(pairs.get("model.architecture").map(String::as_str), Some("edsr"));
        assert_eq!(pairs.get("model.res_scaling").map(String::as_str), Some("None"));
        assert_eq!(
            pairs.get("dataset.training_images").map(String::as_str),
            Some("1-800")
        );

        let keys: Vec<_> = pairs.keys().cloned().collect();
        let mut sorted = keys.clone();
        sorted.sort();
        assert_eq!(keys, sorted);
    }
}
