//! Per-epoch model checkpoints monitored on validation PSNR.

use burn::tensor::backend::Backend;
use sr_core::{Error, Result};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{debug, info};

use crate::model::{SrModel, RECORD_EXTENSION};

/// File name of the checkpoint written after `epoch` (1-based).
pub fn checkpoint_name(epoch: usize, val_psnr: f64) -> String {
    format!("epoch-{epoch:03}-psnr-{val_psnr:.4}.{RECORD_EXTENSION}")
}

/// Epoch number encoded in a checkpoint file name
pub fn extract_epoch_from_filename(name: &str) -> Option<usize> {
    name.strip_prefix("epoch-")?.split('-').next()?.parse().ok()
}

/// Validation PSNR encoded in a checkpoint file name
pub fn extract_psnr_from_filename(name: &str) -> Option<f64> {
    let rest = name.split_once("-psnr-")?.1;
    rest.strip_suffix(&format!(".{RECORD_EXTENSION}"))
        .unwrap_or(rest)
        .parse()
        .ok()
}

/// Saves models into the workspace `models/` directory
pub struct CheckpointManager {
    models_dir: PathBuf,
    save_best_only: bool,
    best_psnr: Option<f64>,
}

impl CheckpointManager {
    pub fn new(models_dir: PathBuf) -> Self {
        Self {
            models_dir,
            save_best_only: false,
            best_psnr: None,
        }
    }

    /// Only save epochs that improve on the best validation PSNR
    pub fn save_best_only(mut self, enabled: bool) -> Self {
        self.save_best_only = enabled;
        self
    }

    pub fn models_dir(&self) -> &Path {
        &self.models_dir
    }

    pub fn best_psnr(&self) -> Option<f64> {
        self.best_psnr
    }

    /// Record `val_psnr` and report whether it improves on the best so far.
    pub fn update_best(&mut self, val_psnr: f64) -> bool {
        let improved = match self.best_psnr {
            _ if val_psnr.is_nan() => false,
            None => true,
            Some(best) => val_psnr > best,
        };
        if improved {
            self.best_psnr = Some(val_psnr);
        }
        improved
    }

    /// Save `model` after `epoch` (1-based) unless filtered by the best-only policy.
    pub fn on_epoch_end<B: Backend>(
        &mut self,
        epoch: usize,
        val_psnr: f64,
        model: &SrModel<B>,
    ) -> Result<Option<PathBuf>> {
        let previous = self.best_psnr;
        let improved = self.update_best(val_psnr);

        if self.save_best_only && !improved {
            debug!(
                "Epoch {epoch:03}: val_psnr {val_psnr:.4} did not improve on {:.4}",
                previous.unwrap_or(f64::NAN)
            );
            return Ok(None);
        }

        let path = self.models_dir.join(checkpoint_name(epoch, val_psnr));
        let path = model.save_record(&path)?;
        if improved {
            info!("Epoch {epoch:03}: val_psnr improved to {val_psnr:.4}, saved {}", path.display());
        } else {
            info!("Epoch {epoch:03}: saved {}", path.display());
        }
        Ok(Some(path))
    }

    /// Checkpoint files in the models directory, ordered by epoch
    pub fn list_checkpoints(&self) -> Result<Vec<PathBuf>> {
        if !self.models_dir.exists() {
            return Ok(Vec::new());
        }

        let mut checkpoints: Vec<(usize, PathBuf)> = fs::read_dir(&self.models_dir)?
            .filter_map(|entry| entry.ok().map(|e| e.path()))
            .filter_map(|path| {
                let name = path.file_name()?.to_str()?;
                if !name.ends_with(RECORD_EXTENSION) {
                    return None;
                }
                let epoch = extract_epoch_from_filename(name)?;
                Some((epoch, path))
            })
            .collect();

        checkpoints.sort_by_key(|(epoch, _)| *epoch);
        Ok(checkpoints.into_iter().map(|(_, path)| path).collect())
    }

    /// Checkpoint with the highest PSNR in its file name
    pub fn best_checkpoint(&self) -> Result<Option<PathBuf>> {
        Ok(self
            .list_checkpoints()?
            .into_iter()
            .filter_map(|path| {
                let psnr = extract_psnr_from_filename(path.file_name()?.to_str()?)?;
                Some((psnr, path))
            })
            .max_by(|a, b| a.0.total_cmp(&b.0))
            .map(|(_, path)| path))
    }
}

/// Resolve a `--model` argument to a checkpoint file.
///
/// A file is returned as is. A directory is either a training workspace
/// (with a `models/` subdirectory) or a models directory, and resolves to
/// the checkpoint with the highest PSNR in its file name.
pub fn resolve_checkpoint(path: &Path) -> Result<PathBuf> {
    if path.is_file() {
        return Ok(path.to_path_buf());
    }
    if !path.is_dir() {
        return Err(Error::NotFound(format!("model {}", path.display())));
    }

    let workspace_models = path.join("models");
    let models_dir = if workspace_models.is_dir() {
        workspace_models
    } else {
        path.to_path_buf()
    };
    let best = CheckpointManager::new(models_dir.clone())
        .best_checkpoint()?
        .ok_or_else(|| Error::NotFound(format!("no checkpoints in {}", models_dir.display())))?;
    info!("Using best checkpoint {}", best.display());
    Ok(best)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Session;
    use crate::model::SrModelConfig;
    use burn_ndarray::NdArray;
    use sr_core::{Architecture, Scale, SessionConfig};
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    fn tiny_model() -> SrModel<TestBackend> {
        let session = Session::<TestBackend>::new(SessionConfig::default(), Default::default()).unwrap();
        SrModelConfig::new(Architecture::Edsr, Scale::X2)
            .with_num_filters(2)
            .with_num_res_blocks(1)
            .init(&session)
    }

    #[test]
    fn test_checkpoint_name() {
        assert_eq!(checkpoint_name(7, 32.123456), "epoch-007-psnr-32.1235.mpk");
        assert_eq!(checkpoint_name(120, 28.0), "epoch-120-psnr-28.0000.mpk");
    }

    #[test]
    fn test_extract_from_filename() {
        assert_eq!(extract_epoch_from_filename("epoch-042-psnr-30.5000.mpk"), Some(42));
        assert_eq!(extract_psnr_from_filename("epoch-042-psnr-30.5000.mpk"), Some(30.5));
        assert_eq!(extract_epoch_from_filename("model.json"), None);
        assert_eq!(extract_psnr_from_filename("epoch-001.mpk"), None);
    }

    #[test]
    fn test_update_best_mode_max() {
        let mut manager = CheckpointManager::new(PathBuf::from("unused"));
        assert!(manager.update_best(25.0));
        assert!(!manager.update_best(24.0));
        assert!(!manager.update_best(25.0));
        assert!(!manager.update_best(f64::NAN));
        assert!(manager.update_best(26.5));
        assert_eq!(manager.best_psnr(), Some(26.5));
    }

    #[test]
    fn test_save_best_only() {
        let dir = TempDir::new().unwrap();
        let model = tiny_model();
        let mut manager = CheckpointManager::new(dir.path().join("models")).save_best_only(true);

        assert!(manager.on_epoch_end(1, 20.0, &model).unwrap().is_some());
        assert!(manager.on_epoch_end(2, 19.0, &model).unwrap().is_none());
        assert!(manager.on_epoch_end(3, 21.5, &model).unwrap().is_some());

        let names: Vec<String> = manager
            .list_checkpoints()
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["epoch-001-psnr-20.0000.mpk", "epoch-003-psnr-21.5000.mpk"]);

        let best = manager.best_checkpoint().unwrap().unwrap();
        assert!(best.ends_with("epoch-003-psnr-21.5000.mpk"));
    }

    #[test]
    fn test_resolve_checkpoint() {
        let dir = TempDir::new().unwrap();
        let model = tiny_model();
        let models_dir = dir.path().join("run").join("models");
        let mut manager = CheckpointManager::new(models_dir.clone());
        for (epoch, psnr) in [(1, 27.5), (2, 29.25), (3, 28.0)] {
            manager.on_epoch_end(epoch, psnr, &model).unwrap();
        }
        fs::write(models_dir.join("model.json"), "{}").unwrap();

        let best = models_dir.join("epoch-002-psnr-29.2500.mpk");
        assert_eq!(resolve_checkpoint(&dir.path().join("run")).unwrap(), best);
        assert_eq!(resolve_checkpoint(&models_dir).unwrap(), best);

        let explicit = models_dir.join("epoch-001-psnr-27.5000.mpk");
        assert_eq!(resolve_checkpoint(&explicit).unwrap(), explicit);
    }

    #[test]
    fn test_resolve_checkpoint_errors() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            resolve_checkpoint(&dir.path().join("missing.mpk")),
            Err(Error::NotFound(_))
        ));

        fs::create_dir_all(dir.path().join("empty").join("models")).unwrap();
        assert!(matches!(
            resolve_checkpoint(&dir.path().join("empty")),
            Err(Error::NotFound(_))
        ));
    }

    #[test]
    fn test_save_every_epoch() {
        let dir = TempDir::new().unwrap();
        let model = tiny_model();
        let mut manager = CheckpointManager::new(dir.path().join("models"));

        for (epoch, psnr) in [(1, 20.0), (2, 19.0)] {
            assert!(manager.on_epoch_end(epoch, psnr, &model).unwrap().is_some());
        }
        assert_eq!(manager.list_checkpoints().unwrap().len(), 2);
        assert_eq!(manager.best_psnr(), Some(20.0));
    }
}
