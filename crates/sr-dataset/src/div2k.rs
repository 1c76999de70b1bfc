//! DIV2K directory layout.
//!
//! ```text
//! <root>/DIV2K_train_HR/0001.png
//! <root>/DIV2K_train_LR_bicubic/X2/0001x2.png
//! <root>/DIV2K_train_LR_mild/0001x4m.png
//! ```

use sr_core::{DatasetConfig, Downgrade, Error, Result, Scale, Subset};
use std::path::{Path, PathBuf};

/// Paths of one LR/HR image pair
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PairPaths {
    pub id: u32,
    pub lr: PathBuf,
    pub hr: PathBuf,
}

/// Which pairs of the dataset a sequence serves
#[derive(Debug, Clone)]
pub struct DatasetSelection {
    pub root: PathBuf,
    pub scale: Scale,
    pub subset: Subset,
    pub downgrade: Downgrade,
    pub image_ids: Vec<u32>,
}

impl DatasetSelection {
    pub fn new(
        root: impl Into<PathBuf>,
        scale: Scale,
        subset: Subset,
        downgrade: Downgrade,
        image_ids: Vec<u32>,
    ) -> Self {
        Self {
            root: root.into(),
            scale,
            subset,
            downgrade,
            image_ids,
        }
    }

    /// Training selection of a dataset configuration
    pub fn training(config: &DatasetConfig) -> Self {
        Self::new(
            &config.path,
            config.scale,
            Subset::Train,
            config.downgrade,
            config.training_images.to_vec(),
        )
    }

    /// Validation selection of a dataset configuration
    pub fn validation(config: &DatasetConfig) -> Self {
        Self::new(
            &config.path,
            config.scale,
            Subset::Valid,
            config.downgrade,
            config.validation_images.to_vec(),
        )
    }

    /// Resolve and check the file paths of every selected pair.
    pub fn pairs(&self) -> Result<Vec<PairPaths>> {
        if self.image_ids.is_empty() {
            return Err(Error::Dataset("no image ids selected".to_string()));
        }
        self.downgrade.check_scale(self.scale)?;

        let layout = Div2k::new(&self.root);
        let hr_dir = layout.hr_dir(self.subset);
        let lr_dir = layout.lr_dir(self.subset, self.downgrade, self.scale);
        for dir in [&hr_dir, &lr_dir] {
            if !dir.is_dir() {
                return Err(Error::NotFound(format!(
                    "DIV2K directory not found: {}",
                    dir.display()
                )));
            }
        }

        self.image_ids
            .iter()
            .map(|&id| {
                let pair = PairPaths {
                    id,
                    lr: layout.lr_path(self.subset, self.downgrade, self.scale, id),
                    hr: layout.hr_path(self.subset, id),
                };
                for path in [&pair.lr, &pair.hr] {
                    if !path.is_file() {
                        return Err(Error::NotFound(format!(
                            "Image file not found: {}",
                            path.display()
                        )));
                    }
                }
                Ok(pair)
            })
            .collect()
    }
}

/// DIV2K root directory
#[derive(Debug, Clone)]
pub struct Div2k {
    root: PathBuf,
}

impl Div2k {
    pub fn new(root: impl AsRef<Path>) -> Self {
        Self {
            root: root.as_ref().to_path_buf(),
        }
    }

    pub fn hr_dir(&self, subset: Subset) -> PathBuf {
        self.root.join(format!("DIV2K_{subset}_HR"))
    }

    pub fn lr_dir(&self, subset: Subset, downgrade: Downgrade, scale: Scale) -> PathBuf {
        let dir = self.root.join(format!("DIV2K_{subset}_LR_{downgrade}"));
        if downgrade.is_multi_scale() {
            dir.join(format!("X{scale}"))
        } else {
            dir
        }
    }

    pub fn hr_path(&self, subset: Subset, id: u32) -> PathBuf {
        self.hr_dir(subset).join(format!("{id:04}.png"))
    }

    pub fn lr_path(&self, subset: Subset, downgrade: Downgrade, scale: Scale, id: u32) -> PathBuf {
        self.lr_dir(subset, downgrade, scale)
            .join(format!("{id:04}x{scale}{}.png", downgrade.file_suffix()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    #[test]
    fn test_paths() {
        let layout = Div2k::new("/data/div2k");
        assert_eq!(
            layout.hr_path(Subset::Train, 1),
            PathBuf::from("/data/div2k/DIV2K_train_HR/0001.png")
        );
        assert_eq!(
            layout.lr_path(Subset::Valid, Downgrade::Bicubic, Scale::X3, 801),
            PathBuf::from("/data/div2k/DIV2K_valid_LR_bicubic/X3/0801x3.png")
        );
        assert_eq!(
            layout.lr_path(Subset::Train, Downgrade::Wild, Scale::X4, 12),
            PathBuf::from("/data/div2k/DIV2K_train_LR_wild/0012x4w.png")
        );
    }

    #[test]
    fn test_pairs_missing_directory() {
        let dir = TempDir::new().unwrap();
        let selection = DatasetSelection::new(
            dir.path(),
            Scale::X2,
            Subset::Train,
            Downgrade::Bicubic,
            vec![1],
        );
        assert!(matches!(selection.pairs(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_pairs_missing_file() {
        let dir = TempDir::new().unwrap();
        let layout = Div2k::new(dir.path());
        std::fs::create_dir_all(layout.hr_dir(Subset::Train)).unwrap();
        std::fs::create_dir_all(layout.lr_dir(Subset::Train, Downgrade::Bicubic, Scale::X2)).unwrap();
        image::RgbImage::new(4, 4)
            .save(layout.hr_path(Subset::Train, 1))
            .unwrap();
        image::RgbImage::new(2, 2)
            .save(layout.lr_path(Subset::Train, Downgrade::Bicubic, Scale::X2, 1))
            .unwrap();

        let ok = DatasetSelection::new(dir.path(), Scale::X2, Subset::Train, Downgrade::Bicubic, vec![1]);
        let pairs = ok.pairs().unwrap();
        assert_eq!(pairs.len(), 1);
        assert_eq!(pairs[0].id, 1);

        let missing = DatasetSelection::new(dir.path(), Scale::X2, Subset::Train, Downgrade::Bicubic, vec![1, 2]);
        assert!(matches!(missing.pairs(), Err(Error::NotFound(_))));
    }

    #[test]
    fn test_pairs_rejects_bad_combinations() {
        let empty = DatasetSelection::new("/nowhere", Scale::X2, Subset::Train, Downgrade::Bicubic, vec![]);
        assert!(matches!(empty.pairs(), Err(Error::Dataset(_))));

        let mild_x2 = DatasetSelection::new("/nowhere", Scale::X2, Subset::Train, Downgrade::Mild, vec![1]);
        assert!(matches!(mild_x2.pairs(), Err(Error::Config(_))));
    }
}
