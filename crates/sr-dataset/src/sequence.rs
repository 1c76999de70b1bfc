//! Batch sequences over DIV2K image pairs.
//!
//! A [`CroppedSequence`] serves random aligned crops for training, a
//! [`FullsizeSequence`] serves whole images one at a time for benchmarking.
//! Both are immutable after construction and can be shared across loader
//! threads; randomness is supplied by the caller per batch.

use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use rand::RngCore;
use rayon::prelude::*;
use sr_core::{Error, Result, Scale};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, OnceLock};
use tracing::{debug, info};

use crate::crop::{max_lr_corner, random_crop_pair};
use crate::div2k::{DatasetSelection, PairPaths};
use crate::loader::{image_dimensions, load_image};

/// A low-resolution image and its high-resolution counterpart
#[derive(Debug, Clone)]
pub struct ImagePair {
    pub lr: RgbImage,
    pub hr: RgbImage,
}

/// Parallel LR and HR images of one batch
#[derive(Debug, Clone, Default)]
pub struct PairBatch {
    pub lr: Vec<RgbImage>,
    pub hr: Vec<RgbImage>,
}

impl PairBatch {
    pub fn with_capacity(capacity: usize) -> Self {
        Self {
            lr: Vec::with_capacity(capacity),
            hr: Vec::with_capacity(capacity),
        }
    }

    pub fn push(&mut self, lr: RgbImage, hr: RgbImage) {
        self.lr.push(lr);
        self.hr.push(hr);
    }

    pub fn len(&self) -> usize {
        self.lr.len()
    }

    pub fn is_empty(&self) -> bool {
        self.lr.is_empty()
    }

    /// `(N, H, W, 3)` of the LR images, `None` if they differ in size
    pub fn lr_shape(&self) -> Option<[usize; 4]> {
        stacked_shape(&self.lr)
    }

    /// `(N, H, W, 3)` of the HR images, `None` if they differ in size
    pub fn hr_shape(&self) -> Option<[usize; 4]> {
        stacked_shape(&self.hr)
    }

    pub fn into_pairs(self) -> Vec<ImagePair> {
        self.lr
            .into_iter()
            .zip(self.hr)
            .map(|(lr, hr)| ImagePair { lr, hr })
            .collect()
    }
}

fn stacked_shape(images: &[RgbImage]) -> Option<[usize; 4]> {
    let (width, height) = images.first()?.dimensions();
    images
        .iter()
        .all(|image| image.dimensions() == (width, height))
        .then_some([images.len(), height as usize, width as usize, 3])
}

/// Indexed source of batches shared by the loader and the trainer
pub trait PairSequence: Send + Sync {
    /// Number of batches
    fn len(&self) -> usize;

    fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Produce batch `index`. Random crop positions are drawn from `rng`.
    fn get_batch(&self, index: usize, rng: &mut dyn RngCore) -> Result<PairBatch>;
}

/// Pair files with an optional in-memory cache of decoded images
struct PairSource {
    pairs: Vec<PairPaths>,
    cache: Option<Vec<OnceLock<Arc<ImagePair>>>>,
}

impl PairSource {
    fn new(selection: &DatasetSelection, cache_images: bool) -> Result<Self> {
        let pairs = selection.pairs()?;
        let cache = cache_images.then(|| pairs.iter().map(|_| OnceLock::new()).collect());
        debug!(
            "{} {} pairs at x{} ({})",
            pairs.len(),
            selection.subset,
            selection.scale,
            selection.downgrade
        );
        Ok(Self { pairs, cache })
    }

    fn len(&self) -> usize {
        self.pairs.len()
    }

    fn paths(&self, index: usize) -> Result<&PairPaths> {
        self.pairs.get(index).ok_or_else(|| {
            Error::InvalidArgument(format!(
                "pair index {index} out of range for {} pairs",
                self.pairs.len()
            ))
        })
    }

    fn read(&self, index: usize) -> Result<ImagePair> {
        let paths = self.paths(index)?;
        Ok(ImagePair {
            lr: load_image(&paths.lr)?,
            hr: load_image(&paths.hr)?,
        })
    }

    fn get(&self, index: usize) -> Result<Arc<ImagePair>> {
        let Some(cache) = &self.cache else {
            return self.read(index).map(Arc::new);
        };

        let cell = cache.get(index).ok_or_else(|| {
            Error::InvalidArgument(format!("pair index {index} out of range"))
        })?;
        if let Some(pair) = cell.get() {
            return Ok(Arc::clone(pair));
        }

        let pair = Arc::new(self.read(index)?);
        // Another worker may have filled the cell meanwhile, either copy is valid.
        Ok(Arc::clone(cell.get_or_init(|| pair)))
    }

    /// Decode every pair into the cache using the rayon pool.
    fn preload(&self) -> Result<()> {
        if self.cache.is_none() {
            return Ok(());
        }

        let pb = ProgressBar::new(self.len() as u64);
        if let Ok(style) = ProgressStyle::default_bar()
            .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} pairs cached")
        {
            pb.set_style(style.progress_chars("=>-"));
        }

        let loaded = AtomicUsize::new(0);
        (0..self.len()).into_par_iter().try_for_each(|index| {
            self.get(index)?;
            let count = loaded.fetch_add(1, Ordering::Relaxed) + 1;
            pb.set_position(count as u64);
            Ok::<_, Error>(())
        })?;

        pb.finish_and_clear();
        info!("Cached {} image pairs", self.len());
        Ok(())
    }

    fn label(&self, index: usize) -> String {
        self.pairs
            .get(index)
            .map(|p| p.lr.display().to_string())
            .unwrap_or_default()
    }
}

/// Random aligned crops, `batch_size` pairs per batch
pub struct CroppedSequence {
    source: PairSource,
    scale: Scale,
    batch_size: usize,
    patch_size: u32,
}

impl CroppedSequence {
    /// Create the sequence, rejecting any pair too small for `patch_size`.
    pub fn new(
        selection: &DatasetSelection,
        batch_size: usize,
        patch_size: u32,
        cache_images: bool,
    ) -> Result<Self> {
        if batch_size == 0 {
            return Err(Error::Config("batch size must be greater than 0".to_string()));
        }
        if patch_size == 0 {
            return Err(Error::Config("patch size must be greater than 0".to_string()));
        }

        let source = PairSource::new(selection, cache_images)?;
        for pair in &source.pairs {
            max_lr_corner(
                image_dimensions(&pair.lr)?,
                image_dimensions(&pair.hr)?,
                patch_size,
                selection.scale,
                &pair.lr.display().to_string(),
            )?;
        }
        source.preload()?;

        Ok(Self {
            source,
            scale: selection.scale,
            batch_size,
            patch_size,
        })
    }

    pub fn num_images(&self) -> usize {
        self.source.len()
    }
}

impl PairSequence for CroppedSequence {
    fn len(&self) -> usize {
        self.source.len().div_ceil(self.batch_size)
    }

    fn get_batch(&self, index: usize, rng: &mut dyn RngCore) -> Result<PairBatch> {
        if index >= self.len() {
            return Err(Error::InvalidArgument(format!(
                "batch index {index} out of range for {} batches",
                self.len()
            )));
        }

        let start = index * self.batch_size;
        let end = (start + self.batch_size).min(self.source.len());
        let mut batch = PairBatch::with_capacity(end - start);

        for i in start..end {
            let pair = self.source.get(i)?;
            let (lr, hr) = random_crop_pair(
                &pair.lr,
                &pair.hr,
                self.patch_size,
                self.scale,
                &self.source.label(i),
                rng,
            )?;
            batch.push(lr, hr);
        }

        Ok(batch)
    }
}

/// Whole images at native resolution, one pair per batch
pub struct FullsizeSequence {
    source: PairSource,
}

impl FullsizeSequence {
    pub fn new(selection: &DatasetSelection, cache_images: bool) -> Result<Self> {
        let source = PairSource::new(selection, cache_images)?;
        source.preload()?;
        Ok(Self { source })
    }

    /// DIV2K id of the image served at `index`
    pub fn image_id(&self, index: usize) -> Option<u32> {
        self.source.pairs.get(index).map(|p| p.id)
    }
}

impl PairSequence for FullsizeSequence {
    fn len(&self) -> usize {
        self.source.len()
    }

    fn get_batch(&self, index: usize, _rng: &mut dyn RngCore) -> Result<PairBatch> {
        let pair = self.source.get(index)?;
        let pair = Arc::try_unwrap(pair).unwrap_or_else(|shared| (*shared).clone());

        let mut batch = PairBatch::with_capacity(1);
        batch.push(pair.lr, pair.hr);
        Ok(batch)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_pair_batch_shapes() {
        let mut batch = PairBatch::default();
        assert!(batch.lr_shape().is_none());

        batch.push(RgbImage::new(8, 6), RgbImage::new(16, 12));
        batch.push(RgbImage::new(8, 6), RgbImage::new(16, 12));
        assert_eq!(batch.len(), 2);
        assert_eq!(batch.lr_shape(), Some([2, 6, 8, 3]));
        assert_eq!(batch.hr_shape(), Some([2, 12, 16, 3]));

        batch.push(RgbImage::new(4, 4), RgbImage::new(8, 8));
        assert!(batch.lr_shape().is_none());
        assert_eq!(batch.into_pairs().len(), 3);
    }
}
