//! Super-resolving images with a trained model.

use std::fs;
use std::path::{Path, PathBuf};
use std::time::{Duration, Instant};

use burn::tensor::backend::Backend;
use image::RgbImage;
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use sr_core::{Error, Result};
use sr_dataset::{image_paths, images_to_tensor, load_image, resolved_name, save_image, tensor_to_images};
use tracing::{debug, info};

use crate::model::{Phase, SrModel};

/// Result of resolving one image file
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ResolvedImage {
    pub input: PathBuf,
    pub output: PathBuf,
    /// `(width, height)` of the input
    pub input_size: (u32, u32),
    /// `(width, height)` of the output
    pub output_size: (u32, u32),
    pub inference_time_ms: f64,
}

impl ResolvedImage {
    fn new(input: &Path, output: &Path, lr: &RgbImage, sr: &RgbImage, elapsed: Duration) -> Self {
        Self {
            input: input.to_path_buf(),
            output: output.to_path_buf(),
            input_size: lr.dimensions(),
            output_size: sr.dimensions(),
            inference_time_ms: elapsed.as_secs_f64() * 1000.0,
        }
    }
}

/// Runs a model in evaluation phase on single images
pub struct Resolver<B: Backend> {
    model: SrModel<B>,
    device: B::Device,
}

impl<B: Backend> Resolver<B> {
    pub fn new(model: SrModel<B>, device: B::Device) -> Self {
        Self { model, device }
    }

    /// Super-resolve one image as a batch of one.
    ///
    /// The output is clipped to [0, 255] and truncated to u8.
    pub fn resolve(&self, lr: &RgbImage) -> Result<RgbImage> {
        let x = images_to_tensor::<B>(std::slice::from_ref(lr), &self.device);
        let y = self.model.forward(x, Phase::Eval);
        tensor_to_images(y)?
            .into_iter()
            .next()
            .ok_or_else(|| Error::Model("model returned an empty batch".to_string()))
    }

    /// Resolve `input` and write the result to `output`.
    pub fn resolve_file(&self, input: &Path, output: &Path) -> Result<ResolvedImage> {
        let lr = load_image(input)?;
        let start = Instant::now();
        let sr = self.resolve(&lr)?;
        let elapsed = start.elapsed();
        save_image(&sr, output)?;
        debug!(
            "{} -> {} in {:.1} ms",
            input.display(),
            output.display(),
            elapsed.as_secs_f64() * 1000.0
        );
        Ok(ResolvedImage::new(input, output, &lr, &sr, elapsed))
    }

    /// Resolve every `*.jpg` and `*.png` of `indir` into `outdir` as `<stem>-sr<ext>`.
    ///
    /// The output directory is created if needed. The first failing image
    /// aborts the run.
    pub fn resolve_directory(&self, indir: &Path, outdir: &Path) -> Result<Vec<ResolvedImage>> {
        let inputs = image_paths(indir)?;
        fs::create_dir_all(outdir)?;
        info!(
            "Resolving {} images from {} into {}",
            inputs.len(),
            indir.display(),
            outdir.display()
        );

        let progress = ProgressBar::new(inputs.len() as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        let mut results = Vec::with_capacity(inputs.len());
        for input in &inputs {
            let output = outdir.join(resolved_name(input)?);
            match self.resolve_file(input, &output) {
                Ok(result) => results.push(result),
                Err(e) => {
                    progress.abandon();
                    return Err(e);
                }
            }
            progress.inc(1);
        }
        progress.finish_and_clear();

        Ok(results)
    }
}
