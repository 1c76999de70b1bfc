//! Benchmark evaluation on whole DIV2K validation images.

use std::fs;
use std::path::Path;
use std::time::Instant;

use burn::tensor::{backend::Backend, ElementConversion};
use indicatif::{ProgressBar, ProgressStyle};
use serde::{Deserialize, Serialize};
use sr_core::{Error, Result, Scale};
use sr_dataset::{batch_rng, FullsizeSequence, PairSequence, SrBatcher};
use tracing::info;

use crate::loss::{psnr_per_image, MAX_PIXEL_VALUE};
use crate::model::{Phase, SrModel};

/// PSNR of one validation image
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImagePsnr {
    pub image_id: u32,
    pub psnr: f64,
}

/// Result of a benchmark run
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EvaluationReport {
    pub scale: Scale,
    pub num_images: usize,
    pub mean_psnr: f64,
    pub per_image: Vec<ImagePsnr>,
    pub avg_inference_time_ms: f64,
}

impl EvaluationReport {
    pub fn save_json(&self, path: &Path) -> Result<()> {
        if let Some(parent) = path.parent() {
            fs::create_dir_all(parent)?;
        }
        fs::write(path, serde_json::to_string_pretty(self)?)?;
        Ok(())
    }
}

/// Evaluates a model on a fullsize sequence
pub struct Evaluator<B: Backend> {
    model: SrModel<B>,
    scale: Scale,
    device: B::Device,
}

impl<B: Backend> Evaluator<B> {
    pub fn new(model: SrModel<B>, scale: Scale, device: B::Device) -> Self {
        Self { model, scale, device }
    }

    /// PSNR of every image of `sequence`, with the model output clipped to [0, 255].
    pub fn evaluate(&self, sequence: &FullsizeSequence) -> Result<EvaluationReport> {
        let num_images = sequence.len();
        if num_images == 0 {
            return Err(Error::Dataset("no validation images to evaluate".to_string()));
        }
        info!("Evaluating on {num_images} images at x{}", self.scale);

        let batcher = SrBatcher::<B>::new(self.device.clone());
        let progress = ProgressBar::new(num_images as u64);
        progress.set_style(
            ProgressStyle::default_bar()
                .template("[{elapsed_precise}] [{bar:40.cyan/blue}] {pos}/{len} images ({eta})")
                .unwrap_or_else(|_| ProgressStyle::default_bar())
                .progress_chars("=>-"),
        );

        let mut per_image = Vec::with_capacity(num_images);
        let mut total_time_ms = 0.0;

        for index in 0..num_images {
            // fullsize batches do not draw from the RNG
            let mut rng = batch_rng(0, 0, index);
            let batch = batcher.batch_pairs(sequence.get_batch(index, &mut rng)?);

            let start = Instant::now();
            let output = self
                .model
                .forward(batch.lr, Phase::Eval)
                .clamp(0.0, MAX_PIXEL_VALUE);
            let psnr: f64 = psnr_per_image(batch.hr, output, Phase::Eval)
                .into_scalar()
                .elem();
            total_time_ms += start.elapsed().as_secs_f64() * 1000.0;

            let image_id = sequence.image_id(index).unwrap_or(index as u32);
            per_image.push(ImagePsnr { image_id, psnr });
            progress.inc(1);
        }
        progress.finish_and_clear();

        let mean_psnr = per_image.iter().map(|p| p.psnr).sum::<f64>() / num_images as f64;
        info!("Mean PSNR over {num_images} images: {mean_psnr:.4} dB");

        Ok(EvaluationReport {
            scale: self.scale,
            num_images,
            mean_psnr,
            per_image,
            avg_inference_time_ms: total_time_ms / num_images as f64,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backend::Session;
    use crate::model::SrModelConfig;
    use burn_ndarray::NdArray;
    use sr_core::{Architecture, Downgrade, SessionConfig, Subset};
    use sr_dataset::synthetic::write_synthetic_div2k;
    use sr_dataset::DatasetSelection;
    use tempfile::TempDir;

    type TestBackend = NdArray<f32>;

    #[test]
    fn test_evaluate_reports_every_image() {
        let dir = TempDir::new().unwrap();
        write_synthetic_div2k(dir.path(), Subset::Valid, Downgrade::Bicubic, Scale::X2, 801..=803, (20, 16))
            .unwrap();
        let selection = DatasetSelection::new(
            dir.path(),
            Scale::X2,
            Subset::Valid,
            Downgrade::Bicubic,
            vec![801, 802, 803],
        );
        let sequence = FullsizeSequence::new(&selection, false).unwrap();

        let session = Session::<TestBackend>::new(SessionConfig::default(), Default::default()).unwrap();
        let model = SrModelConfig::new(Architecture::WdsrA, Scale::X2)
            .with_num_filters(4)
            .with_num_res_blocks(1)
            .with_res_expansion(2)
            .init(&session);

        let report = Evaluator::new(model, Scale::X2, session.device().clone())
            .evaluate(&sequence)
            .unwrap();

        assert_eq!(report.num_images, 3);
        let ids: Vec<u32> = report.per_image.iter().map(|p| p.image_id).collect();
        assert_eq!(ids, vec![801, 802, 803]);
        assert!(report.per_image.iter().all(|p| p.psnr.is_finite() && p.psnr > 0.0));

        let path = dir.path().join("report.json");
        report.save_json(&path).unwrap();
        let json: serde_json::Value = serde_json::from_str(&fs::read_to_string(path).unwrap()).unwrap();
        assert_eq!(json["num_images"], 3);
        assert_eq!(json["scale"], 2);
    }
}
