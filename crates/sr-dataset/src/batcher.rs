//! Conversion between RGB8 images and burn tensors.
//!
//! Tensors are `[N, 3, H, W]` floats on the 0-255 scale of the source pixels.

use burn::{
    data::dataloader::batcher::Batcher,
    tensor::{backend::Backend, Tensor, TensorData},
};
use image::RgbImage;
use sr_core::{Error, Result};

use crate::sequence::{ImagePair, PairBatch};

/// A batch of LR/HR tensors ready for the model
#[derive(Clone, Debug)]
pub struct SrBatch<B: Backend> {
    /// `[N, 3, h, w]`
    pub lr: Tensor<B, 4>,
    /// `[N, 3, h * scale, w * scale]`
    pub hr: Tensor<B, 4>,
}

/// Batcher stacking image pairs into [`SrBatch`]es
#[derive(Clone, Debug)]
pub struct SrBatcher<B: Backend> {
    device: B::Device,
}

impl<B: Backend> SrBatcher<B> {
    pub fn new(device: B::Device) -> Self {
        Self { device }
    }

    pub fn batch_pairs(&self, batch: PairBatch) -> SrBatch<B> {
        self.batch(batch.into_pairs())
    }
}

impl<B: Backend> Batcher<ImagePair, SrBatch<B>> for SrBatcher<B> {
    fn batch(&self, items: Vec<ImagePair>) -> SrBatch<B> {
        let (lr, hr): (Vec<RgbImage>, Vec<RgbImage>) =
            items.into_iter().map(|pair| (pair.lr, pair.hr)).unzip();

        SrBatch {
            lr: images_to_tensor(&lr, &self.device),
            hr: images_to_tensor(&hr, &self.device),
        }
    }
}

/// Stack equally sized images into a `[N, 3, H, W]` tensor.
///
/// Panics if the images differ in size; sequences never produce such batches.
pub fn images_to_tensor<B: Backend>(images: &[RgbImage], device: &B::Device) -> Tensor<B, 4> {
    let (width, height) = images.first().map(|i| i.dimensions()).unwrap_or((0, 0));

    let values: Vec<f32> = images
        .iter()
        .flat_map(|image| image.as_raw().iter().map(|&v| v as f32))
        .collect();

    Tensor::<B, 4>::from_data(
        TensorData::new(values, [images.len(), height as usize, width as usize, 3]),
        device,
    )
    .permute([0, 3, 1, 2])
}

/// Clip a `[N, 3, H, W]` tensor to 0-255 and convert it to RGB8 images.
pub fn tensor_to_images<B: Backend>(tensor: Tensor<B, 4>) -> Result<Vec<RgbImage>> {
    let [n, _, height, width] = tensor.dims();

    let values = tensor
        .clamp(0.0, 255.0)
        .permute([0, 2, 3, 1])
        .into_data()
        .convert::<f32>()
        .to_vec::<f32>()
        .map_err(|e| Error::Tensor(format!("Failed to read tensor data: {e:?}")))?;

    let pixels = height * width * 3;
    values
        .chunks(pixels.max(1))
        .take(n)
        .map(|chunk| {
            let raw: Vec<u8> = chunk.iter().map(|&v| v as u8).collect();
            RgbImage::from_raw(width as u32, height as u32, raw)
                .ok_or_else(|| Error::Tensor("tensor does not match image size".to_string()))
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn pattern(width: u32, height: u32, offset: u8) -> RgbImage {
        RgbImage::from_fn(width, height, |x, y| {
            image::Rgb([x as u8 + offset, y as u8 + offset, offset])
        })
    }

    #[test]
    fn test_batch_shapes_and_channel_layout() {
        let batcher = SrBatcher::<TestBackend>::new(Default::default());
        let items = vec![
            ImagePair {
                lr: pattern(4, 3, 0),
                hr: pattern(8, 6, 0),
            },
            ImagePair {
                lr: pattern(4, 3, 10),
                hr: pattern(8, 6, 10),
            },
        ];

        let batch = batcher.batch(items);
        assert_eq!(batch.lr.dims(), [2, 3, 3, 4]);
        assert_eq!(batch.hr.dims(), [2, 3, 6, 8]);

        // Red channel of the second LR image at (x=3, y=2)
        let value = batch
            .lr
            .slice([1..2, 0..1, 2..3, 3..4])
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        assert_eq!(value, vec![13.0]);
    }

    #[test]
    fn test_tensor_to_images_clips_and_truncates() {
        let device = Default::default();
        let images = vec![pattern(5, 4, 1)];
        let tensor = images_to_tensor::<TestBackend>(&images, &device);
        assert_eq!(tensor_to_images(tensor.clone()).unwrap(), images);

        let shifted = tensor_to_images((tensor.clone() * 100.0) - 150.0).unwrap();
        assert_eq!(shifted[0].get_pixel(0, 0).0, [0, 0, 0]);
        assert_eq!(shifted[0].get_pixel(4, 3).0, [255, 250, 0]);

        let fraction = tensor_to_images(tensor + 0.9).unwrap();
        assert_eq!(fraction[0].get_pixel(2, 1).0, [3, 2, 1]);
    }
}
