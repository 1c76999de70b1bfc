//! Tensor helpers shared by the architectures.

use burn::tensor::{backend::Backend, Tensor, TensorData};
use sr_core::DIV2K_RGB_MEAN;

const HALF_RANGE: f32 = 127.5;

fn rgb_mean<B: Backend>(device: &B::Device) -> Tensor<B, 4> {
    Tensor::from_data(TensorData::new(DIV2K_RGB_MEAN.to_vec(), [1, 3, 1, 1]), device)
}

/// Map 0-255 pixels to roughly [-1, 1] around the DIV2K mean.
pub fn normalize<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let mean = rgb_mean::<B>(&x.device());
    (x - mean) / HALF_RANGE
}

pub fn denormalize<B: Backend>(x: Tensor<B, 4>) -> Tensor<B, 4> {
    let mean = rgb_mean::<B>(&x.device());
    x * HALF_RANGE + mean
}

/// Rearrange `[N, C*r*r, H, W]` into `[N, C, H*r, W*r]`.
///
/// Output pixel `(h*r + i, w*r + j)` of channel `c` comes from input channel
/// `c*r*r + i*r + j`.
pub fn pixel_shuffle<B: Backend>(x: Tensor<B, 4>, r: usize) -> Tensor<B, 4> {
    let [n, c, h, w] = x.dims();
    let c_out = c / (r * r);
    x.reshape([n, c_out, r, r, h, w])
        .permute([0, 1, 4, 2, 5, 3])
        .reshape([n, c_out, h * r, w * r])
}

/// Pad height and width by mirroring the border, edge pixels included.
pub fn pad_symmetric<B: Backend>(x: Tensor<B, 4>, pad: usize) -> Tensor<B, 4> {
    if pad == 0 {
        return x;
    }

    let [n, c, h, _] = x.dims();
    let top = x.clone().slice([0..n, 0..c, 0..pad]).flip([2]);
    let bottom = x.clone().slice([0..n, 0..c, h - pad..h]).flip([2]);
    let x = Tensor::cat(vec![top, x, bottom], 2);

    let [n, c, h, w] = x.dims();
    let left = x.clone().slice([0..n, 0..c, 0..h, 0..pad]).flip([3]);
    let right = x.clone().slice([0..n, 0..c, 0..h, w - pad..w]).flip([3]);
    Tensor::cat(vec![left, x, right], 3)
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn tensor(values: Vec<f32>, shape: [usize; 4]) -> Tensor<TestBackend, 4> {
        Tensor::from_data(TensorData::new(values, shape), &Default::default())
    }

    fn values(t: Tensor<TestBackend, 4>) -> Vec<f32> {
        t.into_data().to_vec::<f32>().unwrap()
    }

    #[test]
    fn test_normalize_round_trip() {
        let x = tensor((0..12).map(|v| v as f32 * 20.0).collect(), [1, 3, 2, 2]);
        let normalized = normalize(x.clone());
        let first = values(normalized.clone())[0];
        assert!((first - (0.0 - DIV2K_RGB_MEAN[0]) / 127.5).abs() < 1e-5);

        for (a, b) in values(denormalize(normalized)).iter().zip(values(x)) {
            assert!((a - b).abs() < 1e-3);
        }
    }

    #[test]
    fn test_pixel_shuffle_layout() {
        // one output channel, r = 2, input 1x1: channels become a 2x2 block
        let x = tensor(vec![1.0, 2.0, 3.0, 4.0], [1, 4, 1, 1]);
        let y = pixel_shuffle(x, 2);
        assert_eq!(y.dims(), [1, 1, 2, 2]);
        assert_eq!(values(y), vec![1.0, 2.0, 3.0, 4.0]);

        // two input pixels side by side
        let x = tensor(vec![1.0, 5.0, 2.0, 6.0, 3.0, 7.0, 4.0, 8.0], [1, 4, 1, 2]);
        let y = pixel_shuffle(x, 2);
        assert_eq!(y.dims(), [1, 1, 2, 4]);
        assert_eq!(values(y), vec![1.0, 2.0, 5.0, 6.0, 3.0, 4.0, 7.0, 8.0]);
    }

    #[test]
    fn test_pixel_shuffle_x3_shape() {
        let x = Tensor::<TestBackend, 4>::zeros([2, 27, 5, 4], &Default::default());
        assert_eq!(pixel_shuffle(x, 3).dims(), [2, 3, 15, 12]);
    }

    #[test]
    fn test_pad_symmetric() {
        let x = tensor(vec![1.0, 2.0, 3.0, 4.0, 5.0, 6.0], [1, 1, 2, 3]);
        let y = pad_symmetric(x, 2);
        assert_eq!(y.dims(), [1, 1, 6, 7]);

        let r1 = [2.0, 1.0, 1.0, 2.0, 3.0, 3.0, 2.0];
        let r2 = [5.0, 4.0, 4.0, 5.0, 6.0, 6.0, 5.0];
        let expected: Vec<f32> = [r2, r1, r1, r2, r2, r1].concat();
        assert_eq!(values(y), expected);
    }
}
