//! Training loss and PSNR metric.
//!
//! During training WDSR predicts a smaller image than the HR crop, so the
//! HR target is cropped by the size difference before comparing. In
//! evaluation both already have the same size.

use burn::tensor::{backend::Backend, Tensor};

use crate::model::Phase;

/// Peak value of the pixel range
pub const MAX_PIXEL_VALUE: f64 = 255.0;

/// Pixels to remove from each side of `hr` to match `sr`.
pub fn training_margin<B: Backend>(hr: &Tensor<B, 4>, sr: &Tensor<B, 4>) -> usize {
    let [_, _, hr_h, _] = hr.dims();
    let [_, _, sr_h, _] = sr.dims();
    hr_h.saturating_sub(sr_h) / 2
}

/// HR target to compare against `sr` in `phase`.
pub fn crop_hr_in_training<B: Backend>(hr: Tensor<B, 4>, sr: &Tensor<B, 4>, phase: Phase) -> Tensor<B, 4> {
    if phase == Phase::Eval {
        return hr;
    }

    let margin = training_margin(&hr, sr);
    if margin == 0 {
        return hr;
    }
    let [n, c, h, w] = hr.dims();
    hr.slice([0..n, 0..c, margin..h - margin, margin..w - margin])
}

/// Mean absolute error over the whole batch, `[1]`.
pub fn mae<B: Backend>(hr: Tensor<B, 4>, sr: Tensor<B, 4>, phase: Phase) -> Tensor<B, 1> {
    let hr = crop_hr_in_training(hr, &sr, phase);
    (hr - sr).abs().mean()
}

/// PSNR of every image in the batch, `[N]`.
pub fn psnr_per_image<B: Backend>(hr: Tensor<B, 4>, sr: Tensor<B, 4>, phase: Phase) -> Tensor<B, 1> {
    let hr = crop_hr_in_training(hr, &sr, phase);
    let [n, c, h, w] = hr.dims();
    let mse = (hr - sr)
        .powf_scalar(2.0)
        .reshape([n, c * h * w])
        .mean_dim(1)
        .reshape([n]);

    // 10 * log10(max^2 / mse)
    let numerator = (MAX_PIXEL_VALUE * MAX_PIXEL_VALUE).ln();
    (mse.log().neg() + numerator) * (10.0 / std::f64::consts::LN_10)
}

/// PSNR averaged over the batch, `[1]`.
pub fn psnr<B: Backend>(hr: Tensor<B, 4>, sr: Tensor<B, 4>, phase: Phase) -> Tensor<B, 1> {
    psnr_per_image(hr, sr, phase).mean()
}

#[cfg(test)]
mod tests {
    use super::*;
    use burn::tensor::TensorData;
    use burn_ndarray::NdArray;

    type TestBackend = NdArray<f32>;

    fn scalar(t: Tensor<TestBackend, 1>) -> f32 {
        t.into_data().to_vec::<f32>().unwrap()[0]
    }

    #[test]
    fn test_mae() {
        let device = Default::default();
        let hr = Tensor::<TestBackend, 4>::full([2, 3, 4, 4], 10.0, &device);
        let sr = Tensor::<TestBackend, 4>::full([2, 3, 4, 4], 13.0, &device);
        assert!((scalar(mae(hr.clone(), sr, Phase::Train)) - 3.0).abs() < 1e-5);

        let identical = scalar(mae(hr.clone(), hr, Phase::Eval));
        assert_eq!(identical, 0.0);
    }

    #[test]
    fn test_training_crop_removes_margin() {
        let device = Default::default();
        let mut values = vec![100.0f32; 8 * 8];
        // border of 2 pixels is far off, the center matches sr
        for y in 0..8 {
            for x in 0..8 {
                if !(2..6).contains(&x) || !(2..6).contains(&y) {
                    values[y * 8 + x] = 0.0;
                }
            }
        }
        let hr = Tensor::<TestBackend, 4>::from_data(TensorData::new(values, [1, 1, 8, 8]), &device);
        let sr = Tensor::<TestBackend, 4>::full([1, 1, 4, 4], 100.0, &device);

        assert_eq!(training_margin(&hr, &sr), 2);
        assert_eq!(crop_hr_in_training(hr.clone(), &sr, Phase::Train).dims(), [1, 1, 4, 4]);
        assert_eq!(scalar(mae(hr, sr, Phase::Train)), 0.0);
    }

    #[test]
    fn test_eval_does_not_crop() {
        let device = Default::default();
        let hr = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        let sr = Tensor::<TestBackend, 4>::zeros([1, 3, 8, 8], &device);
        assert_eq!(crop_hr_in_training(hr, &sr, Phase::Eval).dims(), [1, 3, 8, 8]);
    }

    #[test]
    fn test_psnr_values() {
        let device = Default::default();
        let hr = Tensor::<TestBackend, 4>::full([1, 3, 4, 4], 50.0, &device);
        let sr = Tensor::<TestBackend, 4>::full([1, 3, 4, 4], 51.0, &device);
        // mse = 1
        let expected = 10.0 * (255.0f32 * 255.0).log10();
        assert!((scalar(psnr(hr, sr, Phase::Eval)) - expected).abs() < 1e-3);
    }

    #[test]
    fn test_psnr_is_averaged_per_image() {
        let device = Default::default();
        let hr = Tensor::<TestBackend, 4>::zeros([2, 1, 2, 2], &device);
        let sr = Tensor::<TestBackend, 4>::from_data(
            TensorData::new(vec![1.0f32, 1.0, 1.0, 1.0, 10.0, 10.0, 10.0, 10.0], [2, 1, 2, 2]),
            &device,
        );

        let per_image = psnr_per_image(hr.clone(), sr.clone(), Phase::Eval)
            .into_data()
            .to_vec::<f32>()
            .unwrap();
        let max = 255.0f32 * 255.0;
        assert!((per_image[0] - 10.0 * max.log10()).abs() < 1e-3);
        assert!((per_image[1] - 10.0 * (max / 100.0).log10()).abs() < 1e-3);

        let mean = scalar(psnr(hr, sr, Phase::Eval));
        assert!((mean - (per_image[0] + per_image[1]) / 2.0).abs() < 1e-3);
    }
}
