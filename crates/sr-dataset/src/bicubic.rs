//! Bicubic resampling used to relate HR and LR images.

use image::{imageops, RgbImage};
use sr_core::{Error, Result};

/// Resize `image` to `width` x `height` with a bicubic (Catmull-Rom) kernel.
pub fn bicubic_resize(image: &RgbImage, width: u32, height: u32) -> RgbImage {
    imageops::resize(image, width, height, imageops::FilterType::CatmullRom)
}

/// Largest per-channel absolute difference between two equally sized images.
pub fn max_abs_difference(a: &RgbImage, b: &RgbImage) -> Result<u8> {
    if a.dimensions() != b.dimensions() {
        return Err(Error::InvalidArgument(format!(
            "image sizes differ: {:?} vs {:?}",
            a.dimensions(),
            b.dimensions()
        )));
    }

    Ok(a.as_raw()
        .iter()
        .zip(b.as_raw())
        .map(|(&x, &y)| x.abs_diff(y))
        .max()
        .unwrap_or(0))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_constant_image_is_preserved() {
        let image = RgbImage::from_pixel(16, 12, image::Rgb([10, 120, 240]));
        let small = bicubic_resize(&image, 8, 6);
        assert_eq!(small.dimensions(), (8, 6));
        assert_eq!(max_abs_difference(&small, &RgbImage::from_pixel(8, 6, image::Rgb([10, 120, 240]))).unwrap(), 0);
    }

    #[test]
    fn test_max_abs_difference() {
        let a = RgbImage::from_pixel(2, 2, image::Rgb([10, 20, 30]));
        let mut b = a.clone();
        b.put_pixel(1, 1, image::Rgb([14, 20, 23]));
        assert_eq!(max_abs_difference(&a, &b).unwrap(), 7);
        assert!(max_abs_difference(&a, &RgbImage::new(3, 2)).is_err());
    }
}
