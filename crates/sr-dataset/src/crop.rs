//! Aligned random crops of LR/HR pairs.

use image::{imageops, RgbImage};
use rand::{Rng, RngCore};
use sr_core::{Error, Result, Scale};

/// Largest valid LR top-left corner `(x, y)` for a patch of `patch_size`.
///
/// The window must fit the LR image and, once scaled, the HR image.
pub fn max_lr_corner(
    lr_dims: (u32, u32),
    hr_dims: (u32, u32),
    patch_size: u32,
    scale: Scale,
    label: &str,
) -> Result<(u32, u32)> {
    let s = scale.factor();
    let (lr_w, lr_h) = lr_dims;
    let (hr_w, hr_h) = hr_dims;

    if patch_size > lr_w || patch_size > lr_h {
        return Err(Error::CropOutOfBounds {
            path: label.to_string(),
            crop: patch_size,
            width: lr_w,
            height: lr_h,
        });
    }

    let hr_patch = patch_size * s;
    if hr_patch > hr_w || hr_patch > hr_h {
        return Err(Error::CropOutOfBounds {
            path: label.to_string(),
            crop: hr_patch,
            width: hr_w,
            height: hr_h,
        });
    }

    let max_x = (lr_w - patch_size).min((hr_w - hr_patch) / s);
    let max_y = (lr_h - patch_size).min((hr_h - hr_patch) / s);
    Ok((max_x, max_y))
}

/// Crop a `patch_size` LR window at a uniformly drawn corner and the HR
/// window at `scale` times that corner.
pub fn random_crop_pair(
    lr: &RgbImage,
    hr: &RgbImage,
    patch_size: u32,
    scale: Scale,
    label: &str,
    rng: &mut dyn RngCore,
) -> Result<(RgbImage, RgbImage)> {
    let (max_x, max_y) = max_lr_corner(lr.dimensions(), hr.dimensions(), patch_size, scale, label)?;
    let x = rng.gen_range(0..=max_x);
    let y = rng.gen_range(0..=max_y);
    Ok(crop_pair_at(lr, hr, x, y, patch_size, scale))
}

/// Crop both images at LR corner `(x, y)`. The caller guarantees the windows fit.
pub fn crop_pair_at(
    lr: &RgbImage,
    hr: &RgbImage,
    x: u32,
    y: u32,
    patch_size: u32,
    scale: Scale,
) -> (RgbImage, RgbImage) {
    let s = scale.factor();
    let lr_crop = imageops::crop_imm(lr, x, y, patch_size, patch_size).to_image();
    let hr_crop =
        imageops::crop_imm(hr, x * s, y * s, patch_size * s, patch_size * s).to_image();
    (lr_crop, hr_crop)
}
