//! Small synthetic DIV2K trees.
//!
//! HR images are smooth color fields, LR images are their bicubic
//! downscales, so generated pairs satisfy the same relation as DIV2K.

use image::RgbImage;
use sr_core::{Downgrade, Result, Scale, Subset};
use std::fs;
use std::path::Path;

use crate::bicubic::bicubic_resize;
use crate::div2k::Div2k;
use crate::loader::save_image;

/// Smooth HR test image, distinct per `id`
pub fn synthetic_hr(id: u32, width: u32, height: u32) -> RgbImage {
    let phase = id as f32 * 0.7;
    RgbImage::from_fn(width, height, |x, y| {
        let (xf, yf) = (x as f32, y as f32);
        let r = 128.0 + 60.0 * (xf / 23.0 + phase).sin();
        let g = 128.0 + 60.0 * (yf / 19.0 - phase).cos();
        let b = 128.0 + 50.0 * ((xf + yf) / 31.0 + phase).sin();
        image::Rgb([r as u8, g as u8, b as u8])
    })
}

/// Write HR and LR images for `ids` of `subset` under `root`.
pub fn write_synthetic_div2k(
    root: &Path,
    subset: Subset,
    downgrade: Downgrade,
    scale: Scale,
    ids: impl IntoIterator<Item = u32>,
    hr_size: (u32, u32),
) -> Result<()> {
    let layout = Div2k::new(root);
    fs::create_dir_all(layout.hr_dir(subset))?;
    fs::create_dir_all(layout.lr_dir(subset, downgrade, scale))?;

    let (width, height) = hr_size;
    let s = scale.factor();
    for id in ids {
        let hr = synthetic_hr(id, width, height);
        let lr = bicubic_resize(&hr, width / s, height / s);
        save_image(&hr, &layout.hr_path(subset, id))?;
        save_image(&lr, &layout.lr_path(subset, downgrade, scale, id))?;
    }
    Ok(())
}
