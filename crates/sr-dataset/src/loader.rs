//! Image file access.
//!
//! Images are always decoded to 8-bit RGB regardless of the source format.

use image::RgbImage;
use sr_core::{Error, Result};
use std::path::{Path, PathBuf};
use walkdir::WalkDir;

/// Load an image file as an RGB8 array.
pub fn load_image(path: &Path) -> Result<RgbImage> {
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "Image file not found: {}",
            path.display()
        )));
    }

    let image = image::open(path)
        .map_err(|e| Error::Image(format!("Failed to load image {}: {}", path.display(), e)))?;

    Ok(image.to_rgb8())
}

/// Read only the header of an image file and return `(width, height)`.
pub fn image_dimensions(path: &Path) -> Result<(u32, u32)> {
    if !path.exists() {
        return Err(Error::NotFound(format!(
            "Image file not found: {}",
            path.display()
        )));
    }

    image::image_dimensions(path)
        .map_err(|e| Error::Image(format!("Failed to read header of {}: {}", path.display(), e)))
}

/// Save an RGB8 array, the format follows the file extension.
pub fn save_image(image: &RgbImage, path: &Path) -> Result<()> {
    image
        .save(path)
        .map_err(|e| Error::Image(format!("Failed to save image {}: {}", path.display(), e)))
}

/// List the `*.jpg` files of `dir` followed by its `*.png` files.
///
/// Only the directory itself is scanned, each group is sorted by name.
pub fn image_paths(dir: &Path) -> Result<Vec<PathBuf>> {
    if !dir.is_dir() {
        return Err(Error::NotFound(format!(
            "Directory not found: {}",
            dir.display()
        )));
    }

    let mut jpgs = Vec::new();
    let mut pngs = Vec::new();

    for entry in WalkDir::new(dir).min_depth(1).max_depth(1) {
        let entry = entry.map_err(|e| Error::Io(e.into()))?;
        if !entry.file_type().is_file() {
            continue;
        }

        let path = entry.into_path();
        match path.extension().and_then(|ext| ext.to_str()) {
            Some("jpg") => jpgs.push(path),
            Some("png") => pngs.push(path),
            _ => {}
        }
    }

    jpgs.sort();
    pngs.sort();
    jpgs.extend(pngs);
    Ok(jpgs)
}

/// Output file name of a super-resolved image: `<stem>-sr<.ext>`.
pub fn resolved_name(path: &Path) -> Result<String> {
    let stem = path
        .file_stem()
        .and_then(|s| s.to_str())
        .ok_or_else(|| Error::InvalidArgument(format!("Invalid image path: {}", path.display())))?;

    Ok(match path.extension().and_then(|s| s.to_str()) {
        Some(ext) => format!("{stem}-sr.{ext}"),
        None => format!("{stem}-sr"),
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::TempDir;

    fn create_test_image(path: &Path, width: u32, height: u32) {
        let img = image::ImageBuffer::from_fn(width, height, |x, y| {
            image::Rgb([(x * 10) as u8, (y * 10) as u8, 128u8])
        });
        img.save(path).unwrap();
    }

    #[test]
    fn test_load_image_rgb8() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("0001.png");
        create_test_image(&path, 12, 8);

        let image = load_image(&path).unwrap();
        assert_eq!(image.dimensions(), (12, 8));
        assert_eq!(image.get_pixel(3, 2).0, [30, 20, 128]);
        assert_eq!(image_dimensions(&path).unwrap(), (12, 8));
    }

    #[test]
    fn test_load_grayscale_as_rgb() {
        let dir = TempDir::new().unwrap();
        let path = dir.path().join("gray.png");
        image::GrayImage::from_pixel(4, 4, image::Luma([77u8]))
            .save(&path)
            .unwrap();

        let image = load_image(&path).unwrap();
        assert_eq!(image.get_pixel(0, 0).0, [77, 77, 77]);
    }

    #[test]
    fn test_load_missing_and_corrupt() {
        let dir = TempDir::new().unwrap();
        assert!(matches!(
            load_image(&dir.path().join("missing.png")),
            Err(Error::NotFound(_))
        ));

        let corrupt = dir.path().join("corrupt.png");
        std::fs::write(&corrupt, b"not an image").unwrap();
        assert!(matches!(load_image(&corrupt), Err(Error::Image(_))));
    }

    #[test]
    fn test_image_paths_order() {
        let dir = TempDir::new().unwrap();
        create_test_image(&dir.path().join("b.png"), 2, 2);
        create_test_image(&dir.path().join("a.png"), 2, 2);
        create_test_image(&dir.path().join("z.jpg"), 2, 2);
        std::fs::write(dir.path().join("notes.txt"), "skip").unwrap();
        std::fs::create_dir(dir.path().join("nested")).unwrap();
        create_test_image(&dir.path().join("nested").join("c.png"), 2, 2);

        let names: Vec<String> = image_paths(dir.path())
            .unwrap()
            .iter()
            .map(|p| p.file_name().unwrap().to_string_lossy().to_string())
            .collect();
        assert_eq!(names, vec!["z.jpg", "a.png", "b.png"]);
    }

    #[test]
    fn test_resolved_name() {
        assert_eq!(
            resolved_name(Path::new("./demo/0869x4-crop.png")).unwrap(),
            "0869x4-crop-sr.png"
        );
        assert_eq!(resolved_name(Path::new("photo.jpg")).unwrap(), "photo-sr.jpg");
    }
}
