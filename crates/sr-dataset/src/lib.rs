//! DIV2K data pipeline.
//!
//! This crate provides:
//! - RGB8 image loading and directory listing
//! - The DIV2K file layout
//! - Cropped and fullsize batch sequences
//! - A multi-threaded prefetching batch loader
//! - Batching into burn tensors

pub mod batcher;
pub mod bicubic;
pub mod crop;
pub mod div2k;
pub mod loader;
pub mod prefetch;
pub mod sequence;
#[cfg(any(test, feature = "test-support"))]
pub mod synthetic;

pub use batcher::{images_to_tensor, tensor_to_images, SrBatch, SrBatcher};
pub use div2k::{DatasetSelection, Div2k, PairPaths};
pub use loader::{image_paths, load_image, resolved_name, save_image};
pub use prefetch::{batch_rng, BatchIter, BatchLoader};
pub use sequence::{CroppedSequence, FullsizeSequence, ImagePair, PairBatch, PairSequence};
