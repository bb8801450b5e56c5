//! Deterministic image batches for classifier regression suites.

use std::collections::HashMap;

use caliper_core::{DataType, Tensor, TensorLayout};
use rand::rngs::StdRng;
use rand::{Rng, SeedableRng};
use tracing::debug;

use crate::error::{HarnessError, Result};

/// Image height and width.
pub const IMAGE_SIZE: usize = 16;
/// Number of classes, one per bright-patch position.
pub const NUM_CLASSES: usize = 10;
/// Side length of the bright patch.
pub const PATCH_SIZE: usize = 4;
/// Pixel value inside the patch.
pub const PATCH_VALUE: f32 = 3.0;
/// Background pixels are uniform in `[0, NOISE_CEILING)`.
pub const NOISE_CEILING: f32 = 0.3;

/// A batch of images with their ground-truth labels.
#[derive(Debug, Clone)]
pub struct Batch {
    /// `[batch, 1, IMAGE_SIZE, IMAGE_SIZE]` pixel tensor.
    pub images: Tensor,
    /// One class index per image.
    pub labels: Vec<usize>,
}

/// Synthetic single-channel classification set.
///
/// Each image is low background noise with one bright square of
/// [`PATCH_SIZE`] pixels; the label is the grid cell holding the square.
/// Same seed, same data.
#[derive(Debug, Clone, PartialEq)]
pub struct PatchDataset {
    pixels: Vec<f32>,
    labels: Vec<usize>,
}

impl PatchDataset {
    /// Generate `samples` labelled images from `seed`.
    pub fn generate(seed: u64, samples: usize) -> Self {
        let mut rng = StdRng::seed_from_u64(seed);
        let mut pixels = Vec::with_capacity(samples * IMAGE_SIZE * IMAGE_SIZE);
        let mut labels = Vec::with_capacity(samples);
        for _ in 0..samples {
            let class = rng.gen_range(0..NUM_CLASSES);
            let (row0, col0) = patch_origin(class);
            for row in 0..IMAGE_SIZE {
                for col in 0..IMAGE_SIZE {
                    let inside = row >= row0
                        && row < row0 + PATCH_SIZE
                        && col >= col0
                        && col < col0 + PATCH_SIZE;
                    if inside {
                        pixels.push(PATCH_VALUE);
                    } else {
                        pixels.push(rng.gen_range(0.0..NOISE_CEILING));
                    }
                }
            }
            labels.push(class);
        }
        debug!(samples, seed, "generated patch dataset");
        Self { pixels, labels }
    }

    /// Number of images.
    pub fn len(&self) -> usize {
        self.labels.len()
    }

    /// Whether the dataset holds no images.
    pub fn is_empty(&self) -> bool {
        self.labels.is_empty()
    }

    /// Pixels of one image, row-major.
    pub fn image(&self, index: usize) -> &[f32] {
        let len = IMAGE_SIZE * IMAGE_SIZE;
        &self.pixels[index * len..(index + 1) * len]
    }

    /// Label of one image.
    pub fn label(&self, index: usize) -> usize {
        self.labels[index]
    }

    /// Split into `[batch_size, 1, IMAGE_SIZE, IMAGE_SIZE]` batches.
    ///
    /// A trailing remainder smaller than `batch_size` is dropped, so every
    /// returned batch has the same shape.
    pub fn batches(&self, batch_size: usize) -> Result<Vec<Batch>> {
        if batch_size == 0 {
            return Err(HarnessError::EmptyBatch.into());
        }
        let image_len = IMAGE_SIZE * IMAGE_SIZE;
        let count = self.len() / batch_size;
        let mut batches = Vec::with_capacity(count);
        for index in 0..count {
            let start = index * batch_size;
            let images = Tensor::from_data(
                self.pixels[start * image_len..(start + batch_size) * image_len].to_vec(),
                vec![batch_size, 1, IMAGE_SIZE, IMAGE_SIZE],
                DataType::F32,
                TensorLayout::RowMajor,
            )?;
            batches.push(Batch {
                images,
                labels: self.labels[start..start + batch_size].to_vec(),
            });
        }
        Ok(batches)
    }
}

/// Top-left corner of the bright patch for a class.
pub fn patch_origin(class: usize) -> (usize, usize) {
    let cells = IMAGE_SIZE / PATCH_SIZE;
    ((class / cells) * PATCH_SIZE, (class % cells) * PATCH_SIZE)
}

/// Batches shaped as engine input maps, for calibration runs.
pub fn calibration_inputs(batches: &[Batch], input: &str) -> Vec<HashMap<String, Tensor>> {
    batches
        .iter()
        .map(|batch| std::iter::once((input.to_string(), batch.images.clone())).collect())
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_generation_is_deterministic() {
        let first = PatchDataset::generate(42, 30);
        let second = PatchDataset::generate(42, 30);
        assert_eq!(first, second);
    }

    #[test]
    fn test_different_seeds_produce_different_images() {
        let first = PatchDataset::generate(1, 10);
        let second = PatchDataset::generate(2, 10);
        assert_ne!(first, second);
    }

    #[test]
    fn test_patch_marks_the_labelled_cell() {
        let dataset = PatchDataset::generate(3, 50);
        for index in 0..dataset.len() {
            let (row0, col0) = patch_origin(dataset.label(index));
            let image = dataset.image(index);
            for row in 0..IMAGE_SIZE {
                for col in 0..IMAGE_SIZE {
                    let value = image[row * IMAGE_SIZE + col];
                    let inside = row >= row0
                        && row < row0 + PATCH_SIZE
                        && col >= col0
                        && col < col0 + PATCH_SIZE;
                    if inside {
                        assert_eq!(value, PATCH_VALUE);
                    } else {
                        assert!(value < NOISE_CEILING);
                    }
                }
            }
        }
    }

    #[test]
    fn test_batches_have_declared_shape() -> Result<()> {
        let dataset = PatchDataset::generate(1, 25);
        let batches = dataset.batches(10)?;
        assert_eq!(batches.len(), 2, "remainder batch is dropped");
        for batch in &batches {
            assert_eq!(batch.images.shape(), vec![10, 1, IMAGE_SIZE, IMAGE_SIZE]);
            assert_eq!(batch.labels.len(), 10);
        }
        Ok(())
    }

    #[test]
    fn test_zero_batch_size_is_rejected() {
        let dataset = PatchDataset::generate(1, 10);
        assert!(dataset.batches(0).is_err());
    }

    #[test]
    fn test_calibration_inputs_mirror_batches() -> Result<()> {
        let dataset = PatchDataset::generate(9, 20);
        let batches = dataset.batches(10)?;
        let inputs = calibration_inputs(&batches, "image");
        assert_eq!(inputs.len(), batches.len());
        for feed in &inputs {
            assert_eq!(feed.len(), 1);
            assert!(feed.contains_key("image"));
        }
        Ok(())
    }
}
