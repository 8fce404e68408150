//! Image preprocessing for the pest classifier
//!
//! Decodes an uploaded image, resizes it to the classifier's square input
//! (aspect ratio is not preserved), scales pixels to [0, 1] and applies the
//! ImageNet per-channel normalization the weights were trained with.

use image::imageops::{self, FilterType};
use ndarray::Array4;
use thiserror::Error;

/// Side length of the square classifier input
pub const INPUT_SIZE: u32 = 224;

const IMAGENET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
const IMAGENET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Batch-of-one NCHW tensor, shape `[1, 3, INPUT_SIZE, INPUT_SIZE]`
pub type ImageTensor = Array4<f32>;

/// Preprocessing errors
#[derive(Debug, Error)]
pub enum PreprocessError {
    /// Bytes could not be decoded as an image
    #[error("Invalid image file: {0}")]
    InvalidImage(String),
}

/// Convert raw upload bytes into a normalized classifier input
pub fn preprocess(bytes: &[u8]) -> Result<ImageTensor, PreprocessError> {
    let decoded = image::load_from_memory(bytes)
        .map_err(|e| PreprocessError::InvalidImage(e.to_string()))?;

    // Drop alpha and expand grayscale before resizing
    let rgb = decoded.to_rgb8();
    let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

    let size = INPUT_SIZE as usize;
    let mut tensor = ImageTensor::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for channel in 0..3 {
            let value = pixel[channel] as f32 / 255.0;
            tensor[[0, channel, y as usize, x as usize]] =
                (value - IMAGENET_MEAN[channel]) / IMAGENET_STD[channel];
        }
    }

    Ok(tensor)
}
