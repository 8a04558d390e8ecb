use image::imageops::{self, FilterType};
use tract_onnx::prelude::tract_ndarray::Array4;

use crate::error::PredictionError;

pub const INPUT_SIZE: u32 = 224;
pub const CHANNEL_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const CHANNEL_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// A batch-of-one NCHW float tensor ready for the classifier.
#[derive(Debug, Clone, PartialEq)]
pub struct NormalizedInput {
    tensor: Array4<f32>,
}

impl NormalizedInput {
    pub fn shape(&self) -> &[usize] {
        self.tensor.shape()
    }

    pub fn as_array(&self) -> &Array4<f32> {
        &self.tensor
    }
}

/// Decodes uploaded bytes and produces the normalized model input.
///
/// The image is stretched to `INPUT_SIZE` x `INPUT_SIZE` (no crop, no padding),
/// scaled to `[0, 1]` and normalized per channel with `CHANNEL_MEAN` / `CHANNEL_STD`.
#[derive(Debug, Clone, Default)]
pub struct ImagePreprocessor;

impl ImagePreprocessor {
    pub fn new() -> Self {
        Self
    }

    pub fn normalize(&self, raw: &[u8]) -> Result<NormalizedInput, PredictionError> {
        if raw.is_empty() {
            return Err(PredictionError::InvalidImage("image payload is empty".to_string()));
        }

        let img = image::load_from_memory(raw)
            .map_err(|e| PredictionError::InvalidImage(format!("failed to decode image: {}", e)))?;
        if img.width() == 0 || img.height() == 0 {
            return Err(PredictionError::InvalidImage(format!(
                "image has zero size ({}x{})",
                img.width(),
                img.height()
            )));
        }

        log::debug!("🖼️ Decoded {}x{} image, resizing to {}x{}", img.width(), img.height(), INPUT_SIZE, INPUT_SIZE);

        let rgb = img.to_rgb8();
        let resized = imageops::resize(&rgb, INPUT_SIZE, INPUT_SIZE, FilterType::Triangle);

        let size = INPUT_SIZE as usize;
        let tensor = Array4::from_shape_fn((1, 3, size, size), |(_, c, y, x)| {
            let value = resized.get_pixel(x as u32, y as u32)[c] as f32 / 255.0;
            (value - CHANNEL_MEAN[c]) / CHANNEL_STD[c]
        });

        Ok(NormalizedInput { tensor })
    }
}
