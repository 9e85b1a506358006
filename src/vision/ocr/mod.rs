// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Text detection: PaddleOCR backend and its [`Detector`] adapter
//!
//! Components:
//! - `detection` - Text region detection
//! - `recognition` - Text recognition from detected regions
//! - `preprocessing` - Tensor preparation for both models
//! - `model` - Combined OCR pipeline

pub mod detection;
pub mod model;
pub mod preprocessing;
pub mod recognition;

use std::path::Path;

use image::DynamicImage;
use tracing::debug;

use super::detection::{BoundingBox, Detection, DetectionResult};
use super::detector::{DetectionKind, Detector};
use super::error::VisionError;

pub use detection::{OcrDetectionModel, TextBox};
pub use model::PaddleOcrModel;
pub use recognition::{OcrRecognitionModel, RecognizedText};

/// One region as reported by an OCR model
#[derive(Debug, Clone, PartialEq)]
pub struct RawTextRegion {
    /// Corners in source image coordinates, any rotation
    pub quad: [[f32; 2]; 4],
    pub text: String,
    pub score: f32,
}

/// An OCR model, treated as a black box
#[cfg_attr(test, mockall::automock)]
pub trait TextRecognizer: Send + Sync {
    /// Locate and read every text region of `image`, in model order
    fn read_text(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawTextRegion>>;
}

/// Adapter turning OCR output into labelled detections
pub struct TextDetector {
    model: Box<dyn TextRecognizer>,
}

impl TextDetector {
    pub fn new(model: Box<dyn TextRecognizer>) -> Self {
        Self { model }
    }

    /// Load the PaddleOCR models from `model_dir`
    pub fn from_model_dir(model_dir: &Path, threshold: f32) -> Result<Self, VisionError> {
        let model = PaddleOcrModel::load(model_dir, threshold).map_err(VisionError::model_unavailable)?;
        Ok(Self::new(Box::new(model)))
    }
}

impl Detector for TextDetector {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Text
    }

    fn infer_image(&self, image: &DynamicImage) -> Result<DetectionResult, VisionError> {
        let regions = self.model.read_text(image).map_err(VisionError::inference)?;
        debug!("OCR model returned {} regions", regions.len());

        Ok(regions
            .into_iter()
            .map(|region| Detection::text(BoundingBox::enclosing(&region.quad), region.text))
            .collect())
    }
}
