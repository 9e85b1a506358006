// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! End-to-end PaddleOCR pipeline: detect lines, crop, recognize

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView};
use std::path::Path;
use tracing::{debug, info};

use super::detection::{OcrDetectionModel, TextBox};
use super::preprocessing::{preprocess_for_detection, preprocess_for_recognition};
use super::recognition::{OcrRecognitionModel, RecognizedText};
use super::{RawTextRegion, TextRecognizer};
use crate::vision::detection::BoundingBox;

pub const DETECTION_MODEL_FILE: &str = "det_model.onnx";
pub const RECOGNITION_MODEL_FILE: &str = "rec_model.onnx";
pub const DICTIONARY_FILE: &str = "ppocr_keys_v1.txt";

/// PaddleOCR detection and recognition models used together
#[derive(Debug, Clone)]
pub struct PaddleOcrModel {
    detection: OcrDetectionModel,
    recognition: OcrRecognitionModel,
}

impl PaddleOcrModel {
    /// Load both models from `model_dir`
    ///
    /// Expected files:
    /// - det_model.onnx (text detection)
    /// - rec_model.onnx (text recognition)
    /// - ppocr_keys_v1.txt (character dictionary)
    pub fn load(model_dir: &Path, threshold: f32) -> Result<Self> {
        if !model_dir.is_dir() {
            anyhow::bail!("OCR model directory not found: {}", model_dir.display());
        }

        let detection = OcrDetectionModel::load(model_dir.join(DETECTION_MODEL_FILE))
            .context("Failed to load OCR detection model")?
            .with_threshold(threshold);
        let recognition = OcrRecognitionModel::load(
            model_dir.join(RECOGNITION_MODEL_FILE),
            model_dir.join(DICTIONARY_FILE),
        )
        .context("Failed to load OCR recognition model")?;

        info!("PaddleOCR pipeline ready from {}", model_dir.display());

        Ok(Self {
            detection,
            recognition,
        })
    }
}

impl TextRecognizer for PaddleOcrModel {
    fn read_text(&self, image: &DynamicImage) -> Result<Vec<RawTextRegion>> {
        let (tensor, letterbox) = preprocess_for_detection(image);
        let boxes = self
            .detection
            .detect(&tensor)?
            .into_iter()
            .map(|text_box| TextBox {
                quad: text_box.quad.map(|[x, y]| {
                    let (x, y) = letterbox.map_to_original(x, y);
                    [x, y]
                }),
                score: text_box.score,
            })
            .collect();

        read_regions(image, boxes, |crop| {
            self.recognition
                .recognize(&preprocess_for_recognition(crop))
        })
    }
}

/// Recognize the text inside each box, given in source image coordinates
///
/// Every box yields a region. Boxes with no legible text, or that fall
/// outside the image, keep an empty string.
fn read_regions<F>(
    image: &DynamicImage,
    boxes: Vec<TextBox>,
    mut recognize: F,
) -> Result<Vec<RawTextRegion>>
where
    F: FnMut(&DynamicImage) -> Result<RecognizedText>,
{
    let (width, height) = image.dimensions();
    let mut regions = Vec::with_capacity(boxes.len());

    for text_box in boxes {
        let bounds = BoundingBox::enclosing(&text_box.quad);
        let (x0, y0) = bounds.top_left();
        let (x1, y1) = bounds.bottom_right();
        let crop_x = x0.clamp(0, width as i32) as u32;
        let crop_y = y0.clamp(0, height as i32) as u32;
        let crop_w = (x1.clamp(0, width as i32) as u32).saturating_sub(crop_x);
        let crop_h = (y1.clamp(0, height as i32) as u32).saturating_sub(crop_y);

        let recognized = if crop_w == 0 || crop_h == 0 {
            debug!("Region at ({}, {}) lies outside the image", x0, y0);
            RecognizedText::default()
        } else {
            recognize(&image.crop_imm(crop_x, crop_y, crop_w, crop_h))?
        };

        if recognized.is_empty() {
            debug!("No text recognized in region at ({}, {})", x0, y0);
        }

        regions.push(RawTextRegion {
            quad: text_box.quad,
            text: recognized.text,
            score: recognized.confidence.min(text_box.score),
        });
    }

    Ok(regions)
}
