// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Common interface over the text and face detectors

use std::fmt;
use std::path::Path;
use std::time::Instant;

use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::info;

use super::annotator::Annotator;
use super::detection::DetectionResult;
use super::error::VisionError;
use super::image_utils::ImageSource;

/// Which kind of feature a detector locates
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DetectionKind {
    Text,
    Face,
}

impl DetectionKind {
    /// Inner stroke color of the boxes drawn for this kind
    pub fn box_color(self) -> Rgb<u8> {
        match self {
            DetectionKind::Text => Rgb([255, 0, 0]),
            DetectionKind::Face => Rgb([0, 255, 0]),
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            DetectionKind::Text => "text",
            DetectionKind::Face => "face",
        }
    }
}

impl fmt::Display for DetectionKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl std::str::FromStr for DetectionKind {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "text" | "ocr" => Ok(DetectionKind::Text),
            "face" => Ok(DetectionKind::Face),
            other => Err(format!("unknown detection kind '{}'", other)),
        }
    }
}

/// A model adapter producing normalized detections
///
/// Implementations must be usable from several requests at once.
pub trait Detector: Send + Sync {
    fn kind(&self) -> DetectionKind;

    /// Run the model on a decoded image
    fn infer_image(&self, image: &DynamicImage) -> Result<DetectionResult, VisionError>;

    /// Decode `source` and run the model on it
    fn infer(&self, source: &ImageSource) -> Result<DetectionResult, VisionError> {
        let image = source.decode()?;
        self.infer_image(&image)
    }

    /// Decode, detect and annotate in one pass
    ///
    /// The image is decoded once and shared by inference and drawing. The
    /// annotated result is written to `save_path` (as `.jpg`) when given.
    fn visualize(
        &self,
        source: &ImageSource,
        annotator: &Annotator,
        save_path: Option<&Path>,
    ) -> Result<RgbImage, VisionError> {
        let start = Instant::now();
        let image = source.decode()?;
        let detections = self.infer_image(&image)?;

        info!(
            "{} detection found {} regions in {}ms",
            self.kind(),
            detections.len(),
            start.elapsed().as_millis()
        );

        annotator.annotate(&image, &detections, self.kind(), save_path)
    }
}
