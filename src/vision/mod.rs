// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision processing: detection adapters and annotation
//!
//! This module provides:
//! - Text detection and recognition via PaddleOCR
//! - Face and landmark detection via RetinaFace
//! - Drawing of detections onto a copy of the input image
//!
//! Both models run on CPU through ONNX Runtime.

pub mod annotator;
pub mod detection;
pub mod detector;
pub mod draw;
pub mod error;
pub mod face;
pub mod image_utils;
pub mod letterbox;
pub mod model_manager;
pub mod ocr;

pub use annotator::{Annotator, LandmarkPolicy};
pub use detection::{BoundingBox, Detection, DetectionResult, Landmarks, Point};
pub use detector::{DetectionKind, Detector};
pub use error::VisionError;
pub use face::{FaceDetector, FaceLocator, RawFace};
pub use image_utils::{decode_image_bytes, decode_image_path, ImageError, ImageSource};
pub use model_manager::{VisionModelInfo, VisionModelManager};
pub use ocr::{RawTextRegion, TextDetector, TextRecognizer};
