// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Face detection: RetinaFace backend and its [`Detector`] adapter

pub mod model;
pub mod priors;

use std::collections::BTreeMap;
use std::path::Path;

use image::DynamicImage;
use tracing::debug;

use super::detection::{BoundingBox, Detection, DetectionResult, Point};
use super::detector::{DetectionKind, Detector};
use super::error::VisionError;

pub use model::{FaceParams, RetinaFaceModel};

/// One face as reported by a face model
#[derive(Debug, Clone, PartialEq)]
pub struct RawFace {
    /// Opaque key, `face_1`, `face_2`, ... in model order
    pub id: String,
    pub score: f32,
    /// `[x0, y0, x1, y1]` in source image coordinates
    pub facial_area: [f32; 4],
    pub landmarks: BTreeMap<String, [f32; 2]>,
}

/// A face model, treated as a black box
#[cfg_attr(test, mockall::automock)]
pub trait FaceLocator: Send + Sync {
    /// Every face in `image`, in model order
    fn locate_faces(&self, image: &DynamicImage) -> anyhow::Result<Vec<RawFace>>;
}

/// Adapter turning face model output into detections with landmarks
pub struct FaceDetector {
    model: Box<dyn FaceLocator>,
}

impl FaceDetector {
    pub fn new(model: Box<dyn FaceLocator>) -> Self {
        Self { model }
    }

    /// Load a RetinaFace ONNX export
    pub fn from_model_path(model_path: &Path, params: FaceParams) -> Result<Self, VisionError> {
        let model = RetinaFaceModel::load(model_path, params).map_err(VisionError::model_unavailable)?;
        Ok(Self::new(Box::new(model)))
    }
}

impl Detector for FaceDetector {
    fn kind(&self) -> DetectionKind {
        DetectionKind::Face
    }

    fn infer_image(&self, image: &DynamicImage) -> Result<DetectionResult, VisionError> {
        let faces = self.model.locate_faces(image).map_err(VisionError::inference)?;
        debug!("Face model returned {} faces", faces.len());

        Ok(faces
            .into_iter()
            .map(|face| {
                let landmarks = face
                    .landmarks
                    .into_iter()
                    .map(|(name, point)| (name, Point::from(point)))
                    .collect();
                Detection::face(BoundingBox::from_xyxy(face.facial_area), landmarks)
            })
            .collect())
    }
}
