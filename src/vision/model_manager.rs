// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Vision model manager: loads the text and face detectors once at startup

use std::sync::Arc;

use serde::Serialize;
use tracing::{info, warn};

use super::detector::{DetectionKind, Detector};
use super::error::VisionError;
use super::face::{FaceDetector, FaceParams};
use super::ocr::TextDetector;
use crate::config::ModelsConfig;

/// Information about a vision model
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct VisionModelInfo {
    pub name: String,
    pub kind: DetectionKind,
    pub available: bool,
}

/// Holds the detectors shared by every request
///
/// A detector whose model failed to load is absent; its route answers 503.
#[derive(Clone, Default)]
pub struct VisionModelManager {
    text: Option<Arc<dyn Detector>>,
    face: Option<Arc<dyn Detector>>,
}

impl std::fmt::Debug for VisionModelManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("VisionModelManager")
            .field("text", &self.has_text())
            .field("face", &self.has_face())
            .finish()
    }
}

impl VisionModelManager {
    /// Load both detectors from `config`
    ///
    /// Missing models are logged and disabled, unless `require_models` is
    /// set, in which case the first failure is returned.
    pub fn load(config: &ModelsConfig) -> Result<Self, VisionError> {
        let text = match config.ocr_model_dir {
            Some(ref dir) => Self::accept(
                "paddleocr",
                TextDetector::from_model_dir(dir, config.text_threshold),
                config.require_models,
            )?,
            None => None,
        };

        let face_params = FaceParams {
            score_threshold: config.face_score_threshold,
            nms_threshold: config.face_nms_threshold,
        };
        let face = match config.face_model_path {
            Some(ref path) => Self::accept(
                "retinaface",
                FaceDetector::from_model_path(path, face_params),
                config.require_models,
            )?,
            None => None,
        };

        if config.require_models && (text.is_none() || face.is_none()) {
            return Err(VisionError::ModelUnavailable(
                "a model path is not configured".to_string(),
            ));
        }

        Ok(Self { text, face })
    }

    fn accept<D: Detector + 'static>(
        name: &str,
        loaded: Result<D, VisionError>,
        required: bool,
    ) -> Result<Option<Arc<dyn Detector>>, VisionError> {
        match loaded {
            Ok(detector) => {
                info!("{} model loaded", name);
                Ok(Some(Arc::new(detector)))
            }
            Err(e) if required => Err(e),
            Err(e) => {
                warn!("{} model unavailable, route disabled: {}", name, e);
                Ok(None)
            }
        }
    }

    /// Manager around already-built detectors
    pub fn with_detectors(
        text: Option<Arc<dyn Detector>>,
        face: Option<Arc<dyn Detector>>,
    ) -> Self {
        Self { text, face }
    }

    pub fn get(&self, kind: DetectionKind) -> Option<Arc<dyn Detector>> {
        match kind {
            DetectionKind::Text => self.text.clone(),
            DetectionKind::Face => self.face.clone(),
        }
    }

    pub fn has_text(&self) -> bool {
        self.text.is_some()
    }

    pub fn has_face(&self) -> bool {
        self.face.is_some()
    }

    pub fn list_models(&self) -> Vec<VisionModelInfo> {
        vec![
            VisionModelInfo {
                name: "paddleocr".to_string(),
                kind: DetectionKind::Text,
                available: self.has_text(),
            },
            VisionModelInfo {
                name: "retinaface".to_string(),
                kind: DetectionKind::Face,
                available: self.has_face(),
            },
        ]
    }
}
