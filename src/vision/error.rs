// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use thiserror::Error;

use super::image_utils::ImageError;

/// Failures of the detect-and-annotate pipeline
#[derive(Debug, Error)]
pub enum VisionError {
    /// The underlying model could not be constructed (missing weights, bad export)
    #[error("Model unavailable: {0}")]
    ModelUnavailable(String),

    /// The input image could not be read or decoded
    #[error(transparent)]
    DecodeError(#[from] ImageError),

    /// A face detection lacks one of the landmarks joined by a connecting segment
    #[error("Detection {index} is missing landmark '{name}'")]
    MissingLandmark { index: usize, name: String },

    #[error("Inference failed: {0}")]
    Inference(String),

    #[error("Failed to encode annotated image: {0}")]
    Encode(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

impl VisionError {
    /// Wrap a backend error, keeping its full context chain in the message
    pub fn inference(err: anyhow::Error) -> Self {
        VisionError::Inference(format!("{:#}", err))
    }

    pub fn model_unavailable(err: anyhow::Error) -> Self {
        VisionError::ModelUnavailable(format!("{:#}", err))
    }
}

impl From<image::ImageError> for VisionError {
    fn from(err: image::ImageError) -> Self {
        match err {
            image::ImageError::IoError(e) => VisionError::Io(e),
            other => VisionError::Encode(other.to_string()),
        }
    }
}
