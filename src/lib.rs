// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod api;
pub mod cli;
pub mod config;
pub mod vision;

pub use config::AppConfig;
pub use vision::{
    Annotator, BoundingBox, Detection, DetectionKind, DetectionResult, Detector, VisionError,
    VisionModelManager,
};
