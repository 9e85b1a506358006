// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/vision/test_model_manager.rs - Startup model loading

use std::sync::Arc;

use fabstir_vision_annotator::config::{AppConfig, ModelsConfig};
use fabstir_vision_annotator::vision::{DetectionKind, VisionError, VisionModelManager};
use tempfile::TempDir;

use crate::common::{face_stub, text_stub};

#[test]
fn test_empty_model_dir_disables_ocr() {
    let dir = TempDir::new().unwrap();
    let config = ModelsConfig {
        ocr_model_dir: Some(dir.path().to_path_buf()),
        face_model_path: Some(dir.path().join("retinaface.onnx")),
        ..ModelsConfig::default()
    };

    let manager = VisionModelManager::load(&config).unwrap();
    assert!(!manager.has_text());
    assert!(!manager.has_face());
    assert!(manager.get(DetectionKind::Face).is_none());
}

#[test]
fn test_required_models_report_unavailable() {
    let dir = TempDir::new().unwrap();
    let config = ModelsConfig {
        ocr_model_dir: Some(dir.path().join("missing")),
        face_model_path: Some(dir.path().join("missing.onnx")),
        require_models: true,
        ..ModelsConfig::default()
    };

    let err = VisionModelManager::load(&config).unwrap_err();
    assert!(matches!(err, VisionError::ModelUnavailable(_)));
}

#[test]
fn test_models_from_config_file() {
    let dir = TempDir::new().unwrap();
    let path = dir.path().join("vision.toml");
    std::fs::write(
        &path,
        format!(
            "[models]\nocr_model_dir = \"{}\"\nface_score_threshold = 0.8\n",
            dir.path().join("ocr").display()
        ),
    )
    .unwrap();

    let config = AppConfig::from_file(&path).unwrap();
    assert_eq!(config.models.face_score_threshold, 0.8);
    assert_eq!(config.models.face_nms_threshold, 0.4);

    let manager = VisionModelManager::load(&config.models).unwrap();
    assert!(!manager.has_text());
}

#[test]
fn test_detectors_shared_between_requests() {
    let manager = VisionModelManager::with_detectors(Some(text_stub()), Some(face_stub()));
    let cloned = manager.clone();

    let a = manager.get(DetectionKind::Text).unwrap();
    let b = cloned.get(DetectionKind::Text).unwrap();
    assert!(Arc::ptr_eq(&a, &b));
    assert_eq!(b.kind(), DetectionKind::Text);
}

#[test]
fn test_list_models_order() {
    let manager = VisionModelManager::with_detectors(Some(text_stub()), None);
    let models = manager.list_models();

    assert_eq!(models.len(), 2);
    assert_eq!(models[0].name, "paddleocr");
    assert!(models[0].available);
    assert_eq!(models[1].kind, DetectionKind::Face);
    assert!(!models[1].available);
}
