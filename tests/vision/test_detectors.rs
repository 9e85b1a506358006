// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/vision/test_detectors.rs - Detector adapters over stand-in models

use std::collections::BTreeMap;

use fabstir_vision_annotator::vision::{
    Annotator, BoundingBox, DetectionKind, Detector, FaceDetector, FaceLocator, ImageError,
    ImageSource, RawFace, RawTextRegion, TextDetector, TextRecognizer, VisionError,
};
use image::DynamicImage;
use tempfile::TempDir;

use crate::common::png_bytes;

struct CannedText(Vec<RawTextRegion>);

impl TextRecognizer for CannedText {
    fn read_text(&self, _image: &DynamicImage) -> anyhow::Result<Vec<RawTextRegion>> {
        Ok(self.0.clone())
    }
}

struct CannedFaces(Vec<RawFace>);

impl FaceLocator for CannedFaces {
    fn locate_faces(&self, _image: &DynamicImage) -> anyhow::Result<Vec<RawFace>> {
        Ok(self.0.clone())
    }
}

struct BrokenModel;

impl FaceLocator for BrokenModel {
    fn locate_faces(&self, _image: &DynamicImage) -> anyhow::Result<Vec<RawFace>> {
        anyhow::bail!("session run failed")
    }
}

fn text_detector() -> TextDetector {
    TextDetector::new(Box::new(CannedText(vec![
        RawTextRegion {
            quad: [[10.2, 5.7], [40.9, 5.1], [41.0, 20.3], [10.0, 20.9]],
            text: "INVOICE".to_string(),
            score: 0.98,
        },
        RawTextRegion {
            quad: [[3.0, 30.0], [25.5, 30.0], [25.5, 38.0], [3.0, 38.0]],
            text: "42".to_string(),
            score: 0.91,
        },
    ])))
}

fn face_detector() -> FaceDetector {
    let landmarks: BTreeMap<String, [f32; 2]> = [
        ("right_eye", [20.4, 30.6]),
        ("left_eye", [40.2, 30.1]),
        ("nose", [30.0, 40.0]),
        ("mouth_right", [22.0, 50.0]),
        ("mouth_left", [38.0, 50.0]),
    ]
    .into_iter()
    .map(|(name, point)| (name.to_string(), point))
    .collect();

    FaceDetector::new(Box::new(CannedFaces(vec![RawFace {
        id: "face_1".to_string(),
        score: 0.99,
        facial_area: [10.7, 20.2, 50.9, 60.99],
        landmarks,
    }])))
}

#[test]
fn test_text_detector_normalizes_regions() {
    let detector = text_detector();
    assert_eq!(detector.kind(), DetectionKind::Text);

    let detections = detector
        .infer(&ImageSource::Bytes(png_bytes(64, 48)))
        .unwrap();
    assert_eq!(detections.len(), 2);

    assert_eq!(detections[0].bbox, BoundingBox::new(10, 5, 41, 21));
    assert_eq!(detections[0].label.as_deref(), Some("INVOICE"));
    assert!(detections[0].landmarks.is_none());

    assert_eq!(detections[1].bbox, BoundingBox::new(3, 30, 26, 38));
    assert_eq!(detections[1].label.as_deref(), Some("42"));
}

#[test]
fn test_face_detector_normalizes_faces() {
    let detector = face_detector();
    assert_eq!(detector.kind(), DetectionKind::Face);

    let detections = detector
        .infer(&ImageSource::Bytes(png_bytes(64, 64)))
        .unwrap();
    assert_eq!(detections.len(), 1);

    let face = &detections[0];
    assert_eq!(face.bbox, BoundingBox::new(10, 20, 50, 60));
    assert!(face.label.is_none());

    let landmarks = face.landmarks.as_ref().unwrap();
    assert_eq!(landmarks.len(), 5);
    assert_eq!(landmarks["left_eye"].x, 40.2);
    assert_eq!(landmarks["mouth_right"].y, 50.0);
}

#[test]
fn test_model_failure_is_inference_error() {
    let detector = FaceDetector::new(Box::new(BrokenModel));
    let err = detector
        .infer(&ImageSource::Bytes(png_bytes(8, 8)))
        .unwrap_err();

    assert!(matches!(err, VisionError::Inference(_)));
    assert!(err.to_string().contains("session run failed"));
}

#[test]
fn test_undecodable_input_is_decode_error() {
    let err = text_detector()
        .infer(&ImageSource::Bytes(b"plain text, not pixels".to_vec()))
        .unwrap_err();
    assert!(matches!(err, VisionError::DecodeError(_)));

    let err = text_detector()
        .infer(&ImageSource::Bytes(Vec::new()))
        .unwrap_err();
    assert!(matches!(err, VisionError::DecodeError(ImageError::EmptyData)));
}

#[test]
fn test_missing_file_is_decode_error() {
    let err = face_detector()
        .infer(&ImageSource::Path("/nonexistent/photo.png".into()))
        .unwrap_err();
    assert!(matches!(
        err,
        VisionError::DecodeError(ImageError::Unreadable { .. })
    ));
}

#[test]
fn test_visualize_from_file_writes_jpeg() {
    let dir = TempDir::new().unwrap();
    let input = dir.path().join("receipt.png");
    std::fs::write(&input, png_bytes(64, 48)).unwrap();

    let annotated = text_detector()
        .visualize(
            &ImageSource::Path(input),
            &Annotator::new(),
            Some(&dir.path().join("result.png")),
        )
        .unwrap();

    assert_eq!(annotated.dimensions(), (64, 48));
    assert_eq!(
        *annotated.get_pixel(20, 5),
        DetectionKind::Text.box_color()
    );
    assert!(dir.path().join("result.jpg").exists());
}

#[test]
fn test_visualize_without_save_path() {
    let annotated = face_detector()
        .visualize(
            &ImageSource::Bytes(png_bytes(64, 64)),
            &Annotator::new(),
            None,
        )
        .unwrap();

    assert_eq!(annotated.dimensions(), (64, 64));
    assert_eq!(*annotated.get_pixel(10, 40), DetectionKind::Face.box_color());
}
