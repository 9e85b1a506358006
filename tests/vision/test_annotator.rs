// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
// tests/vision/test_annotator.rs - Drawing detections onto images

use std::path::PathBuf;

use fabstir_vision_annotator::config::AnnotationConfig;
use fabstir_vision_annotator::vision::annotator::OUTLINE_COLOR;
use fabstir_vision_annotator::vision::{
    Annotator, BoundingBox, Detection, DetectionKind, LandmarkPolicy, Landmarks, Point,
    VisionError,
};
use image::{DynamicImage, Rgb, RgbImage};
use tempfile::TempDir;

const GRAY: Rgb<u8> = Rgb([128, 128, 128]);
const GREEN: Rgb<u8> = Rgb([0, 255, 0]);
const WHITE: Rgb<u8> = Rgb([255, 255, 255]);

fn fixture_font() -> PathBuf {
    PathBuf::from(env!("CARGO_MANIFEST_DIR")).join("tests/fixtures/DejaVuSansMono.ttf")
}

fn gray(width: u32, height: u32) -> DynamicImage {
    DynamicImage::ImageRgb8(RgbImage::from_pixel(width, height, GRAY))
}

fn landmarks(points: &[(&str, f32, f32)]) -> Landmarks {
    points
        .iter()
        .map(|&(name, x, y)| (name.to_string(), Point::new(x, y)))
        .collect()
}

fn full_face() -> Landmarks {
    landmarks(&[
        ("left_eye", 30.0, 40.0),
        ("right_eye", 70.0, 40.0),
        ("nose", 50.0, 55.0),
        ("mouth_left", 35.0, 70.0),
        ("mouth_right", 65.0, 70.0),
    ])
}

#[test]
fn test_text_region_changes_only_box_and_label_area() {
    let input = gray(100, 100);
    let detections = vec![Detection::text(BoundingBox::new(20, 40, 60, 60), "hi")];

    let annotated = Annotator::with_font_path(&fixture_font())
        .unwrap()
        .annotate(&input, &detections, DetectionKind::Text, None)
        .unwrap();
    assert_eq!(annotated.dimensions(), (100, 100));

    let red = DetectionKind::Text.box_color();
    assert_eq!(*annotated.get_pixel(40, 40), red);
    assert_eq!(*annotated.get_pixel(20, 50), red);
    assert_eq!(*annotated.get_pixel(40, 39), red);
    assert_eq!(*annotated.get_pixel(40, 41), OUTLINE_COLOR);
    assert_eq!(*annotated.get_pixel(40, 50), GRAY);

    for (x, y, pixel) in annotated.enumerate_pixels() {
        if *pixel == GRAY {
            continue;
        }
        let (x, y) = (x as i32, y as i32);
        let in_band = (19..=61).contains(&x) && (39..=61).contains(&y);
        let in_interior = (22..=58).contains(&x) && (42..=58).contains(&y);
        let in_label_area = y < 39;
        assert!(
            (in_band && !in_interior) || in_label_area,
            "unexpected change at ({}, {})",
            x,
            y
        );
    }
}

#[test]
fn test_label_drawn_with_configured_font() {
    let config = AnnotationConfig {
        font_path: Some(fixture_font()),
        ..AnnotationConfig::default()
    };
    let annotator = Annotator::from_config(&config).unwrap();
    assert!(annotator.has_font());

    let input = gray(120, 100);
    let bbox = BoundingBox::new(10, 50, 110, 80);
    let labelled = annotator
        .annotate(&input, &[Detection::text(bbox, "HELLO")], DetectionKind::Text, None)
        .unwrap();
    let bare = annotator
        .annotate(&input, &[Detection::region(bbox)], DetectionKind::Text, None)
        .unwrap();

    let changed: Vec<(u32, u32)> = labelled
        .enumerate_pixels()
        .filter(|(x, y, p)| *p != bare.get_pixel(*x, *y))
        .map(|(x, y, _)| (x, y))
        .collect();
    assert!(!changed.is_empty());
    for &(x, y) in &changed {
        assert!(y <= 42, "label pixel at ({}, {}) is not above the baseline", x, y);
        assert!(x >= 9, "label pixel at ({}, {}) starts left of the box", x, y);
    }
}

#[test]
fn test_missing_font_file_is_rejected() {
    let config = AnnotationConfig {
        font_path: Some(PathBuf::from("/nonexistent/font.ttf")),
        ..AnnotationConfig::default()
    };
    assert!(matches!(
        Annotator::from_config(&config),
        Err(VisionError::Io(_))
    ));
}

#[test]
fn test_face_landmarks_and_connectors() {
    let input = gray(100, 100);
    let detections = vec![Detection::face(BoundingBox::new(10, 10, 90, 90), full_face())];

    let annotated = Annotator::new()
        .annotate(&input, &detections, DetectionKind::Face, None)
        .unwrap();

    assert_eq!(*annotated.get_pixel(10, 50), DetectionKind::Face.box_color());

    // Ring around the nose: green on the radius, white at the outer edge
    assert_eq!(*annotated.get_pixel(50, 50), GREEN);
    assert_eq!(*annotated.get_pixel(50, 48), WHITE);
    assert_eq!(*annotated.get_pixel(50, 55), GRAY);

    // Eye connector
    assert_eq!(*annotated.get_pixel(50, 40), GREEN);
    assert_eq!(*annotated.get_pixel(50, 41), GREEN);
    assert_eq!(*annotated.get_pixel(50, 39), WHITE);
    assert_eq!(*annotated.get_pixel(50, 43), GRAY);

    // Mouth connector
    assert_eq!(*annotated.get_pixel(50, 70), GREEN);
    assert_eq!(*annotated.get_pixel(50, 69), WHITE);
}

#[test]
fn test_missing_landmark_skip_and_strict() {
    let input = gray(100, 100);
    let partial = landmarks(&[
        ("left_eye", 30.0, 40.0),
        ("right_eye", 70.0, 40.0),
        ("mouth_left", 35.0, 70.0),
    ]);
    let detections = vec![Detection::face(BoundingBox::new(10, 10, 90, 90), partial)];

    let skipped = Annotator::new()
        .annotate(&input, &detections, DetectionKind::Face, None)
        .unwrap();
    assert_eq!(*skipped.get_pixel(50, 40), GREEN);
    assert_eq!(*skipped.get_pixel(50, 70), GRAY);

    let err = Annotator::new()
        .landmark_policy(LandmarkPolicy::Strict)
        .annotate(&input, &detections, DetectionKind::Face, None)
        .unwrap_err();
    match err {
        VisionError::MissingLandmark { index, name } => {
            assert_eq!(index, 0);
            assert_eq!(name, "mouth_right");
        }
        other => panic!("unexpected error: {}", other),
    }
}

#[test]
fn test_no_detections_leaves_image_unchanged() {
    let input = gray(64, 48);
    let annotated = Annotator::new()
        .annotate(&input, &[], DetectionKind::Face, None)
        .unwrap();
    assert_eq!(annotated, input.to_rgb8());
}

#[test]
fn test_input_image_is_not_modified() {
    let input = gray(50, 50);
    let before = input.clone();
    let detections = vec![Detection::region(BoundingBox::new(5, 5, 40, 40))];

    let annotated = Annotator::new()
        .annotate(&input, &detections, DetectionKind::Text, None)
        .unwrap();

    assert_eq!(input, before);
    assert_ne!(annotated, before.to_rgb8());
}

#[test]
fn test_result_saved_as_jpeg() {
    let dir = TempDir::new().unwrap();
    let input = gray(80, 60);
    let detections = vec![Detection::text(BoundingBox::new(5, 20, 70, 40), "label")];

    Annotator::new()
        .annotate(
            &input,
            &detections,
            DetectionKind::Text,
            Some(&dir.path().join("scan.png")),
        )
        .unwrap();

    assert!(!dir.path().join("scan.png").exists());
    let saved = dir.path().join("scan.jpg");
    assert_eq!(
        image::ImageFormat::from_path(&saved).unwrap(),
        image::ImageFormat::Jpeg
    );
    let reloaded = image::open(&saved).unwrap();
    assert_eq!((reloaded.width(), reloaded.height()), (80, 60));
}

#[test]
fn test_boxes_clipped_at_image_edges() {
    let input = gray(30, 30);
    let detections = vec![Detection::region(BoundingBox::new(-10, -10, 45, 12))];

    let annotated = Annotator::new()
        .annotate(&input, &detections, DetectionKind::Text, None)
        .unwrap();
    assert_eq!(annotated.dimensions(), (30, 30));
    assert_eq!(*annotated.get_pixel(15, 12), DetectionKind::Text.box_color());
}

#[test]
fn test_box_far_larger_than_image_is_clipped() {
    let input = gray(40, 40);
    let detections = vec![Detection::region(BoundingBox::from_xyxy([
        -3.0e9, 10.0, 3.0e9, 20.0,
    ]))];

    let annotated = Annotator::new()
        .annotate(&input, &detections, DetectionKind::Face, None)
        .unwrap();
    assert_eq!(*annotated.get_pixel(20, 10), DetectionKind::Face.box_color());
    assert_eq!(*annotated.get_pixel(20, 11), OUTLINE_COLOR);
    assert_eq!(*annotated.get_pixel(20, 15), GRAY);
}
