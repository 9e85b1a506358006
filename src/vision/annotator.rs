// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Draws normalized detections onto a copy of the source image
//!
//! One routine serves every detector: what gets drawn depends only on which
//! optional fields of a [`Detection`] are populated.

use std::path::Path;

use ab_glyph::{FontVec, PxScale};
use image::{DynamicImage, Rgb, RgbImage};
use serde::{Deserialize, Serialize};
use tracing::{debug, info, warn};

use super::detection::{Detection, Landmarks, EYE_LANDMARKS, MOUTH_LANDMARKS};
use super::detector::DetectionKind;
use super::draw::{draw_circle_stroke, draw_line_stroke, draw_rect_stroke, draw_text_stroke};
use super::error::VisionError;
use super::image_utils::{jpeg_output_path, save_jpeg, DEFAULT_JPEG_QUALITY};
use crate::config::AnnotationConfig;

pub const OUTLINE_COLOR: Rgb<u8> = Rgb([0, 0, 0]);
pub const LABEL_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const LANDMARK_OUTLINE_COLOR: Rgb<u8> = Rgb([255, 255, 255]);
pub const LANDMARK_COLOR: Rgb<u8> = Rgb([0, 255, 0]);

pub const BOX_OUTLINE_WIDTH: u32 = 3;
pub const BOX_WIDTH: u32 = 2;

/// Label baseline sits this many pixels above the box's top edge
pub const LABEL_OFFSET: i32 = 10;
/// Pixel height of the font at scale 1.0
pub const BASE_FONT_PX: f32 = 30.0;
pub const LABEL_FONT_SCALE: f32 = 0.7;

pub const LANDMARK_RADIUS: i32 = 5;
pub const LANDMARK_OUTLINE_WIDTH: u32 = 4;
pub const LANDMARK_WIDTH: u32 = 3;
pub const CONNECTOR_OUTLINE_WIDTH: u32 = 3;
pub const CONNECTOR_WIDTH: u32 = 2;

/// Fonts tried, in order, when no font file is configured
const SYSTEM_FONT_PATHS: &[&str] = &[
    "/usr/share/fonts/truetype/dejavu/DejaVuSans.ttf",
    "/usr/share/fonts/TTF/DejaVuSans.ttf",
    "/usr/share/fonts/dejavu/DejaVuSans.ttf",
    "/System/Library/Fonts/Supplemental/Arial.ttf",
    "/System/Library/Fonts/Arial.ttf",
    "C:\\Windows\\Fonts\\arial.ttf",
];

/// What to do when a face lacks an endpoint of the eye or mouth segment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LandmarkPolicy {
    /// Leave that segment out and keep annotating
    #[default]
    Skip,
    /// Abort with [`VisionError::MissingLandmark`]
    Strict,
}

impl std::str::FromStr for LandmarkPolicy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_lowercase().as_str() {
            "skip" => Ok(LandmarkPolicy::Skip),
            "strict" => Ok(LandmarkPolicy::Strict),
            other => Err(format!("unknown landmark policy '{}'", other)),
        }
    }
}

/// Renders detections and optionally persists the result as JPEG
pub struct Annotator {
    /// Font for labels. Without one, labels are skipped.
    font: Option<FontVec>,
    landmark_policy: LandmarkPolicy,
    jpeg_quality: u8,
}

impl std::fmt::Debug for Annotator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Annotator")
            .field("has_font", &self.font.is_some())
            .field("landmark_policy", &self.landmark_policy)
            .field("jpeg_quality", &self.jpeg_quality)
            .finish()
    }
}

impl Default for Annotator {
    fn default() -> Self {
        Self {
            font: None,
            landmark_policy: LandmarkPolicy::default(),
            jpeg_quality: DEFAULT_JPEG_QUALITY,
        }
    }
}

impl Annotator {
    /// Annotator without a font; labels will not be rendered
    pub fn new() -> Self {
        Self::default()
    }

    /// Annotator using a font file
    pub fn with_font_path(font_path: &Path) -> Result<Self, VisionError> {
        let font_data = std::fs::read(font_path)?;
        let font = FontVec::try_from_vec(font_data).map_err(|e| {
            std::io::Error::new(
                std::io::ErrorKind::InvalidData,
                format!("invalid font file {}: {}", font_path.display(), e),
            )
        })?;

        Ok(Self {
            font: Some(font),
            ..Self::default()
        })
    }

    /// Annotator using the first system font found in the usual locations,
    /// or no font at all
    pub fn with_system_font() -> Self {
        for path in SYSTEM_FONT_PATHS {
            if let Ok(font_data) = std::fs::read(path) {
                if let Ok(font) = FontVec::try_from_vec(font_data) {
                    info!("Loaded label font: {}", path);
                    return Self {
                        font: Some(font),
                        ..Self::default()
                    };
                }
            }
        }

        warn!("No system font found, text labels will not be drawn");
        Self::default()
    }

    /// Build from configuration. A configured font that fails to load is an
    /// error; with no font configured the system font search is used.
    pub fn from_config(config: &AnnotationConfig) -> Result<Self, VisionError> {
        let annotator = match config.font_path {
            Some(ref path) => Self::with_font_path(path)?,
            None => Self::with_system_font(),
        };

        Ok(annotator
            .landmark_policy(config.landmark_policy)
            .jpeg_quality(config.jpeg_quality))
    }

    pub fn landmark_policy(mut self, policy: LandmarkPolicy) -> Self {
        self.landmark_policy = policy;
        self
    }

    /// JPEG quality for persisted results (1-100)
    pub fn jpeg_quality(mut self, quality: u8) -> Self {
        self.jpeg_quality = quality.clamp(1, 100);
        self
    }

    pub fn has_font(&self) -> bool {
        self.font.is_some()
    }

    /// Draw `detections` on a copy of `image`
    ///
    /// If `save_path` is given the result is also written there as JPEG,
    /// with the extension replaced by `.jpg`. The in-memory image is
    /// returned either way.
    pub fn annotate(
        &self,
        image: &DynamicImage,
        detections: &[Detection],
        kind: DetectionKind,
        save_path: Option<&Path>,
    ) -> Result<RgbImage, VisionError> {
        let mut canvas = image.to_rgb8();
        let box_color = kind.box_color();

        for (index, detection) in detections.iter().enumerate() {
            draw_rect_stroke(&mut canvas, &detection.bbox, BOX_OUTLINE_WIDTH, OUTLINE_COLOR);
            draw_rect_stroke(&mut canvas, &detection.bbox, BOX_WIDTH, box_color);

            if let Some(label) = detection.visible_label() {
                self.draw_label(&mut canvas, detection, label);
            }

            if let Some(ref landmarks) = detection.landmarks {
                self.draw_landmarks(&mut canvas, index, landmarks)?;
            }
        }

        debug!(
            "Annotated {}x{} image with {} {} detections",
            canvas.width(),
            canvas.height(),
            detections.len(),
            kind
        );

        if let Some(save_path) = save_path {
            let output = jpeg_output_path(save_path);
            save_jpeg(&canvas, &output, self.jpeg_quality)?;
            info!("Saved annotated image to {}", output.display());
        }

        Ok(canvas)
    }

    fn draw_label(&self, canvas: &mut RgbImage, detection: &Detection, label: &str) {
        let Some(ref font) = self.font else {
            debug!("Skipping label '{}': no font loaded", label);
            return;
        };

        let scale = PxScale::from(BASE_FONT_PX * LABEL_FONT_SCALE);
        let (x0, y0) = detection.bbox.top_left();
        let origin = (x0, y0 - LABEL_OFFSET);
        draw_text_stroke(canvas, font, scale, origin, label, BOX_OUTLINE_WIDTH, OUTLINE_COLOR);
        draw_text_stroke(canvas, font, scale, origin, label, BOX_WIDTH, LABEL_COLOR);
    }

    fn draw_landmarks(
        &self,
        canvas: &mut RgbImage,
        index: usize,
        landmarks: &Landmarks,
    ) -> Result<(), VisionError> {
        for point in landmarks.values() {
            let center = point.to_pixel();
            draw_circle_stroke(
                canvas,
                center,
                LANDMARK_RADIUS,
                LANDMARK_OUTLINE_WIDTH,
                LANDMARK_OUTLINE_COLOR,
            );
            draw_circle_stroke(canvas, center, LANDMARK_RADIUS, LANDMARK_WIDTH, LANDMARK_COLOR);
        }

        for (from, to) in [EYE_LANDMARKS, MOUTH_LANDMARKS] {
            let (start, end) = match (landmarks.get(from), landmarks.get(to)) {
                (Some(start), Some(end)) => (start.to_pixel(), end.to_pixel()),
                (start, _) => {
                    let missing = if start.is_none() { from } else { to };
                    match self.landmark_policy {
                        LandmarkPolicy::Strict => {
                            return Err(VisionError::MissingLandmark {
                                index,
                                name: missing.to_string(),
                            });
                        }
                        LandmarkPolicy::Skip => {
                            warn!(
                                "Detection {} has no '{}' landmark, skipping {}-{} segment",
                                index, missing, from, to
                            );
                            continue;
                        }
                    }
                }
            };

            draw_line_stroke(
                canvas,
                start,
                end,
                CONNECTOR_OUTLINE_WIDTH,
                LANDMARK_OUTLINE_COLOR,
            );
            draw_line_stroke(canvas, start, end, CONNECTOR_WIDTH, LANDMARK_COLOR);
        }

        Ok(())
    }
}
