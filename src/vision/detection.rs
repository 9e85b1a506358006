// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Normalized detection shape shared by every detector backend

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

/// Landmarks joined by a connecting segment when a face is annotated
pub const EYE_LANDMARKS: (&str, &str) = ("left_eye", "right_eye");
pub const MOUTH_LANDMARKS: (&str, &str) = ("mouth_left", "mouth_right");

/// A point in image space (pixels, sub-pixel precision)
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Point {
    pub x: f32,
    pub y: f32,
}

impl Point {
    pub fn new(x: f32, y: f32) -> Self {
        Self { x, y }
    }

    /// Integer pixel position, truncating toward zero
    pub fn to_pixel(self) -> (i32, i32) {
        (self.x as i32, self.y as i32)
    }
}

impl From<[f32; 2]> for Point {
    fn from([x, y]: [f32; 2]) -> Self {
        Self { x, y }
    }
}

/// Named facial landmark points
pub type Landmarks = BTreeMap<String, Point>;

/// Axis-aligned rectangle with inclusive integer corners
///
/// Always satisfies `x0 <= x1` and `y0 <= y1`; every constructor,
/// deserialization included, goes through [`BoundingBox::new`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "Corners")]
pub struct BoundingBox {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

/// Serialized form, corners in any order
#[derive(Deserialize)]
struct Corners {
    x0: i32,
    y0: i32,
    x1: i32,
    y1: i32,
}

impl From<Corners> for BoundingBox {
    fn from(c: Corners) -> Self {
        Self::new(c.x0, c.y0, c.x1, c.y1)
    }
}

impl BoundingBox {
    /// Build a box from two corners given in any order
    pub fn new(x0: i32, y0: i32, x1: i32, y1: i32) -> Self {
        Self {
            x0: x0.min(x1),
            y0: y0.min(y1),
            x1: x0.max(x1),
            y1: y0.max(y1),
        }
    }

    /// Smallest integer box containing every point of a quadrilateral
    pub fn enclosing(quad: &[[f32; 2]; 4]) -> Self {
        let (mut min_x, mut min_y) = (f32::INFINITY, f32::INFINITY);
        let (mut max_x, mut max_y) = (f32::NEG_INFINITY, f32::NEG_INFINITY);
        for &[x, y] in quad {
            min_x = min_x.min(x);
            min_y = min_y.min(y);
            max_x = max_x.max(x);
            max_y = max_y.max(y);
        }

        Self::new(
            min_x.floor() as i32,
            min_y.floor() as i32,
            max_x.ceil() as i32,
            max_y.ceil() as i32,
        )
    }

    /// Box from an `(x0, y0, x1, y1)` rectangle, truncating each coordinate
    pub fn from_xyxy(area: [f32; 4]) -> Self {
        Self::new(
            area[0] as i32,
            area[1] as i32,
            area[2] as i32,
            area[3] as i32,
        )
    }

    pub fn top_left(&self) -> (i32, i32) {
        (self.x0, self.y0)
    }

    pub fn bottom_right(&self) -> (i32, i32) {
        (self.x1, self.y1)
    }

    /// Width in pixels, counting both edges, saturating at `u32::MAX`
    pub fn width(&self) -> u32 {
        span(self.x0, self.x1)
    }

    /// Height in pixels, counting both edges, saturating at `u32::MAX`
    pub fn height(&self) -> u32 {
        span(self.y0, self.y1)
    }

    pub fn contains(&self, x: f32, y: f32) -> bool {
        x >= self.x0 as f32 && x <= self.x1 as f32 && y >= self.y0 as f32 && y <= self.y1 as f32
    }
}

fn span(low: i32, high: i32) -> u32 {
    u32::try_from(i64::from(high) - i64::from(low) + 1).unwrap_or(u32::MAX)
}

/// A single located feature: a text region or a face
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub bbox: BoundingBox,
    /// Recognized text (text detections only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub label: Option<String>,
    /// Named facial landmarks (face detections only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub landmarks: Option<Landmarks>,
}

impl Detection {
    /// A bare region with neither label nor landmarks
    pub fn region(bbox: BoundingBox) -> Self {
        Self {
            bbox,
            label: None,
            landmarks: None,
        }
    }

    pub fn text(bbox: BoundingBox, label: impl Into<String>) -> Self {
        Self {
            bbox,
            label: Some(label.into()),
            landmarks: None,
        }
    }

    pub fn face(bbox: BoundingBox, landmarks: Landmarks) -> Self {
        Self {
            bbox,
            label: None,
            landmarks: Some(landmarks),
        }
    }

    /// Label to render, if any; empty strings are not drawn
    pub fn visible_label(&self) -> Option<&str> {
        self.label.as_deref().filter(|label| !label.is_empty())
    }
}

/// Detections in the order the underlying model returned them
pub type DetectionResult = Vec<Detection>;
