// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text detection model
//!
//! The detection network outputs a per-pixel text probability map. Regions
//! are recovered by thresholding the map, grouping connected pixels, scoring
//! each group and expanding its box (the "unclip" step of DB
//! post-processing) so the box covers the whole glyphs rather than their
//! shrunk cores.

use anyhow::{Context, Result};
use ndarray::{Array2, Array4, ArrayView2, ArrayViewD, Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

/// Connected regions smaller than this many pixels are noise
const MIN_REGION_PIXELS: usize = 10;

/// A detected text box in detection-input coordinates
#[derive(Debug, Clone, PartialEq)]
pub struct TextBox {
    /// Corners clockwise from top-left
    pub quad: [[f32; 2]; 4],
    /// Mean probability over the region's pixels
    pub score: f32,
}

/// Post-processing thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct DbParams {
    /// Pixel probability above which a pixel counts as text
    pub threshold: f32,
    /// Minimum mean probability of a kept region
    pub box_threshold: f32,
    /// Box expansion factor
    pub unclip_ratio: f32,
    /// Minimum side (in map pixels) of a kept region
    pub min_size: f32,
}

impl Default for DbParams {
    fn default() -> Self {
        Self {
            threshold: 0.3,
            box_threshold: 0.6,
            unclip_ratio: 1.5,
            min_size: 3.0,
        }
    }
}

/// PaddleOCR text detection model
#[derive(Clone)]
pub struct OcrDetectionModel {
    /// ONNX Runtime session, one inference at a time
    session: Arc<Mutex<Session>>,
    input_name: String,
    params: DbParams,
}

impl std::fmt::Debug for OcrDetectionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrDetectionModel")
            .field("input_name", &self.input_name)
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl OcrDetectionModel {
    /// Load the detection model (`det_model.onnx`)
    ///
    /// # Errors
    /// Returns error if the file is missing or ONNX Runtime rejects it
    pub fn load<P: AsRef<Path>>(model_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("OCR detection model not found: {}", model_path.display());
        }

        info!("Loading OCR detection model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load OCR detection model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        debug!("Detection model input: {}", input_name);
        info!("OCR detection model loaded (CPU)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            params: DbParams::default(),
        })
    }

    /// Set the pixel probability threshold
    pub fn with_threshold(mut self, threshold: f32) -> Self {
        self.params.threshold = threshold.clamp(0.0, 1.0);
        self
    }

    pub fn params(&self) -> DbParams {
        self.params
    }

    /// Run detection on a tensor from `preprocess_for_detection`
    ///
    /// Boxes are returned in the tensor's coordinate space.
    pub fn detect(&self, input: &Array4<f32>) -> Result<Vec<TextBox>> {
        let shape = input.shape();
        if shape[0] != 1 || shape[1] != 3 {
            anyhow::bail!("Invalid input shape: {:?}, expected [1, 3, H, W]", shape);
        }
        let (input_height, input_width) = (shape[2], shape[3]);

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("OCR detection session lock poisoned"))?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Detection inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let map = probability_map(output_tensor.view())?;
        let (map_height, map_width) = map.dim();
        let boxes = boxes_from_probability_map(map.view(), &self.params);

        let scale_x = input_width as f32 / map_width as f32;
        let scale_y = input_height as f32 / map_height as f32;
        let boxes: Vec<TextBox> = boxes
            .into_iter()
            .map(|mut text_box| {
                for corner in text_box.quad.iter_mut() {
                    corner[0] *= scale_x;
                    corner[1] *= scale_y;
                }
                text_box
            })
            .collect();

        debug!("Detected {} text regions", boxes.len());

        Ok(boxes)
    }
}

/// Squeeze a `[1, 1, H, W]` or `[1, H, W]` output down to its `H x W` map
pub fn probability_map(output: ArrayViewD<f32>) -> Result<Array2<f32>> {
    let mut map = output;
    while map.ndim() > 2 {
        if map.shape()[0] != 1 {
            anyhow::bail!("Unexpected detection output shape: {:?}", map.shape());
        }
        map = map.index_axis_move(Axis(0), 0);
    }

    let map = map
        .into_dimensionality::<Ix2>()
        .context("Detection output is not a 2D probability map")?;
    Ok(map.to_owned())
}

/// Threshold the map, group 4-connected text pixels and turn each kept
/// group into an expanded axis-aligned box
///
/// Boxes are in map coordinates and ordered top to bottom, then left to
/// right.
pub fn boxes_from_probability_map(map: ArrayView2<f32>, params: &DbParams) -> Vec<TextBox> {
    let (height, width) = map.dim();
    let mut visited = Array2::<bool>::from_elem((height, width), false);
    let mut boxes = Vec::new();

    for y in 0..height {
        for x in 0..width {
            if visited[[y, x]] || map[[y, x]] <= params.threshold {
                continue;
            }

            let region = flood_fill(map, &mut visited, x, y, params.threshold);
            if region.count < MIN_REGION_PIXELS {
                continue;
            }

            let score = region.sum / region.count as f32;
            if score < params.box_threshold {
                continue;
            }

            let box_w = (region.max_x - region.min_x + 1) as f32;
            let box_h = (region.max_y - region.min_y + 1) as f32;
            if box_w.min(box_h) < params.min_size {
                continue;
            }

            let distance = box_w * box_h * params.unclip_ratio / (2.0 * (box_w + box_h));
            let x0 = (region.min_x as f32 - distance).max(0.0);
            let y0 = (region.min_y as f32 - distance).max(0.0);
            let x1 = ((region.max_x + 1) as f32 + distance).min(width as f32);
            let y1 = ((region.max_y + 1) as f32 + distance).min(height as f32);

            boxes.push(TextBox {
                quad: [[x0, y0], [x1, y0], [x1, y1], [x0, y1]],
                score,
            });
        }
    }

    boxes.sort_by(|a, b| {
        a.quad[0][1]
            .total_cmp(&b.quad[0][1])
            .then(a.quad[0][0].total_cmp(&b.quad[0][0]))
    });

    boxes
}

struct Region {
    min_x: usize,
    max_x: usize,
    min_y: usize,
    max_y: usize,
    count: usize,
    sum: f32,
}

fn flood_fill(
    map: ArrayView2<f32>,
    visited: &mut Array2<bool>,
    start_x: usize,
    start_y: usize,
    threshold: f32,
) -> Region {
    let (height, width) = map.dim();
    let mut region = Region {
        min_x: start_x,
        max_x: start_x,
        min_y: start_y,
        max_y: start_y,
        count: 0,
        sum: 0.0,
    };
    let mut stack = vec![(start_x, start_y)];

    while let Some((x, y)) = stack.pop() {
        if visited[[y, x]] {
            continue;
        }
        let prob = map[[y, x]];
        if prob <= threshold {
            continue;
        }

        visited[[y, x]] = true;
        region.count += 1;
        region.sum += prob;
        region.min_x = region.min_x.min(x);
        region.max_x = region.max_x.max(x);
        region.min_y = region.min_y.min(y);
        region.max_y = region.max_y.max(y);

        if x > 0 {
            stack.push((x - 1, y));
        }
        if x + 1 < width {
            stack.push((x + 1, y));
        }
        if y > 0 {
            stack.push((x, y - 1));
        }
        if y + 1 < height {
            stack.push((x, y + 1));
        }
    }

    region
}
