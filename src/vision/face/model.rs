// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! RetinaFace face detector on ONNX Runtime

use std::collections::BTreeMap;
use std::path::Path;
use std::sync::{Arc, Mutex};

use anyhow::{Context, Result};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::{Array4, ArrayView2, ArrayViewD, Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use tracing::{debug, info};

use super::priors::{decode_box, decode_landmarks, generate_priors, nms, Prior};
use super::{FaceLocator, RawFace};
use crate::vision::letterbox::Letterbox;

/// Side of the square model input
pub const FACE_INPUT_SIZE: u32 = 640;

/// Per-channel mean subtracted from the BGR input
pub const BGR_MEAN: [f32; 3] = [104.0, 117.0, 123.0];

/// Landmark names in the order of the model's five points
pub const LANDMARK_NAMES: [&str; 5] = ["right_eye", "left_eye", "nose", "mouth_right", "mouth_left"];

/// Padding equal to the mean, so padded pixels are zero after normalization
const PAD_FILL: Rgb<u8> = Rgb([123, 117, 104]);

/// Detection thresholds
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct FaceParams {
    /// Minimum face probability
    pub score_threshold: f32,
    /// IoU above which the weaker of two faces is dropped
    pub nms_threshold: f32,
}

impl Default for FaceParams {
    fn default() -> Self {
        Self {
            score_threshold: 0.9,
            nms_threshold: 0.4,
        }
    }
}

/// RetinaFace (MobileNet or ResNet backbone) exported to ONNX
///
/// The export is expected to produce three outputs per anchor: box
/// regression (4), class scores after softmax (2) and landmark regression
/// (10). They are told apart by their last dimension.
#[derive(Clone)]
pub struct RetinaFaceModel {
    session: Arc<Mutex<Session>>,
    input_name: String,
    priors: Arc<Vec<Prior>>,
    params: FaceParams,
}

impl std::fmt::Debug for RetinaFaceModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RetinaFaceModel")
            .field("input_name", &self.input_name)
            .field("priors", &self.priors.len())
            .field("params", &self.params)
            .finish_non_exhaustive()
    }
}

impl RetinaFaceModel {
    pub fn load<P: AsRef<Path>>(model_path: P, params: FaceParams) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("Face detection model not found: {}", model_path.display());
        }

        info!("Loading RetinaFace model from {}", model_path.display());

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
                "Failed to load face detection model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "input".to_string());

        info!("RetinaFace model loaded (CPU), input: {}", input_name);

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            priors: Arc::new(generate_priors(FACE_INPUT_SIZE, FACE_INPUT_SIZE)),
            params,
        })
    }

    fn run(&self, input: Array4<f32>) -> Result<ModelOutputs> {
        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("Face detection session lock poisoned"))?;

        let input_value = Value::from_array(input).context("Failed to create input tensor")?;
        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Face detection inference failed")?;

        let mut loc = None;
        let mut conf = None;
        let mut landms = None;
        for (_, value) in outputs.iter() {
            let tensor = value
                .try_extract_array::<f32>()
                .context("Failed to extract output tensor")?;
            let per_anchor = anchor_rows(tensor.view())?;
            match per_anchor.ncols() {
                4 => loc = Some(per_anchor.to_owned()),
                2 => conf = Some(per_anchor.to_owned()),
                10 => landms = Some(per_anchor.to_owned()),
                other => debug!("Ignoring face model output with {} columns", other),
            }
        }

        Ok(ModelOutputs {
            loc: loc.context("Face model has no box regression output")?,
            conf: conf.context("Face model has no score output")?,
            landms: landms.context("Face model has no landmark output")?,
        })
    }
}

struct ModelOutputs {
    loc: ndarray::Array2<f32>,
    conf: ndarray::Array2<f32>,
    landms: ndarray::Array2<f32>,
}

/// `[1, N, C]` or `[N, C]` output as an `N x C` view
fn anchor_rows(output: ArrayViewD<f32>) -> Result<ArrayView2<f32>> {
    let output = match output.ndim() {
        3 if output.shape()[0] == 1 => output.index_axis_move(Axis(0), 0),
        2 => output,
        _ => anyhow::bail!("Unexpected face model output shape: {:?}", output.shape()),
    };
    output
        .into_dimensionality::<Ix2>()
        .context("Face model output is not per-anchor")
}

/// Letterboxed BGR tensor with the channel means removed
pub fn preprocess(image: &DynamicImage) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let letterbox = Letterbox::fit(width, height, FACE_INPUT_SIZE);
    let canvas: RgbImage = letterbox.apply(image, PAD_FILL);

    let size = FACE_INPUT_SIZE as usize;
    let mut tensor = Array4::zeros((1, 3, size, size));
    for (x, y, pixel) in canvas.enumerate_pixels() {
        let (x, y) = (x as usize, y as usize);
        tensor[[0, 0, y, x]] = pixel[2] as f32 - BGR_MEAN[0];
        tensor[[0, 1, y, x]] = pixel[1] as f32 - BGR_MEAN[1];
        tensor[[0, 2, y, x]] = pixel[0] as f32 - BGR_MEAN[2];
    }

    (tensor, letterbox)
}

/// Turn per-anchor predictions into faces in source image coordinates
fn postprocess(
    outputs: &ModelOutputs,
    priors: &[Prior],
    letterbox: &Letterbox,
    params: &FaceParams,
) -> Result<Vec<RawFace>> {
    let anchors = priors.len();
    if outputs.loc.nrows() != anchors
        || outputs.conf.nrows() != anchors
        || outputs.landms.nrows() != anchors
    {
        anyhow::bail!(
            "Face model produced {} predictions for {} anchors",
            outputs.conf.nrows(),
            anchors
        );
    }

    let size = letterbox.target_size as f32;
    let mut boxes = Vec::new();
    let mut scores = Vec::new();
    let mut points = Vec::new();

    for (index, prior) in priors.iter().enumerate() {
        let score = outputs.conf[[index, 1]];
        if score < params.score_threshold {
            continue;
        }

        let loc = outputs.loc.row(index);
        let bbox = decode_box(prior, [loc[0], loc[1], loc[2], loc[3]]);
        let mut landms = [0.0; 10];
        for (k, value) in outputs.landms.row(index).iter().enumerate() {
            landms[k] = *value;
        }

        boxes.push(bbox.map(|v| v * size));
        scores.push(score);
        points.push(decode_landmarks(prior, landms).map(|[x, y]| [x * size, y * size]));
    }

    let faces = nms(&boxes, &scores, params.nms_threshold)
        .into_iter()
        .enumerate()
        .map(|(n, kept)| {
            let [x0, y0, x1, y1] = boxes[kept];
            let (x0, y0) = letterbox.map_to_original(x0, y0);
            let (x1, y1) = letterbox.map_to_original(x1, y1);

            let landmarks: BTreeMap<String, [f32; 2]> = LANDMARK_NAMES
                .iter()
                .zip(points[kept].iter())
                .map(|(name, &[x, y])| {
                    let (x, y) = letterbox.map_to_original(x, y);
                    (name.to_string(), [x, y])
                })
                .collect();

            RawFace {
                id: format!("face_{}", n + 1),
                score: scores[kept],
                facial_area: [x0, y0, x1, y1],
                landmarks,
            }
        })
        .collect();

    Ok(faces)
}

impl FaceLocator for RetinaFaceModel {
    fn locate_faces(&self, image: &DynamicImage) -> Result<Vec<RawFace>> {
        let (tensor, letterbox) = preprocess(image);
        let outputs = self.run(tensor)?;
        let faces = postprocess(&outputs, &self.priors, &letterbox, &self.params)?;
        debug!("RetinaFace kept {} faces", faces.len());
        Ok(faces)
    }
}
