// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! PaddleOCR text recognition model
//!
//! Reads the text of one cropped line. The network emits a class
//! distribution per time step which is collapsed with greedy CTC decoding.

use anyhow::{Context, Result};
use ndarray::{Array4, ArrayView2, ArrayViewD, Axis, Ix2};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::fs::File;
use std::io::{BufRead, BufReader};
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::preprocessing::REC_INPUT_HEIGHT;

/// Recognized text of one line
#[derive(Debug, Clone, Default, PartialEq)]
pub struct RecognizedText {
    pub text: String,
    /// Mean probability of the emitted characters
    pub confidence: f32,
}

impl RecognizedText {
    /// Check if the text is empty or whitespace only
    pub fn is_empty(&self) -> bool {
        self.text.trim().is_empty()
    }
}

/// PaddleOCR text recognition model
#[derive(Clone)]
pub struct OcrRecognitionModel {
    /// ONNX Runtime session, one inference at a time
    session: Arc<Mutex<Session>>,
    /// Characters for classes 1..N; class 0 is the CTC blank
    dictionary: Arc<Vec<char>>,
    input_name: String,
}

impl std::fmt::Debug for OcrRecognitionModel {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OcrRecognitionModel")
            .field("dictionary_size", &self.dictionary.len())
            .field("input_name", &self.input_name)
            .finish_non_exhaustive()
    }
}

impl OcrRecognitionModel {
    /// Load the recognition model (`rec_model.onnx`) and its character
    /// dictionary (`ppocr_keys_v1.txt`)
    pub fn load<P: AsRef<Path>>(model_path: P, dict_path: P) -> Result<Self> {
        let model_path = model_path.as_ref();
        let dict_path = dict_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("OCR recognition model not found: {}", model_path.display());
        }
        if !dict_path.exists() {
            anyhow::bail!(
                "OCR character dictionary not found: {}",
                dict_path.display()
            );
        }

        info!(
            "Loading OCR recognition model from {}",
            model_path.display()
        );

        let dictionary = load_dictionary(dict_path)?;
        info!(
            "Loaded character dictionary with {} characters",
            dictionary.len()
        );

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
                "Failed to load OCR recognition model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "x".to_string());

        debug!("Recognition model input: {}", input_name);
        info!("OCR recognition model loaded (CPU)");

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            dictionary: Arc::new(dictionary),
            input_name,
        })
    }

    pub fn dictionary_size(&self) -> usize {
        self.dictionary.len()
    }

    /// Recognize text from a tensor built by `preprocess_for_recognition`
    pub fn recognize(&self, input: &Array4<f32>) -> Result<RecognizedText> {
        let shape = input.shape();
        if shape[0] != 1
            || shape[1] != 3
            || shape[2] != REC_INPUT_HEIGHT as usize
            || shape[3] < 4
        {
            anyhow::bail!(
                "Invalid input shape: {:?}, expected [1, 3, {}, W>=4]",
                shape,
                REC_INPUT_HEIGHT
            );
        }

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow::anyhow!("OCR recognition session lock poisoned"))?;

        let input_value =
            Value::from_array(input.to_owned()).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("Recognition inference failed")?;

        let output_tensor = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract output tensor")?;

        let steps = step_probabilities(output_tensor.view())?;
        Ok(ctc_greedy_decode(steps, &self.dictionary))
    }
}

/// Read a dictionary file, one character per line
///
/// A space is appended as the final class, matching models exported with
/// space recognition enabled.
pub fn load_dictionary<P: AsRef<Path>>(path: P) -> Result<Vec<char>> {
    let path = path.as_ref();
    let file = File::open(path).context(format!("Failed to open dictionary: {}", path.display()))?;

    let mut dictionary = Vec::new();
    for line in BufReader::new(file).lines() {
        let line = line.context("Failed to read dictionary line")?;
        if let Some(ch) = line.trim_end_matches('\r').chars().next() {
            dictionary.push(ch);
        }
    }
    dictionary.push(' ');

    Ok(dictionary)
}

/// Reduce a `[1, T, C]` output to its `T x C` step distribution
fn step_probabilities(output: ArrayViewD<f32>) -> Result<ArrayView2<f32>> {
    let output = match output.ndim() {
        3 if output.shape()[0] == 1 => output.index_axis_move(Axis(0), 0),
        2 => output,
        _ => anyhow::bail!("Unexpected recognition output shape: {:?}", output.shape()),
    };
    output
        .into_dimensionality::<Ix2>()
        .context("Recognition output is not a step distribution")
}

/// Best-path CTC decoding: take the argmax class at each step, collapse
/// repeats, drop blanks (class 0)
pub fn ctc_greedy_decode(steps: ArrayView2<f32>, dictionary: &[char]) -> RecognizedText {
    let mut text = String::new();
    let mut total = 0.0f32;
    let mut emitted = 0usize;
    let mut previous = 0usize;

    for row in steps.rows() {
        let (class, prob) = row
            .iter()
            .copied()
            .enumerate()
            .fold((0usize, f32::NEG_INFINITY), |best, (i, p)| {
                if p > best.1 {
                    (i, p)
                } else {
                    best
                }
            });

        if class != 0 && class != previous {
            if let Some(&ch) = dictionary.get(class - 1) {
                text.push(ch);
                total += prob;
                emitted += 1;
            }
        }
        previous = class;
    }

    let confidence = if emitted == 0 {
        0.0
    } else {
        (total / emitted as f32).clamp(0.0, 1.0)
    };

    RecognizedText { text, confidence }
}
