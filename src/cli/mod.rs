// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use clap::{Args, Parser, Subcommand};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::info;

use crate::api::{start_server, AppState};
use crate::config::AppConfig;
use crate::vision::face::FaceParams;
use crate::vision::image_utils::jpeg_output_path;
use crate::vision::{
    Annotator, DetectionKind, Detector, FaceDetector, ImageSource, LandmarkPolicy, TextDetector,
    VisionModelManager,
};

/// Vision annotator: OCR and face detection with annotated results
#[derive(Parser, Debug)]
#[command(name = "vision-annotator")]
#[command(version)]
#[command(about = "Annotate images with detected text or faces", long_about = None)]
pub struct Cli {
    /// TOML configuration file
    #[arg(long, short, global = true, env = "VISION_CONFIG")]
    pub config: Option<PathBuf>,

    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Run the web application (default)
    Serve(ServeArgs),

    /// Annotate one local image and write the result as JPEG
    Annotate(AnnotateArgs),
}

/// Overrides shared by every command
#[derive(Args, Debug, Default, Clone)]
pub struct ModelArgs {
    /// Directory holding the PaddleOCR ONNX models and dictionary
    #[arg(long)]
    pub ocr_model_dir: Option<PathBuf>,

    /// RetinaFace ONNX model file
    #[arg(long)]
    pub face_model_path: Option<PathBuf>,

    /// Font used for text labels
    #[arg(long)]
    pub font: Option<PathBuf>,

    /// What to do when a face lacks an eye or mouth landmark (skip/strict)
    #[arg(long)]
    pub landmark_policy: Option<LandmarkPolicy>,
}

#[derive(Args, Debug, Default, Clone)]
pub struct ServeArgs {
    /// Address to listen on
    #[arg(long)]
    pub listen: Option<SocketAddr>,

    /// Directory served at /static, holding uploads and results
    #[arg(long)]
    pub static_dir: Option<PathBuf>,

    /// Refuse to start if a model cannot be loaded
    #[arg(long)]
    pub require_models: bool,

    #[command(flatten)]
    pub models: ModelArgs,
}

#[derive(Args, Debug, Clone)]
pub struct AnnotateArgs {
    /// Detector to run (text/face)
    #[arg(long, short)]
    pub kind: DetectionKind,

    /// Image to annotate
    pub input: PathBuf,

    /// Output path; the extension is replaced with .jpg
    #[arg(long, short, default_value = "output.jpg")]
    pub output: PathBuf,

    #[command(flatten)]
    pub models: ModelArgs,
}

/// Defaults, then the config file, then `VISION_*` variables
pub fn load_config(path: Option<&Path>) -> Result<AppConfig> {
    let mut config = match path {
        Some(path) => AppConfig::from_file(path)?,
        None => AppConfig::default(),
    };
    config.apply_env();
    Ok(config)
}

impl ModelArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(ref dir) = self.ocr_model_dir {
            config.models.ocr_model_dir = Some(dir.clone());
        }
        if let Some(ref path) = self.face_model_path {
            config.models.face_model_path = Some(path.clone());
        }
        if let Some(ref font) = self.font {
            config.annotation.font_path = Some(font.clone());
        }
        if let Some(policy) = self.landmark_policy {
            config.annotation.landmark_policy = policy;
        }
    }
}

impl ServeArgs {
    pub fn apply(&self, config: &mut AppConfig) {
        if let Some(addr) = self.listen {
            config.server.listen_addr = addr;
        }
        if let Some(ref dir) = self.static_dir {
            config.storage.static_dir = dir.clone();
        }
        if self.require_models {
            config.models.require_models = true;
        }
        self.models.apply(config);
    }
}

/// Execute CLI command
pub async fn execute(cli: Cli) -> Result<()> {
    let mut config = load_config(cli.config.as_deref())?;

    match cli.command.unwrap_or(Commands::Serve(ServeArgs::default())) {
        Commands::Serve(args) => {
            args.apply(&mut config);
            serve(config).await
        }
        Commands::Annotate(args) => {
            args.models.apply(&mut config);
            annotate(config, args).await
        }
    }
}

async fn serve(config: AppConfig) -> Result<()> {
    let models_config = config.models.clone();
    let models = tokio::task::spawn_blocking(move || VisionModelManager::load(&models_config))
        .await
        .context("Model loading task failed")??;
    let annotator = Annotator::from_config(&config.annotation)?;

    info!(
        "Models ready: text={}, face={}",
        models.has_text(),
        models.has_face()
    );

    let state = AppState::new(models, annotator, config.storage.clone());
    start_server(&config, state).await
}

fn build_detector(config: &AppConfig, kind: DetectionKind) -> Result<Arc<dyn Detector>> {
    let models = &config.models;
    let detector: Arc<dyn Detector> = match kind {
        DetectionKind::Text => {
            let dir = models
                .ocr_model_dir
                .as_deref()
                .context("No OCR model directory configured")?;
            Arc::new(TextDetector::from_model_dir(dir, models.text_threshold)?)
        }
        DetectionKind::Face => {
            let path = models
                .face_model_path
                .as_deref()
                .context("No face model path configured")?;
            let params = FaceParams {
                score_threshold: models.face_score_threshold,
                nms_threshold: models.face_nms_threshold,
            };
            Arc::new(FaceDetector::from_model_path(path, params)?)
        }
    };
    Ok(detector)
}

async fn annotate(config: AppConfig, args: AnnotateArgs) -> Result<()> {
    let annotator = Annotator::from_config(&config.annotation)?;
    let output = args.output.clone();

    let annotated = tokio::task::spawn_blocking(move || -> Result<_> {
        let detector = build_detector(&config, args.kind)?;
        let image = detector.visualize(
            &ImageSource::Path(args.input.clone()),
            &annotator,
            Some(&args.output),
        )?;
        Ok(image)
    })
    .await
    .context("Annotation task failed")??;

    println!(
        "Wrote {}x{} annotated image to {}",
        annotated.width(),
        annotated.height(),
        jpeg_output_path(&output).display()
    );
    Ok(())
}
