// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Application configuration
//!
//! Values come from, lowest precedence first: built-in defaults, a TOML
//! file, `VISION_*` environment variables, and finally command line flags
//! (applied by the CLI).

use anyhow::{Context, Result};
use serde::{Deserialize, Serialize};
use std::net::SocketAddr;
use std::path::{Path, PathBuf};
use tracing::warn;

use crate::vision::annotator::LandmarkPolicy;
use crate::vision::image_utils::DEFAULT_JPEG_QUALITY;

pub const ENV_PREFIX: &str = "VISION_";

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AppConfig {
    pub server: ServerConfig,
    pub storage: StorageConfig,
    pub models: ModelsConfig,
    pub annotation: AnnotationConfig,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    pub listen_addr: SocketAddr,
    /// Largest accepted request body
    pub max_upload_bytes: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            listen_addr: SocketAddr::from(([127, 0, 0, 1], 5000)),
            max_upload_bytes: 16 * 1024 * 1024,
        }
    }
}

/// Where uploads and annotated results live
///
/// Both directories sit under `static_dir`, which is served at `/static`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct StorageConfig {
    pub static_dir: PathBuf,
    pub uploads_subdir: String,
    pub results_subdir: String,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            static_dir: PathBuf::from("app/static"),
            uploads_subdir: "uploads".to_string(),
            results_subdir: "results".to_string(),
        }
    }
}

impl StorageConfig {
    pub fn uploads_dir(&self) -> PathBuf {
        self.static_dir.join(&self.uploads_subdir)
    }

    pub fn results_dir(&self) -> PathBuf {
        self.static_dir.join(&self.results_subdir)
    }

    /// Create the uploads and results directories if missing
    pub fn ensure_dirs(&self) -> std::io::Result<()> {
        std::fs::create_dir_all(self.uploads_dir())?;
        std::fs::create_dir_all(self.results_dir())
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct ModelsConfig {
    /// Directory with det_model.onnx, rec_model.onnx and ppocr_keys_v1.txt
    pub ocr_model_dir: Option<PathBuf>,
    pub face_model_path: Option<PathBuf>,
    /// Fail startup instead of disabling a route when a model is missing
    pub require_models: bool,
    pub face_score_threshold: f32,
    pub face_nms_threshold: f32,
    pub text_threshold: f32,
}

impl Default for ModelsConfig {
    fn default() -> Self {
        Self {
            ocr_model_dir: Some(PathBuf::from("./models/paddleocr-onnx")),
            face_model_path: Some(PathBuf::from("./models/retinaface/retinaface.onnx")),
            require_models: false,
            face_score_threshold: 0.9,
            face_nms_threshold: 0.4,
            text_threshold: 0.3,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct AnnotationConfig {
    /// Label font; the usual system locations are searched when unset
    pub font_path: Option<PathBuf>,
    pub jpeg_quality: u8,
    pub landmark_policy: LandmarkPolicy,
}

impl Default for AnnotationConfig {
    fn default() -> Self {
        Self {
            font_path: None,
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            landmark_policy: LandmarkPolicy::default(),
        }
    }
}

impl AppConfig {
    /// Load configuration from a TOML file; missing keys keep their defaults
    pub fn from_file(path: &Path) -> Result<Self> {
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("Failed to read config file {}", path.display()))?;
        toml::from_str(&content)
            .with_context(|| format!("Failed to parse config file {}", path.display()))
    }

    /// Defaults overridden by environment variables
    pub fn from_env() -> Self {
        let mut config = Self::default();
        config.apply_env();
        config
    }

    /// Override fields from `VISION_*` environment variables
    pub fn apply_env(&mut self) {
        self.apply_overrides(|key| std::env::var(format!("{}{}", ENV_PREFIX, key)).ok());
    }

    /// Override fields from any key lookup (keys without the prefix)
    ///
    /// Unparseable values are logged and ignored.
    pub fn apply_overrides<F>(&mut self, lookup: F)
    where
        F: Fn(&str) -> Option<String>,
    {
        fn parse<T: std::str::FromStr>(key: &str, value: String) -> Option<T> {
            match value.parse() {
                Ok(parsed) => Some(parsed),
                Err(_) => {
                    warn!("Ignoring invalid {}{}={}", ENV_PREFIX, key, value);
                    None
                }
            }
        }

        macro_rules! set {
            ($key:literal, $field:expr) => {
                if let Some(value) = lookup($key).and_then(|v| parse($key, v)) {
                    $field = value;
                }
            };
            ($key:literal, $field:expr, optional) => {
                if let Some(value) = lookup($key) {
                    $field = if value.is_empty() {
                        None
                    } else {
                        Some(PathBuf::from(value))
                    };
                }
            };
        }

        set!("LISTEN_ADDR", self.server.listen_addr);
        set!("MAX_UPLOAD_BYTES", self.server.max_upload_bytes);
        if let Some(dir) = lookup("STATIC_DIR") {
            self.storage.static_dir = PathBuf::from(dir);
        }
        set!("OCR_MODEL_DIR", self.models.ocr_model_dir, optional);
        set!("FACE_MODEL_PATH", self.models.face_model_path, optional);
        set!("REQUIRE_MODELS", self.models.require_models);
        set!("FACE_SCORE_THRESHOLD", self.models.face_score_threshold);
        set!("FACE_NMS_THRESHOLD", self.models.face_nms_threshold);
        set!("TEXT_THRESHOLD", self.models.text_threshold);
        set!("FONT_PATH", self.annotation.font_path, optional);
        set!("JPEG_QUALITY", self.annotation.jpeg_quality);
        set!("LANDMARK_POLICY", self.annotation.landmark_policy);
    }
}
