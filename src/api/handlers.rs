// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Page, upload and health handlers

use axum::extract::State;
use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use axum::Json;
use axum_extra::extract::Multipart;
use serde::Serialize;
use tracing::{info, warn};

use super::errors::ApiError;
use super::http_server::AppState;
use super::pages::{home_page, upload_page};
use super::upload::{read_image_field, result_filename};
use crate::vision::{DetectionKind, ImageSource, VisionError, VisionModelInfo};

#[derive(Debug, Clone, Serialize)]
pub struct HealthResponse {
    pub status: String,
    pub models: Vec<VisionModelInfo>,
}

/// GET /
pub async fn home_handler() -> Html<String> {
    Html(home_page())
}

/// GET /ocr
pub async fn ocr_page_handler() -> Html<String> {
    Html(upload_page(DetectionKind::Text, None, None))
}

/// POST /ocr
pub async fn ocr_upload_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    annotate_upload(state, DetectionKind::Text, multipart).await
}

/// GET /face
pub async fn face_page_handler() -> Html<String> {
    Html(upload_page(DetectionKind::Face, None, None))
}

/// POST /face
pub async fn face_upload_handler(
    State(state): State<AppState>,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    annotate_upload(state, DetectionKind::Face, multipart).await
}

/// GET /health
pub async fn health_handler(State(state): State<AppState>) -> Json<HealthResponse> {
    let models = state.models.list_models();
    let status = if models.iter().all(|m| m.available) {
        "healthy"
    } else {
        "degraded"
    };

    Json(HealthResponse {
        status: status.to_string(),
        models,
    })
}

/// Store the upload, detect and annotate it, and render the page with the
/// result image
///
/// # Errors
/// - 503 Service Unavailable: the detector for `kind` is not loaded
/// - 400 Bad Request: malformed multipart body
/// - 500 Internal Server Error: inference or persistence failed
///
/// An upload that cannot be decoded renders the page with a notice and no
/// result.
async fn annotate_upload(
    state: AppState,
    kind: DetectionKind,
    multipart: Multipart,
) -> Result<Response, ApiError> {
    let detector = state.models.get(kind).ok_or_else(|| {
        warn!("{} upload rejected: model not loaded", kind);
        ApiError::ModelDisabled(kind)
    })?;

    let Some(upload) = read_image_field(multipart).await? else {
        return Ok(Html(upload_page(kind, None, None)).into_response());
    };

    let upload_path = state.storage.uploads_dir().join(&upload.filename);
    tokio::fs::write(&upload_path, &upload.data)
        .await
        .map_err(|e| ApiError::InternalError(format!("Failed to store upload: {}", e)))?;

    let save_path = state.storage.results_dir().join(&upload.filename);
    let annotator = state.annotator.clone();
    let source = ImageSource::Path(upload_path);

    let outcome = tokio::task::spawn_blocking(move || {
        detector
            .visualize(&source, &annotator, Some(&save_path))
            .map(|_| ())
    })
    .await
    .map_err(|e| ApiError::InternalError(format!("Annotation task failed: {}", e)))?;

    match outcome {
        Ok(()) => {
            let url = format!(
                "/static/{}/{}",
                state.storage.results_subdir,
                result_filename(&upload.filename)
            );
            info!("{} result for {} at {}", kind, upload.filename, url);
            Ok(Html(upload_page(kind, Some(&url), None)).into_response())
        }
        Err(VisionError::DecodeError(e)) => {
            warn!("Could not decode upload {}: {}", upload.filename, e);
            let page = upload_page(kind, None, Some("The uploaded file is not a readable image."));
            Ok((StatusCode::BAD_REQUEST, Html(page)).into_response())
        }
        Err(e) => {
            warn!("{} annotation of {} failed: {}", kind, upload.filename, e);
            Err(e.into())
        }
    }
}
