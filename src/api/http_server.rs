// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use anyhow::{Context, Result};
use axum::extract::DefaultBodyLimit;
use axum::routing::get;
use axum::Router;
use std::sync::Arc;
use tower_http::cors::CorsLayer;
use tower_http::services::ServeDir;
use tower_http::trace::TraceLayer;
use tracing::info;

use super::errors::ApiError;
use super::handlers::{
    face_page_handler, face_upload_handler, health_handler, home_handler, ocr_page_handler,
    ocr_upload_handler,
};
use crate::config::{AppConfig, StorageConfig};
use crate::vision::{Annotator, VisionModelManager};

/// Shared by every request; built once at startup
#[derive(Clone)]
pub struct AppState {
    pub models: Arc<VisionModelManager>,
    pub annotator: Arc<Annotator>,
    pub storage: Arc<StorageConfig>,
}

impl AppState {
    pub fn new(models: VisionModelManager, annotator: Annotator, storage: StorageConfig) -> Self {
        Self {
            models: Arc::new(models),
            annotator: Arc::new(annotator),
            storage: Arc::new(storage),
        }
    }
}

pub fn create_router(state: AppState, max_upload_bytes: usize) -> Router {
    let static_files = ServeDir::new(&state.storage.static_dir);

    Router::new()
        .route("/", get(home_handler))
        .route("/ocr", get(ocr_page_handler).post(ocr_upload_handler))
        .route("/face", get(face_page_handler).post(face_upload_handler))
        .route("/health", get(health_handler))
        .nest_service("/static", static_files)
        .fallback(|| async { ApiError::NotFound("No such page".to_string()) })
        .layer(DefaultBodyLimit::max(max_upload_bytes))
        .layer(TraceLayer::new_for_http())
        .layer(CorsLayer::permissive())
        .with_state(state)
}

/// Create the storage directories, bind and serve until Ctrl-C
pub async fn start_server(config: &AppConfig, state: AppState) -> Result<()> {
    config
        .storage
        .ensure_dirs()
        .context("Failed to create storage directories")?;

    let app = create_router(state, config.server.max_upload_bytes);
    let addr = config.server.listen_addr;
    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .with_context(|| format!("Failed to bind {}", addr))?;

    info!("Vision annotator listening on http://{}", addr);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("HTTP server failed")?;

    info!("Server stopped");
    Ok(())
}

async fn shutdown_signal() {
    if tokio::signal::ctrl_c().await.is_ok() {
        info!("Shutdown signal received");
    }
}
