// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Multipart upload extraction and upload file naming

use axum::body::Bytes;
use axum::http::StatusCode;
use axum_extra::extract::multipart::MultipartError;
use axum_extra::extract::Multipart;
use std::path::Path;
use tracing::debug;

use super::errors::ApiError;
use crate::vision::image_utils::jpeg_output_path;

/// Form field carrying the image
pub const IMAGE_FIELD: &str = "image";

/// An image file received from the upload form
#[derive(Debug, Clone)]
pub struct UploadedImage {
    /// Sanitized, never empty
    pub filename: String,
    pub data: Bytes,
}

/// Reduce a client-supplied file name to a safe single path component
///
/// Non-ASCII characters are dropped, path separators and whitespace runs
/// become `_`, anything outside `[A-Za-z0-9_.-]` is removed and leading or
/// trailing dots and underscores are stripped. The result may be empty.
pub fn secure_filename(filename: &str) -> String {
    let ascii: String = filename
        .chars()
        .filter(char::is_ascii)
        .map(|c| if c == '/' || c == '\\' { ' ' } else { c })
        .collect();

    let joined = ascii.split_whitespace().collect::<Vec<_>>().join("_");

    joined
        .chars()
        .filter(|c| c.is_ascii_alphanumeric() || matches!(c, '_' | '.' | '-'))
        .collect::<String>()
        .trim_matches(|c| c == '.' || c == '_')
        .to_string()
}

/// File name of the annotated result for an upload
pub fn result_filename(upload_filename: &str) -> String {
    jpeg_output_path(Path::new(upload_filename))
        .to_string_lossy()
        .into_owned()
}

fn multipart_error(context: &str, err: MultipartError) -> ApiError {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        ApiError::PayloadTooLarge(err.body_text())
    } else {
        ApiError::InvalidRequest(format!("{}: {}", context, err.body_text()))
    }
}

/// Pull the `image` file out of a multipart form
///
/// Returns `None` when the field is absent, carries no file name, or the
/// name sanitizes to nothing.
pub async fn read_image_field(mut multipart: Multipart) -> Result<Option<UploadedImage>, ApiError> {
    while let Some(field) = multipart
        .next_field()
        .await
        .map_err(|e| multipart_error("Malformed multipart body", e))?
    {
        if field.name() != Some(IMAGE_FIELD) {
            continue;
        }

        let original = field.file_name().unwrap_or_default().to_string();
        let data = field
            .bytes()
            .await
            .map_err(|e| multipart_error("Failed to read upload", e))?;

        let filename = secure_filename(&original);
        if filename.is_empty() {
            debug!("Ignoring upload with unusable file name {:?}", original);
            return Ok(None);
        }

        debug!("Received upload {} ({} bytes)", filename, data.len());
        return Ok(Some(UploadedImage { filename, data }));
    }

    Ok(None)
}
