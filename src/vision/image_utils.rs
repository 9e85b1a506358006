// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Image loading and persistence for the annotation pipeline

use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

use image::codecs::jpeg::JpegEncoder;
use image::{DynamicImage, ExtendedColorType, ImageEncoder, ImageFormat, RgbImage};
use thiserror::Error;

/// Default JPEG quality for persisted results
pub const DEFAULT_JPEG_QUALITY: u8 = 95;

/// Errors raised while reading an input image
#[derive(Debug, Error)]
pub enum ImageError {
    #[error("Failed to read image file {path}: {message}")]
    Unreadable { path: PathBuf, message: String },

    #[error("Unsupported image format")]
    UnsupportedFormat,

    #[error("Failed to decode image: {0}")]
    DecodeFailed(String),

    #[error("Image data is empty")]
    EmptyData,
}

/// Where an input image comes from
#[derive(Debug, Clone)]
pub enum ImageSource {
    /// Image file on disk
    Path(PathBuf),
    /// Encoded image bytes already in memory
    Bytes(Vec<u8>),
}

impl ImageSource {
    /// Read and decode the image
    pub fn decode(&self) -> Result<DynamicImage, ImageError> {
        match self {
            ImageSource::Path(path) => decode_image_path(path),
            ImageSource::Bytes(bytes) => decode_image_bytes(bytes),
        }
    }
}

impl From<PathBuf> for ImageSource {
    fn from(path: PathBuf) -> Self {
        ImageSource::Path(path)
    }
}

impl From<&Path> for ImageSource {
    fn from(path: &Path) -> Self {
        ImageSource::Path(path.to_path_buf())
    }
}

impl From<Vec<u8>> for ImageSource {
    fn from(bytes: Vec<u8>) -> Self {
        ImageSource::Bytes(bytes)
    }
}

/// Read an image file and decode it
pub fn decode_image_path(path: &Path) -> Result<DynamicImage, ImageError> {
    let bytes = std::fs::read(path).map_err(|e| ImageError::Unreadable {
        path: path.to_path_buf(),
        message: e.to_string(),
    })?;
    decode_image_bytes(&bytes)
}

/// Decode raw image bytes (for multipart uploads)
///
/// # Returns
/// * `Ok(DynamicImage)` - The decoded image
/// * `Err(ImageError)` - If the bytes are empty, unrecognized, or corrupt
pub fn decode_image_bytes(bytes: &[u8]) -> Result<DynamicImage, ImageError> {
    if bytes.is_empty() {
        return Err(ImageError::EmptyData);
    }

    let format = detect_format(bytes)?;

    image::load_from_memory_with_format(bytes, format)
        .map_err(|e| ImageError::DecodeFailed(e.to_string()))
}

/// Detect image format from magic bytes
///
/// The common upload formats are matched directly; anything else is left to
/// the `image` crate's own signature table.
pub fn detect_format(bytes: &[u8]) -> Result<ImageFormat, ImageError> {
    if bytes.len() < 4 {
        return Err(ImageError::UnsupportedFormat);
    }

    match bytes {
        // PNG: 89 50 4E 47 (0x89 P N G)
        [0x89, 0x50, 0x4E, 0x47, ..] => Ok(ImageFormat::Png),

        // JPEG: FF D8 FF
        [0xFF, 0xD8, 0xFF, ..] => Ok(ImageFormat::Jpeg),

        // WebP: RIFF .... WEBP
        [0x52, 0x49, 0x46, 0x46, _, _, _, _, 0x57, 0x45, 0x42, 0x50, ..] => Ok(ImageFormat::WebP),

        // GIF: GIF87a or GIF89a
        [0x47, 0x49, 0x46, 0x38, x, ..] if *x == 0x37 || *x == 0x39 => Ok(ImageFormat::Gif),

        // BMP: BM
        [0x42, 0x4D, ..] => Ok(ImageFormat::Bmp),

        // TIFF: II (little-endian) or MM (big-endian)
        [0x49, 0x49, 0x2A, 0x00, ..] | [0x4D, 0x4D, 0x00, 0x2A, ..] => Ok(ImageFormat::Tiff),

        _ => image::guess_format(bytes).map_err(|_| ImageError::UnsupportedFormat),
    }
}

/// Path the annotated result is actually written to: the extension is
/// always replaced with `.jpg`.
pub fn jpeg_output_path(save_path: &Path) -> PathBuf {
    save_path.with_extension("jpg")
}

/// Encode an RGB image as JPEG and write it to `path`
pub fn save_jpeg(image: &RgbImage, path: &Path, quality: u8) -> Result<(), image::ImageError> {
    let file = File::create(path).map_err(image::ImageError::IoError)?;
    let mut writer = BufWriter::new(file);
    let encoder = JpegEncoder::new_with_quality(&mut writer, quality.clamp(1, 100));
    encoder.write_image(
        image.as_raw(),
        image.width(),
        image.height(),
        ExtendedColorType::Rgb8,
    )?;
    writer.flush().map_err(image::ImageError::IoError)
}
