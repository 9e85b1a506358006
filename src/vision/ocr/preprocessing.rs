// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tensor preparation for the PaddleOCR detection and recognition models

use image::{DynamicImage, GenericImageView, Rgb, RgbImage};
use ndarray::Array4;

use crate::vision::letterbox::Letterbox;

/// Side of the square detection input
pub const DET_INPUT_SIZE: u32 = 640;

/// Recognition model input height
pub const REC_INPUT_HEIGHT: u32 = 48;

/// Maximum width for recognition model input
pub const REC_MAX_WIDTH: u32 = 320;

/// Detection normalization (ImageNet)
pub const DET_MEAN: [f32; 3] = [0.485, 0.456, 0.406];
pub const DET_STD: [f32; 3] = [0.229, 0.224, 0.225];

/// Padding color around the letterboxed detection input
const DET_FILL: Rgb<u8> = Rgb([128, 128, 128]);

/// Letterbox `image` to the detection input size and normalize into an
/// NCHW tensor `[1, 3, 640, 640]`
///
/// Returns the tensor together with the placement needed to map detected
/// boxes back onto `image`.
pub fn preprocess_for_detection(image: &DynamicImage) -> (Array4<f32>, Letterbox) {
    let (width, height) = image.dimensions();
    let letterbox = Letterbox::fit(width, height, DET_INPUT_SIZE);
    let canvas = letterbox.apply(image, DET_FILL);
    (normalize_nchw(&canvas, DET_MEAN, DET_STD), letterbox)
}

/// Resize a cropped text line to height 48 with aspect-preserving width,
/// normalized to `[-1, 1]`
pub fn preprocess_for_recognition(image: &DynamicImage) -> Array4<f32> {
    let (orig_w, orig_h) = image.dimensions();

    let scale = REC_INPUT_HEIGHT as f32 / orig_h.max(1) as f32;
    let new_width = ((orig_w as f32 * scale).round() as u32).clamp(4, REC_MAX_WIDTH);

    let resized = image
        .resize_exact(new_width, REC_INPUT_HEIGHT, image::imageops::FilterType::Triangle)
        .to_rgb8();

    normalize_nchw(&resized, [0.5; 3], [0.5; 3])
}

/// `(pixel / 255 - mean) / std`, laid out as `[1, 3, H, W]`
fn normalize_nchw(rgb: &RgbImage, mean: [f32; 3], std: [f32; 3]) -> Array4<f32> {
    let (width, height) = rgb.dimensions();
    let mut tensor = Array4::zeros((1, 3, height as usize, width as usize));

    for (x, y, pixel) in rgb.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 / 255.0 - mean[c]) / std[c];
        }
    }

    tensor
}
