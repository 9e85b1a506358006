// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Aspect-preserving resize onto a square canvas, and the inverse mapping
//! from model space back to the source image

use image::imageops::{self, FilterType};
use image::{DynamicImage, GenericImageView, Rgb, RgbImage};

/// Placement of a source image inside a square model input
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Letterbox {
    /// Scale factor applied to the source image
    pub scale: f32,
    /// Horizontal padding before the resized image
    pub offset_x: u32,
    /// Vertical padding before the resized image
    pub offset_y: u32,
    pub original_width: u32,
    pub original_height: u32,
    pub target_size: u32,
}

impl Letterbox {
    /// Compute the placement of a `width` x `height` image on a
    /// `target_size` square
    pub fn fit(width: u32, height: u32, target_size: u32) -> Self {
        if width == 0 || height == 0 {
            return Self {
                scale: 1.0,
                offset_x: 0,
                offset_y: 0,
                original_width: width,
                original_height: height,
                target_size,
            };
        }

        let scale = (target_size as f32 / width as f32).min(target_size as f32 / height as f32);
        let (new_w, new_h) = Self::scaled_dims(width, height, scale, target_size);

        Self {
            scale,
            offset_x: (target_size - new_w) / 2,
            offset_y: (target_size - new_h) / 2,
            original_width: width,
            original_height: height,
            target_size,
        }
    }

    fn scaled_dims(width: u32, height: u32, scale: f32, target_size: u32) -> (u32, u32) {
        let new_w = ((width as f32 * scale).round() as u32).clamp(1, target_size);
        let new_h = ((height as f32 * scale).round() as u32).clamp(1, target_size);
        (new_w, new_h)
    }

    /// Resize `image` and paste it centred on a canvas filled with `fill`
    pub fn apply(&self, image: &DynamicImage, fill: Rgb<u8>) -> RgbImage {
        let mut canvas = RgbImage::from_pixel(self.target_size, self.target_size, fill);
        let (width, height) = image.dimensions();
        if width == 0 || height == 0 {
            return canvas;
        }

        let (new_w, new_h) = Self::scaled_dims(width, height, self.scale, self.target_size);
        let resized = image.resize_exact(new_w, new_h, FilterType::Triangle).to_rgb8();
        imageops::replace(
            &mut canvas,
            &resized,
            self.offset_x as i64,
            self.offset_y as i64,
        );
        canvas
    }

    /// Map a point from model input space back to the source image,
    /// clamped to the source bounds
    pub fn map_to_original(&self, x: f32, y: f32) -> (f32, f32) {
        let orig_x = (x - self.offset_x as f32) / self.scale;
        let orig_y = (y - self.offset_y as f32) / self.scale;
        (
            orig_x.clamp(0.0, self.original_width.saturating_sub(1) as f32),
            orig_y.clamp(0.0, self.original_height.saturating_sub(1) as f32),
        )
    }
}
