// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Stroke-width aware drawing primitives
//!
//! `imageproc` only draws one-pixel outlines, so strokes of width `w` are
//! built from `w` one-pixel passes. A stroke covers the offsets returned by
//! [`stroke_offsets`]: for width 3 that is `-1..=1`, for width 2 `0..=1`.
//! Drawing a wide dark stroke and then a narrower colored one on top leaves
//! a dark rim on one side of the colored line.

use std::ops::RangeInclusive;

use ab_glyph::{Font, PxScale, ScaleFont};
use image::{Rgb, RgbImage};
use imageproc::drawing::{draw_hollow_rect_mut, draw_text_mut, BresenhamLineIter};
use imageproc::rect::Rect;

use super::detection::BoundingBox;

/// Pixel offsets covered by a stroke of the given width, relative to the
/// nominal one-pixel path
pub fn stroke_offsets(width: u32) -> RangeInclusive<i32> {
    let width = width.max(1) as i32;
    let low = -((width - 1) / 2);
    low..=(low + width - 1)
}

fn put_pixel_checked(image: &mut RgbImage, x: i32, y: i32, color: Rgb<u8>) {
    if x >= 0 && y >= 0 && (x as u32) < image.width() && (y as u32) < image.height() {
        image.put_pixel(x as u32, y as u32, color);
    }
}

/// Rectangle outline between two inclusive corners
///
/// Edges are clamped to one pixel beyond the image, so boxes far larger
/// than the canvas cost no more than the canvas itself.
pub fn draw_rect_stroke(image: &mut RgbImage, bbox: &BoundingBox, width: u32, color: Rgb<u8>) {
    let (x0, y0) = bbox.top_left();
    let (x1, y1) = bbox.bottom_right();
    let (img_w, img_h) = (image.width(), image.height());
    let clamp_x = |v: i64| v.clamp(-1, i64::from(img_w));
    let clamp_y = |v: i64| v.clamp(-1, i64::from(img_h));

    for d in stroke_offsets(width) {
        let d = i64::from(d);
        let left = clamp_x(i64::from(x0) - d);
        let right = clamp_x(i64::from(x1) + d);
        let top = clamp_y(i64::from(y0) - d);
        let bottom = clamp_y(i64::from(y1) + d);
        if right < left || bottom < top {
            continue;
        }
        let rect = Rect::at(left as i32, top as i32)
            .of_size((right - left + 1) as u32, (bottom - top + 1) as u32);
        draw_hollow_rect_mut(image, rect, color);
    }
}

/// Straight segment drawn with a square brush of the given width
pub fn draw_line_stroke(
    image: &mut RgbImage,
    start: (i32, i32),
    end: (i32, i32),
    width: u32,
    color: Rgb<u8>,
) {
    let offsets = stroke_offsets(width);
    let path = BresenhamLineIter::new(
        (start.0 as f32, start.1 as f32),
        (end.0 as f32, end.1 as f32),
    );
    for (x, y) in path {
        for dy in offsets.clone() {
            for dx in offsets.clone() {
                put_pixel_checked(image, x + dx, y + dy, color);
            }
        }
    }
}

/// Circle outline of the given radius; the stroke is centred on the radius
pub fn draw_circle_stroke(
    image: &mut RgbImage,
    center: (i32, i32),
    radius: i32,
    width: u32,
    color: Rgb<u8>,
) {
    let half = width.max(1) as f32 / 2.0;
    let inner = (radius as f32 - half).max(0.0);
    let outer = radius as f32 + half;
    let (inner_sq, outer_sq) = (inner * inner, outer * outer);
    let reach = outer.ceil() as i32;

    for dy in -reach..=reach {
        for dx in -reach..=reach {
            let dist_sq = (dx * dx + dy * dy) as f32;
            if dist_sq >= inner_sq && dist_sq <= outer_sq {
                put_pixel_checked(image, center.0 + dx, center.1 + dy, color);
            }
        }
    }
}

/// Text whose baseline starts at `origin`, thickened by overdrawing it at
/// every offset of the stroke
pub fn draw_text_stroke<F: Font>(
    image: &mut RgbImage,
    font: &F,
    scale: PxScale,
    origin: (i32, i32),
    text: &str,
    width: u32,
    color: Rgb<u8>,
) {
    // draw_text_mut positions the top of the line box, not the baseline
    let ascent = font.as_scaled(scale).ascent().round() as i32;
    let top = origin.1 - ascent;
    let offsets = stroke_offsets(width);
    for dy in offsets.clone() {
        for dx in offsets.clone() {
            draw_text_mut(image, color, origin.0 + dx, top + dy, scale, font, text);
        }
    }
}
