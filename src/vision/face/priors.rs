// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! RetinaFace anchor priors, box decoding and non-maximum suppression

/// Feature map strides
pub const STEPS: [u32; 3] = [8, 16, 32];
/// Anchor sizes per stride, in input pixels
pub const MIN_SIZES: [[f32; 2]; 3] = [[16.0, 32.0], [64.0, 128.0], [256.0, 512.0]];
/// Center and size variances used when the model was trained
pub const VARIANCES: [f32; 2] = [0.1, 0.2];

/// Anchor box, all values normalized to the input size
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Prior {
    pub cx: f32,
    pub cy: f32,
    pub w: f32,
    pub h: f32,
}

/// Anchors for a `width` x `height` input, in the order the model emits
/// its predictions: stride, then row, then column, then anchor size
pub fn generate_priors(width: u32, height: u32) -> Vec<Prior> {
    let mut priors = Vec::new();
    let (w, h) = (width as f32, height as f32);

    for (step, min_sizes) in STEPS.iter().zip(MIN_SIZES.iter()) {
        let rows = height.div_ceil(*step);
        let cols = width.div_ceil(*step);
        let step = *step as f32;

        for i in 0..rows {
            for j in 0..cols {
                for &min_size in min_sizes {
                    priors.push(Prior {
                        cx: (j as f32 + 0.5) * step / w,
                        cy: (i as f32 + 0.5) * step / h,
                        w: min_size / w,
                        h: min_size / h,
                    });
                }
            }
        }
    }

    priors
}

/// Decode a regression `[dx, dy, dw, dh]` into a normalized
/// `[x0, y0, x1, y1]` box
pub fn decode_box(prior: &Prior, loc: [f32; 4]) -> [f32; 4] {
    let cx = prior.cx + loc[0] * VARIANCES[0] * prior.w;
    let cy = prior.cy + loc[1] * VARIANCES[0] * prior.h;
    let w = prior.w * (loc[2] * VARIANCES[1]).exp();
    let h = prior.h * (loc[3] * VARIANCES[1]).exp();
    [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0]
}

/// Decode five landmark offsets into normalized points
pub fn decode_landmarks(prior: &Prior, landms: [f32; 10]) -> [[f32; 2]; 5] {
    let mut points = [[0.0; 2]; 5];
    for (k, point) in points.iter_mut().enumerate() {
        point[0] = prior.cx + landms[2 * k] * VARIANCES[0] * prior.w;
        point[1] = prior.cy + landms[2 * k + 1] * VARIANCES[0] * prior.h;
    }
    points
}

/// Intersection over union of two `[x0, y0, x1, y1]` boxes
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let ix0 = a[0].max(b[0]);
    let iy0 = a[1].max(b[1]);
    let ix1 = a[2].min(b[2]);
    let iy1 = a[3].min(b[3]);

    let inter = (ix1 - ix0).max(0.0) * (iy1 - iy0).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - inter;

    if union <= 0.0 {
        0.0
    } else {
        inter / union
    }
}

/// Greedy NMS over `(box, score)` pairs
///
/// Returns the indices of kept entries, highest score first.
pub fn nms(boxes: &[[f32; 4]], scores: &[f32], iou_threshold: f32) -> Vec<usize> {
    let mut order: Vec<usize> = (0..boxes.len().min(scores.len())).collect();
    order.sort_by(|&a, &b| scores[b].total_cmp(&scores[a]));

    let mut keep: Vec<usize> = Vec::new();
    for candidate in order {
        if keep
            .iter()
            .all(|&kept| iou(&boxes[kept], &boxes[candidate]) <= iou_threshold)
        {
            keep.push(candidate);
        }
    }
    keep
}
