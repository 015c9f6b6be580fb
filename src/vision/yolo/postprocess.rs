// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 output decoding
//!
//! Detection heads emit `[1, 4 + C (+ M), N]`: per anchor, a center-format box
//! in network pixels, C class scores and, for segmentation heads, M mask
//! coefficients. Segmentation models add a second output `[1, M, mh, mw]`
//! holding the mask prototypes.

use ndarray::{ArrayView2, ArrayView3};

use super::preprocessing::Letterbox;
use crate::vision::backend::RawMask;

/// A decoded anchor that passed the confidence filter
#[derive(Debug, Clone, PartialEq)]
pub struct Candidate {
    pub class_id: usize,
    pub confidence: f32,
    /// [x1, y1, x2, y2] in network input pixels
    pub bbox: [f32; 4],
    /// Mask coefficients (empty for detection-only heads)
    pub coefficients: Vec<f32>,
}

/// Decode a `[4 + C + M, N]` prediction matrix
///
/// Each anchor keeps its best class; anchors below `confidence` are dropped.
pub fn decode_predictions(
    predictions: ArrayView2<f32>,
    num_classes: usize,
    confidence: f32,
) -> Vec<Candidate> {
    let channels = predictions.shape()[0];
    let num_anchors = predictions.shape()[1];
    if channels < 4 + num_classes {
        return Vec::new();
    }
    let num_coefficients = channels - 4 - num_classes;

    let mut candidates = Vec::new();
    for i in 0..num_anchors {
        let (class_id, score) = (0..num_classes)
            .map(|c| (c, predictions[[4 + c, i]]))
            .fold((0, f32::MIN), |best, cur| if cur.1 > best.1 { cur } else { best });

        if score < confidence {
            continue;
        }

        let cx = predictions[[0, i]];
        let cy = predictions[[1, i]];
        let w = predictions[[2, i]];
        let h = predictions[[3, i]];

        let coefficients = (0..num_coefficients)
            .map(|k| predictions[[4 + num_classes + k, i]])
            .collect();

        candidates.push(Candidate {
            class_id,
            confidence: score,
            bbox: [cx - w / 2.0, cy - h / 2.0, cx + w / 2.0, cy + h / 2.0],
            coefficients,
        });
    }

    candidates
}

/// Per-class non-maximum suppression
///
/// Survivors are returned in descending confidence order.
pub fn non_max_suppression(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<Candidate> = Vec::new();
    for candidate in candidates {
        let suppressed = keep.iter().any(|kept| {
            kept.class_id == candidate.class_id && iou(&kept.bbox, &candidate.bbox) > iou_threshold
        });
        if !suppressed {
            keep.push(candidate);
        }
    }

    keep
}

/// Intersection over union of two xyxy boxes
pub fn iou(a: &[f32; 4], b: &[f32; 4]) -> f32 {
    let x1 = a[0].max(b[0]);
    let y1 = a[1].max(b[1]);
    let x2 = a[2].min(b[2]);
    let y2 = a[3].min(b[3]);

    let intersection = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let area_a = (a[2] - a[0]).max(0.0) * (a[3] - a[1]).max(0.0);
    let area_b = (b[2] - b[0]).max(0.0) * (b[3] - b[1]).max(0.0);
    let union = area_a + area_b - intersection;

    if union > 0.0 {
        intersection / union
    } else {
        0.0
    }
}

/// Map a network-space box to source image pixels
pub fn to_source_box(bbox: &[f32; 4], letterbox: &Letterbox) -> [f32; 4] {
    let (x1, y1) = letterbox.map_to_original(bbox[0], bbox[1]);
    let (x2, y2) = letterbox.map_to_original(bbox[2], bbox[3]);
    [x1, y1, x2, y2]
}

/// Assemble the binary mask of one detection
///
/// Only the unpadded region of the prototypes is kept, so the mask covers
/// the source image at prototype resolution. Pixels outside `source_box` are
/// cleared.
pub fn build_mask(
    coefficients: &[f32],
    protos: ArrayView3<f32>,
    letterbox: &Letterbox,
    source_box: &[f32; 4],
    threshold: f32,
) -> Option<RawMask> {
    let (num_protos, proto_h, proto_w) = protos.dim();
    if num_protos != coefficients.len() || letterbox.input_width == 0 || letterbox.input_height == 0
    {
        return None;
    }

    let ratio_x = proto_w as f32 / letterbox.input_width as f32;
    let ratio_y = proto_h as f32 / letterbox.input_height as f32;

    let left = (letterbox.pad_x as f32 * ratio_x).floor() as usize;
    let top = (letterbox.pad_y as f32 * ratio_y).floor() as usize;
    if left >= proto_w || top >= proto_h {
        return None;
    }
    let right = (((letterbox.pad_x + letterbox.scaled_width) as f32 * ratio_x).ceil() as usize)
        .clamp(left + 1, proto_w);
    let bottom = (((letterbox.pad_y + letterbox.scaled_height) as f32 * ratio_y).ceil() as usize)
        .clamp(top + 1, proto_h);

    let width = right - left;
    let height = bottom - top;

    // Box in mask pixels
    let sx = width as f32 / letterbox.original_width.max(1) as f32;
    let sy = height as f32 / letterbox.original_height.max(1) as f32;
    let bx1 = source_box[0] * sx;
    let by1 = source_box[1] * sy;
    let bx2 = source_box[2] * sx;
    let by2 = source_box[3] * sy;

    let mut data = vec![0u8; width * height];
    for y in 0..height {
        let fy = y as f32 + 0.5;
        if fy < by1 || fy > by2 {
            continue;
        }
        for x in 0..width {
            let fx = x as f32 + 0.5;
            if fx < bx1 || fx > bx2 {
                continue;
            }
            let logit: f32 = coefficients
                .iter()
                .enumerate()
                .map(|(k, c)| c * protos[[k, top + y, left + x]])
                .sum();
            if sigmoid(logit) > threshold {
                data[y * width + x] = 1;
            }
        }
    }

    Some(RawMask {
        width: width as u32,
        height: height as u32,
        data,
    })
}

fn sigmoid(x: f32) -> f32 {
    1.0 / (1.0 + (-x).exp())
}
