// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Annotated image rendering
//!
//! Masks are blended first, then every detection gets a 2px box and a filled
//! label. Colors come from a fixed palette indexed by the detection's
//! position in the list.

use image::imageops::FilterType;
use image::{DynamicImage, GrayImage, Rgb, RgbImage};
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::artifacts::timestamped_path;
use super::detection::Detection;
use super::errors::VisionError;
use super::font::{draw_text, text_size};

/// Annotation colors
pub const PALETTE: [Rgb<u8>; 10] = [
    Rgb([0, 0, 255]),
    Rgb([0, 255, 0]),
    Rgb([255, 0, 0]),
    Rgb([0, 255, 255]),
    Rgb([255, 0, 255]),
    Rgb([255, 255, 0]),
    Rgb([0, 0, 128]),
    Rgb([0, 128, 0]),
    Rgb([128, 0, 0]),
    Rgb([0, 128, 128]),
];

/// Mask overlay opacity
pub const MASK_ALPHA: f32 = 0.3;
const BOX_THICKNESS: i64 = 2;
const LABEL_SCALE: u32 = 2;
const LABEL_PADDING: i64 = 10;
const TEXT_COLOR: Rgb<u8> = Rgb([255, 255, 255]);

pub fn palette_color(index: usize) -> Rgb<u8> {
    PALETTE[index % PALETTE.len()]
}

/// `class` or `class NN.N%`
pub fn label_text(detection: &Detection, show_confidence: bool) -> String {
    if show_confidence {
        format!("{} {:.1}%", detection.class_name, detection.confidence)
    } else {
        detection.class_name.clone()
    }
}

/// Draw detections onto a copy of `image`
pub fn render(image: &DynamicImage, detections: &[Detection], show_confidence: bool) -> RgbImage {
    let mut canvas = image.to_rgb8();

    for (index, detection) in detections.iter().enumerate() {
        if let Some(mask) = &detection.mask {
            blend_mask(&mut canvas, mask.width, mask.height, &mask.data, palette_color(index));
        }
    }

    for (index, detection) in detections.iter().enumerate() {
        let color = palette_color(index);
        let [x1, y1, x2, y2] = detection.bbox.map(i64::from);
        draw_box(&mut canvas, x1, y1, x2, y2, color);
        draw_label(&mut canvas, x1, y1, &label_text(detection, show_confidence), color);
    }

    canvas
}

/// Render and write a PNG into `dir`, returning its path
pub fn render_and_save(
    image: &DynamicImage,
    detections: &[Detection],
    show_confidence: bool,
    dir: &Path,
) -> Result<PathBuf, VisionError> {
    let canvas = render(image, detections, show_confidence);

    let artifact_err = |path: &Path, reason: String| VisionError::Artifact {
        path: path.display().to_string(),
        reason,
    };

    fs::create_dir_all(dir).map_err(|e| artifact_err(dir, e.to_string()))?;
    let path = timestamped_path(dir, "detection_result", "png");
    canvas
        .save(&path)
        .map_err(|e| artifact_err(&path, e.to_string()))?;

    info!("🖼️ Annotated image saved: {}", path.display());
    Ok(path)
}

fn blend_mask(canvas: &mut RgbImage, width: u32, height: u32, data: &[u8], color: Rgb<u8>) {
    let Some(mask) = GrayImage::from_raw(width, height, data.to_vec()) else {
        return;
    };
    let mask = if (width, height) == canvas.dimensions() {
        mask
    } else {
        image::imageops::resize(&mask, canvas.width(), canvas.height(), FilterType::Nearest)
    };

    for (pixel, m) in canvas.pixels_mut().zip(mask.pixels()) {
        if m.0[0] == 0 {
            continue;
        }
        for c in 0..3 {
            let blended =
                pixel.0[c] as f32 * (1.0 - MASK_ALPHA) + color.0[c] as f32 * MASK_ALPHA;
            pixel.0[c] = blended.round().clamp(0.0, 255.0) as u8;
        }
    }
}

fn draw_box(canvas: &mut RgbImage, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb<u8>) {
    for t in 0..BOX_THICKNESS {
        fill_rect(canvas, x1, y1 + t, x2, y1 + t, color);
        fill_rect(canvas, x1, y2 - t, x2, y2 - t, color);
        fill_rect(canvas, x1 + t, y1, x1 + t, y2, color);
        fill_rect(canvas, x2 - t, y1, x2 - t, y2, color);
    }
}

/// Filled background sized to the text, above the box when it fits and
/// inside the box otherwise
fn draw_label(canvas: &mut RgbImage, x1: i64, y1: i64, text: &str, color: Rgb<u8>) {
    let (tw, th) = text_size(text, LABEL_SCALE);
    let (tw, th) = (tw as i64, th as i64);

    let mut top = y1 - th - LABEL_PADDING;
    if top < 0 {
        top = y1;
    }
    let bottom = top + th + LABEL_PADDING;

    fill_rect(canvas, x1, top, x1 + tw, bottom, color);
    draw_text(canvas, x1, top + LABEL_PADDING / 2, text, LABEL_SCALE, TEXT_COLOR);
}

/// Inclusive rectangle fill, clipped to the canvas
fn fill_rect(canvas: &mut RgbImage, x1: i64, y1: i64, x2: i64, y2: i64, color: Rgb<u8>) {
    let max_x = canvas.width() as i64 - 1;
    let max_y = canvas.height() as i64 - 1;
    let (x1, x2) = (x1.min(x2).max(0), x1.max(x2).min(max_x));
    let (y1, y2) = (y1.min(y2).max(0), y1.max(y2).min(max_y));
    if x1 > x2 || y1 > y2 {
        return;
    }
    for y in y1..=y2 {
        for x in x1..=x2 {
            canvas.put_pixel(x as u32, y as u32, color);
        }
    }
}
