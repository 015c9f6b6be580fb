// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Detection pipeline
//!
//! Runs a resolved backend on a source image, normalizes the raw output and
//! optionally renders an annotated copy. Confidence is reported as a
//! percentage rounded to two decimals and box corners are floored to whole
//! pixels; downstream consumers depend on this exact format.

use image::DynamicImage;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::annotate;
use super::backend::{InferenceParams, LoadedBackend, RawDetection, RawMask};
use super::errors::VisionError;
use super::image_utils::load_image;

/// Segmentation mask attached to a detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DetectionMask {
    /// Number of set mask pixels
    pub area: u64,
    pub width: u32,
    pub height: u32,
    /// One byte per mask pixel (0 or 1), row-major
    pub data: Vec<u8>,
}

impl From<RawMask> for DetectionMask {
    fn from(mask: RawMask) -> Self {
        Self {
            area: mask.area(),
            width: mask.width,
            height: mask.height,
            data: mask.data,
        }
    }
}

/// One normalized detection
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    #[serde(rename = "class")]
    pub class_name: String,
    /// Percentage, two decimals
    pub confidence: f64,
    /// [x1, y1, x2, y2] in whole pixels
    pub bbox: [i32; 4],
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub mask: Option<DetectionMask>,
}

impl Detection {
    pub fn from_raw(raw: RawDetection) -> Self {
        Self {
            class_name: raw.class_name,
            confidence: percent_confidence(raw.confidence),
            bbox: floor_bbox(raw.bbox),
            mask: raw.mask.map(DetectionMask::from),
        }
    }

    pub fn mask_area(&self) -> Option<u64> {
        self.mask.as_ref().map(|m| m.area)
    }
}

/// 0.8675 -> 86.75
pub fn percent_confidence(raw: f32) -> f64 {
    (raw as f64 * 10_000.0).round() / 100.0
}

/// (10.2, 5.9, 100.4, 80.1) -> [10, 5, 100, 80]
pub fn floor_bbox(bbox: [f32; 4]) -> [i32; 4] {
    bbox.map(|v| v.floor() as i32)
}

/// Rendering and inference options for one detection call
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct DetectOptions {
    pub draw_boxes: bool,
    pub show_confidence: bool,
    pub save_annotated: bool,
    pub mask_threshold: f32,
}

impl Default for DetectOptions {
    fn default() -> Self {
        Self {
            draw_boxes: false,
            show_confidence: true,
            save_annotated: false,
            mask_threshold: 0.5,
        }
    }
}

impl DetectOptions {
    /// Boxes drawn and the annotated copy saved
    pub fn annotated() -> Self {
        Self {
            draw_boxes: true,
            save_annotated: true,
            ..Self::default()
        }
    }

    fn wants_annotation(&self) -> bool {
        self.draw_boxes || self.save_annotated
    }
}

/// Echo of the options a result was produced with
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionParameters {
    pub draw_boxes: bool,
    pub show_confidence: bool,
    pub mask_threshold: f32,
}

/// Outcome of a detection call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionResult {
    pub detections: Vec<Detection>,
    pub total_objects: usize,
    /// Display name of the backend's model
    pub model_used: String,
    /// Cache id of the backend
    pub model_id: String,
    pub confidence_threshold: f32,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub annotated_image_path: Option<PathBuf>,
    pub parameters: DetectionParameters,
}

/// Runs detection and writes annotated artifacts into one directory
#[derive(Debug, Clone)]
pub struct DetectionPipeline {
    artifact_dir: PathBuf,
}

impl DetectionPipeline {
    pub fn new(artifact_dir: impl Into<PathBuf>) -> Self {
        Self {
            artifact_dir: artifact_dir.into(),
        }
    }

    pub fn artifact_dir(&self) -> &Path {
        &self.artifact_dir
    }

    /// Detect objects in the image at `image_path`
    pub fn detect(
        &self,
        image_path: &Path,
        backend: &LoadedBackend,
        confidence: f32,
        options: &DetectOptions,
    ) -> Result<DetectionResult, VisionError> {
        if !image_path.is_file() {
            return Err(VisionError::ImageNotFound(image_path.display().to_string()));
        }

        let (image, _) = load_image(image_path).map_err(|e| {
            VisionError::Inference(format!("{}: {}", image_path.display(), e))
        })?;

        self.detect_image(&image, backend, confidence, options)
    }

    /// Detect objects in an already decoded image
    pub fn detect_image(
        &self,
        image: &DynamicImage,
        backend: &LoadedBackend,
        confidence: f32,
        options: &DetectOptions,
    ) -> Result<DetectionResult, VisionError> {
        let params = InferenceParams {
            confidence,
            mask_threshold: options.mask_threshold,
        };

        let raw = backend
            .backend
            .detect(image, &params)
            .map_err(|e| VisionError::Inference(format!("{:#}", e)))?;

        let detections: Vec<Detection> = raw.into_iter().map(Detection::from_raw).collect();

        info!(
            "🔍 {} detected {} objects (confidence >= {})",
            backend.id,
            detections.len(),
            confidence
        );

        let annotated_image_path = if options.wants_annotation() {
            match annotate::render_and_save(
                image,
                &detections,
                options.show_confidence,
                &self.artifact_dir,
            ) {
                Ok(path) => Some(path),
                Err(e) => {
                    warn!("Annotation failed, returning raw detections: {}", e);
                    None
                }
            }
        } else {
            None
        };

        Ok(DetectionResult {
            total_objects: detections.len(),
            detections,
            model_used: backend.name.clone(),
            model_id: backend.id.clone(),
            confidence_threshold: confidence,
            annotated_image_path,
            parameters: DetectionParameters {
                draw_boxes: options.draw_boxes,
                show_confidence: options.show_confidence,
                mask_threshold: options.mask_threshold,
            },
        })
    }
}
