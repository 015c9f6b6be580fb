// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! ONNX Runtime YOLOv8 backend

use anyhow::{anyhow, Context, Result};
use image::DynamicImage;
use ndarray::{Ix2, Ix3};
use ort::execution_providers::CPUExecutionProvider;
use ort::session::builder::GraphOptimizationLevel;
use ort::session::Session;
use ort::value::Value;
use std::path::Path;
use std::sync::{Arc, Mutex};
use tracing::{debug, info};

use super::labels::{class_label, COCO_LABELS};
use super::postprocess::{build_mask, decode_predictions, non_max_suppression, to_source_box};
use super::preprocessing::preprocess;
use crate::vision::backend::{
    BackendLoader, DetectionBackend, InferenceParams, RawDetection,
};
use crate::vision::catalog::ModelDescriptor;

/// YOLOv8 detector (optionally with a segmentation head)
///
/// Runs on CPU. The session is shared behind a mutex since `Session::run`
/// needs exclusive access.
#[derive(Clone)]
pub struct OnnxYoloBackend {
    /// ONNX Runtime session (thread-safe)
    session: Arc<Mutex<Session>>,
    /// Model input name
    input_name: String,
    /// Network input size as [width, height]
    input_size: [u32; 2],
    iou_threshold: f32,
    /// Whether the model emits mask prototypes
    has_masks: bool,
}

impl std::fmt::Debug for OnnxYoloBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("OnnxYoloBackend")
            .field("input_name", &self.input_name)
            .field("input_size", &self.input_size)
            .field("iou_threshold", &self.iou_threshold)
            .field("has_masks", &self.has_masks)
            .finish_non_exhaustive()
    }
}

impl OnnxYoloBackend {
    /// Load a YOLOv8 ONNX export
    ///
    /// # Errors
    /// Returns error if:
    /// - Model file not found
    /// - ONNX Runtime initialization fails
    pub fn new<P: AsRef<Path>>(model_path: P, descriptor: &ModelDescriptor) -> Result<Self> {
        let model_path = model_path.as_ref();

        if !model_path.exists() {
            anyhow::bail!("YOLO model not found: {}", model_path.display());
        }

        info!("Loading YOLO model from {}", model_path.display());

        let session = Session::builder()
            .context("Failed to create session builder")?
            .with_execution_providers([CPUExecutionProvider::default().build()])
            .context("Failed to set CPU execution provider")?
            .with_optimization_level(GraphOptimizationLevel::Level3)
            .context("Failed to set optimization level")?
            .with_intra_threads(4)
            .context("Failed to set intra threads")?
            .commit_from_file(model_path)
            .context(format!(
                "Failed to load YOLO model from {}",
                model_path.display()
            ))?;

        let input_name = session
            .inputs
            .first()
            .map(|input| input.name.clone())
            .unwrap_or_else(|| "images".to_string());

        let has_masks = session.outputs.len() > 1;

        debug!(
            "YOLO model loaded - input: {}, outputs: {}",
            input_name,
            session.outputs.len()
        );

        info!(
            "✅ YOLO model loaded successfully ({}, {})",
            descriptor.name,
            if has_masks { "segmentation" } else { "detection" }
        );

        Ok(Self {
            session: Arc::new(Mutex::new(session)),
            input_name,
            input_size: descriptor.input_size,
            iou_threshold: descriptor.iou_threshold,
            has_masks,
        })
    }
}

impl DetectionBackend for OnnxYoloBackend {
    fn detect(&self, image: &DynamicImage, params: &InferenceParams) -> Result<Vec<RawDetection>> {
        let (tensor, letterbox) = preprocess(image, self.input_size);

        let mut session = self
            .session
            .lock()
            .map_err(|_| anyhow!("YOLO session lock poisoned"))?;

        let input_value = Value::from_array(tensor).context("Failed to create input tensor")?;

        let outputs = session
            .run(ort::inputs![&self.input_name => input_value])
            .context("YOLO inference failed")?;

        let predictions = outputs[0]
            .try_extract_array::<f32>()
            .context("Failed to extract prediction tensor")?;
        let shape = predictions.shape().to_vec();
        if shape.len() != 3 || shape[0] != 1 {
            anyhow::bail!("Unexpected YOLO output shape: {:?}", shape);
        }
        let predictions = predictions
            .index_axis_move(ndarray::Axis(0), 0)
            .into_dimensionality::<Ix2>()
            .context("Failed to reshape prediction tensor")?;

        let protos = if self.has_masks {
            let protos = outputs[1]
                .try_extract_array::<f32>()
                .context("Failed to extract mask prototypes")?;
            Some(
                protos
                    .index_axis_move(ndarray::Axis(0), 0)
                    .into_dimensionality::<Ix3>()
                    .context("Failed to reshape mask prototypes")?,
            )
        } else {
            None
        };

        let num_protos = protos.as_ref().map(|p| p.dim().0).unwrap_or(0);
        let num_classes = shape[1]
            .checked_sub(4 + num_protos)
            .filter(|&n| n > 0)
            .ok_or_else(|| anyhow!("YOLO output has no class channels: {:?}", shape))?;
        if num_classes != COCO_LABELS.len() {
            debug!("YOLO model reports {} classes", num_classes);
        }

        let candidates = decode_predictions(predictions, num_classes, params.confidence);
        let kept = non_max_suppression(candidates, self.iou_threshold);

        let detections = kept
            .into_iter()
            .map(|candidate| {
                let bbox = to_source_box(&candidate.bbox, &letterbox);
                let mask = protos.as_ref().and_then(|protos| {
                    build_mask(
                        &candidate.coefficients,
                        protos.view(),
                        &letterbox,
                        &bbox,
                        params.mask_threshold,
                    )
                });
                RawDetection {
                    class_name: class_label(candidate.class_id),
                    confidence: candidate.confidence,
                    bbox,
                    mask,
                }
            })
            .collect::<Vec<_>>();

        debug!("YOLO detected {} objects", detections.len());

        Ok(detections)
    }
}

/// Builds `OnnxYoloBackend`s for every `yolo*` descriptor type
#[derive(Debug, Clone, Default)]
pub struct OnnxBackendLoader;

impl BackendLoader for OnnxBackendLoader {
    fn supports(&self, model_type: &str) -> bool {
        model_type.to_ascii_lowercase().starts_with("yolo")
    }

    fn load(
        &self,
        _id: &str,
        descriptor: &ModelDescriptor,
        artifact: &Path,
    ) -> Result<Arc<dyn DetectionBackend>> {
        let backend = OnnxYoloBackend::new(artifact, descriptor)?;
        Ok(Arc::new(backend))
    }
}
