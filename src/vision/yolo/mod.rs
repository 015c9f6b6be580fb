// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! YOLOv8 detection and segmentation on ONNX Runtime
//!
//! Runs on CPU only. Supports the Ultralytics ONNX exports: detection heads
//! with a single `[1, 84, N]` output and segmentation heads that add mask
//! prototypes.

pub mod labels;
pub mod model;
pub mod postprocess;
pub mod preprocessing;

pub use labels::{class_label, COCO_LABELS};
pub use model::{OnnxBackendLoader, OnnxYoloBackend};
pub use preprocessing::{preprocess, Letterbox};
