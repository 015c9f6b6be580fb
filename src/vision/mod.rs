// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local vision models
//!
//! This module provides:
//! - A persisted catalog of detection models and an availability scanner
//! - Tier-ordered backend selection over the loaded-backend cache
//! - YOLOv8 detection/segmentation via ONNX Runtime
//! - Annotated image rendering and detection reports
//!
//! Inference runs on CPU only.

pub mod annotate;
pub mod artifacts;
pub mod backend;
pub mod catalog;
pub mod detection;
pub mod errors;
pub mod font;
pub mod image_utils;
pub mod registry;
pub mod report;
pub mod scanner;
pub mod selector;
pub mod yolo;

pub use backend::{BackendLoader, DetectionBackend, InferenceParams, LoadedBackend, RawDetection, RawMask};
pub use catalog::{DescriptorStore, ModelCatalog, ModelDescriptor, ModelDescriptorPatch};
pub use detection::{DetectOptions, Detection, DetectionPipeline, DetectionResult};
pub use errors::VisionError;
pub use image_utils::{load_image, ImageError, ImageInfo};
pub use registry::{LocalModelRegistry, ModelInfo, ModelListing, RegistryConfig, ReloadReport};
pub use scanner::{AvailabilityScanner, ModelStatus, ModelsSummary};
pub use selector::{BackendSelector, TierPolicy, FALLBACK_BACKEND_ID};
pub use yolo::OnnxBackendLoader;
