// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Inference backend seam
//!
//! A backend is a loaded, ready-to-run detector for one catalog entry. The
//! registry builds backends through a `BackendLoader`, which lets tests and
//! alternative runtimes plug in without touching the selection logic.

use image::DynamicImage;
use std::path::Path;
use std::sync::Arc;

use super::catalog::ModelDescriptor;

/// Binary segmentation mask produced alongside a detection
///
/// The mask covers the whole source image at the backend's mask resolution;
/// `data` holds one byte per pixel (0 or 1), row-major.
#[derive(Debug, Clone, PartialEq)]
pub struct RawMask {
    pub width: u32,
    pub height: u32,
    pub data: Vec<u8>,
}

impl RawMask {
    /// Number of set pixels
    pub fn area(&self) -> u64 {
        self.data.iter().filter(|&&v| v > 0).count() as u64
    }
}

/// Un-normalized detection straight from a backend
#[derive(Debug, Clone, PartialEq)]
pub struct RawDetection {
    pub class_name: String,
    /// Score in 0.0-1.0
    pub confidence: f32,
    /// [x1, y1, x2, y2] in source image pixels
    pub bbox: [f32; 4],
    pub mask: Option<RawMask>,
}

/// Per-call inference parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct InferenceParams {
    pub confidence: f32,
    pub mask_threshold: f32,
}

impl Default for InferenceParams {
    fn default() -> Self {
        Self {
            confidence: 0.5,
            mask_threshold: 0.5,
        }
    }
}

/// A loaded detector
pub trait DetectionBackend: Send + Sync {
    /// Run detection on a decoded image
    fn detect(
        &self,
        image: &DynamicImage,
        params: &InferenceParams,
    ) -> anyhow::Result<Vec<RawDetection>>;
}

/// Builds backends from catalog entries
pub trait BackendLoader: Send + Sync {
    /// Whether this loader understands the descriptor's `type` tag
    fn supports(&self, model_type: &str) -> bool;

    fn load(
        &self,
        id: &str,
        descriptor: &ModelDescriptor,
        artifact: &Path,
    ) -> anyhow::Result<Arc<dyn DetectionBackend>>;
}

/// Cached backend handle together with the metadata reported for it
#[derive(Clone)]
pub struct LoadedBackend {
    pub id: String,
    pub name: String,
    pub model_type: String,
    pub file_size_bytes: u64,
    pub backend: Arc<dyn DetectionBackend>,
}

impl std::fmt::Debug for LoadedBackend {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LoadedBackend")
            .field("id", &self.id)
            .field("name", &self.name)
            .field("model_type", &self.model_type)
            .field("file_size_bytes", &self.file_size_bytes)
            .finish_non_exhaustive()
    }
}
