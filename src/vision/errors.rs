// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Error taxonomy for the local vision stack

use thiserror::Error;

/// Errors raised by the model catalog, registry and detection pipeline
#[derive(Debug, Error)]
pub enum VisionError {
    /// Writing the catalog failed; the in-memory catalog was rolled back
    #[error("Failed to persist model catalog {path}: {reason}")]
    ConfigPersist { path: String, reason: String },

    /// The catalog file exists but could not be parsed
    #[error("Failed to parse model catalog {path}: {reason}")]
    CatalogParse { path: String, reason: String },

    /// No descriptor with this id exists in the catalog
    #[error("Model not found in catalog: {0}")]
    ModelNotFound(String),

    /// The requested (or fallback) backend is not loaded
    #[error(
        "Model unavailable: {}",
        .id.as_deref().unwrap_or("no detection backend is loaded")
    )]
    ModelUnavailable { id: Option<String> },

    /// Source image does not exist
    #[error("Image not found: {0}")]
    ImageNotFound(String),

    /// The backend failed while running inference
    #[error("Inference failed: {0}")]
    Inference(String),

    /// Filesystem error while scanning model artifacts
    #[error("Model scan failed: {0}")]
    Scan(String),

    /// Writing a detection artifact failed
    #[error("Failed to write artifact {path}: {reason}")]
    Artifact { path: String, reason: String },
}

impl VisionError {
    /// Shorthand for a `ModelUnavailable` naming a specific model
    pub fn unavailable(id: impl Into<String>) -> Self {
        Self::ModelUnavailable {
            id: Some(id.into()),
        }
    }
}
