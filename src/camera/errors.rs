// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Camera errors

use thiserror::Error;

#[derive(Debug, Error)]
pub enum CameraError {
    #[error("Camera is not open")]
    NotOpen,

    #[error("Camera is already recording")]
    AlreadyRecording,

    #[error("Camera is not recording")]
    NotRecording,

    /// The underlying device failed (open, read or release)
    #[error("Camera device error: {0}")]
    Device(String),

    /// Writing a photo or frame failed
    #[error("Failed to save {path}: {reason}")]
    Save { path: String, reason: String },
}
