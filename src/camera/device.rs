// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Camera device seam
//!
//! Frame capture is delegated to a `CameraDevice`; the manager only drives
//! its lifecycle.

use image::RgbImage;
use serde::{Deserialize, Serialize};

use super::errors::CameraError;

/// Static properties of an open device
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraProperties {
    pub index: u32,
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    /// Driver name (e.g., "replay")
    pub backend: String,
}

/// A frame source
pub trait CameraDevice: Send {
    /// Device indices that can be opened
    fn available(&self) -> Vec<u32>;

    fn open(&mut self, index: u32) -> Result<CameraProperties, CameraError>;

    fn is_open(&self) -> bool;

    /// Grab the next frame. Fails with `NotOpen` when closed.
    fn read_frame(&mut self) -> Result<RgbImage, CameraError>;

    fn release(&mut self);

    /// Properties of the open device
    fn properties(&self) -> Option<CameraProperties>;
}

/// Placeholder used when no camera is configured; every open fails
#[derive(Debug, Default)]
pub struct NoCamera;

impl CameraDevice for NoCamera {
    fn available(&self) -> Vec<u32> {
        Vec::new()
    }

    fn open(&mut self, _index: u32) -> Result<CameraProperties, CameraError> {
        Err(CameraError::Device("no camera device configured".to_string()))
    }

    fn is_open(&self) -> bool {
        false
    }

    fn read_frame(&mut self) -> Result<RgbImage, CameraError> {
        Err(CameraError::NotOpen)
    }

    fn release(&mut self) {}

    fn properties(&self) -> Option<CameraProperties> {
        None
    }
}
