// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Camera capture for the camera tools
//!
//! The manager owns one `CameraDevice`. Real capture hardware is reached
//! through that trait; the built-in `ReplayCamera` serves still images from a
//! directory.

pub mod device;
pub mod errors;
pub mod manager;
pub mod replay;

pub use device::{CameraDevice, CameraProperties, NoCamera};
pub use errors::CameraError;
pub use manager::{
    CameraInfo, CameraManager, CameraState, PhotoCapture, RecordingStarted, RecordingSummary,
};
pub use replay::ReplayCamera;
