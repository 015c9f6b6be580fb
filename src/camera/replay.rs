// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Camera that replays still images from a directory
//!
//! Frames are served in file-name order and wrap around at the end. Every
//! frame is resized to the dimensions of the first one.

use image::imageops::FilterType;
use image::RgbImage;
use std::path::{Path, PathBuf};
use tracing::info;

use super::device::{CameraDevice, CameraProperties};
use super::errors::CameraError;
use crate::vision::image_utils::list_images;

#[derive(Debug)]
pub struct ReplayCamera {
    dir: PathBuf,
    fps: u32,
    frames: Vec<PathBuf>,
    cursor: usize,
    properties: Option<CameraProperties>,
}

impl ReplayCamera {
    pub fn new(dir: impl Into<PathBuf>) -> Self {
        Self {
            dir: dir.into(),
            fps: 30,
            frames: Vec::new(),
            cursor: 0,
            properties: None,
        }
    }

    pub fn with_fps(mut self, fps: u32) -> Self {
        self.fps = fps.max(1);
        self
    }

    fn list_frames(dir: &Path) -> Result<Vec<PathBuf>, CameraError> {
        list_images(dir).map_err(|e| CameraError::Device(format!("{}: {}", dir.display(), e)))
    }

    fn decode(path: &Path) -> Result<RgbImage, CameraError> {
        image::open(path)
            .map(|img| img.to_rgb8())
            .map_err(|e| CameraError::Device(format!("{}: {}", path.display(), e)))
    }
}

impl CameraDevice for ReplayCamera {
    fn available(&self) -> Vec<u32> {
        if self.dir.is_dir() {
            vec![0]
        } else {
            Vec::new()
        }
    }

    fn open(&mut self, index: u32) -> Result<CameraProperties, CameraError> {
        if index != 0 {
            return Err(CameraError::Device(format!("no camera at index {}", index)));
        }

        let frames = Self::list_frames(&self.dir)?;
        let first = frames.first().ok_or_else(|| {
            CameraError::Device(format!("no images in {}", self.dir.display()))
        })?;
        let (width, height) = Self::decode(first)?.dimensions();

        let properties = CameraProperties {
            index,
            width,
            height,
            fps: self.fps,
            backend: "replay".to_string(),
        };

        info!(
            "📷 Replay camera opened: {} frames from {}",
            frames.len(),
            self.dir.display()
        );

        self.frames = frames;
        self.cursor = 0;
        self.properties = Some(properties.clone());
        Ok(properties)
    }

    fn is_open(&self) -> bool {
        self.properties.is_some()
    }

    fn read_frame(&mut self) -> Result<RgbImage, CameraError> {
        let properties = self.properties.as_ref().ok_or(CameraError::NotOpen)?;
        let path = &self.frames[self.cursor % self.frames.len()];
        let frame = Self::decode(path)?;
        self.cursor = (self.cursor + 1) % self.frames.len();

        if frame.dimensions() == (properties.width, properties.height) {
            Ok(frame)
        } else {
            Ok(image::imageops::resize(
                &frame,
                properties.width,
                properties.height,
                FilterType::Triangle,
            ))
        }
    }

    fn release(&mut self) {
        self.properties = None;
        self.frames.clear();
        self.cursor = 0;
    }

    fn properties(&self) -> Option<CameraProperties> {
        self.properties.clone()
    }
}
