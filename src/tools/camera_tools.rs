// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Camera tools: photo, recording, device info, close and capture-then-detect

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use super::context::TurnContext;
use super::errors::ToolError;
use super::types::{parse_input, FieldAlias, Tool};
use super::vision_tools::{blocking, default_confidence};
use crate::camera::{CameraManager, PhotoCapture};
use crate::vision::report::{detection_section, save_results};
use crate::vision::{DetectOptions, LocalModelRegistry};

const SAVE_PATH_ALIASES: &[FieldAlias] = &[FieldAlias {
    field: "save_path",
    keys: &["save_path", "path", "file_path"],
}];

const OUTPUT_PATH_ALIASES: &[FieldAlias] = &[FieldAlias {
    field: "output_path",
    keys: &["output_path", "path"],
}];

fn default_record_secs() -> u64 {
    10
}

fn default_true() -> bool {
    true
}

#[derive(Debug, Deserialize)]
struct PhotoInput {
    #[serde(default)]
    save_path: Option<PathBuf>,
    /// Close the camera this many seconds after the photo
    #[serde(default)]
    auto_close_secs: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct RecordInput {
    #[serde(default)]
    output_path: Option<PathBuf>,
    #[serde(default = "default_record_secs")]
    duration: u64,
}

#[derive(Debug, Deserialize)]
struct CloseInput {
    #[serde(default)]
    delay_seconds: u64,
}

#[derive(Debug, Deserialize)]
struct DetectInput {
    #[serde(default)]
    save_path: Option<PathBuf>,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default = "default_true")]
    save_results: bool,
}

fn photo_lines(photo: &PhotoCapture) -> String {
    format!(
        "📸 Photo: {}\n📏 Resolution: {}x{}\n⏰ Time: {}",
        photo.file_path.display(),
        photo.width,
        photo.height,
        photo.timestamp
    )
}

pub struct CameraPhotoTool {
    camera: CameraManager,
}

impl CameraPhotoTool {
    pub fn new(camera: CameraManager) -> Self {
        Self { camera }
    }
}

#[async_trait]
impl Tool for CameraPhotoTool {
    fn name(&self) -> &str {
        "camera_photo"
    }

    fn description(&self) -> &str {
        "Take a photo with the camera. Input: optional save_path, auto_close_secs"
    }

    async fn execute(&self, _ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let input: PhotoInput = parse_input(self.name(), input, SAVE_PATH_ALIASES)?;
        let photo = self.camera.take_photo(input.save_path).await?;

        if let Some(secs) = input.auto_close_secs.filter(|s| *s > 0) {
            self.camera.close_after(Duration::from_secs(secs));
        }

        Ok(format!("✅ Photo taken\n\n{}", photo_lines(&photo)))
    }
}

pub struct CameraRecordTool {
    camera: CameraManager,
}

impl CameraRecordTool {
    pub fn new(camera: CameraManager) -> Self {
        Self { camera }
    }
}

#[async_trait]
impl Tool for CameraRecordTool {
    fn name(&self) -> &str {
        "camera_record"
    }

    fn description(&self) -> &str {
        "Record frames from the camera in the background. Input: optional output_path, duration in seconds (default 10)"
    }

    async fn execute(&self, _ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let input: RecordInput = parse_input(self.name(), input, OUTPUT_PATH_ALIASES)?;
        if input.duration == 0 {
            return Err(ToolError::invalid_input(
                self.name(),
                "duration must be at least 1 second",
            ));
        }

        let started = self
            .camera
            .start_recording(input.output_path, Duration::from_secs(input.duration))
            .await?;

        Ok(format!(
            "✅ Recording started\n\n🎬 Output: {}\n⏱️ Duration: {}s\n📏 Resolution: {}\n🎯 Frame rate: {}fps",
            started.output_path.display(),
            started.duration_secs,
            started.resolution,
            started.fps
        ))
    }
}

pub struct CameraStopRecordTool {
    camera: CameraManager,
}

impl CameraStopRecordTool {
    pub fn new(camera: CameraManager) -> Self {
        Self { camera }
    }
}

#[async_trait]
impl Tool for CameraStopRecordTool {
    fn name(&self) -> &str {
        "camera_stop_record"
    }

    fn description(&self) -> &str {
        "Stop the active camera recording"
    }

    async fn execute(&self, _ctx: &TurnContext, _input: &Value) -> Result<String, ToolError> {
        let summary = self.camera.stop_recording().await?;
        Ok(format!(
            "✅ Recording stopped\n\n🎬 Frames: {} in {}\n⏱️ Elapsed: {}ms",
            summary.frames,
            summary.output_path.display(),
            summary.elapsed_ms
        ))
    }
}

pub struct CameraInfoTool {
    camera: CameraManager,
}

impl CameraInfoTool {
    pub fn new(camera: CameraManager) -> Self {
        Self { camera }
    }
}

#[async_trait]
impl Tool for CameraInfoTool {
    fn name(&self) -> &str {
        "camera_info"
    }

    fn description(&self) -> &str {
        "Show the open camera's resolution, frame rate and recording state"
    }

    async fn execute(&self, _ctx: &TurnContext, _input: &Value) -> Result<String, ToolError> {
        let info = self.camera.info().await?;
        let p = &info.properties;

        let mut out = String::from("📹 Camera info:\n\n");
        let _ = writeln!(out, "🔍 Available cameras: {:?}", info.available_cameras);
        let _ = writeln!(out, "📷 Current camera: {} ({})", p.index, p.backend);
        let _ = writeln!(out, "📏 Resolution: {}x{}", p.width, p.height);
        let _ = writeln!(out, "🎯 Frame rate: {}fps", p.fps);
        let _ = write!(
            out,
            "🎬 Recording: {}",
            if info.is_recording { "yes" } else { "no" }
        );

        Ok(out)
    }
}

pub struct CameraCloseTool {
    camera: CameraManager,
}

impl CameraCloseTool {
    pub fn new(camera: CameraManager) -> Self {
        Self { camera }
    }
}

#[async_trait]
impl Tool for CameraCloseTool {
    fn name(&self) -> &str {
        "camera_close"
    }

    fn description(&self) -> &str {
        "Close the camera now or after delay_seconds"
    }

    async fn execute(&self, _ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let input: CloseInput = parse_input(self.name(), input, &[])?;

        if input.delay_seconds > 0 {
            self.camera
                .close_after(Duration::from_secs(input.delay_seconds));
            return Ok(format!(
                "✅ Camera will close in {} seconds",
                input.delay_seconds
            ));
        }

        self.camera.close().await?;
        Ok("✅ Camera closed".to_string())
    }
}

/// Take a photo, run annotated detection on it and optionally persist the
/// result record
pub struct CameraDetectTool {
    camera: CameraManager,
    registry: Arc<LocalModelRegistry>,
}

impl CameraDetectTool {
    pub fn new(camera: CameraManager, registry: Arc<LocalModelRegistry>) -> Self {
        Self { camera, registry }
    }
}

#[async_trait]
impl Tool for CameraDetectTool {
    fn name(&self) -> &str {
        "camera_detect"
    }

    fn description(&self) -> &str {
        "Take a photo and detect objects in it. Input: optional save_path, model_id, confidence, save_results (default true)"
    }

    async fn execute(&self, _ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let input: DetectInput = parse_input(self.name(), input, SAVE_PATH_ALIASES)?;
        let photo = self.camera.take_photo(input.save_path).await?;

        let registry = Arc::clone(&self.registry);
        let image_path = photo.file_path.clone();
        let confidence = input.confidence;
        let model_id = input.model_id.clone();
        let result = blocking(self.name(), move || {
            registry.detect_objects(
                &image_path,
                confidence,
                model_id.as_deref(),
                &DetectOptions::annotated(),
            )
        })
        .await??;

        let mut report = format!(
            "📸 Capture and detection complete\n\n{}\n\n{}",
            photo_lines(&photo),
            detection_section(&result)
        );

        if input.save_results {
            let saved = save_results(
                self.registry.pipeline().artifact_dir(),
                &photo.file_path,
                &result,
                &report,
            )?;
            let _ = write!(report, "\n💾 Results saved to: {}", saved.display());
        }

        Ok(report)
    }
}
