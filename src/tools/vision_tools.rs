// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tools backed by the local vision model registry

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing::warn;

use super::context::TurnContext;
use super::errors::ToolError;
use super::types::{parse_input, FieldAlias, Tool};
use crate::vision::report::analysis_report;
use crate::vision::image_utils::list_images;
use crate::vision::{DetectOptions, DetectionResult, LocalModelRegistry, ModelStatus};

pub(super) fn default_confidence() -> f32 {
    0.5
}

fn default_true() -> bool {
    true
}

/// Run registry work off the async runtime
pub(super) async fn blocking<T, F>(tool: &str, f: F) -> Result<T, ToolError>
where
    T: Send + 'static,
    F: FnOnce() -> T + Send + 'static,
{
    tokio::task::spawn_blocking(f)
        .await
        .map_err(|e| ToolError::execution(tool, e.to_string()))
}

fn format_size(bytes: u64) -> String {
    if bytes > 0 {
        format!("{:.1}MB", bytes as f64 / (1024.0 * 1024.0))
    } else {
        "unknown".to_string()
    }
}

#[derive(Debug, Deserialize)]
struct ImageAnalysisInput {
    image_path: PathBuf,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f32,
    #[serde(default)]
    draw_boxes: bool,
    #[serde(default = "default_true")]
    show_confidence: bool,
    #[serde(default)]
    save_annotated: bool,
    #[serde(default = "default_confidence")]
    mask_threshold: f32,
}

const IMAGE_ALIASES: &[FieldAlias] = &[FieldAlias {
    field: "image_path",
    keys: &["image_path", "path", "file_path"],
}];

/// Object detection on an image file
pub struct ImageAnalysisTool {
    registry: Arc<LocalModelRegistry>,
}

impl ImageAnalysisTool {
    pub fn new(registry: Arc<LocalModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ImageAnalysisTool {
    fn name(&self) -> &str {
        "image_analysis"
    }

    fn description(&self) -> &str {
        "Detect objects in an image with a local model. Input: image_path, optional model_id, confidence, draw_boxes, show_confidence, save_annotated, mask_threshold"
    }

    async fn execute(&self, _ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let input: ImageAnalysisInput = parse_input(self.name(), input, IMAGE_ALIASES)?;
        let options = DetectOptions {
            draw_boxes: input.draw_boxes,
            show_confidence: input.show_confidence,
            save_annotated: input.save_annotated,
            mask_threshold: input.mask_threshold,
        };

        let registry = Arc::clone(&self.registry);
        let path = input.image_path.clone();
        let confidence = input.confidence;
        let model_id = input.model_id.clone();
        let result = blocking(self.name(), move || {
            registry.detect_objects(&path, confidence, model_id.as_deref(), &options)
        })
        .await??;

        Ok(format!(
            "{}\n🔧 Parameters: confidence={}, draw_boxes={}, show_confidence={}",
            analysis_report(&input.image_path, &result),
            input.confidence,
            input.draw_boxes,
            input.show_confidence
        ))
    }
}

fn default_frame_interval() -> usize {
    30
}

fn default_fps() -> u32 {
    30
}

#[derive(Debug, Deserialize)]
struct FrameAnalysisInput {
    frames_dir: PathBuf,
    #[serde(default = "default_frame_interval")]
    frame_interval: usize,
    #[serde(default)]
    model_id: Option<String>,
    #[serde(default = "default_confidence")]
    confidence: f32,
    /// Capture rate, only used for the timestamps in the report
    #[serde(default = "default_fps")]
    fps: u32,
}

const FRAMES_ALIASES: &[FieldAlias] = &[FieldAlias {
    field: "frames_dir",
    keys: &["frames_dir", "video_path", "path"],
}];

/// Detection result for one sampled frame
#[derive(Debug, Clone)]
struct SampledFrame {
    /// Position of the frame in the directory listing
    index: usize,
    result: DetectionResult,
}

fn frame_report(dir: &Path, interval: usize, fps: u32, samples: &[SampledFrame]) -> String {
    let mut out = String::from("🎬 Frame analysis complete\n\n");
    let _ = writeln!(out, "📁 Frames: {}", dir.display());
    let _ = writeln!(out, "📊 Frames analyzed: {}", samples.len());
    let _ = writeln!(out, "⏱️ Frame interval: {} frames\n", interval);

    if samples.is_empty() {
        out.push_str("❌ No frames could be analyzed\n");
        return out;
    }

    let total: usize = samples.iter().map(|s| s.result.total_objects).sum();
    let _ = writeln!(out, "🎯 Total detections: {}\n", total);
    out.push_str("📋 Details:\n");
    for sample in samples {
        let _ = writeln!(
            out,
            "  • Frame {} (~{:.1}s): {} objects",
            sample.index,
            sample.index as f64 / fps.max(1) as f64,
            sample.result.total_objects
        );
        for det in &sample.result.detections {
            let _ = writeln!(out, "    - {} ({}%)", det.class_name, det.confidence);
        }
        if let Some(path) = &sample.result.annotated_image_path {
            let _ = writeln!(out, "    🖼️ {}", path.display());
        }
    }

    out
}

/// Annotated detection on every Nth frame of a directory of frames, such as
/// the output of `camera_record`
pub struct FrameAnalysisTool {
    registry: Arc<LocalModelRegistry>,
}

impl FrameAnalysisTool {
    pub fn new(registry: Arc<LocalModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for FrameAnalysisTool {
    fn name(&self) -> &str {
        "video_analysis"
    }

    fn description(&self) -> &str {
        "Detect objects in every Nth frame of a directory of frames. Input: frames_dir, optional frame_interval (default 30), model_id, confidence, fps"
    }

    async fn execute(&self, _ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let input: FrameAnalysisInput = parse_input(self.name(), input, FRAMES_ALIASES)?;
        if input.frame_interval == 0 {
            return Err(ToolError::invalid_input(
                self.name(),
                "frame_interval must be at least 1",
            ));
        }
        if !input.frames_dir.is_dir() {
            return Err(ToolError::execution(
                self.name(),
                format!("frames directory not found: {}", input.frames_dir.display()),
            ));
        }

        let frames = list_images(&input.frames_dir)
            .map_err(|e| ToolError::execution(self.name(), e.to_string()))?;
        if frames.is_empty() {
            return Err(ToolError::execution(
                self.name(),
                format!("no image frames in {}", input.frames_dir.display()),
            ));
        }

        // Fail once up front instead of once per frame
        self.registry.resolve(input.model_id.as_deref())?;

        let registry = Arc::clone(&self.registry);
        let interval = input.frame_interval;
        let confidence = input.confidence;
        let model_id = input.model_id.clone();
        let samples = blocking(self.name(), move || {
            frames
                .iter()
                .enumerate()
                .step_by(interval)
                .filter_map(|(index, frame)| {
                    match registry.detect_objects(
                        frame,
                        confidence,
                        model_id.as_deref(),
                        &DetectOptions::annotated(),
                    ) {
                        Ok(result) => Some(SampledFrame { index, result }),
                        Err(e) => {
                            warn!("Skipping frame {}: {}", frame.display(), e);
                            None
                        }
                    }
                })
                .collect::<Vec<_>>()
        })
        .await?;

        Ok(frame_report(&input.frames_dir, interval, input.fps, &samples))
    }
}

/// Loaded models and catalog totals
pub struct ModelInfoTool {
    registry: Arc<LocalModelRegistry>,
}

impl ModelInfoTool {
    pub fn new(registry: Arc<LocalModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ModelInfoTool {
    fn name(&self) -> &str {
        "model_info"
    }

    fn description(&self) -> &str {
        "Show loaded local vision models, the compute device and catalog totals"
    }

    async fn execute(&self, _ctx: &TurnContext, _input: &Value) -> Result<String, ToolError> {
        let info = self.registry.model_info();

        let mut out = String::from("🤖 Local vision models:\n\n");
        let _ = writeln!(out, "💻 Device: {}", info.device);
        let _ = writeln!(out, "🎯 Default model: {}\n", info.default_model);

        if info.loaded_models.is_empty() {
            out.push_str("📋 No models loaded\n");
        } else {
            let _ = writeln!(out, "📋 Loaded models ({}):", info.total_loaded);
            for model in &info.loaded_models {
                let _ = writeln!(
                    out,
                    "  • {} ({}) [{}] {}",
                    model.name,
                    model.model_type,
                    model.id,
                    format_size(model.file_size)
                );
            }
        }

        let _ = writeln!(out, "\n📁 Catalog:");
        let _ = writeln!(out, "  Total: {}", info.catalog.total_models);
        let _ = writeln!(out, "  Available: {}", info.catalog.available_count);
        let _ = write!(out, "  Missing: {}", info.catalog.missing_count);

        Ok(out)
    }
}

/// Every catalog entry with its availability
pub struct ModelListTool {
    registry: Arc<LocalModelRegistry>,
}

impl ModelListTool {
    pub fn new(registry: Arc<LocalModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ModelListTool {
    fn name(&self) -> &str {
        "model_list"
    }

    fn description(&self) -> &str {
        "List configured local vision models and whether their files are present"
    }

    async fn execute(&self, _ctx: &TurnContext, _input: &Value) -> Result<String, ToolError> {
        let models = self.registry.list_models();

        let mut out = format!("📋 Local models ({}):\n\n", models.len());
        for model in &models {
            let icon = match model.status {
                ModelStatus::Available => "✅",
                ModelStatus::Missing => "❌",
            };
            let _ = writeln!(out, "{} {} ({})", icon, model.name, model.id);
            let _ = writeln!(out, "   Type: {} | Task: {}", model.model_type, model.task);
            let _ = writeln!(out, "   Description: {}", model.description);
            let _ = writeln!(
                out,
                "   Status: {}{} | Size: {}",
                model.status,
                if model.loaded { ", loaded" } else { "" },
                format_size(model.file_size)
            );
            let _ = writeln!(out, "   Path: {}\n", model.file_path.display());
        }

        Ok(out)
    }
}

/// Rescan the models directory and rebuild the backend cache
pub struct ModelReloadTool {
    registry: Arc<LocalModelRegistry>,
}

impl ModelReloadTool {
    pub fn new(registry: Arc<LocalModelRegistry>) -> Self {
        Self { registry }
    }
}

#[async_trait]
impl Tool for ModelReloadTool {
    fn name(&self) -> &str {
        "model_reload"
    }

    fn description(&self) -> &str {
        "Rescan the models directory and reload every available local model"
    }

    async fn execute(&self, _ctx: &TurnContext, _input: &Value) -> Result<String, ToolError> {
        let registry = Arc::clone(&self.registry);
        let report = blocking(self.name(), move || registry.reload()).await?;

        if !report.success {
            return Err(ToolError::execution(
                self.name(),
                report.error.unwrap_or_else(|| "reload failed".to_string()),
            ));
        }

        Ok(format!(
            "✅ Models reloaded\n\n🔄 Loaded {} models: {}",
            report.loaded_count,
            report.loaded_models.join(", ")
        ))
    }
}
