// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Operation surface used by the conversational orchestrator
//!
//! One `Assistant` owns the model registry, the camera and the tool registry.
//! Each user turn gets a fresh `TurnContext` from `begin_turn`; tool calls made
//! with that context are recorded there and nowhere else.

use anyhow::{anyhow, Result};
use serde_json::Value;
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};
use tracing::{info, warn};

use crate::camera::{CameraDevice, CameraManager, CameraState, NoCamera, ReplayCamera};
use crate::config::AssistantConfig;
use crate::search::{DuckDuckGoProvider, SearchProvider};
use crate::tools::{
    CameraCloseTool, CameraDetectTool, CameraInfoTool, CameraPhotoTool, CameraRecordTool,
    CameraStopRecordTool, CapabilityRegistry, FileOperationTool, FrameAnalysisTool, ImageAnalysisTool,
    InvocationRecord, ModelInfoTool, ModelListTool, ModelReloadTool, SessionContext,
    SystemCommandTool, Tool, ToolCallOutcome, ToolDescriptor, TurnContext, WebSearchTool,
};
use crate::vision::{
    BackendLoader, DetectOptions, DetectionResult, LocalModelRegistry, ModelInfo, ModelListing,
    OnnxBackendLoader, ReloadReport, VisionError,
};

pub struct Assistant {
    config: AssistantConfig,
    models: Arc<LocalModelRegistry>,
    camera: CameraManager,
    tools: CapabilityRegistry,
    sessions: Mutex<HashMap<String, Arc<SessionContext>>>,
}

impl std::fmt::Debug for Assistant {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Assistant")
            .field("config", &self.config)
            .field("tools", &self.tools.len())
            .finish_non_exhaustive()
    }
}

impl Assistant {
    /// Wire the registry, camera and tools, then load the available models
    pub fn new(
        config: AssistantConfig,
        loader: Arc<dyn BackendLoader>,
        camera_device: Box<dyn CameraDevice>,
        search: Arc<dyn SearchProvider>,
    ) -> Result<Self> {
        config.validate().map_err(|e| anyhow!(e))?;

        let models = Arc::new(LocalModelRegistry::new(config.registry_config(), loader)?);
        let report = models.initialize();
        if report.success {
            info!(
                "✅ Vision models ready: {} loaded ({})",
                report.loaded_count,
                report.loaded_models.join(", ")
            );
        } else {
            warn!(
                "⚠️ Vision models unavailable: {}",
                report.error.as_deref().unwrap_or("unknown error")
            );
        }

        let camera = CameraManager::new(camera_device, config.artifact_dir.clone());

        let mut tools = CapabilityRegistry::new();
        let all: Vec<Arc<dyn Tool>> = vec![
            Arc::new(ImageAnalysisTool::new(Arc::clone(&models))),
            Arc::new(FrameAnalysisTool::new(Arc::clone(&models))),
            Arc::new(ModelInfoTool::new(Arc::clone(&models))),
            Arc::new(ModelListTool::new(Arc::clone(&models))),
            Arc::new(ModelReloadTool::new(Arc::clone(&models))),
            Arc::new(CameraPhotoTool::new(camera.clone())),
            Arc::new(CameraRecordTool::new(camera.clone())),
            Arc::new(CameraStopRecordTool::new(camera.clone())),
            Arc::new(CameraInfoTool::new(camera.clone())),
            Arc::new(CameraCloseTool::new(camera.clone())),
            Arc::new(CameraDetectTool::new(camera.clone(), Arc::clone(&models))),
            Arc::new(FileOperationTool),
            Arc::new(SystemCommandTool::new(config.command_timeout())),
            Arc::new(WebSearchTool::new(search)),
        ];
        for tool in all {
            tools.register(tool)?;
        }
        info!("🔧 Registered {} tools", tools.len());

        Ok(Self {
            config,
            models,
            camera,
            tools,
            sessions: Mutex::new(HashMap::new()),
        })
    }

    /// Production wiring: ONNX Runtime models, DuckDuckGo search and the
    /// replay camera when `CAMERA_REPLAY_DIR` is set
    pub fn from_config(config: AssistantConfig) -> Result<Self> {
        let camera: Box<dyn CameraDevice> = match &config.camera_replay_dir {
            Some(dir) => {
                info!("📷 Using replay camera from {}", dir.display());
                Box::new(ReplayCamera::new(dir.clone()))
            }
            None => Box::new(NoCamera),
        };
        let search = Arc::new(DuckDuckGoProvider::new(config.search_timeout_ms)?);

        Self::new(config, Arc::new(OnnxBackendLoader), camera, search)
    }

    pub fn config(&self) -> &AssistantConfig {
        &self.config
    }

    pub fn models(&self) -> &Arc<LocalModelRegistry> {
        &self.models
    }

    pub fn camera(&self) -> &CameraManager {
        &self.camera
    }

    /// Get or create the session with this id
    pub fn session(&self, session_id: &str) -> Arc<SessionContext> {
        let mut sessions = self.sessions.lock().unwrap_or_else(PoisonError::into_inner);
        Arc::clone(sessions.entry(session_id.to_string()).or_insert_with(|| {
            Arc::new(SessionContext::new(
                session_id,
                self.config.confirmation_ttl(),
            ))
        }))
    }

    /// Start a turn with an empty invocation history
    pub fn begin_turn(&self, session_id: &str) -> TurnContext {
        let turn = TurnContext::new(self.session(session_id));
        turn.reset();
        turn
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools.list_tools()
    }

    pub async fn call_tool(&self, turn: &TurnContext, name: &str, input: &Value) -> ToolCallOutcome {
        self.tools.call_tool(turn, name, input).await
    }

    pub fn tool_call_history(&self, turn: &TurnContext) -> Vec<InvocationRecord> {
        turn.snapshot()
    }

    pub async fn detect_objects(
        &self,
        image_path: &Path,
        confidence: f32,
        model_id: Option<&str>,
        options: DetectOptions,
    ) -> Result<DetectionResult, VisionError> {
        let models = Arc::clone(&self.models);
        let path: PathBuf = image_path.to_path_buf();
        let model_id = model_id.map(str::to_string);

        tokio::task::spawn_blocking(move || {
            models.detect_objects(&path, confidence, model_id.as_deref(), &options)
        })
        .await
        .map_err(|e| VisionError::Inference(e.to_string()))?
    }

    pub fn model_info(&self) -> ModelInfo {
        self.models.model_info()
    }

    pub fn list_models(&self) -> Vec<ModelListing> {
        self.models.list_models()
    }

    pub async fn reload_models(&self) -> ReloadReport {
        let models = Arc::clone(&self.models);
        match tokio::task::spawn_blocking(move || models.reload()).await {
            Ok(report) => report,
            Err(e) => ReloadReport {
                success: false,
                loaded_count: 0,
                loaded_models: Vec::new(),
                error: Some(e.to_string()),
            },
        }
    }

    /// Release the camera if it is still open
    pub async fn shutdown(&self) {
        if self.camera.state().await != CameraState::Closed {
            if let Err(e) = self.camera.close().await {
                warn!("Camera did not close cleanly: {}", e);
            }
        }
    }
}
