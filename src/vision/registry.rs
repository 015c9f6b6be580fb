// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Local vision model registry
//!
//! Ties the descriptor store, the availability scanner and the loaded-backend
//! cache together. Loading happens only in `initialize`/`reload` (and after a
//! catalog mutation); resolution is a pure lookup.

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};
use tracing::{debug, info, warn};

use super::backend::{BackendLoader, LoadedBackend};
use super::catalog::{DescriptorStore, ModelDescriptor, ModelDescriptorPatch};
use super::detection::{DetectOptions, DetectionPipeline, DetectionResult};
use super::errors::VisionError;
use super::scanner::{AvailabilityMap, AvailabilityScanner, ModelStatus, ModelsSummary};
use super::selector::{BackendSelector, TierPolicy, FALLBACK_BACKEND_ID};

/// Paths and policy for a registry
#[derive(Debug, Clone)]
pub struct RegistryConfig {
    /// Root that descriptor `file`s are resolved against
    pub models_dir: PathBuf,
    /// Persisted catalog location
    pub catalog_path: PathBuf,
    /// Artifact of the generic fallback backend
    pub fallback_model: PathBuf,
    pub tier_policy: TierPolicy,
    /// Where annotated images are written
    pub artifact_dir: PathBuf,
}

impl RegistryConfig {
    /// Catalog at `<models_dir>/config.json`, fallback `<models_dir>/yolov8n.onnx`
    pub fn for_models_dir(models_dir: impl Into<PathBuf>) -> Self {
        let models_dir = models_dir.into();
        Self {
            catalog_path: models_dir.join("config.json"),
            fallback_model: models_dir.join("yolov8n.onnx"),
            tier_policy: TierPolicy::default(),
            artifact_dir: PathBuf::from("artifacts"),
            models_dir,
        }
    }
}

/// Outcome of an initialize/reload cycle
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ReloadReport {
    pub success: bool,
    pub loaded_count: usize,
    pub loaded_models: Vec<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl ReloadReport {
    fn failed(error: impl std::fmt::Display) -> Self {
        Self {
            success: false,
            loaded_count: 0,
            loaded_models: Vec::new(),
            error: Some(error.to_string()),
        }
    }
}

/// A cached backend as reported by `model_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LoadedModelInfo {
    pub id: String,
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub status: String,
    pub file_size: u64,
}

/// Snapshot of the registry for display
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelInfo {
    pub device: String,
    pub total_loaded: usize,
    pub loaded_models: Vec<LoadedModelInfo>,
    pub catalog: ModelsSummary,
    pub default_model: String,
}

/// One catalog entry with its availability
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelListing {
    pub id: String,
    pub name: String,
    pub description: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub task: String,
    pub status: ModelStatus,
    pub loaded: bool,
    pub file_size: u64,
    pub file_path: PathBuf,
}

#[derive(Default)]
struct RegistryState {
    availability: Arc<AvailabilityMap>,
    backends: HashMap<String, LoadedBackend>,
}

/// Owner of the vision model catalog and the loaded backends
pub struct LocalModelRegistry {
    store: RwLock<DescriptorStore>,
    scanner: AvailabilityScanner,
    loader: Arc<dyn BackendLoader>,
    policy: TierPolicy,
    fallback_model: PathBuf,
    pipeline: DetectionPipeline,
    state: RwLock<RegistryState>,
    /// Held for a whole catalog read, scan and cache swap
    rebuild_lock: Mutex<()>,
}

impl std::fmt::Debug for LocalModelRegistry {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("LocalModelRegistry")
            .field("models_dir", &self.scanner.root())
            .field("policy", &self.policy)
            .field("fallback_model", &self.fallback_model)
            .finish_non_exhaustive()
    }
}

impl LocalModelRegistry {
    /// Open (or bootstrap) the catalog. Nothing is scanned or loaded until
    /// `initialize` runs.
    pub fn new(config: RegistryConfig, loader: Arc<dyn BackendLoader>) -> Result<Self, VisionError> {
        let store = DescriptorStore::load(&config.catalog_path)?;

        Ok(Self {
            store: RwLock::new(store),
            scanner: AvailabilityScanner::new(config.models_dir),
            loader,
            policy: config.tier_policy,
            fallback_model: config.fallback_model,
            pipeline: DetectionPipeline::new(config.artifact_dir),
            state: RwLock::new(RegistryState::default()),
            rebuild_lock: Mutex::new(()),
        })
    }

    /// Scan the models directory and load every supported, available model
    pub fn initialize(&self) -> ReloadReport {
        info!("🚀 Initializing local vision models...");
        self.rebuild()
    }

    /// Drop every cached backend and load again from a fresh scan
    pub fn reload(&self) -> ReloadReport {
        info!("🔄 Reloading local vision models...");
        self.rebuild()
    }

    fn rebuild(&self) -> ReloadReport {
        // One rebuild at a time, so the last one to finish always saw the
        // latest catalog
        let _rebuild = self
            .rebuild_lock
            .lock()
            .unwrap_or_else(PoisonError::into_inner);
        let catalog = self.read_store().catalog().clone();

        let availability = match self.scanner.scan(&catalog) {
            Ok(availability) => availability,
            Err(e) => {
                warn!("⚠️ Model scan failed, keeping loaded models: {}", e);
                return ReloadReport::failed(e);
            }
        };

        // Readers wait for the whole rebuild and never see a partial cache
        let mut state = self.write_state();
        state.backends.clear();
        state.availability = Arc::clone(&availability);

        for (id, entry) in availability.iter().filter(|(_, m)| m.is_available()) {
            if !self.loader.supports(&entry.descriptor.model_type) {
                debug!("Skipping {}: unsupported type {}", id, entry.descriptor.model_type);
                continue;
            }

            match self.loader.load(id, &entry.descriptor, &entry.file_path) {
                Ok(backend) => {
                    info!("✅ Loaded vision model {} ({})", id, entry.descriptor.name);
                    state.backends.insert(
                        id.clone(),
                        LoadedBackend {
                            id: id.clone(),
                            name: entry.descriptor.name.clone(),
                            model_type: entry.descriptor.model_type.clone(),
                            file_size_bytes: entry.file_size_bytes,
                            backend,
                        },
                    );
                }
                Err(e) => warn!("⚠️ Failed to load vision model {}: {:#}", id, e),
            }
        }

        if !state.backends.keys().any(|id| self.policy.is_tier(id)) {
            if let Some(fallback) = self.load_fallback() {
                state.backends.insert(fallback.id.clone(), fallback);
            }
        }

        let mut loaded_models: Vec<String> = state.backends.keys().cloned().collect();
        loaded_models.sort();

        if loaded_models.is_empty() {
            warn!("⚠️ No detection backend loaded; vision tools will report unavailable");
        } else {
            info!("✅ {} vision model(s) ready: {:?}", loaded_models.len(), loaded_models);
        }

        ReloadReport {
            success: true,
            loaded_count: loaded_models.len(),
            loaded_models,
            error: None,
        }
    }

    fn load_fallback(&self) -> Option<LoadedBackend> {
        let size = match std::fs::metadata(&self.fallback_model) {
            Ok(meta) if meta.is_file() => meta.len(),
            _ => {
                debug!(
                    "No fallback model at {}",
                    self.fallback_model.display()
                );
                return None;
            }
        };

        let descriptor = fallback_descriptor(&self.fallback_model);
        if !self.loader.supports(&descriptor.model_type) {
            return None;
        }

        match self
            .loader
            .load(FALLBACK_BACKEND_ID, &descriptor, &self.fallback_model)
        {
            Ok(backend) => {
                info!(
                    "✅ Loaded fallback detector from {}",
                    self.fallback_model.display()
                );
                Some(LoadedBackend {
                    id: FALLBACK_BACKEND_ID.to_string(),
                    name: descriptor.name,
                    model_type: descriptor.model_type,
                    file_size_bytes: size,
                    backend,
                })
            }
            Err(e) => {
                warn!("⚠️ Failed to load fallback detector: {:#}", e);
                None
            }
        }
    }

    /// Resolve a backend without loading anything
    pub fn resolve(&self, model_id: Option<&str>) -> Result<LoadedBackend, VisionError> {
        let state = self.read_state();
        BackendSelector::new(&state.backends, &state.availability, &self.policy).resolve(model_id)
    }

    /// Detect objects in an image file
    pub fn detect_objects(
        &self,
        image_path: &Path,
        confidence: f32,
        model_id: Option<&str>,
        options: &DetectOptions,
    ) -> Result<DetectionResult, VisionError> {
        if !image_path.is_file() {
            return Err(VisionError::ImageNotFound(image_path.display().to_string()));
        }
        let backend = self.resolve(model_id)?;
        self.pipeline.detect(image_path, &backend, confidence, options)
    }

    pub fn pipeline(&self) -> &DetectionPipeline {
        &self.pipeline
    }

    pub fn model_info(&self) -> ModelInfo {
        let state = self.read_state();

        let mut loaded_models: Vec<LoadedModelInfo> = state
            .backends
            .values()
            .map(|b| LoadedModelInfo {
                id: b.id.clone(),
                name: b.name.clone(),
                model_type: b.model_type.clone(),
                status: "loaded".to_string(),
                file_size: b.file_size_bytes,
            })
            .collect();
        loaded_models.sort_by(|a, b| a.id.cmp(&b.id));

        ModelInfo {
            device: "cpu".to_string(),
            total_loaded: loaded_models.len(),
            loaded_models,
            catalog: super::scanner::summarize(&state.availability),
            default_model: self.default_model(),
        }
    }

    /// Every catalog entry from the latest scan, by id
    pub fn list_models(&self) -> Vec<ModelListing> {
        let state = self.read_state();
        state
            .availability
            .values()
            .map(|m| ModelListing {
                id: m.id.clone(),
                name: m.descriptor.name.clone(),
                description: m.descriptor.description.clone(),
                model_type: m.descriptor.model_type.clone(),
                task: m.descriptor.task.clone(),
                status: m.status,
                loaded: state.backends.contains_key(&m.id),
                file_size: m.file_size_bytes,
                file_path: m.file_path.clone(),
            })
            .collect()
    }

    pub fn summary(&self) -> ModelsSummary {
        super::scanner::summarize(&self.read_state().availability)
    }

    pub fn default_model(&self) -> String {
        self.read_store().default_model().to_string()
    }

    pub fn descriptor(&self, id: &str) -> Option<ModelDescriptor> {
        self.read_store().get(id).cloned()
    }

    /// Insert or replace a descriptor, then rescan and reload
    pub fn add_model(
        &self,
        id: &str,
        descriptor: ModelDescriptor,
    ) -> Result<ReloadReport, VisionError> {
        self.write_store().add_or_update(id, descriptor)?;
        Ok(self.reload())
    }

    /// Patch an existing descriptor, then rescan and reload
    pub fn update_model(
        &self,
        id: &str,
        patch: ModelDescriptorPatch,
    ) -> Result<ReloadReport, VisionError> {
        self.write_store().update(id, patch)?;
        Ok(self.reload())
    }

    /// Remove a descriptor, then rescan and reload
    pub fn remove_model(&self, id: &str) -> Result<ReloadReport, VisionError> {
        if !self.write_store().remove(id)? {
            return Err(VisionError::ModelNotFound(id.to_string()));
        }
        Ok(self.reload())
    }

    fn read_store(&self) -> RwLockReadGuard<'_, DescriptorStore> {
        self.store.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_store(&self) -> RwLockWriteGuard<'_, DescriptorStore> {
        self.store.write().unwrap_or_else(PoisonError::into_inner)
    }

    fn read_state(&self) -> RwLockReadGuard<'_, RegistryState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write_state(&self) -> RwLockWriteGuard<'_, RegistryState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }
}

fn fallback_descriptor(path: &Path) -> ModelDescriptor {
    ModelDescriptor {
        name: "Default object detector".to_string(),
        model_type: "yolov8".to_string(),
        description: "Generic fallback detector".to_string(),
        file: path
            .file_name()
            .map(|f| f.to_string_lossy().to_string())
            .unwrap_or_default(),
        task: "detection".to_string(),
        input_size: [640, 640],
        confidence_threshold: 0.5,
        iou_threshold: 0.45,
    }
}
