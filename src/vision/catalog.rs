// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Persisted catalog of known vision models
//!
//! The catalog is a JSON document (`models/config.json` by default) mapping
//! model ids to descriptors, plus a small settings block. A missing catalog is
//! bootstrapped from the built-in YOLOv8 family and written to disk; an
//! existing catalog is never overwritten by the bootstrap.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::{info, warn};

use super::errors::VisionError;

/// Declarative description of a vision model, independent of whether its
/// artifact is present on disk
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelDescriptor {
    /// Human readable name (e.g., "YOLOv8 Nano")
    pub name: String,
    /// Backend family tag (e.g., "yolov8")
    #[serde(rename = "type")]
    pub model_type: String,
    #[serde(default)]
    pub description: String,
    /// Artifact filename, relative to the models directory
    pub file: String,
    /// Task the model performs ("detection", "segmentation")
    pub task: String,
    /// Network input size as [width, height]
    pub input_size: [u32; 2],
    pub confidence_threshold: f32,
    pub iou_threshold: f32,
}

/// Partial descriptor used by `DescriptorStore::update`
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct ModelDescriptorPatch {
    pub name: Option<String>,
    #[serde(rename = "type")]
    pub model_type: Option<String>,
    pub description: Option<String>,
    pub file: Option<String>,
    pub task: Option<String>,
    pub input_size: Option<[u32; 2]>,
    pub confidence_threshold: Option<f32>,
    pub iou_threshold: Option<f32>,
}

impl ModelDescriptorPatch {
    fn apply(self, descriptor: &mut ModelDescriptor) {
        if let Some(name) = self.name {
            descriptor.name = name;
        }
        if let Some(model_type) = self.model_type {
            descriptor.model_type = model_type;
        }
        if let Some(description) = self.description {
            descriptor.description = description;
        }
        if let Some(file) = self.file {
            descriptor.file = file;
        }
        if let Some(task) = self.task {
            descriptor.task = task;
        }
        if let Some(input_size) = self.input_size {
            descriptor.input_size = input_size;
        }
        if let Some(threshold) = self.confidence_threshold {
            descriptor.confidence_threshold = threshold;
        }
        if let Some(threshold) = self.iou_threshold {
            descriptor.iou_threshold = threshold;
        }
    }
}

/// Catalog-wide settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CatalogSettings {
    pub default_model: String,
    #[serde(default)]
    pub auto_download: bool,
    #[serde(default)]
    pub cache_dir: String,
}

impl Default for CatalogSettings {
    fn default() -> Self {
        Self {
            default_model: "yolov8n".to_string(),
            auto_download: true,
            cache_dir: "models/cache".to_string(),
        }
    }
}

/// The full persisted catalog document
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelCatalog {
    #[serde(default)]
    pub models: BTreeMap<String, ModelDescriptor>,
    #[serde(default)]
    pub settings: CatalogSettings,
}

/// Ids of the built-in catalog, smallest to largest
pub const BUILTIN_MODEL_IDS: [&str; 5] = ["yolov8n", "yolov8s", "yolov8m", "yolov8l", "yolov8x"];

impl ModelCatalog {
    /// The built-in YOLOv8 detection family
    pub fn builtin() -> Self {
        let variants = [
            ("yolov8n", "YOLOv8 Nano", "Lightweight YOLOv8 object detector"),
            ("yolov8s", "YOLOv8 Small", "Small YOLOv8 object detector"),
            ("yolov8m", "YOLOv8 Medium", "Medium YOLOv8 object detector"),
            ("yolov8l", "YOLOv8 Large", "Large YOLOv8 object detector"),
            ("yolov8x", "YOLOv8 XLarge", "Extra large YOLOv8 object detector"),
        ];

        let models = variants
            .iter()
            .map(|(id, name, description)| {
                (
                    id.to_string(),
                    ModelDescriptor {
                        name: name.to_string(),
                        model_type: "yolov8".to_string(),
                        description: description.to_string(),
                        file: format!("{}.onnx", id),
                        task: "detection".to_string(),
                        input_size: [640, 640],
                        confidence_threshold: 0.5,
                        iou_threshold: 0.45,
                    },
                )
            })
            .collect();

        Self {
            models,
            settings: CatalogSettings::default(),
        }
    }
}

/// File-backed owner of the model catalog
///
/// Every mutation persists the whole catalog before reporting success. When
/// the write fails the in-memory catalog is restored to its previous state.
#[derive(Debug)]
pub struct DescriptorStore {
    path: PathBuf,
    catalog: ModelCatalog,
}

impl DescriptorStore {
    /// Load the catalog at `path`, bootstrapping the built-in catalog when
    /// the file does not exist (or is empty)
    pub fn load(path: impl Into<PathBuf>) -> Result<Self, VisionError> {
        let path = path.into();

        let existing = match fs::read_to_string(&path) {
            Ok(contents) if !contents.trim().is_empty() => Some(contents),
            Ok(_) => None,
            Err(e) if e.kind() == std::io::ErrorKind::NotFound => None,
            Err(e) => {
                return Err(VisionError::CatalogParse {
                    path: path.display().to_string(),
                    reason: e.to_string(),
                })
            }
        };

        match existing {
            Some(contents) => {
                let catalog: ModelCatalog =
                    serde_json::from_str(&contents).map_err(|e| VisionError::CatalogParse {
                        path: path.display().to_string(),
                        reason: e.to_string(),
                    })?;
                info!(
                    "Loaded model catalog from {} ({} models)",
                    path.display(),
                    catalog.models.len()
                );
                Ok(Self { path, catalog })
            }
            None => {
                let catalog = ModelCatalog::builtin();
                write_catalog(&path, &catalog)?;
                info!(
                    "Created default model catalog at {} ({} models)",
                    path.display(),
                    catalog.models.len()
                );
                Ok(Self { path, catalog })
            }
        }
    }

    /// Path of the persisted catalog
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Current catalog contents
    pub fn catalog(&self) -> &ModelCatalog {
        &self.catalog
    }

    pub fn get(&self, id: &str) -> Option<&ModelDescriptor> {
        self.catalog.models.get(id)
    }

    pub fn contains(&self, id: &str) -> bool {
        self.catalog.models.contains_key(id)
    }

    /// Id of the catalog's default model
    pub fn default_model(&self) -> &str {
        &self.catalog.settings.default_model
    }

    /// Insert or replace a descriptor and persist the catalog
    pub fn add_or_update(
        &mut self,
        id: &str,
        descriptor: ModelDescriptor,
    ) -> Result<(), VisionError> {
        let previous = self.catalog.models.insert(id.to_string(), descriptor);

        if let Err(e) = write_catalog(&self.path, &self.catalog) {
            match previous {
                Some(old) => {
                    self.catalog.models.insert(id.to_string(), old);
                }
                None => {
                    self.catalog.models.remove(id);
                }
            }
            return Err(e);
        }

        info!("Model descriptor saved: {}", id);
        Ok(())
    }

    /// Merge a partial descriptor into an existing entry and persist
    pub fn update(&mut self, id: &str, patch: ModelDescriptorPatch) -> Result<(), VisionError> {
        let mut descriptor = self
            .get(id)
            .cloned()
            .ok_or_else(|| VisionError::ModelNotFound(id.to_string()))?;
        patch.apply(&mut descriptor);
        self.add_or_update(id, descriptor)
    }

    /// Remove a descriptor and persist. Returns `Ok(false)` when the id was
    /// not in the catalog.
    pub fn remove(&mut self, id: &str) -> Result<bool, VisionError> {
        let Some(previous) = self.catalog.models.remove(id) else {
            return Ok(false);
        };

        if let Err(e) = write_catalog(&self.path, &self.catalog) {
            self.catalog.models.insert(id.to_string(), previous);
            return Err(e);
        }

        info!("Model descriptor removed: {}", id);
        Ok(true)
    }
}

/// Write the catalog via a sibling temp file and rename
fn write_catalog(path: &Path, catalog: &ModelCatalog) -> Result<(), VisionError> {
    let persist_err = |reason: String| VisionError::ConfigPersist {
        path: path.display().to_string(),
        reason,
    };

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent).map_err(|e| persist_err(e.to_string()))?;
        }
    }

    let json = serde_json::to_string_pretty(catalog).map_err(|e| persist_err(e.to_string()))?;

    let tmp_path = path.with_extension("json.tmp");
    fs::write(&tmp_path, json).map_err(|e| persist_err(e.to_string()))?;
    if let Err(e) = fs::rename(&tmp_path, path) {
        warn!("Failed to move catalog into place: {}", e);
        let _ = fs::remove_file(&tmp_path);
        return Err(persist_err(e.to_string()));
    }

    Ok(())
}
