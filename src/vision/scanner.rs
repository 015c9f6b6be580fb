// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Reconciles the model catalog against the artifacts on disk

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};
use tracing::info;

use super::catalog::{ModelCatalog, ModelDescriptor};
use super::errors::VisionError;

/// Whether a descriptor's artifact was found
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ModelStatus {
    Available,
    Missing,
}

impl std::fmt::Display for ModelStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            ModelStatus::Available => write!(f, "available"),
            ModelStatus::Missing => write!(f, "missing"),
        }
    }
}

/// Classification of one descriptor from the latest scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelAvailability {
    pub id: String,
    pub descriptor: ModelDescriptor,
    pub status: ModelStatus,
    pub file_path: PathBuf,
    /// Artifact size in bytes (0 when missing)
    pub file_size_bytes: u64,
}

impl ModelAvailability {
    pub fn is_available(&self) -> bool {
        self.status == ModelStatus::Available
    }
}

/// Classification of every descriptor, keyed by id
pub type AvailabilityMap = BTreeMap<String, ModelAvailability>;

/// Per-model line of a `ModelsSummary`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelSummaryEntry {
    pub name: String,
    #[serde(rename = "type")]
    pub model_type: String,
    pub task: String,
    pub status: ModelStatus,
    pub file_size: u64,
}

/// Aggregate counts over a scan
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ModelsSummary {
    pub total_models: usize,
    pub available_count: usize,
    pub missing_count: usize,
    pub models: BTreeMap<String, ModelSummaryEntry>,
}

/// Scans a models directory for the artifacts named by the catalog
///
/// The latest classification is published as an immutable snapshot; a scan
/// builds a complete new map before replacing it, so readers see either the
/// previous scan or the new one.
#[derive(Debug)]
pub struct AvailabilityScanner {
    root: PathBuf,
    current: RwLock<Arc<AvailabilityMap>>,
}

impl AvailabilityScanner {
    pub fn new(root: impl Into<PathBuf>) -> Self {
        Self {
            root: root.into(),
            current: RwLock::new(Arc::new(AvailabilityMap::new())),
        }
    }

    /// Directory artifacts are resolved against
    pub fn root(&self) -> &Path {
        &self.root
    }

    /// Classify every descriptor in `catalog` and publish the result
    ///
    /// A filesystem error other than "not found" abandons the scan and leaves
    /// the previous classification in place.
    pub fn scan(&self, catalog: &ModelCatalog) -> Result<Arc<AvailabilityMap>, VisionError> {
        let mut scanned = AvailabilityMap::new();

        for (id, descriptor) in &catalog.models {
            let file_path = self.root.join(&descriptor.file);
            let (status, file_size_bytes) = match fs::metadata(&file_path) {
                Ok(meta) if meta.is_file() => (ModelStatus::Available, meta.len()),
                Ok(_) => (ModelStatus::Missing, 0),
                Err(e) if e.kind() == std::io::ErrorKind::NotFound => (ModelStatus::Missing, 0),
                Err(e) => {
                    return Err(VisionError::Scan(format!(
                        "{}: {}",
                        file_path.display(),
                        e
                    )))
                }
            };

            scanned.insert(
                id.clone(),
                ModelAvailability {
                    id: id.clone(),
                    descriptor: descriptor.clone(),
                    status,
                    file_path,
                    file_size_bytes,
                },
            );
        }

        let scanned = Arc::new(scanned);
        *self.current.write().unwrap_or_else(PoisonError::into_inner) = Arc::clone(&scanned);

        let available = scanned.values().filter(|m| m.is_available()).count();
        info!(
            "Scanned {} model descriptors in {} ({} available)",
            scanned.len(),
            self.root.display(),
            available
        );

        Ok(scanned)
    }

    /// Snapshot of the latest scan
    pub fn availability(&self) -> Arc<AvailabilityMap> {
        Arc::clone(&self.current.read().unwrap_or_else(PoisonError::into_inner))
    }

    pub fn is_available(&self, id: &str) -> bool {
        self.availability()
            .get(id)
            .map(ModelAvailability::is_available)
            .unwrap_or(false)
    }

    /// Artifact path of an available model
    pub fn model_path(&self, id: &str) -> Option<PathBuf> {
        self.availability()
            .get(id)
            .filter(|m| m.is_available())
            .map(|m| m.file_path.clone())
    }

    pub fn summary(&self) -> ModelsSummary {
        summarize(&self.availability())
    }
}

/// Build the aggregate counts for an availability map
pub fn summarize(availability: &AvailabilityMap) -> ModelsSummary {
    let available_count = availability.values().filter(|m| m.is_available()).count();

    let models = availability
        .iter()
        .map(|(id, m)| {
            (
                id.clone(),
                ModelSummaryEntry {
                    name: m.descriptor.name.clone(),
                    model_type: m.descriptor.model_type.clone(),
                    task: m.descriptor.task.clone(),
                    status: m.status,
                    file_size: m.file_size_bytes,
                },
            )
        })
        .collect();

    ModelsSummary {
        total_models: availability.len(),
        available_count,
        missing_count: availability.len() - available_count,
        models,
    }
}
