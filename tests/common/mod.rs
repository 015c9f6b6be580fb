// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shared fixtures: fake detection backends and on-disk model layouts

#![allow(dead_code)]

use anyhow::anyhow;
use async_trait::async_trait;
use desk_assistant::search::{SearchError, SearchProvider, SearchResult};
use desk_assistant::vision::{
    BackendLoader, DetectionBackend, InferenceParams, LoadedBackend, LocalModelRegistry,
    ModelDescriptor, RawDetection, RawMask, RegistryConfig, TierPolicy,
};
use image::{DynamicImage, Rgb, RgbImage};
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;

/// Returns a fixed detection list, filtered by the call's confidence
pub struct FakeBackend {
    pub detections: Vec<RawDetection>,
}

impl DetectionBackend for FakeBackend {
    fn detect(
        &self,
        _image: &DynamicImage,
        params: &InferenceParams,
    ) -> anyhow::Result<Vec<RawDetection>> {
        Ok(self
            .detections
            .iter()
            .filter(|d| d.confidence >= params.confidence)
            .cloned()
            .collect())
    }
}

pub struct FailingBackend;

impl DetectionBackend for FailingBackend {
    fn detect(
        &self,
        _image: &DynamicImage,
        _params: &InferenceParams,
    ) -> anyhow::Result<Vec<RawDetection>> {
        Err(anyhow!("tensor shape mismatch"))
    }
}

/// Builds `FakeBackend`s for `yolo*` types; ids in `fail_ids` fail to load
#[derive(Default)]
pub struct FakeLoader {
    pub detections: Vec<RawDetection>,
    pub fail_ids: Vec<String>,
    loads: AtomicUsize,
}

impl FakeLoader {
    pub fn new(detections: Vec<RawDetection>) -> Self {
        Self {
            detections,
            ..Default::default()
        }
    }

    pub fn failing_on(mut self, id: &str) -> Self {
        self.fail_ids.push(id.to_string());
        self
    }

    pub fn load_count(&self) -> usize {
        self.loads.load(Ordering::SeqCst)
    }
}

impl BackendLoader for FakeLoader {
    fn supports(&self, model_type: &str) -> bool {
        model_type.to_lowercase().starts_with("yolo")
    }

    fn load(
        &self,
        id: &str,
        _descriptor: &ModelDescriptor,
        _artifact: &Path,
    ) -> anyhow::Result<Arc<dyn DetectionBackend>> {
        self.loads.fetch_add(1, Ordering::SeqCst);
        if self.fail_ids.iter().any(|f| f == id) {
            return Err(anyhow!("corrupt model file"));
        }
        Ok(Arc::new(FakeBackend {
            detections: self.detections.clone(),
        }))
    }
}

pub fn raw(class: &str, confidence: f32, bbox: [f32; 4]) -> RawDetection {
    RawDetection {
        class_name: class.to_string(),
        confidence,
        bbox,
        mask: None,
    }
}

/// A dog, a cat and a low-confidence person on a 200x160 frame
pub fn sample_detections() -> Vec<RawDetection> {
    vec![
        raw("dog", 0.8675, [10.2, 5.9, 100.4, 80.1]),
        RawDetection {
            mask: Some(RawMask {
                width: 200,
                height: 160,
                data: (0..200 * 160).map(|i| u8::from(i % 4 == 0)).collect(),
            }),
            ..raw("cat", 0.61234, [120.0, 40.0, 190.0, 150.0])
        },
        raw("person", 0.3, [0.0, 0.0, 50.0, 50.0]),
    ]
}

pub fn loaded(id: &str, backend: Arc<dyn DetectionBackend>) -> LoadedBackend {
    LoadedBackend {
        id: id.to_string(),
        name: format!("{} test model", id),
        model_type: "yolov8".to_string(),
        file_size_bytes: 0,
        backend,
    }
}

pub fn write_png(path: &Path, width: u32, height: u32) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    RgbImage::from_fn(width, height, |x, y| Rgb([(x % 256) as u8, (y % 256) as u8, 90]))
        .save(path)
        .unwrap();
}

pub fn touch(path: &Path) {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent).unwrap();
    }
    std::fs::write(path, b"onnx").unwrap();
}

pub fn descriptor(name: &str, file: &str) -> ModelDescriptor {
    ModelDescriptor {
        name: name.to_string(),
        model_type: "yolov8".to_string(),
        description: format!("{} for tests", name),
        file: file.to_string(),
        task: "detection".to_string(),
        input_size: [640, 640],
        confidence_threshold: 0.5,
        iou_threshold: 0.45,
    }
}

/// `root/models` with the built-in catalog, artifacts under `root/artifacts`
pub fn registry_config(root: &Path) -> RegistryConfig {
    let mut config = RegistryConfig::for_models_dir(root.join("models"));
    config.artifact_dir = root.join("artifacts");
    config
}

pub fn models_dir(root: &Path) -> PathBuf {
    root.join("models")
}

/// Catalog `{A: a.onnx, B: b.onnx}` with tiers `[A, B]`
pub fn two_model_config(root: &Path) -> RegistryConfig {
    let models = models_dir(root);
    let catalog = serde_json::json!({
        "models": {
            "A": descriptor("Model A", "a.onnx"),
            "B": descriptor("Model B", "b.onnx"),
        },
        "settings": {"default_model": "A", "auto_download": false, "cache_dir": "cache"}
    });
    std::fs::create_dir_all(&models).unwrap();
    std::fs::write(
        models.join("config.json"),
        serde_json::to_string_pretty(&catalog).unwrap(),
    )
    .unwrap();

    let mut config = registry_config(root);
    config.tier_policy = TierPolicy::new(vec!["A".to_string(), "B".to_string()]);
    config
}

pub fn registry(config: RegistryConfig, loader: Arc<dyn BackendLoader>) -> Arc<LocalModelRegistry> {
    let registry = LocalModelRegistry::new(config, loader).unwrap();
    Arc::new(registry)
}

/// Search provider returning one result per requested slot
pub struct CannedSearch;

#[async_trait]
impl SearchProvider for CannedSearch {
    async fn search(&self, query: &str, num_results: usize) -> Result<Vec<SearchResult>, SearchError> {
        Ok((0..num_results)
            .map(|i| SearchResult {
                title: format!("{} result {}", query, i + 1),
                url: format!("https://example.com/{}", i + 1),
                snippet: "snippet".to_string(),
            })
            .collect())
    }
}
