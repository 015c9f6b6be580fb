// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use desk_assistant::vision::{VisionError, FALLBACK_BACKEND_ID};
use std::sync::Arc;

use crate::common::{models_dir, registry, touch, two_model_config, FakeLoader};

#[test]
fn test_tier_order_picks_first_loaded_tier() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_model_config(dir.path());
    touch(&models_dir(dir.path()).join("a.onnx"));

    let registry = registry(config, Arc::new(FakeLoader::default()));
    registry.initialize();

    assert_eq!(registry.resolve(None).unwrap().id, "A");
    assert_eq!(registry.resolve(Some("A")).unwrap().id, "A");
    assert!(matches!(
        registry.resolve(Some("B")),
        Err(VisionError::ModelUnavailable { id: Some(ref id) }) if id == "B"
    ));
}

#[test]
fn test_second_tier_used_when_first_missing() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_model_config(dir.path());
    touch(&models_dir(dir.path()).join("b.onnx"));

    let registry = registry(config, Arc::new(FakeLoader::default()));
    registry.initialize();

    assert_eq!(registry.resolve(None).unwrap().id, "B");
}

#[test]
fn test_fallback_used_when_no_tier_loads() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = two_model_config(dir.path());
    config.fallback_model = models_dir(dir.path()).join("generic.onnx");
    touch(&config.fallback_model);
    touch(&models_dir(dir.path()).join("a.onnx"));

    let loader = FakeLoader::default().failing_on("A");
    let registry = registry(config, Arc::new(loader));
    registry.initialize();

    assert_eq!(registry.resolve(None).unwrap().id, FALLBACK_BACKEND_ID);
    // The fallback is never selectable by explicit id
    assert!(registry.resolve(Some(FALLBACK_BACKEND_ID)).is_err());
    assert!(registry.resolve(Some("A")).is_err());
}

#[test]
fn test_nothing_loaded_is_unavailable() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(two_model_config(dir.path()), Arc::new(FakeLoader::default()));
    registry.initialize();

    assert!(matches!(
        registry.resolve(None),
        Err(VisionError::ModelUnavailable { id: None })
    ));
}

#[test]
fn test_resolve_never_loads() {
    let dir = tempfile::tempdir().unwrap();
    let config = two_model_config(dir.path());
    touch(&models_dir(dir.path()).join("a.onnx"));

    let loader = Arc::new(FakeLoader::default());
    let registry = registry(config, loader.clone());
    registry.initialize();
    let loads = loader.load_count();

    for _ in 0..5 {
        registry.resolve(None).unwrap();
        let _ = registry.resolve(Some("B"));
    }
    assert_eq!(loader.load_count(), loads);
}
