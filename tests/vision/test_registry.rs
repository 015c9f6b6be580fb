// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use desk_assistant::vision::{DetectOptions, ModelStatus, VisionError};
use std::sync::Arc;
use std::thread;

use crate::common::{
    descriptor, models_dir, registry, registry_config, sample_detections, touch, write_png,
    FakeLoader,
};

#[test]
fn test_initialize_loads_available_models() {
    let dir = tempfile::tempdir().unwrap();
    touch(&models_dir(dir.path()).join("yolov8s.onnx"));
    touch(&models_dir(dir.path()).join("yolov8m.onnx"));

    let loader = Arc::new(FakeLoader::default());
    let registry = registry(registry_config(dir.path()), loader.clone());
    let report = registry.initialize();

    assert!(report.success);
    assert_eq!(report.loaded_count, 2);
    assert_eq!(report.loaded_models, vec!["yolov8m", "yolov8s"]);
    assert_eq!(loader.load_count(), 2);
    assert_eq!(registry.resolve(None).unwrap().id, "yolov8s");
}

#[test]
fn test_load_failure_is_skipped() {
    let dir = tempfile::tempdir().unwrap();
    touch(&models_dir(dir.path()).join("yolov8n.onnx"));
    touch(&models_dir(dir.path()).join("yolov8s.onnx"));

    let loader = FakeLoader::default().failing_on("yolov8n");
    let registry = registry(registry_config(dir.path()), Arc::new(loader));
    let report = registry.initialize();

    assert!(report.success);
    assert_eq!(report.loaded_models, vec!["yolov8s"]);
    assert_eq!(registry.resolve(None).unwrap().id, "yolov8s");
}

#[test]
fn test_reload_picks_up_new_files_and_drops_removed() {
    let dir = tempfile::tempdir().unwrap();
    let models = models_dir(dir.path());
    touch(&models.join("yolov8l.onnx"));

    let registry = registry(registry_config(dir.path()), Arc::new(FakeLoader::default()));
    registry.initialize();
    assert_eq!(registry.resolve(None).unwrap().id, "yolov8l");

    touch(&models.join("yolov8n.onnx"));
    std::fs::remove_file(models.join("yolov8l.onnx")).unwrap();

    let report = registry.reload();
    assert!(report.success);
    assert_eq!(report.loaded_models, vec!["yolov8n"]);
    assert_eq!(registry.resolve(None).unwrap().id, "yolov8n");
    assert!(registry.resolve(Some("yolov8l")).is_err());
}

#[test]
fn test_model_info_and_listing() {
    let dir = tempfile::tempdir().unwrap();
    touch(&models_dir(dir.path()).join("yolov8n.onnx"));

    let registry = registry(registry_config(dir.path()), Arc::new(FakeLoader::default()));
    registry.initialize();

    let info = registry.model_info();
    assert_eq!(info.device, "cpu");
    assert_eq!(info.total_loaded, 1);
    assert_eq!(info.loaded_models[0].id, "yolov8n");
    assert_eq!(info.loaded_models[0].status, "loaded");
    assert_eq!(info.catalog.total_models, 5);
    assert_eq!(info.catalog.available_count, 1);
    assert_eq!(info.default_model, "yolov8n");

    let listing = registry.list_models();
    assert_eq!(listing.len(), 5);
    let nano = listing.iter().find(|m| m.id == "yolov8n").unwrap();
    assert_eq!(nano.status, ModelStatus::Available);
    assert!(nano.loaded);
    assert_eq!(nano.file_size, 4);
    let large = listing.iter().find(|m| m.id == "yolov8l").unwrap();
    assert_eq!(large.status, ModelStatus::Missing);
    assert!(!large.loaded);
}

#[test]
fn test_catalog_mutations_reload() {
    let dir = tempfile::tempdir().unwrap();
    touch(&models_dir(dir.path()).join("custom.onnx"));

    let registry = registry(registry_config(dir.path()), Arc::new(FakeLoader::default()));
    registry.initialize();
    assert!(registry.resolve(Some("custom")).is_err());

    let report = registry
        .add_model("custom", descriptor("Custom", "custom.onnx"))
        .unwrap();
    assert_eq!(report.loaded_models, vec!["custom"]);
    assert_eq!(registry.resolve(Some("custom")).unwrap().name, "Custom");

    let report = registry.remove_model("custom").unwrap();
    assert_eq!(report.loaded_count, 0);
    assert!(registry.descriptor("custom").is_none());

    assert!(matches!(
        registry.remove_model("custom"),
        Err(VisionError::ModelNotFound(_))
    ));
}

#[test]
fn test_unsupported_type_is_not_loaded() {
    let dir = tempfile::tempdir().unwrap();
    touch(&models_dir(dir.path()).join("faces.onnx"));

    let registry = registry(registry_config(dir.path()), Arc::new(FakeLoader::default()));
    let mut faces = descriptor("Faces", "faces.onnx");
    faces.model_type = "retinaface".to_string();
    let report = registry.add_model("faces", faces).unwrap();

    assert!(report.success);
    assert!(report.loaded_models.is_empty());
    let listing = registry.list_models();
    let entry = listing.iter().find(|m| m.id == "faces").unwrap();
    assert_eq!(entry.status, ModelStatus::Available);
    assert!(!entry.loaded);
}

#[test]
fn test_detect_objects_missing_image_before_model_lookup() {
    let dir = tempfile::tempdir().unwrap();
    let registry = registry(registry_config(dir.path()), Arc::new(FakeLoader::default()));
    registry.initialize();

    let err = registry
        .detect_objects(
            &dir.path().join("nope.jpg"),
            0.5,
            None,
            &DetectOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, VisionError::ImageNotFound(_)));

    let image = dir.path().join("frame.png");
    write_png(&image, 64, 64);
    let err = registry
        .detect_objects(&image, 0.5, None, &DetectOptions::default())
        .unwrap_err();
    assert!(matches!(err, VisionError::ModelUnavailable { id: None }));
}

#[test]
fn test_detect_objects_uses_requested_model() {
    let dir = tempfile::tempdir().unwrap();
    touch(&models_dir(dir.path()).join("yolov8n.onnx"));
    touch(&models_dir(dir.path()).join("yolov8x.onnx"));
    let image = dir.path().join("frame.png");
    write_png(&image, 200, 160);

    let registry = registry(
        registry_config(dir.path()),
        Arc::new(FakeLoader::new(sample_detections())),
    );
    registry.initialize();

    let result = registry
        .detect_objects(&image, 0.5, Some("yolov8x"), &DetectOptions::annotated())
        .unwrap();
    assert_eq!(result.model_id, "yolov8x");
    assert_eq!(result.model_used, "YOLOv8 XLarge");
    assert_eq!(result.total_objects, 2);

    let annotated = result.annotated_image_path.unwrap();
    assert!(annotated.starts_with(dir.path().join("artifacts")));
    assert!(annotated.is_file());
}

#[test]
fn test_readers_never_see_partial_cache() {
    let dir = tempfile::tempdir().unwrap();
    for id in ["yolov8n", "yolov8s", "yolov8m"] {
        touch(&models_dir(dir.path()).join(format!("{}.onnx", id)));
    }

    let registry = registry(registry_config(dir.path()), Arc::new(FakeLoader::default()));
    registry.initialize();

    let readers: Vec<_> = (0..4)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..200 {
                    assert_eq!(registry.resolve(None).unwrap().id, "yolov8n");
                    assert_eq!(registry.model_info().total_loaded, 3);
                }
            })
        })
        .collect();

    for _ in 0..20 {
        assert!(registry.reload().success);
    }
    for reader in readers {
        reader.join().unwrap();
    }
}

#[test]
fn test_failed_scan_keeps_previous_cache() {
    let dir = tempfile::tempdir().unwrap();
    let models = models_dir(dir.path());
    touch(&models.join("yolov8s.onnx"));

    let registry = registry(registry_config(dir.path()), Arc::new(FakeLoader::default()));
    registry
        .add_model("nested", descriptor("Nested", "blocker/nested.onnx"))
        .unwrap();
    let before = registry.list_models();
    assert_eq!(registry.resolve(None).unwrap().id, "yolov8s");

    // A regular file where a directory is expected fails the scan with
    // something other than "not found"
    touch(&models.join("blocker"));
    touch(&models.join("yolov8n.onnx"));

    let report = registry.reload();
    assert!(!report.success);
    assert!(report.error.is_some());
    assert_eq!(registry.resolve(None).unwrap().id, "yolov8s");
    assert_eq!(registry.list_models(), before);
    assert_eq!(registry.model_info().total_loaded, 1);
}

#[test]
fn test_concurrent_mutations_and_reloads_end_on_latest_catalog() {
    let dir = tempfile::tempdir().unwrap();
    let models = models_dir(dir.path());
    for i in 0..8 {
        touch(&models.join(format!("extra{}.onnx", i)));
    }

    let registry = registry(registry_config(dir.path()), Arc::new(FakeLoader::default()));
    registry.initialize();

    let reloaders: Vec<_> = (0..3)
        .map(|_| {
            let registry = Arc::clone(&registry);
            thread::spawn(move || {
                for _ in 0..20 {
                    assert!(registry.reload().success);
                }
            })
        })
        .collect();

    for i in 0..8 {
        let id = format!("extra{}", i);
        registry
            .add_model(&id, descriptor(&id, &format!("{}.onnx", id)))
            .unwrap();
    }
    for reloader in reloaders {
        reloader.join().unwrap();
    }

    let listing = registry.list_models();
    for i in 0..8 {
        let id = format!("extra{}", i);
        let entry = listing.iter().find(|m| m.id == id).unwrap();
        assert_eq!(entry.status, ModelStatus::Available);
        assert!(entry.loaded);
        assert_eq!(registry.resolve(Some(&id)).unwrap().id, id);
    }
}
