// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use desk_assistant::vision::{AvailabilityScanner, ModelCatalog, ModelStatus};

use crate::common::touch;

fn classifications(scanner: &AvailabilityScanner, catalog: &ModelCatalog) -> Vec<(String, ModelStatus)> {
    scanner
        .scan(catalog)
        .unwrap()
        .values()
        .map(|m| (m.id.clone(), m.status))
        .collect()
}

#[test]
fn test_scan_is_idempotent() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("yolov8s.onnx"));
    let catalog = ModelCatalog::builtin();
    let scanner = AvailabilityScanner::new(dir.path());

    let first = classifications(&scanner, &catalog);
    let second = classifications(&scanner, &catalog);
    assert_eq!(first, second);
}

#[test]
fn test_scan_classifies_present_and_missing() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("yolov8n.onnx"));
    touch(&dir.path().join("yolov8m.onnx"));
    // A directory with the artifact's name does not count
    std::fs::create_dir(dir.path().join("yolov8l.onnx")).unwrap();

    let scanner = AvailabilityScanner::new(dir.path());
    scanner.scan(&ModelCatalog::builtin()).unwrap();

    assert!(scanner.is_available("yolov8n"));
    assert!(scanner.is_available("yolov8m"));
    assert!(!scanner.is_available("yolov8l"));
    assert!(!scanner.is_available("yolov8s"));
    assert!(!scanner.is_available("unknown"));

    assert_eq!(
        scanner.model_path("yolov8n"),
        Some(dir.path().join("yolov8n.onnx"))
    );
    assert_eq!(scanner.model_path("yolov8s"), None);

    let summary = scanner.summary();
    assert_eq!(summary.total_models, 5);
    assert_eq!(summary.available_count, 2);
    assert_eq!(summary.missing_count, 3);
    assert_eq!(summary.models["yolov8n"].status, ModelStatus::Available);
    assert_eq!(summary.models["yolov8n"].file_size, 4);
}

#[test]
fn test_rescan_sees_new_files() {
    let dir = tempfile::tempdir().unwrap();
    let catalog = ModelCatalog::builtin();
    let scanner = AvailabilityScanner::new(dir.path());

    scanner.scan(&catalog).unwrap();
    assert!(!scanner.is_available("yolov8x"));

    touch(&dir.path().join("yolov8x.onnx"));
    scanner.scan(&catalog).unwrap();
    assert!(scanner.is_available("yolov8x"));
}
