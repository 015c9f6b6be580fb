// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use desk_assistant::vision::annotate::{palette_color, render, PALETTE};
use desk_assistant::vision::report::save_results;
use desk_assistant::vision::{
    DetectOptions, Detection, DetectionPipeline, DetectionResult, VisionError,
};
use std::sync::Arc;

use crate::common::{loaded, raw, sample_detections, write_png, FailingBackend, FakeBackend};

fn fake() -> desk_assistant::vision::LoadedBackend {
    loaded(
        "yolov8n",
        Arc::new(FakeBackend {
            detections: sample_detections(),
        }),
    )
}

#[test]
fn test_rounding_law() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("frame.png");
    write_png(&image, 200, 160);

    let pipeline = DetectionPipeline::new(dir.path().join("artifacts"));
    let result = pipeline
        .detect(&image, &fake(), 0.5, &DetectOptions::default())
        .unwrap();

    assert_eq!(result.total_objects, 2);
    let dog = &result.detections[0];
    assert_eq!(dog.class_name, "dog");
    assert_eq!(dog.confidence, 86.75);
    assert_eq!(dog.bbox, [10, 5, 100, 80]);
    assert!(dog.mask.is_none());

    let cat = &result.detections[1];
    assert_eq!(cat.confidence, 61.23);
    assert_eq!(cat.mask_area(), Some(200 * 160 / 4));

    assert_eq!(result.model_id, "yolov8n");
    assert_eq!(result.confidence_threshold, 0.5);
    assert!(result.annotated_image_path.is_none());
}

#[test]
fn test_confidence_threshold_filters() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("frame.png");
    write_png(&image, 200, 160);

    let pipeline = DetectionPipeline::new(dir.path());
    let result = pipeline
        .detect(&image, &fake(), 0.25, &DetectOptions::default())
        .unwrap();
    assert_eq!(result.total_objects, 3);
}

#[test]
fn test_result_json_shape() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("frame.png");
    write_png(&image, 200, 160);

    let result = DetectionPipeline::new(dir.path())
        .detect(&image, &fake(), 0.5, &DetectOptions::default())
        .unwrap();
    let json = serde_json::to_value(&result).unwrap();

    assert_eq!(json["totalObjects"], 2);
    assert_eq!(json["modelUsed"], "yolov8n test model");
    assert_eq!(json["detections"][0]["class"], "dog");
    assert_eq!(json["detections"][0]["bbox"], serde_json::json!([10, 5, 100, 80]));
    assert_eq!(json["parameters"]["showConfidence"], true);
    assert!(json.get("annotatedImagePath").is_none());
}

#[test]
fn test_saved_results_keep_mask_pixels() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("frame.png");
    write_png(&image, 200, 160);

    let result = DetectionPipeline::new(dir.path())
        .detect(&image, &fake(), 0.5, &DetectOptions::default())
        .unwrap();
    let path = save_results(&dir.path().join("results"), &image, &result, "report").unwrap();

    let json: serde_json::Value =
        serde_json::from_str(&std::fs::read_to_string(&path).unwrap()).unwrap();
    let mask = &json["detectionResult"]["detections"][1]["mask"];
    assert_eq!(mask["data"].as_array().unwrap().len(), 200 * 160);

    let restored: DetectionResult =
        serde_json::from_value(json["detectionResult"].clone()).unwrap();
    assert_eq!(restored, result);
}

#[test]
fn test_annotated_image_saved() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("frame.png");
    write_png(&image, 200, 160);
    let artifacts = dir.path().join("artifacts");

    let pipeline = DetectionPipeline::new(&artifacts);
    let first = pipeline
        .detect(&image, &fake(), 0.5, &DetectOptions::annotated())
        .unwrap();
    let second = pipeline
        .detect(&image, &fake(), 0.5, &DetectOptions::annotated())
        .unwrap();

    let a = first.annotated_image_path.unwrap();
    let b = second.annotated_image_path.unwrap();
    assert_ne!(a, b);
    assert!(a.starts_with(&artifacts));
    let name = a.file_name().unwrap().to_string_lossy().to_string();
    assert!(name.starts_with("detection_result_"));
    assert!(name.ends_with(".png"));

    let saved = image::open(&a).unwrap();
    assert_eq!((saved.width(), saved.height()), (200, 160));
}

#[test]
fn test_annotation_failure_is_not_fatal() {
    let dir = tempfile::tempdir().unwrap();
    let image = dir.path().join("frame.png");
    write_png(&image, 200, 160);

    // A regular file where the artifact directory should be
    let blocked = dir.path().join("artifacts");
    std::fs::write(&blocked, b"not a directory").unwrap();

    let result = DetectionPipeline::new(&blocked)
        .detect(&image, &fake(), 0.5, &DetectOptions::annotated())
        .unwrap();
    assert_eq!(result.total_objects, 2);
    assert!(result.annotated_image_path.is_none());
}

#[test]
fn test_missing_image_and_inference_failure() {
    let dir = tempfile::tempdir().unwrap();
    let pipeline = DetectionPipeline::new(dir.path());

    let err = pipeline
        .detect(
            &dir.path().join("absent.png"),
            &fake(),
            0.5,
            &DetectOptions::default(),
        )
        .unwrap_err();
    assert!(matches!(err, VisionError::ImageNotFound(_)));

    let image = dir.path().join("frame.png");
    write_png(&image, 32, 32);
    let failing = loaded("broken", Arc::new(FailingBackend));
    let err = pipeline
        .detect(&image, &failing, 0.5, &DetectOptions::annotated())
        .unwrap_err();
    assert!(matches!(err, VisionError::Inference(ref msg) if msg.contains("tensor shape")));
    assert_eq!(std::fs::read_dir(dir.path()).unwrap().count(), 1);
}

#[test]
fn test_undecodable_image_is_inference_error() {
    let dir = tempfile::tempdir().unwrap();
    let bogus = dir.path().join("bogus.png");
    std::fs::write(&bogus, b"definitely not a png").unwrap();

    let err = DetectionPipeline::new(dir.path())
        .detect(&bogus, &fake(), 0.5, &DetectOptions::default())
        .unwrap_err();
    assert!(matches!(err, VisionError::Inference(_)));
}

#[test]
fn test_render_colors_follow_detection_index() {
    let image = image::DynamicImage::ImageRgb8(image::RgbImage::new(120, 120));
    let detections: Vec<Detection> = (0..12)
        .map(|i| {
            let offset = (i * 9) as f32;
            Detection::from_raw(raw("thing", 0.9, [offset, 60.0, offset + 8.0, 110.0]))
        })
        .collect();

    let first = render(&image, &detections, false);
    let second = render(&image, &detections, false);
    assert_eq!(first.as_raw(), second.as_raw());

    // Bottom edge of each box carries its palette color
    for (i, det) in detections.iter().enumerate() {
        let [x1, _, _, y2] = det.bbox;
        let pixel = first.get_pixel(x1 as u32 + 1, y2 as u32);
        assert_eq!(*pixel, palette_color(i));
        assert_eq!(*pixel, PALETTE[i % PALETTE.len()]);
    }
}
