// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use desk_assistant::camera::NoCamera;
use desk_assistant::{Assistant, AssistantConfig, DetectOptions, InvocationStatus, VisionError};
use serde_json::json;
use std::path::Path;
use std::sync::Arc;

use crate::common::{sample_detections, touch, write_png, CannedSearch, FakeLoader};

fn config(root: &Path) -> AssistantConfig {
    AssistantConfig {
        models_dir: root.join("models"),
        artifact_dir: root.join("artifacts"),
        ..Default::default()
    }
}

fn assistant(root: &Path) -> Assistant {
    Assistant::new(
        config(root),
        Arc::new(FakeLoader::new(sample_detections())),
        Box::new(NoCamera),
        Arc::new(CannedSearch),
    )
    .unwrap()
}

#[tokio::test]
async fn test_tools_listed_in_registration_order() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant(dir.path());

    let names: Vec<String> = assistant.list_tools().into_iter().map(|t| t.name).collect();
    assert_eq!(
        names,
        vec![
            "image_analysis",
            "video_analysis",
            "model_info",
            "model_list",
            "model_reload",
            "camera_photo",
            "camera_record",
            "camera_stop_record",
            "camera_info",
            "camera_close",
            "camera_detect",
            "file_operation",
            "system_command",
            "web_search",
        ]
    );
    assert!(assistant.list_tools().iter().all(|t| !t.description.is_empty()));
}

#[tokio::test]
async fn test_missing_image_leaves_one_failed_record() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("models/yolov8n.onnx"));
    let assistant = assistant(dir.path());
    let turn = assistant.begin_turn("s1");

    let outcome = assistant
        .call_tool(
            &turn,
            "image_analysis",
            &json!({"image_path": dir.path().join("missing.jpg")}),
        )
        .await;

    assert_eq!(outcome.status, InvocationStatus::Failed);
    assert!(outcome.output.contains("Image not found"));

    let history = assistant.tool_call_history(&turn);
    assert_eq!(history.len(), 1);
    assert_eq!(history[0].tool, "image_analysis");
    assert_eq!(history[0].status, InvocationStatus::Failed);
    assert!(!dir.path().join("artifacts").exists());
}

#[tokio::test]
async fn test_image_analysis_report() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("models/yolov8n.onnx"));
    let image = dir.path().join("pets.png");
    write_png(&image, 200, 160);
    let assistant = assistant(dir.path());
    let turn = assistant.begin_turn("s1");

    let outcome = assistant
        .call_tool(
            &turn,
            "image_analysis",
            &json!({"path": image, "draw_boxes": true}),
        )
        .await;

    assert_eq!(outcome.status, InvocationStatus::Completed, "{}", outcome.output);
    assert!(outcome.output.contains("Objects detected: 2"));
    assert!(outcome.output.contains("1 cat, 1 dog"));
    assert!(outcome.output.contains("dog (86.75%) at [10, 5, 100, 80]"));
    assert!(outcome.output.contains("Annotated image:"));
    assert!(outcome.output.contains("draw_boxes=true"));
}

#[tokio::test]
async fn test_video_analysis_samples_every_nth_frame() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("models/yolov8n.onnx"));
    let frames = dir.path().join("clip");
    for i in 0..5 {
        write_png(&frames.join(format!("frame_{:05}.png", i)), 200, 160);
    }
    std::fs::write(frames.join("notes.txt"), "not a frame").unwrap();
    let assistant = assistant(dir.path());
    let turn = assistant.begin_turn("s1");

    let outcome = assistant
        .call_tool(
            &turn,
            "video_analysis",
            &json!({"frames_dir": frames, "frame_interval": 2}),
        )
        .await;

    assert_eq!(outcome.status, InvocationStatus::Completed, "{}", outcome.output);
    assert!(outcome.output.contains("Frames analyzed: 3"));
    assert!(outcome.output.contains("Total detections: 6"));
    assert!(outcome.output.contains("Frame 0 (~0.0s): 2 objects"));
    assert!(outcome.output.contains("Frame 4 (~0.1s): 2 objects"));
    assert!(!outcome.output.contains("Frame 1 "));
    assert!(outcome.output.contains("- dog (86.75%)"));

    let annotated = std::fs::read_dir(dir.path().join("artifacts"))
        .unwrap()
        .filter_map(|e| e.ok())
        .filter(|e| e.file_name().to_string_lossy().starts_with("detection_result_"))
        .count();
    assert_eq!(annotated, 3);
}

#[tokio::test]
async fn test_video_analysis_rejects_bad_input() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant(dir.path());
    let turn = assistant.begin_turn("s1");
    let frames = dir.path().join("clip");
    write_png(&frames.join("frame_00000.png"), 32, 32);

    let zero = assistant
        .call_tool(&turn, "video_analysis", &json!({"frames_dir": frames, "frame_interval": 0}))
        .await;
    assert_eq!(zero.status, InvocationStatus::Failed);

    let missing = assistant
        .call_tool(&turn, "video_analysis", &json!({"frames_dir": dir.path().join("nope")}))
        .await;
    assert_eq!(missing.status, InvocationStatus::Failed);
    assert!(missing.output.contains("frames directory not found"));

    // No model files at all
    let unavailable = assistant
        .call_tool(&turn, "video_analysis", &json!({"frames_dir": frames}))
        .await;
    assert_eq!(unavailable.status, InvocationStatus::Failed);
    assert!(unavailable.output.contains("Model unavailable"));

    assert_eq!(assistant.tool_call_history(&turn).len(), 3);
}

#[tokio::test]
async fn test_detect_objects_and_model_operations() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant(dir.path());
    let image = dir.path().join("pets.png");
    write_png(&image, 200, 160);

    let err = assistant
        .detect_objects(&image, 0.5, None, DetectOptions::default())
        .await
        .unwrap_err();
    assert!(matches!(err, VisionError::ModelUnavailable { id: None }));
    assert_eq!(assistant.model_info().total_loaded, 0);

    touch(&dir.path().join("models/yolov8m.onnx"));
    let report = assistant.reload_models().await;
    assert!(report.success);
    assert_eq!(report.loaded_models, vec!["yolov8m"]);

    let result = assistant
        .detect_objects(&image, 0.5, None, DetectOptions::default())
        .await
        .unwrap();
    assert_eq!(result.model_id, "yolov8m");
    assert_eq!(result.total_objects, 2);

    let listed = assistant.list_models();
    assert_eq!(listed.iter().filter(|m| m.loaded).count(), 1);
}

#[tokio::test]
async fn test_model_tools_output() {
    let dir = tempfile::tempdir().unwrap();
    touch(&dir.path().join("models/yolov8s.onnx"));
    let assistant = assistant(dir.path());
    let turn = assistant.begin_turn("s1");

    let info = assistant.call_tool(&turn, "model_info", &json!({})).await;
    assert!(info.output.contains("Device: cpu"));
    assert!(info.output.contains("YOLOv8 Small"));

    let list = assistant.call_tool(&turn, "model_list", &json!({})).await;
    assert!(list.output.contains("Local models (5)"));
    assert!(list.output.contains("✅ YOLOv8 Small (yolov8s)"));
    assert!(list.output.contains("❌ YOLOv8 Nano (yolov8n)"));

    let reload = assistant.call_tool(&turn, "model_reload", &json!({})).await;
    assert_eq!(reload.status, InvocationStatus::Completed);
    assert!(reload.output.contains("Loaded 1 models"));

    assert_eq!(assistant.tool_call_history(&turn).len(), 3);
}

#[tokio::test]
async fn test_web_search_tool() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant(dir.path());
    let turn = assistant.begin_turn("s1");

    let outcome = assistant
        .call_tool(&turn, "web_search", &json!({"query": "rust", "max_results": 2}))
        .await;
    assert_eq!(outcome.status, InvocationStatus::Completed);
    assert!(outcome.output.contains("rust result 2"));
    assert!(!outcome.output.contains("rust result 3"));
}

#[tokio::test]
async fn test_begin_turn_starts_empty_and_reuses_session() {
    let dir = tempfile::tempdir().unwrap();
    let assistant = assistant(dir.path());

    let first = assistant.begin_turn("s1");
    assistant.call_tool(&first, "model_info", &json!({})).await;
    assert_eq!(first.len(), 1);

    let second = assistant.begin_turn("s1");
    assert!(second.is_empty());
    assert_eq!(second.session().id(), "s1");
    assert!(Arc::ptr_eq(&assistant.session("s1"), &assistant.session("s1")));
    assert!(!Arc::ptr_eq(&assistant.session("s1"), &assistant.session("s2")));
}

#[test]
fn test_invalid_config_is_rejected() {
    let dir = tempfile::tempdir().unwrap();
    let mut config = config(dir.path());
    config.tier_priority.clear();

    let result = Assistant::new(
        config,
        Arc::new(FakeLoader::default()),
        Box::new(NoCamera),
        Arc::new(CannedSearch),
    );
    assert!(result.is_err());
}
