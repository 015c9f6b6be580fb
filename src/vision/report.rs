// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Human-readable detection reports and persisted result records

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt::Write as _;
use std::fs;
use std::path::{Path, PathBuf};
use tracing::info;

use super::artifacts::timestamped_path;
use super::detection::DetectionResult;
use super::errors::VisionError;

/// Persisted record of one detection call
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DetectionArtifact {
    /// RFC 3339 local time
    pub timestamp: String,
    pub image_path: PathBuf,
    pub detection_result: DetectionResult,
    pub report: String,
}

/// Per-class counts, e.g. "2 person, 1 dog"
///
/// Classes are listed by descending count, then name.
pub fn summarize_objects(result: &DetectionResult) -> String {
    let mut counts: BTreeMap<&str, usize> = BTreeMap::new();
    for detection in &result.detections {
        *counts.entry(detection.class_name.as_str()).or_default() += 1;
    }

    let mut counts: Vec<_> = counts.into_iter().collect();
    counts.sort_by(|a, b| b.1.cmp(&a.1).then(a.0.cmp(b.0)));

    counts
        .iter()
        .map(|(class, n)| format!("{} {}", n, class))
        .collect::<Vec<_>>()
        .join(", ")
}

/// Model, threshold, object count, annotated path and one line per detection
pub fn detection_section(result: &DetectionResult) -> String {
    let mut report = String::new();
    let _ = writeln!(report, "🎯 Detection results:");
    let _ = writeln!(report, "  • Model: {}", result.model_used);
    let _ = writeln!(
        report,
        "  • Confidence threshold: {}",
        result.confidence_threshold
    );
    let _ = writeln!(report, "  • Objects detected: {}", result.total_objects);
    if let Some(path) = &result.annotated_image_path {
        let _ = writeln!(report, "  • Annotated image: {}", path.display());
    }
    report.push('\n');

    if result.detections.is_empty() {
        report.push_str("📋 No objects detected\n");
        return report;
    }

    let _ = writeln!(report, "📋 Details ({}):", summarize_objects(result));
    for (i, det) in result.detections.iter().enumerate() {
        let [x1, y1, x2, y2] = det.bbox;
        let _ = write!(
            report,
            "  {}. {} ({}%) at [{}, {}, {}, {}]",
            i + 1,
            det.class_name,
            det.confidence,
            x1,
            y1,
            x2,
            y2
        );
        if let Some(area) = det.mask_area() {
            let _ = write!(report, ", mask area {} px", area);
        }
        report.push('\n');
    }

    report
}

/// Report for a detection run on an existing image file
pub fn analysis_report(image_path: &Path, result: &DetectionResult) -> String {
    format!(
        "🔍 Image analysis complete\n\n📷 Image: {}\n\n{}",
        image_path.display(),
        detection_section(result)
    )
}

/// Write `{timestamp, imagePath, detectionResult, report}` as
/// `detection_results_<ts>_<seq>.json` under `dir`
pub fn save_results(
    dir: &Path,
    image_path: &Path,
    result: &DetectionResult,
    report: &str,
) -> Result<PathBuf, VisionError> {
    let artifact = DetectionArtifact {
        timestamp: Local::now().to_rfc3339(),
        image_path: image_path.to_path_buf(),
        detection_result: result.clone(),
        report: report.to_string(),
    };

    let artifact_err = |path: &Path, reason: String| VisionError::Artifact {
        path: path.display().to_string(),
        reason,
    };

    fs::create_dir_all(dir).map_err(|e| artifact_err(dir, e.to_string()))?;
    let path = timestamped_path(dir, "detection_results", "json");
    let json =
        serde_json::to_string_pretty(&artifact).map_err(|e| artifact_err(&path, e.to_string()))?;
    fs::write(&path, json).map_err(|e| artifact_err(&path, e.to_string()))?;

    info!("💾 Detection results saved: {}", path.display());
    Ok(path)
}
