// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Collision-free artifact file names

use chrono::Local;
use std::path::{Path, PathBuf};
use std::sync::atomic::{AtomicU64, Ordering};

static ARTIFACT_SEQ: AtomicU64 = AtomicU64::new(0);

/// `<dir>/<prefix>_<YYYYmmdd_HHMMSS>_<seq>.<ext>`
///
/// The sequence number is process-wide and strictly increasing, so two calls
/// within the same second never produce the same name.
pub fn timestamped_path(dir: &Path, prefix: &str, extension: &str) -> PathBuf {
    let seq = ARTIFACT_SEQ.fetch_add(1, Ordering::Relaxed);
    let timestamp = Local::now().format("%Y%m%d_%H%M%S");
    dir.join(format!("{}_{}_{:04}.{}", prefix, timestamp, seq, extension))
}
