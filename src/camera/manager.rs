// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Camera lifecycle: `Closed -> Open -> Recording -> Open -> Closed`
//!
//! Opening an open camera reuses it. A recording runs on a background task
//! that ends when its duration elapses or `stop_recording` is called; frames
//! are written as numbered PNGs into the recording directory.

use chrono::Local;
use serde::{Deserialize, Serialize};
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex as StdMutex, PoisonError};
use std::time::{Duration, Instant};
use tokio::sync::{oneshot, Mutex};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use super::device::{CameraDevice, CameraProperties};
use super::errors::CameraError;
use crate::vision::artifacts::timestamped_path;

type SharedDevice = Arc<StdMutex<Box<dyn CameraDevice>>>;

/// Observable camera state
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum CameraState {
    Closed,
    Open,
    Recording,
}

/// A saved still image
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoCapture {
    pub file_path: PathBuf,
    pub width: u32,
    pub height: u32,
    /// RFC 3339 local time
    pub timestamp: String,
}

/// Returned when a recording starts
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingStarted {
    pub output_path: PathBuf,
    pub duration_secs: u64,
    pub fps: u32,
    pub resolution: String,
}

/// Returned when a recording ends
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RecordingSummary {
    pub output_path: PathBuf,
    pub frames: u64,
    pub elapsed_ms: u64,
}

/// Device details for `camera_info`
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CameraInfo {
    pub properties: CameraProperties,
    pub is_recording: bool,
    pub available_cameras: Vec<u32>,
}

struct Recording {
    stop: oneshot::Sender<()>,
    task: JoinHandle<Result<RecordingSummary, CameraError>>,
}

struct Inner {
    device: SharedDevice,
    recording: Mutex<Option<Recording>>,
    photo_dir: PathBuf,
}

/// Owner of the camera device
#[derive(Clone)]
pub struct CameraManager {
    inner: Arc<Inner>,
}

impl std::fmt::Debug for CameraManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CameraManager")
            .field("photo_dir", &self.inner.photo_dir)
            .finish_non_exhaustive()
    }
}

impl CameraManager {
    /// Photos without an explicit path go to `photo_dir`
    pub fn new(device: Box<dyn CameraDevice>, photo_dir: impl Into<PathBuf>) -> Self {
        Self {
            inner: Arc::new(Inner {
                device: Arc::new(StdMutex::new(device)),
                recording: Mutex::new(None),
                photo_dir: photo_dir.into(),
            }),
        }
    }

    pub async fn state(&self) -> CameraState {
        if !self.is_open() {
            return CameraState::Closed;
        }
        if self.is_recording().await {
            CameraState::Recording
        } else {
            CameraState::Open
        }
    }

    fn is_open(&self) -> bool {
        lock_device(&self.inner.device).is_open()
    }

    async fn is_recording(&self) -> bool {
        self.inner
            .recording
            .lock()
            .await
            .as_ref()
            .map(|r| !r.task.is_finished())
            .unwrap_or(false)
    }

    /// Open camera `index`; an already open camera is reused
    pub fn open(&self, index: u32) -> Result<CameraProperties, CameraError> {
        let mut device = lock_device(&self.inner.device);
        if let Some(properties) = device.properties().filter(|_| device.is_open()) {
            return Ok(properties);
        }
        let properties = device.open(index)?;
        info!(
            "📷 Camera {} opened ({}x{} @ {}fps)",
            index, properties.width, properties.height, properties.fps
        );
        Ok(properties)
    }

    /// Capture one frame to `save_path` (or a timestamped file), opening the
    /// camera if needed
    pub async fn take_photo(&self, save_path: Option<PathBuf>) -> Result<PhotoCapture, CameraError> {
        self.open(0)?;

        let path = save_path
            .unwrap_or_else(|| timestamped_path(&self.inner.photo_dir, "photo", "png"));
        let device = Arc::clone(&self.inner.device);
        let target = path.clone();

        let (width, height) = tokio::task::spawn_blocking(move || capture_to(&device, &target))
            .await
            .map_err(|e| CameraError::Device(e.to_string()))??;

        info!("📸 Photo saved: {}", path.display());
        Ok(PhotoCapture {
            file_path: path,
            width,
            height,
            timestamp: Local::now().to_rfc3339(),
        })
    }

    /// Record frames into `output_dir` for `duration`
    pub async fn start_recording(
        &self,
        output_dir: Option<PathBuf>,
        duration: Duration,
    ) -> Result<RecordingStarted, CameraError> {
        let properties = self.open(0)?;

        let mut recording = self.inner.recording.lock().await;
        if recording.as_ref().map(|r| !r.task.is_finished()).unwrap_or(false) {
            return Err(CameraError::AlreadyRecording);
        }

        let output_dir = output_dir
            .unwrap_or_else(|| timestamped_path(&self.inner.photo_dir, "recording", "frames"));
        tokio::fs::create_dir_all(&output_dir)
            .await
            .map_err(|e| CameraError::Save {
                path: output_dir.display().to_string(),
                reason: e.to_string(),
            })?;

        let fps = properties.fps.max(1);
        let (stop_tx, stop_rx) = oneshot::channel();
        let task = tokio::spawn(record(
            Arc::clone(&self.inner.device),
            output_dir.clone(),
            duration,
            fps,
            stop_rx,
        ));

        *recording = Some(Recording {
            stop: stop_tx,
            task,
        });

        info!(
            "🎬 Recording started: {} for {}s",
            output_dir.display(),
            duration.as_secs()
        );

        Ok(RecordingStarted {
            output_path: output_dir,
            duration_secs: duration.as_secs(),
            fps,
            resolution: format!("{}x{}", properties.width, properties.height),
        })
    }

    /// Stop the active recording and wait for it to flush
    pub async fn stop_recording(&self) -> Result<RecordingSummary, CameraError> {
        let mut slot = self.inner.recording.lock().await;
        let recording = match slot.take() {
            Some(r) if !r.task.is_finished() => r,
            _ => return Err(CameraError::NotRecording),
        };
        drop(slot);

        // The task may finish on its own between the check and the send
        let _ = recording.stop.send(());
        let summary = recording
            .task
            .await
            .map_err(|e| CameraError::Device(e.to_string()))??;

        info!(
            "⏹️ Recording stopped: {} frames in {}",
            summary.frames,
            summary.output_path.display()
        );
        Ok(summary)
    }

    pub async fn info(&self) -> Result<CameraInfo, CameraError> {
        let (properties, available_cameras) = {
            let device = lock_device(&self.inner.device);
            let properties = device
                .properties()
                .filter(|_| device.is_open())
                .ok_or(CameraError::NotOpen)?;
            (properties, device.available())
        };

        Ok(CameraInfo {
            properties,
            is_recording: self.is_recording().await,
            available_cameras,
        })
    }

    /// Release the device, stopping an active recording first
    pub async fn close(&self) -> Result<(), CameraError> {
        if !self.is_open() {
            return Err(CameraError::NotOpen);
        }

        match self.stop_recording().await {
            Ok(_) | Err(CameraError::NotRecording) => {}
            Err(e) => warn!("Recording did not stop cleanly: {}", e),
        }

        lock_device(&self.inner.device).release();
        info!("📷 Camera closed");
        Ok(())
    }

    /// Close the camera after `delay` on a background task
    pub fn close_after(&self, delay: Duration) {
        let manager = self.clone();
        tokio::spawn(async move {
            tokio::time::sleep(delay).await;
            match manager.close().await {
                Ok(()) | Err(CameraError::NotOpen) => {}
                Err(e) => warn!("Scheduled camera close failed: {}", e),
            }
        });
        info!("📷 Camera will close in {}s", delay.as_secs());
    }
}

fn lock_device(device: &SharedDevice) -> std::sync::MutexGuard<'_, Box<dyn CameraDevice>> {
    device.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Read one frame and write it as an image
fn capture_to(device: &SharedDevice, path: &Path) -> Result<(u32, u32), CameraError> {
    let frame = lock_device(device).read_frame()?;

    let save_err = |reason: String| CameraError::Save {
        path: path.display().to_string(),
        reason,
    };
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            std::fs::create_dir_all(parent).map_err(|e| save_err(e.to_string()))?;
        }
    }
    frame.save(path).map_err(|e| save_err(e.to_string()))?;

    Ok(frame.dimensions())
}

async fn record(
    device: SharedDevice,
    output_dir: PathBuf,
    duration: Duration,
    fps: u32,
    mut stop: oneshot::Receiver<()>,
) -> Result<RecordingSummary, CameraError> {
    let started = Instant::now();
    let deadline = tokio::time::sleep(duration);
    tokio::pin!(deadline);
    let mut ticker = tokio::time::interval(Duration::from_secs_f64(1.0 / fps as f64));
    let mut frames = 0u64;

    loop {
        tokio::select! {
            _ = &mut stop => break,
            _ = &mut deadline => break,
            _ = ticker.tick() => {
                let device = Arc::clone(&device);
                let path = output_dir.join(format!("frame_{:05}.png", frames));
                let saved = tokio::task::spawn_blocking(move || capture_to(&device, &path))
                    .await
                    .map_err(|e| CameraError::Device(e.to_string()))?;
                match saved {
                    Ok(_) => frames += 1,
                    Err(e) => {
                        warn!("Recording ended early: {}", e);
                        break;
                    }
                }
            }
        }
    }

    info!("🎬 Recording finished: {} frames", frames);
    Ok(RecordingSummary {
        output_path: output_dir,
        frames,
        elapsed_ms: started.elapsed().as_millis() as u64,
    })
}
