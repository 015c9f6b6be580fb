// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Assistant configuration from environment variables

use std::env;
use std::path::PathBuf;
use std::time::Duration;

use crate::vision::catalog::BUILTIN_MODEL_IDS;
use crate::vision::{RegistryConfig, TierPolicy};

/// Runtime configuration for the assistant core
#[derive(Debug, Clone, PartialEq)]
pub struct AssistantConfig {
    /// Root for model artifacts; the catalog lives at `<models_dir>/config.json`
    pub models_dir: PathBuf,
    /// Tier ids tried in order when no model is requested
    pub tier_priority: Vec<String>,
    /// Generic fallback detector, relative to `models_dir` unless absolute
    pub fallback_model: PathBuf,
    /// Annotated images, photos and result records
    pub artifact_dir: PathBuf,
    pub command_timeout_secs: u64,
    /// How long a shutdown confirmation stays valid
    pub confirmation_ttl_secs: u64,
    pub search_timeout_ms: u64,
    /// Directory of still images for the replay camera
    pub camera_replay_dir: Option<PathBuf>,
}

fn env_u64(key: &str, default: u64) -> u64 {
    env::var(key)
        .ok()
        .and_then(|v| v.trim().parse().ok())
        .unwrap_or(default)
}

fn default_tiers() -> Vec<String> {
    BUILTIN_MODEL_IDS.iter().map(|s| s.to_string()).collect()
}

fn parse_tiers(value: &str) -> Vec<String> {
    value
        .split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(str::to_string)
        .collect()
}

impl AssistantConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Self {
        let defaults = Self::default();
        Self {
            models_dir: env::var("MODELS_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.models_dir),
            tier_priority: env::var("VISION_TIER_PRIORITY")
                .map(|v| parse_tiers(&v))
                .unwrap_or(defaults.tier_priority),
            fallback_model: env::var("VISION_FALLBACK_MODEL")
                .map(PathBuf::from)
                .unwrap_or(defaults.fallback_model),
            artifact_dir: env::var("ARTIFACT_DIR")
                .map(PathBuf::from)
                .unwrap_or(defaults.artifact_dir),
            command_timeout_secs: env_u64("COMMAND_TIMEOUT_SECS", defaults.command_timeout_secs),
            confirmation_ttl_secs: env_u64(
                "CONFIRMATION_TTL_SECS",
                defaults.confirmation_ttl_secs,
            ),
            search_timeout_ms: env_u64("SEARCH_TIMEOUT_MS", defaults.search_timeout_ms),
            camera_replay_dir: env::var("CAMERA_REPLAY_DIR")
                .ok()
                .filter(|v| !v.trim().is_empty())
                .map(PathBuf::from),
        }
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<(), String> {
        if self.tier_priority.is_empty() {
            return Err("VISION_TIER_PRIORITY must name at least one model".to_string());
        }
        if self.command_timeout_secs == 0 {
            return Err("Command timeout must be greater than 0".to_string());
        }
        if self.confirmation_ttl_secs == 0 {
            return Err("Confirmation TTL must be greater than 0".to_string());
        }
        if self.search_timeout_ms == 0 {
            return Err("Search timeout must be greater than 0".to_string());
        }
        Ok(())
    }

    /// Fallback detector path resolved against `models_dir`
    pub fn fallback_model_path(&self) -> PathBuf {
        if self.fallback_model.is_absolute() {
            self.fallback_model.clone()
        } else {
            self.models_dir.join(&self.fallback_model)
        }
    }

    pub fn registry_config(&self) -> RegistryConfig {
        RegistryConfig {
            catalog_path: self.models_dir.join("config.json"),
            fallback_model: self.fallback_model_path(),
            tier_policy: TierPolicy::new(self.tier_priority.clone()),
            artifact_dir: self.artifact_dir.clone(),
            models_dir: self.models_dir.clone(),
        }
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    pub fn confirmation_ttl(&self) -> Duration {
        Duration::from_secs(self.confirmation_ttl_secs)
    }
}

impl Default for AssistantConfig {
    fn default() -> Self {
        Self {
            models_dir: PathBuf::from("models"),
            tier_priority: default_tiers(),
            fallback_model: PathBuf::from("yolov8n.onnx"),
            artifact_dir: PathBuf::from("artifacts"),
            command_timeout_secs: 60,
            confirmation_ttl_secs: 120,
            search_timeout_ms: 10_000,
            camera_replay_dir: None,
        }
    }
}
