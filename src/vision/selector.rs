// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Backend selection
//!
//! Resolution is a pure lookup over the loaded-backend cache: it never loads
//! anything. An explicit model id must name an available descriptor with a
//! loaded backend. Without one, the declared tier list is walked in order and
//! the generic fallback backend is used last.

use std::collections::HashMap;

use super::backend::LoadedBackend;
use super::catalog::BUILTIN_MODEL_IDS;
use super::errors::VisionError;
use super::scanner::AvailabilityMap;

/// Cache key of the generic fallback backend
pub const FALLBACK_BACKEND_ID: &str = "object_detection";

/// Ordered tier ids plus the designated fallback
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TierPolicy {
    tiers: Vec<String>,
    fallback: String,
}

impl TierPolicy {
    pub fn new(tiers: Vec<String>) -> Self {
        Self {
            tiers,
            fallback: FALLBACK_BACKEND_ID.to_string(),
        }
    }

    pub fn with_fallback(mut self, fallback: impl Into<String>) -> Self {
        self.fallback = fallback.into();
        self
    }

    pub fn tiers(&self) -> &[String] {
        &self.tiers
    }

    pub fn fallback(&self) -> &str {
        &self.fallback
    }

    pub fn is_tier(&self, id: &str) -> bool {
        self.tiers.iter().any(|t| t == id)
    }
}

impl Default for TierPolicy {
    fn default() -> Self {
        Self::new(BUILTIN_MODEL_IDS.iter().map(|s| s.to_string()).collect())
    }
}

/// Read-only view used to resolve a backend
pub struct BackendSelector<'a> {
    backends: &'a HashMap<String, LoadedBackend>,
    availability: &'a AvailabilityMap,
    policy: &'a TierPolicy,
}

impl<'a> BackendSelector<'a> {
    pub fn new(
        backends: &'a HashMap<String, LoadedBackend>,
        availability: &'a AvailabilityMap,
        policy: &'a TierPolicy,
    ) -> Self {
        Self {
            backends,
            availability,
            policy,
        }
    }

    pub fn resolve(&self, explicit_id: Option<&str>) -> Result<LoadedBackend, VisionError> {
        if let Some(id) = explicit_id {
            let available = self
                .availability
                .get(id)
                .map(|m| m.is_available())
                .unwrap_or(false);
            return match self.backends.get(id) {
                Some(loaded) if available => Ok(loaded.clone()),
                _ => Err(VisionError::unavailable(id)),
            };
        }

        self.policy
            .tiers()
            .iter()
            .chain(std::iter::once(&self.policy.fallback))
            .find_map(|id| self.backends.get(id))
            .cloned()
            .ok_or(VisionError::ModelUnavailable { id: None })
    }
}
