// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use thiserror::Error;

use crate::camera::CameraError;
use crate::vision::VisionError;

/// Failure of a tool invocation
///
/// Every variant is recorded by the interceptor before it reaches the caller.
#[derive(Debug, Error)]
pub enum ToolError {
    #[error("{tool} failed: {message}")]
    Execution { tool: String, message: String },

    #[error("Invalid input for {tool}: {reason}")]
    InvalidInput { tool: String, reason: String },

    #[error("Unknown tool: {0}")]
    UnknownTool(String),

    #[error("Tool already registered: {0}")]
    DuplicateTool(String),

    #[error(transparent)]
    Vision(#[from] VisionError),

    #[error(transparent)]
    Camera(#[from] CameraError),

    #[error("{tool} timed out after {secs}s")]
    Timeout { tool: String, secs: u64 },
}

impl ToolError {
    pub fn execution(tool: &str, message: impl Into<String>) -> Self {
        Self::Execution {
            tool: tool.to_string(),
            message: message.into(),
        }
    }

    pub fn invalid_input(tool: &str, reason: impl Into<String>) -> Self {
        Self::InvalidInput {
            tool: tool.to_string(),
            reason: reason.into(),
        }
    }
}
