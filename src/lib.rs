// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
pub mod assistant;
pub mod camera;
pub mod cli;
pub mod config;
pub mod search;
pub mod tools;
pub mod vision;

// Re-export the operation surface
pub use assistant::Assistant;
pub use config::AssistantConfig;
pub use tools::{
    CapabilityRegistry, InvocationRecord, InvocationStatus, SessionContext, Tool, ToolCallOutcome,
    ToolDescriptor, ToolError, TurnContext,
};
pub use vision::{
    DetectOptions, Detection, DetectionResult, LocalModelRegistry, ModelDescriptor, VisionError,
};
