// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tools exposed to the conversational planner
//!
//! Every registered tool is wrapped by the interceptor, so each call leaves
//! exactly one `InvocationRecord` in the turn's `TurnContext`.

pub mod camera_tools;
pub mod context;
pub mod errors;
pub mod file_ops;
pub mod interceptor;
pub mod registry;
pub mod system;
pub mod types;
pub mod vision_tools;
pub mod web;

pub use camera_tools::{
    CameraCloseTool, CameraDetectTool, CameraInfoTool, CameraPhotoTool, CameraRecordTool,
    CameraStopRecordTool,
};
pub use context::{
    Confirmation, ConfirmationTokens, InvocationRecord, InvocationStatus, SessionContext,
    TurnContext,
};
pub use errors::ToolError;
pub use file_ops::FileOperationTool;
pub use interceptor::{wrap, InterceptedTool};
pub use registry::CapabilityRegistry;
pub use system::SystemCommandTool;
pub use types::{parse_input, FieldAlias, Tool, ToolCallOutcome, ToolDescriptor};
pub use vision_tools::{
    FrameAnalysisTool, ImageAnalysisTool, ModelInfoTool, ModelListTool, ModelReloadTool,
};
pub use web::WebSearchTool;
