// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Ordered registry of intercepted tools

use chrono::Utc;
use serde_json::Value;
use std::sync::Arc;
use tracing::{debug, warn};

use super::context::{InvocationRecord, InvocationStatus, TurnContext};
use super::errors::ToolError;
use super::interceptor::{wrap, InterceptedTool};
use super::types::{Tool, ToolCallOutcome, ToolDescriptor};

/// Tools in registration order; every call goes through the interceptor
#[derive(Debug, Default)]
pub struct CapabilityRegistry {
    tools: Vec<InterceptedTool>,
}

impl CapabilityRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a tool; names must be unique
    pub fn register(&mut self, tool: Arc<dyn Tool>) -> Result<(), ToolError> {
        if self.get(tool.name()).is_some() {
            return Err(ToolError::DuplicateTool(tool.name().to_string()));
        }
        debug!("Registered tool {}", tool.name());
        self.tools.push(wrap(tool));
        Ok(())
    }

    pub fn list_tools(&self) -> Vec<ToolDescriptor> {
        self.tools
            .iter()
            .map(|t| ToolDescriptor {
                name: t.name().to_string(),
                description: t.description().to_string(),
            })
            .collect()
    }

    pub fn get(&self, name: &str) -> Option<&InterceptedTool> {
        self.tools.iter().find(|t| t.name() == name)
    }

    pub fn len(&self) -> usize {
        self.tools.len()
    }

    pub fn is_empty(&self) -> bool {
        self.tools.is_empty()
    }

    /// Run a tool and return its result; unknown names are recorded as
    /// failed calls
    pub async fn invoke(
        &self,
        ctx: &TurnContext,
        name: &str,
        input: &Value,
    ) -> Result<String, ToolError> {
        match self.get(name) {
            Some(tool) => tool.execute(ctx, input).await,
            None => {
                let err = ToolError::UnknownTool(name.to_string());
                warn!("🔧 {}", err);
                ctx.append(InvocationRecord {
                    tool: name.to_string(),
                    input: input.clone(),
                    output: err.to_string(),
                    status: InvocationStatus::Failed,
                    started_at: Utc::now(),
                    duration_ms: 0,
                });
                Err(err)
            }
        }
    }

    /// Run a tool and fold the result into `{output, status}`
    pub async fn call_tool(&self, ctx: &TurnContext, name: &str, input: &Value) -> ToolCallOutcome {
        match self.invoke(ctx, name, input).await {
            Ok(output) => ToolCallOutcome {
                output,
                status: InvocationStatus::Completed,
            },
            Err(e) => ToolCallOutcome {
                output: format!("❌ {}", e),
                status: InvocationStatus::Failed,
            },
        }
    }
}
