// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Audit decorator for tools
//!
//! `wrap` returns a tool with the same name, description and signature. Each
//! call appends exactly one `InvocationRecord` to the turn, whether the inner
//! tool returns `Ok`, returns `Err`, panics or is cancelled by dropping the
//! call future. Errors and panics are passed on unchanged after recording.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use futures::FutureExt;
use serde_json::Value;
use std::panic::AssertUnwindSafe;
use std::sync::Arc;
use std::time::Instant;
use tracing::{info, warn};

use super::context::{InvocationRecord, InvocationStatus, TurnContext};
use super::errors::ToolError;
use super::types::Tool;

/// A tool whose calls are recorded in the turn context
#[derive(Clone)]
pub struct InterceptedTool {
    inner: Arc<dyn Tool>,
}

impl std::fmt::Debug for InterceptedTool {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("InterceptedTool")
            .field("name", &self.inner.name())
            .finish()
    }
}

pub fn wrap(tool: Arc<dyn Tool>) -> InterceptedTool {
    InterceptedTool { inner: tool }
}

impl InterceptedTool {
    pub fn inner(&self) -> &Arc<dyn Tool> {
        &self.inner
    }
}

#[async_trait]
impl Tool for InterceptedTool {
    fn name(&self) -> &str {
        self.inner.name()
    }

    fn description(&self) -> &str {
        self.inner.description()
    }

    async fn execute(&self, ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let pending = PendingRecord::start(ctx, self.name(), input);

        let outcome = AssertUnwindSafe(self.inner.execute(ctx, input))
            .catch_unwind()
            .await;

        let (output, status) = match &outcome {
            Ok(Ok(output)) => (output.clone(), InvocationStatus::Completed),
            Ok(Err(e)) => (e.to_string(), InvocationStatus::Failed),
            Err(panic) => (
                format!("{} panicked: {}", self.name(), panic_message(panic.as_ref())),
                InvocationStatus::Failed,
            ),
        };
        pending.finish(output, status);

        match outcome {
            Ok(result) => result,
            Err(panic) => std::panic::resume_unwind(panic),
        }
    }
}

/// Output recorded when the caller drops a call before it finishes
pub const CANCELLED_OUTPUT: &str = "cancelled";

/// Record of a call in flight
///
/// `finish` appends the outcome. Dropping it unfinished appends a failed
/// `cancelled` record instead.
struct PendingRecord<'a> {
    ctx: &'a TurnContext,
    tool: String,
    input: Option<Value>,
    started_at: DateTime<Utc>,
    timer: Instant,
}

impl<'a> PendingRecord<'a> {
    fn start(ctx: &'a TurnContext, tool: &str, input: &Value) -> Self {
        Self {
            ctx,
            tool: tool.to_string(),
            input: Some(input.clone()),
            started_at: Utc::now(),
            timer: Instant::now(),
        }
    }

    fn finish(mut self, output: String, status: InvocationStatus) {
        self.append(output, status);
    }

    fn append(&mut self, output: String, status: InvocationStatus) {
        let Some(input) = self.input.take() else {
            return;
        };

        let duration_ms = self.timer.elapsed().as_millis() as u64;
        match status {
            InvocationStatus::Completed => {
                info!("🔧 Tool {} completed in {}ms", self.tool, duration_ms)
            }
            InvocationStatus::Failed => {
                warn!("🔧 Tool {} failed in {}ms: {}", self.tool, duration_ms, output)
            }
        }

        self.ctx.append(InvocationRecord {
            tool: self.tool.clone(),
            input,
            output,
            status,
            started_at: self.started_at,
            duration_ms,
        });
    }
}

impl Drop for PendingRecord<'_> {
    fn drop(&mut self) {
        self.append(CANCELLED_OUTPUT.to_string(), InvocationStatus::Failed);
    }
}

fn panic_message(payload: &(dyn std::any::Any + Send)) -> String {
    if let Some(s) = payload.downcast_ref::<&str>() {
        s.to_string()
    } else if let Some(s) = payload.downcast_ref::<String>() {
        s.clone()
    } else {
        "unknown panic".to_string()
    }
}
