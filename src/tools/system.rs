// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Shell command execution with a denylist and shutdown confirmation

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::time::Duration;
use tokio::process::Command;
use tracing::{info, warn};

use super::context::{Confirmation, TurnContext};
use super::errors::ToolError;
use super::types::{parse_input, Tool};

/// Substrings that block a command outright (case-insensitive)
pub const DENYLIST: &[&str] = &["format", "del /s", "rm -rf", "taskkill /f"];

pub const DEFAULT_COMMAND_TIMEOUT: Duration = Duration::from_secs(60);
pub const SHUTDOWN_TIMEOUT: Duration = Duration::from_secs(10);

#[derive(Debug, Deserialize)]
struct CommandInput {
    command: String,
}

/// Runs one shell command per call
///
/// Commands mentioning `shutdown` run only when repeated within the session's
/// confirmation TTL.
pub struct SystemCommandTool {
    timeout: Duration,
    shutdown_timeout: Duration,
}

impl Default for SystemCommandTool {
    fn default() -> Self {
        Self::new(DEFAULT_COMMAND_TIMEOUT)
    }
}

impl SystemCommandTool {
    pub fn new(timeout: Duration) -> Self {
        Self {
            timeout,
            shutdown_timeout: SHUTDOWN_TIMEOUT.min(timeout),
        }
    }

    async fn run(&self, command: &str, timeout: Duration) -> Result<std::process::Output, ToolError> {
        let mut cmd = shell(command);
        cmd.kill_on_drop(true);

        match tokio::time::timeout(timeout, cmd.output()).await {
            Ok(output) => output.map_err(|e| ToolError::execution(self.name(), e.to_string())),
            Err(_) => {
                warn!("⏱️ Command timed out after {}s: {}", timeout.as_secs(), command);
                Err(ToolError::Timeout {
                    tool: self.name().to_string(),
                    secs: timeout.as_secs(),
                })
            }
        }
    }

    fn failure(&self, output: &std::process::Output) -> ToolError {
        let stderr = String::from_utf8_lossy(&output.stderr).trim().to_string();
        let message = if stderr.is_empty() {
            match output.status.code() {
                Some(code) => format!("exit code {}", code),
                None => "terminated by signal".to_string(),
            }
        } else {
            stderr
        };
        ToolError::execution(self.name(), message)
    }
}

pub fn is_denied(command: &str) -> bool {
    let lower = command.to_lowercase();
    DENYLIST.iter().any(|pattern| lower.contains(pattern))
}

fn shell(command: &str) -> Command {
    if cfg!(windows) {
        let mut cmd = Command::new("cmd");
        cmd.arg("/C").arg(command);
        cmd
    } else {
        let mut cmd = Command::new("sh");
        cmd.arg("-c").arg(command);
        cmd
    }
}

#[async_trait]
impl Tool for SystemCommandTool {
    fn name(&self) -> &str {
        "system_command"
    }

    fn description(&self) -> &str {
        "Run a shell command on the local system. Input: command"
    }

    async fn execute(&self, ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let CommandInput { command } = parse_input(self.name(), input, &[])?;
        let command = command.trim();
        if command.is_empty() {
            return Err(ToolError::invalid_input(self.name(), "command is empty"));
        }

        if command.to_lowercase().contains("shutdown") {
            return match ctx.session().confirm(command) {
                Confirmation::Issued { expires_in } => {
                    info!("⚠️ Shutdown requested, awaiting confirmation: {}", command);
                    Ok(format!(
                        "⚠️ About to run a shutdown command: {}\n\nSend the same command again within {}s to confirm.",
                        command,
                        expires_in.as_secs()
                    ))
                }
                Confirmation::Confirmed => {
                    info!("⚠️ Shutdown confirmed: {}", command);
                    let output = self.run(command, self.shutdown_timeout).await?;
                    if output.status.success() {
                        Ok(format!("✅ Shutdown command executed: {}", command))
                    } else {
                        Err(self.failure(&output))
                    }
                }
            };
        }

        if is_denied(command) {
            warn!("🚫 Blocked command: {}", command);
            return Err(ToolError::execution(
                self.name(),
                format!("blocked by safety policy: {}", command),
            ));
        }

        let output = self.run(command, self.timeout).await?;
        if !output.status.success() {
            return Err(self.failure(&output));
        }

        let stdout = String::from_utf8_lossy(&output.stdout).trim().to_string();
        if stdout.is_empty() {
            Ok(format!("✅ Command succeeded with no output: {}", command))
        } else {
            Ok(format!("✅ Command succeeded:\n\n{}", stdout))
        }
    }
}
