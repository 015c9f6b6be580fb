// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::path::{Path, PathBuf};

use super::context::TurnContext;
use super::errors::ToolError;
use super::types::{parse_input, FieldAlias, Tool};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Deserialize)]
#[serde(rename_all = "lowercase")]
enum FileOperation {
    Read,
    Write,
    Create,
    Delete,
}

#[derive(Debug, Deserialize)]
struct FileOperationInput {
    operation: FileOperation,
    file_path: PathBuf,
    #[serde(default)]
    content: Option<String>,
}

const FILE_ALIASES: &[FieldAlias] = &[FieldAlias {
    field: "file_path",
    keys: &["file_path", "path"],
}];

/// Read, write, create or delete a UTF-8 text file
pub struct FileOperationTool;

impl FileOperationTool {
    fn fail(&self, path: &Path, e: impl std::fmt::Display) -> ToolError {
        ToolError::execution(self.name(), format!("{}: {}", path.display(), e))
    }

    async fn write_file(&self, path: &Path, content: Option<&str>) -> Result<(), ToolError> {
        if let Some(parent) = path.parent().filter(|p| !p.as_os_str().is_empty()) {
            tokio::fs::create_dir_all(parent)
                .await
                .map_err(|e| self.fail(parent, e))?;
        }
        tokio::fs::write(path, content.unwrap_or_default())
            .await
            .map_err(|e| self.fail(path, e))
    }
}

#[async_trait]
impl Tool for FileOperationTool {
    fn name(&self) -> &str {
        "file_operation"
    }

    fn description(&self) -> &str {
        "Read, write, create or delete a text file. Input: operation (read|write|create|delete), file_path, content"
    }

    async fn execute(&self, _ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let input: FileOperationInput = parse_input(self.name(), input, FILE_ALIASES)?;
        let path = input.file_path.as_path();

        match input.operation {
            FileOperation::Read => {
                if !path.is_file() {
                    return Err(self.fail(path, "file does not exist"));
                }
                let content = tokio::fs::read_to_string(path)
                    .await
                    .map_err(|e| self.fail(path, e))?;
                Ok(format!(
                    "✅ File read\n\n📄 Path: {}\n📝 Content:\n{}",
                    path.display(),
                    content
                ))
            }
            FileOperation::Write => {
                self.write_file(path, input.content.as_deref()).await?;
                Ok(format!("✅ File written\n\n📄 Path: {}", path.display()))
            }
            FileOperation::Create => {
                self.write_file(path, input.content.as_deref()).await?;
                Ok(format!("✅ File created\n\n📄 Path: {}", path.display()))
            }
            FileOperation::Delete => {
                if !path.is_file() {
                    return Err(self.fail(path, "file does not exist"));
                }
                tokio::fs::remove_file(path)
                    .await
                    .map_err(|e| self.fail(path, e))?;
                Ok(format!("✅ File deleted\n\n📄 Path: {}", path.display()))
            }
        }
    }
}
