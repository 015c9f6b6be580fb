// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Tool trait and typed input parsing

use async_trait::async_trait;
use serde::de::DeserializeOwned;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};

use super::context::{InvocationStatus, TurnContext};
use super::errors::ToolError;

/// A capability the planner can invoke by name
#[async_trait]
pub trait Tool: Send + Sync {
    fn name(&self) -> &str;

    fn description(&self) -> &str;

    /// Run the tool with a key/value input mapping
    async fn execute(&self, ctx: &TurnContext, input: &Value) -> Result<String, ToolError>;
}

/// Name and description as listed to the planner
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ToolDescriptor {
    pub name: String,
    pub description: String,
}

/// What `call_tool` hands back to the orchestrator
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ToolCallOutcome {
    pub output: String,
    pub status: InvocationStatus,
}

/// Accepted key names for one canonical input field
///
/// When several keys are present the first one in `keys` wins.
#[derive(Debug, Clone, Copy)]
pub struct FieldAlias {
    pub field: &'static str,
    pub keys: &'static [&'static str],
}

/// Normalize a raw tool input into a JSON object
///
/// `null` becomes an empty mapping; any other non-object value is rejected.
pub fn input_object(tool: &str, input: &Value) -> Result<Map<String, Value>, ToolError> {
    match input {
        Value::Object(map) => Ok(map.clone()),
        Value::Null => Ok(Map::new()),
        other => Err(ToolError::invalid_input(
            tool,
            format!("expected an object, got {}", json_kind(other)),
        )),
    }
}

/// Resolve aliases, then deserialize the input into `T`
pub fn parse_input<T: DeserializeOwned>(
    tool: &str,
    input: &Value,
    aliases: &[FieldAlias],
) -> Result<T, ToolError> {
    let mut map = input_object(tool, input)?;

    for alias in aliases {
        let chosen = alias
            .keys
            .iter()
            .find_map(|key| map.get(*key).filter(|v| !v.is_null()).cloned());
        for key in alias.keys {
            map.remove(*key);
        }
        if let Some(value) = chosen {
            map.insert(alias.field.to_string(), value);
        }
    }

    serde_json::from_value(Value::Object(map))
        .map_err(|e| ToolError::invalid_input(tool, e.to_string()))
}

fn json_kind(value: &Value) -> &'static str {
    match value {
        Value::Null => "null",
        Value::Bool(_) => "a boolean",
        Value::Number(_) => "a number",
        Value::String(_) => "a string",
        Value::Array(_) => "an array",
        Value::Object(_) => "an object",
    }
}
