// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::fmt::Write as _;
use std::sync::Arc;

use super::context::TurnContext;
use super::errors::ToolError;
use super::types::{parse_input, FieldAlias, Tool};
use crate::search::{SearchError, SearchProvider, SearchResult};

fn default_max_results() -> usize {
    5
}

#[derive(Debug, Deserialize)]
struct SearchInput {
    query: String,
    #[serde(default = "default_max_results")]
    max_results: usize,
}

const QUERY_ALIASES: &[FieldAlias] = &[FieldAlias {
    field: "query",
    keys: &["query", "q"],
}];

/// Web search through a `SearchProvider`
pub struct WebSearchTool {
    provider: Arc<dyn SearchProvider>,
}

impl WebSearchTool {
    pub fn new(provider: Arc<dyn SearchProvider>) -> Self {
        Self { provider }
    }
}

/// Numbered hit list shown to the user
pub fn format_results(query: &str, results: &[SearchResult]) -> String {
    if results.is_empty() {
        return format!("🔍 No results for \"{}\"", query);
    }

    let mut out = format!("🔍 {} results for \"{}\":\n", results.len(), query);
    for (i, result) in results.iter().enumerate() {
        let _ = write!(out, "\n{}. {}\n   {}", i + 1, result.title, result.url);
        if !result.snippet.is_empty() {
            let _ = write!(out, "\n   {}", result.snippet);
        }
        out.push('\n');
    }
    out
}

#[async_trait]
impl Tool for WebSearchTool {
    fn name(&self) -> &str {
        "web_search"
    }

    fn description(&self) -> &str {
        "Search the web. Input: query, optional max_results (default 5)"
    }

    async fn execute(&self, _ctx: &TurnContext, input: &Value) -> Result<String, ToolError> {
        let input: SearchInput = parse_input(self.name(), input, QUERY_ALIASES)?;

        let results = self
            .provider
            .search(&input.query, input.max_results.max(1))
            .await
            .map_err(|e| match e {
                SearchError::InvalidQuery(reason) => ToolError::invalid_input(self.name(), reason),
                other => ToolError::execution(self.name(), other.to_string()),
            })?;

        Ok(format_results(&input.query, &results))
    }
}
