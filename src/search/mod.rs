// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! Web lookups behind the `web_search` tool
//!
//! The tool only needs a list of hits for a query, so the boundary is a
//! single `search` call. `DuckDuckGoProvider` scrapes the keyless HTML page.

pub mod duckduckgo;

use async_trait::async_trait;
use thiserror::Error;

pub use duckduckgo::DuckDuckGoProvider;

/// One hit shown to the user
#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub title: String,
    pub url: String,
    /// Empty when the page had no summary line
    pub snippet: String,
}

#[derive(Debug, Error)]
pub enum SearchError {
    /// Rejected before any request was sent
    #[error("invalid query: {0}")]
    InvalidQuery(String),

    #[error("search request failed: {0}")]
    Request(String),

    #[error("search service answered with HTTP {0}")]
    Status(u16),
}

/// Source of web results for `web_search`
#[async_trait]
pub trait SearchProvider: Send + Sync {
    /// At most `num_results` hits for `query`, best first
    async fn search(&self, query: &str, num_results: usize)
        -> Result<Vec<SearchResult>, SearchError>;
}
