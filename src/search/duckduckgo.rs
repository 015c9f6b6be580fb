// Copyright (c) 2025 Fabstir
// SPDX-License-Identifier: BUSL-1.1
//! DuckDuckGo HTML results page
//!
//! Queries are POSTed to the no-script endpoint and hits are read back out of
//! the returned markup.

use async_trait::async_trait;
use reqwest::Client;
use scraper::{ElementRef, Html, Selector};
use std::time::Duration;
use tracing::debug;
use url::Url;

use super::{SearchError, SearchProvider, SearchResult};

const DDG_HTML_URL: &str = "https://html.duckduckgo.com/html/";
const USER_AGENT: &str = "Mozilla/5.0 (Windows NT 10.0; Win64; x64) AppleWebKit/537.36 (KHTML, like Gecko) Chrome/120.0.0.0 Safari/537.36";

pub struct DuckDuckGoProvider {
    client: Client,
}

impl DuckDuckGoProvider {
    pub fn new(timeout_ms: u64) -> Result<Self, SearchError> {
        // The HTML endpoint refuses unknown agents
        let client = Client::builder()
            .timeout(Duration::from_millis(timeout_ms))
            .user_agent(USER_AGENT)
            .build()
            .map_err(|e| SearchError::Request(e.to_string()))?;

        Ok(Self { client })
    }
}

#[async_trait]
impl SearchProvider for DuckDuckGoProvider {
    async fn search(
        &self,
        query: &str,
        num_results: usize,
    ) -> Result<Vec<SearchResult>, SearchError> {
        if query.trim().is_empty() {
            return Err(SearchError::InvalidQuery("query is empty".to_string()));
        }

        let response = self
            .client
            .post(DDG_HTML_URL)
            .form(&[("q", query)])
            .send()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let status = response.status();
        if !status.is_success() {
            return Err(SearchError::Status(status.as_u16()));
        }

        let html = response
            .text()
            .await
            .map_err(|e| SearchError::Request(e.to_string()))?;

        let results = parse_ddg_html(&html, num_results);
        debug!("DuckDuckGo returned {} results for {:?}", results.len(), query);

        Ok(results)
    }
}

/// Extract results from a DuckDuckGo HTML page
///
/// Results live in `div.result` blocks with an `a.result__a` title link and
/// an optional `.result__snippet`.
pub fn parse_ddg_html(html: &str, max_results: usize) -> Vec<SearchResult> {
    let (Ok(block_sel), Ok(link_sel), Ok(snippet_sel)) = (
        Selector::parse("div.result"),
        Selector::parse("a.result__a"),
        Selector::parse(".result__snippet"),
    ) else {
        return Vec::new();
    };

    let document = Html::parse_document(html);

    document
        .select(&block_sel)
        .filter_map(|block| {
            let link = block.select(&link_sel).next()?;
            let url = link.value().attr("href").and_then(extract_ddg_url)?;
            let title = element_text(&link);
            if title.is_empty() {
                return None;
            }
            let snippet = block
                .select(&snippet_sel)
                .next()
                .map(|s| element_text(&s))
                .unwrap_or_default();

            Some(SearchResult {
                title,
                url,
                snippet,
            })
        })
        .take(max_results)
        .collect()
}

fn element_text(element: &ElementRef) -> String {
    element
        .text()
        .collect::<Vec<_>>()
        .join("")
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
}

/// Extract the target URL from DuckDuckGo's redirect link
fn extract_ddg_url(href: &str) -> Option<String> {
    // Redirects look like: //duckduckgo.com/l/?uddg=https%3A%2F%2Fexample.com&...
    let absolute = if href.starts_with("//") {
        format!("https:{}", href)
    } else {
        href.to_string()
    };

    let parsed = Url::parse(&absolute).ok()?;
    if let Some((_, target)) = parsed.query_pairs().find(|(k, _)| k == "uddg") {
        return Some(target.into_owned());
    }

    matches!(parsed.scheme(), "http" | "https").then(|| parsed.to_string())
}
