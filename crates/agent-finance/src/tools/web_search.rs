//! Web search tool backed by Tavily

use super::{names, parse_args};
use crate::api::TavilyClient;
use crate::config::FinanceConfig;
use crate::error::{FinanceError, Result};
use agent_core::ToolError;
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::time::Duration;

/// Tool searching the web for recent news and analysis
#[derive(Debug, Clone)]
pub struct WebSearchTool {
    client: TavilyClient,
    default_max_results: usize,
    ttl: Duration,
}

#[derive(Debug, Deserialize)]
struct WebSearchParams {
    query: String,
    #[serde(default)]
    max_results: Option<usize>,
}

impl WebSearchTool {
    pub fn new(client: TavilyClient, default_max_results: usize, ttl: Duration) -> Self {
        Self {
            client,
            default_max_results,
            ttl,
        }
    }

    /// Build the tool from configuration
    pub fn from_config(config: &FinanceConfig) -> Result<Self> {
        let client = TavilyClient::new(
            config.search.api_key.clone(),
            config.search.requests_per_minute,
            config.request_timeout(),
        )?
        .with_search_depth(config.search.search_depth.clone())
        .with_include_domains(config.search.include_domains.clone());

        Ok(Self::new(
            client,
            config.search.max_results as usize,
            config.tool_ttl(names::WEB_SEARCH),
        ))
    }

    async fn search(&self, params: WebSearchParams) -> Result<Value> {
        let query = params.query.trim();
        if query.is_empty() {
            return Err(FinanceError::InvalidArguments(
                "query must not be empty".to_string(),
            ));
        }
        let max_results = params
            .max_results
            .unwrap_or(self.default_max_results)
            .clamp(1, 20);

        let results = self.client.search(query, max_results).await?;

        Ok(json!({
            "query": query,
            "results": results,
        }))
    }
}

#[async_trait]
impl Tool for WebSearchTool {
    async fn call(&self, args: Value) -> std::result::Result<Value, ToolError> {
        let params: WebSearchParams = parse_args(self.name(), args)?;
        self.search(params)
            .await
            .map_err(|e| e.into_tool_error(names::WEB_SEARCH))
    }

    fn name(&self) -> &str {
        names::WEB_SEARCH
    }

    fn description(&self) -> &str {
        "Search the web for recent news, analysis and outlooks. \
         Returns titles, URLs and content snippets."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "query": {
                    "type": "string",
                    "description": "Search query"
                },
                "max_results": {
                    "type": "integer",
                    "description": "Number of results to return",
                    "minimum": 1,
                    "maximum": 20
                }
            },
            "required": ["query"]
        })
    }

    fn ttl(&self) -> Option<Duration> {
        Some(self.ttl)
    }
}
