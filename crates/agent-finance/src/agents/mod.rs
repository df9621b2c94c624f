//! Financial analysis agents
//!
//! Each agent serves one intent, calls tools through the task context and
//! reports the payload it managed to build even when a tool call fails.

pub mod company;
pub mod geopolitical;
pub mod market_trend;
pub mod sector;

pub use company::CompanyAgent;
pub use geopolitical::GeopoliticalAgent;
pub use market_trend::MarketTrendAgent;
pub use sector::SectorAgent;

use crate::api::SearchResult;
use crate::tools::names;
use agent_core::{Finding, Payload, TaskContext, TaskResult, ToolError};
use futures::future::join_all;
use serde_json::{Value, json};
use tracing::debug;

/// Results kept per search
const INSIGHTS_PER_SEARCH: usize = 3;

/// Longest snippet kept verbatim, in characters
const MAX_SNIPPET_CHARS: usize = 100;

/// A web search an agent wants to run
#[derive(Debug, Clone, PartialEq, Eq)]
pub(crate) struct SearchSpec {
    /// What the search is about, used when a result has no title
    pub topic: String,
    pub query: String,
    pub max_results: usize,
}

impl SearchSpec {
    pub fn new(topic: impl Into<String>, query: impl Into<String>, max_results: usize) -> Self {
        Self {
            topic: topic.into(),
            query: query.into(),
            max_results,
        }
    }
}

/// Shorten a snippet to at most 100 characters
pub fn truncate_snippet(text: &str) -> String {
    let text = text.trim();
    if text.chars().count() > MAX_SNIPPET_CHARS {
        let head: String = text.chars().take(MAX_SNIPPET_CHARS - 3).collect();
        format!("{head}...")
    } else {
        text.to_string()
    }
}

/// Turn the top search results into findings
pub fn extract_insights(topic: &str, results: &[SearchResult]) -> Vec<Finding> {
    results
        .iter()
        .take(INSIGHTS_PER_SEARCH)
        .map(|r| {
            let title = if r.title.trim().is_empty() {
                topic
            } else {
                r.title.trim()
            };
            let finding = Finding::new(title, truncate_snippet(&r.content));
            if r.url.is_empty() {
                finding
            } else {
                finding.with_source(&r.url)
            }
        })
        .collect()
}

/// Run one web search through the task's tool caller
pub(crate) async fn web_search(
    ctx: &TaskContext,
    spec: &SearchSpec,
) -> Result<Vec<SearchResult>, ToolError> {
    let value = ctx
        .call_tool(
            names::WEB_SEARCH,
            json!({"query": spec.query, "max_results": spec.max_results}),
        )
        .await?;

    serde_json::from_value(value.get("results").cloned().unwrap_or(Value::Null))
        .map_err(|e| ToolError::fatal(names::WEB_SEARCH, format!("malformed search results: {e}")))
}

/// Run searches concurrently, returning results in request order
pub(crate) async fn run_searches(
    ctx: &TaskContext,
    specs: &[SearchSpec],
) -> Vec<Result<Vec<SearchResult>, ToolError>> {
    join_all(specs.iter().map(|spec| web_search(ctx, spec))).await
}

/// Payload under construction plus the worst tool failure seen so far
#[derive(Debug, Default)]
pub(crate) struct Draft {
    pub payload: Payload,
    error: Option<ToolError>,
}

impl Draft {
    pub fn new() -> Self {
        Self::default()
    }

    /// Keep a successful value, remember a failure
    ///
    /// A fatal failure outranks a retriable one since retrying cannot fix it.
    pub fn record<T>(&mut self, result: Result<T, ToolError>) -> Option<T> {
        match result {
            Ok(value) => Some(value),
            Err(err) => {
                debug!(tool = %err.tool, error = %err.message, "Tool call failed");
                let replace = match &self.error {
                    None => true,
                    Some(current) => current.is_retriable() && !err.is_retriable(),
                };
                if replace {
                    self.error = Some(err);
                }
                None
            }
        }
    }

    /// Add findings for the results of one search
    pub fn add_search(&mut self, spec: &SearchSpec, result: Result<Vec<SearchResult>, ToolError>) {
        if let Some(results) = self.record(result) {
            self.payload
                .findings
                .extend(extract_insights(&spec.topic, &results));
        }
    }

    pub fn has_error(&self) -> bool {
        self.error.is_some()
    }

    /// Success, or a tool failure carrying whatever was gathered
    pub fn finish(self) -> TaskResult {
        match self.error {
            None => TaskResult::success(self.payload),
            Some(err) => TaskResult::tool_failure(&err).with_partial(self.payload),
        }
    }
}

/// Format an optional number for a table cell
pub(crate) fn cell(value: &Value, decimals: usize) -> String {
    value
        .as_f64()
        .map_or_else(|| "n/a".to_string(), |v| format!("{v:.decimals$}"))
}

#[cfg(test)]
pub(crate) mod testing {
    //! In-process tool caller for agent tests

    use super::*;
    use agent_core::{Entities, IntentKind, ToolCaller};
    use async_trait::async_trait;
    use std::sync::{Arc, Mutex};

    type Handler = Box<dyn Fn(&str, &Value) -> Result<Value, ToolError> + Send + Sync>;

    /// Records calls and answers them with a handler
    pub struct FakeTools {
        handler: Handler,
        pub calls: Mutex<Vec<(String, Value)>>,
    }

    impl FakeTools {
        pub fn new(
            handler: impl Fn(&str, &Value) -> Result<Value, ToolError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                handler: Box::new(handler),
                calls: Mutex::new(Vec::new()),
            })
        }

        /// Answers every tool with plausible data
        pub fn healthy() -> Arc<Self> {
            Self::new(|tool, args| Ok(canned(tool, args)))
        }

        pub fn queries(&self, tool: &str) -> Vec<Value> {
            self.calls
                .lock()
                .unwrap()
                .iter()
                .filter(|(name, _)| name == tool)
                .map(|(_, args)| args.clone())
                .collect()
        }
    }

    #[async_trait]
    impl ToolCaller for FakeTools {
        async fn call_tool(&self, tool: &str, args: Value) -> Result<Value, ToolError> {
            self.calls
                .lock()
                .unwrap()
                .push((tool.to_string(), args.clone()));
            (self.handler)(tool, &args)
        }
    }

    pub fn canned(tool: &str, args: &Value) -> Value {
        match tool {
            names::WEB_SEARCH => {
                let query = args["query"].as_str().unwrap_or_default();
                json!({
                    "query": query,
                    "results": [
                        {"title": format!("{query} headline"), "url": "https://news.example/1", "content": "First result."},
                        {"title": "Second", "url": "https://news.example/2", "content": "Second result."},
                        {"title": "Third", "url": "https://news.example/3", "content": "Third result."},
                        {"title": "Fourth", "url": "https://news.example/4", "content": "Fourth result."}
                    ]
                })
            }
            names::STOCK_DATA => json!({
                "symbol": args["symbol"],
                "last_close": 61_200.0,
                "daily_change_pct": 1.25,
                "period_change_pct": 8.4,
                "sma20": 60_100.0,
                "sma50": 58_900.0,
                "rsi14": 58.2,
                "volatility_pct": 24.7,
            }),
            names::LLM_SUMMARIZE => json!({"summary": "Model narrative.", "model": "test"}),
            _ => Value::Null,
        }
    }

    pub fn context(intent: IntentKind, entities: Entities, tools: Arc<FakeTools>) -> TaskContext {
        TaskContext::new(intent, entities, tools)
    }
}
