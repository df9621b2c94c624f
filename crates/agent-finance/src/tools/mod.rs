//! Tools used by the financial analysis agents

pub mod llm;
pub mod stock_data;
pub mod web_search;

pub use llm::LlmSummarizeTool;
pub use stock_data::StockDataTool;
pub use web_search::WebSearchTool;

use crate::error::FinanceError;
use agent_core::ToolError;
use serde::de::DeserializeOwned;
use serde_json::Value;

/// Tool names as registered in the tool registry
pub mod names {
    pub const WEB_SEARCH: &str = "web_search";
    pub const STOCK_DATA: &str = "stock_data";
    pub const LLM_SUMMARIZE: &str = "llm_summarize";
}

/// Deserialize tool arguments; malformed arguments are fatal
pub(crate) fn parse_args<T: DeserializeOwned>(tool: &str, args: Value) -> Result<T, ToolError> {
    serde_json::from_value(args)
        .map_err(|e| FinanceError::InvalidArguments(e.to_string()).into_tool_error(tool))
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde::Deserialize;
    use serde_json::json;

    #[derive(Debug, Deserialize)]
    struct Args {
        #[allow(dead_code)]
        query: String,
    }

    #[test]
    fn test_parse_args_is_fatal() {
        let err = parse_args::<Args>(names::WEB_SEARCH, json!({"q": 1})).unwrap_err();
        assert!(!err.is_retriable());
        assert_eq!(err.tool, "web_search");
        assert!(parse_args::<Args>(names::WEB_SEARCH, json!({"query": "x"})).is_ok());
    }
}
