//! Error types for financial analysis operations

use agent_core::ToolError;
use agent_llm::LLMError;
use thiserror::Error;

/// Financial analysis specific errors
#[derive(Debug, Error)]
pub enum FinanceError {
    /// Orchestration error (classification, plan abort, compilation)
    #[error(transparent)]
    Core(#[from] agent_core::Error),

    /// API request failed
    #[error("API error: {0}")]
    ApiError(String),

    /// Upstream answered with a non-success status
    #[error("{provider} returned HTTP {status}: {body}")]
    HttpStatus {
        provider: String,
        status: u16,
        body: String,
    },

    /// Invalid stock symbol provided
    #[error("Invalid symbol: {0}")]
    InvalidSymbol(String),

    /// Data not available for the requested symbol
    #[error("Data not available for {symbol}: {reason}")]
    DataUnavailable { symbol: String, reason: String },

    /// Rate limit exceeded for API
    #[error("Rate limit exceeded for {provider}")]
    RateLimitExceeded { provider: String },

    /// Network or HTTP error
    #[error("Network error: {0}")]
    NetworkError(#[from] reqwest::Error),

    /// JSON parsing error
    #[error("JSON error: {0}")]
    JsonError(#[from] serde_json::Error),

    /// Yahoo Finance API error
    #[error("Yahoo Finance error: {0}")]
    YahooFinanceError(String),

    /// Technical indicator calculation error
    #[error("Technical indicator error: {0}")]
    IndicatorError(String),

    /// Language model error
    #[error("LLM error: {0}")]
    Llm(#[from] LLMError),

    /// Tool arguments did not match the tool's schema
    #[error("Invalid arguments: {0}")]
    InvalidArguments(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    ConfigError(String),

    /// Report rendering error
    #[error("Render error: {0}")]
    RenderError(String),

    /// File system error
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

/// Result type alias for financial analysis operations
pub type Result<T> = std::result::Result<T, FinanceError>;

impl FinanceError {
    /// Whether the failed operation may succeed if attempted again
    pub fn is_retriable(&self) -> bool {
        match self {
            Self::NetworkError(e) => {
                e.is_timeout()
                    || e.is_connect()
                    || e.status()
                        .is_some_and(|s| s.is_server_error() || s.as_u16() == 429)
            }
            Self::HttpStatus { status, .. } => *status == 429 || *status >= 500,
            Self::Llm(e) => e.is_transient(),
            Self::ApiError(_) | Self::RateLimitExceeded { .. } | Self::YahooFinanceError(_) => true,
            _ => false,
        }
    }

    /// Classify this error as a tool failure
    pub fn into_tool_error(self, tool: &str) -> ToolError {
        if let Self::Core(agent_core::Error::Tool(e)) = self {
            return e;
        }
        if self.is_retriable() {
            ToolError::retriable(tool, self.to_string())
        } else {
            ToolError::fatal(tool, self.to_string())
        }
    }

    /// Whether this is a classification failure the user can fix by rephrasing
    pub fn is_classification(&self) -> bool {
        matches!(self, Self::Core(agent_core::Error::Classification(_)))
    }
}

impl From<agent_core::ToolError> for FinanceError {
    fn from(err: agent_core::ToolError) -> Self {
        Self::Core(err.into())
    }
}
