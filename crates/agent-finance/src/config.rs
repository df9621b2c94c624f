//! Configuration for financial analysis runs

use crate::error::{FinanceError, Result};
use agent_core::IntentKind;
use agent_utils::env_var;
use agent_workflow::{DependencyStrength, RetryPolicy, SupervisorConfig};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use std::time::Duration;

/// How queries are mapped to intents
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ClassifierMode {
    /// Bilingual keyword tables
    #[default]
    Rules,
    /// Ask the language model, falling back to rules on transport errors
    Llm,
}

/// Web search settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct SearchConfig {
    /// Tavily API key
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Results requested per search
    pub max_results: u32,

    /// Tavily search depth ("basic" or "advanced")
    pub search_depth: String,

    /// Client-side request budget
    pub requests_per_minute: u32,

    /// Restrict results to these domains; empty searches everywhere
    pub include_domains: Vec<String>,
}

impl Default for SearchConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            max_results: 5,
            search_depth: "basic".to_string(),
            requests_per_minute: 60,
            include_domains: Vec::new(),
        }
    }
}

/// Language model settings
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct LlmConfig {
    /// API key for the OpenAI-compatible endpoint
    #[serde(skip_serializing)]
    pub api_key: Option<String>,

    /// Base URL; local servers usually need no key
    pub api_base: Option<String>,

    /// Model identifier
    pub model: String,

    /// Completion budget per call
    pub max_tokens: usize,

    /// Request timeout in seconds
    pub timeout_secs: u64,
}

impl Default for LlmConfig {
    fn default() -> Self {
        Self {
            api_key: None,
            api_base: None,
            model: "gpt-4o-mini".to_string(),
            max_tokens: 1024,
            timeout_secs: 120,
        }
    }
}

impl LlmConfig {
    /// Whether enough is configured to reach a model
    pub fn is_configured(&self) -> bool {
        self.api_key.is_some() || self.api_base.is_some()
    }
}

/// Configuration for financial analysis runs
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(default)]
pub struct FinanceConfig {
    /// Persisted tool cache; `None` keeps the cache in memory only
    pub cache_path: Option<PathBuf>,

    /// Maximum number of cached tool results
    pub cache_capacity: usize,

    /// Default TTL of cached tool results in seconds
    pub cache_ttl_secs: u64,

    /// Per-tool TTL overrides in seconds
    pub tool_ttl_secs: BTreeMap<String, u64>,

    /// Timeout of a single tool call in seconds
    pub request_timeout_secs: u64,

    /// Retries of a task after its first attempt
    pub max_retries: u32,

    /// Backoff before the first retry in milliseconds
    pub retry_backoff_base_ms: u64,

    /// Upper bound on retry backoff in milliseconds
    pub retry_backoff_max_ms: u64,

    /// Upper bound on concurrently running agent tasks
    pub max_parallel_tasks: usize,

    /// Strength of the geopolitical -> market trend edge
    pub geopolitical_dependency: DependencyStrength,

    pub classifier_mode: ClassifierMode,

    pub search: SearchConfig,

    pub llm: LlmConfig,

    /// Directory rendered reports are written to
    pub output_dir: PathBuf,

    /// Markdown to PDF converter, invoked as `<cmd> <input.md> -o <output.pdf>`
    pub pdf_command: Option<String>,
}

impl Default for FinanceConfig {
    fn default() -> Self {
        Self {
            cache_path: Some(PathBuf::from("data/tool_cache.json")),
            cache_capacity: 1024,
            cache_ttl_secs: 3600,
            tool_ttl_secs: BTreeMap::from([
                ("web_search".to_string(), 3600),      // 1 hour
                ("stock_data".to_string(), 900),       // 15 minutes
                ("llm_summarize".to_string(), 86_400), // 1 day
            ]),
            request_timeout_secs: 30,
            max_retries: 2,
            retry_backoff_base_ms: 500,
            retry_backoff_max_ms: 10_000,
            max_parallel_tasks: 4,
            geopolitical_dependency: DependencyStrength::Soft,
            classifier_mode: ClassifierMode::Rules,
            search: SearchConfig::default(),
            llm: LlmConfig::default(),
            output_dir: PathBuf::from("outputs/reports"),
            pdf_command: Some("pandoc".to_string()),
        }
    }
}

impl FinanceConfig {
    /// Create a new configuration builder
    pub fn builder() -> FinanceConfigBuilder {
        FinanceConfigBuilder::default()
    }

    /// Load a TOML configuration file; missing keys take their defaults
    pub fn from_file(path: impl AsRef<Path>) -> Result<Self> {
        agent_utils::load_toml(path).map_err(|e| FinanceError::ConfigError(format!("{e:#}")))
    }

    /// Apply `TAVILY_API_KEY`, `OPENAI_API_KEY`, `OPENAI_API_BASE` and `MODEL_NAME`
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(key) = env_var("TAVILY_API_KEY") {
            self.search.api_key = Some(key);
        }
        if let Some(key) = env_var("OPENAI_API_KEY") {
            self.llm.api_key = Some(key);
        }
        if let Some(base) = env_var("OPENAI_API_BASE") {
            self.llm.api_base = Some(base);
        }
        if let Some(model) = env_var("MODEL_NAME") {
            self.llm.model = model;
        }
        self
    }

    /// Validate the configuration
    pub fn validate(&self) -> Result<()> {
        if self.cache_capacity == 0 {
            return Err(FinanceError::ConfigError(
                "cache_capacity must be greater than 0".to_string(),
            ));
        }

        if self.request_timeout_secs == 0 {
            return Err(FinanceError::ConfigError(
                "request_timeout_secs must be greater than 0".to_string(),
            ));
        }

        if self.max_parallel_tasks == 0 {
            return Err(FinanceError::ConfigError(
                "max_parallel_tasks must be greater than 0".to_string(),
            ));
        }

        if self.retry_backoff_base_ms > self.retry_backoff_max_ms {
            return Err(FinanceError::ConfigError(
                "retry_backoff_base_ms must not exceed retry_backoff_max_ms".to_string(),
            ));
        }

        if !(1..=20).contains(&self.search.max_results) {
            return Err(FinanceError::ConfigError(
                "search.max_results must be between 1 and 20".to_string(),
            ));
        }

        if self.search.requests_per_minute == 0 {
            return Err(FinanceError::ConfigError(
                "search.requests_per_minute must be greater than 0".to_string(),
            ));
        }

        if self.classifier_mode == ClassifierMode::Llm && !self.llm.is_configured() {
            return Err(FinanceError::ConfigError(
                "LLM classifier requires OPENAI_API_KEY or OPENAI_API_BASE".to_string(),
            ));
        }

        Ok(())
    }

    pub fn cache_ttl(&self) -> Duration {
        Duration::from_secs(self.cache_ttl_secs)
    }

    /// TTL for results of the named tool
    pub fn tool_ttl(&self, tool: &str) -> Duration {
        self.tool_ttl_secs
            .get(tool)
            .map_or_else(|| self.cache_ttl(), |secs| Duration::from_secs(*secs))
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs)
    }

    /// Retry policy for agent tasks
    pub fn retry_policy(&self) -> RetryPolicy {
        RetryPolicy::new(
            self.max_retries,
            Duration::from_millis(self.retry_backoff_base_ms),
            Duration::from_millis(self.retry_backoff_max_ms),
            2.0,
        )
    }

    /// Supervisor settings derived from this configuration
    pub fn supervisor_config(&self) -> SupervisorConfig {
        SupervisorConfig::default()
            .with_retry(self.retry_policy())
            .with_max_parallel(self.max_parallel_tasks)
            .with_edge_strength(
                IntentKind::Geopolitical,
                IntentKind::MarketTrend,
                self.geopolitical_dependency,
            )
    }
}

/// Builder for FinanceConfig
#[derive(Debug, Default)]
pub struct FinanceConfigBuilder {
    config: FinanceConfig,
}

impl FinanceConfigBuilder {
    /// Start from an existing configuration
    pub fn from_config(config: FinanceConfig) -> Self {
        Self { config }
    }

    /// Persist the cache at the given path
    pub fn cache_path(mut self, path: impl Into<PathBuf>) -> Self {
        self.config.cache_path = Some(path.into());
        self
    }

    /// Keep the cache in memory only
    pub fn in_memory_cache(mut self) -> Self {
        self.config.cache_path = None;
        self
    }

    pub fn cache_capacity(mut self, capacity: usize) -> Self {
        self.config.cache_capacity = capacity;
        self
    }

    pub fn cache_ttl(mut self, ttl: Duration) -> Self {
        self.config.cache_ttl_secs = ttl.as_secs();
        self
    }

    /// Override the TTL of one tool
    pub fn tool_ttl(mut self, tool: impl Into<String>, ttl: Duration) -> Self {
        self.config.tool_ttl_secs.insert(tool.into(), ttl.as_secs());
        self
    }

    pub fn request_timeout(mut self, timeout: Duration) -> Self {
        self.config.request_timeout_secs = timeout.as_secs();
        self
    }

    pub fn max_retries(mut self, retries: u32) -> Self {
        self.config.max_retries = retries;
        self
    }

    /// Set retry backoff base and cap
    pub fn retry_backoff(mut self, base: Duration, max: Duration) -> Self {
        self.config.retry_backoff_base_ms = u64::try_from(base.as_millis()).unwrap_or(u64::MAX);
        self.config.retry_backoff_max_ms = u64::try_from(max.as_millis()).unwrap_or(u64::MAX);
        self
    }

    pub fn max_parallel_tasks(mut self, max: usize) -> Self {
        self.config.max_parallel_tasks = max;
        self
    }

    pub fn geopolitical_dependency(mut self, strength: DependencyStrength) -> Self {
        self.config.geopolitical_dependency = strength;
        self
    }

    pub fn classifier_mode(mut self, mode: ClassifierMode) -> Self {
        self.config.classifier_mode = mode;
        self
    }

    pub fn search_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.search.api_key = Some(key.into());
        self
    }

    pub fn llm_api_key(mut self, key: impl Into<String>) -> Self {
        self.config.llm.api_key = Some(key.into());
        self
    }

    pub fn llm_api_base(mut self, base: impl Into<String>) -> Self {
        self.config.llm.api_base = Some(base.into());
        self
    }

    pub fn model(mut self, model: impl Into<String>) -> Self {
        self.config.llm.model = model.into();
        self
    }

    pub fn output_dir(mut self, dir: impl Into<PathBuf>) -> Self {
        self.config.output_dir = dir.into();
        self
    }

    /// Set the PDF converter; `None` always falls back to markdown
    pub fn pdf_command(mut self, command: Option<String>) -> Self {
        self.config.pdf_command = command;
        self
    }

    /// Apply environment overrides
    pub fn with_env(mut self) -> Self {
        self.config = self.config.with_env_overrides();
        self
    }

    /// Build the configuration
    pub fn build(self) -> Result<FinanceConfig> {
        self.config.validate()?;
        Ok(self.config)
    }
}
