//! Summarization tool backed by a chat completion provider

use super::{names, parse_args};
use crate::config::LlmConfig;
use crate::error::{FinanceError, Result};
use agent_core::ToolError;
use agent_llm::{CompletionRequest, LLMProvider, Message};
use agent_tools::Tool;
use async_trait::async_trait;
use serde::Deserialize;
use serde_json::{Value, json};
use std::sync::Arc;
use std::time::Duration;
use tracing::warn;

const DEFAULT_SYSTEM_PROMPT: &str = "You are a financial analyst covering Korean financial markets. \
Write concise, factual analysis grounded only in the material provided. \
Do not give investment advice.";

/// Tool asking a language model to summarize or analyse material
#[derive(Clone)]
pub struct LlmSummarizeTool {
    provider: Arc<dyn LLMProvider>,
    model: String,
    max_tokens: usize,
    ttl: Duration,
}

#[derive(Debug, Deserialize)]
struct SummarizeParams {
    /// What to produce
    instruction: String,
    /// Material to work from
    #[serde(default)]
    context: String,
    #[serde(default)]
    system: Option<String>,
    #[serde(default)]
    max_tokens: Option<usize>,
}

impl LlmSummarizeTool {
    pub fn new(provider: Arc<dyn LLMProvider>, config: &LlmConfig, ttl: Duration) -> Self {
        Self {
            provider,
            model: config.model.clone(),
            max_tokens: config.max_tokens,
            ttl,
        }
    }

    async fn summarize(&self, params: SummarizeParams) -> Result<Value> {
        if params.instruction.trim().is_empty() {
            return Err(FinanceError::InvalidArguments(
                "instruction must not be empty".to_string(),
            ));
        }

        let prompt = if params.context.trim().is_empty() {
            params.instruction
        } else {
            format!("{}\n\n---\n{}", params.instruction, params.context)
        };

        let request = CompletionRequest::builder(&self.model)
            .system(params.system.as_deref().unwrap_or(DEFAULT_SYSTEM_PROMPT))
            .add_message(Message::user(prompt))
            .max_tokens(params.max_tokens.unwrap_or(self.max_tokens))
            .temperature(0.3)
            .build();

        let response = self.provider.complete(request).await?;
        if response.is_truncated() {
            warn!(model = %self.model, "Summary hit the token limit");
        }
        let text = response.text().trim();
        if text.is_empty() {
            return Err(FinanceError::ApiError("model returned no text".to_string()));
        }

        Ok(json!({
            "summary": text,
            "model": self.model,
            "provider": self.provider.name(),
        }))
    }
}

#[async_trait]
impl Tool for LlmSummarizeTool {
    async fn call(&self, args: Value) -> std::result::Result<Value, ToolError> {
        let params: SummarizeParams = parse_args(self.name(), args)?;
        self.summarize(params)
            .await
            .map_err(|e| e.into_tool_error(names::LLM_SUMMARIZE))
    }

    fn name(&self) -> &str {
        names::LLM_SUMMARIZE
    }

    fn description(&self) -> &str {
        "Ask a language model to summarize or analyse the provided material."
    }

    fn input_schema(&self) -> Value {
        json!({
            "type": "object",
            "properties": {
                "instruction": {
                    "type": "string",
                    "description": "What the model should produce"
                },
                "context": {
                    "type": "string",
                    "description": "Material to analyse"
                },
                "system": {
                    "type": "string",
                    "description": "Optional system prompt override"
                },
                "max_tokens": {
                    "type": "integer",
                    "description": "Completion budget"
                }
            },
            "required": ["instruction"]
        })
    }

    fn ttl(&self) -> Option<Duration> {
        Some(self.ttl)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_llm::{CompletionResponse, LLMError, StopReason, TokenUsage};
    use mockall::mock;

    mock! {
        Provider {}

        #[async_trait]
        impl LLMProvider for Provider {
            async fn complete(&self, request: CompletionRequest) -> agent_llm::Result<CompletionResponse>;
            fn name(&self) -> &str;
        }
    }

    fn reply(text: &str) -> CompletionResponse {
        CompletionResponse {
            message: Message::assistant(text),
            stop_reason: StopReason::EndTurn,
            usage: TokenUsage {
                input_tokens: 100,
                output_tokens: 20,
            },
        }
    }

    fn tool(provider: MockProvider) -> LlmSummarizeTool {
        LlmSummarizeTool::new(
            Arc::new(provider),
            &LlmConfig::default(),
            Duration::from_secs(60),
        )
    }

    #[tokio::test]
    async fn test_summarize() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .withf(|req| {
                req.model == "gpt-4o-mini"
                    && req.system.as_deref() == Some(DEFAULT_SYSTEM_PROMPT)
                    && req.messages[0].content.contains("관세 영향")
                    && req.messages[0].content.contains("source text")
            })
            .times(1)
            .returning(|_| Ok(reply("  Tariffs weigh on exporters.  ")));
        provider.expect_name().return_const("mock".to_string());

        let value = tool(provider)
            .call(json!({"instruction": "관세 영향 분석", "context": "source text"}))
            .await
            .unwrap();
        assert_eq!(value["summary"], "Tariffs weigh on exporters.");
        assert_eq!(value["provider"], "mock");
    }

    #[tokio::test]
    async fn test_error_classification() {
        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .times(1)
            .returning(|_| Err(LLMError::RateLimitExceeded("slow down".into())));
        let err = tool(provider)
            .call(json!({"instruction": "summarize"}))
            .await
            .unwrap_err();
        assert!(err.is_retriable());

        let mut provider = MockProvider::new();
        provider
            .expect_complete()
            .times(1)
            .returning(|_| Err(LLMError::AuthenticationFailed));
        let err = tool(provider)
            .call(json!({"instruction": "summarize"}))
            .await
            .unwrap_err();
        assert!(!err.is_retriable());
    }

    #[tokio::test]
    async fn test_missing_instruction_is_fatal() {
        let provider = MockProvider::new();
        let err = tool(provider).call(json!({"context": "x"})).await.unwrap_err();
        assert!(!err.is_retriable());
    }
}
