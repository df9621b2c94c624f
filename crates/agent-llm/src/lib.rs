//! LLM provider abstraction for the financial analysis orchestrator
//!
//! This crate provides provider-agnostic abstractions for talking to
//! Large Language Models. It includes:
//!
//! - Text message types
//! - Completion request/response types
//! - Provider trait for LLM implementations
//! - An OpenAI-compatible chat completions provider

pub mod completion;
pub mod error;
pub mod messages;
pub mod provider;
pub mod providers;

// Re-export main types
pub use completion::{
    CompletionRequest, CompletionRequestBuilder, CompletionResponse, ResponseFormat, StopReason,
    TokenUsage,
};
pub use error::{LLMError, Result};
pub use messages::{Message, Role};
pub use provider::LLMProvider;
