//! Tool framework for the financial analysis orchestrator
//!
//! This crate provides the [`Tool`] trait for external operations (web search,
//! market data, language model calls), a registry to look them up by name, a
//! fingerprint-keyed [`ResultCache`], and the [`ToolInvoker`] that wraps every
//! call with caching, timeouts and de-duplication.

pub mod cache;
pub mod fingerprint;
pub mod invoker;
pub mod registry;
pub mod tool;

pub use cache::{CacheEntry, ResultCache};
pub use fingerprint::Fingerprint;
pub use invoker::{InvokerStats, ToolInvoker};
pub use registry::ToolRegistry;
pub use tool::Tool;
