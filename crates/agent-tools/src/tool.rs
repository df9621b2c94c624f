//! Tool trait definition

use agent_core::ToolError;
use async_trait::async_trait;
use serde_json::Value;
use std::time::Duration;

/// Trait for external data, search and model operations
///
/// The same arguments must yield an equivalent result; results are cached
/// and de-duplicated by fingerprint.
#[async_trait]
pub trait Tool: Send + Sync {
    /// Call the tool with given arguments
    ///
    /// Errors must be classified as retriable (timeouts, throttling,
    /// transient upstream failures) or fatal (bad arguments, auth failures).
    async fn call(&self, args: Value) -> Result<Value, ToolError>;

    /// Get the tool's name
    ///
    /// Must be unique within a ToolRegistry
    fn name(&self) -> &str;

    /// Get the tool's description
    fn description(&self) -> &str;

    /// Get the tool's input schema (JSON Schema format)
    ///
    /// # Example
    ///
    /// ```
    /// use serde_json::json;
    ///
    /// // Example schema for a search tool:
    /// let schema = json!({
    ///     "type": "object",
    ///     "properties": {
    ///         "query": { "type": "string" },
    ///         "max_results": { "type": "integer" }
    ///     },
    ///     "required": ["query"]
    /// });
    /// ```
    fn input_schema(&self) -> Value;

    /// How long successful results stay cached; `None` uses the invoker default
    fn ttl(&self) -> Option<Duration> {
        None
    }
}
