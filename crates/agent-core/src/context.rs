//! Execution context handed to an agent for one task attempt

use crate::error::ToolError;
use crate::intent::{Entities, IntentKind};
use crate::result::Payload;
use async_trait::async_trait;
use serde_json::Value;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

/// Access to external tools from inside an agent
///
/// The orchestrator supplies an implementation that applies caching,
/// timeouts and de-duplication around the raw tools.
#[async_trait]
pub trait ToolCaller: Send + Sync {
    async fn call_tool(&self, tool: &str, args: Value) -> std::result::Result<Value, ToolError>;
}

/// Context passed to an agent when its task runs
///
/// # Example
///
/// ```ignore
/// let ctx = TaskContext::new(IntentKind::Sector, entities, tools)
///     .with_upstream(IntentKind::MarketTrend, market_payload)
///     .with_attempt(1);
/// ```
#[derive(Clone)]
pub struct TaskContext {
    intent: IntentKind,
    entities: Entities,
    upstream: BTreeMap<IntentKind, Payload>,
    attempt: u32,
    tools: Arc<dyn ToolCaller>,
}

impl TaskContext {
    pub fn new(intent: IntentKind, entities: Entities, tools: Arc<dyn ToolCaller>) -> Self {
        Self {
            intent,
            entities,
            upstream: BTreeMap::new(),
            attempt: 0,
            tools,
        }
    }

    /// Add the successful payload of a dependency
    pub fn with_upstream(mut self, intent: IntentKind, payload: Payload) -> Self {
        self.upstream.insert(intent, payload);
        self
    }

    /// Set the zero-based attempt number
    pub fn with_attempt(mut self, attempt: u32) -> Self {
        self.attempt = attempt;
        self
    }

    pub fn intent(&self) -> IntentKind {
        self.intent
    }

    pub fn entities(&self) -> &Entities {
        &self.entities
    }

    /// Payload of a dependency, present only if it succeeded
    pub fn upstream(&self, intent: IntentKind) -> Option<&Payload> {
        self.upstream.get(&intent)
    }

    pub fn attempt(&self) -> u32 {
        self.attempt
    }

    pub async fn call_tool(&self, tool: &str, args: Value) -> std::result::Result<Value, ToolError> {
        self.tools.call_tool(tool, args).await
    }
}

impl fmt::Debug for TaskContext {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("TaskContext")
            .field("intent", &self.intent)
            .field("entities", &self.entities)
            .field("upstream", &self.upstream.keys().collect::<Vec<_>>())
            .field("attempt", &self.attempt)
            .finish_non_exhaustive()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::intent::EntityKind;
    use serde_json::json;

    struct EchoTools;

    #[async_trait]
    impl ToolCaller for EchoTools {
        async fn call_tool(&self, tool: &str, args: Value) -> std::result::Result<Value, ToolError> {
            Ok(json!({ "tool": tool, "args": args }))
        }
    }

    #[tokio::test]
    async fn test_context_accessors_and_tool_call() {
        let entities = Entities::new().with(EntityKind::Sector, "banking");
        let ctx = TaskContext::new(IntentKind::Sector, entities, Arc::new(EchoTools))
            .with_upstream(IntentKind::MarketTrend, Payload::new("steady"))
            .with_attempt(2);

        assert_eq!(ctx.intent(), IntentKind::Sector);
        assert_eq!(ctx.attempt(), 2);
        assert_eq!(ctx.entities().first(EntityKind::Sector), Some("banking"));
        assert!(ctx.upstream(IntentKind::MarketTrend).is_some());
        assert!(ctx.upstream(IntentKind::Company).is_none());

        let value = ctx.call_tool("web_search", json!({"query": "q"})).await.unwrap();
        assert_eq!(value["tool"], "web_search");
    }
}
