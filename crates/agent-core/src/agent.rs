//! Core Agent trait definition

use crate::context::TaskContext;
use crate::intent::IntentKind;
use crate::result::TaskResult;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};

/// Capability descriptor of an agent
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct AgentDescriptor {
    /// Agent name, used in logs
    pub name: String,
    /// The intent this agent serves
    pub intent: IntentKind,
    /// Names of the tools the agent calls
    pub tools: Vec<String>,
    /// Intents whose results the agent consumes
    pub consumes: Vec<IntentKind>,
}

impl AgentDescriptor {
    pub fn new(name: impl Into<String>, intent: IntentKind) -> Self {
        Self {
            name: name.into(),
            intent,
            tools: Vec::new(),
            consumes: Vec::new(),
        }
    }

    pub fn with_tool(mut self, tool: impl Into<String>) -> Self {
        self.tools.push(tool.into());
        self
    }

    pub fn consumes(mut self, intent: IntentKind) -> Self {
        if !self.consumes.contains(&intent) {
            self.consumes.push(intent);
        }
        self
    }
}

/// Core trait that all analysis agents implement
///
/// An agent never returns an error: every outcome, including partial
/// output, is expressed as a [`TaskResult`].
#[async_trait]
pub trait Agent: Send + Sync {
    /// Describe what the agent serves and needs
    fn descriptor(&self) -> &AgentDescriptor;

    /// Get the agent's name
    fn name(&self) -> &str {
        &self.descriptor().name
    }

    /// Run one attempt of the task
    async fn run(&self, ctx: TaskContext) -> TaskResult;
}
