//! Registry of analysis agents keyed by the intent they serve

use agent_core::{Agent, AgentDescriptor, IntentKind};
use std::collections::BTreeMap;
use std::sync::Arc;

/// Closed set of agents, at most one per intent
#[derive(Clone, Default)]
pub struct AgentRegistry {
    agents: BTreeMap<IntentKind, Arc<dyn Agent>>,
}

impl AgentRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register an agent under the intent its descriptor names
    ///
    /// Returns the agent it replaced, if any.
    pub fn register(&mut self, agent: Arc<dyn Agent>) -> Option<Arc<dyn Agent>> {
        let intent = agent.descriptor().intent;
        let replaced = self.agents.insert(intent, agent);
        if replaced.is_some() {
            tracing::warn!(%intent, "Replacing registered agent");
        }
        replaced
    }

    pub fn with(mut self, agent: Arc<dyn Agent>) -> Self {
        self.register(agent);
        self
    }

    pub fn get(&self, intent: IntentKind) -> Option<Arc<dyn Agent>> {
        self.agents.get(&intent).cloned()
    }

    pub fn descriptor(&self, intent: IntentKind) -> Option<&AgentDescriptor> {
        self.agents.get(&intent).map(|agent| agent.descriptor())
    }

    /// Intents that have an agent, in priority order
    pub fn intents(&self) -> Vec<IntentKind> {
        self.agents.keys().copied().collect()
    }

    pub fn len(&self) -> usize {
        self.agents.len()
    }

    pub fn is_empty(&self) -> bool {
        self.agents.is_empty()
    }
}
