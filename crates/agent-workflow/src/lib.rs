//! Multi-agent orchestration for the financial analysis orchestrator
//!
//! This crate turns classified intents into an execution plan (a DAG with
//! one task per intent), dispatches the plan's tasks to registered agents,
//! retries retriable failures, and collects the outcomes into a
//! [`ResultBundle`] under an explicit completion policy.

pub mod bundle;
pub mod plan;
pub mod registry;
pub mod retry;
pub mod supervisor;

// Re-export for convenience
pub use bundle::{PlanState, ResultBundle, TaskOutcome, TaskState};
pub use plan::{Dependency, DependencyStrength, ExecutionPlan, PlanBuilder, Task};
pub use registry::AgentRegistry;
pub use retry::RetryPolicy;
pub use supervisor::{Supervisor, SupervisorConfig};
