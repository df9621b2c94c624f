//! Core abstractions for the financial analysis orchestrator
//!
//! This crate defines the types shared by every layer: queries, intents and
//! entities, agent payloads and task results, the [`Agent`] trait, the
//! [`ToolCaller`] seam agents use to reach external tools, and error types.

pub mod agent;
pub mod context;
pub mod error;
pub mod intent;
pub mod query;
pub mod result;

pub use agent::{Agent, AgentDescriptor};
pub use context::{TaskContext, ToolCaller};
pub use error::{Error, FailedIntent, Result, ToolError, ToolErrorKind};
pub use intent::{Entities, EntityKind, Intent, IntentKind};
pub use query::Query;
pub use result::{ChartRef, FailureKind, Finding, Payload, Table, TaskResult};
