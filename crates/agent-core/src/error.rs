//! Error types for agent-core

use crate::intent::IntentKind;
use serde::{Deserialize, Serialize};
use std::fmt;
use thiserror::Error;

/// Result type alias for agent-core
pub type Result<T> = std::result::Result<T, Error>;

/// Error type for orchestration operations
#[derive(Error, Debug)]
pub enum Error {
    /// The query matched no known intent
    #[error("Could not classify query: {0}")]
    Classification(String),

    /// A tool call failed
    #[error(transparent)]
    Tool(#[from] ToolError),

    /// A task could not run because a hard dependency failed
    #[error("Task '{task}' skipped: dependency '{dependency}' failed")]
    DependencyFailure {
        task: IntentKind,
        dependency: IntentKind,
    },

    /// No explicitly requested task succeeded
    #[error("Plan aborted: {}", describe_failures(.failures))]
    PlanAborted { failures: Vec<FailedIntent> },

    /// The result bundle could not be turned into a report
    #[error("Report compilation failed: {0}")]
    Compilation(String),

    /// The execution plan is malformed
    #[error("Invalid execution plan: {0}")]
    InvalidPlan(String),

    /// Configuration error
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

fn describe_failures(failures: &[FailedIntent]) -> String {
    if failures.is_empty() {
        return "no tasks completed".to_string();
    }
    failures
        .iter()
        .map(ToString::to_string)
        .collect::<Vec<_>>()
        .join("; ")
}

/// An intent that did not produce a result
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FailedIntent {
    pub intent: IntentKind,
    pub message: String,
}

impl fmt::Display for FailedIntent {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.intent, self.message)
    }
}

/// Whether a failed tool call is worth retrying
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ToolErrorKind {
    Retriable,
    Fatal,
}

impl fmt::Display for ToolErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Retriable => "retriable",
            Self::Fatal => "fatal",
        })
    }
}

/// Error from an external tool call
#[derive(Error, Debug, Clone, PartialEq, Eq)]
#[error("Tool '{tool}' failed ({kind}): {message}")]
pub struct ToolError {
    pub tool: String,
    pub kind: ToolErrorKind,
    pub message: String,
}

impl ToolError {
    pub fn retriable(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            kind: ToolErrorKind::Retriable,
            message: message.into(),
        }
    }

    pub fn fatal(tool: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            tool: tool.into(),
            kind: ToolErrorKind::Fatal,
            message: message.into(),
        }
    }

    pub fn is_retriable(&self) -> bool {
        self.kind == ToolErrorKind::Retriable
    }
}
