//! Orchestration states and the result bundle handed to report compilation

use agent_core::{Entities, EntityKind, Error, FailedIntent, FailureKind, IntentKind, Result, TaskResult};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use uuid::Uuid;

/// Global state of an execution plan
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum PlanState {
    Building,
    Executing,
    /// Every task succeeded
    Completed,
    /// Some requested task succeeded, others failed
    PartiallyCompleted,
    /// No requested task succeeded, or the plan was cancelled
    Aborted,
}

impl fmt::Display for PlanState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Building => "building",
            Self::Executing => "executing",
            Self::Completed => "completed",
            Self::PartiallyCompleted => "partially_completed",
            Self::Aborted => "aborted",
        })
    }
}

/// State of a single task during execution
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TaskState {
    Pending,
    Running,
    Succeeded,
    Failed { retriable: bool },
}

impl TaskState {
    pub fn is_terminal(&self) -> bool {
        matches!(self, Self::Succeeded | Self::Failed { retriable: false })
    }
}

/// Final outcome of one task
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TaskOutcome {
    pub intent: IntentKind,
    pub entities: Entities,
    pub requested: bool,
    /// Number of times the agent ran; zero if it never did
    pub attempts: u32,
    pub result: TaskResult,
}

impl TaskOutcome {
    pub fn is_success(&self) -> bool {
        self.result.is_success()
    }

    pub fn is_cancelled(&self) -> bool {
        matches!(
            self.result,
            TaskResult::Failure {
                kind: FailureKind::Cancelled,
                ..
            }
        )
    }
}

/// Everything the orchestrator produced for one query
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ResultBundle {
    pub plan_id: Uuid,
    pub state: PlanState,
    pub completed_at: DateTime<Utc>,
    pub outcomes: BTreeMap<IntentKind, TaskOutcome>,
}

impl ResultBundle {
    pub fn outcome(&self, intent: IntentKind) -> Option<&TaskOutcome> {
        self.outcomes.get(&intent)
    }

    /// Outcomes in priority order
    pub fn outcomes(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes.values()
    }

    pub fn requested(&self) -> Vec<IntentKind> {
        self.outcomes().filter(|o| o.requested).map(|o| o.intent).collect()
    }

    pub fn succeeded(&self) -> impl Iterator<Item = &TaskOutcome> {
        self.outcomes().filter(|o| o.is_success())
    }

    /// Failed intents with their messages
    pub fn failures(&self) -> Vec<FailedIntent> {
        self.outcomes()
            .filter_map(|o| {
                o.result.failure_message().map(|message| FailedIntent {
                    intent: o.intent,
                    message: message.to_string(),
                })
            })
            .collect()
    }

    /// Union of the entities of every task
    pub fn entities(&self) -> Entities {
        let mut merged = Entities::new();
        for outcome in self.outcomes() {
            merged.merge(&outcome.entities);
        }
        merged
    }

    /// Entity values of one kind across all tasks
    pub fn entity_values(&self, kind: EntityKind) -> Vec<String> {
        self.entities().get(kind).to_vec()
    }

    pub fn is_aborted(&self) -> bool {
        self.state == PlanState::Aborted
    }

    /// Turn an aborted bundle into [`Error::PlanAborted`]
    ///
    /// The error names the requested intents that failed, or every failed
    /// intent if none of them was requested.
    pub fn into_result(self) -> Result<Self> {
        if !self.is_aborted() {
            return Ok(self);
        }

        let requested_failures: Vec<FailedIntent> = self
            .failures()
            .into_iter()
            .filter(|f| self.outcomes.get(&f.intent).is_some_and(|o| o.requested))
            .collect();
        let failures = if requested_failures.is_empty() {
            self.failures()
        } else {
            requested_failures
        };
        Err(Error::PlanAborted { failures })
    }
}
