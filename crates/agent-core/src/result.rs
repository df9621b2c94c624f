//! Agent output payloads and task outcomes

use crate::error::ToolError;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::fmt;

/// A single analytic finding
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Finding {
    pub title: String,
    pub detail: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,
}

impl Finding {
    pub fn new(title: impl Into<String>, detail: impl Into<String>) -> Self {
        Self {
            title: title.into(),
            detail: detail.into(),
            source: None,
        }
    }

    pub fn with_source(mut self, source: impl Into<String>) -> Self {
        self.source = Some(source.into());
        self
    }
}

/// Tabular data with string cells
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Table {
    pub caption: String,
    pub columns: Vec<String>,
    pub rows: Vec<Vec<String>>,
}

impl Table {
    pub fn new<I, S>(caption: impl Into<String>, columns: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        Self {
            caption: caption.into(),
            columns: columns.into_iter().map(Into::into).collect(),
            rows: Vec::new(),
        }
    }

    pub fn push_row<I, S>(&mut self, row: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.rows.push(row.into_iter().map(Into::into).collect());
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }
}

/// Reference to a chart a renderer may draw
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChartRef {
    pub id: String,
    pub title: String,
    /// Chart type, e.g. "line" or "bar"
    pub kind: String,
    /// Names of the data series plotted
    #[serde(default)]
    pub series: Vec<String>,
}

impl ChartRef {
    pub fn new(id: impl Into<String>, title: impl Into<String>, kind: impl Into<String>) -> Self {
        Self {
            id: id.into(),
            title: title.into(),
            kind: kind.into(),
            series: Vec::new(),
        }
    }

    pub fn with_series(mut self, series: impl Into<String>) -> Self {
        self.series.push(series.into());
        self
    }
}

/// Output of an agent
#[derive(Debug, Clone, PartialEq, Default, Serialize, Deserialize)]
pub struct Payload {
    pub summary: String,
    #[serde(default)]
    pub findings: Vec<Finding>,
    #[serde(default)]
    pub tables: Vec<Table>,
    #[serde(default)]
    pub charts: Vec<ChartRef>,
    /// Structured data for dependent tasks
    #[serde(default)]
    pub data: Value,
}

impl Payload {
    pub fn new(summary: impl Into<String>) -> Self {
        Self {
            summary: summary.into(),
            ..Self::default()
        }
    }

    pub fn with_finding(mut self, finding: Finding) -> Self {
        self.findings.push(finding);
        self
    }

    pub fn with_table(mut self, table: Table) -> Self {
        self.tables.push(table);
        self
    }

    pub fn with_chart(mut self, chart: ChartRef) -> Self {
        self.charts.push(chart);
        self
    }

    pub fn with_data(mut self, data: Value) -> Self {
        self.data = data;
        self
    }

    /// True when the payload carries no content at all
    pub fn is_empty(&self) -> bool {
        self.summary.is_empty()
            && self.findings.is_empty()
            && self.tables.is_empty()
            && self.charts.is_empty()
    }

    /// Rough measure of how much content the payload holds
    pub fn weight(&self) -> usize {
        self.findings.len() + self.tables.len() + self.charts.len() + usize::from(!self.summary.is_empty())
    }
}

/// Why a task failed
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    /// A tool call failed
    Tool,
    /// A hard dependency failed
    Dependency,
    /// The agent itself failed
    Agent,
    /// The plan was cancelled before the task ran
    Cancelled,
}

impl fmt::Display for FailureKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Tool => "tool",
            Self::Dependency => "dependency",
            Self::Agent => "agent",
            Self::Cancelled => "cancelled",
        })
    }
}

/// Outcome of one task attempt
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "status", rename_all = "snake_case")]
pub enum TaskResult {
    Success {
        payload: Payload,
        produced_at: DateTime<Utc>,
    },
    Failure {
        kind: FailureKind,
        message: String,
        retriable: bool,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        partial: Option<Payload>,
    },
}

impl TaskResult {
    pub fn success(payload: Payload) -> Self {
        Self::Success {
            payload,
            produced_at: Utc::now(),
        }
    }

    pub fn failure(kind: FailureKind, message: impl Into<String>, retriable: bool) -> Self {
        Self::Failure {
            kind,
            message: message.into(),
            retriable,
            partial: None,
        }
    }

    /// Failure caused by a tool error; retriability follows the error
    pub fn tool_failure(error: &ToolError) -> Self {
        Self::failure(FailureKind::Tool, error.to_string(), error.is_retriable())
    }

    /// Attach the best payload produced before failing; no-op on success
    pub fn with_partial(mut self, payload: Payload) -> Self {
        if let Self::Failure { partial, .. } = &mut self {
            if !payload.is_empty() {
                *partial = Some(payload);
            }
        }
        self
    }

    pub fn is_success(&self) -> bool {
        matches!(self, Self::Success { .. })
    }

    pub fn is_retriable(&self) -> bool {
        matches!(self, Self::Failure { retriable: true, .. })
    }

    /// Payload of a successful result
    pub fn payload(&self) -> Option<&Payload> {
        match self {
            Self::Success { payload, .. } => Some(payload),
            Self::Failure { .. } => None,
        }
    }

    /// Partial payload of a failed result
    pub fn partial(&self) -> Option<&Payload> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { partial, .. } => partial.as_ref(),
        }
    }

    pub fn failure_message(&self) -> Option<&str> {
        match self {
            Self::Success { .. } => None,
            Self::Failure { message, .. } => Some(message),
        }
    }

    /// Convert a retriable failure into a fatal one, keeping everything else
    pub fn into_fatal(self) -> Self {
        match self {
            Self::Failure {
                kind,
                message,
                partial,
                ..
            } => Self::Failure {
                kind,
                message,
                retriable: false,
                partial,
            },
            success @ Self::Success { .. } => success,
        }
    }
}
