//! Immutable query record

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// A user query as received
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Query {
    raw_text: String,
    received_at: DateTime<Utc>,
}

impl Query {
    /// Create a query stamped with the current time
    pub fn new(raw_text: impl Into<String>) -> Self {
        Self::received_at(raw_text, Utc::now())
    }

    /// Create a query with an explicit receive time
    pub fn received_at(raw_text: impl Into<String>, received_at: DateTime<Utc>) -> Self {
        Self {
            raw_text: raw_text.into(),
            received_at,
        }
    }

    pub fn text(&self) -> &str {
        &self.raw_text
    }

    pub fn timestamp(&self) -> DateTime<Utc> {
        self.received_at
    }
}
