//! Structured report document

use agent_core::{ChartRef, Finding, IntentKind, Table};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Kind of report section
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SectionKind {
    MarketTrend,
    Sector,
    Company,
    Geopolitical,
    /// Cross-section conclusions, always last
    Synthesis,
}

impl From<IntentKind> for SectionKind {
    fn from(intent: IntentKind) -> Self {
        match intent {
            IntentKind::MarketTrend => Self::MarketTrend,
            IntentKind::Sector => Self::Sector,
            IntentKind::Company => Self::Company,
            IntentKind::Geopolitical => Self::Geopolitical,
        }
    }
}

/// Content block of a section
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum Block {
    Paragraph {
        #[serde(default, skip_serializing_if = "Option::is_none")]
        title: Option<String>,
        text: String,
        #[serde(default, skip_serializing_if = "Option::is_none")]
        source: Option<String>,
    },
    Table(Table),
    ChartReference(ChartRef),
    /// An analysis that produced no usable result
    DataUnavailable { reason: String },
}

impl Block {
    pub fn paragraph(text: impl Into<String>) -> Self {
        Self::Paragraph {
            title: None,
            text: text.into(),
            source: None,
        }
    }

    pub fn titled(title: impl Into<String>, text: impl Into<String>) -> Self {
        Self::Paragraph {
            title: Some(title.into()),
            text: text.into(),
            source: None,
        }
    }

    pub fn finding(finding: &Finding) -> Self {
        Self::Paragraph {
            title: Some(finding.title.clone()),
            text: finding.detail.clone(),
            source: finding.source.clone(),
        }
    }

    pub fn data_unavailable(reason: impl Into<String>) -> Self {
        Self::DataUnavailable {
            reason: reason.into(),
        }
    }

    pub fn is_data_unavailable(&self) -> bool {
        matches!(self, Self::DataUnavailable { .. })
    }
}

/// A titled section of the report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Section {
    pub kind: SectionKind,
    pub title: String,
    pub blocks: Vec<Block>,
}

impl Section {
    pub fn new(kind: SectionKind, title: impl Into<String>) -> Self {
        Self {
            kind,
            title: title.into(),
            blocks: Vec::new(),
        }
    }

    pub fn push(&mut self, block: Block) {
        self.blocks.push(block);
    }

    /// Whether the section reports missing data
    pub fn has_gap(&self) -> bool {
        self.blocks.iter().any(Block::is_data_unavailable)
    }
}

/// Compiled analysis report
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Report {
    pub title: String,
    pub generated_at: DateTime<Utc>,
    pub sections: Vec<Section>,
}

impl Report {
    pub fn section(&self, kind: SectionKind) -> Option<&Section> {
        self.sections.iter().find(|s| s.kind == kind)
    }
}
