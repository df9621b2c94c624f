//! Analysis intents and the entities extracted alongside them

use crate::Error;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::fmt;
use std::str::FromStr;

/// Kind of analysis a query asks for
///
/// Variant order is the report priority order: market trend first,
/// geopolitical last.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum IntentKind {
    /// Overall market direction, issues and outlook
    MarketTrend,
    /// Industry sector analysis
    Sector,
    /// Individual company / stock analysis
    Company,
    /// Policy and geopolitical impact analysis
    Geopolitical,
}

impl IntentKind {
    /// All intents in priority order
    pub const ALL: [Self; 4] = [
        Self::MarketTrend,
        Self::Sector,
        Self::Company,
        Self::Geopolitical,
    ];

    /// Stable identifier used in logs, prompts and persisted data
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::MarketTrend => "market_trend",
            Self::Sector => "sector",
            Self::Company => "company",
            Self::Geopolitical => "geopolitical",
        }
    }

    /// Human readable section title
    pub fn title(&self) -> &'static str {
        match self {
            Self::MarketTrend => "Market Trend",
            Self::Sector => "Sector Analysis",
            Self::Company => "Company Analysis",
            Self::Geopolitical => "Geopolitical Impact",
        }
    }
}

impl fmt::Display for IntentKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IntentKind {
    type Err = Error;

    /// Normalize a free-form intent label into the closed set.
    ///
    /// Anything outside the known labels is a classification error.
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let normalized: String = s
            .trim()
            .to_lowercase()
            .chars()
            .map(|c| if c == '-' || c.is_whitespace() { '_' } else { c })
            .collect();

        match normalized.as_str() {
            "market_trend" | "market" | "trend" | "market_analysis" => Ok(Self::MarketTrend),
            "sector" | "industry" | "sector_analysis" => Ok(Self::Sector),
            "company" | "stock" | "company_analysis" | "stock_analysis" => Ok(Self::Company),
            "geopolitical" | "geopolitics" | "policy" | "geopolitical_analysis" => {
                Ok(Self::Geopolitical)
            }
            _ => Err(Error::Classification(format!("unknown intent '{}'", s.trim()))),
        }
    }
}

/// Kind of entity extracted from a query
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum EntityKind {
    /// Exchange ticker or listing code
    Ticker,
    /// Company name
    Company,
    /// Industry sector identifier
    Sector,
    /// Policy or geopolitical topic
    PolicyTopic,
    /// Investment theme
    Theme,
}

impl EntityKind {
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Ticker => "ticker",
            Self::Company => "company",
            Self::Sector => "sector",
            Self::PolicyTopic => "policy_topic",
            Self::Theme => "theme",
        }
    }
}

impl fmt::Display for EntityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Entities grouped by kind
///
/// Values keep insertion order and are de-duplicated per kind.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Entities(BTreeMap<EntityKind, Vec<String>>);

impl Entities {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a value; returns false if it was empty or already present
    pub fn insert(&mut self, kind: EntityKind, value: impl Into<String>) -> bool {
        let value = value.into();
        let value = value.trim();
        if value.is_empty() {
            return false;
        }

        let values = self.0.entry(kind).or_default();
        if values.iter().any(|v| v == value) {
            return false;
        }
        values.push(value.to_string());
        true
    }

    /// Builder-style insert
    pub fn with(mut self, kind: EntityKind, value: impl Into<String>) -> Self {
        self.insert(kind, value);
        self
    }

    pub fn extend<I, S>(&mut self, kind: EntityKind, values: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        for value in values {
            self.insert(kind, value);
        }
    }

    /// Values for a kind, empty if none were extracted
    pub fn get(&self, kind: EntityKind) -> &[String] {
        self.0.get(&kind).map_or(&[], Vec::as_slice)
    }

    pub fn first(&self, kind: EntityKind) -> Option<&str> {
        self.get(kind).first().map(String::as_str)
    }

    pub fn contains(&self, kind: EntityKind, value: &str) -> bool {
        self.get(kind).iter().any(|v| v == value)
    }

    /// Merge another entity set into this one, keeping existing order
    pub fn merge(&mut self, other: &Entities) {
        for (kind, values) in &other.0 {
            self.extend(*kind, values.iter().cloned());
        }
    }

    pub fn is_empty(&self) -> bool {
        self.0.values().all(Vec::is_empty)
    }

    pub fn iter(&self) -> impl Iterator<Item = (EntityKind, &[String])> {
        self.0
            .iter()
            .filter(|(_, values)| !values.is_empty())
            .map(|(kind, values)| (*kind, values.as_slice()))
    }
}

/// A classified analysis intent together with its entities
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Intent {
    pub kind: IntentKind,
    pub entities: Entities,
}

impl Intent {
    pub fn new(kind: IntentKind, entities: Entities) -> Self {
        Self { kind, entities }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_priority_order() {
        let mut kinds = vec![
            IntentKind::Geopolitical,
            IntentKind::Company,
            IntentKind::MarketTrend,
            IntentKind::Sector,
        ];
        kinds.sort();
        assert_eq!(kinds, IntentKind::ALL.to_vec());
    }

    #[test]
    fn test_intent_parse_normalizes() {
        assert_eq!("Market-Trend".parse::<IntentKind>().unwrap(), IntentKind::MarketTrend);
        assert_eq!(" stock ".parse::<IntentKind>().unwrap(), IntentKind::Company);
        assert_eq!("GEOPOLITICAL".parse::<IntentKind>().unwrap(), IntentKind::Geopolitical);
    }

    #[test]
    fn test_intent_parse_rejects_unknown() {
        let err = "weather".parse::<IntentKind>().unwrap_err();
        assert!(matches!(err, Error::Classification(msg) if msg.contains("weather")));
    }

    #[test]
    fn test_entities_dedup_and_order() {
        let mut entities = Entities::new();
        assert!(entities.insert(EntityKind::Company, "KB Financial"));
        assert!(entities.insert(EntityKind::Company, "Shinhan"));
        assert!(!entities.insert(EntityKind::Company, " KB Financial "));
        assert!(!entities.insert(EntityKind::Company, "  "));

        assert_eq!(entities.get(EntityKind::Company), ["KB Financial", "Shinhan"]);
        assert!(entities.get(EntityKind::Ticker).is_empty());
    }

    #[test]
    fn test_entities_merge() {
        let mut a = Entities::new().with(EntityKind::Sector, "banking");
        let b = Entities::new()
            .with(EntityKind::Sector, "insurance")
            .with(EntityKind::Sector, "banking")
            .with(EntityKind::Theme, "ai");
        a.merge(&b);

        assert_eq!(a.get(EntityKind::Sector), ["banking", "insurance"]);
        assert_eq!(a.first(EntityKind::Theme), Some("ai"));
    }

    #[test]
    fn test_entities_serialize_as_map() {
        let entities = Entities::new().with(EntityKind::PolicyTopic, "tariffs");
        let json = serde_json::to_value(&entities).unwrap();
        assert_eq!(json, serde_json::json!({"policy_topic": ["tariffs"]}));
    }
}
