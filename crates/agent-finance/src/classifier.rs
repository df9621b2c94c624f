//! Query classifier mapping free text to analysis intents
//!
//! Rule-based classification uses bilingual (English and Korean) keyword
//! tables. ASCII keywords match whole words or phrases, Hangul keywords match
//! as substrings since Korean attaches particles directly to nouns. An
//! optional language model can take over intent detection; its answer is
//! validated against the closed intent set.

use crate::error::{FinanceError, Result};
use crate::universe::{CompanyUniverse, Sector};
use agent_core::{Entities, EntityKind, Error, Intent, IntentKind, Query};
use agent_llm::{CompletionRequest, LLMProvider, Message};
use regex::Regex;
use serde::Deserialize;
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tracing::{debug, warn};

/// Keywords for intent classification (English)
mod keywords_en {
    pub const MARKET: &[&str] = &[
        "market",
        "markets",
        "trend",
        "trends",
        "outlook",
        "kospi",
        "kosdaq",
        "financial market",
    ];

    pub const COMPANY: &[&str] = &[
        "stock",
        "stocks",
        "share",
        "shares",
        "company",
        "companies",
        "equity",
        "ticker",
    ];

    pub const SECTOR: &[&str] = &[
        "sector",
        "sectors",
        "industry",
        "bank",
        "banks",
        "banking",
        "securities",
        "brokerage",
        "insurance",
        "insurer",
        "insurers",
    ];

    pub const GEOPOLITICAL: &[&str] = &[
        "geopolitical",
        "geopolitics",
        "trump",
        "president",
        "white house",
        "tariff",
        "tariffs",
        "trade war",
        "sanction",
        "sanctions",
    ];
}

/// Keywords for intent classification (Korean)
mod keywords_ko {
    pub const MARKET: &[&str] = &["시장", "트렌드", "동향", "추세", "증시", "코스피"];

    pub const COMPANY: &[&str] = &["주식", "종목", "기업", "회사", "주가"];

    pub const SECTOR: &[&str] = &["업종", "은행", "증권", "보험", "산업"];

    pub const GEOPOLITICAL: &[&str] = &["트럼프", "대통령", "미국", "관세", "지정학", "무역"];
}

/// Policy topics and the keywords that reveal them
const POLICY_TOPICS: &[(&str, &[&str])] = &[
    ("tariffs", &["tariff", "tariffs", "관세"]),
    ("trade", &["trade", "trade war", "protectionism", "무역", "보호무역"]),
    ("sanctions", &["sanction", "sanctions", "제재"]),
    ("us_china", &["china", "us-china", "중국", "미중"]),
    (
        "us_administration",
        &["trump", "white house", "administration", "트럼프", "대통령", "행정부"],
    ),
    (
        "interest_rates",
        &["interest rate", "interest rates", "fed", "federal reserve", "금리", "연준"],
    ),
    ("currency", &["currency", "exchange rate", "dollar", "환율", "달러", "원화"]),
];

/// Investment themes and their keywords
const THEMES: &[(&str, &[&str])] = &[
    ("ai", &["ai", "artificial intelligence", "인공지능"]),
    ("fintech", &["fintech", "핀테크"]),
    ("big_data", &["big data", "빅데이터"]),
];

/// Sector keywords mapped to sectors
const SECTOR_KEYWORDS: &[(Sector, &[&str])] = &[
    (Sector::Banking, &["bank", "banks", "banking", "은행"]),
    (Sector::Securities, &["securities", "brokerage", "증권"]),
    (Sector::Insurance, &["insurance", "insurer", "insurers", "보험"]),
];

/// Uppercase words that look like tickers but are not
const TICKER_STOP_LIST: &[&str] = &[
    "A", "I", "AI", "US", "USA", "UK", "EU", "CEO", "CFO", "CTO", "GDP", "CPI", "ETF", "IPO",
    "FED", "IT", "OK", "VS", "PDF", "KRX", "KOSPI", "KB", "NH", "DB", "JB", "BNK", "DGB", "LIG",
    "IBK",
    // valuation and performance metrics
    "PER", "PBR", "PSR", "PCR", "ROE", "ROA", "ROI", "ROIC", "EPS", "BPS", "DPS", "EBIT", "ESG",
    "NIM", "BIS", "CAGR", "YOY", "QOQ", "FX", "KRW", "USD",
];

/// A keyword list split into a compiled ASCII matcher and Hangul substrings
#[derive(Debug, Clone)]
struct KeywordSet {
    ascii: Option<Regex>,
    hangul: Vec<&'static str>,
}

impl KeywordSet {
    fn new(keywords: &[&'static str]) -> Result<Self> {
        let (ascii, hangul): (Vec<&str>, Vec<&str>) =
            keywords.iter().partition(|kw| kw.is_ascii());

        let ascii = if ascii.is_empty() {
            None
        } else {
            let alternatives = ascii
                .iter()
                .map(|kw| regex::escape(kw))
                .collect::<Vec<_>>()
                .join("|");
            let pattern = format!(r"(?i)(?:^|[^a-z0-9])(?:{alternatives})(?:[^a-z0-9]|$)");
            Some(Regex::new(&pattern).map_err(|e| {
                FinanceError::ConfigError(format!("invalid keyword pattern: {e}"))
            })?)
        };

        Ok(Self { ascii, hangul })
    }

    fn matches(&self, text: &str) -> bool {
        self.ascii.as_ref().is_some_and(|re| re.is_match(text))
            || self.hangul.iter().any(|kw| text.contains(kw))
    }
}

/// Deterministic keyword and pattern based classifier
#[derive(Debug, Clone)]
pub struct RuleClassifier {
    universe: Arc<CompanyUniverse>,
    market: KeywordSet,
    company: KeywordSet,
    sector: KeywordSet,
    geopolitical: KeywordSet,
    sectors: Vec<(Sector, KeywordSet)>,
    policy_topics: Vec<(&'static str, KeywordSet)>,
    themes: Vec<(&'static str, KeywordSet)>,
    ticker_re: Regex,
    code_re: Regex,
}

impl RuleClassifier {
    /// Create a classifier over the given company universe
    pub fn new(universe: Arc<CompanyUniverse>) -> Result<Self> {
        let merged = |en: &[&'static str], ko: &[&'static str]| {
            KeywordSet::new(&[en, ko].concat())
        };
        let tables = |table: &[(&'static str, &[&'static str])]| {
            table
                .iter()
                .map(|(name, kws)| Ok((*name, KeywordSet::new(kws)?)))
                .collect::<Result<Vec<_>>>()
        };
        let pattern = |p: &str| {
            Regex::new(p).map_err(|e| FinanceError::ConfigError(format!("invalid pattern: {e}")))
        };

        Ok(Self {
            market: merged(keywords_en::MARKET, keywords_ko::MARKET)?,
            company: merged(keywords_en::COMPANY, keywords_ko::COMPANY)?,
            sector: merged(keywords_en::SECTOR, keywords_ko::SECTOR)?,
            geopolitical: merged(keywords_en::GEOPOLITICAL, keywords_ko::GEOPOLITICAL)?,
            sectors: SECTOR_KEYWORDS
                .iter()
                .map(|(sector, kws)| Ok((*sector, KeywordSet::new(kws)?)))
                .collect::<Result<Vec<_>>>()?,
            policy_topics: tables(POLICY_TOPICS)?,
            themes: tables(THEMES)?,
            ticker_re: pattern(r"[A-Za-z]+")?,
            code_re: pattern(r"[0-9]+")?,
            universe,
        })
    }

    pub fn universe(&self) -> &CompanyUniverse {
        &self.universe
    }

    /// Extract entities from a query
    pub fn extract_entities(&self, text: &str) -> Entities {
        let mut entities = Entities::new();

        // 1-5 uppercase ASCII letters
        for word in self.ticker_re.find_iter(text).map(|m| m.as_str()) {
            if word.len() <= 5
                && word.chars().all(|c| c.is_ascii_uppercase())
                && !TICKER_STOP_LIST.contains(&word)
            {
                entities.insert(EntityKind::Ticker, word);
            }
        }

        // 6-digit KRX listing codes
        for code in self.code_re.find_iter(text).map(|m| m.as_str()) {
            if code.len() == 6 {
                entities.insert(EntityKind::Ticker, code);
                if let Some(company) = self.universe.by_code(code) {
                    entities.insert(EntityKind::Company, company.name.as_str());
                    entities.insert(EntityKind::Sector, company.sector.as_str());
                }
            }
        }

        for company in self.universe.mentioned_in(text) {
            entities.insert(EntityKind::Company, company.name.as_str());
            entities.insert(EntityKind::Ticker, company.code.as_str());
            entities.insert(EntityKind::Sector, company.sector.as_str());
        }

        for (sector, keywords) in &self.sectors {
            if keywords.matches(text) {
                entities.insert(EntityKind::Sector, sector.as_str());
            }
        }

        for (topic, keywords) in &self.policy_topics {
            if keywords.matches(text) {
                entities.insert(EntityKind::PolicyTopic, *topic);
            }
        }

        for (theme, keywords) in &self.themes {
            if keywords.matches(text) {
                entities.insert(EntityKind::Theme, *theme);
            }
        }

        entities
    }

    /// Detect intents from keywords and extracted entities
    pub fn detect_intents(&self, text: &str, entities: &Entities) -> BTreeSet<IntentKind> {
        let mut intents = BTreeSet::new();

        if self.market.matches(text) {
            intents.insert(IntentKind::MarketTrend);
        }
        if self.sector.matches(text) {
            intents.insert(IntentKind::Sector);
        }
        if self.company.matches(text) || !entities.get(EntityKind::Company).is_empty() {
            intents.insert(IntentKind::Company);
        }
        if self.geopolitical.matches(text) || !entities.get(EntityKind::PolicyTopic).is_empty() {
            intents.insert(IntentKind::Geopolitical);
        }

        intents
    }

    /// Classify a query into intents ordered by priority
    pub fn classify(&self, query: &Query) -> Result<Vec<Intent>> {
        let entities = self.extract_entities(query.text());
        let intents = self.detect_intents(query.text(), &entities);
        debug!(?intents, ?entities, "Rule-based classification");

        if intents.is_empty() {
            return Err(Error::Classification(format!(
                "could not determine what to analyse in '{}'",
                query.text().trim()
            ))
            .into());
        }

        Ok(into_intents(intents, &entities))
    }
}

fn into_intents(kinds: BTreeSet<IntentKind>, entities: &Entities) -> Vec<Intent> {
    kinds
        .into_iter()
        .map(|kind| Intent::new(kind, entities.clone()))
        .collect()
}

const LLM_SYSTEM_PROMPT: &str = r#"You classify financial analysis requests about Korean financial markets.

Answer with a single JSON object and nothing else:
{"intents": [...], "entities": {"ticker": [], "company": [], "sector": [], "policy_topic": [], "theme": []}}

Allowed intents:
- "market_trend": overall market direction, issues, outlook
- "sector": banking, securities or insurance sector analysis
- "company": analysis of specific listed companies or stocks
- "geopolitical": impact of policy, tariffs, trade or international politics

Use an empty intents list if the request is not about financial analysis."#;

#[derive(Debug, Deserialize)]
struct LlmAnswer {
    #[serde(default)]
    intents: Vec<String>,
    #[serde(default)]
    entities: BTreeMap<String, Vec<String>>,
}

/// Language model assisted intent detection
#[derive(Clone)]
pub struct LlmClassifier {
    provider: Arc<dyn LLMProvider>,
    model: String,
}

impl LlmClassifier {
    pub fn new(provider: Arc<dyn LLMProvider>, model: impl Into<String>) -> Self {
        Self {
            provider,
            model: model.into(),
        }
    }

    /// Ask the model; transport errors surface as `FinanceError::Llm`
    async fn classify(&self, text: &str) -> Result<(BTreeSet<IntentKind>, Entities)> {
        let request = CompletionRequest::builder(&self.model)
            .system(LLM_SYSTEM_PROMPT)
            .add_message(Message::user(text))
            .temperature(0.0)
            .max_tokens(256)
            .json_output()
            .build();

        let response = self.provider.complete(request).await?;
        parse_llm_answer(response.text())
    }
}

/// Validate a model answer against the closed intent set
fn parse_llm_answer(text: &str) -> Result<(BTreeSet<IntentKind>, Entities)> {
    let json = match (text.find('{'), text.rfind('}')) {
        (Some(start), Some(end)) if start < end => &text[start..=end],
        _ => {
            return Err(Error::Classification(format!(
                "model answer is not JSON: {}",
                text.trim()
            ))
            .into());
        }
    };

    let answer: LlmAnswer = serde_json::from_str(json)
        .map_err(|e| Error::Classification(format!("malformed model answer: {e}")))?;

    let intents = answer
        .intents
        .iter()
        .map(|label| label.parse::<IntentKind>())
        .collect::<agent_core::Result<BTreeSet<_>>>()?;

    if intents.is_empty() {
        return Err(Error::Classification("model found no analysis intent".to_string()).into());
    }

    let mut entities = Entities::new();
    for (kind, values) in answer.entities {
        match serde_json::from_value::<EntityKind>(serde_json::Value::String(kind.clone())) {
            Ok(kind) => entities.extend(kind, values),
            Err(_) => debug!(kind = %kind, "Ignoring unknown entity kind from model"),
        }
    }

    Ok((intents, entities))
}

/// Maps a raw query to the intents the supervisor should plan for
#[derive(Clone)]
pub struct QueryClassifier {
    rules: RuleClassifier,
    llm: Option<LlmClassifier>,
}

impl QueryClassifier {
    /// Rule-based classifier
    pub fn new(universe: Arc<CompanyUniverse>) -> Result<Self> {
        Ok(Self {
            rules: RuleClassifier::new(universe)?,
            llm: None,
        })
    }

    /// Delegate intent detection to a language model
    pub fn with_llm(mut self, llm: LlmClassifier) -> Self {
        self.llm = Some(llm);
        self
    }

    pub fn rules(&self) -> &RuleClassifier {
        &self.rules
    }

    /// Classify a query
    ///
    /// Fails with a classification error when no known intent matches.
    pub async fn classify(&self, query: &Query) -> Result<Vec<Intent>> {
        let Some(llm) = &self.llm else {
            return self.rules.classify(query);
        };

        match llm.classify(query.text()).await {
            Ok((intents, mut entities)) => {
                entities.merge(&self.rules.extract_entities(query.text()));
                debug!(?intents, "LLM classification");
                Ok(into_intents(intents, &entities))
            }
            Err(FinanceError::Llm(e)) => {
                warn!(error = %e, "LLM classifier unavailable, falling back to rules");
                self.rules.classify(query)
            }
            Err(e) => Err(e),
        }
    }
}
