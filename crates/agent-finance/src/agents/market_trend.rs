//! Market trend agent

use super::{Draft, SearchSpec, run_searches};
use crate::tools::names;
use agent_core::{Agent, AgentDescriptor, EntityKind, IntentKind, TaskContext, TaskResult};
use async_trait::async_trait;
use serde_json::json;
use tracing::info;

/// Market covered when a query does not narrow it down
const DEFAULT_MARKET: &str = "한국 금융시장";

/// Korean search term for an investment theme
fn theme_term(theme: &str) -> &str {
    match theme {
        "ai" => "AI",
        "fintech" => "핀테크",
        "big_data" => "빅데이터",
        other => other,
    }
}

/// Researches recent trend, key issues and outlook of the market
pub struct MarketTrendAgent {
    descriptor: AgentDescriptor,
    market: String,
}

impl Default for MarketTrendAgent {
    fn default() -> Self {
        Self::new()
    }
}

impl MarketTrendAgent {
    pub fn new() -> Self {
        Self {
            descriptor: AgentDescriptor::new("market-trend", IntentKind::MarketTrend)
                .with_tool(names::WEB_SEARCH),
            market: DEFAULT_MARKET.to_string(),
        }
    }

    /// Cover a different market
    pub fn with_market(mut self, market: impl Into<String>) -> Self {
        self.market = market.into();
        self
    }

    fn searches(&self, themes: &[String]) -> Vec<SearchSpec> {
        let market = &self.market;
        let mut specs = vec![
            SearchSpec::new("Recent trend", format!("{market} 최근 동향 분석"), 5),
            SearchSpec::new("Key issues", format!("{market} 주요 이슈 키워드"), 3),
            SearchSpec::new("Expert outlook", format!("{market} 전문가 전망 분석"), 3),
            SearchSpec::new("Current events", "금융 최신 뉴스 오늘", 3),
        ];
        for theme in themes {
            let term = theme_term(theme);
            specs.push(SearchSpec::new(
                format!("Theme: {term}"),
                format!("{term} 금융 산업 트렌드 전망"),
                3,
            ));
        }
        specs
    }
}

#[async_trait]
impl Agent for MarketTrendAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: TaskContext) -> TaskResult {
        let themes = ctx.entities().get(EntityKind::Theme).to_vec();
        let specs = self.searches(&themes);
        info!(market = %self.market, searches = specs.len(), "Researching market trend");

        let mut draft = Draft::new();
        for (spec, result) in specs.iter().zip(run_searches(&ctx, &specs).await) {
            draft.add_search(spec, result);
        }

        let headlines: Vec<&str> = draft
            .payload
            .findings
            .iter()
            .take(5)
            .map(|f| f.title.as_str())
            .collect();
        let data = json!({
            "market": self.market,
            "themes": themes,
            "headlines": headlines,
        });

        let theme_note = if themes.is_empty() {
            String::new()
        } else {
            let terms: Vec<&str> = themes.iter().map(|t| theme_term(t)).collect();
            format!(" with focus on {}", terms.join(", "))
        };
        draft.payload.summary = format!(
            "Recent trend, key issues and expert outlook for {}{theme_note}, drawn from {} sources.",
            self.market,
            draft.payload.findings.len()
        );
        draft.payload.data = data;

        draft.finish()
    }
}
