//! Company (stock) analysis agent

use super::{Draft, SearchSpec, cell, run_searches};
use crate::tools::names;
use crate::universe::{Company, CompanyUniverse};
use agent_core::{
    Agent, AgentDescriptor, ChartRef, EntityKind, IntentKind, TaskContext, TaskResult, Table,
};
use async_trait::async_trait;
use serde_json::json;
use std::sync::Arc;
use tracing::info;

/// Upper bound on companies analysed for one query
const MAX_COMPANIES: usize = 5;

/// A company to analyse: a universe member or a bare ticker
#[derive(Debug, Clone, PartialEq, Eq)]
struct Target {
    name: String,
    symbol: String,
}

impl From<&Company> for Target {
    fn from(company: &Company) -> Self {
        Self {
            name: company.name.clone(),
            symbol: company.code.clone(),
        }
    }
}

/// Researches individual companies and snapshots their price data
pub struct CompanyAgent {
    descriptor: AgentDescriptor,
    universe: Arc<CompanyUniverse>,
}

impl CompanyAgent {
    pub fn new(universe: Arc<CompanyUniverse>) -> Self {
        Self {
            descriptor: AgentDescriptor::new("company-analyst", IntentKind::Company)
                .with_tool(names::WEB_SEARCH)
                .with_tool(names::STOCK_DATA),
            universe,
        }
    }

    /// Companies and tickers named in the entities, or the default targets
    fn targets(&self, ctx: &TaskContext) -> Vec<Target> {
        let entities = ctx.entities();
        let mut targets: Vec<Target> = Vec::new();
        let mut push = |target: Target| {
            if !targets.iter().any(|t| t.symbol == target.symbol) {
                targets.push(target);
            }
        };

        for name in entities.get(EntityKind::Company) {
            if let Some(company) = self.universe.find(name) {
                push(company.into());
            }
        }
        for ticker in entities.get(EntityKind::Ticker) {
            match self.universe.by_code(ticker) {
                Some(company) => push(company.into()),
                None => push(Target {
                    name: ticker.clone(),
                    symbol: ticker.clone(),
                }),
            }
        }

        if targets.is_empty() {
            targets = self
                .universe
                .default_targets()
                .into_iter()
                .map(Target::from)
                .collect();
        }
        targets.truncate(MAX_COMPANIES);
        targets
    }

    fn searches(name: &str) -> Vec<SearchSpec> {
        vec![
            SearchSpec::new(format!("{name} overview"), format!("{name} 기업 개요 사업영역"), 3),
            SearchSpec::new(format!("{name} news"), format!("{name} 최근 뉴스 소식"), 5),
            SearchSpec::new(format!("{name} financials"), format!("{name} 재무제표 실적"), 3),
            SearchSpec::new(
                format!("{name} analyst opinion"),
                format!("{name} 주식 투자의견 목표가"),
                3,
            ),
            SearchSpec::new(format!("{name} strategy"), format!("{name} 사업 전략 방향"), 3),
        ]
    }
}

#[async_trait]
impl Agent for CompanyAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: TaskContext) -> TaskResult {
        let targets = self.targets(&ctx);
        info!(companies = targets.len(), "Analysing companies");

        let mut draft = Draft::new();
        let mut table = Table::new(
            "Price snapshot",
            [
                "Company",
                "Symbol",
                "Last close",
                "Daily %",
                "3M %",
                "SMA20",
                "SMA50",
                "RSI(14)",
                "Volatility %",
            ],
        );
        let mut snapshots = Vec::with_capacity(targets.len());

        for target in &targets {
            let specs = Self::searches(&target.name);
            for (spec, result) in specs.iter().zip(run_searches(&ctx, &specs).await) {
                draft.add_search(spec, result);
            }

            let quote = ctx
                .call_tool(names::STOCK_DATA, json!({"symbol": target.symbol}))
                .await;
            let Some(snapshot) = draft.record(quote) else {
                continue;
            };

            table.push_row([
                target.name.clone(),
                snapshot["symbol"]
                    .as_str()
                    .unwrap_or(&target.symbol)
                    .to_string(),
                cell(&snapshot["last_close"], 0),
                cell(&snapshot["daily_change_pct"], 2),
                cell(&snapshot["period_change_pct"], 2),
                cell(&snapshot["sma20"], 0),
                cell(&snapshot["sma50"], 0),
                cell(&snapshot["rsi14"], 1),
                cell(&snapshot["volatility_pct"], 1),
            ]);
            draft.payload.charts.push(
                ChartRef::new(
                    format!("company-{}-price", target.symbol),
                    format!("{} 주가 추이", target.name),
                    "line",
                )
                .with_series("close")
                .with_series("sma20")
                .with_series("sma50"),
            );
            snapshots.push(json!({"name": target.name, "snapshot": snapshot}));
        }

        if !table.is_empty() {
            draft.payload.tables.push(table);
        }

        let names: Vec<&str> = targets.iter().map(|t| t.name.as_str()).collect();
        draft.payload.summary = format!(
            "Business overview, recent news, financials, analyst opinion and strategy for {}.",
            names.join(", ")
        );
        draft.payload.data = json!({ "companies": snapshots });
        draft.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{FakeTools, context};
    use agent_core::Entities;

    fn agent() -> CompanyAgent {
        CompanyAgent::new(Arc::new(CompanyUniverse::default()))
    }

    #[tokio::test]
    async fn test_named_company() {
        let tools = FakeTools::healthy();
        let entities = Entities::new()
            .with(EntityKind::Company, "KB금융지주")
            .with(EntityKind::Ticker, "105560");
        let result = agent()
            .run(context(IntentKind::Company, entities, tools.clone()))
            .await;
        assert!(result.is_success());

        let searches = tools.queries(names::WEB_SEARCH);
        assert_eq!(searches.len(), 5);
        assert_eq!(searches[0]["query"], "KB금융지주 기업 개요 사업영역");
        assert_eq!(tools.queries(names::STOCK_DATA), vec![json!({"symbol": "105560"})]);

        let payload = result.payload().unwrap();
        assert_eq!(payload.tables[0].rows.len(), 1);
        assert_eq!(payload.tables[0].rows[0][1], "105560");
        assert_eq!(payload.charts[0].id, "company-105560-price");
    }

    #[tokio::test]
    async fn test_default_targets() {
        let tools = FakeTools::healthy();
        let result = agent()
            .run(context(IntentKind::Company, Entities::new(), tools.clone()))
            .await;
        assert!(result.is_success());

        let symbols: Vec<_> = tools
            .queries(names::STOCK_DATA)
            .iter()
            .map(|q| q["symbol"].as_str().unwrap().to_string())
            .collect();
        assert_eq!(symbols, vec!["105560", "006800", "032830"]);
    }

    #[tokio::test]
    async fn test_foreign_ticker() {
        let tools = FakeTools::healthy();
        let entities = Entities::new().with(EntityKind::Ticker, "AAPL");
        let result = agent()
            .run(context(IntentKind::Company, entities, tools.clone()))
            .await;
        assert!(result.is_success());
        assert_eq!(tools.queries(names::STOCK_DATA), vec![json!({"symbol": "AAPL"})]);
    }
}
