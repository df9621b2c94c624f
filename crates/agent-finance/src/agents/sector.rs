//! Sector analysis agent

use super::{Draft, SearchSpec, cell, run_searches};
use crate::tools::names;
use crate::universe::{Company, CompanyUniverse, Sector};
use agent_core::{
    Agent, AgentDescriptor, ChartRef, EntityKind, IntentKind, TaskContext, TaskResult, Table,
};
use async_trait::async_trait;
use futures::future::join_all;
use serde_json::{Value, json};
use std::sync::Arc;
use tracing::{info, warn};

/// Analyses sector trends and compares the leading companies of each sector
pub struct SectorAgent {
    descriptor: AgentDescriptor,
    universe: Arc<CompanyUniverse>,
}

impl SectorAgent {
    pub fn new(universe: Arc<CompanyUniverse>) -> Self {
        Self {
            descriptor: AgentDescriptor::new("sector-analyst", IntentKind::Sector)
                .with_tool(names::WEB_SEARCH)
                .with_tool(names::STOCK_DATA),
            universe,
        }
    }

    /// Sectors named in the entities, or every sector
    fn target_sectors(ctx: &TaskContext) -> Vec<Sector> {
        let mut sectors: Vec<Sector> = Vec::new();
        for value in ctx.entities().get(EntityKind::Sector) {
            match value.parse::<Sector>() {
                Ok(sector) if !sectors.contains(&sector) => sectors.push(sector),
                Ok(_) => {}
                Err(e) => warn!(error = %e, "Skipping sector"),
            }
        }
        if sectors.is_empty() {
            sectors = Sector::ALL.to_vec();
        }
        sectors
    }

    fn searches(sector: Sector, leaders: &[&Company]) -> Vec<SearchSpec> {
        let ko = sector.korean_name();
        let names: Vec<&str> = leaders.iter().map(|c| c.name.as_str()).collect();
        vec![
            SearchSpec::new(
                format!("{ko} sector trend"),
                format!("{ko} 업종 최근 동향 분석"),
                5,
            ),
            SearchSpec::new(
                format!("{ko} company news"),
                format!("{} 기업 최근 소식", names.join(" ")),
                5,
            ),
            SearchSpec::new(
                format!("{ko} investment outlook"),
                format!("{ko} 업종 투자 전망"),
                3,
            ),
        ]
    }

    async fn analyse_sector(&self, ctx: &TaskContext, sector: Sector, draft: &mut Draft) -> Value {
        let leaders = self.universe.comparison_set(sector);
        let specs = Self::searches(sector, &leaders);
        for (spec, result) in specs.iter().zip(run_searches(ctx, &specs).await) {
            draft.add_search(spec, result);
        }

        let quotes = join_all(leaders.iter().map(|company| {
            ctx.call_tool(names::STOCK_DATA, json!({"symbol": company.code}))
        }))
        .await;

        let mut table = Table::new(
            format!("{} 업종 주요 기업 비교", sector.korean_name()),
            ["Company", "Code", "Last close", "3M change %", "RSI(14)", "Volatility %"],
        );
        let mut chart = ChartRef::new(
            format!("sector-{sector}-performance"),
            format!("{} 업종 3개월 수익률", sector.korean_name()),
            "bar",
        );
        let mut performance = Vec::new();

        for (company, quote) in leaders.iter().zip(quotes) {
            let Some(snapshot) = draft.record(quote) else {
                continue;
            };
            table.push_row([
                company.name.clone(),
                company.code.clone(),
                cell(&snapshot["last_close"], 0),
                cell(&snapshot["period_change_pct"], 2),
                cell(&snapshot["rsi14"], 1),
                cell(&snapshot["volatility_pct"], 1),
            ]);
            chart = chart.with_series(company.name.as_str());
            performance.push(json!({
                "code": company.code,
                "name": company.name,
                "period_change_pct": snapshot["period_change_pct"],
            }));
        }

        if !table.is_empty() {
            draft.payload.tables.push(table);
            draft.payload.charts.push(chart);
        }

        json!({
            "sector": sector,
            "companies": leaders.iter().map(|c| c.name.as_str()).collect::<Vec<_>>(),
            "performance": performance,
        })
    }
}

#[async_trait]
impl Agent for SectorAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: TaskContext) -> TaskResult {
        let sectors = Self::target_sectors(&ctx);
        info!(?sectors, "Analysing sectors");

        let mut draft = Draft::new();
        let mut data = Vec::with_capacity(sectors.len());
        for sector in &sectors {
            data.push(self.analyse_sector(&ctx, *sector, &mut draft).await);
        }

        let names: Vec<&str> = sectors.iter().map(Sector::korean_name).collect();
        draft.payload.summary = format!(
            "Trend, company news and investment outlook for the {} sector(s), with a comparison of leading companies.",
            names.join(", ")
        );
        draft.payload.data = json!({ "sectors": data });
        draft.finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::{FakeTools, canned, context};
    use agent_core::{Entities, ToolError};

    fn agent() -> SectorAgent {
        SectorAgent::new(Arc::new(CompanyUniverse::default()))
    }

    #[tokio::test]
    async fn test_named_sector() {
        let tools = FakeTools::healthy();
        let entities = Entities::new().with(EntityKind::Sector, "banking");
        let result = agent()
            .run(context(IntentKind::Sector, entities, tools.clone()))
            .await;
        assert!(result.is_success());

        let searches = tools.queries(names::WEB_SEARCH);
        assert_eq!(searches.len(), 3);
        assert_eq!(searches[0]["query"], "은행 업종 최근 동향 분석");
        assert_eq!(
            searches[1]["query"],
            "KB금융지주 신한지주 하나금융지주 우리금융지주 BNK금융지주 기업 최근 소식"
        );
        assert_eq!(tools.queries(names::STOCK_DATA).len(), 5);

        let payload = result.payload().unwrap();
        assert_eq!(payload.tables.len(), 1);
        assert_eq!(payload.tables[0].rows.len(), 5);
        assert_eq!(payload.tables[0].rows[0][2], "61200");
        assert_eq!(payload.charts[0].id, "sector-banking-performance");
        assert_eq!(payload.charts[0].series.len(), 5);
    }

    #[tokio::test]
    async fn test_all_sectors_by_default() {
        let tools = FakeTools::healthy();
        let result = agent()
            .run(context(IntentKind::Sector, Entities::new(), tools.clone()))
            .await;
        assert!(result.is_success());
        assert_eq!(tools.queries(names::WEB_SEARCH).len(), 9);
        assert_eq!(result.payload().unwrap().tables.len(), 3);
    }

    #[tokio::test]
    async fn test_missing_price_data_keeps_partial() {
        let tools = FakeTools::new(|tool, args| {
            if tool == names::STOCK_DATA && args["symbol"] == "055550" {
                Err(ToolError::fatal(tool, "no quotes"))
            } else {
                Ok(canned(tool, args))
            }
        });
        let entities = Entities::new().with(EntityKind::Sector, "banking");
        let result = agent()
            .run(context(IntentKind::Sector, entities, tools))
            .await;

        assert!(!result.is_success());
        assert!(!result.is_retriable());
        let partial = result.partial().unwrap();
        assert_eq!(partial.tables[0].rows.len(), 4);
    }
}
