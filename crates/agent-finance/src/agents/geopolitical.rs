//! Geopolitical impact agent

use super::{Draft, SearchSpec, run_searches};
use crate::tools::names;
use crate::universe::Sector;
use agent_core::{
    Agent, AgentDescriptor, EntityKind, Finding, IntentKind, Payload, TaskContext, TaskResult,
};
use async_trait::async_trait;
use serde_json::json;
use std::fmt::Write as _;
use tracing::{debug, info};

/// Topic analysed when the query names none
const DEFAULT_TOPIC: &str = "us_administration";

/// Search query and label for a policy topic
fn topic_search(topic: &str) -> (String, String) {
    let (label, query) = match topic {
        "tariffs" => ("Tariff policy", "트럼프 관세 정책 한국 금융시장 영향"),
        "trade" => ("Trade policy", "미국 무역정책 한국 경제 영향"),
        "sanctions" => ("Sanctions", "미국 제재 정책 한국 금융 영향"),
        "us_china" => ("US-China relations", "미중 갈등 한국 금융시장 영향"),
        "us_administration" => ("US administration", "트럼프 행정부 정책 한국 경제 영향"),
        "interest_rates" => ("Interest rates", "미국 금리 정책 한국 금융시장 영향"),
        "currency" => ("Currency", "원달러 환율 전망 금융시장 영향"),
        other => {
            return (
                format!("Policy: {other}"),
                format!("{other} 한국 금융시장 영향"),
            );
        }
    };
    (label.to_string(), query.to_string())
}

/// Assesses how policy and international politics affect the markets
pub struct GeopoliticalAgent {
    descriptor: AgentDescriptor,
    /// Whether a language model is available for the narrative
    narrative: bool,
}

impl GeopoliticalAgent {
    /// Create the agent; without a model the narrative is a fixed summary
    pub fn new(narrative: bool) -> Self {
        let mut descriptor = AgentDescriptor::new("geopolitical-analyst", IntentKind::Geopolitical)
            .with_tool(names::WEB_SEARCH)
            .consumes(IntentKind::MarketTrend);
        if narrative {
            descriptor = descriptor.with_tool(names::LLM_SUMMARIZE);
        }
        Self {
            descriptor,
            narrative,
        }
    }

    /// Policy topic labels and the searches covering them
    fn searches(ctx: &TaskContext) -> (Vec<String>, Vec<SearchSpec>) {
        let entities = ctx.entities();
        let mut topics: Vec<&str> = entities
            .get(EntityKind::PolicyTopic)
            .iter()
            .map(String::as_str)
            .collect();
        if topics.is_empty() {
            topics.push(DEFAULT_TOPIC);
        }
        let mut labels = Vec::with_capacity(topics.len());
        let mut specs = Vec::with_capacity(topics.len());
        for topic in topics {
            let (label, query) = topic_search(topic);
            specs.push(SearchSpec::new(label.clone(), query, 5));
            labels.push(label);
        }

        let mut industries: Vec<&str> = entities
            .get(EntityKind::Sector)
            .iter()
            .filter_map(|s| s.parse::<Sector>().ok())
            .map(|s| s.korean_name())
            .collect();
        if entities.contains(EntityKind::Theme, "fintech") {
            industries.push("핀테크");
        }
        for industry in industries {
            specs.push(SearchSpec::new(
                format!("Impact on {industry}"),
                format!("트럼프 정책 {industry} 업종 영향"),
                3,
            ));
        }
        (labels, specs)
    }

    /// Material handed to the model: findings plus market context
    fn narrative_context(payload: &Payload, market: Option<&Payload>) -> String {
        let mut context = String::new();
        if let Some(market) = market {
            let _ = writeln!(context, "Market context: {}", market.summary);
            for finding in market.findings.iter().take(5) {
                let _ = writeln!(context, "- {}: {}", finding.title, finding.detail);
            }
            context.push('\n');
        }
        context.push_str("Policy news:\n");
        for finding in &payload.findings {
            let _ = writeln!(context, "- {}: {}", finding.title, finding.detail);
        }
        context
    }

    fn fallback_narrative(topics: &[String]) -> String {
        format!(
            "Policy developments around {} may affect Korean financial markets through trade, \
             currency and capital flows. Language model analysis was not available; \
             see the news findings above for details.",
            topics.join(", ")
        )
    }
}

#[async_trait]
impl Agent for GeopoliticalAgent {
    fn descriptor(&self) -> &AgentDescriptor {
        &self.descriptor
    }

    async fn run(&self, ctx: TaskContext) -> TaskResult {
        let (topics, specs) = Self::searches(&ctx);
        let market = ctx.upstream(IntentKind::MarketTrend);
        info!(
            searches = specs.len(),
            market_context = market.is_some(),
            "Analysing geopolitical impact"
        );

        let mut draft = Draft::new();
        for (spec, result) in specs.iter().zip(run_searches(&ctx, &specs).await) {
            draft.add_search(spec, result);
        }

        let narrative = if self.narrative && !draft.has_error() {
            let context = Self::narrative_context(&draft.payload, market);
            let response = ctx
                .call_tool(
                    names::LLM_SUMMARIZE,
                    json!({
                        "instruction": "Assess the impact of these policy developments on Korean \
                                        financial markets and the sectors mentioned. Close with \
                                        points investors should monitor.",
                        "context": context,
                    }),
                )
                .await;
            draft
                .record(response)
                .and_then(|v| v["summary"].as_str().map(str::to_string))
        } else {
            debug!("Using fallback narrative");
            None
        };

        let narrative_from_model = narrative.is_some();
        let narrative = narrative.unwrap_or_else(|| Self::fallback_narrative(&topics));
        draft
            .payload
            .findings
            .insert(0, Finding::new("Policy impact assessment", narrative));

        if let Some(market) = market {
            draft.payload.findings.push(
                Finding::new("Market context", market.summary.clone())
                    .with_source(IntentKind::MarketTrend.as_str()),
            );
        }

        draft.payload.summary = format!(
            "Impact of {} on Korean financial markets.",
            topics.join(", ")
        );
        draft.payload.data = json!({
            "topics": topics,
            "model_narrative": narrative_from_model,
            "market_context_used": market.is_some(),
        });
        draft.finish()
    }
}
