//! Turns a result bundle into a report
//!
//! Compilation is a pure function of the bundle: the same bundle always
//! yields the same report, timestamps included.

use super::model::{Block, Report, Section, SectionKind};
use crate::error::Result;
use crate::universe::Sector;
use agent_core::{EntityKind, Error, IntentKind, Payload, Table, TaskResult};
use agent_workflow::{ResultBundle, TaskOutcome};
use tracing::debug;

const DEFAULT_TITLE: &str = "금융시장 분석 보고서";
const GEOPOLITICAL_PREFIX: &str = "트럼프 정책과";
const SYNTHESIS_TITLE: &str = "Synthesis";

/// Points to watch in every report
const MONITORING_POINTS: &[&str] = &[
    "글로벌 경제 지표의 변화",
    "기업들의 실적 발표",
    "정책 변화 및 규제 환경",
];

/// Additional points when policy impact was analysed
const GEOPOLITICAL_MONITORING_POINTS: &[&str] =
    &["미국의 무역 및 외교 정책 변화", "한미 관계 동향"];

/// Compiles result bundles into reports
#[derive(Debug, Clone, Default)]
pub struct ReportCompiler {}

impl ReportCompiler {
    pub fn new() -> Self {
        Self {}
    }

    /// Compile a bundle into a report
    ///
    /// Aborted and empty bundles cannot be compiled.
    pub fn compile(&self, bundle: &ResultBundle) -> Result<Report> {
        if bundle.outcomes.is_empty() {
            return Err(Error::Compilation("result bundle is empty".to_string()).into());
        }
        if bundle.is_aborted() {
            return Err(Error::Compilation(format!(
                "plan {} was aborted; nothing to report",
                bundle.plan_id
            ))
            .into());
        }

        let mut sections: Vec<Section> = bundle.outcomes().map(outcome_section).collect();
        sections.push(synthesis_section(bundle));

        let report = Report {
            title: report_title(bundle),
            generated_at: bundle.completed_at,
            sections,
        };
        debug!(title = %report.title, sections = report.sections.len(), "Report compiled");
        Ok(report)
    }
}

/// Title from the analysed entities: companies, then sectors, else generic
fn report_title(bundle: &ResultBundle) -> String {
    let companies = bundle.entity_values(EntityKind::Company);
    let sectors: Vec<&str> = bundle
        .entity_values(EntityKind::Sector)
        .iter()
        .filter_map(|s| s.parse::<Sector>().ok())
        .map(|s| s.korean_name())
        .collect();

    let title = if !companies.is_empty() {
        format!("{} 기업 분석 보고서", companies.join(", "))
    } else if !sectors.is_empty() {
        format!("{} 업종 분석 보고서", sectors.join(", "))
    } else {
        DEFAULT_TITLE.to_string()
    };

    if bundle.outcome(IntentKind::Geopolitical).is_some() {
        format!("{GEOPOLITICAL_PREFIX} {title}")
    } else {
        title
    }
}

fn push_payload(section: &mut Section, payload: &Payload) {
    if !payload.summary.is_empty() {
        section.push(Block::paragraph(&payload.summary));
    }
    for finding in &payload.findings {
        section.push(Block::finding(finding));
    }
    for table in &payload.tables {
        section.push(Block::Table(table.clone()));
    }
    for chart in &payload.charts {
        section.push(Block::ChartReference(chart.clone()));
    }
}

fn failure_reason(outcome: &TaskOutcome, message: &str) -> String {
    match outcome.attempts {
        0 => message.to_string(),
        1 => format!("{message} (after 1 attempt)"),
        n => format!("{message} (after {n} attempts)"),
    }
}

fn outcome_section(outcome: &TaskOutcome) -> Section {
    let mut section = Section::new(outcome.intent.into(), outcome.intent.title());
    match &outcome.result {
        TaskResult::Success { payload, .. } => push_payload(&mut section, payload),
        TaskResult::Failure {
            message, partial, ..
        } => {
            section.push(Block::data_unavailable(failure_reason(outcome, message)));
            if let Some(partial) = partial {
                section.push(Block::paragraph(
                    "Partial results gathered before the failure:",
                ));
                push_payload(&mut section, partial);
            }
        }
    }
    section
}

fn synthesis_section(bundle: &ResultBundle) -> Section {
    let mut section = Section::new(SectionKind::Synthesis, SYNTHESIS_TITLE);

    let total = bundle.outcomes.len();
    let succeeded = bundle.succeeded().count();
    section.push(Block::paragraph(format!(
        "{succeeded} of {total} analyses completed."
    )));

    // first finding of each successful section
    for outcome in bundle.succeeded() {
        if let Some(finding) = outcome.result.payload().and_then(|p| p.findings.first()) {
            section.push(Block::Paragraph {
                title: Some(format!("{}: {}", outcome.intent.title(), finding.title)),
                text: finding.detail.clone(),
                source: finding.source.clone(),
            });
        }
    }

    let mut coverage = Table::new("Analysis coverage", ["Analysis", "Status", "Attempts"]);
    for outcome in bundle.outcomes() {
        let status = match &outcome.result {
            TaskResult::Success { .. } => "completed".to_string(),
            TaskResult::Failure { kind, .. } => format!("unavailable ({kind})"),
        };
        coverage.push_row([
            outcome.intent.title().to_string(),
            status,
            outcome.attempts.to_string(),
        ]);
    }
    section.push(Block::Table(coverage));

    for failure in bundle.failures() {
        section.push(Block::titled(
            format!("Gap: {}", failure.intent.title()),
            failure.message,
        ));
    }

    let mut points: Vec<&str> = MONITORING_POINTS.to_vec();
    if bundle.outcome(IntentKind::Geopolitical).is_some() {
        points.extend_from_slice(GEOPOLITICAL_MONITORING_POINTS);
    }
    section.push(Block::titled("Monitoring points", points.join("; ")));

    section
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{Entities, FailureKind, Finding};
    use agent_workflow::PlanState;
    use chrono::{TimeZone, Utc};
    use std::collections::BTreeMap;
    use uuid::Uuid;

    fn outcome(intent: IntentKind, entities: Entities, result: TaskResult) -> TaskOutcome {
        TaskOutcome {
            intent,
            entities,
            requested: true,
            attempts: 1,
            result,
        }
    }

    fn success(summary: &str, finding: &str) -> TaskResult {
        TaskResult::success(
            Payload::new(summary).with_finding(Finding::new(finding, "detail").with_source("https://a")),
        )
    }

    fn bundle(state: PlanState, outcomes: Vec<TaskOutcome>) -> ResultBundle {
        ResultBundle {
            plan_id: Uuid::nil(),
            state,
            completed_at: Utc.with_ymd_and_hms(2025, 4, 2, 9, 30, 0).unwrap(),
            outcomes: outcomes.into_iter().map(|o| (o.intent, o)).collect::<BTreeMap<_, _>>(),
        }
    }

    fn partial_bundle() -> ResultBundle {
        let entities = Entities::new().with(EntityKind::PolicyTopic, "tariffs");
        bundle(
            PlanState::PartiallyCompleted,
            vec![
                outcome(
                    IntentKind::Geopolitical,
                    entities.clone(),
                    TaskResult::failure(FailureKind::Tool, "web_search: no API key", false)
                        .with_partial(Payload::new("half done")),
                ),
                outcome(IntentKind::MarketTrend, entities, success("Markets rose.", "Rally")),
            ],
        )
    }

    #[test]
    fn test_partial_bundle_sections() {
        let report = ReportCompiler::new().compile(&partial_bundle()).unwrap();

        let kinds: Vec<SectionKind> = report.sections.iter().map(|s| s.kind).collect();
        assert_eq!(
            kinds,
            vec![
                SectionKind::MarketTrend,
                SectionKind::Geopolitical,
                SectionKind::Synthesis
            ]
        );

        let market = report.section(SectionKind::MarketTrend).unwrap();
        assert!(!market.has_gap());
        assert_eq!(market.blocks[0], Block::paragraph("Markets rose."));

        let geo = report.section(SectionKind::Geopolitical).unwrap();
        assert_eq!(
            geo.blocks[0],
            Block::data_unavailable("web_search: no API key (after 1 attempt)")
        );
        assert_eq!(geo.blocks[2], Block::paragraph("half done"));

        let synthesis = report.section(SectionKind::Synthesis).unwrap();
        assert_eq!(synthesis.blocks[0], Block::paragraph("1 of 2 analyses completed."));
        assert!(synthesis.blocks.iter().any(|b| matches!(
            b,
            Block::Paragraph { title: Some(t), .. } if t == "Market Trend: Rally"
        )));
        assert!(synthesis.blocks.iter().any(|b| matches!(
            b,
            Block::Paragraph { title: Some(t), .. } if t == "Gap: Geopolitical Impact"
        )));
        let Some(Block::Paragraph { text, .. }) = synthesis.blocks.last() else {
            panic!("monitoring points missing");
        };
        assert!(text.contains("한미 관계 동향"));
    }

    #[test]
    fn test_compile_is_deterministic() {
        let compiler = ReportCompiler::new();
        let bundle = partial_bundle();
        let first = compiler.compile(&bundle).unwrap();
        let second = compiler.compile(&bundle).unwrap();
        assert_eq!(first, second);
        assert_eq!(
            serde_json::to_string(&first).unwrap(),
            serde_json::to_string(&second).unwrap()
        );
        assert_eq!(first.generated_at, bundle.completed_at);
    }

    #[test]
    fn test_titles() {
        let report = ReportCompiler::new().compile(&partial_bundle()).unwrap();
        assert_eq!(report.title, "트럼프 정책과 금융시장 분석 보고서");

        let sectors = Entities::new()
            .with(EntityKind::Sector, "banking")
            .with(EntityKind::Sector, "insurance");
        let report = ReportCompiler::new()
            .compile(&bundle(
                PlanState::Completed,
                vec![outcome(IntentKind::Sector, sectors.clone(), success("s", "f"))],
            ))
            .unwrap();
        assert_eq!(report.title, "은행, 보험 업종 분석 보고서");

        let companies = sectors.with(EntityKind::Company, "KB금융지주");
        let report = ReportCompiler::new()
            .compile(&bundle(
                PlanState::Completed,
                vec![outcome(IntentKind::Company, companies, success("c", "f"))],
            ))
            .unwrap();
        assert_eq!(report.title, "KB금융지주 기업 분석 보고서");
    }

    #[test]
    fn test_aborted_or_empty_bundle_fails() {
        let compiler = ReportCompiler::new();

        let err = compiler
            .compile(&bundle(PlanState::Completed, Vec::new()))
            .unwrap_err();
        assert!(matches!(err, crate::FinanceError::Core(Error::Compilation(_))));

        let aborted = bundle(
            PlanState::Aborted,
            vec![outcome(
                IntentKind::Sector,
                Entities::new(),
                TaskResult::failure(FailureKind::Cancelled, "cancelled", false),
            )],
        );
        let err = compiler.compile(&aborted).unwrap_err();
        assert!(matches!(err, crate::FinanceError::Core(Error::Compilation(_))));
    }
}
