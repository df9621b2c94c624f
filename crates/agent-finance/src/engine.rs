//! Analysis engine: query in, report out
//!
//! The engine owns one instance of every long-lived component. A query is
//! classified, planned and executed by the supervisor, and the resulting
//! bundle is compiled into a report.

use crate::agents::{CompanyAgent, GeopoliticalAgent, MarketTrendAgent, SectorAgent};
use crate::classifier::{LlmClassifier, QueryClassifier};
use crate::config::{ClassifierMode, FinanceConfig};
use crate::error::{FinanceError, Result};
use crate::report::{OutputFormat, Report, ReportCompiler, ReportWriter};
use crate::tools::{LlmSummarizeTool, StockDataTool, WebSearchTool, names};
use crate::universe::CompanyUniverse;
use agent_core::{Agent, Intent, Query};
use agent_llm::providers::{OpenAIConfig, OpenAIProvider};
use agent_llm::LLMProvider;
use agent_tools::{InvokerStats, ResultCache, Tool, ToolInvoker, ToolRegistry};
use agent_workflow::{AgentRegistry, ResultBundle, Supervisor};
use std::path::PathBuf;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

/// Everything produced while answering one query
#[derive(Debug, Clone)]
pub struct Analysis {
    pub query: Query,
    pub intents: Vec<Intent>,
    pub bundle: ResultBundle,
    pub report: Report,
}

/// Financial analysis engine
pub struct AnalysisEngine {
    classifier: QueryClassifier,
    supervisor: Supervisor,
    compiler: ReportCompiler,
    writer: ReportWriter,
    cache: ResultCache,
}

impl AnalysisEngine {
    /// Build an engine with the default tools and agents
    pub async fn new(config: FinanceConfig) -> Result<Self> {
        Self::builder(config).build().await
    }

    pub fn builder(config: FinanceConfig) -> EngineBuilder {
        EngineBuilder::new(config)
    }

    pub fn classifier(&self) -> &QueryClassifier {
        &self.classifier
    }

    pub fn supervisor(&self) -> &Supervisor {
        &self.supervisor
    }

    pub fn writer(&self) -> &ReportWriter {
        &self.writer
    }

    /// Tool activity since the engine was built
    pub fn stats(&self) -> InvokerStats {
        self.supervisor.invoker().stats()
    }

    /// Classify, execute and compile a query
    ///
    /// Fails with a classification error when the query matches no intent and
    /// with a plan-aborted error when no requested analysis succeeded.
    pub async fn analyze(&self, raw: &str, cancel: &CancellationToken) -> Result<Analysis> {
        let query = Query::new(raw.trim());
        let intents = self.classifier.classify(&query).await?;
        info!(
            intents = ?intents.iter().map(|i| i.kind).collect::<Vec<_>>(),
            "Query classified"
        );

        let bundle = self.supervisor.run(&intents, cancel).await?;
        info!(
            plan_id = %bundle.plan_id,
            state = %bundle.state,
            succeeded = bundle.succeeded().count(),
            total = bundle.outcomes.len(),
            "Plan finished"
        );

        let report = self.compiler.compile(&bundle)?;
        Ok(Analysis {
            query,
            intents,
            bundle,
            report,
        })
    }

    /// Render a report and write it to the output directory
    pub async fn write_report(&self, report: &Report, format: OutputFormat) -> Result<PathBuf> {
        self.writer.write(report, format).await
    }

    /// Persist the tool cache
    pub async fn shutdown(&self) -> Result<()> {
        let entries = self.cache.flush().await?;
        debug!(entries, "Tool cache flushed");
        Ok(())
    }
}

/// Assembles an [`AnalysisEngine`], with optional replacements for tools,
/// agents and the language model
pub struct EngineBuilder {
    config: FinanceConfig,
    universe: Option<Arc<CompanyUniverse>>,
    provider: Option<Arc<dyn LLMProvider>>,
    tools: Vec<Arc<dyn Tool>>,
    agents: Vec<Arc<dyn Agent>>,
}

impl EngineBuilder {
    pub fn new(config: FinanceConfig) -> Self {
        Self {
            config,
            universe: None,
            provider: None,
            tools: Vec::new(),
            agents: Vec::new(),
        }
    }

    pub fn with_universe(mut self, universe: Arc<CompanyUniverse>) -> Self {
        self.universe = Some(universe);
        self
    }

    /// Use this model instead of one built from the configuration
    pub fn with_llm_provider(mut self, provider: Arc<dyn LLMProvider>) -> Self {
        self.provider = Some(provider);
        self
    }

    /// Register a tool, replacing the default tool of the same name
    pub fn with_tool(mut self, tool: Arc<dyn Tool>) -> Self {
        self.tools.push(tool);
        self
    }

    /// Register an agent, replacing the default agent for its intent
    pub fn with_agent(mut self, agent: Arc<dyn Agent>) -> Self {
        self.agents.push(agent);
        self
    }

    fn provider(&self) -> Result<Option<Arc<dyn LLMProvider>>> {
        if let Some(provider) = &self.provider {
            return Ok(Some(Arc::clone(provider)));
        }
        let llm = &self.config.llm;
        if !llm.is_configured() {
            return Ok(None);
        }
        let mut openai = OpenAIConfig::new(llm.api_key.clone().unwrap_or_default())
            .with_timeout(llm.timeout_secs);
        if let Some(base) = &llm.api_base {
            openai = openai.with_api_base(base.clone());
        }
        Ok(Some(Arc::new(OpenAIProvider::with_config(openai)?)))
    }

    pub async fn build(self) -> Result<AnalysisEngine> {
        self.config.validate()?;
        let config = &self.config;
        let universe = self
            .universe
            .clone()
            .unwrap_or_else(|| Arc::new(CompanyUniverse::default()));
        let provider = self.provider()?;

        let tools = ToolRegistry::new();
        tools.register(Arc::new(WebSearchTool::from_config(config)?));
        tools.register(Arc::new(StockDataTool::new(
            config.tool_ttl(names::STOCK_DATA),
        )));
        if let Some(provider) = &provider {
            tools.register(Arc::new(LlmSummarizeTool::new(
                Arc::clone(provider),
                &config.llm,
                config.tool_ttl(names::LLM_SUMMARIZE),
            )));
        }
        for tool in &self.tools {
            tools.register(Arc::clone(tool));
        }
        let narrative = tools.get(names::LLM_SUMMARIZE).is_some();

        let cache = match &config.cache_path {
            Some(path) => {
                ResultCache::open(path, config.cache_capacity, config.cache_ttl()).await?
            }
            None => ResultCache::new(config.cache_capacity, config.cache_ttl()),
        };
        let invoker = ToolInvoker::new(Arc::new(tools), cache.clone(), config.request_timeout());

        let mut agents = AgentRegistry::new()
            .with(Arc::new(MarketTrendAgent::new()))
            .with(Arc::new(SectorAgent::new(Arc::clone(&universe))))
            .with(Arc::new(CompanyAgent::new(Arc::clone(&universe))))
            .with(Arc::new(GeopoliticalAgent::new(narrative)));
        for agent in self.agents {
            if agents.register(agent).is_some() {
                debug!("Replaced default agent");
            }
        }

        let mut classifier = QueryClassifier::new(universe)?;
        if config.classifier_mode == ClassifierMode::Llm {
            let provider = provider.ok_or_else(|| {
                FinanceError::ConfigError("LLM classifier requires a language model".to_string())
            })?;
            classifier = classifier.with_llm(LlmClassifier::new(provider, config.llm.model.clone()));
        }

        info!(
            tools = ?invoker.registry().names(),
            agents = agents.len(),
            classifier = ?config.classifier_mode,
            "Analysis engine ready"
        );

        Ok(AnalysisEngine {
            classifier,
            supervisor: Supervisor::new(agents, invoker, config.supervisor_config()),
            compiler: ReportCompiler::new(),
            writer: ReportWriter::from_config(config),
            cache,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::agents::testing::canned;
    use crate::report::SectionKind;
    use agent_core::{Error, IntentKind, ToolError};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    type Handler = Box<dyn Fn(&Value) -> std::result::Result<Value, ToolError> + Send + Sync>;

    struct FakeTool {
        name: &'static str,
        handler: Handler,
        calls: AtomicUsize,
    }

    impl FakeTool {
        fn new(
            name: &'static str,
            handler: impl Fn(&Value) -> std::result::Result<Value, ToolError> + Send + Sync + 'static,
        ) -> Arc<Self> {
            Arc::new(Self {
                name,
                handler: Box::new(handler),
                calls: AtomicUsize::new(0),
            })
        }

        fn healthy(name: &'static str) -> Arc<Self> {
            Self::new(name, move |args| Ok(canned(name, args)))
        }
    }

    #[async_trait]
    impl Tool for FakeTool {
        async fn call(&self, args: Value) -> std::result::Result<Value, ToolError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            (self.handler)(&args)
        }

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "fake"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
    }

    fn config() -> FinanceConfig {
        FinanceConfig::builder()
            .in_memory_cache()
            .max_retries(1)
            .retry_backoff(Duration::from_millis(1), Duration::from_millis(2))
            .pdf_command(None)
            .build()
            .unwrap()
    }

    async fn engine(search: Arc<FakeTool>) -> AnalysisEngine {
        AnalysisEngine::builder(config())
            .with_tool(search)
            .with_tool(FakeTool::healthy(names::STOCK_DATA))
            .build()
            .await
            .unwrap()
    }

    #[tokio::test]
    async fn test_full_analysis() {
        let engine = engine(FakeTool::healthy(names::WEB_SEARCH)).await;
        let analysis = engine
            .analyze("은행 업종에서 KB금융지주 주식 분석", &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(analysis.bundle.succeeded().count(), 2);
        assert_eq!(analysis.report.title, "KB금융지주 기업 분석 보고서");
        assert!(analysis.report.section(SectionKind::Sector).is_some());
        assert!(analysis.report.section(SectionKind::Company).is_some());
        assert_eq!(
            analysis.report.sections.last().unwrap().kind,
            SectionKind::Synthesis
        );
        assert!(engine.stats().invocations > 0);
    }

    #[tokio::test]
    async fn test_policy_failure_yields_partial_report() {
        let search = FakeTool::new(names::WEB_SEARCH, |args| {
            let query = args["query"].as_str().unwrap_or_default();
            if query.contains("트럼프") {
                Err(ToolError::fatal(names::WEB_SEARCH, "policy news unavailable"))
            } else {
                Ok(canned(names::WEB_SEARCH, args))
            }
        });
        let engine = engine(search).await;
        let analysis = engine
            .analyze(
                "트럼프 관세 정책이 한국 증권 업종에 미치는 영향",
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        // market trend runs as an implicit dependency of the policy analysis
        assert!(analysis.bundle.outcome(IntentKind::MarketTrend).is_some());
        let geo = analysis.report.section(SectionKind::Geopolitical).unwrap();
        assert!(geo.has_gap());
        assert!(!analysis.report.section(SectionKind::Sector).unwrap().has_gap());
        assert!(analysis.report.title.starts_with("트럼프 정책과"));
    }

    #[tokio::test]
    async fn test_all_failures_abort() {
        let search = FakeTool::new(names::WEB_SEARCH, |_| {
            Err(ToolError::fatal(names::WEB_SEARCH, "TAVILY_API_KEY is not set"))
        });
        let engine = engine(search).await;
        let err = engine
            .analyze("최근 금융 시장 동향 알려줘", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(matches!(err, FinanceError::Core(Error::PlanAborted { .. })));
    }

    #[tokio::test]
    async fn test_retriable_failure_is_retried() {
        let attempts = Arc::new(AtomicUsize::new(0));
        let seen = Arc::clone(&attempts);
        let search = FakeTool::new(names::WEB_SEARCH, move |args| {
            if seen.fetch_add(1, Ordering::SeqCst) == 0 {
                Err(ToolError::retriable(names::WEB_SEARCH, "timeout"))
            } else {
                Ok(canned(names::WEB_SEARCH, args))
            }
        });
        let engine = engine(search).await;
        let analysis = engine
            .analyze("최근 금융 시장 동향 알려줘", &CancellationToken::new())
            .await
            .unwrap();

        let outcome = analysis.bundle.outcome(IntentKind::MarketTrend).unwrap();
        assert!(outcome.result.is_success());
        assert_eq!(outcome.attempts, 2);
    }

    #[tokio::test]
    async fn test_unclassifiable_query() {
        let search = FakeTool::healthy(names::WEB_SEARCH);
        let engine = engine(Arc::clone(&search)).await;
        let err = engine
            .analyze("hello there", &CancellationToken::new())
            .await
            .unwrap_err();
        assert!(err.is_classification());
        assert_eq!(search.calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancelled_before_start() {
        let engine = engine(FakeTool::healthy(names::WEB_SEARCH)).await;
        let cancel = CancellationToken::new();
        cancel.cancel();
        let err = engine
            .analyze("최근 금융 시장 동향 알려줘", &cancel)
            .await
            .unwrap_err();
        assert!(matches!(err, FinanceError::Core(Error::PlanAborted { .. })));
    }

    #[tokio::test]
    async fn test_llm_mode_without_model_is_rejected() {
        let mut config = config();
        config.classifier_mode = ClassifierMode::Llm;
        let result = AnalysisEngine::new(config).await;
        assert!(matches!(result, Err(FinanceError::ConfigError(_))));
    }

    #[tokio::test]
    async fn test_write_and_shutdown() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = config();
        config.output_dir = dir.path().join("reports");
        config.cache_path = Some(dir.path().join("cache.json"));

        let engine = AnalysisEngine::builder(config)
            .with_tool(FakeTool::healthy(names::WEB_SEARCH))
            .build()
            .await
            .unwrap();
        let analysis = engine
            .analyze("최근 금융 시장 동향 알려줘", &CancellationToken::new())
            .await
            .unwrap();
        let path = engine
            .write_report(&analysis.report, OutputFormat::Markdown)
            .await
            .unwrap();
        assert!(path.exists());

        engine.shutdown().await.unwrap();
        assert!(dir.path().join("cache.json").exists());
    }
}
