//! Orchestration state machine
//!
//! The supervisor turns classified intents into an [`ExecutionPlan`], runs
//! the plan's tasks as a DAG (independent tasks concurrently, dependents
//! after their dependencies), retries retriable failures and decides whether
//! the collected results are good enough to report on.

use crate::bundle::{PlanState, ResultBundle, TaskOutcome, TaskState};
use crate::plan::{DependencyStrength, ExecutionPlan, Task};
use crate::registry::AgentRegistry;
use crate::retry::RetryPolicy;
use agent_core::{
    Agent, Error, FailureKind, Intent, IntentKind, Payload, Result, TaskContext, TaskResult,
    ToolCaller,
};
use agent_tools::ToolInvoker;
use chrono::Utc;
use futures::FutureExt;
use futures::future::BoxFuture;
use futures::stream::{FuturesUnordered, StreamExt};
use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

type TaskFuture = BoxFuture<'static, (IntentKind, u32, TaskResult)>;

/// Supervisor settings
#[derive(Debug, Clone)]
pub struct SupervisorConfig {
    pub retry: RetryPolicy,
    /// Upper bound on concurrently running tasks
    pub max_parallel: usize,
    /// Edge strength overrides keyed by (dependent, dependency); others are hard
    pub edge_strengths: BTreeMap<(IntentKind, IntentKind), DependencyStrength>,
}

impl Default for SupervisorConfig {
    fn default() -> Self {
        Self {
            retry: RetryPolicy::default(),
            max_parallel: 4,
            edge_strengths: BTreeMap::from([(
                (IntentKind::Geopolitical, IntentKind::MarketTrend),
                DependencyStrength::Soft,
            )]),
        }
    }
}

impl SupervisorConfig {
    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    pub fn with_max_parallel(mut self, max_parallel: usize) -> Self {
        self.max_parallel = max_parallel;
        self
    }

    pub fn with_edge_strength(
        mut self,
        dependent: IntentKind,
        dependency: IntentKind,
        strength: DependencyStrength,
    ) -> Self {
        self.edge_strengths.insert((dependent, dependency), strength);
        self
    }

    pub fn edge_strength(&self, dependent: IntentKind, dependency: IntentKind) -> DependencyStrength {
        self.edge_strengths
            .get(&(dependent, dependency))
            .copied()
            .unwrap_or_default()
    }
}

enum Readiness {
    Ready,
    Waiting,
    Blocked(IntentKind),
}

/// Plans and executes analysis tasks
pub struct Supervisor {
    registry: AgentRegistry,
    invoker: ToolInvoker,
    config: SupervisorConfig,
}

impl Supervisor {
    pub fn new(registry: AgentRegistry, invoker: ToolInvoker, config: SupervisorConfig) -> Self {
        Self {
            registry,
            invoker,
            config,
        }
    }

    pub fn registry(&self) -> &AgentRegistry {
        &self.registry
    }

    pub fn invoker(&self) -> &ToolInvoker {
        &self.invoker
    }

    pub fn config(&self) -> &SupervisorConfig {
        &self.config
    }

    fn agent_for(&self, intent: IntentKind) -> Result<Arc<dyn Agent>> {
        self.registry.get(intent).ok_or_else(|| {
            Error::InvalidPlan(format!("no agent registered for intent '{intent}'"))
        })
    }

    /// Build the execution plan for a set of intents
    ///
    /// Duplicate intents are merged. Intents consumed by an agent but not
    /// requested are added as implicit tasks carrying the requester's
    /// entities.
    pub fn plan(&self, intents: &[Intent]) -> Result<ExecutionPlan> {
        if intents.is_empty() {
            return Err(Error::InvalidPlan("no intents to plan".to_string()));
        }

        let mut builder = ExecutionPlan::builder();
        let mut pending = Vec::with_capacity(intents.len());
        for intent in intents {
            let agent = self.agent_for(intent.kind)?;
            builder.add_task(Task::new(intent.kind, agent.name(), intent.entities.clone(), true));
            pending.push(intent.kind);
        }

        let mut expanded = BTreeSet::new();
        while let Some(intent) = pending.pop() {
            if !expanded.insert(intent) {
                continue;
            }
            let agent = self.agent_for(intent)?;
            for &dependency in &agent.descriptor().consumes {
                if !builder.contains(dependency) {
                    let dependency_agent = self.agent_for(dependency)?;
                    let entities = builder.entities(intent).cloned().unwrap_or_default();
                    builder.add_task(Task::new(dependency, dependency_agent.name(), entities, false));
                    tracing::debug!(%intent, %dependency, "Added implicit dependency task");
                }
                builder.add_dependency(intent, dependency, self.config.edge_strength(intent, dependency))?;
                pending.push(dependency);
            }
        }

        let plan = builder.build()?;
        tracing::info!(
            plan_id = %plan.id(),
            tasks = ?plan.order(),
            requested = ?plan.requested(),
            "Built execution plan"
        );
        Ok(plan)
    }

    /// Plan and execute, failing with [`Error::PlanAborted`] if nothing usable came back
    pub async fn run(&self, intents: &[Intent], cancel: &CancellationToken) -> Result<ResultBundle> {
        let plan = self.plan(intents)?;
        self.execute(&plan, cancel).await.into_result()
    }

    /// Execute a plan to completion or cancellation
    pub async fn execute(&self, plan: &ExecutionPlan, cancel: &CancellationToken) -> ResultBundle {
        let tools: Arc<dyn ToolCaller> = Arc::new(self.invoker.scoped());
        let max_parallel = self.config.max_parallel.max(1);
        tracing::info!(
            plan_id = %plan.id(),
            tasks = plan.len(),
            roots = ?plan.roots(),
            state = %PlanState::Executing,
            "Executing plan"
        );

        let mut states: BTreeMap<IntentKind, TaskState> =
            plan.order().iter().map(|intent| (*intent, TaskState::Pending)).collect();
        let mut outcomes: BTreeMap<IntentKind, TaskOutcome> = BTreeMap::new();
        let mut running: FuturesUnordered<TaskFuture> = FuturesUnordered::new();

        loop {
            if !cancel.is_cancelled() {
                // Topological order lets a blocked task unblock its own dependents in one pass
                for task in plan.tasks() {
                    if states.get(&task.intent) != Some(&TaskState::Pending) {
                        continue;
                    }
                    match readiness(task, &outcomes) {
                        Readiness::Waiting => {}
                        Readiness::Blocked(dependency) => {
                            let message = Error::DependencyFailure {
                                task: task.intent,
                                dependency,
                            }
                            .to_string();
                            let result = TaskResult::failure(FailureKind::Dependency, message, false);
                            record(&mut states, &mut outcomes, task, 0, result);
                        }
                        Readiness::Ready if running.len() < max_parallel => {
                            let Some(agent) = self.registry.get(task.intent) else {
                                let result = TaskResult::failure(
                                    FailureKind::Agent,
                                    format!("no agent registered for intent '{}'", task.intent),
                                    false,
                                );
                                record(&mut states, &mut outcomes, task, 0, result);
                                continue;
                            };

                            let mut ctx = TaskContext::new(task.intent, task.entities.clone(), Arc::clone(&tools));
                            for dependency in &task.depends_on {
                                if let Some(payload) = outcomes.get(&dependency.on).and_then(|o| o.result.payload()) {
                                    ctx = ctx.with_upstream(dependency.on, payload.clone());
                                }
                            }

                            states.insert(task.intent, TaskState::Running);
                            tracing::debug!(intent = %task.intent, agent = %task.agent, "Task running");
                            running.push(
                                run_with_retry(agent, ctx, self.config.retry.clone(), cancel.clone()).boxed(),
                            );
                        }
                        Readiness::Ready => {}
                    }
                }
            }

            let Some((intent, attempts, result)) = running.next().await else {
                break;
            };
            if let Some(task) = plan.task(intent) {
                record(&mut states, &mut outcomes, task, attempts, result);
            }
        }

        // Anything without an outcome never started because of cancellation
        for task in plan.tasks() {
            if !outcomes.contains_key(&task.intent) {
                let result = TaskResult::failure(
                    FailureKind::Cancelled,
                    "plan cancelled before the task started",
                    false,
                );
                record(&mut states, &mut outcomes, task, 0, result);
            }
        }

        let state = resolve_state(&outcomes, cancel.is_cancelled());
        tracing::info!(
            plan_id = %plan.id(),
            %state,
            succeeded = outcomes.values().filter(|o| o.is_success()).count(),
            failed = outcomes.values().filter(|o| !o.is_success()).count(),
            "Plan finished"
        );

        ResultBundle {
            plan_id: plan.id(),
            state,
            completed_at: Utc::now(),
            outcomes,
        }
    }
}

fn readiness(task: &Task, outcomes: &BTreeMap<IntentKind, TaskOutcome>) -> Readiness {
    let blocked = task.depends_on.iter().find(|dependency| {
        dependency.strength == DependencyStrength::Hard
            && outcomes.get(&dependency.on).is_some_and(|o| !o.is_success())
    });
    if let Some(dependency) = blocked {
        return Readiness::Blocked(dependency.on);
    }

    if task.depends_on.iter().all(|dependency| outcomes.contains_key(&dependency.on)) {
        Readiness::Ready
    } else {
        Readiness::Waiting
    }
}

fn record(
    states: &mut BTreeMap<IntentKind, TaskState>,
    outcomes: &mut BTreeMap<IntentKind, TaskOutcome>,
    task: &Task,
    attempts: u32,
    result: TaskResult,
) {
    let state = if result.is_success() {
        TaskState::Succeeded
    } else {
        TaskState::Failed {
            retriable: result.is_retriable(),
        }
    };

    match result.failure_message() {
        None => tracing::info!(intent = %task.intent, attempts, "Task succeeded"),
        Some(error) => tracing::warn!(intent = %task.intent, attempts, error, "Task failed"),
    }

    states.insert(task.intent, state);
    outcomes.insert(
        task.intent,
        TaskOutcome {
            intent: task.intent,
            entities: task.entities.clone(),
            requested: task.requested,
            attempts,
            result,
        },
    );
}

fn resolve_state(outcomes: &BTreeMap<IntentKind, TaskOutcome>, cancelled: bool) -> PlanState {
    if cancelled || outcomes.values().any(TaskOutcome::is_cancelled) {
        return PlanState::Aborted;
    }
    if outcomes.values().all(TaskOutcome::is_success) {
        return PlanState::Completed;
    }
    if outcomes.values().any(|o| o.requested && o.is_success()) {
        PlanState::PartiallyCompleted
    } else {
        PlanState::Aborted
    }
}

/// Run an agent, retrying retriable failures per the policy
///
/// Returns the number of attempts made and the final result. A failure that
/// is returned is always fatal and carries the richest partial payload any
/// attempt produced.
async fn run_with_retry(
    agent: Arc<dyn Agent>,
    ctx: TaskContext,
    policy: RetryPolicy,
    cancel: CancellationToken,
) -> (IntentKind, u32, TaskResult) {
    let intent = ctx.intent();
    let mut best_partial: Option<Payload> = None;
    let mut attempt: u32 = 0;

    loop {
        let result = agent.run(ctx.clone().with_attempt(attempt)).await;
        if result.is_success() {
            return (intent, attempt + 1, result);
        }

        if let Some(partial) = result.partial() {
            if best_partial
                .as_ref()
                .is_none_or(|best| partial.weight() > best.weight())
            {
                best_partial = Some(partial.clone());
            }
        }

        if !result.is_retriable() {
            return (intent, attempt + 1, finalize(result, best_partial));
        }
        if cancel.is_cancelled() {
            return (intent, attempt + 1, cancelled(best_partial));
        }
        if !policy.allows_retry(attempt) {
            tracing::warn!(%intent, attempts = attempt + 1, "Retries exhausted");
            return (intent, attempt + 1, finalize(result, best_partial));
        }

        let retry = attempt + 1;
        let delay = policy.backoff_duration(retry);
        tracing::warn!(
            %intent,
            agent = agent.name(),
            retry,
            max_retries = policy.max_retries,
            retry_in_ms = delay.as_millis() as u64,
            error = result.failure_message().unwrap_or_default(),
            "Retrying task after retriable failure"
        );
        tokio::select! {
            () = tokio::time::sleep(delay) => {}
            () = cancel.cancelled() => {
                tracing::debug!(%intent, "Cancelled during retry backoff");
                return (intent, retry, cancelled(best_partial));
            }
        }
        attempt = retry;
    }
}

/// Failure of a task whose retries were cut short by cancellation
fn cancelled(best_partial: Option<Payload>) -> TaskResult {
    let result = TaskResult::failure(FailureKind::Cancelled, "plan cancelled while retrying", false);
    match best_partial {
        Some(partial) => result.with_partial(partial),
        None => result,
    }
}

fn finalize(result: TaskResult, best_partial: Option<Payload>) -> TaskResult {
    let result = match best_partial {
        Some(partial) => result.with_partial(partial),
        None => result,
    };
    result.into_fatal()
}

#[cfg(test)]
mod tests {
    use super::*;
    use agent_core::{AgentDescriptor, Entities, EntityKind, Finding, ToolError, ToolErrorKind};
    use agent_tools::{ResultCache, Tool, ToolRegistry};
    use async_trait::async_trait;
    use serde_json::{Value, json};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    /// Tool that fails its first `failures` calls with `kind`, then succeeds
    struct ScriptTool {
        name: &'static str,
        calls: AtomicU32,
        failures: u32,
        kind: ToolErrorKind,
        delay: Duration,
    }

    impl ScriptTool {
        fn ok(name: &'static str) -> Arc<Self> {
            Self::failing(name, 0, ToolErrorKind::Fatal)
        }

        fn failing(name: &'static str, failures: u32, kind: ToolErrorKind) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicU32::new(0),
                failures,
                kind,
                delay: Duration::ZERO,
            })
        }

        fn slow(name: &'static str, delay: Duration) -> Arc<Self> {
            Arc::new(Self {
                name,
                calls: AtomicU32::new(0),
                failures: 0,
                kind: ToolErrorKind::Fatal,
                delay,
            })
        }

        fn calls(&self) -> u32 {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Tool for ScriptTool {
        async fn call(&self, args: Value) -> std::result::Result<Value, ToolError> {
            let n = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            if n < self.failures {
                return Err(match self.kind {
                    ToolErrorKind::Retriable => ToolError::retriable(self.name, "upstream unavailable"),
                    ToolErrorKind::Fatal => ToolError::fatal(self.name, "rejected"),
                });
            }
            Ok(json!({ "tool": self.name, "args": args }))
        }

        fn name(&self) -> &str {
            self.name
        }

        fn description(&self) -> &str {
            "scripted test tool"
        }

        fn input_schema(&self) -> Value {
            json!({"type": "object"})
        }
    }

    /// Agent that makes one tool call and reports what it saw upstream
    struct ToolAgent {
        descriptor: AgentDescriptor,
        tool: &'static str,
        args: Value,
        runs: AtomicU32,
    }

    impl ToolAgent {
        fn new(intent: IntentKind, tool: &'static str) -> Arc<Self> {
            Self::with_args(intent, tool, json!({ "intent": intent.as_str() }))
        }

        fn with_args(intent: IntentKind, tool: &'static str, args: Value) -> Arc<Self> {
            let mut descriptor = AgentDescriptor::new(format!("{intent}-agent"), intent).with_tool(tool);
            if intent == IntentKind::Geopolitical {
                descriptor = descriptor.consumes(IntentKind::MarketTrend);
            }
            Arc::new(Self {
                descriptor,
                tool,
                args,
                runs: AtomicU32::new(0),
            })
        }

        fn runs(&self) -> u32 {
            self.runs.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl Agent for ToolAgent {
        fn descriptor(&self) -> &AgentDescriptor {
            &self.descriptor
        }

        async fn run(&self, ctx: TaskContext) -> TaskResult {
            self.runs.fetch_add(1, Ordering::SeqCst);
            let upstream = ctx
                .upstream(IntentKind::MarketTrend)
                .map(|p| p.summary.clone());

            match ctx.call_tool(self.tool, self.args.clone()).await {
                Ok(value) => TaskResult::success(
                    Payload::new(format!("{} done", ctx.intent()))
                        .with_data(json!({ "tool": value, "upstream": upstream })),
                ),
                Err(e) => {
                    let mut partial = Payload::new("partial");
                    for i in 0..=ctx.attempt() {
                        partial = partial.with_finding(Finding::new("attempt", i.to_string()));
                    }
                    TaskResult::tool_failure(&e).with_partial(partial)
                }
            }
        }
    }

    fn supervisor(agents: &[Arc<ToolAgent>], tools: &[Arc<ScriptTool>], config: SupervisorConfig) -> Supervisor {
        let tool_registry = Arc::new(ToolRegistry::new());
        for tool in tools {
            tool_registry.register(Arc::clone(tool) as Arc<dyn Tool>);
        }
        let invoker = ToolInvoker::new(
            tool_registry,
            ResultCache::new(64, Duration::from_secs(60)),
            Duration::from_secs(1),
        );

        let mut registry = AgentRegistry::new();
        for agent in agents {
            registry.register(Arc::clone(agent) as Arc<dyn Agent>);
        }
        Supervisor::new(registry, invoker, config)
    }

    fn fast_config() -> SupervisorConfig {
        SupervisorConfig::default().with_retry(RetryPolicy::fast())
    }

    fn intent(kind: IntentKind) -> Intent {
        Intent::new(kind, Entities::new())
    }

    #[test]
    fn test_plan_adds_implicit_dependency() {
        let sup = supervisor(
            &[
                ToolAgent::new(IntentKind::MarketTrend, "search"),
                ToolAgent::new(IntentKind::Geopolitical, "search"),
            ],
            &[],
            fast_config(),
        );

        let geo = Intent::new(
            IntentKind::Geopolitical,
            Entities::new().with(EntityKind::PolicyTopic, "tariffs"),
        );
        let plan = sup.plan(&[geo]).unwrap();

        assert_eq!(plan.order(), [IntentKind::MarketTrend, IntentKind::Geopolitical]);
        assert_eq!(plan.requested(), vec![IntentKind::Geopolitical]);
        let market = plan.task(IntentKind::MarketTrend).unwrap();
        assert!(!market.requested);
        assert_eq!(market.entities.first(EntityKind::PolicyTopic), Some("tariffs"));
        let edge = plan.task(IntentKind::Geopolitical).unwrap().depends_on[0];
        assert_eq!(edge.strength, DependencyStrength::Soft);
    }

    #[test]
    fn test_plan_merges_duplicates_and_rejects_unknown() {
        let sup = supervisor(&[ToolAgent::new(IntentKind::Sector, "search")], &[], fast_config());

        let plan = sup
            .plan(&[
                Intent::new(IntentKind::Sector, Entities::new().with(EntityKind::Sector, "banking")),
                Intent::new(IntentKind::Sector, Entities::new().with(EntityKind::Sector, "insurance")),
            ])
            .unwrap();
        assert_eq!(plan.len(), 1);

        let err = sup.plan(&[intent(IntentKind::Company)]).unwrap_err();
        assert!(matches!(err, Error::InvalidPlan(msg) if msg.contains("company")));
    }

    #[tokio::test]
    async fn test_all_tasks_succeed() {
        let search = ScriptTool::ok("search");
        let sup = supervisor(
            &[
                ToolAgent::new(IntentKind::MarketTrend, "search"),
                ToolAgent::new(IntentKind::Sector, "search"),
            ],
            &[Arc::clone(&search)],
            fast_config(),
        );

        let bundle = sup
            .run(&[intent(IntentKind::MarketTrend), intent(IntentKind::Sector)], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bundle.state, PlanState::Completed);
        assert_eq!(bundle.outcomes.len(), 2);
        assert!(bundle.outcomes().all(|o| o.attempts == 1));
        assert_eq!(search.calls(), 2);
    }

    #[tokio::test]
    async fn test_partial_failure_yields_partially_completed() {
        let search = ScriptTool::ok("search");
        let llm = ScriptTool::failing("llm", u32::MAX, ToolErrorKind::Fatal);
        let sup = supervisor(
            &[
                ToolAgent::new(IntentKind::MarketTrend, "search"),
                ToolAgent::new(IntentKind::Geopolitical, "llm"),
            ],
            &[search, Arc::clone(&llm)],
            fast_config(),
        );

        let bundle = sup
            .run(
                &[intent(IntentKind::MarketTrend), intent(IntentKind::Geopolitical)],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(bundle.state, PlanState::PartiallyCompleted);
        assert!(bundle.outcome(IntentKind::MarketTrend).unwrap().is_success());
        let geo = bundle.outcome(IntentKind::Geopolitical).unwrap();
        assert!(!geo.is_success());
        // Fatal errors are not retried
        assert_eq!(geo.attempts, 1);
        assert_eq!(llm.calls(), 1);
    }

    #[tokio::test]
    async fn test_all_requested_fail_aborts() {
        let broken = ScriptTool::failing("search", u32::MAX, ToolErrorKind::Fatal);
        let sup = supervisor(
            &[
                ToolAgent::new(IntentKind::Sector, "search"),
                ToolAgent::with_args(IntentKind::Company, "search", json!({"q": "company"})),
            ],
            &[broken],
            fast_config(),
        );

        let err = sup
            .run(&[intent(IntentKind::Sector), intent(IntentKind::Company)], &CancellationToken::new())
            .await
            .unwrap_err();

        match err {
            Error::PlanAborted { failures } => {
                let intents: Vec<IntentKind> = failures.iter().map(|f| f.intent).collect();
                assert_eq!(intents, vec![IntentKind::Sector, IntentKind::Company]);
            }
            other => panic!("expected PlanAborted, got {other:?}"),
        }
    }

    #[tokio::test]
    async fn test_hard_dependency_failure_skips_dependent() {
        let broken = ScriptTool::failing("search", u32::MAX, ToolErrorKind::Fatal);
        let llm = ScriptTool::ok("llm");
        let market = ToolAgent::new(IntentKind::MarketTrend, "search");
        let geo = ToolAgent::new(IntentKind::Geopolitical, "llm");
        let config = fast_config().with_edge_strength(
            IntentKind::Geopolitical,
            IntentKind::MarketTrend,
            DependencyStrength::Hard,
        );
        let sup = supervisor(&[market, Arc::clone(&geo)], &[broken, Arc::clone(&llm)], config);

        let plan = sup.plan(&[intent(IntentKind::Geopolitical)]).unwrap();
        let bundle = sup.execute(&plan, &CancellationToken::new()).await;

        assert_eq!(bundle.state, PlanState::Aborted);
        let outcome = bundle.outcome(IntentKind::Geopolitical).unwrap();
        assert_eq!(outcome.attempts, 0);
        assert!(matches!(
            outcome.result,
            TaskResult::Failure { kind: FailureKind::Dependency, retriable: false, .. }
        ));
        assert_eq!(geo.runs(), 0);
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_soft_dependency_failure_still_runs_dependent() {
        let broken = ScriptTool::failing("search", u32::MAX, ToolErrorKind::Fatal);
        let llm = ScriptTool::ok("llm");
        let geo = ToolAgent::new(IntentKind::Geopolitical, "llm");
        let sup = supervisor(
            &[ToolAgent::new(IntentKind::MarketTrend, "search"), Arc::clone(&geo)],
            &[broken, llm],
            fast_config(),
        );

        let bundle = sup
            .run(&[intent(IntentKind::Geopolitical)], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bundle.state, PlanState::PartiallyCompleted);
        assert_eq!(geo.runs(), 1);
        let payload = bundle.outcome(IntentKind::Geopolitical).unwrap().result.payload().unwrap();
        assert_eq!(payload.data["upstream"], Value::Null);
    }

    #[tokio::test]
    async fn test_dependency_payload_passed_downstream() {
        let sup = supervisor(
            &[
                ToolAgent::new(IntentKind::MarketTrend, "search"),
                ToolAgent::new(IntentKind::Geopolitical, "search"),
            ],
            &[ScriptTool::ok("search")],
            fast_config(),
        );

        let bundle = sup
            .run(&[intent(IntentKind::Geopolitical)], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bundle.state, PlanState::Completed);
        let payload = bundle.outcome(IntentKind::Geopolitical).unwrap().result.payload().unwrap();
        assert_eq!(payload.data["upstream"], "market_trend done");
    }

    #[tokio::test]
    async fn test_retry_bound_and_best_partial() {
        let flaky = ScriptTool::failing("search", u32::MAX, ToolErrorKind::Retriable);
        let sup = supervisor(
            &[
                ToolAgent::new(IntentKind::MarketTrend, "search"),
                ToolAgent::with_args(IntentKind::Sector, "quotes", json!({})),
            ],
            &[Arc::clone(&flaky), ScriptTool::ok("quotes")],
            fast_config(),
        );

        let bundle = sup
            .run(&[intent(IntentKind::MarketTrend), intent(IntentKind::Sector)], &CancellationToken::new())
            .await
            .unwrap();

        let market = bundle.outcome(IntentKind::MarketTrend).unwrap();
        // max_retries = 2: one attempt plus two retries
        assert_eq!(flaky.calls(), 3);
        assert_eq!(market.attempts, 3);
        assert!(!market.result.is_retriable());
        // The last attempt produced the richest partial payload
        assert_eq!(market.result.partial().unwrap().findings.len(), 3);
    }

    #[tokio::test]
    async fn test_retriable_failure_recovers() {
        let flaky = ScriptTool::failing("search", 1, ToolErrorKind::Retriable);
        let sup = supervisor(
            &[ToolAgent::new(IntentKind::MarketTrend, "search")],
            &[Arc::clone(&flaky)],
            fast_config(),
        );

        let bundle = sup
            .run(&[intent(IntentKind::MarketTrend)], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bundle.state, PlanState::Completed);
        assert_eq!(bundle.outcome(IntentKind::MarketTrend).unwrap().attempts, 2);
        assert_eq!(flaky.calls(), 2);
    }

    #[tokio::test]
    async fn test_identical_tool_calls_deduplicated() {
        let shared = ScriptTool::slow("search", Duration::from_millis(30));
        let args = json!({"query": "KB Financial outlook"});
        let sup = supervisor(
            &[
                ToolAgent::with_args(IntentKind::Sector, "search", args.clone()),
                ToolAgent::with_args(IntentKind::Company, "search", args),
            ],
            &[Arc::clone(&shared)],
            fast_config(),
        );

        let bundle = sup
            .run(&[intent(IntentKind::Sector), intent(IntentKind::Company)], &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(bundle.state, PlanState::Completed);
        assert_eq!(shared.calls(), 1);
    }

    #[tokio::test]
    async fn test_cancelled_before_start_aborts() {
        let search = ScriptTool::ok("search");
        let sup = supervisor(
            &[ToolAgent::new(IntentKind::MarketTrend, "search")],
            &[Arc::clone(&search)],
            fast_config(),
        );
        let cancel = CancellationToken::new();
        cancel.cancel();

        let plan = sup.plan(&[intent(IntentKind::MarketTrend)]).unwrap();
        let bundle = sup.execute(&plan, &cancel).await;

        assert_eq!(bundle.state, PlanState::Aborted);
        assert!(bundle.outcome(IntentKind::MarketTrend).unwrap().is_cancelled());
        assert_eq!(search.calls(), 0);
        assert!(bundle.into_result().is_err());
    }

    #[tokio::test]
    async fn test_cancel_mid_plan_drains_running_tasks() {
        let slow = ScriptTool::slow("search", Duration::from_millis(80));
        let llm = ScriptTool::ok("llm");
        let sup = supervisor(
            &[
                ToolAgent::new(IntentKind::MarketTrend, "search"),
                ToolAgent::new(IntentKind::Geopolitical, "llm"),
            ],
            &[slow, Arc::clone(&llm)],
            fast_config(),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let plan = sup.plan(&[intent(IntentKind::Geopolitical)]).unwrap();
        let bundle = sup.execute(&plan, &cancel).await;

        assert_eq!(bundle.state, PlanState::Aborted);
        assert!(bundle.outcome(IntentKind::MarketTrend).unwrap().is_success());
        assert!(bundle.outcome(IntentKind::Geopolitical).unwrap().is_cancelled());
        assert_eq!(llm.calls(), 0);
    }

    #[tokio::test]
    async fn test_cancel_after_all_dispatched_aborts() {
        let slow = ScriptTool::slow("search", Duration::from_millis(80));
        let sup = supervisor(
            &[ToolAgent::new(IntentKind::MarketTrend, "search")],
            &[Arc::clone(&slow)],
            fast_config(),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(10)).await;
            trigger.cancel();
        });

        let plan = sup.plan(&[intent(IntentKind::MarketTrend)]).unwrap();
        let bundle = sup.execute(&plan, &cancel).await;

        // the running task drains, but the plan still resolves as cancelled
        assert_eq!(slow.calls(), 1);
        assert!(bundle.outcome(IntentKind::MarketTrend).unwrap().is_success());
        assert_eq!(bundle.state, PlanState::Aborted);
        assert!(bundle.into_result().is_err());
    }

    #[tokio::test]
    async fn test_cancel_during_retry_backoff() {
        let flaky = ScriptTool::failing("search", u32::MAX, ToolErrorKind::Retriable);
        let slow = ScriptTool::slow("quotes", Duration::from_millis(80));
        let sup = supervisor(
            &[
                ToolAgent::new(IntentKind::MarketTrend, "search"),
                ToolAgent::with_args(IntentKind::Sector, "quotes", json!({})),
            ],
            &[Arc::clone(&flaky), slow],
            SupervisorConfig::default().with_retry(RetryPolicy::new(
                5,
                Duration::from_secs(5),
                Duration::from_secs(5),
                2.0,
            )),
        );
        let cancel = CancellationToken::new();
        let trigger = cancel.clone();
        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(20)).await;
            trigger.cancel();
        });

        let plan = sup
            .plan(&[intent(IntentKind::MarketTrend), intent(IntentKind::Sector)])
            .unwrap();
        let bundle = sup.execute(&plan, &cancel).await;

        assert_eq!(bundle.state, PlanState::Aborted);
        assert_eq!(flaky.calls(), 1);
        let market = bundle.outcome(IntentKind::MarketTrend).unwrap();
        assert!(market.is_cancelled());
        assert_eq!(market.result.partial().unwrap().summary, "partial");
        assert!(bundle.outcome(IntentKind::Sector).unwrap().is_success());
    }

    #[tokio::test]
    async fn test_max_parallel_one_still_completes() {
        let sup = supervisor(
            &[
                ToolAgent::new(IntentKind::MarketTrend, "search"),
                ToolAgent::new(IntentKind::Sector, "search"),
                ToolAgent::new(IntentKind::Company, "search"),
            ],
            &[ScriptTool::ok("search")],
            fast_config().with_max_parallel(1),
        );

        let bundle = sup
            .run(
                &[intent(IntentKind::Company), intent(IntentKind::Sector), intent(IntentKind::MarketTrend)],
                &CancellationToken::new(),
            )
            .await
            .unwrap();

        assert_eq!(bundle.state, PlanState::Completed);
        assert_eq!(bundle.outcomes.len(), 3);
    }
}
