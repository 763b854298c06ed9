//! Coordination loop
//!
//! The [`Coordinator`] owns the conversation of every analysis run:
//!
//! 1. open a gateway session and check that every declared tool is served
//! 2. seed the conversation with the task and hand the floor to the orchestrator
//! 3. invoke the active agent, validate its message and append it
//! 4. run requested tools through the bridge and fold the results back in
//! 5. follow the orchestrator's directives until it concludes
//!
//! Exactly one agent is active at a time. The session is closed on every exit
//! path, including cancellation and abandoned runs.

use crate::bridge::{BridgeConfig, ToolBridge};
use crate::observer::{NoOpObserver, RunObserver};
use futures::future::join_all;
use std::collections::HashSet;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use tokio::time::timeout;
use tokio_util::sync::CancellationToken;
use tracing::{Instrument, debug, info, info_span, warn};
use uuid::Uuid;
use verdict_core::{
    Agent, AgentRole, ConversationState, Directive, Error, Message, RunContext, RunError,
    RunErrorKind, ToolSpec, Verdict,
};
use verdict_gateway::{GatewayFactory, ToolGateway};

/// Limits of the coordination loop
#[derive(Debug, Clone)]
pub struct LoopConfig {
    /// Agent invocations allowed per run; a healthy run takes 7
    pub max_turns: usize,

    /// Times the orchestrator may hand the floor to the same specialist
    pub max_delegations: usize,

    /// Upper bound for a single agent turn
    pub agent_timeout: Duration,

    /// Wall-clock budget of a whole run
    pub run_timeout: Duration,

    pub bridge: BridgeConfig,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            max_turns: 12,
            max_delegations: 2,
            agent_timeout: Duration::from_secs(120),
            run_timeout: Duration::from_secs(300),
            bridge: BridgeConfig::default(),
        }
    }
}

/// The agents taking part in a run, one per role
#[derive(Clone)]
pub struct AgentRoster {
    orchestrator: Arc<dyn Agent>,
    sentiment: Arc<dyn Agent>,
    technical: Arc<dyn Agent>,
}

impl AgentRoster {
    /// Build a roster, checking that each agent plays the role of its slot
    pub fn new(
        orchestrator: Arc<dyn Agent>,
        sentiment: Arc<dyn Agent>,
        technical: Arc<dyn Agent>,
    ) -> verdict_core::Result<Self> {
        let roster = Self {
            orchestrator,
            sentiment,
            technical,
        };

        for role in [AgentRole::Orchestrator, AgentRole::Sentiment, AgentRole::Technical] {
            let actual = roster.get(role).role();
            if actual != role {
                return Err(Error::InitializationFailed(format!(
                    "{role} slot holds an agent playing {actual}"
                )));
            }
        }
        if !roster.orchestrator.tools().is_empty() {
            return Err(Error::InitializationFailed(
                "the orchestrator does not call gateway tools".to_string(),
            ));
        }

        Ok(roster)
    }

    pub fn get(&self, role: AgentRole) -> &Arc<dyn Agent> {
        match role {
            AgentRole::Orchestrator => &self.orchestrator,
            AgentRole::Sentiment => &self.sentiment,
            AgentRole::Technical => &self.technical,
        }
    }

    /// Agent names in scheduling order
    pub fn names(&self) -> Vec<String> {
        [&self.sentiment, &self.technical, &self.orchestrator]
            .iter()
            .map(|agent| agent.name().to_string())
            .collect()
    }

    /// Every declared tool with the role declaring it
    pub fn declared_tools(&self) -> Vec<(AgentRole, &ToolSpec)> {
        AgentRole::SPECIALISTS
            .iter()
            .flat_map(|role| self.get(*role).tools().iter().map(move |spec| (*role, spec)))
            .collect()
    }
}

/// Transcript and verdict of a completed run
#[derive(Debug, Clone)]
pub struct AnalysisOutcome {
    pub transcript: Vec<Message>,
    pub verdict: Verdict,
}

/// Drives analysis runs
pub struct Coordinator {
    roster: AgentRoster,
    gateways: Arc<dyn GatewayFactory>,
    config: LoopConfig,
    observer: Arc<dyn RunObserver>,
    cancel: CancellationToken,
}

impl Coordinator {
    pub fn builder(roster: AgentRoster, gateways: Arc<dyn GatewayFactory>) -> CoordinatorBuilder {
        CoordinatorBuilder {
            roster,
            gateways,
            config: LoopConfig::default(),
            observer: None,
            cancel: None,
        }
    }

    pub fn config(&self) -> &LoopConfig {
        &self.config
    }

    pub fn roster(&self) -> &AgentRoster {
        &self.roster
    }

    /// Endpoint gateway sessions are opened against
    pub fn gateway_endpoint(&self) -> &str {
        self.gateways.endpoint()
    }

    /// Token that cancels every run of this coordinator, in flight or future
    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    /// Run one analysis to completion
    pub async fn analyze(&self, ticker: &str) -> Result<AnalysisOutcome, RunError> {
        let ticker = ticker.trim();
        let run_id = Uuid::new_v4();

        let result = if ticker.is_empty() || ticker.contains(char::is_whitespace) {
            Err(RunError::new(
                RunErrorKind::InvalidInput,
                format!("ticker must be a single non-empty token, got '{ticker}'"),
            ))
        } else {
            let span = info_span!("analysis_run", %run_id, ticker);
            self.execute(run_id, ticker).instrument(span).await
        };

        match &result {
            Ok(outcome) => info!(
                %run_id,
                ticker,
                category = %outcome.verdict.category,
                turns = outcome.verdict.turns,
                degraded = outcome.verdict.is_degraded(),
                "Analysis completed"
            ),
            Err(e) => warn!(%run_id, ticker, error = %e, "Analysis failed"),
        }

        self.observer
            .on_finish(run_id, result.as_ref().map(|outcome| &outcome.verdict))
            .await;
        result
    }

    /// Run independent analyses concurrently, results in input order
    pub async fn analyze_many(
        &self,
        tickers: &[String],
    ) -> Vec<(String, Result<AnalysisOutcome, RunError>)> {
        join_all(tickers.iter().map(|ticker| async move {
            (ticker.clone(), self.analyze(ticker).await)
        }))
        .await
    }

    async fn execute(&self, run_id: Uuid, ticker: &str) -> Result<AnalysisOutcome, RunError> {
        let gateway = self.gateways.open().await.map_err(|e| {
            RunError::new(
                RunErrorKind::ToolUnavailable,
                format!("could not open a session at {}: {e}", self.gateways.endpoint()),
            )
        })?;
        let session = SessionGuard::new(gateway.clone());
        let bridge = ToolBridge::new(gateway.clone(), self.config.bridge.clone());
        let progress = Progress::default();

        let outcome = tokio::select! {
            biased;
            () = self.cancel.cancelled() => {
                Err(progress.error(RunErrorKind::Cancelled, "run cancelled by caller"))
            }
            result = timeout(
                self.config.run_timeout,
                self.drive(run_id, ticker, gateway.as_ref(), &bridge, &progress),
            ) => match result {
                Ok(outcome) => outcome,
                Err(_) => Err(progress.error(
                    RunErrorKind::MaxTurnsExceeded,
                    format!("no verdict within the {:?} run budget", self.config.run_timeout),
                )),
            },
        };

        session.close().await;
        outcome
    }

    async fn open_session(&self, gateway: &dyn ToolGateway) -> Result<(), RunError> {
        match gateway.connect().await {
            Ok(server) => info!(
                server = %server.name,
                version = %server.version,
                endpoint = gateway.endpoint(),
                "Gateway session opened"
            ),
            Err(e) => warn!(endpoint = gateway.endpoint(), error = %e, "Gateway handshake failed, continuing degraded"),
        }

        let served = match gateway.list_tools().await {
            Ok(tools) => tools,
            Err(e) => {
                warn!(error = %e, "Could not list gateway tools");
                return Ok(());
            }
        };

        for (role, spec) in self.roster.declared_tools() {
            if !served.iter().any(|tool| tool.name == spec.name) {
                return Err(RunError::new(
                    RunErrorKind::ToolUnavailable,
                    format!("tool '{}' is not registered at {}", spec.name, gateway.endpoint()),
                )
                .with_agent(role)
                .with_tool(spec.name.clone()));
            }
        }
        debug!(tool_count = served.len(), "Gateway serves every declared tool");
        Ok(())
    }

    async fn drive(
        &self,
        run_id: Uuid,
        ticker: &str,
        gateway: &dyn ToolGateway,
        bridge: &ToolBridge,
        progress: &Progress,
    ) -> Result<AnalysisOutcome, RunError> {
        self.open_session(gateway).await?;

        let mut state = ConversationState::seed(run_id, ticker, task_description(ticker));
        if let Some(seed) = state.last() {
            self.observer.on_message(run_id, seed).await;
        }

        let ctx = RunContext::new(run_id, ticker);
        let mut active = AgentRole::Orchestrator;
        let mut turn = 0;

        loop {
            if self.cancel.is_cancelled() {
                return Err(progress.error(RunErrorKind::Cancelled, "run cancelled by caller"));
            }
            if turn >= self.config.max_turns {
                return Err(RunError::max_turns_exceeded(format!(
                    "no verdict after {} turns",
                    self.config.max_turns
                ))
                .at_turn(turn)
                .with_agent(active));
            }

            turn += 1;
            progress.record(turn, active);
            info!(turn, agent = %active, "Agent turn started");
            self.observer.on_turn_start(run_id, turn, active).await;

            let agent = self.roster.get(active);
            let message = self
                .take_turn(agent.as_ref(), &ctx.at_turn(turn), state.messages())
                .await
                .map_err(|e| e.in_context(turn, Some(active)))?;

            if message.requests_tools() {
                let message = assign_call_ids(message, &state);
                self.append(&mut state, message.clone(), turn, active).await?;

                let results = bridge
                    .invoke_all(run_id, &message.tool_calls, agent.tools(), self.observer.as_ref())
                    .await
                    .map_err(|e| e.in_context(turn, Some(active)))?;

                for result in results {
                    self.append(&mut state, Message::tool(result), turn, active)
                        .await?;
                }
                continue;
            }

            match (active, message.directive) {
                (AgentRole::Orchestrator, Some(Directive::Delegate(role))) => {
                    if !role.is_specialist() {
                        return Err(RunError::protocol_violation(format!(
                            "cannot delegate to {role}"
                        ))
                        .in_context(turn, Some(active)));
                    }
                    if state.delegations(role) >= self.config.max_delegations {
                        return Err(RunError::protocol_violation(format!(
                            "{role} was already consulted {} times",
                            self.config.max_delegations
                        ))
                        .in_context(turn, Some(active)));
                    }
                    debug!(turn, specialist = %role, "Delegating");
                    self.append(&mut state, message, turn, active).await?;
                    active = role;
                }
                (AgentRole::Orchestrator, Some(Directive::Conclude(category))) => {
                    let missing: Vec<&str> = AgentRole::SPECIALISTS
                        .iter()
                        .filter(|role| !state.has_assessment(**role))
                        .map(|role| role.display_name())
                        .collect();
                    if !missing.is_empty() {
                        return Err(RunError::protocol_violation(format!(
                            "verdict issued before hearing from {}",
                            missing.join(" and ")
                        ))
                        .in_context(turn, Some(active)));
                    }

                    let text = message.content.clone();
                    self.append(&mut state, message, turn, active).await?;

                    let degraded: Vec<AgentRole> = AgentRole::SPECIALISTS
                        .into_iter()
                        .filter(|role| state.is_degraded(*role))
                        .collect();
                    let verdict = Verdict::new(run_id, ticker, category, &text, degraded, turn);

                    return Ok(AnalysisOutcome {
                        transcript: state.into_transcript(),
                        verdict,
                    });
                }
                (AgentRole::Orchestrator, None) => {
                    self.append(&mut state, message, turn, active).await?;
                }
                (specialist, Some(_)) => {
                    return Err(RunError::protocol_violation(format!(
                        "{specialist} attempted to steer the conversation"
                    ))
                    .in_context(turn, Some(specialist)));
                }
                (specialist, None) => {
                    if message.content.trim().is_empty() {
                        warn!(turn, agent = %specialist, "Empty assessment, asking again");
                        continue;
                    }
                    self.append(&mut state, message, turn, active).await?;
                    active = AgentRole::Orchestrator;
                }
            }
        }
    }

    /// Invoke an agent under the per-turn timeout
    async fn take_turn(
        &self,
        agent: &dyn Agent,
        ctx: &RunContext,
        history: &[Message],
    ) -> Result<Message, RunError> {
        let message = timeout(self.config.agent_timeout, agent.respond(ctx, history))
            .await
            .map_err(|_| {
                RunError::new(
                    RunErrorKind::Timeout,
                    format!(
                        "{} did not respond within {:?}",
                        agent.name(),
                        self.config.agent_timeout
                    ),
                )
            })?
            .map_err(RunError::from)?;

        if message.author() != Some(agent.role()) {
            return Err(RunError::protocol_violation(format!(
                "{} answered as {}",
                agent.name(),
                message.role
            )));
        }
        for call in &message.tool_calls {
            if ToolSpec::find(agent.tools(), &call.name).is_none() {
                return Err(RunError::protocol_violation(format!(
                    "{} called undeclared tool '{}'",
                    agent.name(),
                    call.name
                ))
                .with_tool(call.name.clone()));
            }
        }
        if message.requests_tools() && message.directive.is_some() {
            return Err(RunError::protocol_violation(
                "a message may request tools or carry a directive, not both",
            ));
        }

        Ok(message)
    }

    async fn append(
        &self,
        state: &mut ConversationState,
        message: Message,
        turn: usize,
        agent: AgentRole,
    ) -> Result<(), RunError> {
        state
            .push(message)
            .map_err(|e| RunError::from(e).in_context(turn, Some(agent)))?;
        if let Some(appended) = state.last() {
            self.observer.on_message(state.run_id(), appended).await;
        }
        Ok(())
    }
}

/// Builder for [`Coordinator`]
pub struct CoordinatorBuilder {
    roster: AgentRoster,
    gateways: Arc<dyn GatewayFactory>,
    config: LoopConfig,
    observer: Option<Arc<dyn RunObserver>>,
    cancel: Option<CancellationToken>,
}

impl CoordinatorBuilder {
    pub fn config(mut self, config: LoopConfig) -> Self {
        self.config = config;
        self
    }

    pub fn observer(mut self, observer: Arc<dyn RunObserver>) -> Self {
        self.observer = Some(observer);
        self
    }

    pub fn cancellation_token(mut self, token: CancellationToken) -> Self {
        self.cancel = Some(token);
        self
    }

    pub fn build(self) -> Coordinator {
        Coordinator {
            roster: self.roster,
            gateways: self.gateways,
            config: self.config,
            observer: self.observer.unwrap_or_else(|| Arc::new(NoOpObserver)),
            cancel: self.cancel.unwrap_or_default(),
        }
    }
}

/// Task that seeds every run
pub fn task_description(ticker: &str) -> String {
    format!(
        "Provide an analysis for {ticker}'s performance today based on both news sentiment and technical analysis."
    )
}

/// Replace empty or already used tool call ids
fn assign_call_ids(mut message: Message, state: &ConversationState) -> Message {
    let mut seen: HashSet<String> = state
        .messages()
        .iter()
        .flat_map(|m| m.tool_calls.iter().map(|call| call.id.clone()))
        .collect();

    for call in &mut message.tool_calls {
        if call.id.trim().is_empty() || seen.contains(&call.id) {
            call.id = format!("call_{}", Uuid::new_v4().simple());
        }
        seen.insert(call.id.clone());
    }
    message
}

/// Turn and agent reached so far, readable after the loop is dropped
#[derive(Default)]
struct Progress {
    inner: Mutex<(usize, Option<AgentRole>)>,
}

impl Progress {
    fn record(&self, turn: usize, agent: AgentRole) {
        *self.inner.lock().unwrap_or_else(PoisonError::into_inner) = (turn, Some(agent));
    }

    fn error(&self, kind: RunErrorKind, detail: impl Into<String>) -> RunError {
        let (turn, agent) = *self.inner.lock().unwrap_or_else(PoisonError::into_inner);
        RunError::new(kind, detail).in_context(turn, agent)
    }
}

/// Closes the gateway session of a run
///
/// Dropping an unclosed guard (an abandoned run) schedules the disconnect on
/// the current runtime.
struct SessionGuard {
    gateway: Option<Arc<dyn ToolGateway>>,
}

impl SessionGuard {
    fn new(gateway: Arc<dyn ToolGateway>) -> Self {
        Self {
            gateway: Some(gateway),
        }
    }

    async fn close(mut self) {
        if let Some(gateway) = self.gateway.take() {
            if let Err(e) = gateway.disconnect().await {
                warn!(error = %e, "Failed to close gateway session");
            }
        }
    }
}

impl Drop for SessionGuard {
    fn drop(&mut self) {
        let Some(gateway) = self.gateway.take() else {
            return;
        };
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    if let Err(e) = gateway.disconnect().await {
                        warn!(error = %e, "Failed to close abandoned gateway session");
                    }
                });
            }
            Err(_) => warn!("No runtime to close abandoned gateway session"),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::testing::{GatewayScript, ScriptedGatewayFactory};
    use async_trait::async_trait;
    use serde_json::json;
    use tokio_test::assert_ok;
    use verdict_core::{ToolCall, VerdictCategory};
    use verdict_gateway::GatewayError;

    const NEWS: &str = "news_sentiment_tool";
    const TECH: &str = "technical_analysis_tool";

    fn ticker_spec(name: &str) -> ToolSpec {
        ToolSpec::new(
            name,
            name,
            json!({
                "type": "object",
                "properties": {"ticker_symbol": {"type": "string"}},
                "required": ["ticker_symbol"]
            }),
        )
    }

    /// Specialist that fetches its tool once, then reports
    struct FetchingSpecialist {
        role: AgentRole,
        tools: Vec<ToolSpec>,
        call_tool: String,
    }

    impl FetchingSpecialist {
        fn new(role: AgentRole, tool: &str) -> Arc<Self> {
            Arc::new(Self {
                role,
                tools: vec![ticker_spec(tool)],
                call_tool: tool.to_string(),
            })
        }

        /// Declares `tool` but calls `rogue` instead
        fn rogue(role: AgentRole, tool: &str, rogue: &str) -> Arc<Self> {
            Arc::new(Self {
                role,
                tools: vec![ticker_spec(tool)],
                call_tool: rogue.to_string(),
            })
        }
    }

    #[async_trait]
    impl Agent for FetchingSpecialist {
        fn role(&self) -> AgentRole {
            self.role
        }

        fn tools(&self) -> &[ToolSpec] {
            &self.tools
        }

        async fn respond(
            &self,
            ctx: &RunContext,
            history: &[Message],
        ) -> verdict_core::Result<Message> {
            let window = verdict_core::conversation::current_delegation(history, self.role);
            let results = verdict_core::conversation::tool_results_for(window, self.role);
            match results.last() {
                None => Ok(Message::agent(self.role, "").with_tool_calls(vec![
                    ToolCall::new("", &self.call_tool).with_argument("ticker_symbol", ctx.ticker.clone()),
                ])),
                Some(result) if result.is_error() => Ok(Message::agent(
                    self.role,
                    format!("Data unavailable: {}", result.render()),
                )),
                Some(result) => Ok(Message::agent(
                    self.role,
                    format!("{} The company performance is MIXED", result.content_text()),
                )),
            }
        }
    }

    #[derive(Clone, Copy)]
    enum Plan {
        Normal,
        ConcludeEarly,
        NeverConclude,
        DelegateToSelf,
        Stall,
    }

    struct PlannedOrchestrator {
        plan: Plan,
    }

    #[async_trait]
    impl Agent for PlannedOrchestrator {
        fn role(&self) -> AgentRole {
            AgentRole::Orchestrator
        }

        async fn respond(
            &self,
            _ctx: &RunContext,
            history: &[Message],
        ) -> verdict_core::Result<Message> {
            let heard = |role: AgentRole| {
                history
                    .iter()
                    .any(|m| m.author() == Some(role) && m.is_assessment())
            };
            let reply = |directive: Directive| -> verdict_core::Result<Message> {
                Ok(Message::agent(AgentRole::Orchestrator, "next").with_directive(directive))
            };

            match self.plan {
                Plan::ConcludeEarly => reply(Directive::Conclude(VerdictCategory::Strong)),
                Plan::DelegateToSelf => reply(Directive::Delegate(AgentRole::Orchestrator)),
                Plan::NeverConclude => reply(Directive::Delegate(AgentRole::Sentiment)),
                Plan::Stall => {
                    tokio::time::sleep(Duration::from_secs(5)).await;
                    reply(Directive::Delegate(AgentRole::Sentiment))
                }
                Plan::Normal if !heard(AgentRole::Sentiment) => {
                    reply(Directive::Delegate(AgentRole::Sentiment))
                }
                Plan::Normal if !heard(AgentRole::Technical) => {
                    reply(Directive::Delegate(AgentRole::Technical))
                }
                Plan::Normal => Ok(Message::agent(AgentRole::Orchestrator, "Both reported.")
                    .with_directive(Directive::Conclude(VerdictCategory::Mixed))),
            }
        }
    }

    fn roster(plan: Plan) -> AgentRoster {
        AgentRoster::new(
            Arc::new(PlannedOrchestrator { plan }),
            FetchingSpecialist::new(AgentRole::Sentiment, NEWS),
            FetchingSpecialist::new(AgentRole::Technical, TECH),
        )
        .unwrap()
    }

    fn healthy_script() -> GatewayScript {
        GatewayScript::new()
            .respond(NEWS, "Article #1. Quarterly results in line.")
            .respond(TECH, r#"{"SMA50": 203.65, "SMA200": 222.67, "RSI": 74.8}"#)
    }

    fn coordinator(roster: AgentRoster, factory: Arc<ScriptedGatewayFactory>, config: LoopConfig) -> Coordinator {
        Coordinator::builder(roster, factory).config(config).build()
    }

    fn fast_config() -> LoopConfig {
        LoopConfig {
            agent_timeout: Duration::from_millis(200),
            run_timeout: Duration::from_secs(2),
            bridge: BridgeConfig {
                call_timeout: Duration::from_millis(50),
                retry: verdict_gateway::RetryPolicy::fast(),
            },
            ..LoopConfig::default()
        }
    }

    #[tokio::test]
    async fn test_healthy_run_takes_seven_turns() {
        let factory = Arc::new(ScriptedGatewayFactory::new(healthy_script()));
        let coordinator = coordinator(roster(Plan::Normal), factory.clone(), fast_config());

        let outcome = assert_ok!(coordinator.analyze("AAPL").await);
        assert_eq!(outcome.verdict.turns, 7);
        assert_eq!(outcome.verdict.category, VerdictCategory::Mixed);
        assert!(outcome.verdict.text.ends_with("FINAL VERDICT: MIXED performance"));
        assert!(!outcome.verdict.is_degraded());

        // seed + 2 delegations + 2 x (request, result, assessment) + conclusion
        assert_eq!(outcome.transcript.len(), 10);
        assert!(outcome.transcript[0].content.contains("AAPL"));
        assert!(factory.all_closed());
    }

    #[tokio::test]
    async fn test_empty_ticker_rejected() {
        let factory = Arc::new(ScriptedGatewayFactory::new(healthy_script()));
        let coordinator = coordinator(roster(Plan::Normal), factory.clone(), fast_config());

        let err = coordinator.analyze("   ").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::InvalidInput);
        assert!(factory.sessions().is_empty());
    }

    #[tokio::test]
    async fn test_premature_verdict_is_protocol_violation() {
        let factory = Arc::new(ScriptedGatewayFactory::new(healthy_script()));
        let coordinator = coordinator(roster(Plan::ConcludeEarly), factory.clone(), fast_config());

        let err = coordinator.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::ProtocolViolation);
        assert_eq!(err.turn, 1);
        assert_eq!(err.last_agent, Some(AgentRole::Orchestrator));
        assert!(err.detail.contains("SentimentAnalyst and TechnicalAnalyst"));
        assert!(factory.all_closed());
    }

    #[tokio::test]
    async fn test_undeclared_tool_is_protocol_violation() {
        let roster = AgentRoster::new(
            Arc::new(PlannedOrchestrator { plan: Plan::Normal }),
            FetchingSpecialist::rogue(AgentRole::Sentiment, NEWS, TECH),
            FetchingSpecialist::new(AgentRole::Technical, TECH),
        )
        .unwrap();
        let factory = Arc::new(ScriptedGatewayFactory::new(healthy_script()));
        let coordinator = coordinator(roster, factory.clone(), fast_config());

        let err = coordinator.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::ProtocolViolation);
        assert_eq!(err.tool.as_deref(), Some(TECH));
        assert_eq!(err.last_agent, Some(AgentRole::Sentiment));
        assert_eq!(factory.sessions()[0].call_count(TECH), 0);
    }

    #[tokio::test]
    async fn test_delegation_limit() {
        let factory = Arc::new(ScriptedGatewayFactory::new(healthy_script()));
        let config = LoopConfig {
            max_turns: 50,
            ..fast_config()
        };
        let coordinator = coordinator(roster(Plan::NeverConclude), factory, config);

        let err = coordinator.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::ProtocolViolation);
        assert!(err.detail.contains("already consulted 2 times"));
    }

    #[tokio::test]
    async fn test_max_turns_exceeded() {
        let factory = Arc::new(ScriptedGatewayFactory::new(healthy_script()));
        let config = LoopConfig {
            max_turns: 3,
            max_delegations: 10,
            ..fast_config()
        };
        let coordinator = coordinator(roster(Plan::NeverConclude), factory.clone(), config);

        let err = coordinator.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::MaxTurnsExceeded);
        assert_eq!(err.turn, 3);
        assert!(factory.all_closed());
    }

    #[tokio::test]
    async fn test_delegating_to_orchestrator_rejected() {
        let factory = Arc::new(ScriptedGatewayFactory::new(healthy_script()));
        let coordinator = coordinator(roster(Plan::DelegateToSelf), factory, fast_config());

        let err = coordinator.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::ProtocolViolation);
    }

    #[tokio::test]
    async fn test_agent_timeout() {
        let factory = Arc::new(ScriptedGatewayFactory::new(healthy_script()));
        let coordinator = coordinator(roster(Plan::Stall), factory.clone(), fast_config());

        let err = coordinator.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::Timeout);
        assert_eq!(err.last_agent, Some(AgentRole::Orchestrator));
        assert!(factory.all_closed());
    }

    #[tokio::test]
    async fn test_missing_tool_fails_before_first_turn() {
        let factory = Arc::new(ScriptedGatewayFactory::new(healthy_script().unlisted(TECH)));
        let coordinator = coordinator(roster(Plan::Normal), factory.clone(), fast_config());

        let err = coordinator.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::ToolUnavailable);
        assert_eq!(err.tool.as_deref(), Some(TECH));
        assert_eq!(err.last_agent, Some(AgentRole::Technical));
        assert_eq!(err.turn, 0);
        assert!(factory.all_closed());
    }

    #[tokio::test]
    async fn test_failed_handshake_runs_degraded() {
        let script = GatewayScript::new()
            .refuse_connect(GatewayError::ConnectionFailed("connection refused".into()))
            .fail_listing(GatewayError::ConnectionFailed("connection refused".into()))
            .fail(NEWS, GatewayError::ConnectionFailed("connection refused".into()))
            .fail(TECH, GatewayError::ConnectionFailed("connection refused".into()));
        let factory = Arc::new(ScriptedGatewayFactory::new(script));
        let coordinator = coordinator(roster(Plan::Normal), factory.clone(), fast_config());

        let outcome = coordinator.analyze("AAPL").await.unwrap();
        assert_eq!(
            outcome.verdict.degraded,
            vec![AgentRole::Sentiment, AgentRole::Technical]
        );
        assert!(outcome.verdict.text.contains("unavailable"));
        // one retry per call
        assert_eq!(factory.sessions()[0].call_count(NEWS), 2);
    }

    #[tokio::test]
    async fn test_unreachable_gateway() {
        let factory = Arc::new(ScriptedGatewayFactory::unreachable(GatewayError::ConfigError(
            "bad url".into(),
        )));
        let coordinator = coordinator(roster(Plan::Normal), factory, fast_config());

        let err = coordinator.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::ToolUnavailable);
    }

    #[tokio::test]
    async fn test_cancellation_closes_session() {
        let factory = Arc::new(ScriptedGatewayFactory::new(
            GatewayScript::new().hang(NEWS).respond(TECH, "{}"),
        ));
        let config = LoopConfig {
            bridge: BridgeConfig {
                call_timeout: Duration::from_secs(30),
                retry: verdict_gateway::RetryPolicy::no_retry(),
            },
            ..fast_config()
        };
        let coordinator = coordinator(roster(Plan::Normal), factory.clone(), config);
        let token = coordinator.cancellation_token();

        tokio::spawn(async move {
            tokio::time::sleep(Duration::from_millis(50)).await;
            token.cancel();
        });

        let err = coordinator.analyze("AAPL").await.unwrap_err();
        assert_eq!(err.kind, RunErrorKind::Cancelled);
        assert_eq!(err.last_agent, Some(AgentRole::Sentiment));
        assert!(factory.all_closed());
    }

    #[tokio::test]
    async fn test_duplicate_call_ids_replaced() {
        let state = ConversationState::seed(Uuid::new_v4(), "AAPL", "task");
        let message = Message::agent(AgentRole::Technical, "").with_tool_calls(vec![
            ToolCall::new("dup", TECH),
            ToolCall::new("dup", TECH),
            ToolCall::new("", TECH),
        ]);

        let message = assign_call_ids(message, &state);
        let ids: HashSet<&str> = message.tool_calls.iter().map(|c| c.id.as_str()).collect();
        assert_eq!(ids.len(), 3);
        assert_eq!(message.tool_calls[0].id, "dup");
    }

    #[test]
    fn test_roster_checks_roles() {
        let result = AgentRoster::new(
            Arc::new(PlannedOrchestrator { plan: Plan::Normal }),
            FetchingSpecialist::new(AgentRole::Technical, TECH),
            FetchingSpecialist::new(AgentRole::Technical, TECH),
        );
        assert!(matches!(result, Err(Error::InitializationFailed(_))));
    }
}
