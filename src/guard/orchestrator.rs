//! Guard orchestrator
//!
//! The coordinator that sequences the whole pipeline into one
//! request/response cycle and owns the shared cache and running
//! statistics. The stages, in order:
//!
//! `fast path -> cache -> risk -> chaos -> planning -> routing -> consensus -> finalize`
//!
//! Every branch produces a Decision; there is no path out of the pipeline
//! without one. All failures - timeouts, backend errors, internal bugs -
//! are absorbed here and converted into low-confidence allow decisions
//! (fail-open). Blocking a user action by accident is considered the
//! worse failure mode.

use crate::backends::advisors::{CautionAdvisor, RuleAdvisor};
use crate::backends::routing::LocalRouter;
use crate::backends::{Advisor, GatePlanner, PlanningBackend, RoutingBackend};
use crate::config::GuardConfig;
use crate::error::AppError;
use crate::guard::cache::{fingerprint, DecisionCache};
use crate::guard::chaos::ChaosInjector;
use crate::guard::consensus::ConsensusEngine;
use crate::guard::risk::{self, RiskClassifier, RuleInfo};
use crate::guard::timeout::with_deadline;
use crate::guard::types::*;
use crate::guard::{clamp_confidence, CONFIDENCE_CEILING, HIGH_RISK_THRESHOLD};
use chrono::{DateTime, Utc};
use once_cell::sync::OnceCell;
use serde_json::json;
use std::sync::Arc;
use std::time::Duration;
use tracing::{error, info, warn};
use uuid::Uuid;

/// Confidence reported when the pipeline had to proceed without answers.
const DEGRADED_CONFIDENCE: f64 = 0.25;

static GLOBAL_GUARD: OnceCell<Arc<GuardService>> = OnceCell::new();

/// The stateful coordinator. One instance per process; obtain the shared
/// handle through [`GuardService::global`].
pub struct GuardService {
    config: GuardConfig,
    classifier: RiskClassifier,
    cache: DecisionCache,
    stats: GuardStats,
    started_at: DateTime<Utc>,
    chaos: Arc<ChaosInjector>,
    consensus: ConsensusEngine,
    planner: Arc<dyn PlanningBackend>,
    router: Option<Arc<dyn RoutingBackend>>,
    advisors: Vec<Arc<dyn Advisor>>,
}

impl GuardService {
    pub fn new(config: GuardConfig) -> Self {
        let router: Option<Arc<dyn RoutingBackend>> = if config.routing_enabled {
            Some(Arc::new(LocalRouter::new()))
        } else {
            None
        };
        let advisors: Vec<Arc<dyn Advisor>> = if config.advisors_enabled {
            vec![Arc::new(RuleAdvisor::new()), Arc::new(CautionAdvisor::new())]
        } else {
            Vec::new()
        };
        let chaos = Arc::new(ChaosInjector::new(
            config.chaos_enabled,
            config.chaos_probability,
        ));
        let cache = DecisionCache::new(config.cache_ttl(), config.cache_max_entries);

        if router.is_none() {
            warn!("⚠️  No routing backend configured - guard runs in degraded mode");
        }

        Self {
            config,
            classifier: RiskClassifier::new(),
            cache,
            stats: GuardStats::default(),
            started_at: Utc::now(),
            chaos,
            consensus: ConsensusEngine::new(),
            planner: Arc::new(GatePlanner::new()),
            router,
            advisors,
        }
    }

    /// Swap the routing backend (or remove it entirely).
    pub fn with_router(mut self, router: Option<Arc<dyn RoutingBackend>>) -> Self {
        self.router = router;
        self
    }

    /// Swap the advisory panel.
    pub fn with_advisors(mut self, advisors: Vec<Arc<dyn Advisor>>) -> Self {
        self.advisors = advisors;
        self
    }

    /// Swap the planning backend.
    pub fn with_planner(mut self, planner: Arc<dyn PlanningBackend>) -> Self {
        self.planner = planner;
        self
    }

    /// Install a configured instance as the process-wide service.
    /// Fails if one is already installed.
    pub fn install(service: Arc<GuardService>) -> Result<(), AppError> {
        GLOBAL_GUARD
            .set(service)
            .map_err(|_| AppError::Config("guard service already installed".to_string()))
    }

    /// The process-wide handle. Lazily initializes a default-configured
    /// instance if none was installed.
    pub fn global() -> Arc<GuardService> {
        GLOBAL_GUARD
            .get_or_init(|| Arc::new(GuardService::new(GuardConfig::default())))
            .clone()
    }

    // =========================================================================
    // EXPOSED OPERATIONS
    // =========================================================================

    /// Decide whether an operation may proceed. Never fails: every error
    /// path degrades into an allow decision with a diagnostic annotation.
    pub async fn pre_check(&self, event: HookEvent) -> PreCheckResult {
        GuardStats::incr(&self.stats.pre_checks);
        match self.run_pre_check(&event).await {
            Ok(result) => result,
            Err(e) => {
                GuardStats::incr(&self.stats.errors);
                error!("Pre-check pipeline error for {}: {}", event.tool, e);
                PreCheckResult {
                    decision: Decision::allow(
                        "internal pipeline error; proceeding fail-open",
                        DEGRADED_CONFIDENCE,
                    )
                    .with_error(e.to_string()),
                    plan: None,
                    risk_score: None,
                }
            }
        }
    }

    async fn run_pre_check(&self, event: &HookEvent) -> Result<PreCheckResult, AppError> {
        // FAST PATH - known-safe tools exit immediately and never touch
        // the cache or the consensus layer.
        if risk::is_known_safe(&event.tool) {
            GuardStats::incr(&self.stats.fast_path_hits);
            return Ok(PreCheckResult {
                decision: Decision::allow(
                    format!("known-safe operation: {}", event.tool),
                    CONFIDENCE_CEILING,
                ),
                plan: None,
                risk_score: None,
            });
        }

        // CACHE
        let key = fingerprint(&event.tool, &event.input);
        if let Some(mut cached) = self.cache.get(&key).await {
            GuardStats::incr(&self.stats.cache_hits);
            cached.from_cache = true;
            return Ok(PreCheckResult {
                decision: cached,
                plan: None,
                risk_score: None,
            });
        }

        // RISK ASSESSMENT
        let risk_score = self.classifier.score(&event.tool, &event.input);

        // CHAOS CHECK - may elevate the path even for low-risk operations
        let probe = self.chaos.maybe_force_planning(&event.tool);
        if probe.injected {
            GuardStats::incr(&self.stats.chaos_injected);
        }
        let high_risk = risk_score >= HIGH_RISK_THRESHOLD || probe.injected;

        // PLANNING GATE - only for high-risk or chaos-forced requests
        let mut plan = None;
        if high_risk {
            let assessment = self.assess_planning(event, risk_score, probe.injected).await;
            if assessment.needed {
                GuardStats::incr(&self.stats.planning_triggered);
                self.spawn_plan_generation(event, &assessment);
                if assessment.decision == PlanDecision::Pause {
                    GuardStats::incr(&self.stats.planning_paused);
                    let confidence = assessment.confidence;
                    let decision = Decision {
                        blocked: false,
                        blocked_by: None,
                        message: Some(
                            "Deliberation required before this operation proceeds".to_string(),
                        ),
                        confidence: clamp_confidence(confidence),
                        reason: format!("paused for deliberation (risk {:.2})", risk_score),
                        is_high_risk: true,
                        agent_results: Vec::new(),
                        from_cache: false,
                        error: None,
                    };
                    // A pause is a request-time judgment, not a reusable
                    // verdict - skip the cache write.
                    return Ok(PreCheckResult {
                        decision,
                        plan: Some(assessment),
                        risk_score: Some(risk_score),
                    });
                }
                plan = Some(assessment);
            }
        }

        // ROUTING
        let payload = json!({ "tool": event.tool, "input": event.input });
        let routed = self.route_event("PreToolUse", &payload, event).await;
        let route_attempted = self.router.is_some();

        let mut decision = match routed {
            Some(r) if r.blocked => {
                let confidence = clamp_confidence(r.synthesis.confidence);
                Decision {
                    blocked: true,
                    blocked_by: r.blocked_by.or_else(|| Some("router".to_string())),
                    message: r.block_message,
                    confidence,
                    reason: r.synthesis.reason,
                    is_high_risk: high_risk,
                    agent_results: r.agent_results,
                    from_cache: false,
                    error: None,
                }
            }
            Some(r) => Decision {
                blocked: false,
                blocked_by: None,
                message: None,
                confidence: clamp_confidence(r.synthesis.confidence),
                reason: r.synthesis.reason,
                is_high_risk: high_risk,
                agent_results: r.agent_results,
                from_cache: false,
                error: None,
            },
            None => {
                let reason = if high_risk {
                    format!(
                        "elevated risk (score {:.2}) but routing unavailable; proceeding fail-open",
                        risk_score
                    )
                } else {
                    format!("routing unavailable; proceeding fail-open (risk {:.2})", risk_score)
                };
                let annotation = if route_attempted {
                    "routing backend produced no answer within the deadline"
                } else {
                    "no routing backend configured"
                };
                Decision::allow(reason, DEGRADED_CONFIDENCE)
                    .with_high_risk(high_risk)
                    .with_error(annotation)
            }
        };

        // CONSENSUS - second line of defense. Runs only when the request
        // was independently flagged high-risk and nothing blocked it yet.
        // It can add a block, never remove one.
        if high_risk && !decision.blocked && !self.advisors.is_empty() {
            let topic = format!("allow {}", event.tool);
            let votes = self
                .gather_votes(&topic, &payload, self.config.pre_check_deadline())
                .await;
            let outcome = self.consensus.aggregate(&votes);
            decision
                .agent_results
                .extend(votes.iter().map(|v| AgentResult {
                    source: v.source.clone(),
                    verdict: format!("{:?}", v.verdict).to_lowercase(),
                    confidence: v.confidence,
                    reason: None,
                }));
            if outcome.consensus && outcome.decision == Some(ConsensusDecision::Reject) {
                decision.blocked = true;
                decision.blocked_by = Some("consensus".to_string());
                decision.message = Some(format!(
                    "Advisory consensus rejected the operation (potential {:.2} vs {:.2})",
                    outcome.reject_potential, outcome.approve_potential
                ));
                decision.confidence = outcome.confidence;
                decision.reason = format!("advisory consensus rejected (risk {:.2})", risk_score);
            }
        }

        // FINALIZE
        if decision.blocked {
            GuardStats::incr(&self.stats.blocks);
        }
        self.cache.put(key, decision.clone()).await;

        Ok(PreCheckResult {
            decision,
            plan,
            risk_score: Some(risk_score),
        })
    }

    /// Analyze an operation that already ran. Bounded by the long deadline
    /// and never fails from the caller's perspective.
    pub async fn post_analyze(&self, event: PostEvent) -> PostAnalyzeResult {
        GuardStats::incr(&self.stats.post_analyses);

        let mut observations = Vec::new();
        if event.success == Some(false) {
            observations.push("operation reported failure".to_string());
        }
        if let Some(ms) = event.duration_ms {
            if ms > 10_000 {
                observations.push(format!("slow operation ({} ms)", ms));
            }
        }
        if let Some(output) = &event.output {
            if output.to_string().len() > 65_536 {
                observations.push("unusually large output".to_string());
            }
        }

        let payload = json!({
            "tool": event.tool,
            "input": event.input,
            "output": event.output,
            "durationMs": event.duration_ms,
            "success": event.success,
        });

        let (synthesis, error) = match &self.router {
            None => (None, Some("no routing backend configured".to_string())),
            Some(router) => {
                let call = router.receive_event(
                    "PostToolUse",
                    &payload,
                    event.user_id.as_deref(),
                    event.session_id.as_deref(),
                );
                match with_deadline("routing backend", self.config.post_analyze_deadline(), call)
                    .await
                {
                    Some(Ok(r)) => (Some(r.synthesis), None),
                    Some(Err(e)) => {
                        GuardStats::incr(&self.stats.errors);
                        (None, Some(e.to_string()))
                    }
                    None => {
                        GuardStats::incr(&self.stats.timeouts);
                        (None, Some("post-analysis timed out".to_string()))
                    }
                }
            }
        };

        PostAnalyzeResult {
            ok: true,
            observations,
            synthesis,
            error,
        }
    }

    /// Caller-initiated consensus over an arbitrary topic.
    pub async fn request_consensus(&self, request: ConsensusRequest) -> ConsensusResult {
        GuardStats::incr(&self.stats.consensus_requests);

        let context = if request.options.is_empty() {
            request.context.clone()
        } else {
            json!({ "options": request.options, "context": request.context })
        };
        let votes = self
            .gather_votes(&request.topic, &context, self.config.pre_check_deadline())
            .await;
        let outcome = self.consensus.aggregate(&votes);

        ConsensusResult {
            topic: request.topic,
            outcome,
            votes,
        }
    }

    /// Feedback for a chaos-forced request, reported after the fact.
    pub async fn record_chaos_result(&self, id: Uuid, outcome: ChaosOutcome) {
        self.chaos.record_result(id, outcome).await;
    }

    /// Read-only statistics snapshot.
    pub async fn stats(&self) -> StatsSnapshot {
        self.stats
            .snapshot(self.started_at, self.router.is_none(), self.cache.len().await)
    }

    /// Reset the cache and counters. The instance itself stays installed.
    pub async fn clear(&self) {
        self.cache.clear().await;
        self.stats.reset();
        info!("🧹 Guard cache and statistics cleared");
    }

    /// The active risk rule table.
    pub fn rules(&self) -> Vec<RuleInfo> {
        self.classifier.list_rules()
    }

    /// Drop expired cache entries. Lazy expiry on read covers the hot
    /// path; this keeps idle fingerprints from lingering forever.
    pub async fn sweep_cache(&self) {
        self.cache.evict_expired().await;
    }

    // =========================================================================
    // INTERNAL STAGES
    // =========================================================================

    /// Ask the planning backend whether to deliberate. A broken or slow
    /// planning subsystem must never block an otherwise-approved
    /// operation, so every failure collapses to "not needed".
    async fn assess_planning(
        &self,
        event: &HookEvent,
        risk_score: f64,
        chaos_forced: bool,
    ) -> PlanAssessment {
        let signals = PlanSignals {
            risk_score,
            chaos_forced,
        };
        let call = self.planner.should_plan(event, &signals);
        match with_deadline("planning backend", self.config.pre_check_deadline(), call).await {
            Some(Ok(assessment)) => assessment,
            Some(Err(e)) => {
                GuardStats::incr(&self.stats.errors);
                warn!("Planning backend failed ({}); proceeding without deliberation", e);
                PlanAssessment::not_needed()
            }
            None => {
                GuardStats::incr(&self.stats.timeouts);
                PlanAssessment::not_needed()
            }
        }
    }

    async fn route_event(
        &self,
        hook_type: &str,
        payload: &serde_json::Value,
        event: &HookEvent,
    ) -> Option<RoutedDecision> {
        let router = self.router.as_ref()?;
        let call = router.receive_event(
            hook_type,
            payload,
            event.user_id.as_deref(),
            event.session_id.as_deref(),
        );
        match with_deadline("routing backend", self.config.pre_check_deadline(), call).await {
            Some(Ok(routed)) => Some(routed),
            Some(Err(e)) => {
                GuardStats::incr(&self.stats.errors);
                warn!("Routing backend failed ({}); proceeding fail-open", e);
                None
            }
            None => {
                GuardStats::incr(&self.stats.timeouts);
                None
            }
        }
    }

    /// Collect votes from the advisory panel, each party under its own
    /// deadline. A silent or failing advisor simply does not vote.
    async fn gather_votes(
        &self,
        topic: &str,
        context: &serde_json::Value,
        deadline: Duration,
    ) -> Vec<Vote> {
        let mut votes = Vec::new();
        for advisor in &self.advisors {
            let call = advisor.cast_vote(topic, context);
            match with_deadline(advisor.id(), deadline, call).await {
                Some(Ok(vote)) => votes.push(vote),
                Some(Err(e)) => {
                    GuardStats::incr(&self.stats.errors);
                    warn!("Advisor {} failed ({}); skipping its vote", advisor.id(), e);
                }
                None => {
                    GuardStats::incr(&self.stats.timeouts);
                }
            }
        }
        votes
    }

    /// Plan generation is a detached side effect; the decision path never
    /// waits for it.
    fn spawn_plan_generation(&self, event: &HookEvent, assessment: &PlanAssessment) {
        let planner = Arc::clone(&self.planner);
        let event = event.clone();
        let assessment = assessment.clone();
        tokio::spawn(async move {
            if let Err(e) = planner.generate_plan(&event, &assessment).await {
                warn!("Plan generation failed (non-fatal): {}", e);
            }
        });
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::backends::BackendError;
    use async_trait::async_trait;
    use serde_json::json;
    use std::time::Instant;

    fn quiet_config() -> GuardConfig {
        GuardConfig {
            pre_check_timeout_ms: 200,
            ..GuardConfig::default()
        }
    }

    fn bash(command: &str) -> HookEvent {
        HookEvent {
            tool: "Bash".to_string(),
            input: json!({ "command": command }),
            user_id: Some("u1".to_string()),
            session_id: Some("s1".to_string()),
        }
    }

    struct HangingRouter;

    #[async_trait]
    impl RoutingBackend for HangingRouter {
        async fn receive_event(
            &self,
            _hook_type: &str,
            _payload: &serde_json::Value,
            _user_id: Option<&str>,
            _session_id: Option<&str>,
        ) -> Result<RoutedDecision, BackendError> {
            std::future::pending::<()>().await;
            unreachable!()
        }
    }

    struct FailingRouter;

    #[async_trait]
    impl RoutingBackend for FailingRouter {
        async fn receive_event(
            &self,
            _hook_type: &str,
            _payload: &serde_json::Value,
            _user_id: Option<&str>,
            _session_id: Option<&str>,
        ) -> Result<RoutedDecision, BackendError> {
            Err(BackendError::Internal("boom".to_string()))
        }
    }

    struct FailingPlanner;

    #[async_trait]
    impl PlanningBackend for FailingPlanner {
        async fn should_plan(
            &self,
            _event: &HookEvent,
            _signals: &PlanSignals,
        ) -> Result<PlanAssessment, BackendError> {
            Err(BackendError::Internal("planner down".to_string()))
        }

        async fn generate_plan(
            &self,
            _event: &HookEvent,
            _assessment: &PlanAssessment,
        ) -> Result<(), BackendError> {
            Ok(())
        }
    }

    #[tokio::test]
    async fn test_fast_path_allows_known_safe_tools() {
        let service = GuardService::new(quiet_config());
        let result = service
            .pre_check(HookEvent {
                tool: "Read".to_string(),
                input: json!({ "file_path": "/tmp/a.txt" }),
                user_id: None,
                session_id: None,
            })
            .await;

        assert!(!result.decision.blocked);
        assert!(!result.decision.from_cache);
        assert!(result.decision.agent_results.is_empty());

        let stats = service.stats().await;
        assert_eq!(stats.fast_path_hits, 1);
        // Fast-path operations never reach the cache
        assert_eq!(stats.cache_entries, 0);
    }

    #[tokio::test]
    async fn test_cache_idempotence_within_ttl() {
        let service = GuardService::new(quiet_config());
        let first = service.pre_check(bash("echo hello")).await;
        let second = service.pre_check(bash("echo hello")).await;

        assert!(!first.decision.from_cache);
        assert!(second.decision.from_cache);
        assert_eq!(first.decision.blocked, second.decision.blocked);
        assert_eq!(first.decision.reason, second.decision.reason);

        let stats = service.stats().await;
        assert_eq!(stats.cache_hits, 1);
    }

    #[tokio::test]
    async fn test_expired_cache_recomputes() {
        // TTL of zero expires everything immediately
        let config = GuardConfig {
            cache_ttl_secs: 0,
            ..quiet_config()
        };
        let service = GuardService::new(config);
        let first = service.pre_check(bash("echo hello")).await;
        tokio::time::sleep(Duration::from_millis(10)).await;
        let second = service.pre_check(bash("echo hello")).await;

        assert!(!first.decision.from_cache);
        assert!(!second.decision.from_cache);
    }

    #[tokio::test]
    async fn test_fail_open_when_routing_hangs() {
        let service = GuardService::new(quiet_config())
            .with_router(Some(Arc::new(HangingRouter)))
            .with_advisors(Vec::new());

        let started = Instant::now();
        let result = service.pre_check(bash("echo hello")).await;

        assert!(started.elapsed() < Duration::from_secs(2));
        assert!(!result.decision.blocked);
        assert!(result.decision.error.is_some());

        let stats = service.stats().await;
        assert!(stats.timeouts >= 1);
    }

    #[tokio::test]
    async fn test_routing_failure_is_absorbed() {
        let service = GuardService::new(quiet_config())
            .with_router(Some(Arc::new(FailingRouter)))
            .with_advisors(Vec::new());

        let result = service.pre_check(bash("echo hello")).await;
        assert!(!result.decision.blocked);

        let stats = service.stats().await;
        assert!(stats.errors >= 1);
    }

    #[tokio::test]
    async fn test_destructive_command_is_blocked_end_to_end() {
        let service = GuardService::new(quiet_config());
        let result = service.pre_check(bash("rm -rf /")).await;

        assert!(result.decision.is_high_risk);
        assert!(result.decision.blocked);
        assert_eq!(result.decision.blocked_by.as_deref(), Some("local-router"));
        assert!(result.risk_score.unwrap() >= 0.9);

        let stats = service.stats().await;
        assert_eq!(stats.blocks, 1);
    }

    #[tokio::test]
    async fn test_degraded_high_risk_allows_with_low_confidence() {
        let service = GuardService::new(quiet_config())
            .with_router(None)
            .with_advisors(Vec::new());

        let result = service.pre_check(bash("rm -rf /")).await;

        assert!(result.decision.is_high_risk);
        assert!(!result.decision.blocked);
        assert!(result.decision.confidence < 0.5);
        assert!(result.decision.reason.contains("risk"));
        assert!(result.decision.error.is_some());

        let stats = service.stats().await;
        assert!(stats.degraded);
    }

    #[tokio::test]
    async fn test_consensus_blocks_as_second_line_of_defense() {
        // Credential writes score 0.85: below the router's own block
        // threshold, high enough for the rule advisor to reject.
        let service = GuardService::new(quiet_config());
        let result = service
            .pre_check(HookEvent {
                tool: "Write".to_string(),
                input: json!({ "file_path": "/app/.env", "content": "KEY=1" }),
                user_id: None,
                session_id: None,
            })
            .await;

        assert!(result.decision.is_high_risk);
        assert!(result.decision.blocked);
        assert_eq!(result.decision.blocked_by.as_deref(), Some("consensus"));
        // The advisory votes ride along in the agent results
        assert!(result
            .decision
            .agent_results
            .iter()
            .any(|r| r.source == "rule-advisor"));
    }

    #[tokio::test]
    async fn test_chaos_forces_planning_pause() {
        let config = GuardConfig {
            chaos_enabled: true,
            chaos_probability: 1.0,
            ..quiet_config()
        };
        let service = GuardService::new(config);
        let result = service.pre_check(bash("git push --force")).await;

        // Chaos halves signal confidence, so a high-risk request pauses
        assert!(!result.decision.blocked);
        assert!(result.plan.is_some());
        assert_eq!(result.plan.as_ref().unwrap().decision, PlanDecision::Pause);

        let stats = service.stats().await;
        assert_eq!(stats.chaos_injected, 1);
        assert_eq!(stats.planning_triggered, 1);
        assert_eq!(stats.planning_paused, 1);
        // Pauses are not cached
        assert_eq!(stats.cache_entries, 0);
    }

    #[tokio::test]
    async fn test_broken_planner_never_blocks_an_approved_operation() {
        let service = GuardService::new(quiet_config())
            .with_planner(Arc::new(FailingPlanner))
            .with_advisors(Vec::new());

        // High-risk but below the router's block threshold
        let result = service.pre_check(bash("git push --force")).await;

        assert!(!result.decision.blocked);
        assert!(result.plan.is_none());

        let stats = service.stats().await;
        assert!(stats.errors >= 1);
        assert_eq!(stats.planning_triggered, 0);
    }

    #[tokio::test]
    async fn test_every_confidence_respects_the_ceiling() {
        let service = GuardService::new(quiet_config());
        for command in ["ls", "rm -rf /", "git push --force", "echo ok"] {
            let result = service.pre_check(bash(command)).await;
            assert!(
                result.decision.confidence <= CONFIDENCE_CEILING,
                "{} exceeded the ceiling",
                command
            );
            for agent in &result.decision.agent_results {
                assert!(agent.confidence <= CONFIDENCE_CEILING);
            }
        }
    }

    #[tokio::test]
    async fn test_abstaining_panel_yields_no_consensus() {
        // Nothing in the context for either advisor to judge: both abstain,
        // and absence of agreement is surfaced rather than defaulted.
        let service = GuardService::new(quiet_config());
        let result = service
            .request_consensus(ConsensusRequest {
                topic: "adopt the proposal?".to_string(),
                options: vec!["yes".to_string(), "no".to_string()],
                context: json!({}),
            })
            .await;
        assert!(!result.outcome.consensus);
        assert_eq!(result.votes.len(), 2);
    }

    #[tokio::test]
    async fn test_post_analyze_collects_observations() {
        let service = GuardService::new(quiet_config());
        let result = service
            .post_analyze(PostEvent {
                tool: "Bash".to_string(),
                input: json!({ "command": "cargo build" }),
                output: None,
                duration_ms: Some(20_000),
                success: Some(false),
                user_id: None,
                session_id: None,
            })
            .await;

        assert!(result.ok);
        assert!(result
            .observations
            .iter()
            .any(|o| o.contains("failure")));
        assert!(result.observations.iter().any(|o| o.contains("slow")));
    }

    #[tokio::test]
    async fn test_clear_resets_cache_and_counters() {
        let service = GuardService::new(quiet_config());
        let _ = service.pre_check(bash("echo hello")).await;
        service.clear().await;

        let stats = service.stats().await;
        assert_eq!(stats.pre_checks, 0);
        assert_eq!(stats.cache_entries, 0);
    }

    #[tokio::test]
    async fn test_stats_counters_are_monotonic() {
        let service = GuardService::new(quiet_config());
        let _ = service.pre_check(bash("echo one")).await;
        let a = service.stats().await;
        let _ = service.pre_check(bash("echo two")).await;
        let b = service.stats().await;
        assert!(b.pre_checks > a.pre_checks);
    }
}
