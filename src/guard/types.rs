//! Guard pipeline data model
//!
//! Shared types for hook events, decisions, votes, plans, and statistics.

use crate::guard::clamp_confidence;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::atomic::{AtomicU64, Ordering};
use uuid::Uuid;

// =============================================================================
// HOOK EVENTS
// =============================================================================

/// An operation about to be executed by an agent.
///
/// Immutable once received; lives for the duration of one pipeline cycle.
/// Identity fields are opaque pass-through - the guard never interprets them.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct HookEvent {
    pub tool: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

/// An operation that already ran, submitted for after-the-fact analysis.
#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostEvent {
    pub tool: String,
    #[serde(default)]
    pub input: serde_json::Value,
    #[serde(default)]
    pub output: Option<serde_json::Value>,
    #[serde(default)]
    pub duration_ms: Option<u64>,
    #[serde(default)]
    pub success: Option<bool>,
    #[serde(default)]
    pub user_id: Option<String>,
    #[serde(default)]
    pub session_id: Option<String>,
}

// =============================================================================
// DECISIONS
// =============================================================================

/// One advisory or routing participant's contribution to a decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AgentResult {
    pub source: String,
    pub verdict: String,
    pub confidence: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<String>,
}

/// The guard's verdict on a single operation request.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Decision {
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    pub confidence: f64,
    pub reason: String,
    pub is_high_risk: bool,
    #[serde(default)]
    pub agent_results: Vec<AgentResult>,
    pub from_cache: bool,
    /// Diagnostic annotation when the pipeline degraded (timeout, backend
    /// failure). The operation still proceeds - fail-open.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl Decision {
    /// An allow decision. Confidence is clamped to the ceiling.
    pub fn allow(reason: impl Into<String>, confidence: f64) -> Self {
        Self {
            blocked: false,
            blocked_by: None,
            message: None,
            confidence: clamp_confidence(confidence),
            reason: reason.into(),
            is_high_risk: false,
            agent_results: Vec::new(),
            from_cache: false,
            error: None,
        }
    }

    /// A block decision attributed to a source. Confidence is clamped.
    pub fn block(
        blocked_by: impl Into<String>,
        message: impl Into<String>,
        reason: impl Into<String>,
        confidence: f64,
    ) -> Self {
        Self {
            blocked: true,
            blocked_by: Some(blocked_by.into()),
            message: Some(message.into()),
            confidence: clamp_confidence(confidence),
            reason: reason.into(),
            is_high_risk: false,
            agent_results: Vec::new(),
            from_cache: false,
            error: None,
        }
    }

    pub fn with_high_risk(mut self, high_risk: bool) -> Self {
        self.is_high_risk = high_risk;
        self
    }

    pub fn with_error(mut self, error: impl Into<String>) -> Self {
        self.error = Some(error.into());
        self
    }
}

/// Response for the pre-check operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PreCheckResult {
    #[serde(flatten)]
    pub decision: Decision,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub plan: Option<PlanAssessment>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub risk_score: Option<f64>,
}

/// Response for the post-analysis operation.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct PostAnalyzeResult {
    pub ok: bool,
    pub observations: Vec<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub synthesis: Option<Synthesis>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

// =============================================================================
// ROUTING BOUNDARY
// =============================================================================

/// Condensed judgment attached to a routed decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Synthesis {
    pub confidence: f64,
    pub reason: String,
}

/// What the routing/voting backend returns for one event.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RoutedDecision {
    pub blocked: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub blocked_by: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub block_message: Option<String>,
    pub synthesis: Synthesis,
    #[serde(default)]
    pub agent_results: Vec<AgentResult>,
}

// =============================================================================
// VOTES & CONSENSUS
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum VoteVerdict {
    Approve,
    Reject,
    Abstain,
}

/// A weighted, confidence-scored vote from one advisory source.
/// Ephemeral: produced and consumed within one consensus call.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Vote {
    pub source: String,
    pub verdict: VoteVerdict,
    pub confidence: f64,
    pub weight: f64,
}

impl Vote {
    pub fn new(source: impl Into<String>, verdict: VoteVerdict, confidence: f64, weight: f64) -> Self {
        Self {
            source: source.into(),
            verdict,
            confidence: clamp_confidence(confidence),
            weight: weight.max(0.0),
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ConsensusDecision {
    Approve,
    Reject,
}

/// Result of reducing a set of votes to a single verdict.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusOutcome {
    pub consensus: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub decision: Option<ConsensusDecision>,
    pub confidence: f64,
    pub approve_potential: f64,
    pub reject_potential: f64,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub method: Option<String>,
}

impl ConsensusOutcome {
    /// The explicit "no agreement" outcome. Not an error.
    pub fn none(approve_potential: f64, reject_potential: f64) -> Self {
        Self {
            consensus: false,
            decision: None,
            confidence: 0.0,
            approve_potential,
            reject_potential,
            method: None,
        }
    }
}

/// A caller-initiated consensus request.
#[derive(Debug, Clone, Deserialize, validator::Validate)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusRequest {
    #[validate(length(min = 1, max = 500))]
    pub topic: String,
    #[serde(default)]
    pub options: Vec<String>,
    #[serde(default)]
    pub context: serde_json::Value,
}

/// Response for a caller-initiated consensus request.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ConsensusResult {
    pub topic: String,
    pub outcome: ConsensusOutcome,
    pub votes: Vec<Vote>,
}

// =============================================================================
// PLANNING
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PlanDecision {
    Proceed,
    Pause,
}

/// An alternative course of action, synthesized for display only.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAlternative {
    pub title: String,
    pub description: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub action: Option<String>,
}

/// The planning gate's judgment on whether to deliberate before acting.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PlanAssessment {
    pub needed: bool,
    pub decision: PlanDecision,
    pub triggers: Vec<String>,
    pub alternatives: Vec<PlanAlternative>,
    pub confidence: f64,
}

impl PlanAssessment {
    /// The defensive fallback: deliberation not needed, proceed.
    pub fn not_needed() -> Self {
        Self {
            needed: false,
            decision: PlanDecision::Proceed,
            triggers: Vec::new(),
            alternatives: Vec::new(),
            confidence: 0.0,
        }
    }
}

/// Signals available to the planning gate at assessment time.
#[derive(Debug, Clone)]
pub struct PlanSignals {
    pub risk_score: f64,
    pub chaos_forced: bool,
}

// =============================================================================
// CHAOS
// =============================================================================

/// Result of one chaos draw.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosProbe {
    pub injected: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub id: Option<Uuid>,
}

impl ChaosProbe {
    pub fn skipped() -> Self {
        Self {
            injected: false,
            id: None,
        }
    }
}

/// Outcome of a chaos-forced request, reported later by the caller.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ChaosOutcome {
    pub survived: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub notes: Option<String>,
}

// =============================================================================
// STATISTICS
// =============================================================================

/// Process-lifetime counters. Monotonically increasing; reset only on an
/// explicit clear.
#[derive(Debug, Default)]
pub struct GuardStats {
    pub pre_checks: AtomicU64,
    pub post_analyses: AtomicU64,
    pub consensus_requests: AtomicU64,
    pub fast_path_hits: AtomicU64,
    pub cache_hits: AtomicU64,
    pub blocks: AtomicU64,
    pub planning_triggered: AtomicU64,
    pub planning_paused: AtomicU64,
    pub chaos_injected: AtomicU64,
    pub timeouts: AtomicU64,
    pub errors: AtomicU64,
}

impl GuardStats {
    pub fn incr(counter: &AtomicU64) {
        counter.fetch_add(1, Ordering::Relaxed);
    }

    pub fn reset(&self) {
        for counter in [
            &self.pre_checks,
            &self.post_analyses,
            &self.consensus_requests,
            &self.fast_path_hits,
            &self.cache_hits,
            &self.blocks,
            &self.planning_triggered,
            &self.planning_paused,
            &self.chaos_injected,
            &self.timeouts,
            &self.errors,
        ] {
            counter.store(0, Ordering::Relaxed);
        }
    }

    pub fn snapshot(&self, started_at: DateTime<Utc>, degraded: bool, cache_entries: usize) -> StatsSnapshot {
        let get = |c: &AtomicU64| c.load(Ordering::Relaxed);
        StatsSnapshot {
            pre_checks: get(&self.pre_checks),
            post_analyses: get(&self.post_analyses),
            consensus_requests: get(&self.consensus_requests),
            fast_path_hits: get(&self.fast_path_hits),
            cache_hits: get(&self.cache_hits),
            blocks: get(&self.blocks),
            planning_triggered: get(&self.planning_triggered),
            planning_paused: get(&self.planning_paused),
            chaos_injected: get(&self.chaos_injected),
            timeouts: get(&self.timeouts),
            errors: get(&self.errors),
            degraded,
            cache_entries,
            started_at,
        }
    }
}

/// Read-only view of the running statistics.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct StatsSnapshot {
    pub pre_checks: u64,
    pub post_analyses: u64,
    pub consensus_requests: u64,
    pub fast_path_hits: u64,
    pub cache_hits: u64,
    pub blocks: u64,
    pub planning_triggered: u64,
    pub planning_paused: u64,
    pub chaos_injected: u64,
    pub timeouts: u64,
    pub errors: u64,
    pub degraded: bool,
    pub cache_entries: usize,
    pub started_at: DateTime<Utc>,
}
