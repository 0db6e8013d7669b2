//! External collaborator boundaries
//!
//! The guard pipeline consumes a routing/voting backend, a planning
//! backend, and a panel of advisory voters. All of them are specified
//! here as trait seams so deployments can swap in real remote services;
//! the in-process defaults keep the binary complete on its own.
//!
//! Every backend is treated as unreliable: the orchestrator wraps each
//! call in a deadline and converts failures into "no opinion".

pub mod advisors;
pub mod routing;

use crate::guard::planning::PlanningGate;
use crate::guard::types::{HookEvent, PlanAssessment, PlanSignals, RoutedDecision, Vote};
use async_trait::async_trait;
use thiserror::Error;
use tracing::info;

/// Failure surface of any backend call. Always absorbed by the caller.
#[derive(Error, Debug)]
pub enum BackendError {
    #[error("backend unavailable: {0}")]
    Unavailable(String),

    #[error("backend internal error: {0}")]
    Internal(String),
}

/// The routing/voting backend: receives hook events and answers with a
/// routed decision. Slowness or absence must never be fatal here.
#[async_trait]
pub trait RoutingBackend: Send + Sync {
    async fn receive_event(
        &self,
        hook_type: &str,
        payload: &serde_json::Value,
        user_id: Option<&str>,
        session_id: Option<&str>,
    ) -> Result<RoutedDecision, BackendError>;
}

/// The planning backend: judges whether deliberation is warranted, and
/// generates the deliberation artifact as a side effect.
#[async_trait]
pub trait PlanningBackend: Send + Sync {
    async fn should_plan(
        &self,
        event: &HookEvent,
        signals: &PlanSignals,
    ) -> Result<PlanAssessment, BackendError>;

    /// Side-effecting and fire-and-forget from the pipeline's perspective.
    async fn generate_plan(
        &self,
        event: &HookEvent,
        assessment: &PlanAssessment,
    ) -> Result<(), BackendError>;
}

/// One independent advisory voter.
#[async_trait]
pub trait Advisor: Send + Sync {
    fn id(&self) -> &str;

    async fn cast_vote(
        &self,
        topic: &str,
        context: &serde_json::Value,
    ) -> Result<Vote, BackendError>;
}

/// Default planning backend: the in-process gate, with plan generation
/// reduced to a log line. Real deployments point this at a service that
/// renders and stores the deliberation artifact.
pub struct GatePlanner {
    gate: PlanningGate,
}

impl GatePlanner {
    pub fn new() -> Self {
        Self {
            gate: PlanningGate::new(),
        }
    }
}

impl Default for GatePlanner {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl PlanningBackend for GatePlanner {
    async fn should_plan(
        &self,
        event: &HookEvent,
        signals: &PlanSignals,
    ) -> Result<PlanAssessment, BackendError> {
        Ok(self.gate.assess(event, signals))
    }

    async fn generate_plan(
        &self,
        event: &HookEvent,
        assessment: &PlanAssessment,
    ) -> Result<(), BackendError> {
        info!(
            "📝 Deliberation plan for {}: {} trigger(s), {} alternative(s)",
            event.tool,
            assessment.triggers.len(),
            assessment.alternatives.len()
        );
        Ok(())
    }
}
