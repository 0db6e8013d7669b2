//! Planning gate
//!
//! The meta-cognitive layer: decides, for risky or chaos-forced requests,
//! whether the system should pause and deliberate before proceeding. The
//! pause decision is a composite of risk level, a complexity estimate, and
//! confidence in the available signals - when confidence is low and risk
//! is high, the gate prefers pausing.
//!
//! On pause the gate also synthesizes a few alternative courses of action.
//! These are display data only; nothing here ranks or executes them.

use crate::guard::types::{HookEvent, PlanAlternative, PlanAssessment, PlanDecision, PlanSignals};
use crate::guard::{clamp_confidence, CONFIDENCE_CEILING, HIGH_RISK_THRESHOLD};

/// Risk at or above which the critical-risk trigger fires.
const CRITICAL_RISK: f64 = 0.9;

/// Signal confidence below which a high-risk request pauses.
const LOW_CONFIDENCE: f64 = 0.4;

/// Complexity above which a high-risk request pauses.
const HIGH_COMPLEXITY: f64 = 0.6;

pub struct PlanningGate;

impl PlanningGate {
    pub fn new() -> Self {
        Self
    }

    /// Assess whether deliberation is warranted. Total: always produces
    /// an assessment.
    pub fn assess(&self, event: &HookEvent, signals: &PlanSignals) -> PlanAssessment {
        let needed = signals.risk_score >= HIGH_RISK_THRESHOLD || signals.chaos_forced;
        if !needed {
            return PlanAssessment::not_needed();
        }

        let complexity = Self::complexity_estimate(event);
        let confidence = Self::signal_confidence(signals, complexity);

        let mut triggers = Vec::new();
        if signals.risk_score >= HIGH_RISK_THRESHOLD {
            triggers.push("elevated-risk".to_string());
        }
        if signals.risk_score >= CRITICAL_RISK {
            triggers.push("critical-risk".to_string());
        }
        if signals.chaos_forced {
            triggers.push("chaos-forced".to_string());
        }
        if complexity > HIGH_COMPLEXITY {
            triggers.push("high-complexity".to_string());
        }
        if confidence < LOW_CONFIDENCE {
            triggers.push("low-signal-confidence".to_string());
        }

        // Pause is the precautionary composite: elevated risk alone is not
        // enough - the downstream stages exist to judge that. The gate
        // pauses when risk is high AND its own view is murky.
        let elevated = signals.risk_score >= HIGH_RISK_THRESHOLD;
        let pause = elevated && (confidence < LOW_CONFIDENCE || complexity > HIGH_COMPLEXITY);

        let decision = if pause {
            PlanDecision::Pause
        } else {
            PlanDecision::Proceed
        };

        let alternatives = if pause {
            Self::synthesize_alternatives(event)
        } else {
            Vec::new()
        };

        PlanAssessment {
            needed,
            decision,
            triggers,
            alternatives,
            confidence,
        }
    }

    /// Rough estimate of how much is going on in this request.
    fn complexity_estimate(event: &HookEvent) -> f64 {
        let serialized = event.input.to_string();
        let size_factor = (serialized.len() as f64 / 2048.0).min(1.0);
        let chains = serialized.matches("&&").count()
            + serialized.matches("||").count()
            + serialized.matches(';').count()
            + serialized.matches('|').count();
        let chain_factor = (chains as f64 / 6.0).min(1.0);
        (0.6 * size_factor + 0.4 * chain_factor).min(1.0)
    }

    /// How much the gate trusts what it can see. Chaos-forced requests
    /// carry artificial signals, and complex inputs hide intent.
    fn signal_confidence(signals: &PlanSignals, complexity: f64) -> f64 {
        let mut confidence = CONFIDENCE_CEILING;
        if signals.chaos_forced {
            confidence *= 0.5;
        }
        confidence *= 1.0 - 0.5 * complexity;
        clamp_confidence(confidence)
    }

    fn synthesize_alternatives(event: &HookEvent) -> Vec<PlanAlternative> {
        let mut alternatives = Vec::new();
        let text = event.input.to_string();

        if text.contains("rm ") || text.contains("drop ") || text.contains("DROP ") {
            alternatives.push(PlanAlternative {
                title: "Narrow the target".to_string(),
                description: "Delete the specific files or objects instead of a recursive sweep."
                    .to_string(),
                action: Some("List the exact targets and remove them one by one".to_string()),
            });
            alternatives.push(PlanAlternative {
                title: "Take a backup first".to_string(),
                description: "Snapshot the affected data before anything irreversible.".to_string(),
                action: Some("Copy the target to a scratch location".to_string()),
            });
        }

        if text.contains("push") || text.contains("publish") {
            alternatives.push(PlanAlternative {
                title: "Stage it out of band".to_string(),
                description: "Push to a scratch branch or a dry-run registry target first."
                    .to_string(),
                action: Some("Use --dry-run or a throwaway remote".to_string()),
            });
        }

        alternatives.push(PlanAlternative {
            title: "Confirm with the user".to_string(),
            description: format!(
                "Surface the {} call and wait for an explicit go-ahead.",
                event.tool
            ),
            action: None,
        });

        alternatives
    }
}

impl Default for PlanningGate {
    fn default() -> Self {
        Self::new()
    }
}
