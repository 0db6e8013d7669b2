//! Chaos injection
//!
//! Probabilistically forces the deliberation path for otherwise low-risk
//! operations, so the planning and consensus stages get exercised under
//! realistic traffic. Off by default; a test/staging feature.
//!
//! Chaos must never be the cause of an outage: every failure mode inside
//! this module collapses to "not injected".

use crate::guard::types::{ChaosOutcome, ChaosProbe};
use rand::Rng;
use std::collections::VecDeque;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

/// Most recent outcomes kept for analysis.
const OUTCOME_LEDGER_LIMIT: usize = 256;

pub struct ChaosInjector {
    enabled: bool,
    probability: f64,
    injections: AtomicU64,
    outcomes: RwLock<VecDeque<(Uuid, ChaosOutcome)>>,
}

impl ChaosInjector {
    pub fn new(enabled: bool, probability: f64) -> Self {
        let probability = if probability.is_nan() {
            0.0
        } else {
            probability.clamp(0.0, 1.0)
        };
        Self {
            enabled,
            probability,
            injections: AtomicU64::new(0),
            outcomes: RwLock::new(VecDeque::new()),
        }
    }

    pub fn disabled() -> Self {
        Self::new(false, 0.0)
    }

    /// Draw once. Returns whether the deliberation path should be forced
    /// for this request.
    pub fn maybe_force_planning(&self, context: &str) -> ChaosProbe {
        if !self.enabled || self.probability <= 0.0 {
            return ChaosProbe::skipped();
        }

        let draw: f64 = rand::thread_rng().gen();
        if draw >= self.probability {
            return ChaosProbe::skipped();
        }

        let id = Uuid::new_v4();
        self.injections.fetch_add(1, Ordering::Relaxed);
        debug!("Chaos injection {} forcing deliberation ({})", id, context);
        ChaosProbe {
            injected: true,
            id: Some(id),
        }
    }

    /// Record how a chaos-forced request turned out. Called later by an
    /// external caller; never consulted on the decision path.
    pub async fn record_result(&self, id: Uuid, outcome: ChaosOutcome) {
        if !outcome.survived {
            warn!("Chaos injection {} did not survive cleanly", id);
        }
        let mut outcomes = self.outcomes.write().await;
        outcomes.push_back((id, outcome));
        while outcomes.len() > OUTCOME_LEDGER_LIMIT {
            outcomes.pop_front();
        }
    }

    pub fn injections(&self) -> u64 {
        self.injections.load(Ordering::Relaxed)
    }

    pub async fn recorded_outcomes(&self) -> usize {
        self.outcomes.read().await.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_disabled_never_injects() {
        let chaos = ChaosInjector::disabled();
        for _ in 0..100 {
            assert!(!chaos.maybe_force_planning("test").injected);
        }
        assert_eq!(chaos.injections(), 0);
    }

    #[test]
    fn test_certain_probability_always_injects() {
        let chaos = ChaosInjector::new(true, 1.0);
        for _ in 0..10 {
            let probe = chaos.maybe_force_planning("test");
            assert!(probe.injected);
            assert!(probe.id.is_some());
        }
        assert_eq!(chaos.injections(), 10);
    }

    #[test]
    fn test_zero_probability_never_injects() {
        let chaos = ChaosInjector::new(true, 0.0);
        for _ in 0..100 {
            assert!(!chaos.maybe_force_planning("test").injected);
        }
    }

    #[test]
    fn test_bad_probability_collapses_to_not_injected() {
        let chaos = ChaosInjector::new(true, f64::NAN);
        assert!(!chaos.maybe_force_planning("test").injected);
        let chaos = ChaosInjector::new(true, -3.0);
        assert!(!chaos.maybe_force_planning("test").injected);
    }

    #[tokio::test]
    async fn test_outcome_ledger_is_bounded() {
        let chaos = ChaosInjector::new(true, 1.0);
        for _ in 0..(OUTCOME_LEDGER_LIMIT + 50) {
            chaos
                .record_result(
                    Uuid::new_v4(),
                    ChaosOutcome {
                        survived: true,
                        notes: None,
                    },
                )
                .await;
        }
        assert_eq!(chaos.recorded_outcomes().await, OUTCOME_LEDGER_LIMIT);
    }
}
