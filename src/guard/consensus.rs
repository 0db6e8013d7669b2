//! Consensus aggregation
//!
//! Reduces weighted, confidence-scored votes from independent advisory
//! sources to a single verdict. Two passes are tried in sequence:
//!
//! 1. **Swarm**: a majority count over the non-abstaining voters, usable
//!    only when enough parties actually voted.
//! 2. **Potential**: each vote contributes `weight x confidence` toward an
//!    approve or reject potential; the higher side wins only when the gap
//!    clears a minimum threshold.
//!
//! Ties and near-ties yield `consensus: false`. Absence of agreement is
//! informative and gets surfaced, never papered over with a default.

use crate::guard::clamp_confidence;
use crate::guard::types::{ConsensusDecision, ConsensusOutcome, Vote, VoteVerdict};

/// Minimum non-abstaining voters for the swarm pass to be meaningful.
const MIN_SWARM_VOTERS: usize = 3;

/// Minimum potential gap before the weighted pass declares a winner.
const MIN_POTENTIAL_GAP: f64 = 0.25;

pub struct ConsensusEngine {
    min_gap: f64,
}

impl ConsensusEngine {
    pub fn new() -> Self {
        Self {
            min_gap: MIN_POTENTIAL_GAP,
        }
    }

    /// Reduce a set of votes to a verdict.
    pub fn aggregate(&self, votes: &[Vote]) -> ConsensusOutcome {
        let (approve_potential, reject_potential) = Self::potentials(votes);

        if let Some(outcome) = self.swarm_pass(votes, approve_potential, reject_potential) {
            return outcome;
        }

        self.potential_pass(votes, approve_potential, reject_potential)
    }

    fn potentials(votes: &[Vote]) -> (f64, f64) {
        let mut approve = 0.0;
        let mut reject = 0.0;
        for vote in votes {
            let contribution = vote.weight * clamp_confidence(vote.confidence);
            match vote.verdict {
                VoteVerdict::Approve => approve += contribution,
                VoteVerdict::Reject => reject += contribution,
                VoteVerdict::Abstain => {}
            }
        }
        (approve, reject)
    }

    /// Majority count over the non-abstaining voters.
    fn swarm_pass(
        &self,
        votes: &[Vote],
        approve_potential: f64,
        reject_potential: f64,
    ) -> Option<ConsensusOutcome> {
        let approvals = votes
            .iter()
            .filter(|v| v.verdict == VoteVerdict::Approve)
            .count();
        let rejections = votes
            .iter()
            .filter(|v| v.verdict == VoteVerdict::Reject)
            .count();
        let participating = approvals + rejections;

        if participating < MIN_SWARM_VOTERS {
            return None;
        }

        let (decision, winners, side_potential) = if approvals * 2 > participating {
            (ConsensusDecision::Approve, approvals, approve_potential)
        } else if rejections * 2 > participating {
            (ConsensusDecision::Reject, rejections, reject_potential)
        } else {
            return None; // even split, fall through to the weighted pass
        };

        // Mean confidence of the winning side, weight-scaled
        let confidence = clamp_confidence(side_potential / winners as f64);

        Some(ConsensusOutcome {
            consensus: true,
            decision: Some(decision),
            confidence,
            approve_potential,
            reject_potential,
            method: Some("swarm".to_string()),
        })
    }

    /// Weighted potentials with a minimum-gap requirement.
    fn potential_pass(
        &self,
        _votes: &[Vote],
        approve_potential: f64,
        reject_potential: f64,
    ) -> ConsensusOutcome {
        let gap = (approve_potential - reject_potential).abs();
        if gap <= self.min_gap {
            return ConsensusOutcome::none(approve_potential, reject_potential);
        }

        let (decision, winning) = if approve_potential > reject_potential {
            (ConsensusDecision::Approve, approve_potential)
        } else {
            (ConsensusDecision::Reject, reject_potential)
        };

        let total = approve_potential + reject_potential;
        let confidence = clamp_confidence(if total > 0.0 { winning / total } else { 0.0 });

        ConsensusOutcome {
            consensus: true,
            decision: Some(decision),
            confidence,
            approve_potential,
            reject_potential,
            method: Some("potential".to_string()),
        }
    }
}

impl Default for ConsensusEngine {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::guard::CONFIDENCE_CEILING;

    fn vote(source: &str, verdict: VoteVerdict, confidence: f64, weight: f64) -> Vote {
        Vote::new(source, verdict, confidence, weight)
    }

    #[test]
    fn test_equal_opposing_votes_yield_no_consensus() {
        let engine = ConsensusEngine::new();
        let votes = vec![
            vote("a", VoteVerdict::Approve, 0.5, 1.0),
            vote("b", VoteVerdict::Reject, 0.5, 1.0),
        ];
        let outcome = engine.aggregate(&votes);
        assert!(!outcome.consensus);
        assert!(outcome.decision.is_none());
    }

    #[test]
    fn test_empty_votes_yield_no_consensus() {
        let outcome = ConsensusEngine::new().aggregate(&[]);
        assert!(!outcome.consensus);
        assert_eq!(outcome.approve_potential, 0.0);
        assert_eq!(outcome.reject_potential, 0.0);
    }

    #[test]
    fn test_swarm_majority_approves() {
        let engine = ConsensusEngine::new();
        let votes = vec![
            vote("a", VoteVerdict::Approve, 0.5, 1.0),
            vote("b", VoteVerdict::Approve, 0.4, 1.0),
            vote("c", VoteVerdict::Reject, 0.6, 1.0),
        ];
        let outcome = engine.aggregate(&votes);
        assert!(outcome.consensus);
        assert_eq!(outcome.decision, Some(ConsensusDecision::Approve));
        assert_eq!(outcome.method.as_deref(), Some("swarm"));
    }

    #[test]
    fn test_swarm_even_split_falls_to_potential() {
        let engine = ConsensusEngine::new();
        // Four voters, 2-2 on heads, but rejection carries far more weight
        let votes = vec![
            vote("a", VoteVerdict::Approve, 0.2, 0.5),
            vote("b", VoteVerdict::Approve, 0.2, 0.5),
            vote("c", VoteVerdict::Reject, 0.6, 2.0),
            vote("d", VoteVerdict::Reject, 0.6, 2.0),
        ];
        let outcome = engine.aggregate(&votes);
        assert!(outcome.consensus);
        assert_eq!(outcome.decision, Some(ConsensusDecision::Reject));
        assert_eq!(outcome.method.as_deref(), Some("potential"));
    }

    #[test]
    fn test_two_voters_skip_swarm() {
        let engine = ConsensusEngine::new();
        let votes = vec![
            vote("a", VoteVerdict::Reject, 0.6, 1.0),
            vote("b", VoteVerdict::Reject, 0.5, 1.0),
        ];
        let outcome = engine.aggregate(&votes);
        // Only two voters: resolved by potential, not swarm
        assert!(outcome.consensus);
        assert_eq!(outcome.method.as_deref(), Some("potential"));
        assert_eq!(outcome.decision, Some(ConsensusDecision::Reject));
    }

    #[test]
    fn test_near_tie_within_gap_is_no_consensus() {
        let engine = ConsensusEngine::new();
        let votes = vec![
            vote("a", VoteVerdict::Approve, 0.5, 1.0),
            vote("b", VoteVerdict::Reject, 0.4, 1.0),
        ];
        // Gap is 0.1, below the minimum
        let outcome = engine.aggregate(&votes);
        assert!(!outcome.consensus);
    }

    #[test]
    fn test_abstentions_do_not_count() {
        let engine = ConsensusEngine::new();
        let votes = vec![
            vote("a", VoteVerdict::Abstain, 0.6, 5.0),
            vote("b", VoteVerdict::Abstain, 0.6, 5.0),
            vote("c", VoteVerdict::Abstain, 0.6, 5.0),
            vote("d", VoteVerdict::Reject, 0.6, 1.0),
        ];
        let outcome = engine.aggregate(&votes);
        assert_eq!(outcome.approve_potential, 0.0);
        assert!(outcome.consensus);
        assert_eq!(outcome.decision, Some(ConsensusDecision::Reject));
    }

    #[test]
    fn test_outcome_confidence_respects_ceiling() {
        let engine = ConsensusEngine::new();
        let votes = vec![
            vote("a", VoteVerdict::Reject, 0.618, 10.0),
            vote("b", VoteVerdict::Reject, 0.618, 10.0),
            vote("c", VoteVerdict::Reject, 0.618, 10.0),
        ];
        let outcome = engine.aggregate(&votes);
        assert!(outcome.confidence <= CONFIDENCE_CEILING);
    }
}
