//! In-process advisory voters
//!
//! Two lightweight advisors keep the consensus path exercised end to end.
//! Real deployments add text-generator-backed advisors behind the same
//! `Advisor` trait; the aggregator treats them all identically.

use crate::backends::{Advisor, BackendError};
use crate::guard::risk::RiskClassifier;
use crate::guard::types::{Vote, VoteVerdict};
use crate::guard::clamp_confidence;
use async_trait::async_trait;

/// Catastrophic markers the caution advisor reacts to.
const CAUTION_MARKERS: &[&str] = &[
    "rm -rf",
    "rm -fr",
    "mkfs",
    "dd if=",
    ":(){",
    "drop database",
    "drop table",
    "truncate",
];

/// Votes from the risk rule table. Rejects only clear-cut danger,
/// abstains in the gray zone, approves when nothing matches.
pub struct RuleAdvisor {
    classifier: RiskClassifier,
}

impl RuleAdvisor {
    pub fn new() -> Self {
        Self {
            classifier: RiskClassifier::new(),
        }
    }
}

impl Default for RuleAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Advisor for RuleAdvisor {
    fn id(&self) -> &str {
        "rule-advisor"
    }

    async fn cast_vote(
        &self,
        _topic: &str,
        context: &serde_json::Value,
    ) -> Result<Vote, BackendError> {
        let tool = match context.get("tool").and_then(|v| v.as_str()) {
            Some(tool) => tool,
            // No operation in the context: nothing to judge
            None => return Ok(Vote::new(self.id(), VoteVerdict::Abstain, 0.25, 1.0)),
        };
        let input = context.get("input").cloned().unwrap_or(serde_json::Value::Null);
        let score = self.classifier.score(tool, &input);

        let vote = if score >= 0.85 {
            Vote::new(self.id(), VoteVerdict::Reject, clamp_confidence(score), 1.0)
        } else if score >= 0.7 {
            // Elevated but within tolerance: defer to the other voters
            Vote::new(self.id(), VoteVerdict::Abstain, 0.3, 1.0)
        } else {
            Vote::new(self.id(), VoteVerdict::Approve, 0.4, 1.0)
        };
        Ok(vote)
    }
}

/// A standing bias toward caution: rejects when it spots a catastrophic
/// marker anywhere in the context, abstains otherwise. Low weight - it
/// tips near-ties, it does not decide on its own.
pub struct CautionAdvisor;

impl CautionAdvisor {
    pub fn new() -> Self {
        Self
    }
}

impl Default for CautionAdvisor {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl Advisor for CautionAdvisor {
    fn id(&self) -> &str {
        "caution-advisor"
    }

    async fn cast_vote(
        &self,
        _topic: &str,
        context: &serde_json::Value,
    ) -> Result<Vote, BackendError> {
        let text = context.to_string().to_lowercase();
        let vote = if CAUTION_MARKERS.iter().any(|m| text.contains(m)) {
            Vote::new(self.id(), VoteVerdict::Reject, 0.5, 0.5)
        } else {
            Vote::new(self.id(), VoteVerdict::Abstain, 0.2, 0.5)
        };
        Ok(vote)
    }
}
