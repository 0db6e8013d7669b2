//! Local routing backend
//!
//! A rule-driven stand-in for the remote routing/voting service. It reuses
//! the risk rule table: catastrophic patterns are blocked outright,
//! everything else is approved with a confidence that shrinks as risk
//! grows. Deployments with a real judgment service swap this out at the
//! `RoutingBackend` seam.

use crate::backends::{BackendError, RoutingBackend};
use crate::guard::risk::RiskClassifier;
use crate::guard::types::{AgentResult, RoutedDecision, Synthesis};
use crate::guard::clamp_confidence;
use async_trait::async_trait;
use tracing::info;

/// Risk score at or above which the local router blocks on its own.
const LOCAL_BLOCK_THRESHOLD: f64 = 0.9;

pub struct LocalRouter {
    classifier: RiskClassifier,
}

impl LocalRouter {
    pub fn new() -> Self {
        Self {
            classifier: RiskClassifier::new(),
        }
    }
}

impl Default for LocalRouter {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl RoutingBackend for LocalRouter {
    async fn receive_event(
        &self,
        hook_type: &str,
        payload: &serde_json::Value,
        _user_id: Option<&str>,
        _session_id: Option<&str>,
    ) -> Result<RoutedDecision, BackendError> {
        let tool = payload
            .get("tool")
            .and_then(|v| v.as_str())
            .unwrap_or("unknown");
        let input = payload.get("input").cloned().unwrap_or(serde_json::Value::Null);

        let score = self.classifier.score(tool, &input);
        let matched = self.classifier.matching_rules(tool, &input);
        let rule_names: Vec<&str> = matched.iter().map(|r| r.name.as_str()).collect();

        // Only pre-execution events can be blocked; post-hoc analysis
        // observes and reports.
        if hook_type == "PreToolUse" && score >= LOCAL_BLOCK_THRESHOLD {
            let message = format!(
                "Blocked: {} (risk {:.2})",
                rule_names.first().unwrap_or(&"catastrophic pattern"),
                score
            );
            info!("🛑 Local router blocked {}: {}", tool, message);
            return Ok(RoutedDecision {
                blocked: true,
                blocked_by: Some("local-router".to_string()),
                block_message: Some(message.clone()),
                synthesis: Synthesis {
                    confidence: clamp_confidence(score),
                    reason: message.clone(),
                },
                agent_results: vec![AgentResult {
                    source: "local-router".to_string(),
                    verdict: "reject".to_string(),
                    confidence: clamp_confidence(score),
                    reason: Some(message),
                }],
            });
        }

        let reason = if rule_names.is_empty() {
            format!("No risk rules matched {} (risk {:.2})", tool, score)
        } else {
            format!(
                "Matched {} but below block threshold (risk {:.2})",
                rule_names.join(", "),
                score
            )
        };

        Ok(RoutedDecision {
            blocked: false,
            blocked_by: None,
            block_message: None,
            synthesis: Synthesis {
                confidence: clamp_confidence(1.0 - score),
                reason: reason.clone(),
            },
            agent_results: vec![AgentResult {
                source: "local-router".to_string(),
                verdict: "approve".to_string(),
                confidence: clamp_confidence(1.0 - score),
                reason: Some(reason),
            }],
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[tokio::test]
    async fn test_blocks_catastrophic_pre_event() {
        let router = LocalRouter::new();
        let routed = router
            .receive_event(
                "PreToolUse",
                &json!({"tool": "Bash", "input": {"command": "rm -rf /"}}),
                None,
                None,
            )
            .await
            .unwrap();
        assert!(routed.blocked);
        assert_eq!(routed.blocked_by.as_deref(), Some("local-router"));
    }

    #[tokio::test]
    async fn test_approves_benign_command() {
        let router = LocalRouter::new();
        let routed = router
            .receive_event(
                "PreToolUse",
                &json!({"tool": "Bash", "input": {"command": "ls"}}),
                None,
                None,
            )
            .await
            .unwrap();
        assert!(!routed.blocked);
        assert!(routed.synthesis.confidence > 0.0);
    }

    #[tokio::test]
    async fn test_never_blocks_post_events() {
        let router = LocalRouter::new();
        let routed = router
            .receive_event(
                "PostToolUse",
                &json!({"tool": "Bash", "input": {"command": "rm -rf /"}}),
                None,
                None,
            )
            .await
            .unwrap();
        assert!(!routed.blocked);
    }
}
