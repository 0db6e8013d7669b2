//! Decision cache
//!
//! Time-bounded memo of prior decisions, keyed by an operation fingerprint.
//! Expiry is lazy on read, with a sweep on write once the entry count
//! crosses the configured bound. Growth is best-effort bounded: if nothing
//! has expired, the sweep is a no-op.
//!
//! Lookups and writes are not atomic across the full pipeline, so two
//! near-simultaneous identical requests can both miss and both recompute.
//! That is accepted - recomputation is idempotent.

use crate::guard::types::Decision;
use sha2::{Digest, Sha256};
use std::collections::HashMap;
use std::time::{Duration, Instant};
use tokio::sync::RwLock;
use tracing::debug;

/// How much of the serialized input participates in the fingerprint.
const FINGERPRINT_INPUT_LIMIT: usize = 256;

/// Build a cache key from an operation name and a bounded serialization
/// of its input.
pub fn fingerprint(tool: &str, input: &serde_json::Value) -> String {
    let serialized = input.to_string();
    let bytes = serialized.as_bytes();
    let truncated = &bytes[..bytes.len().min(FINGERPRINT_INPUT_LIMIT)];
    let mut hasher = Sha256::new();
    hasher.update(tool.as_bytes());
    hasher.update(b":");
    hasher.update(truncated);
    format!("{:x}", hasher.finalize())
}

struct CacheEntry {
    decision: Decision,
    created: Instant,
}

/// Thread-safe TTL cache for decisions
pub struct DecisionCache {
    entries: RwLock<HashMap<String, CacheEntry>>,
    ttl: Duration,
    max_entries: usize,
}

impl DecisionCache {
    pub fn new(ttl: Duration, max_entries: usize) -> Self {
        Self {
            entries: RwLock::new(HashMap::new()),
            ttl,
            max_entries,
        }
    }

    /// Look up a decision. Expired entries are removed on read.
    pub async fn get(&self, key: &str) -> Option<Decision> {
        {
            let entries = self.entries.read().await;
            match entries.get(key) {
                Some(entry) if entry.created.elapsed() <= self.ttl => {
                    return Some(entry.decision.clone());
                }
                Some(_) => {} // expired, fall through to remove
                None => return None,
            }
        }

        let mut entries = self.entries.write().await;
        // Re-check under the write lock; another task may have refreshed it
        if let Some(entry) = entries.get(key) {
            if entry.created.elapsed() <= self.ttl {
                return Some(entry.decision.clone());
            }
            entries.remove(key);
        }
        None
    }

    /// Store a decision. When the cache is over its bound, sweep expired
    /// entries first.
    pub async fn put(&self, key: String, decision: Decision) {
        let mut entries = self.entries.write().await;
        entries.insert(
            key,
            CacheEntry {
                decision,
                created: Instant::now(),
            },
        );

        if entries.len() > self.max_entries {
            let before = entries.len();
            entries.retain(|_, e| e.created.elapsed() <= self.ttl);
            let removed = before - entries.len();
            if removed > 0 {
                debug!("Cache sweep removed {} expired entries", removed);
            }
        }
    }

    /// Remove every expired entry.
    pub async fn evict_expired(&self) {
        let mut entries = self.entries.write().await;
        entries.retain(|_, e| e.created.elapsed() <= self.ttl);
    }

    /// Drop everything.
    pub async fn clear(&self) {
        let mut entries = self.entries.write().await;
        entries.clear();
    }

    pub async fn len(&self) -> usize {
        let entries = self.entries.read().await;
        entries.len()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pretty_assertions::{assert_eq, assert_ne};
    use serde_json::json;

    fn decision(reason: &str) -> Decision {
        Decision::allow(reason, 0.5)
    }

    #[test]
    fn test_fingerprint_is_stable() {
        let a = fingerprint("Bash", &json!({"command": "ls"}));
        let b = fingerprint("Bash", &json!({"command": "ls"}));
        assert_eq!(a, b);
    }

    #[test]
    fn test_fingerprint_varies_by_tool_and_input() {
        let a = fingerprint("Bash", &json!({"command": "ls"}));
        let b = fingerprint("Bash", &json!({"command": "pwd"}));
        let c = fingerprint("Write", &json!({"command": "ls"}));
        assert_ne!(a, b);
        assert_ne!(a, c);
    }

    #[test]
    fn test_fingerprint_truncates_large_input() {
        let big = "x".repeat(100_000);
        let key = fingerprint("Write", &json!({"content": big}));
        assert_eq!(key.len(), 64); // sha256 hex
    }

    #[tokio::test]
    async fn test_get_within_ttl() {
        let cache = DecisionCache::new(Duration::from_secs(30), 100);
        cache.put("k1".to_string(), decision("ok")).await;
        let hit = cache.get("k1").await;
        assert!(hit.is_some());
        assert_eq!(hit.unwrap().reason, "ok");
    }

    #[tokio::test]
    async fn test_get_after_ttl_expires_lazily() {
        let cache = DecisionCache::new(Duration::from_millis(20), 100);
        cache.put("k1".to_string(), decision("ok")).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        assert!(cache.get("k1").await.is_none());
        assert_eq!(cache.len().await, 0); // the read removed it
    }

    #[tokio::test]
    async fn test_put_sweeps_expired_when_over_bound() {
        let cache = DecisionCache::new(Duration::from_millis(20), 2);
        cache.put("a".to_string(), decision("1")).await;
        cache.put("b".to_string(), decision("2")).await;
        tokio::time::sleep(Duration::from_millis(40)).await;
        cache.put("c".to_string(), decision("3")).await;
        // a and b were expired; the over-bound put swept them
        assert_eq!(cache.len().await, 1);
        assert!(cache.get("c").await.is_some());
    }

    #[tokio::test]
    async fn test_sweep_is_noop_when_nothing_expired() {
        let cache = DecisionCache::new(Duration::from_secs(30), 2);
        cache.put("a".to_string(), decision("1")).await;
        cache.put("b".to_string(), decision("2")).await;
        cache.put("c".to_string(), decision("3")).await;
        // Nothing expired, so the cache temporarily exceeds its bound
        assert_eq!(cache.len().await, 3);
    }

    #[tokio::test]
    async fn test_clear() {
        let cache = DecisionCache::new(Duration::from_secs(30), 100);
        cache.put("a".to_string(), decision("1")).await;
        cache.clear().await;
        assert_eq!(cache.len().await, 0);
    }
}
