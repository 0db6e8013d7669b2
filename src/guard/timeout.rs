//! Deadline wrapper for external calls
//!
//! Every suspension point in the pipeline races the underlying call
//! against a fixed deadline. On expiry the caller proceeds as if the call
//! produced no opinion. The future is dropped, not cancelled cooperatively;
//! a slow backend may finish its work for nothing, which is an accepted
//! leak bounded by the deadline.

use std::future::Future;
use std::time::Duration;
use tracing::warn;

/// Run `fut` with a deadline. `None` means the deadline expired.
pub async fn with_deadline<T>(
    label: &str,
    deadline: Duration,
    fut: impl Future<Output = T>,
) -> Option<T> {
    match tokio::time::timeout(deadline, fut).await {
        Ok(value) => Some(value),
        Err(_) => {
            warn!(
                "{} did not answer within {}ms, proceeding without it",
                label,
                deadline.as_millis()
            );
            None
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::time::Instant;

    #[tokio::test]
    async fn test_fast_call_passes_through() {
        let result = with_deadline("fast", Duration::from_secs(1), async { 42 }).await;
        assert_eq!(result, Some(42));
    }

    #[tokio::test]
    async fn test_hanging_call_expires() {
        let started = Instant::now();
        let result: Option<()> = with_deadline(
            "hung",
            Duration::from_millis(50),
            std::future::pending(),
        )
        .await;
        assert!(result.is_none());
        assert!(started.elapsed() < Duration::from_secs(1));
    }
}
