use std::time::{Duration, Instant};

use tracing::debug;

use crate::error::ProviderError;
use crate::providers::ProviderAdapter;
use crate::types::ProviderVote;

/// Votes that arrive slower than this are flagged via `latency_ok` for
/// diagnostics; the vote still counts.
const SLOW_CALL: Duration = Duration::from_secs(10);

/// Uniform retry behavior for provider calls: a hard per-attempt deadline,
/// and one extra attempt for transient failures only. Permanent failures and
/// timeouts fail immediately.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_attempts: u32,
    pub retry_delay: Duration,
    pub deadline: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_attempts: 2,
            retry_delay: Duration::from_secs(2),
            deadline: Duration::from_secs(30),
        }
    }
}

pub async fn classify_with_policy(
    adapter: &dyn ProviderAdapter,
    question: &str,
    context: Option<&str>,
    policy: RetryPolicy,
) -> Result<ProviderVote, ProviderError> {
    let mut attempt = 0;
    loop {
        attempt += 1;
        let started = Instant::now();

        let result = match tokio::time::timeout(
            policy.deadline,
            adapter.classify(question, context),
        )
        .await
        {
            Ok(result) => result,
            Err(_) => Err(ProviderError::Timeout),
        };

        match result {
            Ok(mut vote) => {
                vote.latency_ok = started.elapsed() < SLOW_CALL;
                return Ok(vote);
            }
            Err(err) if err.is_retryable() && attempt < policy.max_attempts => {
                debug!(
                    provider = adapter.id(),
                    attempt,
                    error = %err,
                    "retrying transient provider failure"
                );
                tokio::time::sleep(policy.retry_delay).await;
            }
            Err(err) => return Err(err),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::providers::vote_from_answer;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicU32, Ordering};

    struct Scripted {
        calls: AtomicU32,
        script: fn(u32) -> Result<String, ProviderError>,
        delay: Duration,
    }

    impl Scripted {
        fn new(script: fn(u32) -> Result<String, ProviderError>) -> Self {
            Self { calls: AtomicU32::new(0), script, delay: Duration::ZERO }
        }
    }

    #[async_trait]
    impl ProviderAdapter for Scripted {
        fn id(&self) -> &'static str {
            "scripted"
        }

        fn confidence(&self) -> u8 {
            50
        }

        async fn classify(
            &self,
            _question: &str,
            _context: Option<&str>,
        ) -> Result<ProviderVote, ProviderError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst);
            tokio::time::sleep(self.delay).await;
            (self.script)(call).map(|answer| vote_from_answer("scripted", 50, answer))
        }
    }

    fn fast_policy() -> RetryPolicy {
        RetryPolicy {
            max_attempts: 2,
            retry_delay: Duration::from_millis(5),
            deadline: Duration::from_millis(200),
        }
    }

    #[tokio::test]
    async fn transient_failure_is_retried_once() {
        let adapter = Scripted::new(|call| {
            if call == 0 {
                Err(ProviderError::Transient("rate limited".into()))
            } else {
                Ok("YES".into())
            }
        });

        let vote = classify_with_policy(&adapter, "q", None, fast_policy()).await.unwrap();
        assert_eq!(vote.outcome, crate::types::Outcome::Yes);
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn permanent_failure_is_not_retried() {
        let adapter =
            Scripted::new(|_| Err(ProviderError::Permanent("no such model".into())));

        let err = classify_with_policy(&adapter, "q", None, fast_policy()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Permanent(_)));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn retries_are_bounded() {
        let adapter = Scripted::new(|_| Err(ProviderError::Transient("still down".into())));

        let err = classify_with_policy(&adapter, "q", None, fast_policy()).await.unwrap_err();
        assert!(matches!(err, ProviderError::Transient(_)));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn deadline_produces_timeout_without_retry() {
        let mut adapter = Scripted::new(|_| Ok("YES".into()));
        adapter.delay = Duration::from_millis(100);

        let policy = RetryPolicy {
            max_attempts: 2,
            retry_delay: Duration::from_millis(5),
            deadline: Duration::from_millis(10),
        };

        let err = classify_with_policy(&adapter, "q", None, policy).await.unwrap_err();
        assert!(matches!(err, ProviderError::Timeout));
        assert_eq!(adapter.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn fast_vote_is_marked_latency_ok() {
        let adapter = Scripted::new(|_| Ok("NO".into()));

        let vote = classify_with_policy(&adapter, "q", None, fast_policy()).await.unwrap();
        assert!(vote.latency_ok);
    }
}
