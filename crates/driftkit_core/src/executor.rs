//! Policy-driven retry execution behind the circuit breaker.

use driftkit_spi::{DriftError, DriftResult, ErrorKind, RetryDecision, RetryPolicy};
use std::future::Future;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

use crate::breaker::CircuitBreakerRegistry;

/// Runs operations with bounded, jittered retry and per-endpoint
/// circuit breaking.
///
/// Each attempt asks the endpoint's breaker for admission first; breaker
/// refusals surface immediately as [`DriftError::CircuitOpen`].
/// Retryable failures sleep the policy delay (cancellable) and the
/// attempt number is stamped on the surfaced error.
pub struct RetryExecutor {
    policy: Arc<dyn RetryPolicy>,
    registry: Arc<CircuitBreakerRegistry>,
}

impl RetryExecutor {
    /// Create an executor from a policy and a breaker registry.
    pub fn new(policy: Arc<dyn RetryPolicy>, registry: Arc<CircuitBreakerRegistry>) -> Self {
        Self { policy, registry }
    }

    /// The breaker registry, shared with observability surfaces.
    pub fn registry(&self) -> &Arc<CircuitBreakerRegistry> {
        &self.registry
    }

    /// Run `op` until it succeeds, the policy gives up, or `ctx` fires.
    ///
    /// `endpoint` keys the circuit breaker (typically
    /// `provider/region/service`).
    pub async fn execute<T, F, Fut>(
        &self,
        endpoint: &str,
        ctx: &CancellationToken,
        mut op: F,
    ) -> DriftResult<T>
    where
        F: FnMut() -> Fut,
        Fut: Future<Output = DriftResult<T>>,
    {
        let breaker = self.registry.breaker(endpoint);
        let mut attempt: u32 = 0;

        loop {
            if ctx.is_cancelled() {
                return Err(DriftError::Cancelled);
            }

            breaker.try_acquire()?;
            attempt += 1;

            let result = tokio::select! {
                _ = ctx.cancelled() => return Err(DriftError::Cancelled),
                r = op() => r,
            };

            let err = match result {
                Ok(value) => {
                    breaker.record_success();
                    return Ok(value);
                }
                Err(err) => err,
            };

            // A caller cancel is not an endpoint failure
            if err.kind() == ErrorKind::Cancelled {
                return Err(err);
            }
            breaker.record_failure();

            match self.policy.should_retry(&err, attempt) {
                RetryDecision::DoNotRetry => return Err(err.with_attempt(attempt)),
                RetryDecision::Retry(delay) => {
                    tracing::debug!(
                        endpoint,
                        attempt,
                        delay_ms = delay.as_millis() as u64,
                        error = %err,
                        "retrying after transient failure"
                    );
                    tokio::select! {
                        _ = ctx.cancelled() => return Err(DriftError::Cancelled),
                        _ = tokio::time::sleep(delay) => {}
                    }
                }
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::breaker::BreakerConfig;
    use driftkit_spi::{ExponentialBackoff, NetworkError};
    use std::sync::atomic::{AtomicU32, Ordering};
    use std::time::Duration;

    fn executor(max_attempts: u32) -> RetryExecutor {
        let policy = ExponentialBackoff::new(max_attempts)
            .with_initial_delay(Duration::from_millis(5))
            .with_max_delay(Duration::from_millis(20));
        RetryExecutor::new(
            Arc::new(policy),
            Arc::new(CircuitBreakerRegistry::new(BreakerConfig::default())),
        )
    }

    #[tokio::test]
    async fn test_success_first_try() {
        let exec = executor(3);
        let ctx = CancellationToken::new();
        let result: DriftResult<u32> = exec.execute("aws/us-east-1/ec2", &ctx, || async { Ok(7) }).await;
        assert_eq!(result.unwrap(), 7);
    }

    #[tokio::test]
    async fn test_retries_until_success() {
        let exec = executor(3);
        let ctx = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result = exec
            .execute("aws/us-east-1/ec2", &ctx, || {
                let n = calls.fetch_add(1, Ordering::SeqCst);
                async move {
                    if n < 2 {
                        Err(DriftError::Network(NetworkError::Connection("reset".into())))
                    } else {
                        Ok("up")
                    }
                }
            })
            .await;

        assert_eq!(result.unwrap(), "up");
        assert_eq!(calls.load(Ordering::SeqCst), 3);
    }

    #[tokio::test]
    async fn test_exhaustion_stamps_attempt() {
        let exec = executor(3);
        let ctx = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: DriftResult<()> = exec
            .execute("aws/us-east-1/ec2", &ctx, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Err(DriftError::RateLimited { retry_after: None }) }
            })
            .await;

        let err = result.unwrap_err();
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        assert_eq!(err.attempt(), Some(3));
        assert_eq!(err.kind(), ErrorKind::RateLimit);
    }

    #[tokio::test]
    async fn test_non_retryable_surfaces_immediately() {
        let exec = executor(3);
        let ctx = CancellationToken::new();
        let calls = AtomicU32::new(0);

        let result: DriftResult<()> = exec
            .execute("azure/eastus/compute", &ctx, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async {
                    Err(DriftError::Authentication {
                        provider: "azure".into(),
                        message: "expired".into(),
                    })
                }
            })
            .await;

        assert_eq!(calls.load(Ordering::SeqCst), 1);
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Authentication);
    }

    #[tokio::test]
    async fn test_breaker_short_circuits_after_threshold() {
        let policy = ExponentialBackoff::new(1);
        let registry = Arc::new(CircuitBreakerRegistry::new(BreakerConfig {
            failure_threshold: 2,
            recovery_timeout: Duration::from_secs(60),
            half_open_limit: 1,
        }));
        let exec = RetryExecutor::new(Arc::new(policy), registry);
        let ctx = CancellationToken::new();

        for _ in 0..2 {
            let _: DriftResult<()> = exec
                .execute("gcp/us-central1/compute", &ctx, || async {
                    Err(DriftError::Network(NetworkError::Connection("down".into())))
                })
                .await;
        }

        let calls = AtomicU32::new(0);
        let result: DriftResult<()> = exec
            .execute("gcp/us-central1/compute", &ctx, || {
                calls.fetch_add(1, Ordering::SeqCst);
                async { Ok(()) }
            })
            .await;

        assert_eq!(result.unwrap_err().kind(), ErrorKind::CircuitOpen);
        assert_eq!(calls.load(Ordering::SeqCst), 0);
    }

    #[tokio::test]
    async fn test_cancellation_returns_cancelled() {
        let exec = executor(5);
        let ctx = CancellationToken::new();
        ctx.cancel();

        let result: DriftResult<()> = exec
            .execute("aws/us-east-1/ec2", &ctx, || async { Ok(()) })
            .await;
        assert_eq!(result.unwrap_err().kind(), ErrorKind::Cancelled);
    }
}
