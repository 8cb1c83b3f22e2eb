//! Retry policy SPI.

use crate::error::DriftError;
use std::time::Duration;

/// Retry decision.
#[derive(Debug, Clone)]
pub enum RetryDecision {
    /// Retry after the specified delay.
    Retry(Duration),
    /// Do not retry.
    DoNotRetry,
}

/// Retry policy trait for custom retry strategies.
///
/// Implement this trait to customize how failed operations are retried.
pub trait RetryPolicy: Send + Sync {
    /// Determine if an error should be retried after the given attempt.
    fn should_retry(&self, error: &DriftError, attempt: u32) -> RetryDecision;

    /// Get the maximum number of attempts (including the first call).
    fn max_attempts(&self) -> u32;
}

/// Exponential backoff retry policy with optional jitter.
#[derive(Debug, Clone)]
pub struct ExponentialBackoff {
    /// Initial delay
    pub initial_delay: Duration,
    /// Maximum delay
    pub max_delay: Duration,
    /// Maximum number of attempts
    pub max_attempts: u32,
    /// Backoff multiplier
    pub multiplier: f64,
    /// Add up to 10% random jitter to each delay
    pub jitter: bool,
}

impl Default for ExponentialBackoff {
    fn default() -> Self {
        Self {
            initial_delay: Duration::from_secs(1),
            max_delay: Duration::from_secs(30),
            max_attempts: 3,
            multiplier: 2.0,
            jitter: false,
        }
    }
}

impl ExponentialBackoff {
    /// Create a new exponential backoff policy.
    pub fn new(max_attempts: u32) -> Self {
        Self {
            max_attempts,
            ..Default::default()
        }
    }

    /// Set the initial delay.
    pub fn with_initial_delay(mut self, delay: Duration) -> Self {
        self.initial_delay = delay;
        self
    }

    /// Set the maximum delay.
    pub fn with_max_delay(mut self, delay: Duration) -> Self {
        self.max_delay = delay;
        self
    }

    /// Set the backoff multiplier.
    pub fn with_multiplier(mut self, multiplier: f64) -> Self {
        self.multiplier = multiplier;
        self
    }

    /// Enable or disable jitter.
    pub fn with_jitter(mut self, jitter: bool) -> Self {
        self.jitter = jitter;
        self
    }

    /// Base delay for a given attempt, before jitter.
    fn calculate_delay(&self, attempt: u32) -> Duration {
        let delay_ms =
            self.initial_delay.as_millis() as f64 * self.multiplier.powi(attempt as i32);
        let delay = Duration::from_millis(delay_ms as u64);
        std::cmp::min(delay, self.max_delay)
    }

    /// Delay for a given attempt with jitter applied when enabled.
    ///
    /// The jittered delay lies in `[base, base * 1.1]`.
    fn jittered_delay(&self, attempt: u32) -> Duration {
        let base = self.calculate_delay(attempt);
        if !self.jitter {
            return base;
        }
        let factor = 1.0 + rand::random::<f64>() * 0.1;
        Duration::from_millis((base.as_millis() as f64 * factor) as u64)
    }
}

impl RetryPolicy for ExponentialBackoff {
    /// `attempt` is the number of attempts already made; the delay before
    /// attempt `k+1` is `min(max_delay, initial * multiplier^(k-1))`.
    fn should_retry(&self, error: &DriftError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry;
        }

        if error.is_retryable() {
            RetryDecision::Retry(self.jittered_delay(attempt.saturating_sub(1)))
        } else {
            RetryDecision::DoNotRetry
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}

/// No retry policy.
#[derive(Debug, Clone, Default)]
pub struct NoRetry;

impl RetryPolicy for NoRetry {
    fn should_retry(&self, _error: &DriftError, _attempt: u32) -> RetryDecision {
        RetryDecision::DoNotRetry
    }

    fn max_attempts(&self) -> u32 {
        1
    }
}

/// Fixed delay retry policy.
#[derive(Debug, Clone)]
pub struct FixedDelay {
    /// Fixed delay between retries
    pub delay: Duration,
    /// Maximum number of attempts
    pub max_attempts: u32,
}

impl FixedDelay {
    /// Create a new fixed delay policy.
    pub fn new(delay: Duration, max_attempts: u32) -> Self {
        Self {
            delay,
            max_attempts,
        }
    }
}

impl RetryPolicy for FixedDelay {
    fn should_retry(&self, error: &DriftError, attempt: u32) -> RetryDecision {
        if attempt >= self.max_attempts {
            return RetryDecision::DoNotRetry;
        }

        if error.is_retryable() {
            RetryDecision::Retry(self.delay)
        } else {
            RetryDecision::DoNotRetry
        }
    }

    fn max_attempts(&self) -> u32 {
        self.max_attempts
    }
}
