//! Engine configuration.

use driftkit_core::{BreakerConfig, EngineConfig, OrchestratorConfig};
use driftkit_automation::EngineSettings;
use driftkit_spi::ExponentialBackoff;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Serialize durations as whole seconds.
pub(crate) mod duration_secs {
    use serde::{Deserialize, Deserializer, Serializer};
    use std::time::Duration;

    pub fn serialize<S: Serializer>(value: &Duration, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_u64(value.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(deserializer: D) -> Result<Duration, D::Error> {
        Ok(Duration::from_secs(u64::deserialize(deserializer)?))
    }
}

/// All recognized engine options, with defaults matching the design.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DriftConfig {
    /// Upper bound on simultaneous workflow executions
    pub max_concurrent_executions: usize,
    /// Deadline per workflow execution, seconds
    #[serde(with = "duration_secs")]
    pub execution_timeout: Duration,

    /// Retry attempts per adapter call (including the first)
    pub retry_attempts: u32,
    /// Initial retry delay, seconds
    #[serde(with = "duration_secs")]
    pub retry_initial_delay: Duration,
    /// Retry delay cap, seconds
    #[serde(with = "duration_secs")]
    pub retry_max_delay: Duration,
    /// Multiplicative backoff factor
    pub retry_backoff_factor: f64,
    /// Add up to 10% jitter to retry delays
    pub retry_jitter: bool,

    /// Cache entry time-to-live, seconds
    #[serde(with = "duration_secs")]
    pub cache_ttl: Duration,
    /// Optional cap on cache entries
    pub cache_max_size: Option<usize>,
    /// Background cache cleanup interval, seconds
    #[serde(with = "duration_secs")]
    pub cache_cleanup_interval: Duration,

    /// Bloom filter bit count
    pub bloom_filter_size: u64,
    /// Bloom filter probe count
    pub bloom_filter_hashes: u32,

    /// Worker tasks pulling discovery jobs
    pub max_workers: usize,
    /// Concurrent adapter invocations
    pub max_concurrency: usize,
    /// Resources processed per batch by embedders
    pub batch_size: usize,
    /// Aggregate discovery deadline, seconds
    #[serde(with = "duration_secs")]
    pub discovery_timeout: Duration,

    /// Circuit breaker failure threshold
    pub breaker_failure_threshold: u32,
    /// Circuit breaker recovery timeout, seconds
    #[serde(with = "duration_secs")]
    pub breaker_recovery_timeout: Duration,
    /// Circuit breaker half-open probe limit
    pub breaker_half_open_limit: u32,

    /// Log every bus event through `tracing`
    pub enable_event_logging: bool,
    /// Expose progress metrics
    pub enable_metrics: bool,
    /// Consult cloud audit logs for change candidates
    pub use_cloud_trails: bool,
    /// Scan only change candidates instead of everything
    pub differential_sync: bool,
}

impl Default for DriftConfig {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            execution_timeout: Duration::from_secs(10 * 60),
            retry_attempts: 3,
            retry_initial_delay: Duration::from_secs(1),
            retry_max_delay: Duration::from_secs(30),
            retry_backoff_factor: 2.0,
            retry_jitter: true,
            cache_ttl: Duration::from_secs(30 * 60),
            cache_max_size: None,
            cache_cleanup_interval: Duration::from_secs(60),
            bloom_filter_size: 65_536,
            bloom_filter_hashes: 4,
            max_workers: 10,
            max_concurrency: 5,
            batch_size: 100,
            discovery_timeout: Duration::from_secs(5 * 60),
            breaker_failure_threshold: 5,
            breaker_recovery_timeout: Duration::from_secs(60),
            breaker_half_open_limit: 3,
            enable_event_logging: false,
            enable_metrics: true,
            use_cloud_trails: false,
            differential_sync: false,
        }
    }
}

impl DriftConfig {
    /// Retry policy shaped by the retry options.
    pub fn retry_policy(&self) -> ExponentialBackoff {
        ExponentialBackoff::new(self.retry_attempts)
            .with_initial_delay(self.retry_initial_delay)
            .with_max_delay(self.retry_max_delay)
            .with_multiplier(self.retry_backoff_factor)
            .with_jitter(self.retry_jitter)
    }

    /// Circuit breaker knobs.
    pub fn breaker_config(&self) -> BreakerConfig {
        BreakerConfig {
            failure_threshold: self.breaker_failure_threshold,
            recovery_timeout: self.breaker_recovery_timeout,
            half_open_limit: self.breaker_half_open_limit,
        }
    }

    /// Orchestrator knobs.
    pub fn orchestrator_config(&self) -> OrchestratorConfig {
        OrchestratorConfig {
            max_workers: self.max_workers,
            max_concurrency: self.max_concurrency,
            discovery_timeout: self.discovery_timeout,
        }
    }

    /// Incremental engine knobs.
    pub fn engine_config(&self) -> EngineConfig {
        EngineConfig {
            differential_sync: self.differential_sync,
            use_cloud_trails: self.use_cloud_trails,
            bloom_filter_size: self.bloom_filter_size,
            bloom_filter_hashes: self.bloom_filter_hashes,
        }
    }

    /// Workflow engine knobs.
    pub fn engine_settings(&self) -> EngineSettings {
        EngineSettings {
            max_concurrent_executions: self.max_concurrent_executions,
            execution_timeout: self.execution_timeout,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults_match_design() {
        let config = DriftConfig::default();
        assert_eq!(config.retry_attempts, 3);
        assert_eq!(config.retry_initial_delay, Duration::from_secs(1));
        assert_eq!(config.cache_ttl, Duration::from_secs(1800));
        assert_eq!(config.max_workers, 10);
        assert_eq!(config.max_concurrency, 5);
        assert_eq!(config.discovery_timeout, Duration::from_secs(300));
        assert_eq!(config.breaker_failure_threshold, 5);
    }

    #[test]
    fn test_duration_round_trip() {
        let config = DriftConfig::default();
        let json = serde_json::to_string(&config).unwrap();
        let back: DriftConfig = serde_json::from_str(&json).unwrap();
        assert_eq!(back.cache_ttl, config.cache_ttl);
        assert_eq!(back.discovery_timeout, config.discovery_timeout);
    }

    #[test]
    fn test_partial_config_uses_defaults() {
        let config: DriftConfig =
            serde_json::from_str(r#"{ "max_workers": 3, "cache_ttl": 60 }"#).unwrap();
        assert_eq!(config.max_workers, 3);
        assert_eq!(config.cache_ttl, Duration::from_secs(60));
        assert_eq!(config.max_concurrency, 5);
    }
}
