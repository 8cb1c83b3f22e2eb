//! # DriftKit Core
//!
//! The concurrent, incrementally-refreshed discovery engine:
//!
//! - **Cache**: TTL+checksum store keyed by resource identity
//! - **Change tracker**: last-seen times, ETags, change-log consumption
//! - **Bloom filter**: probabilistic "might have changed" pre-check
//! - **Resilience**: bounded jittered retry and per-endpoint circuit breaking
//! - **Orchestrator**: fan-out over `{provider × region}` with bounded concurrency
//! - **Incremental engine**: diff current cloud state against the cache
//! - **Event bus & progress**: structured events and aggregated metrics
//!
//! Provider adapters plug in through the contracts defined in
//! [`driftkit_spi`]; this crate never talks to a cloud SDK directly.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod bloom;
pub mod breaker;
pub mod cache;
pub mod events;
pub mod executor;
pub mod incremental;
pub mod job;
pub mod orchestrator;
pub mod progress;
pub mod report;
pub mod tracker;

pub use bloom::BloomFilter;
pub use breaker::{BreakerConfig, BreakerState, CircuitBreaker, CircuitBreakerRegistry};
pub use cache::{CacheStats, ResourceCache, DEFAULT_TTL};
pub use events::{Event, EventBus, EventType, DEFAULT_SUBSCRIBER_CAPACITY};
pub use executor::RetryExecutor;
pub use incremental::{DiscoveryResult, EngineConfig, IncrementalEngine};
pub use job::{DiscoveryJob, JobStatus};
pub use orchestrator::{DiscoveryOrchestrator, DiscoveryOutcome, OrchestratorConfig};
pub use progress::{ProgressMetrics, ProgressTracker, RegionProgress};
pub use report::{ErrorReporter, KindStats, ReportEntry};
pub use tracker::{ChangeLogReader, ChangeTracker, ChangeType, ResourceChange};
