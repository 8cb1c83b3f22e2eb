//! Aggregated discovery progress and rate metrics.

use chrono::{DateTime, Utc};
use driftkit_spi::Provider;
use parking_lot::RwLock;
use serde::Serialize;
use std::collections::HashMap;

/// Counters for one `(provider, region)` scan target.
#[derive(Debug, Clone, Copy, Default, Serialize)]
pub struct RegionProgress {
    /// Resources observed so far
    pub resources_found: u64,
    /// Jobs completed successfully
    pub jobs_completed: u64,
    /// Jobs that failed
    pub jobs_failed: u64,
}

/// Coherent snapshot of all progress counters.
#[derive(Debug, Clone, Serialize)]
pub struct ProgressMetrics {
    /// Jobs expected this cycle
    pub jobs_total: u64,
    /// Jobs in a terminal state
    pub jobs_finished: u64,
    /// Jobs that failed
    pub jobs_failed: u64,
    /// Resources observed
    pub resources_found: u64,
    /// Completion fraction in `[0, 1]`
    pub percent_complete: f64,
    /// Observation rate since tracking started
    pub resources_per_second: f64,
    /// Failed fraction of finished jobs in `[0, 1]`
    pub error_rate: f64,
    /// Succeeded fraction of finished jobs in `[0, 1]`
    pub success_rate: f64,
    /// When tracking started
    pub started_at: DateTime<Utc>,
    /// Per-target breakdown keyed by `provider/region`
    pub targets: HashMap<String, RegionProgress>,
}

#[derive(Debug)]
struct Inner {
    jobs_total: u64,
    jobs_finished: u64,
    jobs_failed: u64,
    resources_found: u64,
    started_at: DateTime<Utc>,
    targets: HashMap<String, RegionProgress>,
}

/// Monotonic progress tracker for a discovery run.
///
/// All counters only grow within a cycle; `begin_cycle` resets them for
/// the next run.
pub struct ProgressTracker {
    inner: RwLock<Inner>,
}

impl ProgressTracker {
    /// Create an idle tracker.
    pub fn new() -> Self {
        Self {
            inner: RwLock::new(Inner {
                jobs_total: 0,
                jobs_finished: 0,
                jobs_failed: 0,
                resources_found: 0,
                started_at: Utc::now(),
                targets: HashMap::new(),
            }),
        }
    }

    /// Start a new cycle expecting `jobs_total` jobs.
    pub fn begin_cycle(&self, jobs_total: u64) {
        let mut inner = self.inner.write();
        *inner = Inner {
            jobs_total,
            jobs_finished: 0,
            jobs_failed: 0,
            resources_found: 0,
            started_at: Utc::now(),
            targets: HashMap::new(),
        };
    }

    fn target_key(provider: Provider, region: &str) -> String {
        format!("{}/{}", provider, region)
    }

    /// Record resources observed for a target.
    pub fn record_resources(&self, provider: Provider, region: &str, count: u64) {
        let mut inner = self.inner.write();
        inner.resources_found += count;
        inner
            .targets
            .entry(Self::target_key(provider, region))
            .or_default()
            .resources_found += count;
    }

    /// Record a job finishing successfully.
    pub fn record_job_completed(&self, provider: Provider, region: &str) {
        let mut inner = self.inner.write();
        inner.jobs_finished += 1;
        inner
            .targets
            .entry(Self::target_key(provider, region))
            .or_default()
            .jobs_completed += 1;
    }

    /// Record a job failing.
    pub fn record_job_failed(&self, provider: Provider, region: &str) {
        let mut inner = self.inner.write();
        inner.jobs_finished += 1;
        inner.jobs_failed += 1;
        inner
            .targets
            .entry(Self::target_key(provider, region))
            .or_default()
            .jobs_failed += 1;
    }

    /// One coherent copy of every counter and derived rate.
    pub fn snapshot(&self) -> ProgressMetrics {
        let inner = self.inner.read();
        let elapsed = Utc::now()
            .signed_duration_since(inner.started_at)
            .num_milliseconds()
            .max(1) as f64
            / 1000.0;
        let percent_complete = if inner.jobs_total == 0 {
            0.0
        } else {
            inner.jobs_finished as f64 / inner.jobs_total as f64
        };
        let error_rate = if inner.jobs_finished == 0 {
            0.0
        } else {
            inner.jobs_failed as f64 / inner.jobs_finished as f64
        };

        ProgressMetrics {
            jobs_total: inner.jobs_total,
            jobs_finished: inner.jobs_finished,
            jobs_failed: inner.jobs_failed,
            resources_found: inner.resources_found,
            percent_complete,
            resources_per_second: inner.resources_found as f64 / elapsed,
            error_rate,
            success_rate: 1.0 - error_rate,
            started_at: inner.started_at,
            targets: inner.targets.clone(),
        }
    }

    /// Composite snapshot for dashboards.
    pub fn dashboard_data(&self) -> serde_json::Value {
        let metrics = self.snapshot();
        serde_json::json!({
            "percent_complete": metrics.percent_complete,
            "resources_per_second": metrics.resources_per_second,
            "error_rate": metrics.error_rate,
            "success_rate": metrics.success_rate,
            "resources_found": metrics.resources_found,
            "jobs": {
                "total": metrics.jobs_total,
                "finished": metrics.jobs_finished,
                "failed": metrics.jobs_failed,
            },
            "targets": metrics.targets,
        })
    }
}

impl Default for ProgressTracker {
    fn default() -> Self {
        Self::new()
    }
}
