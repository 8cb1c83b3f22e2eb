//! Discovery job lifecycle.

use chrono::{DateTime, Utc};
use driftkit_spi::Provider;
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;

/// Job lifecycle states. Terminal jobs are immutable.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum JobStatus {
    /// Queued, not yet picked up by a worker
    Pending,
    /// A worker is running the adapter call
    Running,
    /// Finished successfully
    Completed,
    /// Finished with an error
    Failed,
    /// Aborted before or during the adapter call
    Cancelled,
}

impl JobStatus {
    /// Whether this status is a terminal state.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            JobStatus::Completed | JobStatus::Failed | JobStatus::Cancelled
        )
    }
}

/// One `(provider, region)` unit of discovery work.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DiscoveryJob {
    /// Unique job id
    pub job_id: Uuid,
    /// Target provider
    pub provider: Provider,
    /// Account/subscription/project the job scans, if scoped
    pub account_id: Option<String>,
    /// Target region
    pub region: String,
    /// Restrict to these normalized resource types (empty = all)
    pub resource_type_filter: Vec<String>,
    /// Require these tags
    pub tag_filter: BTreeMap<String, String>,
    /// Current lifecycle state
    pub status: JobStatus,
    /// When the job was created
    pub created_at: DateTime<Utc>,
    /// When a worker picked it up
    pub started_at: Option<DateTime<Utc>>,
    /// When it reached a terminal state
    pub completed_at: Option<DateTime<Utc>>,
}

impl DiscoveryJob {
    /// Create a pending job for one `(provider, region)` target.
    pub fn new(provider: Provider, region: impl Into<String>) -> Self {
        Self {
            job_id: Uuid::new_v4(),
            provider,
            account_id: None,
            region: region.into(),
            resource_type_filter: Vec::new(),
            tag_filter: BTreeMap::new(),
            status: JobStatus::Pending,
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }

    /// Mark the job running. No-op once terminal.
    pub fn start(&mut self) {
        if !self.status.is_terminal() {
            self.status = JobStatus::Running;
            self.started_at = Some(Utc::now());
        }
    }

    /// Move the job to a terminal state. No-op once terminal.
    pub fn finish(&mut self, status: JobStatus) {
        debug_assert!(status.is_terminal());
        if !self.status.is_terminal() {
            self.status = status;
            self.completed_at = Some(Utc::now());
        }
    }

    /// Circuit-breaker endpoint key for this job.
    pub fn endpoint(&self) -> String {
        format!("{}/{}", self.provider, self.region)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_lifecycle() {
        let mut job = DiscoveryJob::new(Provider::Aws, "us-east-1");
        assert_eq!(job.status, JobStatus::Pending);

        job.start();
        assert_eq!(job.status, JobStatus::Running);
        assert!(job.started_at.is_some());

        job.finish(JobStatus::Completed);
        assert_eq!(job.status, JobStatus::Completed);
        assert!(job.completed_at.is_some());
    }

    #[test]
    fn test_terminal_jobs_are_immutable() {
        let mut job = DiscoveryJob::new(Provider::Azure, "eastus");
        job.finish(JobStatus::Cancelled);

        job.start();
        assert_eq!(job.status, JobStatus::Cancelled);

        job.finish(JobStatus::Completed);
        assert_eq!(job.status, JobStatus::Cancelled);
    }

    #[test]
    fn test_endpoint_key() {
        let job = DiscoveryJob::new(Provider::Gcp, "us-central1");
        assert_eq!(job.endpoint(), "gcp/us-central1");
    }
}
