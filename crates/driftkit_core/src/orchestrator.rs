//! Parallel fan-out over `(provider, region)` targets.

use driftkit_spi::{
    DiscoveryFilter, DriftError, DriftResult, Provider, ProviderAdapter, Resource,
};
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{mpsc, Mutex, Semaphore};
use tokio_util::sync::CancellationToken;

use crate::executor::RetryExecutor;
use crate::job::{DiscoveryJob, JobStatus};
use crate::progress::ProgressTracker;

/// Orchestrator tuning knobs.
#[derive(Debug, Clone)]
pub struct OrchestratorConfig {
    /// Worker tasks pulling jobs from the queue
    pub max_workers: usize,
    /// Concurrent adapter invocations across all workers
    pub max_concurrency: usize,
    /// Aggregate deadline for one `discover_all` call
    pub discovery_timeout: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_workers: 10,
            max_concurrency: 5,
            discovery_timeout: Duration::from_secs(5 * 60),
        }
    }
}

/// Merged result of one fan-out run.
#[derive(Debug, Default)]
pub struct DiscoveryOutcome {
    /// Resources from every successful job, order unspecified
    pub resources: Vec<Resource>,
    /// Every job in its terminal state
    pub jobs: Vec<DiscoveryJob>,
    /// Per-job errors, tagged with their context
    pub errors: Vec<DriftError>,
}

impl DiscoveryOutcome {
    /// Number of jobs that completed successfully.
    pub fn succeeded(&self) -> usize {
        self.jobs
            .iter()
            .filter(|j| j.status == JobStatus::Completed)
            .count()
    }
}

struct JobOutcome {
    job: DiscoveryJob,
    result: DriftResult<Vec<Resource>>,
}

/// Fan-out scheduler: a bounded worker pool pulling `(provider, region)`
/// jobs from a queue, invoking adapters through the retry executor under
/// a shared concurrency semaphore.
pub struct DiscoveryOrchestrator {
    adapters: HashMap<Provider, Arc<dyn ProviderAdapter>>,
    executor: Arc<RetryExecutor>,
    progress: Arc<ProgressTracker>,
    config: OrchestratorConfig,
}

impl DiscoveryOrchestrator {
    /// Create an orchestrator with no adapters registered.
    pub fn new(
        executor: Arc<RetryExecutor>,
        progress: Arc<ProgressTracker>,
        config: OrchestratorConfig,
    ) -> Self {
        Self {
            adapters: HashMap::new(),
            executor,
            progress,
            config,
        }
    }

    /// Register an adapter. Replaces any previous adapter for the provider.
    pub fn register_adapter(&mut self, adapter: Arc<dyn ProviderAdapter>) {
        self.adapters.insert(adapter.name(), adapter);
    }

    /// Providers with a registered adapter.
    pub fn providers(&self) -> Vec<Provider> {
        self.adapters.keys().copied().collect()
    }

    /// Look up a registered adapter.
    pub fn adapter(&self, provider: Provider) -> Option<Arc<dyn ProviderAdapter>> {
        self.adapters.get(&provider).cloned()
    }

    /// Build the job set for the `{provider × region}` product.
    ///
    /// With an empty region list, each adapter's supported regions are
    /// used. Providers without a registered adapter are skipped with a
    /// warning.
    pub fn plan_jobs(
        &self,
        providers: &[Provider],
        regions: &[String],
        filter: &DiscoveryFilter,
    ) -> Vec<DiscoveryJob> {
        let mut jobs = Vec::new();
        for provider in providers {
            let Some(adapter) = self.adapters.get(provider) else {
                tracing::warn!(provider = %provider, "no adapter registered, skipping");
                continue;
            };
            let regions: Vec<String> = if regions.is_empty() {
                adapter.supported_regions()
            } else {
                regions.to_vec()
            };
            for region in regions {
                let mut job = DiscoveryJob::new(*provider, region);
                job.resource_type_filter = filter.resource_types.clone();
                job.tag_filter = filter.tags.clone();
                jobs.push(job);
            }
        }
        jobs
    }

    /// Discover across all requested providers and regions.
    ///
    /// Completes when every job reaches a terminal state or the aggregate
    /// timeout elapses. Partial failure policy: if at least one job
    /// succeeds the call returns the merged resources and carries the
    /// per-job errors in the outcome; only when every job fails does it
    /// return the first underlying error.
    pub async fn discover_all(
        &self,
        ctx: &CancellationToken,
        providers: &[Provider],
        regions: &[String],
        filter: DiscoveryFilter,
    ) -> DriftResult<DiscoveryOutcome> {
        let jobs = self.plan_jobs(providers, regions, &filter);
        if jobs.is_empty() {
            return Ok(DiscoveryOutcome::default());
        }

        self.progress.begin_cycle(jobs.len() as u64);
        let run_ctx = ctx.child_token();

        let (job_tx, job_rx) = mpsc::unbounded_channel::<(DiscoveryJob, Arc<dyn ProviderAdapter>)>();
        let job_rx = Arc::new(Mutex::new(job_rx));
        let (outcome_tx, mut outcome_rx) = mpsc::unbounded_channel::<JobOutcome>();
        let semaphore = Arc::new(Semaphore::new(self.config.max_concurrency.max(1)));

        let total = jobs.len();
        for job in jobs {
            // plan_jobs only emits jobs for registered providers
            if let Some(adapter) = self.adapters.get(&job.provider) {
                let _ = job_tx.send((job, Arc::clone(adapter)));
            }
        }
        drop(job_tx);

        let workers = self.config.max_workers.clamp(1, total);
        let mut handles = Vec::with_capacity(workers);
        for _ in 0..workers {
            handles.push(tokio::spawn(Self::worker(
                Arc::clone(&job_rx),
                outcome_tx.clone(),
                Arc::clone(&semaphore),
                Arc::clone(&self.executor),
                Arc::clone(&self.progress),
                run_ctx.clone(),
            )));
        }
        drop(outcome_tx);

        let collect = async {
            let mut outcome = DiscoveryOutcome::default();
            while let Some(JobOutcome { job, result }) = outcome_rx.recv().await {
                match result {
                    Ok(resources) => outcome.resources.extend(resources),
                    Err(err) => outcome.errors.push(err),
                }
                outcome.jobs.push(job);
            }
            outcome
        };

        let mut outcome = match tokio::time::timeout(self.config.discovery_timeout, collect).await {
            Ok(outcome) => outcome,
            Err(_) => {
                run_ctx.cancel();
                for handle in handles {
                    handle.abort();
                }
                return Err(DriftError::Timeout {
                    operation: "discover_all".to_string(),
                    duration: self.config.discovery_timeout,
                });
            }
        };

        for handle in handles {
            let _ = handle.await;
        }

        if outcome.succeeded() == 0 && !outcome.errors.is_empty() {
            return Err(outcome.errors.remove(0));
        }
        tracing::info!(
            jobs = outcome.jobs.len(),
            succeeded = outcome.succeeded(),
            resources = outcome.resources.len(),
            errors = outcome.errors.len(),
            "discovery fan-out finished"
        );
        Ok(outcome)
    }

    async fn worker(
        job_rx: Arc<Mutex<mpsc::UnboundedReceiver<(DiscoveryJob, Arc<dyn ProviderAdapter>)>>>,
        outcome_tx: mpsc::UnboundedSender<JobOutcome>,
        semaphore: Arc<Semaphore>,
        executor: Arc<RetryExecutor>,
        progress: Arc<ProgressTracker>,
        ctx: CancellationToken,
    ) {
        loop {
            let next = { job_rx.lock().await.recv().await };
            let Some((mut job, adapter)) = next else {
                break;
            };

            // Pending jobs observe cancellation before touching the semaphore
            if ctx.is_cancelled() {
                job.finish(JobStatus::Cancelled);
                progress.record_job_failed(job.provider, &job.region);
                let _ = outcome_tx.send(JobOutcome {
                    job,
                    result: Err(DriftError::Cancelled),
                });
                continue;
            }

            let permit = tokio::select! {
                _ = ctx.cancelled() => {
                    job.finish(JobStatus::Cancelled);
                    progress.record_job_failed(job.provider, &job.region);
                    let _ = outcome_tx.send(JobOutcome {
                        job,
                        result: Err(DriftError::Cancelled),
                    });
                    continue;
                }
                permit = semaphore.clone().acquire_owned() => permit,
            };
            let Ok(_permit) = permit else { break };

            job.start();
            tracing::debug!(job_id = %job.job_id, endpoint = %job.endpoint(), "job running");

            let filter = DiscoveryFilter {
                regions: vec![job.region.clone()],
                resource_types: job.resource_type_filter.clone(),
                tags: job.tag_filter.clone(),
            };
            let endpoint = job.endpoint();
            let result = executor
                .execute(&endpoint, &ctx, || adapter.discover(&ctx, filter.clone()))
                .await;

            let result = match result {
                Ok(resources) => {
                    job.finish(JobStatus::Completed);
                    progress.record_resources(job.provider, &job.region, resources.len() as u64);
                    progress.record_job_completed(job.provider, &job.region);
                    Ok(resources)
                }
                Err(err) => {
                    let status = if err.kind() == driftkit_spi::ErrorKind::Cancelled {
                        JobStatus::Cancelled
                    } else {
                        JobStatus::Failed
                    };
                    job.finish(status);
                    progress.record_job_failed(job.provider, &job.region);
                    tracing::warn!(job_id = %job.job_id, endpoint = %endpoint, error = %err, "job failed");
                    Err(err)
                }
            };

            let _ = outcome_tx.send(JobOutcome { job, result });
        }
    }
}
