//! Main DriftKit entry point.

use crate::config::DriftConfig;
use driftkit_automation::{
    ActionExecutor, ExecutionRepository, InMemoryExecutionRepository, InMemoryWorkflowRepository,
    Notifier, ToolRunner, TriggerManager, WorkflowEngine, WorkflowRepository,
};
use driftkit_core::{
    ChangeLogReader, ChangeTracker, CircuitBreakerRegistry, DiscoveryOrchestrator,
    DiscoveryOutcome, DiscoveryResult, ErrorReporter, EventBus, EventType, IncrementalEngine,
    ProgressTracker, ResourceCache, RetryExecutor,
};
use driftkit_spi::{DiscoveryFilter, DriftError, DriftResult, Provider, ProviderAdapter};
use parking_lot::Mutex;
use std::sync::Arc;
use tokio_util::sync::CancellationToken;

/// Builder for [`DriftKit`].
pub struct DriftKitBuilder {
    config: DriftConfig,
    adapters: Vec<Arc<dyn ProviderAdapter>>,
    change_log: Option<Arc<dyn ChangeLogReader>>,
    notifier: Option<Arc<dyn Notifier>>,
    tools: Option<Arc<dyn ToolRunner>>,
    workflows: Option<Arc<dyn WorkflowRepository>>,
    executions: Option<Arc<dyn ExecutionRepository>>,
}

impl DriftKitBuilder {
    /// Start a builder with default configuration.
    pub fn new() -> Self {
        Self {
            config: DriftConfig::default(),
            adapters: Vec::new(),
            change_log: None,
            notifier: None,
            tools: None,
            workflows: None,
            executions: None,
        }
    }

    /// Use an explicit configuration.
    pub fn config(mut self, config: DriftConfig) -> Self {
        self.config = config;
        self
    }

    /// Register a provider adapter.
    pub fn adapter(mut self, adapter: Arc<dyn ProviderAdapter>) -> Self {
        self.adapters.push(adapter);
        self
    }

    /// Wire a cloud audit-log reader for differential candidates.
    pub fn change_log(mut self, reader: Arc<dyn ChangeLogReader>) -> Self {
        self.change_log = Some(reader);
        self
    }

    /// Wire the notification transport for notification actions.
    pub fn notifier(mut self, notifier: Arc<dyn Notifier>) -> Self {
        self.notifier = Some(notifier);
        self
    }

    /// Wire the infrastructure tool runner for tool actions.
    pub fn tool_runner(mut self, tools: Arc<dyn ToolRunner>) -> Self {
        self.tools = Some(tools);
        self
    }

    /// Use an external workflow store instead of the in-memory default.
    pub fn workflow_repository(mut self, repo: Arc<dyn WorkflowRepository>) -> Self {
        self.workflows = Some(repo);
        self
    }

    /// Use an external execution store instead of the in-memory default.
    pub fn execution_repository(mut self, repo: Arc<dyn ExecutionRepository>) -> Self {
        self.executions = Some(repo);
        self
    }

    /// Validate adapters and wire the full engine.
    ///
    /// Each adapter's credentials are checked; adapters that fail are
    /// not registered and their startup errors are kept on the facade
    /// so the caller can elect to proceed without those providers.
    pub async fn build(self) -> DriftResult<DriftKit> {
        let config = self.config;
        let events = Arc::new(EventBus::new());
        let reporter = Arc::new(ErrorReporter::new());

        let mut cache = ResourceCache::with_ttl(config.cache_ttl);
        if let Some(cap) = config.cache_max_size {
            cache = cache.with_max_size(cap);
        }
        let cache = Arc::new(cache);

        let tracker = match self.change_log {
            Some(reader) => ChangeTracker::new().with_reader(reader),
            None => ChangeTracker::new(),
        };
        let tracker = Arc::new(tracker);

        let registry = Arc::new(CircuitBreakerRegistry::new(config.breaker_config()));
        let executor = Arc::new(RetryExecutor::new(Arc::new(config.retry_policy()), registry));
        let progress = Arc::new(ProgressTracker::new());

        let mut orchestrator = DiscoveryOrchestrator::new(
            Arc::clone(&executor),
            Arc::clone(&progress),
            config.orchestrator_config(),
        );

        let mut startup_errors = Vec::new();
        for adapter in self.adapters {
            let provider = adapter.name();
            match adapter.validate_credentials().await {
                Ok(()) => orchestrator.register_adapter(adapter),
                Err(err) => {
                    tracing::warn!(provider = %provider, error = %err, "provider skipped at startup");
                    reporter.record(&err);
                    startup_errors.push(err);
                }
            }
        }
        let orchestrator = Arc::new(orchestrator);

        let engine = Arc::new(IncrementalEngine::new(
            Arc::clone(&cache),
            Arc::clone(&tracker),
            Arc::clone(&orchestrator),
            Arc::clone(&events),
            config.engine_config(),
        ));

        let mut action_executor = ActionExecutor::new();
        if let Some(notifier) = self.notifier {
            action_executor = action_executor.with_notifier(notifier);
        }
        if let Some(tools) = self.tools {
            action_executor = action_executor.with_tool_runner(tools);
        }

        let workflows = self
            .workflows
            .unwrap_or_else(|| Arc::new(InMemoryWorkflowRepository::new()));
        let executions = self
            .executions
            .unwrap_or_else(|| Arc::new(InMemoryExecutionRepository::new()));

        let workflow_engine = Arc::new(WorkflowEngine::new(
            workflows,
            executions,
            Arc::new(action_executor),
            Arc::clone(&events),
            config.engine_settings(),
        ));
        let triggers = Arc::new(TriggerManager::new(
            Arc::clone(&workflow_engine),
            Arc::clone(&events),
        ));
        workflow_engine.set_registrar(Arc::clone(&triggers) as _);

        Ok(DriftKit {
            config,
            cache,
            tracker,
            events,
            progress,
            orchestrator,
            engine,
            workflow_engine,
            triggers,
            reporter,
            startup_errors,
            root: CancellationToken::new(),
            started: Mutex::new(false),
        })
    }
}

impl Default for DriftKitBuilder {
    fn default() -> Self {
        Self::new()
    }
}

/// One-stop handle over the discovery engine and automation layer.
///
/// Lifecycle is `new → start → stop`; `stop` is idempotent and cancels
/// every background worker.
///
/// # Example
///
/// ```rust,ignore
/// use driftkit::prelude::*;
///
/// #[tokio::main]
/// async fn main() -> DriftResult<()> {
///     let kit = DriftKit::builder()
///         .adapter(aws_adapter)
///         .build()
///         .await?;
///     kit.start();
///
///     let result = kit.run_cycle(&[Provider::Aws], &[]).await?;
///     println!("{} new resources", result.new.len());
///
///     kit.stop().await;
///     Ok(())
/// }
/// ```
pub struct DriftKit {
    config: DriftConfig,
    cache: Arc<ResourceCache>,
    tracker: Arc<ChangeTracker>,
    events: Arc<EventBus>,
    progress: Arc<ProgressTracker>,
    orchestrator: Arc<DiscoveryOrchestrator>,
    engine: Arc<IncrementalEngine>,
    workflow_engine: Arc<WorkflowEngine>,
    triggers: Arc<TriggerManager>,
    reporter: Arc<ErrorReporter>,
    startup_errors: Vec<DriftError>,
    root: CancellationToken,
    started: Mutex<bool>,
}

impl DriftKit {
    /// Start a builder.
    pub fn builder() -> DriftKitBuilder {
        DriftKitBuilder::new()
    }

    /// Per-provider credential failures recorded at build time.
    pub fn startup_errors(&self) -> &[DriftError] {
        &self.startup_errors
    }

    /// Providers that passed startup validation.
    pub fn providers(&self) -> Vec<Provider> {
        self.orchestrator.providers()
    }

    /// Start background workers: cache cleanup, the trigger scheduler,
    /// and (when configured) the event logging subscriber. Idempotent.
    pub fn start(&self) {
        let mut started = self.started.lock();
        if *started {
            return;
        }
        *started = true;

        if self.config.enable_event_logging {
            let _ = tracing_subscriber::fmt()
                .with_env_filter(tracing_subscriber::EnvFilter::from_default_env())
                .try_init();
            self.spawn_event_logger();
        }
        let _cleanup = self
            .cache
            .spawn_cleanup(self.config.cache_cleanup_interval, self.root.child_token());
        self.triggers.start();
        tracing::info!(providers = self.orchestrator.providers().len(), "driftkit started");
    }

    /// Cancel all background workers and live executions. Idempotent.
    pub async fn stop(&self) {
        {
            let mut started = self.started.lock();
            if !*started {
                return;
            }
            *started = false;
        }
        self.root.cancel();
        self.triggers.stop();
        self.workflow_engine.shutdown().await;
        tracing::info!("driftkit stopped");
    }

    /// One raw fan-out over the registered adapters, without diffing.
    pub async fn discover(
        &self,
        providers: &[Provider],
        regions: &[String],
        filter: DiscoveryFilter,
    ) -> DriftResult<DiscoveryOutcome> {
        let result = self
            .orchestrator
            .discover_all(&self.root.child_token(), providers, regions, filter)
            .await;
        if let Err(err) = &result {
            self.reporter.record(err);
        }
        if let Ok(outcome) = &result {
            for err in &outcome.errors {
                self.reporter.record(err);
            }
        }
        result
    }

    /// One incremental discovery cycle: fan out, diff against the cache,
    /// and publish the result on the event bus.
    pub async fn run_cycle(
        &self,
        providers: &[Provider],
        regions: &[String],
    ) -> DriftResult<DiscoveryResult> {
        let result = self
            .engine
            .run_cycle(
                &self.root.child_token(),
                providers,
                regions,
                DiscoveryFilter::all(),
            )
            .await;
        match &result {
            Ok(cycle) => {
                for err in &cycle.errors {
                    self.reporter.record(err);
                }
            }
            Err(err) => self.reporter.record(err),
        }
        result
    }

    /// The workflow engine.
    pub fn automation(&self) -> &Arc<WorkflowEngine> {
        &self.workflow_engine
    }

    /// The trigger manager.
    pub fn triggers(&self) -> &Arc<TriggerManager> {
        &self.triggers
    }

    /// The event bus, for subscriptions.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The resource cache.
    pub fn cache(&self) -> &Arc<ResourceCache> {
        &self.cache
    }

    /// The change tracker.
    pub fn tracker(&self) -> &Arc<ChangeTracker> {
        &self.tracker
    }

    /// The accumulated error report.
    pub fn error_report(&self) -> Vec<driftkit_core::ReportEntry> {
        self.reporter.report()
    }

    /// Composite progress snapshot for dashboards.
    pub fn dashboard(&self) -> serde_json::Value {
        self.progress.dashboard_data()
    }

    fn spawn_event_logger(&self) {
        let mut receiver = self.events.subscribe_many(&[
            EventType::WorkflowCreated,
            EventType::WorkflowUpdated,
            EventType::WorkflowDeleted,
            EventType::WorkflowActivated,
            EventType::WorkflowDeactivated,
            EventType::ExecutionStarted,
            EventType::ExecutionCompleted,
            EventType::ExecutionFailed,
            EventType::ExecutionCancelled,
            EventType::ResourceFound,
            EventType::DiscoveryStarted,
            EventType::DiscoveryCompleted,
            EventType::DiscoveryFailed,
            EventType::SystemError,
            EventType::SystemWarning,
            EventType::Alert,
        ]);
        let cancel = self.root.child_token();
        tokio::spawn(async move {
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = receiver.recv() => match event {
                        Some(event) => {
                            tracing::info!(
                                event_type = %event.event_type,
                                event_id = %event.id,
                                workflow_id = ?event.workflow_id,
                                execution_id = ?event.execution_id,
                                "event"
                            );
                        }
                        None => break,
                    },
                }
            }
        });
    }
}
