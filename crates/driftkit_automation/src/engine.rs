//! Workflow engine: lifecycle, execution, and cancellation.

use crate::actions::ActionExecutor;
use crate::model::{
    ActionResult, ActionStatus, Execution, ExecutionStatus, Workflow, WorkflowStatus,
};
use crate::repository::{ExecutionRepository, WorkflowRepository};
use async_trait::async_trait;
use chrono::Utc;
use driftkit_core::{Event, EventBus, EventType};
use driftkit_spi::{DriftError, DriftResult, ErrorKind};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Engine-wide execution settings.
#[derive(Debug, Clone)]
pub struct EngineSettings {
    /// Upper bound on simultaneous executions
    pub max_concurrent_executions: usize,
    /// Default per-execution deadline
    pub execution_timeout: Duration,
}

impl Default for EngineSettings {
    fn default() -> Self {
        Self {
            max_concurrent_executions: 10,
            execution_timeout: Duration::from_secs(10 * 60),
        }
    }
}

/// Seam through which the engine registers triggers on activation.
///
/// Implemented by the trigger manager; injected after construction to
/// keep the dependency one-directional.
#[async_trait]
pub trait TriggerRegistrar: Send + Sync {
    /// Register the workflow's trigger for monitoring.
    async fn register(&self, workflow: &Workflow) -> DriftResult<()>;

    /// Remove the workflow's trigger.
    async fn unregister(&self, workflow_id: Uuid) -> DriftResult<()>;
}

struct ExecutionHandle {
    cancel: CancellationToken,
}

enum RunEnd {
    Finished { any_failed: bool },
    Cancelled,
}

/// Executes workflows: sequential actions, context threading,
/// stop-on-error, bounded concurrency, and local cancellation.
pub struct WorkflowEngine {
    workflows: Arc<dyn WorkflowRepository>,
    executions: Arc<dyn ExecutionRepository>,
    executor: Arc<ActionExecutor>,
    events: Arc<EventBus>,
    active: Mutex<HashMap<Uuid, ExecutionHandle>>,
    registrar: parking_lot::RwLock<Option<Arc<dyn TriggerRegistrar>>>,
    root: CancellationToken,
    settings: EngineSettings,
}

impl WorkflowEngine {
    /// Wire an engine from its collaborators.
    pub fn new(
        workflows: Arc<dyn WorkflowRepository>,
        executions: Arc<dyn ExecutionRepository>,
        executor: Arc<ActionExecutor>,
        events: Arc<EventBus>,
        settings: EngineSettings,
    ) -> Self {
        Self {
            workflows,
            executions,
            executor,
            events,
            active: Mutex::new(HashMap::new()),
            registrar: parking_lot::RwLock::new(None),
            root: CancellationToken::new(),
            settings,
        }
    }

    /// Inject the trigger registrar (done once at wiring time).
    pub fn set_registrar(&self, registrar: Arc<dyn TriggerRegistrar>) {
        *self.registrar.write() = Some(registrar);
    }

    /// The event bus used for lifecycle events.
    pub fn events(&self) -> &Arc<EventBus> {
        &self.events
    }

    /// The workflow store.
    pub fn workflows(&self) -> &Arc<dyn WorkflowRepository> {
        &self.workflows
    }

    /// The execution store.
    pub fn executions(&self) -> &Arc<dyn ExecutionRepository> {
        &self.executions
    }

    /// Cancel every live execution. Idempotent.
    pub async fn shutdown(&self) {
        self.root.cancel();
        let mut active = self.active.lock().await;
        for (id, handle) in active.drain() {
            tracing::debug!(execution_id = %id, "cancelling execution on shutdown");
            handle.cancel.cancel();
        }
    }

    /// Number of live executions.
    pub async fn active_executions(&self) -> usize {
        self.active.lock().await.len()
    }

    // =========================================================================
    // Workflow lifecycle
    // =========================================================================

    /// Store a new workflow in draft.
    pub async fn create_workflow(&self, mut workflow: Workflow) -> DriftResult<Uuid> {
        workflow.status = WorkflowStatus::Draft;
        workflow.updated_at = Utc::now();
        let id = workflow.id;
        self.workflows.save(workflow).await?;
        self.events
            .publish(Event::new(EventType::WorkflowCreated).with_workflow(id));
        Ok(id)
    }

    /// Update a workflow definition. Archived workflows are immutable.
    pub async fn update_workflow(&self, mut workflow: Workflow) -> DriftResult<()> {
        let stored = self.require_workflow(workflow.id).await?;
        if stored.status == WorkflowStatus::Archived {
            return Err(DriftError::Validation(format!(
                "workflow '{}' is archived",
                stored.name
            )));
        }
        workflow.status = stored.status;
        workflow.updated_at = Utc::now();
        let id = workflow.id;
        self.workflows.save(workflow).await?;
        self.events
            .publish(Event::new(EventType::WorkflowUpdated).with_workflow(id));
        Ok(())
    }

    /// Delete a workflow. Active workflows must be deactivated first.
    pub async fn delete_workflow(&self, id: Uuid) -> DriftResult<()> {
        let stored = self.require_workflow(id).await?;
        if stored.status == WorkflowStatus::Active {
            return Err(DriftError::Validation(format!(
                "workflow '{}' is active; deactivate it first",
                stored.name
            )));
        }
        self.workflows.delete(id).await?;
        self.events
            .publish(Event::new(EventType::WorkflowDeleted).with_workflow(id));
        Ok(())
    }

    /// Activate a workflow: validate every action, require a trigger,
    /// register it, and roll back the status change if registration fails.
    pub async fn activate_workflow(&self, id: Uuid) -> DriftResult<()> {
        let mut workflow = self.require_workflow(id).await?;
        if workflow.status == WorkflowStatus::Active {
            return Err(DriftError::Validation(format!(
                "workflow '{}' is already active",
                workflow.name
            )));
        }
        if workflow.status == WorkflowStatus::Archived {
            return Err(DriftError::Validation(format!(
                "workflow '{}' is archived",
                workflow.name
            )));
        }
        workflow.validate()?;

        workflow.status = WorkflowStatus::Active;
        workflow.updated_at = Utc::now();
        self.workflows.save(workflow.clone()).await?;

        let registrar = self.registrar.read().clone();
        if let Some(registrar) = registrar {
            if let Err(err) = registrar.register(&workflow).await {
                // Roll back the status change, best-effort
                workflow.status = WorkflowStatus::Draft;
                workflow.updated_at = Utc::now();
                if let Err(rollback_err) = self.workflows.save(workflow).await {
                    tracing::error!(
                        workflow_id = %id,
                        error = %rollback_err,
                        "failed to roll back activation"
                    );
                }
                return Err(err);
            }
        }

        self.events
            .publish(Event::new(EventType::WorkflowActivated).with_workflow(id));
        Ok(())
    }

    /// Deactivate a workflow. Permitted only from active.
    pub async fn deactivate_workflow(&self, id: Uuid) -> DriftResult<()> {
        let mut workflow = self.require_workflow(id).await?;
        if workflow.status != WorkflowStatus::Active {
            return Err(DriftError::Validation(format!(
                "workflow '{}' is not active",
                workflow.name
            )));
        }

        let registrar = self.registrar.read().clone();
        if let Some(registrar) = registrar {
            if let Err(err) = registrar.unregister(id).await {
                tracing::warn!(workflow_id = %id, error = %err, "trigger unregistration failed");
            }
        }

        workflow.status = WorkflowStatus::Draft;
        workflow.updated_at = Utc::now();
        self.workflows.save(workflow).await?;
        self.events
            .publish(Event::new(EventType::WorkflowDeactivated).with_workflow(id));
        Ok(())
    }

    /// Archive a workflow. Active workflows must be deactivated first.
    pub async fn archive_workflow(&self, id: Uuid) -> DriftResult<()> {
        let mut workflow = self.require_workflow(id).await?;
        if workflow.status == WorkflowStatus::Active {
            return Err(DriftError::Validation(format!(
                "workflow '{}' is active; deactivate it first",
                workflow.name
            )));
        }
        workflow.status = WorkflowStatus::Archived;
        workflow.updated_at = Utc::now();
        self.workflows.save(workflow).await
    }

    // =========================================================================
    // Execution
    // =========================================================================

    /// Start an execution. Refuses when the workflow is not active, its
    /// conditions reject the input, or the concurrency bound is reached.
    pub async fn execute_workflow(
        self: &Arc<Self>,
        workflow_id: Uuid,
        input: serde_json::Value,
    ) -> DriftResult<Uuid> {
        let workflow = self.require_workflow(workflow_id).await?;
        if workflow.status != WorkflowStatus::Active {
            return Err(DriftError::Validation(format!(
                "workflow '{}' is not active",
                workflow.name
            )));
        }
        if !workflow.conditions.iter().all(|c| c.matches(&input)) {
            return Err(DriftError::Validation(format!(
                "workflow '{}' conditions rejected the input",
                workflow.name
            )));
        }

        let execution = Execution::new(workflow_id, input.clone());
        let execution_id = execution.id;
        let cancel = self.root.child_token();

        {
            let mut active = self.active.lock().await;
            if active.len() >= self.settings.max_concurrent_executions {
                return Err(DriftError::Validation(format!(
                    "max concurrent executions ({}) reached",
                    self.settings.max_concurrent_executions
                )));
            }
            active.insert(
                execution_id,
                ExecutionHandle {
                    cancel: cancel.clone(),
                },
            );
        }

        if let Err(err) = self.executions.save(execution).await {
            self.active.lock().await.remove(&execution_id);
            return Err(err);
        }

        let engine = Arc::clone(self);
        tokio::spawn(async move {
            engine.run(execution_id, workflow, input, cancel).await;
        });
        Ok(execution_id)
    }

    /// Cancel a live execution: trigger its token, mark it cancelled,
    /// drop it from the live map, and publish `execution-cancelled`.
    pub async fn cancel_execution(&self, execution_id: Uuid) -> DriftResult<()> {
        let handle = self.active.lock().await.remove(&execution_id);
        let Some(handle) = handle else {
            return Err(DriftError::NotFound {
                resource_type: "execution".to_string(),
                resource_id: execution_id.to_string(),
            });
        };
        handle.cancel.cancel();

        if let Some(mut execution) = self.executions.get(execution_id).await? {
            if !execution.status.is_terminal() {
                execution.status = ExecutionStatus::Cancelled;
                execution.completed_at = Some(Utc::now());
                self.executions.save(execution).await?;
            }
        }
        self.events
            .publish(Event::new(EventType::ExecutionCancelled).with_execution(execution_id));
        Ok(())
    }

    async fn run(
        &self,
        execution_id: Uuid,
        workflow: Workflow,
        input: serde_json::Value,
        cancel: CancellationToken,
    ) {
        if let Err(err) = self
            .run_inner(execution_id, &workflow, input, cancel)
            .await
        {
            tracing::error!(execution_id = %execution_id, error = %err, "execution bookkeeping failed");
        }
        self.active.lock().await.remove(&execution_id);
    }

    async fn run_inner(
        &self,
        execution_id: Uuid,
        workflow: &Workflow,
        input: serde_json::Value,
        cancel: CancellationToken,
    ) -> DriftResult<()> {
        let Some(mut execution) = self.executions.get(execution_id).await? else {
            return Ok(());
        };
        execution.status = ExecutionStatus::Running;
        execution.started_at = Some(Utc::now());
        self.executions.save(execution.clone()).await?;
        self.events.publish(
            Event::new(EventType::ExecutionStarted)
                .with_workflow(workflow.id)
                .with_execution(execution_id),
        );

        // The context starts as the execution input and grows with each
        // successful action's output
        let mut context = match input {
            serde_json::Value::Object(map) => serde_json::Value::Object(map),
            other => json!({ "input": other }),
        };
        let mut results: Vec<ActionResult> = Vec::new();

        let timeout = workflow.settings.timeout.unwrap_or(self.settings.execution_timeout);
        let end = tokio::time::timeout(
            timeout,
            self.run_actions(workflow, &cancel, &mut context, &mut results),
        )
        .await;

        // Re-read: cancel_execution may have finalized the record already
        let Some(mut execution) = self.executions.get(execution_id).await? else {
            return Ok(());
        };
        if execution.status.is_terminal() {
            return Ok(());
        }

        execution.results = results;
        execution.completed_at = Some(Utc::now());
        let event_type = match end {
            Ok(RunEnd::Cancelled) => {
                execution.status = ExecutionStatus::Cancelled;
                EventType::ExecutionCancelled
            }
            Ok(RunEnd::Finished { any_failed: false }) => {
                execution.status = ExecutionStatus::Completed;
                EventType::ExecutionCompleted
            }
            Ok(RunEnd::Finished { any_failed: true }) => {
                execution.status = ExecutionStatus::Failed;
                EventType::ExecutionFailed
            }
            Err(_elapsed) => {
                execution.status = ExecutionStatus::Failed;
                tracing::warn!(execution_id = %execution_id, ?timeout, "execution timed out");
                EventType::ExecutionFailed
            }
        };
        self.executions.save(execution).await?;
        self.events.publish(
            Event::new(event_type)
                .with_workflow(workflow.id)
                .with_execution(execution_id),
        );
        Ok(())
    }

    async fn run_actions(
        &self,
        workflow: &Workflow,
        cancel: &CancellationToken,
        context: &mut serde_json::Value,
        results: &mut Vec<ActionResult>,
    ) -> RunEnd {
        let mut any_failed = false;

        for (index, action) in workflow.actions.iter().enumerate() {
            if cancel.is_cancelled() {
                return RunEnd::Cancelled;
            }

            let started = Instant::now();
            let mut attempts = 0u32;
            let outcome = loop {
                let outcome = self.executor.execute(cancel, action, context).await;
                match &outcome {
                    Err(err)
                        if workflow.settings.retry_on_failure
                            && err.is_retryable()
                            && attempts < workflow.settings.max_retries =>
                    {
                        attempts += 1;
                        tracing::debug!(
                            action = %action.name,
                            attempts,
                            "retrying failed action"
                        );
                        continue;
                    }
                    _ => break outcome,
                }
            };
            let execution_time = started.elapsed();

            match outcome {
                Ok(output) => {
                    if let serde_json::Value::Object(map) = context {
                        map.insert(format!("action_{}_result", index), output.clone());
                    }
                    results.push(ActionResult {
                        action_id: action.id,
                        status: ActionStatus::Completed,
                        output,
                        error: None,
                        execution_time,
                    });
                }
                Err(err) if err.kind() == ErrorKind::Cancelled => {
                    return RunEnd::Cancelled;
                }
                Err(err) => {
                    any_failed = true;
                    // A configuration rejected at dispatch never ran
                    let status = if err.kind() == ErrorKind::Validation {
                        ActionStatus::Skipped
                    } else {
                        ActionStatus::Failed
                    };
                    results.push(ActionResult {
                        action_id: action.id,
                        status,
                        output: serde_json::Value::Null,
                        error: Some(err.to_string()),
                        execution_time,
                    });
                    if workflow.settings.stop_on_error {
                        break;
                    }
                }
            }
        }

        RunEnd::Finished { any_failed }
    }

    async fn require_workflow(&self, id: Uuid) -> DriftResult<Workflow> {
        self.workflows.get(id).await?.ok_or_else(|| DriftError::NotFound {
            resource_type: "workflow".to_string(),
            resource_id: id.to_string(),
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::model::{Action, ActionType, TriggerSpec};
    use crate::repository::{InMemoryExecutionRepository, InMemoryWorkflowRepository};

    fn engine() -> Arc<WorkflowEngine> {
        Arc::new(WorkflowEngine::new(
            Arc::new(InMemoryWorkflowRepository::new()),
            Arc::new(InMemoryExecutionRepository::new()),
            Arc::new(ActionExecutor::new()),
            Arc::new(EventBus::new()),
            EngineSettings::default(),
        ))
    }

    fn script_action(name: &str, command: &str, args: &[&str]) -> Action {
        Action::new(
            name,
            ActionType::Script,
            json!({ "command": command, "args": args }),
        )
    }

    fn ok_workflow() -> Workflow {
        Workflow::new(
            "wf",
            vec![script_action("a1", "echo", &["one"])],
            TriggerSpec::manual(),
        )
    }

    async fn wait_terminal(engine: &Arc<WorkflowEngine>, id: Uuid) -> Execution {
        for _ in 0..200 {
            if let Some(execution) = engine.executions.get(id).await.unwrap() {
                if execution.status.is_terminal() {
                    return execution;
                }
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        panic!("execution never reached a terminal state");
    }

    #[tokio::test]
    async fn test_activation_requires_valid_actions() {
        let engine = engine();
        let workflow = Workflow::new(
            "bad",
            vec![Action::new("broken", ActionType::HttpCall, json!({}))],
            TriggerSpec::manual(),
        );
        let id = engine.create_workflow(workflow).await.unwrap();

        let err = engine.activate_workflow(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        let stored = engine.workflows.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkflowStatus::Draft);
    }

    #[tokio::test]
    async fn test_double_activation_fails_without_state_change() {
        let engine = engine();
        let id = engine.create_workflow(ok_workflow()).await.unwrap();
        engine.activate_workflow(id).await.unwrap();

        let err = engine.activate_workflow(id).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
        let stored = engine.workflows.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkflowStatus::Active);
    }

    #[tokio::test]
    async fn test_activate_deactivate_round_trip() {
        let engine = engine();
        let id = engine.create_workflow(ok_workflow()).await.unwrap();

        engine.activate_workflow(id).await.unwrap();
        engine.deactivate_workflow(id).await.unwrap();

        let stored = engine.workflows.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkflowStatus::Draft);
    }

    #[tokio::test]
    async fn test_registration_failure_rolls_back() {
        struct RefusingRegistrar;

        #[async_trait]
        impl TriggerRegistrar for RefusingRegistrar {
            async fn register(&self, _workflow: &Workflow) -> DriftResult<()> {
                Err(DriftError::Internal("registration backend down".into()))
            }

            async fn unregister(&self, _workflow_id: Uuid) -> DriftResult<()> {
                Ok(())
            }
        }

        let engine = engine();
        engine.set_registrar(Arc::new(RefusingRegistrar));
        let id = engine.create_workflow(ok_workflow()).await.unwrap();

        assert!(engine.activate_workflow(id).await.is_err());
        let stored = engine.workflows.get(id).await.unwrap().unwrap();
        assert_eq!(stored.status, WorkflowStatus::Draft);
    }

    #[tokio::test]
    async fn test_execute_refuses_inactive_workflow() {
        let engine = engine();
        let id = engine.create_workflow(ok_workflow()).await.unwrap();

        let err = engine.execute_workflow(id, json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);
    }

    #[tokio::test]
    async fn test_successful_execution_threads_context() {
        let engine = engine();
        let workflow = Workflow::new(
            "wf",
            vec![
                script_action("a1", "echo", &["one"]),
                // The second action can see the first action's output
                script_action(
                    "a2",
                    "sh",
                    &["-c", "printf %s \"$DRIFTKIT_CONTEXT\" | grep -q action_0_result"],
                ),
            ],
            TriggerSpec::manual(),
        );
        let id = engine.create_workflow(workflow).await.unwrap();
        engine.activate_workflow(id).await.unwrap();

        let execution_id = engine.execute_workflow(id, json!({})).await.unwrap();
        let execution = wait_terminal(&engine, execution_id).await;

        assert_eq!(execution.status, ExecutionStatus::Completed);
        assert_eq!(execution.results.len(), 2);
        assert!(execution
            .results
            .iter()
            .all(|r| r.status == ActionStatus::Completed));

        // Per-action times are contained in the observed duration
        let action_total: Duration = execution.results.iter().map(|r| r.execution_time).sum();
        let observed = (execution.completed_at.unwrap() - execution.started_at.unwrap())
            .to_std()
            .unwrap();
        assert!(action_total <= observed + Duration::from_millis(50));
    }

    #[tokio::test]
    async fn test_stop_on_error_truncates_results() {
        let engine = engine();
        let workflow = Workflow::new(
            "wf",
            vec![
                script_action("a1", "echo", &["ok"]),
                script_action("a2", "false", &[]),
                script_action("a3", "echo", &["never"]),
            ],
            TriggerSpec::manual(),
        );
        let id = engine.create_workflow(workflow).await.unwrap();
        engine.activate_workflow(id).await.unwrap();

        let mut failed_events = engine.events().subscribe(EventType::ExecutionFailed);
        let execution_id = engine.execute_workflow(id, json!({})).await.unwrap();
        let execution = wait_terminal(&engine, execution_id).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.results.len(), 2);
        assert_eq!(execution.results[0].status, ActionStatus::Completed);
        assert_eq!(execution.results[1].status, ActionStatus::Failed);

        let event = failed_events.recv().await.unwrap();
        assert_eq!(event.execution_id, Some(execution_id));
        // Exactly once
        assert!(failed_events.try_recv().is_err());
    }

    #[tokio::test]
    async fn test_continue_on_error_records_all_results() {
        let engine = engine();
        let mut workflow = Workflow::new(
            "wf",
            vec![
                script_action("a1", "false", &[]),
                script_action("a2", "echo", &["still runs"]),
            ],
            TriggerSpec::manual(),
        );
        workflow.settings.stop_on_error = false;
        let id = engine.create_workflow(workflow).await.unwrap();
        engine.activate_workflow(id).await.unwrap();

        let execution_id = engine.execute_workflow(id, json!({})).await.unwrap();
        let execution = wait_terminal(&engine, execution_id).await;

        assert_eq!(execution.status, ExecutionStatus::Failed);
        assert_eq!(execution.results.len(), 2);
        assert_eq!(execution.results[1].status, ActionStatus::Completed);
    }

    #[tokio::test]
    async fn test_cancellation_mid_execution() {
        let engine = engine();
        let workflow = Workflow::new(
            "wf",
            vec![
                script_action("a1", "echo", &["fast"]),
                script_action("a2", "sleep", &["10"]),
                script_action("a3", "echo", &["never"]),
            ],
            TriggerSpec::manual(),
        );
        let id = engine.create_workflow(workflow).await.unwrap();
        engine.activate_workflow(id).await.unwrap();

        let mut cancelled_events = engine.events().subscribe(EventType::ExecutionCancelled);
        let execution_id = engine.execute_workflow(id, json!({})).await.unwrap();

        // Let the first action finish, then cancel during the sleep
        tokio::time::sleep(Duration::from_millis(300)).await;
        engine.cancel_execution(execution_id).await.unwrap();

        let execution = wait_terminal(&engine, execution_id).await;
        assert_eq!(execution.status, ExecutionStatus::Cancelled);
        assert!(execution.results.len() <= 1);
        assert_eq!(engine.active_executions().await, 0);

        let event = cancelled_events.recv().await.unwrap();
        assert_eq!(event.execution_id, Some(execution_id));
    }

    #[tokio::test]
    async fn test_concurrency_bound() {
        let engine = Arc::new(WorkflowEngine::new(
            Arc::new(InMemoryWorkflowRepository::new()),
            Arc::new(InMemoryExecutionRepository::new()),
            Arc::new(ActionExecutor::new()),
            Arc::new(EventBus::new()),
            EngineSettings {
                max_concurrent_executions: 1,
                ..Default::default()
            },
        ));
        let workflow = Workflow::new(
            "wf",
            vec![script_action("a1", "sleep", &["5"])],
            TriggerSpec::manual(),
        );
        let id = engine.create_workflow(workflow).await.unwrap();
        engine.activate_workflow(id).await.unwrap();

        let first = engine.execute_workflow(id, json!({})).await.unwrap();
        let err = engine.execute_workflow(id, json!({})).await.unwrap_err();
        assert_eq!(err.kind(), ErrorKind::Validation);

        engine.cancel_execution(first).await.unwrap();
    }

    #[tokio::test]
    async fn test_conditions_gate_execution() {
        let engine = engine();
        let mut workflow = ok_workflow();
        workflow.conditions.push(crate::model::EventFilter {
            field: "severity".into(),
            operator: crate::model::FilterOperator::Equals,
            value: json!("critical"),
        });
        let id = engine.create_workflow(workflow).await.unwrap();
        engine.activate_workflow(id).await.unwrap();

        assert!(engine
            .execute_workflow(id, json!({ "severity": "info" }))
            .await
            .is_err());
        assert!(engine
            .execute_workflow(id, json!({ "severity": "critical" }))
            .await
            .is_ok());
    }
}
