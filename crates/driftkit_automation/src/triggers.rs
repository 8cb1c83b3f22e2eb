//! Trigger monitoring: manual, scheduled, event, and webhook dispatch.

use crate::engine::{TriggerRegistrar, WorkflowEngine};
use crate::model::{Schedule, ScheduleType, TriggerSpec, TriggerType, Workflow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use driftkit_core::EventBus;
use driftkit_spi::{DriftError, DriftResult};
use parking_lot::{Mutex, RwLock};
use serde_json::json;
use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

/// Default scheduler wake interval.
pub const DEFAULT_TICK_INTERVAL: Duration = Duration::from_secs(60);

/// Bookkeeping for one registered trigger.
pub struct TriggerContext {
    /// Workflow the trigger belongs to
    pub workflow_id: Uuid,
    /// The trigger specification
    pub spec: TriggerSpec,
    /// When the trigger was registered
    pub registered_at: DateTime<Utc>,
    /// When the trigger last fired
    pub last_fired: Option<DateTime<Utc>>,
    cancel: CancellationToken,
}

/// Decide whether a schedule is due.
///
/// Interval schedules fire when the configured duration has elapsed
/// since the last firing (or registration). Cron schedules use a
/// minute-granularity heuristic until a real parser is present.
pub fn should_fire(now: DateTime<Utc>, schedule: &Schedule, since: DateTime<Utc>) -> bool {
    let elapsed = now.signed_duration_since(since);
    match schedule.schedule_type {
        ScheduleType::Interval => match schedule.every {
            Some(every) => {
                chrono::Duration::from_std(every).map(|e| elapsed >= e).unwrap_or(false)
            }
            None => false,
        },
        ScheduleType::Cron => elapsed >= chrono::Duration::seconds(60),
    }
}

/// Dispatches workflow triggers.
///
/// Registration and unregistration are idempotent and safe under
/// concurrency; each trigger owns its own cancellation handle, and
/// stopping the manager cancels all of them.
pub struct TriggerManager {
    engine: Arc<WorkflowEngine>,
    events: Arc<EventBus>,
    active: Arc<RwLock<HashMap<Uuid, TriggerContext>>>,
    webhooks: RwLock<HashMap<String, Uuid>>,
    tick_interval: Duration,
    root: Mutex<Option<CancellationToken>>,
}

impl TriggerManager {
    /// Create a manager with the default one-minute scheduler tick.
    pub fn new(engine: Arc<WorkflowEngine>, events: Arc<EventBus>) -> Self {
        Self::with_tick_interval(engine, events, DEFAULT_TICK_INTERVAL)
    }

    /// Create a manager with a custom scheduler tick (tests).
    pub fn with_tick_interval(
        engine: Arc<WorkflowEngine>,
        events: Arc<EventBus>,
        tick_interval: Duration,
    ) -> Self {
        Self {
            engine,
            events,
            active: Arc::new(RwLock::new(HashMap::new())),
            webhooks: RwLock::new(HashMap::new()),
            tick_interval,
            root: Mutex::new(None),
        }
    }

    /// Number of registered triggers.
    pub fn registered_count(&self) -> usize {
        self.active.read().len()
    }

    /// Whether a workflow has a registered trigger.
    pub fn is_registered(&self, workflow_id: Uuid) -> bool {
        self.active.read().contains_key(&workflow_id)
    }

    /// The workflow bound to a webhook route, if any.
    pub fn workflow_for_path(&self, path: &str) -> Option<Uuid> {
        self.webhooks.read().get(path).copied()
    }

    /// Register a workflow's trigger. Re-registering replaces the
    /// previous registration.
    pub fn register_trigger(&self, workflow: &Workflow) -> DriftResult<()> {
        workflow.trigger.validate()?;
        // Replace any previous registration
        self.unregister_trigger(workflow.id);

        let cancel = CancellationToken::new();
        let context = TriggerContext {
            workflow_id: workflow.id,
            spec: workflow.trigger.clone(),
            registered_at: Utc::now(),
            last_fired: None,
            cancel: cancel.clone(),
        };

        match workflow.trigger.trigger_type {
            TriggerType::Manual | TriggerType::Scheduled => {}
            TriggerType::Webhook => {
                // Validated to be present
                if let Some(path) = &workflow.trigger.webhook_path {
                    self.webhooks.write().insert(path.clone(), workflow.id);
                }
            }
            TriggerType::Event => {
                self.spawn_event_listener(workflow.id, &workflow.trigger, cancel);
            }
        }

        self.active.write().insert(workflow.id, context);
        tracing::info!(workflow_id = %workflow.id, trigger = ?workflow.trigger.trigger_type, "trigger registered");
        Ok(())
    }

    /// Remove a workflow's trigger. A no-op when nothing is registered.
    pub fn unregister_trigger(&self, workflow_id: Uuid) {
        if let Some(context) = self.active.write().remove(&workflow_id) {
            context.cancel.cancel();
            tracing::info!(workflow_id = %workflow_id, "trigger unregistered");
        }
        self.webhooks.write().retain(|_, id| *id != workflow_id);
    }

    /// Start the scheduler loop. Idempotent.
    pub fn start(&self) {
        let mut root = self.root.lock();
        if root.is_some() {
            return;
        }
        let cancel = CancellationToken::new();
        *root = Some(cancel.clone());

        let active = Arc::clone(&self.active);
        let engine = Arc::clone(&self.engine);
        let tick = self.tick_interval;
        tokio::spawn(async move {
            let mut ticker = tokio::time::interval(tick);
            ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
            loop {
                tokio::select! {
                    _ = cancel.cancelled() => break,
                    _ = ticker.tick() => {
                        Self::evaluate_schedules(&active, &engine).await;
                    }
                }
            }
        });
    }

    /// Stop the manager: cancel the scheduler and every trigger.
    /// Idempotent.
    pub fn stop(&self) {
        if let Some(root) = self.root.lock().take() {
            root.cancel();
        }
        let mut active = self.active.write();
        for (_, context) in active.drain() {
            context.cancel.cancel();
        }
        self.webhooks.write().clear();
    }

    /// Deliver a payload to a workflow (the webhook entry point used by
    /// the surrounding HTTP surface).
    pub async fn trigger_workflow(
        &self,
        workflow_id: Uuid,
        payload: serde_json::Value,
    ) -> DriftResult<Uuid> {
        if !self.is_registered(workflow_id) {
            return Err(DriftError::NotFound {
                resource_type: "trigger".to_string(),
                resource_id: workflow_id.to_string(),
            });
        }
        let execution_id = self.engine.execute_workflow(workflow_id, payload).await?;
        self.mark_fired(workflow_id);
        Ok(execution_id)
    }

    /// Deliver a payload by webhook route.
    pub async fn deliver_webhook(
        &self,
        path: &str,
        payload: serde_json::Value,
    ) -> DriftResult<Uuid> {
        let workflow_id = self.workflow_for_path(path).ok_or_else(|| DriftError::NotFound {
            resource_type: "webhook route".to_string(),
            resource_id: path.to_string(),
        })?;
        self.trigger_workflow(workflow_id, payload).await
    }

    fn mark_fired(&self, workflow_id: Uuid) {
        if let Some(context) = self.active.write().get_mut(&workflow_id) {
            context.last_fired = Some(Utc::now());
        }
    }

    async fn evaluate_schedules(
        active: &Arc<RwLock<HashMap<Uuid, TriggerContext>>>,
        engine: &Arc<WorkflowEngine>,
    ) {
        let now = Utc::now();
        let due: Vec<Uuid> = {
            let active = active.read();
            active
                .values()
                .filter(|c| c.spec.trigger_type == TriggerType::Scheduled)
                .filter(|c| {
                    c.spec
                        .schedule
                        .as_ref()
                        .map(|s| should_fire(now, s, c.last_fired.unwrap_or(c.registered_at)))
                        .unwrap_or(false)
                })
                .map(|c| c.workflow_id)
                .collect()
        };

        for workflow_id in due {
            match engine
                .execute_workflow(workflow_id, json!({ "trigger": "scheduled" }))
                .await
            {
                Ok(execution_id) => {
                    tracing::debug!(%workflow_id, %execution_id, "scheduled trigger fired");
                    if let Some(context) = active.write().get_mut(&workflow_id) {
                        context.last_fired = Some(Utc::now());
                    }
                }
                Err(err) => {
                    tracing::debug!(%workflow_id, error = %err, "scheduled trigger refused");
                }
            }
        }
    }

    fn spawn_event_listener(&self, workflow_id: Uuid, spec: &TriggerSpec, cancel: CancellationToken) {
        // Validated to be present
        let Some(event_type) = spec.event_type else {
            return;
        };
        let filters = spec.filters.clone();
        let mut receiver = self.events.subscribe(event_type);
        let engine = Arc::clone(&self.engine);
        let active = Arc::clone(&self.active);

        tokio::spawn(async move {
            loop {
                let event = tokio::select! {
                    _ = cancel.cancelled() => break,
                    event = receiver.recv() => match event {
                        Some(event) => event,
                        None => break,
                    },
                };

                if !filters.iter().all(|f| f.matches(&event.data)) {
                    continue;
                }

                let payload = json!({
                    "event_id": event.id,
                    "event_type": event.event_type,
                    "data": event.data,
                });
                match engine.execute_workflow(workflow_id, payload).await {
                    Ok(execution_id) => {
                        tracing::debug!(%workflow_id, %execution_id, "event trigger fired");
                        if let Some(context) = active.write().get_mut(&workflow_id) {
                            context.last_fired = Some(Utc::now());
                        }
                    }
                    Err(err) => {
                        tracing::debug!(%workflow_id, error = %err, "event trigger refused");
                    }
                }
            }
        });
    }
}

#[async_trait]
impl TriggerRegistrar for TriggerManager {
    async fn register(&self, workflow: &Workflow) -> DriftResult<()> {
        self.register_trigger(workflow)
    }

    async fn unregister(&self, workflow_id: Uuid) -> DriftResult<()> {
        self.unregister_trigger(workflow_id);
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::actions::ActionExecutor;
    use crate::engine::EngineSettings;
    use crate::model::{Action, ActionType, FilterOperator};
    use crate::repository::{InMemoryExecutionRepository, InMemoryWorkflowRepository};
    use driftkit_core::{Event, EventType};

    fn engine_and_bus() -> (Arc<WorkflowEngine>, Arc<EventBus>) {
        let events = Arc::new(EventBus::new());
        let engine = Arc::new(WorkflowEngine::new(
            Arc::new(InMemoryWorkflowRepository::new()),
            Arc::new(InMemoryExecutionRepository::new()),
            Arc::new(ActionExecutor::new()),
            Arc::clone(&events),
            EngineSettings::default(),
        ));
        (engine, events)
    }

    fn echo_workflow(trigger: TriggerSpec) -> Workflow {
        Workflow::new(
            "wf",
            vec![Action::new(
                "a1",
                ActionType::Script,
                json!({ "command": "echo", "args": ["fired"] }),
            )],
            trigger,
        )
    }

    async fn activate(engine: &Arc<WorkflowEngine>, workflow: Workflow) -> Uuid {
        let id = engine.create_workflow(workflow).await.unwrap();
        engine.activate_workflow(id).await.unwrap();
        id
    }

    #[test]
    fn test_should_fire_interval() {
        let schedule = Schedule {
            schedule_type: ScheduleType::Interval,
            every: Some(Duration::from_secs(300)),
            expression: None,
        };
        let now = Utc::now();
        assert!(!should_fire(now, &schedule, now - chrono::Duration::seconds(60)));
        assert!(should_fire(now, &schedule, now - chrono::Duration::seconds(301)));
    }

    #[test]
    fn test_should_fire_cron_heuristic() {
        let schedule = Schedule {
            schedule_type: ScheduleType::Cron,
            every: None,
            expression: Some("*/5 * * * *".to_string()),
        };
        let now = Utc::now();
        assert!(!should_fire(now, &schedule, now - chrono::Duration::seconds(30)));
        assert!(should_fire(now, &schedule, now - chrono::Duration::seconds(61)));
    }

    #[tokio::test]
    async fn test_register_unregister_round_trip() {
        let (engine, events) = engine_and_bus();
        let manager = TriggerManager::new(engine, events);
        let workflow = echo_workflow(TriggerSpec::webhook("/hooks/x"));

        manager.register_trigger(&workflow).unwrap();
        assert!(manager.is_registered(workflow.id));
        assert_eq!(manager.workflow_for_path("/hooks/x"), Some(workflow.id));

        manager.unregister_trigger(workflow.id);
        assert!(!manager.is_registered(workflow.id));
        assert!(manager.workflow_for_path("/hooks/x").is_none());

        // Unregistering again is a no-op
        manager.unregister_trigger(workflow.id);
        assert_eq!(manager.registered_count(), 0);
    }

    #[tokio::test]
    async fn test_reregistration_replaces() {
        let (engine, events) = engine_and_bus();
        let manager = TriggerManager::new(engine, events);
        let mut workflow = echo_workflow(TriggerSpec::webhook("/hooks/a"));

        manager.register_trigger(&workflow).unwrap();
        workflow.trigger = TriggerSpec::webhook("/hooks/b");
        manager.register_trigger(&workflow).unwrap();

        assert_eq!(manager.registered_count(), 1);
        assert!(manager.workflow_for_path("/hooks/a").is_none());
        assert_eq!(manager.workflow_for_path("/hooks/b"), Some(workflow.id));
    }

    #[tokio::test]
    async fn test_webhook_delivery_executes() {
        let (engine, events) = engine_and_bus();
        let manager = TriggerManager::new(Arc::clone(&engine), events);
        let workflow = echo_workflow(TriggerSpec::webhook("/hooks/deploy"));
        let id = activate(&engine, workflow.clone()).await;

        // Activation without a wired registrar: register manually
        let stored = engine.workflows().get(id).await.unwrap().unwrap();
        manager.register_trigger(&stored).unwrap();

        let execution_id = manager
            .deliver_webhook("/hooks/deploy", json!({ "ref": "main" }))
            .await
            .unwrap();
        let execution = engine.executions().get(execution_id).await.unwrap().unwrap();
        assert_eq!(execution.workflow_id, id);

        assert!(manager
            .deliver_webhook("/hooks/unknown", json!({}))
            .await
            .is_err());
    }

    #[tokio::test]
    async fn test_event_trigger_fires_on_matching_event() {
        let (engine, events) = engine_and_bus();
        let manager = TriggerManager::new(Arc::clone(&engine), Arc::clone(&events));

        let trigger = TriggerSpec::on_event(EventType::ResourceFound).filter(
            "type",
            FilterOperator::Equals,
            json!("aws_instance"),
        );
        let workflow = echo_workflow(trigger);
        let id = activate(&engine, workflow.clone()).await;
        let stored = engine.workflows().get(id).await.unwrap().unwrap();
        manager.register_trigger(&stored).unwrap();

        // Non-matching event is ignored
        events.publish(
            Event::new(EventType::ResourceFound).with_data(json!({ "type": "gcp_storage_bucket" })),
        );
        // Matching event fires
        events.publish(
            Event::new(EventType::ResourceFound).with_data(json!({ "type": "aws_instance" })),
        );

        let mut fired = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !engine.executions().list_for_workflow(id).await.unwrap().is_empty() {
                fired = true;
                break;
            }
        }
        assert!(fired, "event trigger never fired");
        assert_eq!(engine.executions().list_for_workflow(id).await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_scheduled_trigger_fires() {
        let (engine, events) = engine_and_bus();
        let manager =
            TriggerManager::with_tick_interval(Arc::clone(&engine), events, Duration::from_millis(20));

        let workflow = echo_workflow(TriggerSpec::every(Duration::from_millis(1)));
        let id = activate(&engine, workflow.clone()).await;
        let stored = engine.workflows().get(id).await.unwrap().unwrap();
        manager.register_trigger(&stored).unwrap();

        manager.start();
        // Starting twice is a no-op
        manager.start();

        let mut fired = false;
        for _ in 0..100 {
            tokio::time::sleep(Duration::from_millis(10)).await;
            if !engine.executions().list_for_workflow(id).await.unwrap().is_empty() {
                fired = true;
                break;
            }
        }
        assert!(fired, "scheduled trigger never fired");

        manager.stop();
        manager.stop();
        assert_eq!(manager.registered_count(), 0);
    }
}
