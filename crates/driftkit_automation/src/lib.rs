//! # DriftKit Automation
//!
//! Event-driven automation over the discovery engine:
//!
//! - **Model**: workflows, actions, triggers, executions
//! - **Engine**: sequential action execution with context threading,
//!   stop-on-error, bounded concurrency, and local cancellation
//! - **Actions**: HTTP, script, notification, and infrastructure-tool
//!   dispatch behind external-collaborator seams
//! - **Triggers**: manual, scheduled, event, and webhook monitoring
//! - **Repositories**: persistence contracts with in-memory defaults
//!
//! The automation layer consumes and publishes events on the
//! [`driftkit_core`] event bus; discovery events can trigger workflows
//! and workflow lifecycle is observable on the same bus.

#![warn(missing_docs)]
#![deny(unsafe_code)]

pub mod actions;
pub mod engine;
pub mod model;
pub mod repository;
pub mod triggers;

pub use actions::{ActionExecutor, Notifier, ToolOutcome, ToolRunner};
pub use engine::{EngineSettings, TriggerRegistrar, WorkflowEngine};
pub use model::{
    Action, ActionResult, ActionStatus, ActionType, Condition, EventFilter, Execution,
    ExecutionStatus, FilterOperator, HttpCallConfig, InfrastructureToolConfig, NotificationConfig,
    Schedule, ScheduleType, ScriptConfig, TriggerSpec, TriggerType, Workflow, WorkflowSettings,
    WorkflowStatus,
};
pub use repository::{
    ExecutionRepository, InMemoryExecutionRepository, InMemoryWorkflowRepository,
    WorkflowRepository,
};
pub use triggers::{should_fire, TriggerContext, TriggerManager, DEFAULT_TICK_INTERVAL};
