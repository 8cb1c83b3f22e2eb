//! Workflow, trigger, and execution data model.

use chrono::{DateTime, Utc};
use driftkit_core::EventType;
use driftkit_spi::{DriftError, DriftResult};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use std::time::Duration;
use uuid::Uuid;

/// Workflow lifecycle states.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum WorkflowStatus {
    /// Editable, not triggerable
    Draft,
    /// Triggers registered, executable
    Active,
    /// Kept but not executable
    Disabled,
    /// Retired, immutable
    Archived,
}

/// Action kinds the engine can dispatch.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum ActionType {
    /// Run an infrastructure tool operation via the injected runner
    InfrastructureTool,
    /// Make an HTTP call
    HttpCall,
    /// Run a local script/command
    Script,
    /// Send a notification via the injected notifier
    Notification,
}

/// Configuration schema for [`ActionType::HttpCall`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct HttpCallConfig {
    /// Request URL
    pub url: String,
    /// HTTP method, default GET
    #[serde(default = "default_method")]
    pub method: String,
    /// Request headers
    #[serde(default)]
    pub headers: BTreeMap<String, String>,
    /// JSON body, if any
    #[serde(default)]
    pub body: Option<serde_json::Value>,
    /// Status expected for success; any 2xx/3xx otherwise
    #[serde(default)]
    pub expected_status: Option<u16>,
}

fn default_method() -> String {
    "GET".to_string()
}

/// Configuration schema for [`ActionType::Script`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct ScriptConfig {
    /// Command to run
    pub command: String,
    /// Arguments
    #[serde(default)]
    pub args: Vec<String>,
    /// Extra environment variables
    #[serde(default)]
    pub env: BTreeMap<String, String>,
    /// Working directory
    #[serde(default)]
    pub working_dir: Option<String>,
}

/// Configuration schema for [`ActionType::Notification`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct NotificationConfig {
    /// Destination channel
    pub channel: String,
    /// Message body
    pub message: String,
    /// Severity label, default `info`
    #[serde(default = "default_severity")]
    pub severity: String,
}

fn default_severity() -> String {
    "info".to_string()
}

/// Configuration schema for [`ActionType::InfrastructureTool`].
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(deny_unknown_fields)]
pub struct InfrastructureToolConfig {
    /// Tool name (e.g. `terraform`)
    pub tool: String,
    /// Operation (e.g. `plan`)
    pub operation: String,
    /// Tool-specific arguments
    #[serde(default)]
    pub arguments: serde_json::Value,
}

/// One step of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Action {
    /// Action id, unique within the workflow
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Dispatch type
    pub action_type: ActionType,
    /// Opaque configuration, parsed per type
    pub configuration: serde_json::Value,
}

impl Action {
    /// Create an action.
    pub fn new(
        name: impl Into<String>,
        action_type: ActionType,
        configuration: serde_json::Value,
    ) -> Self {
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            action_type,
            configuration,
        }
    }

    /// Parse the configuration against the type's strict schema.
    ///
    /// Unknown fields are rejected. Every action must validate before a
    /// workflow may transition to active.
    pub fn validate(&self) -> DriftResult<()> {
        let result = match self.action_type {
            ActionType::HttpCall => {
                serde_json::from_value::<HttpCallConfig>(self.configuration.clone()).map(|_| ())
            }
            ActionType::Script => {
                serde_json::from_value::<ScriptConfig>(self.configuration.clone()).map(|_| ())
            }
            ActionType::Notification => {
                serde_json::from_value::<NotificationConfig>(self.configuration.clone()).map(|_| ())
            }
            ActionType::InfrastructureTool => {
                serde_json::from_value::<InfrastructureToolConfig>(self.configuration.clone())
                    .map(|_| ())
            }
        };
        result.map_err(|e| {
            DriftError::Validation(format!("action '{}' configuration invalid: {}", self.name, e))
        })
    }
}

/// Comparison operators used by conditions and event filters.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FilterOperator {
    /// Field equals value
    Equals,
    /// Field differs from value
    NotEquals,
    /// String field contains value substring
    Contains,
    /// Numeric field is greater than value
    GreaterThan,
    /// Numeric field is less than value
    LessThan,
}

/// One conjunctive predicate over a JSON document.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EventFilter {
    /// Dot-separated field path into the document
    pub field: String,
    /// Comparison operator
    pub operator: FilterOperator,
    /// Value to compare against
    pub value: serde_json::Value,
}

impl EventFilter {
    /// Evaluate the predicate against a document.
    pub fn matches(&self, data: &serde_json::Value) -> bool {
        let Some(actual) = lookup_path(data, &self.field) else {
            return false;
        };
        match self.operator {
            FilterOperator::Equals => actual == &self.value,
            FilterOperator::NotEquals => actual != &self.value,
            FilterOperator::Contains => match (actual.as_str(), self.value.as_str()) {
                (Some(haystack), Some(needle)) => haystack.contains(needle),
                _ => false,
            },
            FilterOperator::GreaterThan => match (actual.as_f64(), self.value.as_f64()) {
                (Some(a), Some(b)) => a > b,
                _ => false,
            },
            FilterOperator::LessThan => match (actual.as_f64(), self.value.as_f64()) {
                (Some(a), Some(b)) => a < b,
                _ => false,
            },
        }
    }
}

/// Resolve a dot-separated path inside a JSON document.
fn lookup_path<'a>(data: &'a serde_json::Value, path: &str) -> Option<&'a serde_json::Value> {
    let mut current = data;
    for segment in path.split('.') {
        current = current.get(segment)?;
    }
    Some(current)
}

/// Conditions gate execution; same shape as event filters.
pub type Condition = EventFilter;

/// How a workflow is triggered.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TriggerType {
    /// Only explicit `execute_workflow` calls
    Manual,
    /// Fired by the shared scheduler ticker
    Scheduled,
    /// Fired by matching bus events
    Event,
    /// Fired by inbound webhook deliveries
    Webhook,
}

/// Schedule shape for scheduled triggers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ScheduleType {
    /// Fixed interval
    Interval,
    /// Cron expression (minute-granularity heuristic until a real parser lands)
    Cron,
}

/// Schedule for a scheduled trigger.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Schedule {
    /// Interval or cron
    pub schedule_type: ScheduleType,
    /// Interval length for [`ScheduleType::Interval`]
    #[serde(default)]
    pub every: Option<Duration>,
    /// Cron expression for [`ScheduleType::Cron`]
    #[serde(default)]
    pub expression: Option<String>,
}

/// Trigger specification attached to a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TriggerSpec {
    /// Trigger kind
    pub trigger_type: TriggerType,
    /// Schedule, for scheduled triggers
    #[serde(default)]
    pub schedule: Option<Schedule>,
    /// Bus event type, for event triggers
    #[serde(default)]
    pub event_type: Option<EventType>,
    /// Conjunctive filters over the event payload
    #[serde(default)]
    pub filters: Vec<EventFilter>,
    /// Inbound route, for webhook triggers
    #[serde(default)]
    pub webhook_path: Option<String>,
}

impl TriggerSpec {
    /// A manual-only trigger.
    pub fn manual() -> Self {
        Self {
            trigger_type: TriggerType::Manual,
            schedule: None,
            event_type: None,
            filters: Vec::new(),
            webhook_path: None,
        }
    }

    /// An interval schedule trigger.
    pub fn every(interval: Duration) -> Self {
        Self {
            trigger_type: TriggerType::Scheduled,
            schedule: Some(Schedule {
                schedule_type: ScheduleType::Interval,
                every: Some(interval),
                expression: None,
            }),
            event_type: None,
            filters: Vec::new(),
            webhook_path: None,
        }
    }

    /// An event trigger for one bus event type.
    pub fn on_event(event_type: EventType) -> Self {
        Self {
            trigger_type: TriggerType::Event,
            schedule: None,
            event_type: Some(event_type),
            filters: Vec::new(),
            webhook_path: None,
        }
    }

    /// A webhook trigger on a route.
    pub fn webhook(path: impl Into<String>) -> Self {
        Self {
            trigger_type: TriggerType::Webhook,
            schedule: None,
            event_type: None,
            filters: Vec::new(),
            webhook_path: Some(path.into()),
        }
    }

    /// Add a payload filter.
    pub fn filter(
        mut self,
        field: impl Into<String>,
        operator: FilterOperator,
        value: serde_json::Value,
    ) -> Self {
        self.filters.push(EventFilter {
            field: field.into(),
            operator,
            value,
        });
        self
    }

    /// Check the trigger is fully specified for its type.
    pub fn validate(&self) -> DriftResult<()> {
        match self.trigger_type {
            TriggerType::Manual => Ok(()),
            TriggerType::Scheduled => match &self.schedule {
                Some(s) if s.every.is_some() || s.expression.is_some() => Ok(()),
                _ => Err(DriftError::Validation(
                    "scheduled trigger requires an interval or expression".to_string(),
                )),
            },
            TriggerType::Event => {
                if self.event_type.is_some() {
                    Ok(())
                } else {
                    Err(DriftError::Validation(
                        "event trigger requires an event type".to_string(),
                    ))
                }
            }
            TriggerType::Webhook => match &self.webhook_path {
                Some(p) if !p.is_empty() => Ok(()),
                _ => Err(DriftError::Validation(
                    "webhook trigger requires a path".to_string(),
                )),
            },
        }
    }
}

/// Workflow execution settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct WorkflowSettings {
    /// Stop at the first failed action
    #[serde(default = "default_true")]
    pub stop_on_error: bool,
    /// Re-attempt retryable action failures
    #[serde(default)]
    pub retry_on_failure: bool,
    /// Re-attempts per action when retrying
    #[serde(default = "default_max_retries")]
    pub max_retries: u32,
    /// Per-execution timeout override
    #[serde(default)]
    pub timeout: Option<Duration>,
}

fn default_true() -> bool {
    true
}

fn default_max_retries() -> u32 {
    3
}

impl Default for WorkflowSettings {
    fn default() -> Self {
        Self {
            stop_on_error: true,
            retry_on_failure: false,
            max_retries: 3,
            timeout: None,
        }
    }
}

/// A user-defined automation workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Workflow {
    /// Workflow id
    pub id: Uuid,
    /// Display name
    pub name: String,
    /// Description
    #[serde(default)]
    pub description: String,
    /// Ordered action list
    pub actions: Vec<Action>,
    /// Trigger specification
    pub trigger: TriggerSpec,
    /// Conditions over the execution input
    #[serde(default)]
    pub conditions: Vec<Condition>,
    /// Execution settings
    #[serde(default)]
    pub settings: WorkflowSettings,
    /// Lifecycle state
    pub status: WorkflowStatus,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// Last update timestamp
    pub updated_at: DateTime<Utc>,
}

impl Workflow {
    /// Create a draft workflow.
    pub fn new(name: impl Into<String>, actions: Vec<Action>, trigger: TriggerSpec) -> Self {
        let now = Utc::now();
        Self {
            id: Uuid::new_v4(),
            name: name.into(),
            description: String::new(),
            actions,
            trigger,
            conditions: Vec::new(),
            settings: WorkflowSettings::default(),
            status: WorkflowStatus::Draft,
            created_at: now,
            updated_at: now,
        }
    }

    /// Validate every action and the trigger spec.
    pub fn validate(&self) -> DriftResult<()> {
        if self.actions.is_empty() {
            return Err(DriftError::Validation(format!(
                "workflow '{}' has no actions",
                self.name
            )));
        }
        for action in &self.actions {
            action.validate()?;
        }
        self.trigger.validate()
    }
}

/// Execution lifecycle states. Terminal states are sinks.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ExecutionStatus {
    /// Created, not yet running
    Pending,
    /// Actions are being dispatched
    Running,
    /// Every action completed
    Completed,
    /// At least one action failed
    Failed,
    /// Cancelled before completion
    Cancelled,
}

impl ExecutionStatus {
    /// Whether this status is terminal.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            ExecutionStatus::Completed | ExecutionStatus::Failed | ExecutionStatus::Cancelled
        )
    }
}

/// Result status of one action.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ActionStatus {
    /// Action ran to success
    Completed,
    /// Action ran and failed
    Failed,
    /// Action never ran
    Skipped,
}

/// Result of one action, appended in declaration order.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ActionResult {
    /// Which action
    pub action_id: Uuid,
    /// Outcome
    pub status: ActionStatus,
    /// Action output
    pub output: serde_json::Value,
    /// Error text when failed or skipped
    #[serde(default)]
    pub error: Option<String>,
    /// How long the action ran
    pub execution_time: Duration,
}

/// One run of a workflow.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Execution {
    /// Execution id
    pub id: Uuid,
    /// Owning workflow
    pub workflow_id: Uuid,
    /// Lifecycle state
    pub status: ExecutionStatus,
    /// Caller-supplied input
    pub input: serde_json::Value,
    /// Ordered action results
    pub results: Vec<ActionResult>,
    /// Created timestamp
    pub created_at: DateTime<Utc>,
    /// When the first action started
    pub started_at: Option<DateTime<Utc>>,
    /// When a terminal state was reached
    pub completed_at: Option<DateTime<Utc>>,
}

impl Execution {
    /// Create a pending execution.
    pub fn new(workflow_id: Uuid, input: serde_json::Value) -> Self {
        Self {
            id: Uuid::new_v4(),
            workflow_id,
            status: ExecutionStatus::Pending,
            input,
            results: Vec::new(),
            created_at: Utc::now(),
            started_at: None,
            completed_at: None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_http_config_rejects_unknown_fields() {
        let action = Action::new(
            "call",
            ActionType::HttpCall,
            json!({ "url": "https://example.com", "verb": "GET" }),
        );
        assert!(action.validate().is_err());

        let ok = Action::new(
            "call",
            ActionType::HttpCall,
            json!({ "url": "https://example.com", "method": "POST" }),
        );
        assert!(ok.validate().is_ok());
    }

    #[test]
    fn test_script_config_requires_command() {
        let action = Action::new("run", ActionType::Script, json!({ "args": ["-v"] }));
        assert!(action.validate().is_err());
    }

    #[test]
    fn test_trigger_validation_per_type() {
        assert!(TriggerSpec::manual().validate().is_ok());
        assert!(TriggerSpec::every(Duration::from_secs(60)).validate().is_ok());
        assert!(TriggerSpec::on_event(EventType::ResourceFound).validate().is_ok());
        assert!(TriggerSpec::webhook("/hooks/deploy").validate().is_ok());

        let empty_scheduled = TriggerSpec {
            trigger_type: TriggerType::Scheduled,
            schedule: None,
            event_type: None,
            filters: Vec::new(),
            webhook_path: None,
        };
        assert!(empty_scheduled.validate().is_err());
    }

    #[test]
    fn test_filter_operators() {
        let data = json!({ "resource": { "type": "aws_instance", "count": 5 } });

        let eq = EventFilter {
            field: "resource.type".into(),
            operator: FilterOperator::Equals,
            value: json!("aws_instance"),
        };
        assert!(eq.matches(&data));

        let contains = EventFilter {
            field: "resource.type".into(),
            operator: FilterOperator::Contains,
            value: json!("instance"),
        };
        assert!(contains.matches(&data));

        let gt = EventFilter {
            field: "resource.count".into(),
            operator: FilterOperator::GreaterThan,
            value: json!(3),
        };
        assert!(gt.matches(&data));

        let lt = EventFilter {
            field: "resource.count".into(),
            operator: FilterOperator::LessThan,
            value: json!(3),
        };
        assert!(!lt.matches(&data));

        let missing = EventFilter {
            field: "resource.absent".into(),
            operator: FilterOperator::Equals,
            value: json!(1),
        };
        assert!(!missing.matches(&data));
    }

    #[test]
    fn test_workflow_without_actions_is_invalid() {
        let workflow = Workflow::new("empty", vec![], TriggerSpec::manual());
        assert!(workflow.validate().is_err());
    }

    #[test]
    fn test_action_type_identifiers() {
        assert_eq!(
            serde_json::to_string(&ActionType::InfrastructureTool).unwrap(),
            "\"infrastructure-tool\""
        );
        assert_eq!(
            serde_json::to_string(&ActionType::HttpCall).unwrap(),
            "\"http-call\""
        );
    }

    #[test]
    fn test_execution_terminal_states() {
        assert!(ExecutionStatus::Completed.is_terminal());
        assert!(ExecutionStatus::Cancelled.is_terminal());
        assert!(!ExecutionStatus::Running.is_terminal());
    }
}
