//! Typed event bus with bounded per-subscriber channels.

use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::mpsc;
use uuid::Uuid;

/// Default per-subscriber channel capacity.
pub const DEFAULT_SUBSCRIBER_CAPACITY: usize = 100;

/// Stable event type identifiers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum EventType {
    /// A workflow was created
    WorkflowCreated,
    /// A workflow was updated
    WorkflowUpdated,
    /// A workflow was deleted
    WorkflowDeleted,
    /// A workflow transitioned to active
    WorkflowActivated,
    /// A workflow left active
    WorkflowDeactivated,
    /// An execution started running
    ExecutionStarted,
    /// An execution completed successfully
    ExecutionCompleted,
    /// An execution failed
    ExecutionFailed,
    /// An execution was cancelled
    ExecutionCancelled,
    /// Discovery observed a resource
    ResourceFound,
    /// A discovery cycle started
    DiscoveryStarted,
    /// A discovery cycle completed
    DiscoveryCompleted,
    /// A discovery cycle failed
    DiscoveryFailed,
    /// Unexpected internal error
    SystemError,
    /// Recoverable anomaly
    SystemWarning,
    /// Operator-facing alert
    Alert,
}

impl fmt::Display for EventType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            EventType::WorkflowCreated => "workflow-created",
            EventType::WorkflowUpdated => "workflow-updated",
            EventType::WorkflowDeleted => "workflow-deleted",
            EventType::WorkflowActivated => "workflow-activated",
            EventType::WorkflowDeactivated => "workflow-deactivated",
            EventType::ExecutionStarted => "execution-started",
            EventType::ExecutionCompleted => "execution-completed",
            EventType::ExecutionFailed => "execution-failed",
            EventType::ExecutionCancelled => "execution-cancelled",
            EventType::ResourceFound => "resource-found",
            EventType::DiscoveryStarted => "discovery-started",
            EventType::DiscoveryCompleted => "discovery-completed",
            EventType::DiscoveryFailed => "discovery-failed",
            EventType::SystemError => "system-error",
            EventType::SystemWarning => "system-warning",
            EventType::Alert => "alert",
        };
        write!(f, "{}", s)
    }
}

/// One event delivered by value to every subscriber.
///
/// Subscribers receive clones and must not treat the payload as shared
/// mutable state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Event {
    /// Unique event id
    pub id: Uuid,
    /// Event type
    pub event_type: EventType,
    /// Related workflow, if any
    pub workflow_id: Option<Uuid>,
    /// Related execution, if any
    pub execution_id: Option<Uuid>,
    /// When the event was published
    pub timestamp: DateTime<Utc>,
    /// Free-form payload
    pub data: serde_json::Value,
}

impl Event {
    /// Create an event with an empty payload.
    pub fn new(event_type: EventType) -> Self {
        Self {
            id: Uuid::new_v4(),
            event_type,
            workflow_id: None,
            execution_id: None,
            timestamp: Utc::now(),
            data: serde_json::Value::Null,
        }
    }

    /// Attach a workflow id.
    pub fn with_workflow(mut self, id: Uuid) -> Self {
        self.workflow_id = Some(id);
        self
    }

    /// Attach an execution id.
    pub fn with_execution(mut self, id: Uuid) -> Self {
        self.execution_id = Some(id);
        self
    }

    /// Attach a payload.
    pub fn with_data(mut self, data: serde_json::Value) -> Self {
        self.data = data;
        self
    }
}

struct Subscriber {
    sender: mpsc::Sender<Event>,
    dropped: AtomicU64,
}

/// Publish/subscribe bus for discovery and automation events.
///
/// Delivery is at-least-once per subscriber, FIFO per publisher thread.
/// When a subscriber's channel is full the event is dropped for that
/// subscriber and counted; drops are logged aggregated per publish call.
pub struct EventBus {
    subscribers: RwLock<HashMap<EventType, Vec<Subscriber>>>,
    dropped_total: AtomicU64,
    published_total: AtomicU64,
}

impl EventBus {
    /// Create an empty bus.
    pub fn new() -> Self {
        Self {
            subscribers: RwLock::new(HashMap::new()),
            dropped_total: AtomicU64::new(0),
            published_total: AtomicU64::new(0),
        }
    }

    /// Subscribe to one event type with the default channel capacity.
    pub fn subscribe(&self, event_type: EventType) -> mpsc::Receiver<Event> {
        self.subscribe_with_capacity(event_type, DEFAULT_SUBSCRIBER_CAPACITY)
    }

    /// Subscribe to one event type with an explicit channel capacity.
    pub fn subscribe_with_capacity(
        &self,
        event_type: EventType,
        capacity: usize,
    ) -> mpsc::Receiver<Event> {
        let (sender, receiver) = mpsc::channel(capacity.max(1));
        self.subscribers
            .write()
            .entry(event_type)
            .or_default()
            .push(Subscriber {
                sender,
                dropped: AtomicU64::new(0),
            });
        receiver
    }

    /// Subscribe to several event types over one channel.
    pub fn subscribe_many(&self, event_types: &[EventType]) -> mpsc::Receiver<Event> {
        let (sender, receiver) = mpsc::channel(DEFAULT_SUBSCRIBER_CAPACITY);
        let mut subscribers = self.subscribers.write();
        for event_type in event_types {
            subscribers.entry(*event_type).or_default().push(Subscriber {
                sender: sender.clone(),
                dropped: AtomicU64::new(0),
            });
        }
        receiver
    }

    /// Publish an event to every matching subscriber.
    ///
    /// Returns the number of subscribers that received the event.
    pub fn publish(&self, event: Event) -> usize {
        self.published_total.fetch_add(1, Ordering::Relaxed);

        let mut delivered = 0;
        let mut dropped = 0;
        let mut any_closed = false;
        {
            let subscribers = self.subscribers.read();
            if let Some(list) = subscribers.get(&event.event_type) {
                for subscriber in list {
                    match subscriber.sender.try_send(event.clone()) {
                        Ok(()) => delivered += 1,
                        Err(mpsc::error::TrySendError::Full(_)) => {
                            subscriber.dropped.fetch_add(1, Ordering::Relaxed);
                            dropped += 1;
                        }
                        Err(mpsc::error::TrySendError::Closed(_)) => any_closed = true,
                    }
                }
            }
        }

        if dropped > 0 {
            self.dropped_total.fetch_add(dropped, Ordering::Relaxed);
            tracing::warn!(
                event_type = %event.event_type,
                dropped,
                "subscriber channels full, event dropped"
            );
        }
        if any_closed {
            self.prune_closed();
        }
        delivered
    }

    /// Total events dropped across all subscribers.
    pub fn dropped_total(&self) -> u64 {
        self.dropped_total.load(Ordering::Relaxed)
    }

    /// Total publish calls.
    pub fn published_total(&self) -> u64 {
        self.published_total.load(Ordering::Relaxed)
    }

    /// Number of live subscriptions for one event type.
    pub fn subscriber_count(&self, event_type: EventType) -> usize {
        self.subscribers
            .read()
            .get(&event_type)
            .map(|l| l.len())
            .unwrap_or(0)
    }

    fn prune_closed(&self) {
        let mut subscribers = self.subscribers.write();
        for list in subscribers.values_mut() {
            list.retain(|s| !s.sender.is_closed());
        }
        subscribers.retain(|_, list| !list.is_empty());
    }
}

impl Default for EventBus {
    fn default() -> Self {
        Self::new()
    }
}
