//! Convenient re-exports for embedders.
//!
//! ```rust,ignore
//! use driftkit::prelude::*;
//! ```

pub use crate::config::DriftConfig;
pub use crate::facade::{DriftKit, DriftKitBuilder};
pub use crate::plugins::{PluginConfig, PluginDescriptor};

pub use driftkit_spi::{
    CachedResource, DiscoveryFilter, DriftError, DriftResult, ErrorKind, Provider,
    ProviderAdapter, ProviderClient, RawResource, Resource, ResourceKey,
};

pub use driftkit_core::{
    DiscoveryJob, DiscoveryOutcome, DiscoveryResult, Event, EventBus, EventType, JobStatus,
};

pub use driftkit_automation::{
    Action, ActionResult, ActionStatus, ActionType, Execution, ExecutionStatus, TriggerSpec,
    TriggerType, Workflow, WorkflowSettings, WorkflowStatus,
};
