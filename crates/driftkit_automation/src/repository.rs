//! Persistence contracts for workflows and executions.
//!
//! The durable store is an external collaborator; the engine only
//! requires that each operation is atomic at the granularity of one
//! entity. The in-memory implementations back tests and the default
//! facade wiring.

use crate::model::{Execution, Workflow};
use async_trait::async_trait;
use driftkit_spi::DriftResult;
use std::collections::HashMap;
use tokio::sync::RwLock;
use uuid::Uuid;

/// Store for workflow definitions.
#[async_trait]
pub trait WorkflowRepository: Send + Sync {
    /// Insert or replace a workflow.
    async fn save(&self, workflow: Workflow) -> DriftResult<()>;

    /// Fetch a workflow by id.
    async fn get(&self, id: Uuid) -> DriftResult<Option<Workflow>>;

    /// All workflows.
    async fn list(&self) -> DriftResult<Vec<Workflow>>;

    /// Remove a workflow. Returns whether it existed.
    async fn delete(&self, id: Uuid) -> DriftResult<bool>;
}

/// Store for execution records.
#[async_trait]
pub trait ExecutionRepository: Send + Sync {
    /// Insert or replace an execution.
    async fn save(&self, execution: Execution) -> DriftResult<()>;

    /// Fetch an execution by id.
    async fn get(&self, id: Uuid) -> DriftResult<Option<Execution>>;

    /// Executions belonging to one workflow.
    async fn list_for_workflow(&self, workflow_id: Uuid) -> DriftResult<Vec<Execution>>;
}

/// In-memory workflow store.
#[derive(Default)]
pub struct InMemoryWorkflowRepository {
    items: RwLock<HashMap<Uuid, Workflow>>,
}

impl InMemoryWorkflowRepository {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl WorkflowRepository for InMemoryWorkflowRepository {
    async fn save(&self, workflow: Workflow) -> DriftResult<()> {
        self.items.write().await.insert(workflow.id, workflow);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DriftResult<Option<Workflow>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn list(&self) -> DriftResult<Vec<Workflow>> {
        Ok(self.items.read().await.values().cloned().collect())
    }

    async fn delete(&self, id: Uuid) -> DriftResult<bool> {
        Ok(self.items.write().await.remove(&id).is_some())
    }
}

/// In-memory execution store.
#[derive(Default)]
pub struct InMemoryExecutionRepository {
    items: RwLock<HashMap<Uuid, Execution>>,
}

impl InMemoryExecutionRepository {
    /// Create an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl ExecutionRepository for InMemoryExecutionRepository {
    async fn save(&self, execution: Execution) -> DriftResult<()> {
        self.items.write().await.insert(execution.id, execution);
        Ok(())
    }

    async fn get(&self, id: Uuid) -> DriftResult<Option<Execution>> {
        Ok(self.items.read().await.get(&id).cloned())
    }

    async fn list_for_workflow(&self, workflow_id: Uuid) -> DriftResult<Vec<Execution>> {
        Ok(self
            .items
            .read()
            .await
            .values()
            .filter(|e| e.workflow_id == workflow_id)
            .cloned()
            .collect())
    }
}
