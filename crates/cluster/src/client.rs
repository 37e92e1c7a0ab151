//! The orchestrator API surface swarmwait consumes.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::types::{Node, Service, Task, TaskState};

/// Which tasks to list.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TaskFilter {
    pub service_id: String,
    /// Only tasks whose desired state is this one.
    pub desired_state: Option<TaskState>,
}

impl TaskFilter {
    /// All tasks of a service.
    pub fn service(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            desired_state: None,
        }
    }

    /// Tasks of a service that the orchestrator wants running.
    pub fn running(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            desired_state: Some(TaskState::Running),
        }
    }
}

/// Options for container removal.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct RemoveContainerOptions {
    /// Also remove anonymous volumes.
    pub remove_volumes: bool,
    /// Kill the container if it is still running.
    pub force: bool,
}

impl RemoveContainerOptions {
    /// Force removal including anonymous volumes.
    pub const fn forced() -> Self {
        Self {
            remove_volumes: true,
            force: true,
        }
    }
}

/// Client for the orchestrator API.
///
/// Implementations must be safe to share between tasks; swarmwait itself only
/// ever issues one call at a time per operation.
#[async_trait]
pub trait ClusterClient: Send + Sync {
    /// List tasks matching the filter.
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>>;

    /// List all cluster nodes.
    async fn list_nodes(&self) -> Result<Vec<Node>>;

    /// Fetch a service, including its update status.
    async fn inspect_service(&self, service_id: &str) -> Result<Service>;

    /// Remove a service.
    async fn remove_service(&self, service_id: &str) -> Result<()>;

    /// Remove a container.
    async fn remove_container(
        &self,
        container_id: &str,
        options: RemoveContainerOptions,
    ) -> Result<()>;

    /// Block until the container is removed, returning its exit code.
    async fn wait_container_removed(&self, container_id: &str) -> Result<i64>;
}
