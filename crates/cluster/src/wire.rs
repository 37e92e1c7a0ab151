//! Docker Engine API payloads and their conversion into cluster records.
//!
//! Only the fields swarmwait reads are modelled; everything else in the
//! daemon's responses is ignored.

use std::time::Duration;

use serde::Deserialize;

use crate::types::{
    Node, NodeState, ReportedState, RolloutState, Service, ServiceMode, Task, UpdateStatus,
};

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct TaskDto {
    #[serde(rename = "ID")]
    id: String,
    #[serde(rename = "ServiceID", default)]
    service_id: String,
    #[serde(default)]
    slot: u64,
    #[serde(rename = "NodeID", default)]
    node_id: String,
    #[serde(default)]
    desired_state: String,
    #[serde(default)]
    status: TaskStatusDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskStatusDto {
    #[serde(default)]
    state: String,
    #[serde(default)]
    message: String,
    #[serde(default)]
    container_status: Option<ContainerStatusDto>,
}

#[derive(Debug, Deserialize)]
struct ContainerStatusDto {
    #[serde(rename = "ContainerID", default)]
    container_id: String,
}

impl From<TaskDto> for Task {
    fn from(dto: TaskDto) -> Self {
        let container_id = dto
            .status
            .container_status
            .map(|status| status.container_id)
            .filter(|id| !id.trim().is_empty());

        Self {
            id: dto.id,
            service_id: dto.service_id,
            slot: dto.slot,
            node_id: dto.node_id,
            desired_state: ReportedState::from(dto.desired_state),
            observed_state: ReportedState::from(dto.status.state),
            container_id,
            message: dto.status.message,
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct NodeDto {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    status: NodeStatusDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct NodeStatusDto {
    #[serde(default)]
    state: NodeState,
}

impl From<NodeDto> for Node {
    fn from(dto: NodeDto) -> Self {
        Self::new(dto.id, dto.status.state)
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct ServiceDto {
    #[serde(rename = "ID")]
    id: String,
    #[serde(default)]
    spec: ServiceSpecDto,
    #[serde(default)]
    update_status: Option<UpdateStatusDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ServiceSpecDto {
    #[serde(default)]
    name: String,
    #[serde(default)]
    mode: ModeDto,
    #[serde(default)]
    task_template: TaskTemplateDto,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ModeDto {
    #[serde(default)]
    replicated: Option<ReplicatedDto>,
    #[serde(default)]
    global: Option<serde_json::Value>,
    #[serde(default)]
    replicated_job: Option<serde_json::Value>,
    #[serde(default)]
    global_job: Option<serde_json::Value>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ReplicatedDto {
    #[serde(default)]
    replicas: Option<u64>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct TaskTemplateDto {
    #[serde(default)]
    container_spec: Option<ContainerSpecDto>,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct ContainerSpecDto {
    /// Nanoseconds.
    #[serde(default)]
    stop_grace_period: Option<i64>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
struct UpdateStatusDto {
    #[serde(default)]
    state: String,
    #[serde(default)]
    message: String,
}

impl From<ServiceDto> for Service {
    fn from(dto: ServiceDto) -> Self {
        let mode = match dto.spec.mode {
            ModeDto {
                replicated: Some(replicated),
                ..
            } => ServiceMode::Replicated {
                replicas: replicated.replicas,
            },
            ModeDto {
                global: Some(_), ..
            } => ServiceMode::Global,
            ModeDto {
                replicated_job: Some(_),
                ..
            }
            | ModeDto {
                global_job: Some(_),
                ..
            } => ServiceMode::Job,
            // The daemon defaults an omitted mode to replicated.
            _ => ServiceMode::Replicated { replicas: None },
        };

        let update_status = dto.update_status.and_then(|status| {
            RolloutState::parse(&status.state).map(|state| UpdateStatus {
                state,
                message: status.message,
            })
        });

        let stop_grace_period = dto
            .spec
            .task_template
            .container_spec
            .and_then(|spec| spec.stop_grace_period)
            .and_then(|nanos| u64::try_from(nanos).ok())
            .map(Duration::from_nanos);

        Self {
            id: dto.id,
            name: dto.spec.name,
            mode,
            update_status,
            stop_grace_period,
        }
    }
}

/// Body of `POST /containers/{id}/wait`.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WaitResponseDto {
    pub status_code: i64,
    #[serde(default)]
    pub error: Option<WaitErrorDto>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub(crate) struct WaitErrorDto {
    #[serde(default)]
    pub message: String,
}

/// Error body the daemon sends with non-2xx responses.
#[derive(Debug, Deserialize)]
pub(crate) struct ErrorBodyDto {
    pub message: String,
}
