//! Cluster records as observed through the orchestrator API.
//!
//! Every record here is a read-only snapshot fetched fresh on each poll.
//! Nothing in swarmwait mutates them; the orchestrator supersedes a task by
//! creating a new record for the same slot.

use std::fmt;
use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Task lifecycle states known to the orchestrator's scheduler.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum TaskState {
    New,
    Allocated,
    Pending,
    Assigned,
    Accepted,
    Preparing,
    Ready,
    Starting,
    Running,
    Complete,
    Shutdown,
    Failed,
    Rejected,
}

impl TaskState {
    /// Wire name of the state.
    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::New => "new",
            Self::Allocated => "allocated",
            Self::Pending => "pending",
            Self::Assigned => "assigned",
            Self::Accepted => "accepted",
            Self::Preparing => "preparing",
            Self::Ready => "ready",
            Self::Starting => "starting",
            Self::Running => "running",
            Self::Complete => "complete",
            Self::Shutdown => "shutdown",
            Self::Failed => "failed",
            Self::Rejected => "rejected",
        }
    }

    /// Parse a wire name. Returns `None` for states outside the lifecycle.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "new" => Some(Self::New),
            "allocated" => Some(Self::Allocated),
            "pending" => Some(Self::Pending),
            "assigned" => Some(Self::Assigned),
            "accepted" => Some(Self::Accepted),
            "preparing" => Some(Self::Preparing),
            "ready" => Some(Self::Ready),
            "starting" => Some(Self::Starting),
            "running" => Some(Self::Running),
            "complete" => Some(Self::Complete),
            "shutdown" => Some(Self::Shutdown),
            "failed" => Some(Self::Failed),
            "rejected" => Some(Self::Rejected),
            _ => None,
        }
    }
}

impl fmt::Display for TaskState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A state as the orchestrator reported it.
///
/// The orchestrator reports states this crate does not order (for example
/// `remove` or `orphaned`). They are carried as `Unknown` rather than
/// rejected so the slot resolver can drop those tasks deliberately.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(from = "String", into = "String")]
pub enum ReportedState {
    Known(TaskState),
    Unknown(String),
}

impl ReportedState {
    /// The lifecycle state, if this is one.
    pub const fn known(&self) -> Option<TaskState> {
        match self {
            Self::Known(state) => Some(*state),
            Self::Unknown(_) => None,
        }
    }

    /// Whether this is exactly `state`.
    pub fn is(&self, state: TaskState) -> bool {
        self.known() == Some(state)
    }

    pub fn as_str(&self) -> &str {
        match self {
            Self::Known(state) => state.as_str(),
            Self::Unknown(raw) => raw,
        }
    }
}

impl From<TaskState> for ReportedState {
    fn from(state: TaskState) -> Self {
        Self::Known(state)
    }
}

impl From<String> for ReportedState {
    fn from(raw: String) -> Self {
        TaskState::parse(&raw).map_or(Self::Unknown(raw), Self::Known)
    }
}

impl From<&str> for ReportedState {
    fn from(raw: &str) -> Self {
        Self::from(raw.to_string())
    }
}

impl From<ReportedState> for String {
    fn from(state: ReportedState) -> Self {
        match state {
            ReportedState::Known(state) => state.as_str().to_string(),
            ReportedState::Unknown(raw) => raw,
        }
    }
}

impl fmt::Display for ReportedState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// One scheduling attempt for one replica slot.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Task {
    pub id: String,
    pub service_id: String,
    pub slot: u64,
    /// Assigned node; empty while unassigned.
    pub node_id: String,
    pub desired_state: ReportedState,
    pub observed_state: ReportedState,
    /// Backing container, once the orchestrator has created one.
    pub container_id: Option<String>,
    pub message: String,
}

impl Task {
    /// Create an unassigned task.
    pub fn new(
        id: impl Into<String>,
        slot: u64,
        desired_state: impl Into<ReportedState>,
        observed_state: impl Into<ReportedState>,
    ) -> Self {
        Self {
            id: id.into(),
            service_id: String::new(),
            slot,
            node_id: String::new(),
            desired_state: desired_state.into(),
            observed_state: observed_state.into(),
            container_id: None,
            message: String::new(),
        }
    }

    #[must_use]
    pub fn on_node(mut self, node_id: impl Into<String>) -> Self {
        self.node_id = node_id.into();
        self
    }

    #[must_use]
    pub fn for_service(mut self, service_id: impl Into<String>) -> Self {
        self.service_id = service_id.into();
        self
    }

    #[must_use]
    pub fn with_container(mut self, container_id: impl Into<String>) -> Self {
        self.container_id = Some(container_id.into());
        self
    }

    /// The container id, if non-blank.
    pub fn container(&self) -> Option<&str> {
        self.container_id
            .as_deref()
            .map(str::trim)
            .filter(|id| !id.is_empty())
    }
}

/// Node availability as reported by the orchestrator.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NodeState {
    Down,
    Ready,
    Disconnected,
    #[default]
    #[serde(other)]
    Unknown,
}

/// A cluster member.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Node {
    pub id: String,
    pub state: NodeState,
}

impl Node {
    pub fn new(id: impl Into<String>, state: NodeState) -> Self {
        Self {
            id: id.into(),
            state,
        }
    }

    /// A ready node.
    pub fn ready(id: impl Into<String>) -> Self {
        Self::new(id, NodeState::Ready)
    }

    /// A node that is down.
    pub fn down(id: impl Into<String>) -> Self {
        Self::new(id, NodeState::Down)
    }

    /// Only nodes reported `down` are excluded; the orchestrator may still
    /// run tasks on nodes in any other state.
    pub fn is_active(&self) -> bool {
        self.state != NodeState::Down
    }
}

/// Rollout progress of a service update.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum RolloutState {
    Updating,
    Paused,
    Completed,
    RollbackStarted,
    RollbackPaused,
    RollbackCompleted,
}

impl RolloutState {
    /// Parse a wire name. Returns `None` for anything else, including the
    /// empty string some daemons send before an update starts.
    pub fn parse(raw: &str) -> Option<Self> {
        match raw {
            "updating" => Some(Self::Updating),
            "paused" => Some(Self::Paused),
            "completed" => Some(Self::Completed),
            "rollback_started" => Some(Self::RollbackStarted),
            "rollback_paused" => Some(Self::RollbackPaused),
            "rollback_completed" => Some(Self::RollbackCompleted),
            _ => None,
        }
    }

    pub const fn as_str(&self) -> &'static str {
        match self {
            Self::Updating => "updating",
            Self::Paused => "paused",
            Self::Completed => "completed",
            Self::RollbackStarted => "rollback_started",
            Self::RollbackPaused => "rollback_paused",
            Self::RollbackCompleted => "rollback_completed",
        }
    }
}

impl fmt::Display for RolloutState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Update status attached to a service while (and after) it is updated.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateStatus {
    pub state: RolloutState,
    pub message: String,
}

/// Scheduling mode of a service.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ServiceMode {
    Replicated { replicas: Option<u64> },
    Global,
    Job,
}

/// The declarative object being converged.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Service {
    pub id: String,
    pub name: String,
    pub mode: ServiceMode,
    pub update_status: Option<UpdateStatus>,
    /// Graceful stop period of the task template's container spec.
    pub stop_grace_period: Option<Duration>,
}

impl Service {
    /// A replicated service with the given replica count.
    pub fn replicated(id: impl Into<String>, replicas: u64) -> Self {
        Self::with_mode(id, ServiceMode::Replicated {
            replicas: Some(replicas),
        })
    }

    pub fn with_mode(id: impl Into<String>, mode: ServiceMode) -> Self {
        let id = id.into();
        Self {
            name: id.clone(),
            id,
            mode,
            update_status: None,
            stop_grace_period: None,
        }
    }

    #[must_use]
    pub fn with_update_status(mut self, state: RolloutState, message: impl Into<String>) -> Self {
        self.update_status = Some(UpdateStatus {
            state,
            message: message.into(),
        });
        self
    }

    #[must_use]
    pub const fn with_stop_grace_period(mut self, period: Duration) -> Self {
        self.stop_grace_period = Some(period);
        self
    }

    /// Desired replica count; `None` unless the service is replicated with
    /// an explicit count.
    pub const fn replicas(&self) -> Option<u64> {
        match self.mode {
            ServiceMode::Replicated { replicas } => replicas,
            ServiceMode::Global | ServiceMode::Job => None,
        }
    }

    /// Current rollout state, if an update has been recorded.
    pub fn rollout_state(&self) -> Option<RolloutState> {
        self.update_status.as_ref().map(|status| status.state)
    }

    /// The update status message, or an empty string.
    pub fn update_message(&self) -> &str {
        self.update_status
            .as_ref()
            .map_or("", |status| status.message.as_str())
    }

    /// Non-zero graceful stop period, if any.
    pub fn grace_period(&self) -> Option<Duration> {
        self.stop_grace_period.filter(|period| !period.is_zero())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_reported_state_parses_known_and_unknown() {
        assert_eq!(
            ReportedState::from("running"),
            ReportedState::Known(TaskState::Running)
        );
        assert_eq!(
            ReportedState::from("orphaned"),
            ReportedState::Unknown("orphaned".to_string())
        );
        assert!(ReportedState::from("shutdown").is(TaskState::Shutdown));
    }

    #[test]
    fn test_reported_state_serde_round_trip_keeps_raw_value() {
        let json = serde_json::to_string(&ReportedState::from("remove"));
        assert_eq!(json.ok().as_deref(), Some("\"remove\""));
        let parsed: Result<ReportedState, _> = serde_json::from_str("\"starting\"");
        assert_eq!(parsed.ok(), Some(ReportedState::Known(TaskState::Starting)));
    }

    #[test]
    fn test_node_activity() {
        assert!(Node::ready("n1").is_active());
        assert!(Node::new("n2", NodeState::Disconnected).is_active());
        assert!(Node::new("n3", NodeState::Unknown).is_active());
        assert!(!Node::down("n4").is_active());
    }

    #[test]
    fn test_service_replicas() {
        assert_eq!(Service::replicated("svc", 3).replicas(), Some(3));
        assert_eq!(Service::with_mode("svc", ServiceMode::Global).replicas(), None);
        assert_eq!(
            Service::with_mode("svc", ServiceMode::Replicated { replicas: None }).replicas(),
            None
        );
    }

    #[test]
    fn test_service_grace_period_ignores_zero() {
        let service = Service::replicated("svc", 1).with_stop_grace_period(Duration::ZERO);
        assert_eq!(service.grace_period(), None);
        let service = service.with_stop_grace_period(Duration::from_secs(10));
        assert_eq!(service.grace_period(), Some(Duration::from_secs(10)));
    }

    #[test]
    fn test_task_container_ignores_blank_ids() {
        let task = Task::new("t1", 1, TaskState::Running, TaskState::Running).with_container("  ");
        assert_eq!(task.container(), None);
        let task = task.with_container("abc");
        assert_eq!(task.container(), Some("abc"));
    }

    #[test]
    fn test_rollout_state_parse() {
        assert_eq!(
            RolloutState::parse("rollback_started"),
            Some(RolloutState::RollbackStarted)
        );
        assert_eq!(RolloutState::parse(""), None);
    }
}
