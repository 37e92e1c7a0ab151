//! In-memory cluster for tests and dry runs.
//!
//! The cluster replays a script of snapshot frames. Each `inspect_service`
//! call moves to the next frame (the last frame repeats forever), and the
//! task and node listings that follow read from the frame last inspected.
//! That mirrors the poll order: service first, then tasks, then nodes.

use std::collections::{HashMap, HashSet, VecDeque};
use std::sync::{Mutex, MutexGuard, PoisonError};

use async_trait::async_trait;

use crate::client::{ClusterClient, RemoveContainerOptions, TaskFilter};
use crate::error::{Error, Result};
use crate::types::{Node, Service, Task};

/// One observation of the cluster.
#[derive(Debug, Clone, Default)]
pub struct ClusterFrame {
    pub service: Option<Service>,
    pub tasks: Vec<Task>,
    pub nodes: Vec<Node>,
}

impl ClusterFrame {
    pub fn new(service: Service) -> Self {
        Self {
            service: Some(service),
            tasks: Vec::new(),
            nodes: Vec::new(),
        }
    }

    /// A frame in which the service does not exist.
    pub fn missing() -> Self {
        Self::default()
    }

    #[must_use]
    pub fn with_task(mut self, task: Task) -> Self {
        self.tasks.push(task);
        self
    }

    #[must_use]
    pub fn with_tasks(mut self, tasks: impl IntoIterator<Item = Task>) -> Self {
        self.tasks.extend(tasks);
        self
    }

    #[must_use]
    pub fn with_node(mut self, node: Node) -> Self {
        self.nodes.push(node);
        self
    }

    #[must_use]
    pub fn with_nodes(mut self, nodes: impl IntoIterator<Item = Node>) -> Self {
        self.nodes.extend(nodes);
        self
    }
}

/// API operations, for failure injection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Operation {
    ListTasks,
    ListNodes,
    InspectService,
    RemoveService,
    RemoveContainer,
    WaitContainerRemoved,
}

/// A recorded API call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ClusterCall {
    ListTasks(TaskFilter),
    ListNodes,
    InspectService(String),
    RemoveService(String),
    RemoveContainer(String, RemoveContainerOptions),
    WaitContainerRemoved(String),
}

/// How a container reacts to a removal wait.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ContainerBehavior {
    /// Exits and is removed by the orchestrator with this code.
    Exits(i64),
    /// Never goes away on its own.
    Lingers,
}

#[derive(Debug, Default)]
struct State {
    frames: Vec<ClusterFrame>,
    inspections: usize,
    removed_services: HashSet<String>,
    containers: HashMap<String, ContainerBehavior>,
    removed_containers: Vec<String>,
    failures: HashMap<Operation, VecDeque<Error>>,
    calls: Vec<ClusterCall>,
}

impl State {
    /// Frame the listings read: the one last handed out by inspection.
    fn current_frame(&self) -> Option<&ClusterFrame> {
        let index = self.inspections.saturating_sub(1);
        self.frames.get(index).or_else(|| self.frames.last())
    }

    fn take_failure(&mut self, operation: Operation) -> Result<()> {
        match self
            .failures
            .get_mut(&operation)
            .and_then(VecDeque::pop_front)
        {
            Some(err) => Err(err),
            None => Ok(()),
        }
    }
}

/// Scripted [`ClusterClient`].
#[derive(Debug, Default)]
pub struct InMemoryCluster {
    state: Mutex<State>,
}

impl InMemoryCluster {
    /// A cluster that replays `frames` in order.
    pub fn scripted(frames: impl IntoIterator<Item = ClusterFrame>) -> Self {
        Self {
            state: Mutex::new(State {
                frames: frames.into_iter().collect(),
                ..State::default()
            }),
        }
    }

    /// A cluster that always shows the same frame.
    pub fn single(frame: ClusterFrame) -> Self {
        Self::scripted([frame])
    }

    fn lock(&self) -> MutexGuard<'_, State> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Append a frame to the script.
    pub fn push_frame(&self, frame: ClusterFrame) {
        self.lock().frames.push(frame);
    }

    /// Register a container and how it behaves when waited on.
    pub fn add_container(&self, container_id: impl Into<String>, behavior: ContainerBehavior) {
        self.lock().containers.insert(container_id.into(), behavior);
    }

    /// Fail the next call of `operation` with `err`. Failures queue up.
    pub fn fail_next(&self, operation: Operation, err: Error) {
        self.lock()
            .failures
            .entry(operation)
            .or_default()
            .push_back(err);
    }

    /// Every call made so far, in order.
    pub fn calls(&self) -> Vec<ClusterCall> {
        self.lock().calls.clone()
    }

    /// Number of service inspections so far, i.e. polls started.
    pub fn inspections(&self) -> usize {
        self.lock().inspections
    }

    pub fn removed_services(&self) -> Vec<String> {
        let mut removed: Vec<String> = self.lock().removed_services.iter().cloned().collect();
        removed.sort();
        removed
    }

    pub fn removed_containers(&self) -> Vec<String> {
        self.lock().removed_containers.clone()
    }

    pub fn container_exists(&self, container_id: &str) -> bool {
        self.lock().containers.contains_key(container_id)
    }
}

#[async_trait]
impl ClusterClient for InMemoryCluster {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut state = self.lock();
        state.calls.push(ClusterCall::ListTasks(filter.clone()));
        state.take_failure(Operation::ListTasks)?;

        if state.removed_services.contains(&filter.service_id) {
            return Ok(Vec::new());
        }

        let tasks = state
            .current_frame()
            .map(|frame| {
                frame
                    .tasks
                    .iter()
                    .filter(|task| {
                        task.service_id.is_empty() || task.service_id == filter.service_id
                    })
                    .filter(|task| {
                        filter
                            .desired_state
                            .is_none_or(|desired| task.desired_state.is(desired))
                    })
                    .cloned()
                    .collect()
            })
            .unwrap_or_default();
        Ok(tasks)
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let mut state = self.lock();
        state.calls.push(ClusterCall::ListNodes);
        state.take_failure(Operation::ListNodes)?;

        Ok(state
            .current_frame()
            .map(|frame| frame.nodes.clone())
            .unwrap_or_default())
    }

    async fn inspect_service(&self, service_id: &str) -> Result<Service> {
        let mut state = self.lock();
        state
            .calls
            .push(ClusterCall::InspectService(service_id.to_string()));
        state.take_failure(Operation::InspectService)?;
        state.inspections = state.inspections.saturating_add(1);

        if state.removed_services.contains(service_id) {
            return Err(Error::not_found(format!("service {service_id} not found")));
        }

        state
            .current_frame()
            .and_then(|frame| frame.service.clone())
            .filter(|service| service.id == service_id)
            .ok_or_else(|| Error::not_found(format!("service {service_id} not found")))
    }

    async fn remove_service(&self, service_id: &str) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(ClusterCall::RemoveService(service_id.to_string()));
        state.take_failure(Operation::RemoveService)?;

        let known = state
            .frames
            .iter()
            .filter_map(|frame| frame.service.as_ref())
            .any(|service| service.id == service_id);
        if !known || !state.removed_services.insert(service_id.to_string()) {
            return Err(Error::not_found(format!("service {service_id} not found")));
        }
        Ok(())
    }

    async fn remove_container(
        &self,
        container_id: &str,
        options: RemoveContainerOptions,
    ) -> Result<()> {
        let mut state = self.lock();
        state
            .calls
            .push(ClusterCall::RemoveContainer(container_id.to_string(), options));
        state.take_failure(Operation::RemoveContainer)?;

        if state.containers.remove(container_id).is_none() {
            return Err(Error::not_found(format!(
                "No such container: {container_id}"
            )));
        }
        state.removed_containers.push(container_id.to_string());
        Ok(())
    }

    async fn wait_container_removed(&self, container_id: &str) -> Result<i64> {
        let behavior = {
            let mut state = self.lock();
            state
                .calls
                .push(ClusterCall::WaitContainerRemoved(container_id.to_string()));
            state.take_failure(Operation::WaitContainerRemoved)?;

            match state.containers.get(container_id).copied() {
                None => {
                    return Err(Error::not_found(format!(
                        "No such container: {container_id}"
                    )));
                }
                Some(ContainerBehavior::Exits(code)) => {
                    state.containers.remove(container_id);
                    Some(code)
                }
                Some(ContainerBehavior::Lingers) => None,
            }
        };

        match behavior {
            Some(code) => Ok(code),
            None => std::future::pending().await,
        }
    }
}
