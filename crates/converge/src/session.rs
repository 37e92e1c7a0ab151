//! Per-operation convergence bookkeeping.
//!
//! A [`ConvergenceSession`] lives for exactly one create or update wait. It
//! resolves each observation into slots, counts satisfied replicas, and
//! tracks whether convergence has been reached, revoking it if a slot
//! falls out of `running` again.

use std::collections::HashMap;
use std::fmt;

use swarmwait_cluster::{Node, ReportedState, Service, Task, TaskState};
use tracing::{debug, info};

use crate::error::{Error, Result};
use crate::order::StateRank;
use crate::slots::{ActiveNodes, SlotMap};

/// Whether a resolved task counts towards the replica target: the
/// orchestrator still wants it alive and it is observed running.
pub fn is_satisfied(task: &Task) -> bool {
    let wanted = StateRank::of_reported(&task.desired_state)
        .is_some_and(|rank| !rank.is_terminal());
    wanted && task.observed_state.is(TaskState::Running)
}

/// Number of resolved slots that count towards the replica target.
pub fn count_running(slots: &SlotMap) -> u64 {
    slots
        .tasks()
        .filter(|task| is_satisfied(task))
        .fold(0_u64, |count, _| count.saturating_add(1))
}

/// One slot's line in a progress report.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SlotProgress {
    /// Stable 1-based position, assigned the first time the slot is seen.
    pub index: usize,
    pub slot: u64,
    pub task_id: String,
    pub node_id: String,
    pub desired_state: ReportedState,
    pub observed_state: ReportedState,
    pub message: String,
}

impl fmt::Display for SlotProgress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "{}/{}: {} ({} -> {})",
            self.index, self.slot, self.task_id, self.observed_state, self.desired_state
        )?;
        if !self.message.is_empty() {
            write!(f, " {}", self.message)?;
        }
        Ok(())
    }
}

/// Result of evaluating one observation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Progress {
    pub service_id: String,
    pub running: u64,
    pub desired: u64,
    pub rollback: bool,
    /// Slots ordered by display index.
    pub slots: Vec<SlotProgress>,
}

impl Progress {
    /// Whether the satisfied count matches the replica target.
    pub const fn is_converged(&self) -> bool {
        self.running == self.desired
    }
}

impl fmt::Display for Progress {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(
            f,
            "progress: [{}/{}] - rollback: {}",
            self.running, self.desired, self.rollback
        )
    }
}

/// Bookkeeping for one convergence wait.
#[derive(Debug, Clone, Default)]
pub struct ConvergenceSession {
    service_id: String,
    slot_display: HashMap<u64, usize>,
    initialized: bool,
    done: bool,
}

impl ConvergenceSession {
    pub fn new(service_id: impl Into<String>) -> Self {
        Self {
            service_id: service_id.into(),
            ..Self::default()
        }
    }

    pub fn service_id(&self) -> &str {
        &self.service_id
    }

    /// Whether at least one observation has been evaluated.
    pub const fn is_initialized(&self) -> bool {
        self.initialized
    }

    /// Whether convergence was reached and has not been revoked since.
    pub const fn is_done(&self) -> bool {
        self.done
    }

    /// Evaluate one observation of the service.
    ///
    /// `tasks` is the listing of tasks the orchestrator wants running and
    /// `nodes` the full node listing. A slot that stops running revokes
    /// [`Self::is_done`], which only matters to callers that keep observing
    /// after convergence.
    ///
    /// # Errors
    ///
    /// Returns [`Error::NoReplicaCount`] if the service is not replicated
    /// with an explicit replica count.
    pub fn observe(
        &mut self,
        service: &Service,
        tasks: Vec<Task>,
        nodes: &[Node],
        rollback: bool,
    ) -> Result<Progress> {
        let desired = service.replicas().ok_or_else(|| Error::NoReplicaCount {
            service_id: self.service_id.clone(),
        })?;

        if !self.initialized {
            self.slot_display.clear();
            self.initialized = true;
        }

        let active = ActiveNodes::from_nodes(nodes);
        let slots = SlotMap::resolve(tasks, &active);

        // Once converged, every resolved slot must still be running.
        if self.done
            && slots
                .tasks()
                .any(|task| !task.observed_state.is(TaskState::Running))
        {
            debug!(service_id = %self.service_id, "Convergence revoked");
            self.done = false;
        }

        for (slot, _) in slots.iter() {
            let next = self.slot_display.len().saturating_add(1);
            self.slot_display.entry(slot).or_insert(next);
        }

        let running = count_running(&slots);
        let progress = Progress {
            service_id: self.service_id.clone(),
            running,
            desired,
            rollback,
            slots: self.slot_lines(&slots),
        };

        if !self.done {
            info!(service_id = %self.service_id, "{progress}");
            for line in &progress.slots {
                debug!(service_id = %self.service_id, "{line}");
            }
            if progress.is_converged() {
                info!(service_id = %self.service_id, replicas = running, "All replicas running");
                self.done = true;
            }
        }

        Ok(progress)
    }

    fn slot_lines(&self, slots: &SlotMap) -> Vec<SlotProgress> {
        let mut lines: Vec<SlotProgress> = slots
            .iter()
            .map(|(slot, task)| SlotProgress {
                index: self.slot_display.get(&slot).copied().unwrap_or_default(),
                slot,
                task_id: task.id.clone(),
                node_id: task.node_id.clone(),
                desired_state: task.desired_state.clone(),
                observed_state: task.observed_state.clone(),
                message: task.message.clone(),
            })
            .collect();
        lines.sort_by_key(|line| line.index);
        lines
    }
}
