//! Slot resolution.
//!
//! The orchestrator keeps superseded tasks around, so one slot usually has
//! several task records: the old one shutting down and its replacement
//! starting. Resolution picks exactly one task per slot.

use std::cmp::Ordering;
use std::collections::{BTreeMap, HashSet};

use swarmwait_cluster::{Node, Task};
use tracing::trace;

use crate::order::StateRank;

/// Nodes that tasks may count on. Only `down` nodes are excluded.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ActiveNodes(HashSet<String>);

impl ActiveNodes {
    pub fn from_nodes<'a>(nodes: impl IntoIterator<Item = &'a Node>) -> Self {
        Self(
            nodes
                .into_iter()
                .filter(|node| node.is_active())
                .map(|node| node.id.clone())
                .collect(),
        )
    }

    /// Whether a task placed on `node_id` may count. Unassigned tasks
    /// (empty node id) always may.
    pub fn admits(&self, node_id: &str) -> bool {
        node_id.is_empty() || self.0.contains(node_id)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }
}

impl<'a> FromIterator<&'a Node> for ActiveNodes {
    fn from_iter<I: IntoIterator<Item = &'a Node>>(iter: I) -> Self {
        Self::from_nodes(iter)
    }
}

/// One authoritative task per slot, ordered by slot.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SlotMap(BTreeMap<u64, Task>);

/// Ranks a task competes with inside its slot.
struct Candidate {
    desired: StateRank,
    observed: StateRank,
    task: Task,
}

impl Candidate {
    fn new(task: Task) -> Option<Self> {
        Some(Self {
            desired: StateRank::of_reported(&task.desired_state)?,
            observed: StateRank::of_reported(&task.observed_state)?,
            task,
        })
    }

    /// Lower desired rank wins, then lower observed rank, then the smaller
    /// task id.
    fn cmp_precedence(&self, other: &Self) -> Ordering {
        self.desired
            .cmp(&other.desired)
            .then(self.observed.cmp(&other.observed))
            .then_with(|| self.task.id.cmp(&other.task.id))
    }
}

impl SlotMap {
    /// Reduce a raw task listing to one task per slot.
    ///
    /// Tasks in a state outside the lifecycle and tasks on inactive nodes
    /// are discarded before slots are contested.
    pub fn resolve(tasks: impl IntoIterator<Item = Task>, active: &ActiveNodes) -> Self {
        let mut winners: BTreeMap<u64, Candidate> = BTreeMap::new();

        for task in tasks {
            if !active.admits(&task.node_id) {
                trace!(task_id = %task.id, node_id = %task.node_id, "Skipping task on inactive node");
                continue;
            }
            let Some(candidate) = Candidate::new(task) else {
                continue;
            };

            match winners.get(&candidate.task.slot) {
                Some(current) if current.cmp_precedence(&candidate) != Ordering::Greater => {}
                _ => {
                    winners.insert(candidate.task.slot, candidate);
                }
            }
        }

        Self(
            winners
                .into_iter()
                .map(|(slot, candidate)| (slot, candidate.task))
                .collect(),
        )
    }

    pub fn get(&self, slot: u64) -> Option<&Task> {
        self.0.get(&slot)
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    /// Slots in ascending order with their task.
    pub fn iter(&self) -> impl Iterator<Item = (u64, &Task)> {
        self.0.iter().map(|(slot, task)| (*slot, task))
    }

    pub fn tasks(&self) -> impl Iterator<Item = &Task> {
        self.0.values()
    }
}
