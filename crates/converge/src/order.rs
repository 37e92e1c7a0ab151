//! Total order over the task lifecycle.
//!
//! The resolver breaks slot ties with it and the counter uses it to decide
//! terminality. States past `running` are terminal.

use std::fmt;

use swarmwait_cluster::{ReportedState, TaskState};

/// Lifecycle states in order.
pub const LIFECYCLE: [TaskState; 13] = [
    TaskState::New,
    TaskState::Allocated,
    TaskState::Pending,
    TaskState::Assigned,
    TaskState::Accepted,
    TaskState::Preparing,
    TaskState::Ready,
    TaskState::Starting,
    TaskState::Running,
    TaskState::Complete,
    TaskState::Shutdown,
    TaskState::Failed,
    TaskState::Rejected,
];

/// Position of a state in the lifecycle, from 1 (`new`) to 13 (`rejected`).
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub struct StateRank(u8);

impl StateRank {
    pub const RUNNING: Self = rank(TaskState::Running);

    /// Rank of a lifecycle state.
    pub const fn of(state: TaskState) -> Self {
        rank(state)
    }

    /// Rank of a reported state; `None` for states outside the lifecycle.
    pub const fn of_reported(state: &ReportedState) -> Option<Self> {
        match state.known() {
            Some(state) => Some(rank(state)),
            None => None,
        }
    }

    pub const fn get(self) -> u8 {
        self.0
    }

    pub const fn is_terminal(self) -> bool {
        self.0 > Self::RUNNING.0
    }
}

impl fmt::Display for StateRank {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

const fn rank(state: TaskState) -> StateRank {
    StateRank(match state {
        TaskState::New => 1,
        TaskState::Allocated => 2,
        TaskState::Pending => 3,
        TaskState::Assigned => 4,
        TaskState::Accepted => 5,
        TaskState::Preparing => 6,
        TaskState::Ready => 7,
        TaskState::Starting => 8,
        TaskState::Running => 9,
        TaskState::Complete => 10,
        TaskState::Shutdown => 11,
        TaskState::Failed => 12,
        TaskState::Rejected => 13,
    })
}

/// Whether the state lies past `running`.
pub const fn is_terminal(state: TaskState) -> bool {
    rank(state).is_terminal()
}
