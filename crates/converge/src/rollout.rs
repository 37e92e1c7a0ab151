//! Rollout status layered over the replica count.
//!
//! Only update waits consult it. A create wait ignores the update status
//! entirely.

use swarmwait_cluster::{RolloutState, UpdateStatus};

/// A rollout state that waiting longer cannot change.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutFailure {
    RollbackCompleted(String),
    UpdatePaused(String),
    RollbackPaused(String),
}

/// What the service's update status says about the wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RolloutVerdict {
    /// Keep counting replicas. With `rollback` set the orchestrator is
    /// converging towards the previous spec.
    Continue { rollback: bool },
    /// The orchestrator finished the update.
    Completed,
    Failed(RolloutFailure),
}

/// Interpret a service's update status.
pub fn assess(status: Option<&UpdateStatus>) -> RolloutVerdict {
    let Some(status) = status else {
        return RolloutVerdict::Continue { rollback: false };
    };
    let message = status.message.clone();
    match status.state {
        RolloutState::Updating => RolloutVerdict::Continue { rollback: false },
        RolloutState::Completed => RolloutVerdict::Completed,
        RolloutState::RollbackStarted => RolloutVerdict::Continue { rollback: true },
        RolloutState::RollbackCompleted => {
            RolloutVerdict::Failed(RolloutFailure::RollbackCompleted(message))
        }
        RolloutState::Paused => RolloutVerdict::Failed(RolloutFailure::UpdatePaused(message)),
        RolloutState::RollbackPaused => {
            RolloutVerdict::Failed(RolloutFailure::RollbackPaused(message))
        }
    }
}

/// Outcome of one poll.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Outcome {
    Converged,
    Pending,
    Failed(RolloutFailure),
}

/// Combine the replica predicate with the rollback flag.
///
/// Replicas converging during a rollback means the previous spec came back,
/// which is a failed update rather than a success.
pub fn settle(converged: bool, rollback: bool, message: &str) -> Outcome {
    match (converged, rollback) {
        (false, _) => Outcome::Pending,
        (true, false) => Outcome::Converged,
        (true, true) => Outcome::Failed(RolloutFailure::RollbackCompleted(message.to_string())),
    }
}
