//! Bounded polling until a service converges.
//!
//! One wait is one sequential loop: a replica count check, an initial delay,
//! then a poll, then an interval that backs off up to a ceiling. The deadline
//! caps every sleep and every poll, and every suspension also races
//! cancellation.

use std::time::Duration;

use swarmwait_cluster::{ClusterClient, TaskFilter};
use swarmwait_core::format_duration;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info};

use crate::config::ConvergeConfig;
use crate::error::{Error, Result};
use crate::rollout::{self, Outcome, RolloutFailure, RolloutVerdict};
use crate::session::{ConvergenceSession, Progress};

/// Which operation the wait follows.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ConvergeMode {
    /// The service was just created; its update status is ignored.
    Creating,
    /// The service was updated; its rollout status is honoured.
    Updating,
}

impl std::fmt::Display for ConvergeMode {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Creating => write!(f, "creating"),
            Self::Updating => write!(f, "updating"),
        }
    }
}

/// A successful wait.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Convergence {
    pub service_id: String,
    pub mode: ConvergeMode,
    /// Polls performed, including the successful one.
    pub polls: u32,
    pub elapsed: Duration,
    /// Last replica report. `None` when the orchestrator declared the
    /// update completed before replicas were counted.
    pub progress: Option<Progress>,
}

/// What one poll saw.
struct Observation {
    outcome: Outcome,
    progress: Option<Progress>,
}

/// Drives one convergence wait.
pub struct Poller<'a> {
    client: &'a dyn ClusterClient,
    service_id: String,
    config: ConvergeConfig,
    mode: ConvergeMode,
}

impl<'a> Poller<'a> {
    pub fn new(
        client: &'a dyn ClusterClient,
        service_id: impl Into<String>,
        config: ConvergeConfig,
        mode: ConvergeMode,
    ) -> Self {
        Self {
            client,
            service_id: service_id.into(),
            config,
            mode,
        }
    }

    /// Poll until the service converges, fails permanently, the timeout
    /// elapses, a query fails, or `cancel` fires.
    ///
    /// # Errors
    ///
    /// - [`Error::InvalidConfig`] if the config cannot drive a wait
    /// - [`Error::DidNotConverge`] when the timeout elapses
    /// - [`Error::NoReplicaCount`] before the delay if the service has no replica count
    /// - a rollout failure as soon as it is observed
    /// - [`Error::Cluster`] for the first failed query
    /// - [`Error::Cancelled`] when `cancel` fires
    pub async fn run(&self, cancel: &CancellationToken) -> Result<Convergence> {
        self.config.validate()?;

        let started = Instant::now();
        info!(
            service_id = %self.service_id,
            mode = %self.mode,
            timeout = %format_duration(self.config.timeout),
            "Waiting for service to converge"
        );

        let mut session = ConvergenceSession::new(self.service_id.clone());
        let mut interval = self.config.min_poll_interval;
        let mut polls: u32 = 0;

        self.preflight(started, cancel).await?;
        self.pause(self.config.delay, started, cancel).await?;

        loop {
            let remaining = self.remaining(started);
            if remaining.is_zero() {
                return Err(self.did_not_converge());
            }

            let observed = tokio::select! {
                biased;
                () = cancel.cancelled() => return Err(self.cancelled()),
                result = tokio::time::timeout(remaining, self.poll_once(&mut session)) => result,
            };
            polls = polls.saturating_add(1);

            // A poll still running at the deadline is abandoned.
            let Ok(observation) = observed else {
                return Err(self.did_not_converge());
            };
            let observation = observation?;

            match observation.outcome {
                Outcome::Converged => {
                    let elapsed = started.elapsed();
                    info!(
                        service_id = %self.service_id,
                        polls,
                        elapsed = %format_duration(elapsed),
                        "Service converged"
                    );
                    return Ok(Convergence {
                        service_id: self.service_id.clone(),
                        mode: self.mode,
                        polls,
                        elapsed,
                        progress: observation.progress,
                    });
                }
                Outcome::Failed(failure) => return Err(self.rollout_error(failure)),
                Outcome::Pending => {}
            }

            debug!(
                service_id = %self.service_id,
                next_poll = %format_duration(interval),
                "Service not converged yet"
            );
            self.pause(interval, started, cancel).await?;
            interval = interval
                .saturating_mul(2)
                .min(self.config.max_poll_interval)
                .max(self.config.min_poll_interval);
        }
    }

    /// Sleep for `wait`, but never past the deadline.
    async fn pause(&self, wait: Duration, started: Instant, cancel: &CancellationToken) -> Result<()> {
        let wait = wait.min(self.remaining(started));
        tokio::select! {
            biased;
            () = cancel.cancelled() => Err(self.cancelled()),
            () = tokio::time::sleep(wait) => Ok(()),
        }
    }

    /// Reject a service without a replica count before waiting out the delay.
    async fn preflight(&self, started: Instant, cancel: &CancellationToken) -> Result<()> {
        let inspected = tokio::select! {
            biased;
            () = cancel.cancelled() => return Err(self.cancelled()),
            result = tokio::time::timeout(
                self.remaining(started),
                self.client.inspect_service(&self.service_id),
            ) => result,
        };
        let Ok(inspected) = inspected else {
            return Err(self.did_not_converge());
        };
        let service = inspected.map_err(|e| self.query_error(e))?;

        if service.replicas().is_none() {
            return Err(Error::NoReplicaCount {
                service_id: self.service_id.clone(),
            });
        }
        Ok(())
    }

    fn remaining(&self, started: Instant) -> Duration {
        self.config.timeout.saturating_sub(started.elapsed())
    }

    async fn poll_once(&self, session: &mut ConvergenceSession) -> Result<Observation> {
        let service = self
            .client
            .inspect_service(&self.service_id)
            .await
            .map_err(|e| self.query_error(e))?;

        let rollback = match self.mode {
            ConvergeMode::Creating => false,
            ConvergeMode::Updating => {
                if let Some(status) = &service.update_status {
                    debug!(service_id = %self.service_id, update_status = %status.state, "Update status");
                }
                match rollout::assess(service.update_status.as_ref()) {
                    RolloutVerdict::Continue { rollback } => rollback,
                    RolloutVerdict::Completed => {
                        return Ok(Observation {
                            outcome: Outcome::Converged,
                            progress: None,
                        });
                    }
                    RolloutVerdict::Failed(failure) => {
                        return Ok(Observation {
                            outcome: Outcome::Failed(failure),
                            progress: None,
                        });
                    }
                }
            }
        };

        let tasks = self
            .client
            .list_tasks(&TaskFilter::running(self.service_id.clone()))
            .await
            .map_err(|e| self.query_error(e))?;
        let nodes = self
            .client
            .list_nodes()
            .await
            .map_err(|e| self.query_error(e))?;

        let progress = session.observe(&service, tasks, &nodes, rollback)?;
        let outcome = rollout::settle(progress.is_converged(), rollback, service.update_message());
        Ok(Observation {
            outcome,
            progress: Some(progress),
        })
    }

    fn query_error(&self, source: swarmwait_cluster::Error) -> Error {
        Error::cluster(self.service_id.clone(), self.config.timeout, source)
    }

    fn did_not_converge(&self) -> Error {
        Error::DidNotConverge {
            service_id: self.service_id.clone(),
            timeout: self.config.timeout,
        }
    }

    fn cancelled(&self) -> Error {
        Error::Cancelled {
            service_id: self.service_id.clone(),
            timeout: self.config.timeout,
        }
    }

    fn rollout_error(&self, failure: RolloutFailure) -> Error {
        let service_id = self.service_id.clone();
        let timeout = self.config.timeout;
        match failure {
            RolloutFailure::RollbackCompleted(message) => Error::RollbackCompleted {
                service_id,
                timeout,
                message,
            },
            RolloutFailure::UpdatePaused(message) => Error::UpdatePaused {
                service_id,
                timeout,
                message,
            },
            RolloutFailure::RollbackPaused(message) => Error::RollbackPaused {
                service_id,
                timeout,
                message,
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use swarmwait_cluster::{
        ClusterCall, ClusterFrame, InMemoryCluster, Node, Operation, RolloutState, Service,
        ServiceMode, Task, TaskState,
    };

    fn config() -> ConvergeConfig {
        ConvergeConfig::default()
            .timeout(Duration::from_secs(60))
            .delay(Duration::from_secs(1))
            .min_poll_interval(Duration::from_secs(1))
            .max_poll_interval(Duration::from_secs(4))
    }

    fn frame(service: Service, running: u64) -> ClusterFrame {
        ClusterFrame::new(service)
            .with_node(Node::ready("n1"))
            .with_tasks((0..running).map(|slot| {
                Task::new(format!("t{slot}"), slot, TaskState::Running, TaskState::Running)
                    .on_node("n1")
            }))
    }

    #[tokio::test(start_paused = true)]
    async fn test_converges_on_second_poll() {
        let service = Service::replicated("svc", 2);
        // The first frame is seen by the replica count check before the delay.
        let cluster = InMemoryCluster::scripted([
            frame(service.clone(), 1),
            frame(service.clone(), 1),
            frame(service, 2),
        ]);
        let poller = Poller::new(&cluster, "svc", config(), ConvergeMode::Creating);

        let result = poller.run(&CancellationToken::new()).await;
        let convergence = result.ok();
        assert_eq!(convergence.as_ref().map(|c| c.polls), Some(2));
        assert_eq!(
            convergence.and_then(|c| c.progress).map(|p| p.running),
            Some(2)
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_times_out_when_never_converged() {
        let cluster = InMemoryCluster::single(frame(Service::replicated("svc", 3), 1));
        let poller = Poller::new(&cluster, "svc", config(), ConvergeMode::Creating);

        let started = Instant::now();
        let result = poller.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(ref e) if e.is_timeout()));
        assert!(started.elapsed() >= Duration::from_secs(60));
        assert!(started.elapsed() < Duration::from_secs(61));
    }

    #[tokio::test(start_paused = true)]
    async fn test_interval_backs_off_to_ceiling() {
        let cluster = InMemoryCluster::single(frame(Service::replicated("svc", 3), 1));
        let config = config().timeout(Duration::from_secs(20));
        let poller = Poller::new(&cluster, "svc", config, ConvergeMode::Creating);

        assert!(poller.run(&CancellationToken::new()).await.is_err());
        // One check at 0s, then polls at 1s, 2s, 4s, 8s, 12s and 16s. The
        // deadline is 20s.
        assert_eq!(cluster.inspections(), 7);
    }

    #[tokio::test(start_paused = true)]
    async fn test_create_ignores_update_status() {
        let service = Service::replicated("svc", 1).with_update_status(RolloutState::Paused, "old");
        let cluster = InMemoryCluster::single(frame(service, 1));
        let poller = Poller::new(&cluster, "svc", config(), ConvergeMode::Creating);
        assert!(poller.run(&CancellationToken::new()).await.is_ok());
    }

    #[tokio::test(start_paused = true)]
    async fn test_update_completed_succeeds_without_counting() {
        let service =
            Service::replicated("svc", 5).with_update_status(RolloutState::Completed, "done");
        let cluster = InMemoryCluster::single(frame(service, 0));
        let poller = Poller::new(&cluster, "svc", config(), ConvergeMode::Updating);

        let result = poller.run(&CancellationToken::new()).await;
        assert_eq!(result.ok().map(|c| c.progress.is_none()), Some(true));
    }

    #[tokio::test(start_paused = true)]
    async fn test_query_error_is_not_retried() {
        let cluster = InMemoryCluster::single(frame(Service::replicated("svc", 1), 1));
        cluster.fail_next(
            Operation::ListNodes,
            swarmwait_cluster::Error::from_status(500, "node listing failed"),
        );
        let poller = Poller::new(&cluster, "svc", config(), ConvergeMode::Creating);

        let result = poller.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::Cluster { .. })));
        assert_eq!(cluster.inspections(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn test_cancelled_during_delay() {
        let cluster = InMemoryCluster::single(frame(Service::replicated("svc", 1), 1));
        let poller = Poller::new(&cluster, "svc", config(), ConvergeMode::Creating);
        let cancel = CancellationToken::new();
        cancel.cancel();

        let result = poller.run(&cancel).await;
        assert!(matches!(result, Err(ref e) if e.is_cancelled()));
        assert_eq!(cluster.inspections(), 0);
    }

    #[tokio::test(start_paused = true)]
    async fn test_missing_replica_count_fails_before_delay() {
        let service = Service::with_mode("svc", ServiceMode::Global);
        let cluster = InMemoryCluster::single(frame(service, 1));
        let config = config().delay(Duration::from_secs(7));
        let poller = Poller::new(&cluster, "svc", config, ConvergeMode::Updating);

        let started = Instant::now();
        let result = poller.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::NoReplicaCount { .. })));
        assert_eq!(started.elapsed(), Duration::ZERO);
        assert_eq!(cluster.inspections(), 1);
        assert!(
            !cluster
                .calls()
                .iter()
                .any(|call| matches!(call, ClusterCall::ListTasks(_)))
        );
    }

    #[tokio::test(start_paused = true)]
    async fn test_invalid_config_is_rejected_before_polling() {
        let cluster = InMemoryCluster::single(frame(Service::replicated("svc", 1), 1));
        let poller = Poller::new(
            &cluster,
            "svc",
            config().timeout(Duration::ZERO),
            ConvergeMode::Creating,
        );
        let result = poller.run(&CancellationToken::new()).await;
        assert!(matches!(result, Err(Error::InvalidConfig { .. })));
        assert_eq!(cluster.inspections(), 0);
    }
}
