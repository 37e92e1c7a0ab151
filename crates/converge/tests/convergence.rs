//! End-to-end waits against a scripted cluster.
//!
//! Time is paused, so every wait finishes instantly while still observing
//! the configured delays, intervals and deadlines.

use std::sync::Arc;
use std::time::Duration;

use swarmwait_cluster::{
    ClusterCall, ClusterFrame, ContainerBehavior, InMemoryCluster, Node, Operation, RolloutState,
    Service, ServiceMode, Task, TaskState,
};
use swarmwait_converge::{ConvergeConfig, Converger, Error};
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;

type TestResult = std::result::Result<(), Box<dyn std::error::Error>>;

fn config() -> ConvergeConfig {
    ConvergeConfig::default()
        .timeout(Duration::from_secs(30))
        .delay(Duration::from_secs(2))
        .min_poll_interval(Duration::from_secs(1))
        .max_poll_interval(Duration::from_secs(5))
}

fn running(id: &str, slot: u64) -> Task {
    Task::new(id, slot, TaskState::Running, TaskState::Running)
        .for_service("web")
        .on_node("n1")
}

fn frame(service: Service, tasks: Vec<Task>) -> ClusterFrame {
    ClusterFrame::new(service)
        .with_nodes([Node::ready("n1"), Node::ready("n2")])
        .with_tasks(tasks)
}

fn converger(cluster: &Arc<InMemoryCluster>) -> Converger {
    Converger::new(cluster.clone())
}

#[tokio::test(start_paused = true)]
async fn second_replica_arriving_completes_the_create() -> TestResult {
    let service = Service::replicated("web", 2);
    // The replica count check before the delay sees the first frame.
    let cluster = Arc::new(InMemoryCluster::scripted([
        frame(service.clone(), vec![running("a", 0)]),
        frame(service.clone(), vec![running("a", 0)]),
        frame(service, vec![running("a", 0), running("b", 1)]),
    ]));

    let convergence = converger(&cluster)
        .await_create_convergence("web", &config(), &CancellationToken::new())
        .await?;

    assert_eq!(convergence.polls, 2);
    assert_eq!(convergence.progress.map(|p| (p.running, p.desired)), Some((2, 2)));
    assert!(cluster.removed_services().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn rollback_completion_fails_at_observation_time() -> TestResult {
    let base = Service::replicated("web", 1);
    let cluster = Arc::new(InMemoryCluster::scripted([
        frame(
            base.clone().with_update_status(RolloutState::Updating, "update in progress"),
            Vec::new(),
        ),
        frame(
            base.clone().with_update_status(RolloutState::Updating, "update in progress"),
            vec![
                Task::new("a", 0, TaskState::Running, TaskState::Starting)
                    .for_service("web")
                    .on_node("n1"),
            ],
        ),
        frame(
            base.clone()
                .with_update_status(RolloutState::RollbackStarted, "update rolled back"),
            vec![Task::new("b", 0, TaskState::Running, TaskState::Starting).for_service("web")],
        ),
        frame(
            base.with_update_status(RolloutState::RollbackCompleted, "rollback completed"),
            vec![running("b", 0)],
        ),
    ]));

    let started = Instant::now();
    let result = converger(&cluster)
        .await_update_convergence("web", &config(), &CancellationToken::new())
        .await;

    match result {
        Err(err @ Error::RollbackCompleted { .. }) => {
            assert_eq!(err.to_string(), "service rollback completed: rollback completed");
            assert!(err.is_permanent());
        }
        other => return Err(format!("expected rollback failure, got {other:?}").into()),
    }
    assert!(started.elapsed() < config().timeout);
    // Updates are never undone.
    assert!(cluster.removed_services().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn replicas_converging_during_rollback_is_a_failure() -> TestResult {
    let service = Service::replicated("web", 1)
        .with_update_status(RolloutState::RollbackStarted, "update rolled back due to failure");
    let cluster = Arc::new(InMemoryCluster::single(frame(service, vec![running("a", 0)])));

    let result = converger(&cluster)
        .await_update_convergence("web", &config(), &CancellationToken::new())
        .await;

    assert!(matches!(
        result,
        Err(Error::RollbackCompleted { ref message, .. }) if message == "update rolled back due to failure"
    ));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn paused_update_beats_the_timeout() -> TestResult {
    let service = Service::replicated("web", 3)
        .with_update_status(RolloutState::Paused, "update paused due to failure");
    let cluster = Arc::new(InMemoryCluster::single(frame(service, vec![running("a", 0)])));

    let result = converger(&cluster)
        .await_update_convergence("web", &config(), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::UpdatePaused { .. })));
    // The replica count check, then the first poll.
    assert_eq!(cluster.inspections(), 2);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn flapping_replica_revokes_convergence() -> TestResult {
    let service = Service::replicated("web", 1);
    let mut session = swarmwait_converge::ConvergenceSession::new("web");
    let nodes = [Node::ready("n1")];

    let up = session.observe(&service, vec![running("a", 0)], &nodes, false)?;
    assert!(up.is_converged());
    assert!(session.is_done());

    let restarting = Task::new("a", 0, TaskState::Running, TaskState::Preparing).on_node("n1");
    let down = session.observe(&service, vec![restarting], &nodes, false)?;
    assert!(!down.is_converged());
    assert!(!session.is_done());

    let back = session.observe(&service, vec![running("c", 0)], &nodes, false)?;
    assert!(back.is_converged());
    assert!(session.is_done());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn replicas_on_down_nodes_do_not_count() -> TestResult {
    let service = Service::replicated("web", 2);
    let on_lost_node = running("b", 1).on_node("n9");
    let frame = ClusterFrame::new(service)
        .with_nodes([Node::ready("n1"), Node::down("n9")])
        .with_tasks([running("a", 0), on_lost_node]);
    let cluster = Arc::new(InMemoryCluster::single(frame));

    let progress = converger(&cluster).status("web", false).await?;
    assert_eq!((progress.running, progress.desired), (1, 2));
    assert_eq!(progress.slots.len(), 1);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_create_tears_the_service_down() -> TestResult {
    let service = Service::replicated("web", 2).with_stop_grace_period(Duration::from_secs(10));
    let stuck = Task::new("b", 1, TaskState::Running, TaskState::Starting)
        .for_service("web")
        .on_node("n2")
        .with_container("c-b");
    let cluster = Arc::new(InMemoryCluster::single(frame(
        service,
        vec![running("a", 0).with_container("c-a"), stuck],
    )));
    cluster.add_container("c-a", ContainerBehavior::Exits(0));
    cluster.add_container("c-b", ContainerBehavior::Lingers);

    let started = Instant::now();
    let result = converger(&cluster)
        .await_create_convergence("web", &config(), &CancellationToken::new())
        .await;

    match result {
        Err(ref err) if err.is_timeout() => {
            assert_eq!(
                err.to_string(),
                "service with ID (web) did not converge after 30s"
            );
        }
        other => return Err(format!("expected timeout, got {other:?}").into()),
    }
    assert_eq!(cluster.removed_services(), vec!["web".to_string()]);
    // c-a exited on its own, c-b was force-removed after its grace period.
    assert_eq!(cluster.removed_containers(), vec!["c-b".to_string()]);
    assert!(started.elapsed() >= Duration::from_secs(40));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn create_with_unusable_config_is_still_torn_down() -> TestResult {
    let cluster = Arc::new(InMemoryCluster::single(frame(
        Service::replicated("web", 1),
        vec![running("a", 0)],
    )));

    let config = config().timeout(Duration::ZERO);
    let result = converger(&cluster)
        .await_create_convergence("web", &config, &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::InvalidConfig { .. })));
    assert_eq!(cluster.removed_services(), vec!["web".to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn service_without_replica_count_fails_before_the_delay() -> TestResult {
    let service = Service::with_mode("web", ServiceMode::Global);
    let cluster = Arc::new(InMemoryCluster::single(frame(service, vec![running("a", 0)])));
    let config = config().delay(Duration::from_secs(7));

    let started = Instant::now();
    let result = converger(&cluster)
        .await_update_convergence("web", &config, &CancellationToken::new())
        .await;

    match result {
        Err(ref err @ Error::NoReplicaCount { .. }) => {
            assert_eq!(err.to_string(), "service with ID (web) has no replica count");
        }
        other => return Err(format!("expected missing replica count, got {other:?}").into()),
    }
    assert_eq!(started.elapsed(), Duration::ZERO);
    assert!(
        !cluster
            .calls()
            .iter()
            .any(|call| matches!(call, ClusterCall::ListTasks(_)))
    );
    assert!(cluster.removed_services().is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failed_update_leaves_the_service_alone() -> TestResult {
    let cluster = Arc::new(InMemoryCluster::single(frame(
        Service::replicated("web", 2),
        vec![running("a", 0)],
    )));

    let result = converger(&cluster)
        .await_update_convergence("web", &config(), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(ref e) if e.is_timeout()));
    assert!(cluster.removed_services().is_empty());
    assert!(
        !cluster
            .calls()
            .iter()
            .any(|call| matches!(call, ClusterCall::RemoveService(_)))
    );
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn query_error_during_create_is_reported_after_teardown() -> TestResult {
    let cluster = Arc::new(InMemoryCluster::single(frame(
        Service::replicated("web", 1),
        vec![running("a", 0)],
    )));
    cluster.fail_next(
        Operation::ListTasks,
        swarmwait_cluster::Error::from_status(500, "task listing failed"),
    );

    let result = converger(&cluster)
        .await_create_convergence("web", &config(), &CancellationToken::new())
        .await;

    assert!(matches!(result, Err(Error::Cluster { .. })));
    assert_eq!(cluster.removed_services(), vec!["web".to_string()]);
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn failing_teardown_keeps_the_original_cause() -> TestResult {
    let cluster = Arc::new(InMemoryCluster::single(frame(
        Service::replicated("web", 2),
        vec![running("a", 0)],
    )));
    cluster.fail_next(
        Operation::RemoveService,
        swarmwait_cluster::Error::from_status(503, "swarm has no leader"),
    );

    let result = converger(&cluster)
        .await_create_convergence("web", &config(), &CancellationToken::new())
        .await;

    match result {
        Err(err @ Error::TeardownFailed { .. }) => {
            assert!(err.is_timeout());
            assert!(matches!(err.primary(), Error::DidNotConverge { .. }));
            assert_eq!(err.service_id(), Some("web"));
        }
        other => return Err(format!("expected teardown failure, got {other:?}").into()),
    }
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn cancelling_a_create_force_removes_without_grace() -> TestResult {
    let service = Service::replicated("web", 2).with_stop_grace_period(Duration::from_secs(300));
    let cluster = Arc::new(InMemoryCluster::single(frame(
        service,
        vec![running("a", 0).with_container("c-a")],
    )));
    cluster.add_container("c-a", ContainerBehavior::Lingers);

    let cancel = CancellationToken::new();
    let trigger = cancel.clone();
    tokio::spawn(async move {
        tokio::time::sleep(Duration::from_secs(5)).await;
        trigger.cancel();
    });

    let started = Instant::now();
    let result = converger(&cluster)
        .await_create_convergence("web", &config(), &cancel)
        .await;

    assert!(matches!(result, Err(ref e) if e.is_cancelled()));
    assert_eq!(cluster.removed_services(), vec!["web".to_string()]);
    assert_eq!(cluster.removed_containers(), vec!["c-a".to_string()]);
    assert!(started.elapsed() < Duration::from_secs(6));
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn teardown_twice_is_harmless() -> TestResult {
    let service = Service::replicated("web", 1).with_stop_grace_period(Duration::from_secs(1));
    let cluster = Arc::new(InMemoryCluster::single(frame(
        service,
        vec![running("a", 0).with_container("c-a")],
    )));
    cluster.add_container("c-a", ContainerBehavior::Lingers);
    let converger = converger(&cluster);
    let cancel = CancellationToken::new();

    let first = converger.teardown("web", &cancel).await?;
    assert!(first.service_removed);
    assert_eq!(first.containers_removed, vec!["c-a".to_string()]);

    let second = converger.teardown("web", &cancel).await?;
    assert!(!second.service_removed);
    assert!(second.containers_removed.is_empty());
    Ok(())
}

#[tokio::test(start_paused = true)]
async fn removal_in_progress_counts_as_removed() -> TestResult {
    let service = Service::replicated("web", 1).with_stop_grace_period(Duration::from_secs(1));
    let cluster = Arc::new(InMemoryCluster::single(frame(
        service,
        vec![running("a", 0).with_container("c-a")],
    )));
    cluster.add_container("c-a", ContainerBehavior::Lingers);
    cluster.fail_next(
        Operation::RemoveContainer,
        swarmwait_cluster::Error::from_status(
            409,
            "removal of container c-a is already in progress",
        ),
    );

    let report = converger(&cluster)
        .teardown("web", &CancellationToken::new())
        .await?;
    assert!(report.service_removed);
    assert!(report.containers_removed.is_empty());
    Ok(())
}
