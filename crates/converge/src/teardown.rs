//! Compensating teardown of a service whose creation did not converge.
//!
//! The service's containers disappear from the task listing once the service
//! is removed, so they are collected first. After removal each container
//! gets its stop grace period to exit before it is force-removed.

use std::time::Duration;

use itertools::Itertools;
use swarmwait_cluster::{
    ClusterClient, Error, RemoveContainerOptions, Result, TaskFilter, TaskState,
};
use swarmwait_core::GenericResultExt;
use tokio_util::sync::CancellationToken;
use tracing::{debug, info, warn};

/// What a teardown did.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct TeardownReport {
    /// False when the service was already gone.
    pub service_removed: bool,
    /// Containers force-removed after their grace period.
    pub containers_removed: Vec<String>,
}

/// Remove a service and reap its containers.
///
/// Already-removed services and containers, and removals already in
/// progress, count as success, so running it twice is harmless. Once
/// `cancel` fires the remaining grace waits are skipped and containers are
/// force-removed straight away.
///
/// # Errors
///
/// Returns the first cluster error that does not mean "already gone".
pub async fn teardown(
    client: &dyn ClusterClient,
    service_id: &str,
    cancel: &CancellationToken,
) -> Result<TeardownReport> {
    let service = match client.inspect_service(service_id).await {
        Ok(service) => service,
        Err(e) if e.is_already_gone() => {
            info!(service_id, "Service already removed");
            return Ok(TeardownReport::default());
        }
        Err(e) => return Err(e),
    };

    let grace = service.grace_period();
    let containers = match grace {
        Some(_) => live_containers(client, service_id).await?,
        None => Vec::new(),
    };

    info!(service_id, "Removing service");
    let service_removed = client
        .remove_service(service_id)
        .await
        .map(|()| true)
        .tap_err(|e| debug!(service_id, error = %e, "Service removal failed"))
        .recover_if(Error::is_already_gone, false)?;

    let mut report = TeardownReport {
        service_removed,
        containers_removed: Vec::new(),
    };

    if let Some(grace) = grace {
        for container_id in containers {
            await_exit(client, &container_id, grace, cancel).await;

            info!(container_id = %container_id, "Removing container");
            let removed = client
                .remove_container(&container_id, RemoveContainerOptions::forced())
                .await
                .map(|()| true)
                .tap_err(|e| debug!(container_id = %container_id, error = %e, "Container removal failed"))
                .recover_if(Error::is_already_gone, false)?;
            if removed {
                report.containers_removed.push(container_id);
            }
        }
    }

    Ok(report)
}

/// Container ids of the service's tasks that have not shut down.
async fn live_containers(client: &dyn ClusterClient, service_id: &str) -> Result<Vec<String>> {
    let tasks = client.list_tasks(&TaskFilter::service(service_id)).await?;
    Ok(tasks
        .iter()
        .inspect(|task| {
            debug!(
                task_id = %task.id,
                container_id = task.container().unwrap_or_default(),
                state = %task.observed_state,
                "Found task container"
            );
        })
        .filter(|task| !task.observed_state.is(TaskState::Shutdown))
        .filter_map(|task| task.container().map(str::to_string))
        .unique()
        .collect())
}

/// Give a container its grace period to exit on its own.
async fn await_exit(
    client: &dyn ClusterClient,
    container_id: &str,
    grace: Duration,
    cancel: &CancellationToken,
) {
    if cancel.is_cancelled() {
        return;
    }

    info!(container_id, grace = %swarmwait_core::format_duration(grace), "Waiting for container to exit");
    let waited = tokio::select! {
        biased;
        () = cancel.cancelled() => {
            debug!(container_id, "Grace wait cancelled");
            return;
        }
        waited = tokio::time::timeout(grace, client.wait_container_removed(container_id)) => waited,
    };

    match waited {
        Ok(Ok(code)) => info!(container_id, exit_code = code, "Container exited"),
        Ok(Err(e)) if e.is_already_gone() => debug!(container_id, "Container already gone"),
        Ok(Err(e)) => warn!(container_id, error = %e, "Waiting for container failed"),
        Err(_) => debug!(container_id, "Grace period elapsed"),
    }
}
