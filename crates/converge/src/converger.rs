//! Entry points for waiting on created and updated services.

use std::sync::Arc;
use std::time::Duration;

use swarmwait_cluster::{ClusterClient, TaskFilter};
use tokio_util::sync::CancellationToken;
use tracing::{info, warn};

use crate::config::ConvergeConfig;
use crate::error::{Error, Result};
use crate::poller::{ConvergeMode, Convergence, Poller};
use crate::session::{ConvergenceSession, Progress};
use crate::teardown::{self, TeardownReport};

/// Waits for services to converge on a cluster.
#[derive(Clone)]
pub struct Converger {
    client: Arc<dyn ClusterClient>,
}

impl std::fmt::Debug for Converger {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Converger").finish_non_exhaustive()
    }
}

impl Converger {
    pub fn new(client: Arc<dyn ClusterClient>) -> Self {
        Self { client }
    }

    /// Wait for a freshly created service to reach its replica count.
    ///
    /// On any failure, an unusable `config` included, the service is torn
    /// down before the error is returned, so a failed creation leaves
    /// nothing behind.
    ///
    /// # Errors
    ///
    /// Returns the wait's failure. If the teardown fails as well the result
    /// is [`Error::TeardownFailed`], whose [`Error::primary`] is still the
    /// wait's failure.
    pub async fn await_create_convergence(
        &self,
        service_id: &str,
        config: &ConvergeConfig,
        cancel: &CancellationToken,
    ) -> Result<Convergence> {
        let poller = Poller::new(self.client.as_ref(), service_id, *config, ConvergeMode::Creating);
        let err = match poller.run(cancel).await {
            Ok(convergence) => return Ok(convergence),
            Err(err) => err,
        };

        warn!(service_id, error = %err, "Service did not converge, removing it");
        match teardown::teardown(self.client.as_ref(), service_id, cancel).await {
            Ok(_) => Err(err),
            Err(teardown) => Err(Error::TeardownFailed {
                primary: Box::new(err),
                teardown,
            }),
        }
    }

    /// Wait for an updated service to finish its rollout.
    ///
    /// A failed update leaves the service in whatever state the orchestrator
    /// put it in.
    ///
    /// # Errors
    ///
    /// Returns the wait's failure; rollout failures carry the orchestrator's
    /// update message.
    pub async fn await_update_convergence(
        &self,
        service_id: &str,
        config: &ConvergeConfig,
        cancel: &CancellationToken,
    ) -> Result<Convergence> {
        Poller::new(self.client.as_ref(), service_id, *config, ConvergeMode::Updating)
            .run(cancel)
            .await
    }

    /// Remove a service and reap its containers. See [`teardown::teardown`].
    ///
    /// # Errors
    ///
    /// Returns the first cluster error that does not mean "already gone".
    pub async fn teardown(
        &self,
        service_id: &str,
        cancel: &CancellationToken,
    ) -> swarmwait_cluster::Result<TeardownReport> {
        teardown::teardown(self.client.as_ref(), service_id, cancel).await
    }

    /// Evaluate the service once, without waiting.
    ///
    /// # Errors
    ///
    /// Returns [`Error::Cluster`] if a query fails and
    /// [`Error::NoReplicaCount`] if the service has no replica target.
    pub async fn status(&self, service_id: &str, rollback: bool) -> Result<Progress> {
        // A one-shot status has no wait to time out.
        let query_error = |e| Error::cluster(service_id, Duration::ZERO, e);

        let service = self
            .client
            .inspect_service(service_id)
            .await
            .map_err(query_error)?;
        let tasks = self
            .client
            .list_tasks(&TaskFilter::running(service_id))
            .await
            .map_err(query_error)?;
        let nodes = self.client.list_nodes().await.map_err(query_error)?;

        let progress =
            ConvergenceSession::new(service_id).observe(&service, tasks, &nodes, rollback)?;
        info!(
            service_id,
            running = progress.running,
            desired = progress.desired,
            "Status"
        );
        Ok(progress)
    }
}
