//! Docker Engine API client.
//!
//! Talks to the daemon over HTTP. Only the swarm endpoints convergence needs
//! are implemented.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use reqwest::{RequestBuilder, Response};
use serde::de::DeserializeOwned;
use tracing::debug;
use url::Url;

use crate::client::{ClusterClient, RemoveContainerOptions, TaskFilter};
use crate::config::DockerConfig;
use crate::error::{Error, Result};
use crate::types::{Node, Service, Task};
use crate::wire::{ErrorBodyDto, NodeDto, ServiceDto, TaskDto, WaitResponseDto};

/// [`ClusterClient`] backed by the Docker Engine API.
#[derive(Debug, Clone)]
pub struct DockerClient {
    base_url: Url,
    request_timeout: Duration,
    http_client: reqwest::Client,
}

impl DockerClient {
    /// Create a client from configuration.
    ///
    /// # Errors
    ///
    /// Returns an error if the host is not usable or the HTTP client cannot
    /// be built.
    pub fn new(config: &DockerConfig) -> Result<Self> {
        let base_url = config.base_url()?;
        // No client-wide timeout: container waits may legitimately block for
        // the whole grace period.
        let http_client = reqwest::Client::builder().build()?;

        Ok(Self {
            base_url,
            request_timeout: config.request_timeout,
            http_client,
        })
    }

    /// Base URL requests are sent to.
    pub const fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url> {
        Ok(self.base_url.join(path)?)
    }

    async fn send(&self, request: RequestBuilder) -> Result<Response> {
        let response = request.send().await?;
        let status = response.status();
        if status.is_success() {
            return Ok(response);
        }

        let body = response.text().await.unwrap_or_default();
        let message = serde_json::from_str::<ErrorBodyDto>(&body)
            .map(|dto| dto.message)
            .unwrap_or(body);
        Err(Error::from_status(status.as_u16(), message.trim()))
    }

    async fn get_json<T: DeserializeOwned>(&self, request: RequestBuilder) -> Result<T> {
        let response = self.send(request).await?;
        let bytes = response.bytes().await?;
        Ok(serde_json::from_slice(&bytes)?)
    }
}

#[async_trait]
impl ClusterClient for DockerClient {
    async fn list_tasks(&self, filter: &TaskFilter) -> Result<Vec<Task>> {
        let mut filters = serde_json::Map::new();
        filters.insert(
            "service".to_string(),
            serde_json::json!([filter.service_id]),
        );
        if let Some(state) = filter.desired_state {
            filters.insert(
                "desired-state".to_string(),
                serde_json::json!([state.as_str()]),
            );
        }
        let filters = serde_json::Value::Object(filters).to_string();

        let start = Instant::now();
        let request = self
            .http_client
            .get(self.endpoint("tasks")?)
            .query(&[("filters", filters)])
            .timeout(self.request_timeout);
        let tasks: Vec<TaskDto> = self.get_json(request).await?;
        debug!(
            service_id = %filter.service_id,
            count = tasks.len(),
            elapsed_ms = start.elapsed().as_millis(),
            "Listed tasks"
        );

        Ok(tasks.into_iter().map(Task::from).collect())
    }

    async fn list_nodes(&self) -> Result<Vec<Node>> {
        let request = self
            .http_client
            .get(self.endpoint("nodes")?)
            .timeout(self.request_timeout);
        let nodes: Vec<NodeDto> = self.get_json(request).await?;
        Ok(nodes.into_iter().map(Node::from).collect())
    }

    async fn inspect_service(&self, service_id: &str) -> Result<Service> {
        let request = self
            .http_client
            .get(self.endpoint(&format!("services/{service_id}"))?)
            .timeout(self.request_timeout);
        let service: ServiceDto = self.get_json(request).await?;
        Ok(Service::from(service))
    }

    async fn remove_service(&self, service_id: &str) -> Result<()> {
        let request = self
            .http_client
            .delete(self.endpoint(&format!("services/{service_id}"))?)
            .timeout(self.request_timeout);
        self.send(request).await?;
        debug!(service_id, "Removed service");
        Ok(())
    }

    async fn remove_container(
        &self,
        container_id: &str,
        options: RemoveContainerOptions,
    ) -> Result<()> {
        let request = self
            .http_client
            .delete(self.endpoint(&format!("containers/{container_id}"))?)
            .query(&[("v", options.remove_volumes), ("force", options.force)])
            .timeout(self.request_timeout);
        self.send(request).await?;
        debug!(container_id, "Removed container");
        Ok(())
    }

    async fn wait_container_removed(&self, container_id: &str) -> Result<i64> {
        let request = self
            .http_client
            .post(self.endpoint(&format!("containers/{container_id}/wait"))?)
            .query(&[("condition", "removed")]);
        let response: WaitResponseDto = self.get_json(request).await?;

        match response.error {
            Some(err) if !err.message.is_empty() => Err(Error::ContainerWait {
                container_id: container_id.to_string(),
                message: err.message,
            }),
            _ => Ok(response.status_code),
        }
    }
}
