#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # swarmwait-cluster
//!
//! The cluster side of convergence: the records a swarm orchestrator reports
//! (tasks, nodes, services), the [`ClusterClient`] seam through which they
//! are fetched, and two implementations of it.
//!
//! - [`DockerClient`] talks to the Docker Engine API over HTTP.
//! - [`InMemoryCluster`] replays scripted snapshots, for tests and dry runs.
//!
//! ## Example
//!
//! ```ignore
//! use swarmwait_cluster::{ClusterClient, DockerClient, DockerConfig, TaskFilter};
//!
//! let client = DockerClient::new(&DockerConfig::from_env()?)?;
//! let service = client.inspect_service("web").await?;
//! let tasks = client.list_tasks(&TaskFilter::running(&service.id)).await?;
//! ```

pub mod client;
pub mod config;
pub mod docker;
pub mod error;
pub mod memory;
pub mod types;
mod wire;

pub use client::{ClusterClient, RemoveContainerOptions, TaskFilter};
pub use config::DockerConfig;
pub use docker::DockerClient;
pub use error::{Error, Result};
pub use memory::{ClusterCall, ClusterFrame, ContainerBehavior, InMemoryCluster, Operation};
pub use types::{
    Node, NodeState, ReportedState, RolloutState, Service, ServiceMode, Task, TaskState,
    UpdateStatus,
};
