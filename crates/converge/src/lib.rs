#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # swarmwait-converge
//!
//! Decides whether a swarm service has reached the state it was asked for.
//!
//! After a service is created or updated, the orchestrator schedules tasks
//! on its own time. [`Converger`] polls the cluster, reduces the task
//! listing to one task per replica slot, counts the slots that are running,
//! and layers the service's rollout status on top. A wait ends in success,
//! a permanent failure, a timeout, a failed query, or cancellation.
//!
//! A failed creation is undone: the service is removed and its containers
//! are reaped after their stop grace period.
//!
//! ## Example
//!
//! ```ignore
//! use std::sync::Arc;
//! use swarmwait_cluster::{DockerClient, DockerConfig};
//! use swarmwait_converge::{ConvergeConfig, Converger};
//! use tokio_util::sync::CancellationToken;
//!
//! let client = DockerClient::new(&DockerConfig::from_env()?)?;
//! let converger = Converger::new(Arc::new(client));
//! let cancel = CancellationToken::new();
//! converger
//!     .await_update_convergence("web", &ConvergeConfig::default(), &cancel)
//!     .await?;
//! ```

pub mod config;
pub mod converger;
pub mod error;
pub mod order;
pub mod poller;
pub mod rollout;
pub mod session;
pub mod slots;
pub mod teardown;

pub use config::ConvergeConfig;
pub use converger::Converger;
pub use error::{Error, Result};
pub use order::{LIFECYCLE, StateRank};
pub use poller::{ConvergeMode, Convergence, Poller};
pub use rollout::{Outcome, RolloutFailure, RolloutVerdict};
pub use session::{ConvergenceSession, Progress, SlotProgress};
pub use slots::{ActiveNodes, SlotMap};
pub use teardown::TeardownReport;
