#![deny(clippy::unwrap_used)]
#![deny(clippy::expect_used)]
#![deny(clippy::panic)]

//! # swarmwait
//!
//! Wait for Docker Swarm services to converge, and undo creations that never
//! do.
//!
//! This library re-exports the workspace crates and holds the command-line
//! front end.

pub use swarmwait_cluster;
pub use swarmwait_converge;
pub use swarmwait_core;

pub mod cli;
pub mod commands;
pub mod settings;

pub use settings::Settings;
