//! CLI command definitions using clap.

use std::path::PathBuf;
use std::time::Duration;

use clap::{Args, Parser, Subcommand};
use swarmwait_core::parse_duration;

/// swarmwait - wait for Docker Swarm services to converge
#[derive(Parser, Debug)]
#[command(name = "swarmwait")]
#[command(version)]
#[command(about = "Wait for Docker Swarm services to converge")]
#[command(
    long_about = "swarmwait polls a Docker Swarm service after it was created or updated until its replicas are running, its rollout completed, or a deadline passed. A creation that never converges is removed again."
)]
pub struct Cli {
    /// Settings file with [converge] and [docker] tables
    #[arg(short, long, env = "SWARMWAIT_CONFIG")]
    pub config: Option<PathBuf>,

    /// Docker daemon address (tcp://, http:// or https://)
    #[arg(long)]
    pub host: Option<String>,

    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Wait for a newly created service; remove it if it never converges
    Create {
        /// Service ID or name
        service: String,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Wait for an updated service to finish its rollout
    Update {
        /// Service ID or name
        service: String,

        #[command(flatten)]
        wait: WaitArgs,
    },

    /// Remove a service and reap its containers
    Teardown {
        /// Service ID or name
        service: String,
    },

    /// Show replica progress once
    Status {
        /// Service ID or name
        service: String,

        /// Count replicas against the rollback target
        #[arg(long, default_value_t = false)]
        rollback: bool,
    },
}

/// Overrides for the converge settings.
#[derive(Args, Debug, Clone, Default, PartialEq, Eq)]
pub struct WaitArgs {
    /// Give up after this long (e.g. 3m, 90s)
    #[arg(long, value_parser = parse_duration)]
    pub timeout: Option<Duration>,

    /// Wait this long before the first poll
    #[arg(long, value_parser = parse_duration)]
    pub delay: Option<Duration>,

    /// First interval between polls
    #[arg(long, value_parser = parse_duration)]
    pub min_interval: Option<Duration>,

    /// Longest interval between polls
    #[arg(long, value_parser = parse_duration)]
    pub max_interval: Option<Duration>,
}
