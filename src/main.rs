//! # swarmwait
//!
//! Waits for a Docker Swarm service to converge after it was created or
//! updated.
//!
//! ## Startup
//!
//! 1. **Tracing** - `RUST_LOG` filter, `info` by default
//! 2. **Settings** - settings file, then environment, then flags
//! 3. **Docker client** - the daemon from `--host` or `DOCKER_HOST`
//! 4. **Command** - runs until it finishes or Ctrl+C cancels it
//!
//! Ctrl+C cancels the wait. A cancelled creation is still torn down, without
//! waiting out container grace periods.

#![forbid(unsafe_code)]
#![forbid(clippy::unwrap_used)]
#![forbid(clippy::panic)]
#![deny(clippy::expect_used)]

use std::sync::Arc;

use anyhow::{Context, Result};
use clap::Parser;
use tokio::signal;
use tokio_util::sync::CancellationToken;
use tracing::{error, info};
use tracing_subscriber::{EnvFilter, layer::SubscriberExt, util::SubscriberInitExt};

use swarmwait::cli::Cli;
use swarmwait::{Settings, commands};
use swarmwait_cluster::DockerClient;
use swarmwait_converge::Converger;

#[tokio::main]
async fn main() -> Result<()> {
    init_tracing();

    let cli = Cli::parse();
    let settings = Settings::load(cli.config.as_deref())
        .context("Failed to load settings")?
        .with_host(cli.host);

    let client = DockerClient::new(&settings.docker).with_context(|| {
        format!("Failed to create Docker client for '{}'", settings.docker.host)
    })?;
    info!(docker = %client.base_url(), "Docker client ready");
    let converger = Converger::new(Arc::new(client));

    let cancel = CancellationToken::new();
    tokio::spawn(cancel_on_ctrl_c(cancel.clone()));

    commands::run(cli.command, &settings, &converger, &cancel).await
}

/// Initialize tracing subscriber with environment filter.
fn init_tracing() {
    tracing_subscriber::registry()
        .with(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")))
        .with(tracing_subscriber::fmt::layer().with_writer(std::io::stderr))
        .init();
}

/// Cancel the running command on Ctrl+C.
async fn cancel_on_ctrl_c(cancel: CancellationToken) {
    match signal::ctrl_c().await {
        Ok(()) => {
            info!("Received Ctrl+C, cancelling");
            cancel.cancel();
        }
        Err(err) => error!("Failed to listen for shutdown signal: {}", err),
    }
}
