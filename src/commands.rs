//! Command execution.

use anyhow::{Context, Result};
use swarmwait_converge::{Convergence, Converger, Progress};
use swarmwait_core::format_duration;
use tokio_util::sync::CancellationToken;

use crate::cli::Commands;
use crate::settings::Settings;

/// Run one command to completion.
///
/// # Errors
///
/// Returns the command's failure with context naming the service.
pub async fn run(
    command: Commands,
    settings: &Settings,
    converger: &Converger,
    cancel: &CancellationToken,
) -> Result<()> {
    match command {
        Commands::Create { service, wait } => {
            let config = settings.converge_for(&wait);
            let convergence = converger
                .await_create_convergence(&service, &config, cancel)
                .await
                .with_context(|| format!("Creating service '{service}' did not converge"))?;
            print_convergence(&convergence);
        }
        Commands::Update { service, wait } => {
            let config = settings.converge_for(&wait);
            let convergence = converger
                .await_update_convergence(&service, &config, cancel)
                .await
                .with_context(|| format!("Updating service '{service}' did not converge"))?;
            print_convergence(&convergence);
        }
        Commands::Teardown { service } => {
            let report = converger
                .teardown(&service, cancel)
                .await
                .with_context(|| format!("Failed to tear down service '{service}'"))?;
            if report.service_removed {
                println!("Removed service {service}");
            } else {
                println!("Service {service} was already gone");
            }
            for container in &report.containers_removed {
                println!("Removed container {container}");
            }
        }
        Commands::Status { service, rollback } => {
            let progress = converger
                .status(&service, rollback)
                .await
                .with_context(|| format!("Failed to read status of service '{service}'"))?;
            print_progress(&progress);
        }
    }
    Ok(())
}

fn print_convergence(convergence: &Convergence) {
    println!(
        "Service {} converged after {} ({} polls)",
        convergence.service_id,
        format_duration(convergence.elapsed),
        convergence.polls
    );
    if let Some(progress) = &convergence.progress {
        print_progress(progress);
    }
}

fn print_progress(progress: &Progress) {
    println!("{progress}");
    for line in &progress.slots {
        println!("  {line}");
    }
}
