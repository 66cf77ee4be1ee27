//! Gatling Operator - distributed Gatling load tests on Kubernetes

use std::sync::Arc;

use clap::Parser;
use kube::Client;

use gatling_common::telemetry::{init_telemetry, TelemetryConfig};
use gatling_controller::Context;
use gatling_operator::config::Cli;
use gatling_operator::controller_runner::run_gatling_controller;
use gatling_operator::startup::{crd_yaml, ensure_crd_installed};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let cli = Cli::parse();

    if cli.crd {
        println!("{}", crd_yaml()?);
        return Ok(());
    }

    let _telemetry = init_telemetry(TelemetryConfig::default())
        .map_err(|e| anyhow::anyhow!("Failed to initialize telemetry: {}", e))?;

    let client = Client::try_default()
        .await
        .map_err(|e| anyhow::anyhow!("Failed to create Kubernetes client: {}", e))?;

    ensure_crd_installed(&client).await?;

    let config = cli.controller_config();
    tracing::info!(
        requeue_interval = ?config.requeue_interval,
        job_creation_wait = ?config.job_creation_wait,
        job_run_wait = ?config.job_run_wait,
        "Starting Gatling operator"
    );

    let ctx = Arc::new(
        Context::new(client.clone(), config)
            .map_err(|e| anyhow::anyhow!("Failed to build controller context: {}", e))?,
    );
    run_gatling_controller(client, ctx, cli.namespace()).await;

    tracing::info!("Gatling operator shut down");
    Ok(())
}
