//! Runner phase: run the load test across the requested replicas

use kube::runtime::events::EventType;
use tracing::{debug, info};

use gatling_common::crd::Gatling;
use gatling_common::events::{actions, reasons};
use gatling_common::kube_utils::epoch_seconds;

use super::tracking::{track_job, JobKind};
use super::PhaseOutcome;
use crate::compiler::{
    compile_config_maps, compile_persistent_volume, compile_persistent_volume_claim,
    compile_runner_job,
};
use crate::controller::{persist_status, Context};
use crate::error::ControllerError;
use crate::storage::ensure_storage_info;

/// Drive the runner phase one step
///
/// Creates the supporting ConfigMaps and volumes if missing, starts the
/// runner Job on a fresh run, and otherwise tracks the recorded Job.
pub async fn reconcile_runner(
    gatling: Gatling,
    ctx: &Context,
) -> Result<PhaseOutcome, ControllerError> {
    ensure_volumes(&gatling, ctx).await?;

    if gatling.status_or_default().runner_job_name.is_empty() {
        return start_runner(gatling, ctx).await;
    }
    track_job(ctx, gatling, JobKind::Runner).await
}

async fn ensure_volumes(gatling: &Gatling, ctx: &Context) -> Result<(), ControllerError> {
    for config_map in compile_config_maps(gatling)? {
        ctx.kube.create_config_map(&config_map).await?;
    }
    if let Some(volume) = compile_persistent_volume(gatling) {
        ctx.kube.create_persistent_volume(&volume).await?;
    }
    if let Some(claim) = compile_persistent_volume_claim(gatling)? {
        ctx.kube.create_persistent_volume_claim(&claim).await?;
    }
    Ok(())
}

async fn start_runner(mut gatling: Gatling, ctx: &Context) -> Result<PhaseOutcome, ControllerError> {
    let storage_path = if gatling.spec.generate_report {
        ensure_storage_info(ctx, &mut gatling).await?.path
    } else {
        String::new()
    };

    let job = compile_runner_job(&gatling, &storage_path)?;
    ctx.kube.create_job(&job).await?;

    let job_name = gatling.runner_job_name();
    let parallelism = gatling.spec.parallelism();
    let mut status = gatling.status_or_default();
    status.runner_job_name = job_name.clone();
    status.runner_start_time = epoch_seconds();
    status.active = 0;
    status.succeeded = 0;
    status.failed = 0;
    status.runner_completions = gatling.spec.runner_completions(0);
    status.runner_completed = false;
    status.report_completed = false;
    status.notification_completed = false;
    status.error = None;
    persist_status(ctx, &mut gatling, status).await?;

    info!(job = %job_name, parallelism, "created runner job");
    debug!(storage_path = %storage_path, "runner uploads results here");
    ctx.publish(
        &gatling,
        EventType::Normal,
        reasons::RUNNER_STARTED,
        actions::CREATE,
        format!("Created runner job {job_name} with parallelism {parallelism}"),
    )
    .await;
    Ok(PhaseOutcome::Requeue)
}
