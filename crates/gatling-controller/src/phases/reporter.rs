//! Reporter phase: aggregate runner logs and publish an HTML report

use kube::runtime::events::EventType;
use tracing::{info, warn};

use gatling_common::crd::Gatling;
use gatling_common::events::{actions, reasons};
use gatling_common::kube_utils::epoch_seconds;

use super::tracking::{track_job, JobKind};
use super::PhaseOutcome;
use crate::compiler::compile_reporter_job;
use crate::controller::{persist_status, Context};
use crate::error::ControllerError;
use crate::storage::ensure_storage_info;

/// Drive the reporter phase one step
///
/// Without enough storage settings the report is skipped and counted as
/// done, so notification can still go out.
pub async fn reconcile_reporter(
    mut gatling: Gatling,
    ctx: &Context,
) -> Result<PhaseOutcome, ControllerError> {
    if !gatling.spec.has_storage_coordinates() {
        return skip_report(gatling, ctx).await;
    }

    let storage = ensure_storage_info(ctx, &mut gatling).await?;
    if !gatling.status_or_default().reporter_job_name.is_empty() {
        return track_job(ctx, gatling, JobKind::Reporter).await;
    }

    let job = compile_reporter_job(&gatling, &storage.path)?;
    ctx.kube.create_job(&job).await?;

    let job_name = gatling.reporter_job_name();
    let mut status = gatling.status_or_default();
    status.reporter_job_name = job_name.clone();
    status.reporter_start_time = epoch_seconds();
    status.report_completed = false;
    status.notification_completed = false;
    persist_status(ctx, &mut gatling, status).await?;

    info!(job = %job_name, storage_path = %storage.path, "created reporter job");
    ctx.publish(
        &gatling,
        EventType::Normal,
        reasons::REPORTER_STARTED,
        actions::CREATE,
        format!("Created reporter job {job_name}"),
    )
    .await;
    Ok(PhaseOutcome::Requeue)
}

async fn skip_report(mut gatling: Gatling, ctx: &Context) -> Result<PhaseOutcome, ControllerError> {
    warn!(
        provider = %gatling.spec.cloud_storage_provider(),
        bucket = %gatling.spec.cloud_storage_bucket(),
        "minimum cloud storage settings are missing, skipping the report"
    );
    let mut status = gatling.status_or_default();
    status.report_completed = true;
    status.notification_completed = false;
    persist_status(ctx, &mut gatling, status).await?;

    ctx.publish(
        &gatling,
        EventType::Warning,
        reasons::REPORT_SKIPPED,
        actions::OBSERVE,
        "Report skipped: cloud storage provider, bucket or region is missing".to_string(),
    )
    .await;
    Ok(PhaseOutcome::Requeue)
}
