//! Job lifecycle polling shared by the runner and reporter phases

use std::fmt;

use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{debug, error, info};

use gatling_common::crd::{Gatling, GatlingStatus};
use gatling_common::events::{actions, reasons};
use gatling_common::kube_utils::{epoch_seconds, is_job_finished, job_counts};
use gatling_common::metrics;

use super::PhaseOutcome;
use crate::controller::{persist_status, Context};
use crate::error::ControllerError;

/// The two Jobs a Gatling run creates
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum JobKind {
    /// Parallel load-test Job
    Runner,
    /// Single-pod report Job
    Reporter,
}

impl JobKind {
    /// Short name used in messages and metric labels
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Runner => "runner",
            Self::Reporter => "reporter",
        }
    }

    fn job_name(self, status: &GatlingStatus) -> &str {
        match self {
            Self::Runner => &status.runner_job_name,
            Self::Reporter => &status.reporter_job_name,
        }
    }

    fn start_time(self, status: &GatlingStatus) -> i64 {
        match self {
            Self::Runner => status.runner_start_time,
            Self::Reporter => status.reporter_start_time,
        }
    }

    /// Succeeded pod count that means the Job did its work
    fn expected_successes(self, gatling: &Gatling) -> i32 {
        match self {
            Self::Runner => gatling.spec.parallelism(),
            Self::Reporter => 1,
        }
    }

    fn mark_completed(self, status: &mut GatlingStatus) {
        match self {
            Self::Runner => status.runner_completed = true,
            Self::Reporter => status.report_completed = true,
        }
    }

    fn completed_reason(self) -> &'static str {
        match self {
            Self::Runner => reasons::RUNNER_COMPLETED,
            Self::Reporter => reasons::REPORT_COMPLETED,
        }
    }

    fn failed_reason(self) -> &'static str {
        match self {
            Self::Runner => reasons::RUNNER_FAILED,
            Self::Reporter => reasons::REPORTER_FAILED,
        }
    }
}

impl fmt::Display for JobKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Observe the Job of `kind` recorded in status and advance the run
///
/// - Job missing past the creation budget, or running past the run budget:
///   fatal
/// - Job finished with the expected successes: phase completed
/// - Job finished otherwise: fatal
/// - Anything else: look again later
///
/// Runner pod counts are copied into status on every observation.
pub(super) async fn track_job(
    ctx: &Context,
    mut gatling: Gatling,
    kind: JobKind,
) -> Result<PhaseOutcome, ControllerError> {
    let namespace = gatling.namespace().ok_or(ControllerError::MissingNamespace)?;
    let mut status = gatling.status_or_default();
    let job_name = kind.job_name(&status).to_string();
    let elapsed = epoch_seconds() - kind.start_time(&status);

    let Some(job) = ctx.kube.get_job(&job_name, &namespace).await? else {
        let budget = ctx.config.job_creation_wait.as_secs();
        if elapsed > budget as i64 {
            metrics::record_job_timeout(kind.as_str(), "creating");
            let message = format!("Runs out of time ({budget} sec) in creating the {kind} job");
            return fail(ctx, gatling, status, kind, job_name, message).await;
        }
        debug!(job = %job_name, "job has not been created yet");
        return Ok(PhaseOutcome::Requeue);
    };

    let (active, succeeded, failed) = job_counts(&job);
    if kind == JobKind::Runner {
        status.active = active;
        status.succeeded = succeeded;
        status.failed = failed;
        status.runner_completions = gatling.spec.runner_completions(succeeded);
    }

    let budget = ctx.config.job_run_wait.as_secs();
    if elapsed > budget as i64 {
        metrics::record_job_timeout(kind.as_str(), "running");
        let message = format!("Runs out of time ({budget} sec) in running the {kind} job");
        return fail(ctx, gatling, status, kind, job_name, message).await;
    }

    if is_job_finished(&job) {
        if succeeded == kind.expected_successes(&gatling) {
            info!(job = %job_name, succeeded, "job has completed");
            kind.mark_completed(&mut status);
            persist_status(ctx, &mut gatling, status).await?;
            ctx.publish(
                &gatling,
                EventType::Normal,
                kind.completed_reason(),
                actions::OBSERVE,
                format!("{kind} job {job_name} completed ({succeeded} succeeded)"),
            )
            .await;
            return Ok(PhaseOutcome::Requeue);
        }

        let backoff_limit = job.spec.as_ref().and_then(|s| s.backoff_limit).unwrap_or(0);
        let message = format!(
            "Failed to complete {kind} job (failed {failed} / backofflimit {backoff_limit}). Please review logs"
        );
        return fail(ctx, gatling, status, kind, job_name, message).await;
    }

    debug!(job = %job_name, active, succeeded, failed, "job is still running");
    if kind == JobKind::Runner {
        persist_status(ctx, &mut gatling, status).await?;
    }
    Ok(PhaseOutcome::Requeue)
}

async fn fail(
    ctx: &Context,
    mut gatling: Gatling,
    mut status: GatlingStatus,
    kind: JobKind,
    job_name: String,
    message: String,
) -> Result<PhaseOutcome, ControllerError> {
    error!(job = %job_name, %message, "Gatling run failed");
    status.error = Some(message.clone());
    persist_status(ctx, &mut gatling, status).await?;
    ctx.publish(
        &gatling,
        EventType::Warning,
        kind.failed_reason(),
        actions::OBSERVE,
        message,
    )
    .await;
    Ok(PhaseOutcome::Fatal { job_name })
}
