//! Gatling controller implementation
//!
//! Reconciles Gatling resources through a fixed three-phase workflow:
//! Runner → Reporter → Notification
//!
//! Every pass starts from a fresh read of the resource and runs at most one
//! phase handler. All progress lives in `GatlingStatus`; the controller keeps
//! no state of its own between passes.

use std::sync::Arc;
use std::time::{Duration, Instant};

use kube::runtime::controller::Action;
use kube::runtime::events::EventType;
use kube::{Client, Resource, ResourceExt};
use tracing::{debug, error, info, instrument, warn};

use gatling_common::crd::{Gatling, GatlingStatus};
use gatling_common::events::{actions, reasons};
use gatling_common::{metrics, EventPublisher, KubeEventPublisher};

use crate::client::{GatlingKubeClient, GatlingKubeClientImpl};
use crate::error::ControllerError;
use crate::notifier::{Notifier, ProviderNotifier};
use crate::phases::{self, PhaseOutcome};

/// Name the controller reports events under
pub const CONTROLLER_NAME: &str = "gatling-controller";

/// Timing knobs of the controller
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ControllerConfig {
    /// Delay before a phase that is still in progress is looked at again
    pub requeue_interval: Duration,
    /// How long a created Job may stay invisible before the run fails
    pub job_creation_wait: Duration,
    /// How long a Job may run before the run fails
    pub job_run_wait: Duration,
}

impl Default for ControllerConfig {
    fn default() -> Self {
        Self {
            requeue_interval: Duration::from_secs(5),
            job_creation_wait: Duration::from_secs(600),
            job_run_wait: Duration::from_secs(10800),
        }
    }
}

/// Shared context for the Gatling controller
pub struct Context {
    /// Kubernetes access
    pub kube: Arc<dyn GatlingKubeClient>,
    /// Completion announcements
    pub notifier: Arc<dyn Notifier>,
    /// Event publisher for emitting Kubernetes Events
    pub events: Arc<dyn EventPublisher>,
    /// Timing knobs
    pub config: ControllerConfig,
}

impl Context {
    /// Create a context backed by a real cluster
    pub fn new(client: Client, config: ControllerConfig) -> Result<Self, ControllerError> {
        Ok(Self {
            kube: Arc::new(GatlingKubeClientImpl::new(client.clone())),
            notifier: Arc::new(ProviderNotifier::new()?),
            events: Arc::new(KubeEventPublisher::new(client, CONTROLLER_NAME)),
            config,
        })
    }

    /// Create a context for testing with mock clients
    #[cfg(test)]
    pub fn for_testing(kube: Arc<dyn GatlingKubeClient>, notifier: Arc<dyn Notifier>) -> Self {
        Self {
            kube,
            notifier,
            events: Arc::new(gatling_common::NoopEventPublisher),
            config: ControllerConfig::default(),
        }
    }

    /// Publish an event about `gatling`
    pub(crate) async fn publish(
        &self,
        gatling: &Gatling,
        type_: EventType,
        reason: &str,
        action: &str,
        note: String,
    ) {
        self.events
            .publish(&gatling.object_ref(&()), type_, reason, action, Some(note))
            .await;
    }
}

/// Write `status` and replace `gatling` with the stored object
///
/// Fails with a conflict if `gatling` is stale; the whole pass is then
/// retried from a fresh read.
pub(crate) async fn persist_status(
    ctx: &Context,
    gatling: &mut Gatling,
    status: GatlingStatus,
) -> Result<(), ControllerError> {
    *gatling = ctx.kube.patch_status(gatling, &status).await?;
    Ok(())
}

/// What a reconcile pass does for a given resource state
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum Phase {
    /// Load test still to run or running
    Runner,
    /// Report still to build or building
    Reporter,
    /// Notification still to send
    Notification,
    /// Workflow done; only cleanup remains
    Completed,
    /// A fatal error was recorded; only the failed Job's cleanup runs until
    /// the status changes
    Failed,
}

impl Phase {
    /// Pick the phase for `gatling`; guards are checked in workflow order
    pub fn select(gatling: &Gatling) -> Self {
        if gatling.is_completed() {
            return Self::Completed;
        }
        let status = gatling.status_or_default();
        if status.error.is_some() {
            Self::Failed
        } else if !status.runner_completed {
            Self::Runner
        } else if gatling.spec.generate_report && !status.report_completed {
            Self::Reporter
        } else if gatling.spec.notify_report && !status.notification_completed {
            Self::Notification
        } else {
            Self::Completed
        }
    }

    /// Metric label
    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Runner => "runner",
            Self::Reporter => "reporter",
            Self::Notification => "notification",
            Self::Completed => "cleanup",
            Self::Failed => "failed",
        }
    }
}

/// Reconcile a Gatling resource
#[instrument(skip(gatling, ctx), fields(gatling = %gatling.name_any()))]
pub async fn reconcile(gatling: Arc<Gatling>, ctx: Arc<Context>) -> Result<Action, ControllerError> {
    let started = Instant::now();
    let name = gatling.name_any();
    let namespace = gatling.namespace().ok_or(ControllerError::MissingNamespace)?;

    let Some(gatling) = ctx.kube.get_gatling(&name, &namespace).await? else {
        debug!("Gatling no longer exists");
        return Ok(Action::await_change());
    };

    let phase = Phase::select(&gatling);
    debug!(phase = phase.as_str(), "reconciling Gatling");
    let result = run_phase(phase, gatling, &ctx).await;
    metrics::record_reconcile(phase.as_str(), result.is_ok(), started.elapsed().as_secs_f64());
    result
}

async fn run_phase(phase: Phase, gatling: Gatling, ctx: &Context) -> Result<Action, ControllerError> {
    let namespace = gatling.namespace().ok_or(ControllerError::MissingNamespace)?;
    let cleanup_after_job_done = gatling.spec.cleanup_after_job_done;

    let outcome = match phase {
        Phase::Completed => {
            cleanup(&gatling, ctx).await?;
            return Ok(Action::await_change());
        }
        Phase::Failed => {
            let status = gatling.status_or_default();
            debug!(error = ?status.error, "Gatling has failed, waiting for a status change");
            if cleanup_after_job_done {
                delete_failed_job(ctx, failed_job_name(&status), &namespace).await?;
            }
            return Ok(Action::await_change());
        }
        Phase::Runner => phases::reconcile_runner(gatling, ctx).await?,
        Phase::Reporter => phases::reconcile_reporter(gatling, ctx).await?,
        Phase::Notification => phases::reconcile_notification(gatling, ctx).await?,
    };

    match outcome {
        PhaseOutcome::Requeue => Ok(Action::requeue(ctx.config.requeue_interval)),
        PhaseOutcome::Fatal { job_name } => {
            if cleanup_after_job_done {
                delete_failed_job(ctx, &job_name, &namespace).await?;
            }
            Ok(Action::await_change())
        }
    }
}

/// Job a recorded fatal error belongs to
///
/// The reporter only ever runs after the runner completed, so a completed
/// runner means the reporter is the one that failed.
fn failed_job_name(status: &GatlingStatus) -> &str {
    if status.runner_completed {
        &status.reporter_job_name
    } else {
        &status.runner_job_name
    }
}

/// Delete the Job of a failed run
///
/// Errors are returned so the error policy requeues the pass; the
/// [`Phase::Failed`] arm then tries again until the delete goes through.
async fn delete_failed_job(
    ctx: &Context,
    job_name: &str,
    namespace: &str,
) -> Result<(), ControllerError> {
    if job_name.is_empty() {
        return Ok(());
    }
    info!(job = %job_name, "deleting job of failed run");
    ctx.kube.delete_job(job_name, namespace).await?;
    Ok(())
}

/// Delete what a finished run leaves behind, if the Gatling asks for it
///
/// Jobs go first, then the declared PersistentVolume, then the Gatling
/// itself. Owned ConfigMaps and the claim follow the Gatling through
/// garbage collection.
async fn cleanup(gatling: &Gatling, ctx: &Context) -> Result<(), ControllerError> {
    let name = gatling.name_any();
    info!(gatling = %name, "Gatling has completed");

    if !gatling.spec.cleanup_after_job_done || gatling.meta().deletion_timestamp.is_some() {
        return Ok(());
    }

    let namespace = gatling.namespace().ok_or(ControllerError::MissingNamespace)?;
    let status = gatling.status_or_default();
    for job_name in [&status.runner_job_name, &status.reporter_job_name] {
        if !job_name.is_empty() {
            ctx.kube.delete_job(job_name, &namespace).await?;
        }
    }
    if let Some(pv) = &gatling.spec.persistent_volume_spec {
        info!(volume = %pv.name, "cleaning up persistent volume");
        ctx.kube.delete_persistent_volume(&pv.name).await?;
    }

    ctx.publish(
        gatling,
        EventType::Normal,
        reasons::CLEANED_UP,
        actions::CLEANUP,
        format!("Deleting Gatling {name} after completion"),
    )
    .await;
    ctx.kube.delete_gatling(&name, &namespace).await?;
    Ok(())
}

/// Error policy for the controller
///
/// Every error is requeued after the standard interval. A conflict on the
/// status write lands here too, so the next pass re-reads and re-decides.
pub fn error_policy(gatling: Arc<Gatling>, error: &ControllerError, ctx: Arc<Context>) -> Action {
    if error.is_retryable() {
        warn!(%error, gatling = %gatling.name_any(), "reconciliation failed, will retry");
    } else {
        error!(?error, gatling = %gatling.name_any(), "reconciliation failed");
    }
    Action::requeue(ctx.config.requeue_interval)
}
