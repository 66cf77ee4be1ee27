//! Kubernetes Event recording for the Gatling controller.
//!
//! Wraps `kube::runtime::events::Recorder` behind a trait so reconcile code
//! can emit Events visible via `kubectl describe gatling` and be tested
//! without an API server.
//!
//! Events are fire-and-forget: failures are logged as warnings and never
//! propagate errors.

use async_trait::async_trait;
use k8s_openapi::api::core::v1::ObjectReference;
use kube::runtime::events::{Event, EventType, Recorder, Reporter};
use kube::Client;
use tracing::warn;

/// Trait for publishing Kubernetes Events.
#[async_trait]
pub trait EventPublisher: Send + Sync {
    /// Publish an Event on the given resource.
    ///
    /// # Arguments
    ///
    /// * `resource_ref` - The Kubernetes object this event is about
    /// * `type_` - Normal or Warning
    /// * `reason` - Machine-readable reason string (see [`reasons`])
    /// * `action` - What action was taken (see [`actions`])
    /// * `note` - Optional human-readable message
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    );
}

/// Production implementation wrapping `kube::runtime::events::Recorder`.
pub struct KubeEventPublisher {
    recorder: Recorder,
}

impl KubeEventPublisher {
    /// Create a publisher reporting as the given controller name
    pub fn new(client: Client, controller_name: &str) -> Self {
        let reporter = Reporter {
            controller: controller_name.to_string(),
            instance: std::env::var("POD_NAME").ok(),
        };
        Self {
            recorder: Recorder::new(client, reporter),
        }
    }
}

#[async_trait]
impl EventPublisher for KubeEventPublisher {
    async fn publish(
        &self,
        resource_ref: &ObjectReference,
        type_: EventType,
        reason: &str,
        action: &str,
        note: Option<String>,
    ) {
        let event = Event {
            type_,
            reason: reason.to_string(),
            note,
            action: action.to_string(),
            secondary: None,
        };
        if let Err(e) = self.recorder.publish(&event, resource_ref).await {
            warn!(reason, action, error = %e, "Failed to publish Kubernetes event");
        }
    }
}

/// No-op implementation for tests.
pub struct NoopEventPublisher;

#[async_trait]
impl EventPublisher for NoopEventPublisher {
    async fn publish(
        &self,
        _resource_ref: &ObjectReference,
        _type_: EventType,
        _reason: &str,
        _action: &str,
        _note: Option<String>,
    ) {
    }
}

/// Well-known event reason strings.
pub mod reasons {
    /// Runner job created
    pub const RUNNER_STARTED: &str = "RunnerStarted";
    /// Every runner pod succeeded
    pub const RUNNER_COMPLETED: &str = "RunnerCompleted";
    /// Runner job failed, timed out or was never created
    pub const RUNNER_FAILED: &str = "RunnerFailed";
    /// Reporter job created
    pub const REPORTER_STARTED: &str = "ReporterStarted";
    /// Report generated and uploaded
    pub const REPORT_COMPLETED: &str = "ReportCompleted";
    /// Reporter job failed or timed out
    pub const REPORTER_FAILED: &str = "ReporterFailed";
    /// Report phase skipped for lack of storage settings
    pub const REPORT_SKIPPED: &str = "ReportSkipped";
    /// Notification delivered
    pub const NOTIFICATION_SENT: &str = "NotificationSent";
    /// Notification could not be delivered
    pub const NOTIFICATION_FAILED: &str = "NotificationFailed";
    /// Jobs and owned resources removed after completion
    pub const CLEANED_UP: &str = "CleanedUp";
}

/// Well-known event action strings.
pub mod actions {
    /// A job was created
    pub const CREATE: &str = "Create";
    /// Job status was observed
    pub const OBSERVE: &str = "Observe";
    /// A notification was posted
    pub const NOTIFY: &str = "Notify";
    /// Resources were deleted
    pub const CLEANUP: &str = "Cleanup";
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn noop_publisher_accepts_events() {
        let publisher = NoopEventPublisher;
        publisher
            .publish(
                &ObjectReference::default(),
                EventType::Warning,
                reasons::RUNNER_FAILED,
                actions::OBSERVE,
                Some("runner timed out".to_string()),
            )
            .await;
    }

    #[test]
    fn reasons_are_distinct() {
        let all = [
            reasons::RUNNER_STARTED,
            reasons::RUNNER_COMPLETED,
            reasons::RUNNER_FAILED,
            reasons::REPORTER_STARTED,
            reasons::REPORT_COMPLETED,
            reasons::REPORTER_FAILED,
            reasons::REPORT_SKIPPED,
            reasons::NOTIFICATION_SENT,
            reasons::NOTIFICATION_FAILED,
            reasons::CLEANED_UP,
        ];
        let unique: std::collections::BTreeSet<_> = all.iter().collect();
        assert_eq!(unique.len(), all.len());
    }
}
