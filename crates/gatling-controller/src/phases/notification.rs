//! Notification phase: announce the finished run

use kube::runtime::events::EventType;
use kube::ResourceExt;
use tracing::{info, warn};

use gatling_common::crd::Gatling;
use gatling_common::events::{actions, reasons};
use gatling_common::metrics;

use super::PhaseOutcome;
use crate::controller::{persist_status, Context};
use crate::error::ControllerError;
use crate::storage::ensure_storage_info;

/// Report URL announced when no report was requested
pub const NO_REPORT_URL: &str = "none";

/// Drive the notification phase one step
///
/// Every failure is returned as an error and retried; there is no budget
/// after which notification gives up.
pub async fn reconcile_notification(
    mut gatling: Gatling,
    ctx: &Context,
) -> Result<PhaseOutcome, ControllerError> {
    let report_url = if gatling.spec.generate_report {
        ensure_storage_info(ctx, &mut gatling).await?.report_url
    } else {
        NO_REPORT_URL.to_string()
    };

    let provider = gatling.spec.notification_provider().to_string();
    if let Err(e) = send(&gatling, ctx, &provider, &report_url).await {
        warn!(%provider, error = %e, "failed to send notification");
        metrics::record_notification_failure(&provider);
        ctx.publish(
            &gatling,
            EventType::Warning,
            reasons::NOTIFICATION_FAILED,
            actions::NOTIFY,
            format!("Failed to notify via {provider}: {e}"),
        )
        .await;
        return Err(e);
    }

    let mut status = gatling.status_or_default();
    status.notification_completed = true;
    persist_status(ctx, &mut gatling, status).await?;

    info!(%provider, %report_url, "notification has been sent");
    ctx.publish(
        &gatling,
        EventType::Normal,
        reasons::NOTIFICATION_SENT,
        actions::NOTIFY,
        format!("Notified via {provider}"),
    )
    .await;
    Ok(PhaseOutcome::Requeue)
}

async fn send(
    gatling: &Gatling,
    ctx: &Context,
    provider: &str,
    report_url: &str,
) -> Result<(), ControllerError> {
    let namespace = gatling.namespace().ok_or(ControllerError::MissingNamespace)?;
    let secret_name = &gatling.spec.notification_service_spec.secret_name;
    let secret_data = ctx
        .kube
        .get_secret_data(secret_name, &namespace)
        .await?
        .ok_or_else(|| ControllerError::MissingSecret(secret_name.clone()))?;

    ctx.notifier
        .notify(provider, &gatling.name_any(), report_url, &secret_data)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;
    use std::sync::Arc;

    use gatling_common::crd::GatlingStatus;
    use gatling_providers::NotifyError;

    use crate::client::MockGatlingKubeClient;
    use crate::notifier::MockNotifier;
    use crate::phases::test_support::{record_patches, sample_gatling, with_aws_report};

    fn notify_gatling(status: GatlingStatus) -> Gatling {
        let mut gatling = sample_gatling(1, Some(status));
        gatling.spec.notify_report = true;
        gatling.spec.notification_service_spec.secret_name = "slack-webhook".to_string();
        gatling
    }

    fn runner_done() -> GatlingStatus {
        GatlingStatus {
            runner_job_name: "load-test-1-runner".to_string(),
            runner_completed: true,
            ..Default::default()
        }
    }

    fn webhook_secret(mock: &mut MockGatlingKubeClient) {
        mock.expect_get_secret_data()
            .withf(|name, ns| name == "slack-webhook" && ns == "perf")
            .returning(|_, _| {
                Ok(Some(BTreeMap::from([(
                    "incoming-webhook-url".to_string(),
                    b"https://hooks.example.com/x".to_vec(),
                )])))
            });
    }

    #[tokio::test]
    async fn story_without_report_announces_none() {
        let mut kube = MockGatlingKubeClient::new();
        webhook_secret(&mut kube);
        let written = record_patches(&mut kube);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|provider, name, url, data| {
                provider == "slack"
                    && name == "load-test-1"
                    && url == "none"
                    && data.contains_key("incoming-webhook-url")
            })
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let ctx = Context::for_testing(Arc::new(kube), Arc::new(notifier));
        let outcome = reconcile_notification(notify_gatling(runner_done()), &ctx)
            .await
            .expect("notification");

        assert_eq!(outcome, PhaseOutcome::Requeue);
        let written = written.lock().expect("lock");
        assert_eq!(written.len(), 1);
        assert!(written[0].notification_completed);
    }

    #[tokio::test]
    async fn story_with_report_announces_stored_url() {
        let status = GatlingStatus {
            report_completed: true,
            report_storage_path: "s3:b/load-test-1/7".to_string(),
            report_url: "https://b.s3.amazonaws.com/load-test-1/7/index.html".to_string(),
            ..runner_done()
        };
        let mut gatling = with_aws_report(notify_gatling(status));
        gatling.spec.notify_report = true;

        let mut kube = MockGatlingKubeClient::new();
        webhook_secret(&mut kube);
        let _written = record_patches(&mut kube);

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|_, _, url, _| url == "https://b.s3.amazonaws.com/load-test-1/7/index.html")
            .times(1)
            .returning(|_, _, _, _| Ok(()));

        let ctx = Context::for_testing(Arc::new(kube), Arc::new(notifier));
        reconcile_notification(gatling, &ctx).await.expect("notification");
    }

    #[tokio::test]
    async fn story_webhook_failure_is_retried_without_completing() {
        let mut kube = MockGatlingKubeClient::new();
        webhook_secret(&mut kube);
        kube.expect_patch_status().never();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .returning(|_, _, _, _| Err(NotifyError::Rejected { status: 503 }));

        let ctx = Context::for_testing(Arc::new(kube), Arc::new(notifier));
        let err = reconcile_notification(notify_gatling(runner_done()), &ctx)
            .await
            .expect_err("webhook down");
        assert!(err.is_retryable());
    }

    #[tokio::test]
    async fn story_unknown_provider_keeps_failing() {
        let mut gatling = notify_gatling(runner_done());
        gatling.spec.notification_service_spec.provider = "teams".to_string();

        let mut kube = MockGatlingKubeClient::new();
        webhook_secret(&mut kube);
        kube.expect_patch_status().never();

        let mut notifier = MockNotifier::new();
        notifier
            .expect_notify()
            .withf(|provider, _, _, _| provider == "teams")
            .returning(|p, _, _, _| Err(NotifyError::UnknownProvider(p.to_string())));

        let ctx = Context::for_testing(Arc::new(kube), Arc::new(notifier));
        let err = reconcile_notification(gatling, &ctx)
            .await
            .expect_err("unknown provider");
        assert!(matches!(err, ControllerError::Notify(NotifyError::UnknownProvider(_))));
    }

    #[tokio::test]
    async fn story_missing_secret_is_an_error() {
        let mut kube = MockGatlingKubeClient::new();
        kube.expect_get_secret_data().returning(|_, _| Ok(None));
        kube.expect_patch_status().never();

        let mut notifier = MockNotifier::new();
        notifier.expect_notify().never();

        let ctx = Context::for_testing(Arc::new(kube), Arc::new(notifier));
        let err = reconcile_notification(notify_gatling(runner_done()), &ctx)
            .await
            .expect_err("no secret");
        assert!(matches!(err, ControllerError::MissingSecret(ref name) if name == "slack-webhook"));
    }
}
