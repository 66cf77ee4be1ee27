//! Notification seam of the controller

use std::collections::BTreeMap;
use std::time::Duration;

use async_trait::async_trait;

#[cfg(test)]
use mockall::automock;

use gatling_providers::{NotificationProvider, NotifyError};

const NOTIFY_TIMEOUT: Duration = Duration::from_secs(10);

/// Sends the "run finished" announcement for a Gatling
#[cfg_attr(test, automock)]
#[async_trait]
pub trait Notifier: Send + Sync {
    /// Announce `gatling_name` through the provider called `provider`
    async fn notify(
        &self,
        provider: &str,
        gatling_name: &str,
        report_url: &str,
        secret_data: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), NotifyError>;
}

/// Notifier backed by [`NotificationProvider`] over a shared HTTP client
pub struct ProviderNotifier {
    http: reqwest::Client,
}

impl ProviderNotifier {
    /// Create a notifier with its own HTTP client
    pub fn new() -> Result<Self, NotifyError> {
        let http = reqwest::Client::builder().timeout(NOTIFY_TIMEOUT).build()?;
        Ok(Self { http })
    }
}

#[async_trait]
impl Notifier for ProviderNotifier {
    async fn notify(
        &self,
        provider: &str,
        gatling_name: &str,
        report_url: &str,
        secret_data: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), NotifyError> {
        NotificationProvider::from_name(provider)?
            .notify(&self.http, gatling_name, report_url, secret_data)
            .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn unknown_provider_fails_without_network() {
        let notifier = ProviderNotifier::new().expect("http client");
        let err = notifier
            .notify("teams", "load-test", "none", &BTreeMap::new())
            .await
            .expect_err("unknown provider");
        assert!(matches!(err, NotifyError::UnknownProvider(_)));
    }

    #[tokio::test]
    async fn slack_without_webhook_reports_missing_key() {
        let notifier = ProviderNotifier::new().expect("http client");
        let err = notifier
            .notify("slack", "load-test", "none", &BTreeMap::new())
            .await
            .expect_err("missing key");
        assert!(matches!(err, NotifyError::MissingSecretKey { .. }));
    }
}
