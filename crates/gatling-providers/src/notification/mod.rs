//! Notification backends
//!
//! Unlike storage, an unknown notification provider is an error: a user who
//! asked to be notified has no sensible fallback.

mod slack;

use std::collections::BTreeMap;

use thiserror::Error;

pub use slack::WEBHOOK_URL_KEY;

/// Errors raised while resolving or calling a notification provider
#[derive(Debug, Error)]
pub enum NotifyError {
    /// Provider name is not recognized
    #[error("unknown notification provider: {0}")]
    UnknownProvider(String),

    /// Secret lacks a key the provider needs
    #[error("Insufficient secret data for {provider}: {key} is missing")]
    MissingSecretKey {
        /// Provider name
        provider: String,
        /// Missing secret key
        key: String,
    },

    /// Secret value is not valid UTF-8
    #[error("secret value {key} for {provider} is not valid UTF-8")]
    InvalidSecretValue {
        /// Provider name
        provider: String,
        /// Offending secret key
        key: String,
    },

    /// Payload could not be encoded
    #[error("failed to encode notification payload: {0}")]
    Encode(#[from] serde_json::Error),

    /// Request could not be sent
    #[error("notification request failed: {0}")]
    Http(#[from] reqwest::Error),

    /// Endpoint answered with a non-success status
    #[error("notification endpoint returned status {status}")]
    Rejected {
        /// HTTP status code
        status: u16,
    },
}

impl NotifyError {
    /// Whether trying again later may succeed without a config change
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::Http(_) | Self::Rejected { .. })
    }
}

/// A backend that announces a finished run
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum NotificationProvider {
    /// Slack incoming webhook
    Slack,
}

impl NotificationProvider {
    /// Resolve a provider by name
    pub fn from_name(name: &str) -> Result<Self, NotifyError> {
        match name {
            "slack" => Ok(Self::Slack),
            other => Err(NotifyError::UnknownProvider(other.to_string())),
        }
    }

    /// Provider name as written in the Gatling spec
    pub fn name(&self) -> &'static str {
        match self {
            Self::Slack => "slack",
        }
    }

    /// Announce that `gatling_name` finished, with its report at `report_url`
    ///
    /// `secret_data` is the raw data of the Secret named in `notificationServiceSpec`.
    pub async fn notify(
        &self,
        http: &reqwest::Client,
        gatling_name: &str,
        report_url: &str,
        secret_data: &BTreeMap<String, Vec<u8>>,
    ) -> Result<(), NotifyError> {
        match self {
            Self::Slack => slack::notify(http, gatling_name, report_url, secret_data).await,
        }
    }
}

impl std::fmt::Display for NotificationProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.name())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn slack_is_the_only_known_provider() {
        assert_eq!(
            NotificationProvider::from_name("slack").expect("slack"),
            NotificationProvider::Slack
        );
        let err = NotificationProvider::from_name("teams").expect_err("unknown provider");
        assert!(matches!(err, NotifyError::UnknownProvider(ref p) if p == "teams"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn missing_key_message_names_the_key() {
        let err = NotifyError::MissingSecretKey {
            provider: "slack".to_string(),
            key: WEBHOOK_URL_KEY.to_string(),
        };
        assert_eq!(
            err.to_string(),
            "Insufficient secret data for slack: incoming-webhook-url is missing"
        );
        assert!(!err.is_retryable());
        assert!(NotifyError::Rejected { status: 503 }.is_retryable());
    }
}
