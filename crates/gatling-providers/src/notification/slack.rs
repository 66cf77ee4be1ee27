//! Slack incoming-webhook notifications

use std::collections::BTreeMap;

use serde_json::json;
use tracing::debug;

use super::NotifyError;

/// Secret key holding the webhook URL
pub const WEBHOOK_URL_KEY: &str = "incoming-webhook-url";

const PROVIDER: &str = "slack";

fn message_text(gatling_name: &str, report_url: &str) -> String {
    format!("\n[{gatling_name}] Gatling has completed successfully!\nReport URL: {report_url}\n")
}

fn webhook_url(secret_data: &BTreeMap<String, Vec<u8>>) -> Result<&str, NotifyError> {
    let raw = secret_data
        .get(WEBHOOK_URL_KEY)
        .ok_or_else(|| NotifyError::MissingSecretKey {
            provider: PROVIDER.to_string(),
            key: WEBHOOK_URL_KEY.to_string(),
        })?;
    std::str::from_utf8(raw).map_err(|_| NotifyError::InvalidSecretValue {
        provider: PROVIDER.to_string(),
        key: WEBHOOK_URL_KEY.to_string(),
    })
}

pub(super) async fn notify(
    http: &reqwest::Client,
    gatling_name: &str,
    report_url: &str,
    secret_data: &BTreeMap<String, Vec<u8>>,
) -> Result<(), NotifyError> {
    let url = webhook_url(secret_data)?;
    let payload = serde_json::to_string(&json!({ "text": message_text(gatling_name, report_url) }))?;

    let response = http
        .post(url.trim())
        .form(&[("payload", payload)])
        .send()
        .await?;

    let status = response.status();
    if !status.is_success() {
        return Err(NotifyError::Rejected {
            status: status.as_u16(),
        });
    }

    debug!(gatling = %gatling_name, "posted slack notification");
    Ok(())
}
