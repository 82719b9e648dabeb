use super::notifier::{AlertSink, BillingAlert};
use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::SecondsFormat;
use reqwest::Client;
use serde_json::{Value, json};
use url::Url;

/// Posts each alert as a JSON document to a generic incoming webhook.
pub(crate) struct AlertWebhookProvider {
    webhook_url: Url,
    client: Client,
}

impl AlertWebhookProvider {
    pub(crate) fn new(webhook_url: Url) -> Self {
        let client = Client::builder()
            .timeout(std::time::Duration::from_secs(3))
            .build()
            .unwrap_or_else(|_| Client::new());

        Self {
            webhook_url,
            client,
        }
    }
}

/// Invariant violations are marked `critical` so the receiver can page on them.
pub(crate) fn alert_body(event: &BillingAlert) -> Value {
    let spans = event
        .spans
        .iter()
        .map(|span| json!({ "name": span.name, "fields": span.fields }))
        .collect::<Vec<_>>();

    let severity = if event.is_invariant_violation() {
        "critical"
    } else {
        event.level.as_str()
    };

    json!({
        "level": event.level.as_str(),
        "severity": severity,
        "timestamp": event.timestamp.to_rfc3339_opts(SecondsFormat::Secs, true),
        "service": event.service_name,
        "environment": event.environment,
        "component": event.component,
        "target": event.target,
        "location": match (&event.file, event.line) {
            (Some(file), Some(line)) => Some(format!("{file}:{line}")),
            _ => None,
        },
        "message": event.message,
        "fields": event.fields,
        "spans": spans,
    })
}

#[async_trait]
impl AlertSink for AlertWebhookProvider {
    async fn send(&self, event: &BillingAlert) -> Result<()> {
        let response = self
            .client
            .post(self.webhook_url.clone())
            .json(&alert_body(event))
            .send()
            .await
            .map_err(sanitize_reqwest_error)?;

        if response.status().is_success() {
            return Ok(());
        }

        Err(anyhow!(
            "alert webhook returned non-success status: {}",
            response.status()
        ))
    }

    fn name(&self) -> &'static str {
        "alert_webhook"
    }
}

// reqwest errors carry the URL, which may embed a token.
fn sanitize_reqwest_error(error: reqwest::Error) -> anyhow::Error {
    if error.is_timeout() {
        return anyhow!("alert webhook request timed out");
    }
    if error.is_connect() {
        return anyhow!("alert webhook connection failed");
    }
    anyhow!("alert webhook request failed")
}
