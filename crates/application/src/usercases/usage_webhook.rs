use std::{sync::Arc, time::Duration};

use chrono::Utc;
use domain::{
    ledger::{BalanceOutcome, conversion::usd_to_credits},
    repositories::{
        api_keys::ApiKeyRepository, credit_config::CreditConfigRepository,
        usage_events::UsageEventRepository,
    },
    value_objects::{
        enums::webhook_event_statuses::WebhookEventStatus,
        usage_webhook::{NewUsageEvent, UsageIngestOutcome, UsageWebhookAck, UsageWebhookPayload},
    },
};
use tracing::{debug, error, info, warn};

use crate::{
    errors::{BillingError, BillingResult, storage_failure},
    gateways::WebhookSignatureVerifier,
};

pub struct UsageWebhookUseCase {
    verifier: Arc<dyn WebhookSignatureVerifier>,
    api_key_repo: Arc<dyn ApiKeyRepository + Send + Sync>,
    event_repo: Arc<dyn UsageEventRepository + Send + Sync>,
    config_repo: Arc<dyn CreditConfigRepository + Send + Sync>,
    timeout: Duration,
}

impl UsageWebhookUseCase {
    pub fn new(
        verifier: Arc<dyn WebhookSignatureVerifier>,
        api_key_repo: Arc<dyn ApiKeyRepository + Send + Sync>,
        event_repo: Arc<dyn UsageEventRepository + Send + Sync>,
        config_repo: Arc<dyn CreditConfigRepository + Send + Sync>,
        timeout: Duration,
    ) -> Self {
        Self {
            verifier,
            api_key_repo,
            event_repo,
            config_repo,
            timeout,
        }
    }

    /// Signature and payload problems are errors (4xx, nothing recorded).
    /// Processing failures come back as an ack with `success = false` after the
    /// event has been recorded as failed, so the sender retries.
    pub async fn handle(
        &self,
        raw_body: &[u8],
        signature: Option<&str>,
    ) -> BillingResult<UsageWebhookAck> {
        let Some(signature) = signature.map(str::trim).filter(|s| !s.is_empty()) else {
            warn!("usage_webhook: missing signature header");
            return Err(BillingError::InvalidPayload(
                "missing webhook signature".to_string(),
            ));
        };
        if !self.verifier.verify(raw_body, signature) {
            warn!("usage_webhook: signature verification failed");
            return Err(BillingError::InvalidSignature);
        }

        let raw: serde_json::Value = serde_json::from_slice(raw_body)
            .map_err(|err| BillingError::InvalidPayload(format!("malformed json: {err}")))?;
        let payload: UsageWebhookPayload = serde_json::from_value(raw.clone())
            .map_err(|err| BillingError::InvalidPayload(format!("missing or invalid field: {err}")))?;
        payload.validate().map_err(BillingError::InvalidPayload)?;

        let event_id = payload.event_id.clone();
        let event_type = payload.event_type.clone();

        let result = match tokio::time::timeout(self.timeout, self.process(payload, raw.clone()))
            .await
        {
            Ok(result) => result,
            Err(_) => Err(BillingError::Timeout),
        };

        match result {
            Ok(message) => Ok(UsageWebhookAck {
                success: true,
                message,
                event_id: Some(event_id),
            }),
            Err(err) => {
                warn!(
                    %event_id,
                    error = %err,
                    retryable = err.is_retryable(),
                    "usage_webhook: processing failed, sender will retry"
                );
                if let Err(mark_err) = self
                    .event_repo
                    .mark_failed(&event_id, &event_type, raw, &err.to_string(), Utc::now())
                    .await
                {
                    error!(%event_id, db_error = ?mark_err, "usage_webhook: failed to record failure");
                }
                Ok(UsageWebhookAck {
                    success: false,
                    message: err.to_string(),
                    event_id: Some(event_id),
                })
            }
        }
    }

    async fn process(
        &self,
        payload: UsageWebhookPayload,
        raw: serde_json::Value,
    ) -> BillingResult<String> {
        let event_id = payload.event_id.as_str();

        let existing = self
            .event_repo
            .find_event(event_id)
            .await
            .map_err(|err| storage_failure("webhook_events.find_event", err))?;
        if existing.is_some_and(|event| event.status == WebhookEventStatus::Processed) {
            debug!(%event_id, "usage_webhook: replayed event, already processed");
            return Ok("event already processed".to_string());
        }

        let data = &payload.data;
        let api_key = self
            .api_key_repo
            .find_by_remote_key_id(&data.remote_key_id)
            .await
            .map_err(|err| storage_failure("api_keys.find_by_remote_key_id", err))?
            .ok_or(BillingError::NotFound("api key"))?;

        let config = self
            .config_repo
            .load_credit_config()
            .await
            .map_err(|err| storage_failure("options.load_credit_config", err))?;
        let credits = usd_to_credits(data.cost, config.usd_to_credits_rate)?;

        let outcome = self
            .event_repo
            .ingest_usage(
                NewUsageEvent {
                    event_id: payload.event_id.clone(),
                    event_type: payload.event_type.clone(),
                    payload: raw,
                    user_id: api_key.user_id,
                    api_key_id: api_key.id,
                    model: data.model.clone(),
                    prompt_tokens: data.prompt_tokens,
                    completion_tokens: data.completion_tokens,
                    total_tokens: data.total_tokens,
                    cost_usd: data.cost,
                    credits,
                },
                Utc::now(),
            )
            .await
            .map_err(|err| storage_failure("webhook_events.ingest_usage", err))?;

        let user_id = api_key.user_id;
        match outcome {
            UsageIngestOutcome::AlreadyProcessed => {
                debug!(%event_id, "usage_webhook: processed concurrently by another delivery");
                Ok("event already processed".to_string())
            }
            UsageIngestOutcome::Recorded {
                usage_record_id,
                deduction,
            } => {
                match deduction {
                    Some(BalanceOutcome::InsufficientBalance { balance }) => info!(
                        %event_id,
                        %user_id,
                        credits,
                        balance,
                        "usage_webhook: usage recorded, deduction declined for empty balance"
                    ),
                    Some(outcome) => info!(
                        %event_id,
                        %user_id,
                        %usage_record_id,
                        credits,
                        balance = outcome.balance(),
                        "usage_webhook: usage recorded and charged"
                    ),
                    None => info!(
                        %event_id,
                        %user_id,
                        %usage_record_id,
                        "usage_webhook: usage recorded, zero credit cost"
                    ),
                }
                Ok("event processed".to_string())
            }
        }
    }
}
