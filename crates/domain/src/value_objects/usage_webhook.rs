use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::ledger::BalanceOutcome;

pub const USAGE_EVENT_TYPE: &str = "usage";

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageWebhookPayload {
    pub event_id: String,
    pub event_type: String,
    pub timestamp: serde_json::Value,
    pub data: UsageData,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct UsageData {
    pub remote_key_id: String,
    pub model: String,
    #[serde(default)]
    pub prompt_tokens: i64,
    #[serde(default)]
    pub completion_tokens: i64,
    #[serde(default)]
    pub total_tokens: i64,
    pub cost: f64,
}

impl UsageWebhookPayload {
    /// Field checks serde cannot express.
    pub fn validate(&self) -> Result<(), String> {
        if self.event_id.trim().is_empty() {
            return Err("eventId is required".to_string());
        }
        if self.event_type != USAGE_EVENT_TYPE {
            return Err(format!("unsupported eventType: {}", self.event_type));
        }
        if self.data.remote_key_id.trim().is_empty() {
            return Err("data.remoteKeyId is required".to_string());
        }
        if !self.data.cost.is_finite() || self.data.cost < 0.0 {
            return Err("data.cost must be a non-negative number".to_string());
        }
        Ok(())
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct UsageWebhookAck {
    pub success: bool,
    pub message: String,
    pub event_id: Option<String>,
}

/// Everything the store needs to ingest one usage event atomically.
#[derive(Debug, Clone, PartialEq)]
pub struct NewUsageEvent {
    pub event_id: String,
    pub event_type: String,
    pub payload: serde_json::Value,
    pub user_id: Uuid,
    pub api_key_id: Uuid,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cost_usd: f64,
    pub credits: i64,
}

impl NewUsageEvent {
    pub fn deduct_reason(&self) -> String {
        format!("api usage: {} ({} tokens)", self.model, self.total_tokens)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum UsageIngestOutcome {
    AlreadyProcessed,
    /// `deduction` is `None` when the usage cost rounded to zero credits.
    Recorded {
        usage_record_id: Uuid,
        deduction: Option<BalanceOutcome>,
    },
}

#[cfg(test)]
mod tests {
    use super::*;

    fn payload() -> UsageWebhookPayload {
        serde_json::from_str(
            r#"{"eventId":"evt_1","eventType":"usage","timestamp":"2024-05-01T00:00:00Z",
                "data":{"remoteKeyId":"rk_1","model":"gpt-4o","promptTokens":10,
                "completionTokens":5,"totalTokens":15,"cost":0.002}}"#,
        )
        .unwrap()
    }

    #[test]
    fn parses_camel_case_payload() {
        let payload = payload();
        assert_eq!(payload.event_id, "evt_1");
        assert_eq!(payload.data.total_tokens, 15);
        assert!(payload.validate().is_ok());
    }

    #[test]
    fn rejects_wrong_event_type_and_negative_cost() {
        let mut wrong_type = payload();
        wrong_type.event_type = "refund".to_string();
        assert!(wrong_type.validate().is_err());

        let mut negative = payload();
        negative.data.cost = -1.0;
        assert!(negative.validate().is_err());
    }
}
