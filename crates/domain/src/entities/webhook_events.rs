use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::value_objects::enums::webhook_event_statuses::WebhookEventStatus;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct WebhookEventEntity {
    pub event_id: String,
    pub event_type: String,
    pub status: WebhookEventStatus,
    pub payload: serde_json::Value,
    pub error_msg: Option<String>,
    pub processed_at: DateTime<Utc>,
}
