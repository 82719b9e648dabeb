use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct UsageRecordEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub api_key_id: Uuid,
    pub event_id: String,
    pub model: String,
    pub prompt_tokens: i64,
    pub completion_tokens: i64,
    pub total_tokens: i64,
    pub cost_usd: f64,
    pub credits_charged: i64,
    pub created_at: DateTime<Utc>,
}
