use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Materialized balance projection, one per user.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CreditBalanceEntity {
    pub user_id: Uuid,
    pub base_credits: i64,
    pub replenish_credits: i64,
    pub current_credits: i64,
    pub last_replenish_at: Option<DateTime<Utc>>,
    pub last_daily_reset_at: Option<DateTime<Utc>>,
    pub updated_at: DateTime<Utc>,
}

impl CreditBalanceEntity {
    pub fn empty(user_id: Uuid, now: DateTime<Utc>) -> Self {
        Self {
            user_id,
            base_credits: 0,
            replenish_credits: 0,
            current_credits: 0,
            last_replenish_at: None,
            last_daily_reset_at: None,
            updated_at: now,
        }
    }

    pub fn below_ceiling(&self) -> bool {
        self.current_credits < self.base_credits
    }
}
