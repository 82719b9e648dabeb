use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::enums::subscription_statuses::SubscriptionStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionEntity {
    pub id: Uuid,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub status: SubscriptionStatus,
    pub start_date: DateTime<Utc>,
    pub end_date: DateTime<Utc>,
    pub auto_renew: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl SubscriptionEntity {
    /// In force (ACTIVE or CANCELLED) but already past `end_date`.
    pub fn is_lapsed(&self, now: DateTime<Utc>) -> bool {
        self.status.is_in_force() && self.end_date < now
    }

    /// Only an unexpired ACTIVE row grants replenish and daily reset.
    pub fn grants_credits(&self, now: DateTime<Utc>) -> bool {
        self.status == SubscriptionStatus::Active && self.end_date >= now
    }
}
