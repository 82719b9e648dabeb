use serde::{Deserialize, Serialize};
use uuid::Uuid;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SubscriptionPackageEntity {
    pub id: Uuid,
    pub name: String,
    pub cycle_days: i32,
    pub price_minor: i64,
    pub base_credits: i64,
    pub replenish_credits: i64,
    pub is_active: bool,
}
