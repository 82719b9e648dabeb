use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::value_objects::enums::payment_statuses::PaymentStatus;

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentOrderEntity {
    pub id: Uuid,
    pub order_no: String,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub amount_minor: i64,
    pub status: PaymentStatus,
    pub payment_method: Option<String>,
    pub transaction_id: Option<String>,
    pub expires_at: DateTime<Utc>,
    pub paid_at: Option<DateTime<Utc>>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentOrderEntity {
    pub fn is_stale(&self, now: DateTime<Utc>) -> bool {
        self.status == PaymentStatus::Pending && self.expires_at < now
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct InsertPaymentOrderEntity {
    pub order_no: String,
    pub user_id: Uuid,
    pub package_id: Uuid,
    pub amount_minor: i64,
    pub expires_at: DateTime<Utc>,
}
