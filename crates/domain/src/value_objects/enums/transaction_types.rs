use std::fmt::Display;

use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionType {
    Subscription,
    Replenish,
    DailyReset,
    Deduct,
    AdminAdjust,
    Recharge,
    Bonus,
    Refund,
}

impl TransactionType {
    pub fn as_str(&self) -> &'static str {
        match self {
            TransactionType::Subscription => "subscription",
            TransactionType::Replenish => "replenish",
            TransactionType::DailyReset => "daily_reset",
            TransactionType::Deduct => "deduct",
            TransactionType::AdminAdjust => "admin_adjust",
            TransactionType::Recharge => "recharge",
            TransactionType::Bonus => "bonus",
            TransactionType::Refund => "refund",
        }
    }

    pub fn from_str(value: &str) -> Option<Self> {
        match value.trim().to_ascii_lowercase().as_str() {
            "subscription" => Some(TransactionType::Subscription),
            "replenish" => Some(TransactionType::Replenish),
            "daily_reset" => Some(TransactionType::DailyReset),
            "deduct" => Some(TransactionType::Deduct),
            "admin_adjust" => Some(TransactionType::AdminAdjust),
            "recharge" => Some(TransactionType::Recharge),
            "bonus" => Some(TransactionType::Bonus),
            "refund" => Some(TransactionType::Refund),
            _ => None,
        }
    }
}

impl Display for TransactionType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str(self.as_str())
    }
}
