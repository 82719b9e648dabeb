use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::{
    entities::credit_transactions::CreditTransactionEntity,
    value_objects::enums::transaction_types::TransactionType,
};

pub const DEFAULT_USD_TO_CREDITS_RATE: f64 = 1000.0;
pub const DEFAULT_FREE_QUOTA: i64 = 10_000;

/// Runtime options read from the `options` table.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct CreditConfig {
    pub usd_to_credits_rate: f64,
    pub free_quota: i64,
}

impl Default for CreditConfig {
    fn default() -> Self {
        Self {
            usd_to_credits_rate: DEFAULT_USD_TO_CREDITS_RATE,
            free_quota: DEFAULT_FREE_QUOTA,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct BalanceView {
    pub base_credits: i64,
    pub replenish_credits: i64,
    pub current_credits: i64,
    pub next_replenish_at: Option<DateTime<Utc>>,
    pub next_daily_reset_at: Option<DateTime<Utc>>,
    pub has_active_subscription: bool,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DeductResult {
    pub ok: bool,
    pub credits_charged: i64,
    pub message: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct TransactionFilter {
    pub page: i64,
    pub page_size: i64,
    pub transaction_type: Option<TransactionType>,
}

impl TransactionFilter {
    pub const MAX_PAGE_SIZE: i64 = 100;
    pub const DEFAULT_PAGE_SIZE: i64 = 20;

    pub fn new(page: Option<i64>, page_size: Option<i64>, kind: Option<TransactionType>) -> Self {
        Self {
            page: page.unwrap_or(1).max(1),
            page_size: page_size
                .unwrap_or(Self::DEFAULT_PAGE_SIZE)
                .clamp(1, Self::MAX_PAGE_SIZE),
            transaction_type: kind,
        }
    }

    pub fn offset(&self) -> i64 {
        (self.page - 1).saturating_mul(self.page_size)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransactionPage {
    pub records: Vec<CreditTransactionEntity>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
}

impl TransactionPage {
    pub fn new(records: Vec<CreditTransactionEntity>, total: i64, filter: &TransactionFilter) -> Self {
        let total_pages = if total == 0 {
            0
        } else {
            (total + filter.page_size - 1) / filter.page_size
        };

        Self {
            records,
            total,
            page: filter.page,
            page_size: filter.page_size,
            total_pages,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn filter_clamps_page_and_size() {
        let filter = TransactionFilter::new(Some(0), Some(500), None);
        assert_eq!(filter.page, 1);
        assert_eq!(filter.page_size, 100);
        assert_eq!(filter.offset(), 0);

        let filter = TransactionFilter::new(Some(3), Some(0), None);
        assert_eq!(filter.page_size, 1);
        assert_eq!(filter.offset(), 2);
    }

    #[test]
    fn total_pages_rounds_up() {
        let filter = TransactionFilter::new(Some(1), Some(20), None);
        assert_eq!(TransactionPage::new(vec![], 41, &filter).total_pages, 3);
        assert_eq!(TransactionPage::new(vec![], 0, &filter).total_pages, 0);
    }
}
