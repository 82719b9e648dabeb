use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::{entities::usage_records::UsageRecordEntity, value_objects::pagination::PageRequest};

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UsageRecordFilter {
    pub page: PageRequest,
    pub api_key_id: Option<Uuid>,
    pub model: Option<String>,
    /// Inclusive bounds on `created_at`.
    pub start: Option<DateTime<Utc>>,
    pub end: Option<DateTime<Utc>>,
}

impl UsageRecordFilter {
    pub const DEFAULT_PAGE_SIZE: i64 = 20;

    pub fn new(page: Option<i64>, page_size: Option<i64>) -> Self {
        Self {
            page: PageRequest::new(page, page_size, Self::DEFAULT_PAGE_SIZE),
            api_key_id: None,
            model: None,
            start: None,
            end: None,
        }
    }

    pub fn matches(&self, record: &UsageRecordEntity) -> bool {
        self.api_key_id.is_none_or(|id| record.api_key_id == id)
            && self.model.as_deref().is_none_or(|m| record.model == m)
            && self.start.is_none_or(|start| record.created_at >= start)
            && self.end.is_none_or(|end| record.created_at <= end)
    }
}

/// Totals over every record matching the filter, not just the page.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageSummary {
    pub total_tokens: i64,
    pub total_credits: i64,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UsageRecordPage {
    pub records: Vec<UsageRecordEntity>,
    pub total: i64,
    pub page: i64,
    pub page_size: i64,
    pub total_pages: i64,
    pub summary: UsageSummary,
}

impl UsageRecordPage {
    pub fn new(
        records: Vec<UsageRecordEntity>,
        total: i64,
        summary: UsageSummary,
        filter: &UsageRecordFilter,
    ) -> Self {
        Self {
            records,
            total,
            page: filter.page.page,
            page_size: filter.page.page_size,
            total_pages: filter.page.total_pages(total),
            summary,
        }
    }
}
