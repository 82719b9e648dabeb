use std::sync::Arc;

use domain::{
    repositories::usage_events::UsageEventRepository,
    value_objects::usage_records::{UsageRecordFilter, UsageRecordPage},
};
use uuid::Uuid;

use crate::errors::{BillingError, BillingResult, storage_failure};

pub struct UsageRecordsUseCase {
    event_repo: Arc<dyn UsageEventRepository + Send + Sync>,
}

impl UsageRecordsUseCase {
    pub fn new(event_repo: Arc<dyn UsageEventRepository + Send + Sync>) -> Self {
        Self { event_repo }
    }

    pub async fn list(
        &self,
        user_id: Uuid,
        filter: UsageRecordFilter,
    ) -> BillingResult<UsageRecordPage> {
        if let (Some(start), Some(end)) = (filter.start, filter.end) {
            if start > end {
                return Err(BillingError::InvalidPayload(
                    "start must not be after end".to_string(),
                ));
            }
        }

        self.event_repo
            .list_usage_records(user_id, filter)
            .await
            .map_err(|err| storage_failure("usage_records.list", err))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{Duration, Utc};
    use domain::{
        repositories::usage_events::MockUsageEventRepository,
        value_objects::usage_records::UsageSummary,
    };

    #[tokio::test]
    async fn inverted_range_is_rejected_before_querying() {
        let mut event_repo = MockUsageEventRepository::new();
        event_repo.expect_list_usage_records().never();

        let now = Utc::now();
        let mut filter = UsageRecordFilter::new(None, None);
        filter.start = Some(now);
        filter.end = Some(now - Duration::days(1));

        let result = UsageRecordsUseCase::new(Arc::new(event_repo))
            .list(Uuid::new_v4(), filter)
            .await;
        assert!(matches!(result, Err(BillingError::InvalidPayload(_))));
    }

    #[tokio::test]
    async fn page_comes_back_with_its_summary() {
        let user_id = Uuid::new_v4();
        let mut event_repo = MockUsageEventRepository::new();
        event_repo
            .expect_list_usage_records()
            .withf(move |id, filter| *id == user_id && filter.model.as_deref() == Some("gpt-4o"))
            .times(1)
            .returning(|_, filter| {
                Ok(UsageRecordPage::new(
                    vec![],
                    0,
                    UsageSummary {
                        total_tokens: 0,
                        total_credits: 0,
                    },
                    &filter,
                ))
            });

        let mut filter = UsageRecordFilter::new(Some(1), Some(50));
        filter.model = Some("gpt-4o".to_string());
        let page = UsageRecordsUseCase::new(Arc::new(event_repo))
            .list(user_id, filter)
            .await
            .unwrap();

        assert_eq!(page.page_size, 50);
        assert_eq!(page.total_pages, 0);
    }
}
