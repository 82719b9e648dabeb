use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use mockall::automock;
use uuid::Uuid;

use crate::{
    entities::webhook_events::WebhookEventEntity,
    value_objects::{
        usage_records::{UsageRecordFilter, UsageRecordPage},
        usage_webhook::{NewUsageEvent, UsageIngestOutcome},
    },
};

#[automock]
#[async_trait]
pub trait UsageEventRepository {
    async fn find_event(&self, event_id: &str) -> Result<Option<WebhookEventEntity>>;

    /// Claims the event id, records usage, deducts credits and marks the event
    /// processed in one transaction. A second delivery of a processed event is
    /// reported as `AlreadyProcessed` with no writes.
    async fn ingest_usage(
        &self,
        usage: NewUsageEvent,
        now: DateTime<Utc>,
    ) -> Result<UsageIngestOutcome>;

    /// Records a retryable failure. Never overwrites a processed event.
    async fn mark_failed(
        &self,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
        error_msg: &str,
        now: DateTime<Utc>,
    ) -> Result<()>;

    /// Newest first, with totals over the whole filtered set.
    async fn list_usage_records(
        &self,
        user_id: Uuid,
        filter: UsageRecordFilter,
    ) -> Result<UsageRecordPage>;

    async fn purge_processed_before(&self, cutoff: DateTime<Utc>) -> Result<usize>;
}
