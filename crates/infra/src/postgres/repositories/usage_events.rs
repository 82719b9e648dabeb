use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::{dsl::sql, pg::Pg, prelude::*, sql_types::BigInt};
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::postgres::{
    ledger_tx::apply_in_tx,
    postgres_connection::PgPoolSquad,
    rows::{UsageRecordRow, WebhookEventRow},
    schema::{api_keys, usage_records, webhook_events},
    subscription_tx::settle_lapsed_in_tx,
};
use domain::{
    entities::{usage_records::UsageRecordEntity, webhook_events::WebhookEventEntity},
    ledger::BalanceOperation,
    repositories::usage_events::UsageEventRepository,
    value_objects::{
        enums::webhook_event_statuses::{EventClaim, WebhookEventStatus},
        usage_records::{UsageRecordFilter, UsageRecordPage, UsageSummary},
        usage_webhook::{NewUsageEvent, UsageIngestOutcome},
    },
};

pub struct UsageEventPostgres {
    db_pool: Arc<PgPoolSquad>,
    default_timezone: Tz,
}

impl UsageEventPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>, default_timezone: Tz) -> Self {
        Self {
            db_pool,
            default_timezone,
        }
    }
}

/// Inserts the event row, or locks the existing one. Returns the status it
/// had before this call when it already existed.
fn claim_event(conn: &mut PgConnection, row: &WebhookEventRow) -> QueryResult<EventClaim> {
    let inserted = diesel::insert_into(webhook_events::table)
        .values(row)
        .on_conflict(webhook_events::event_id)
        .do_nothing()
        .execute(conn)?;

    if inserted > 0 {
        return Ok(EventClaim::from_existing(None));
    }

    let status = webhook_events::table
        .find(&row.event_id)
        .select(webhook_events::status)
        .for_update()
        .first::<String>(conn)?;

    Ok(EventClaim::from_existing(Some(WebhookEventStatus::from_str(&status))))
}

fn filtered_usage<'a>(
    user_id: Uuid,
    filter: &UsageRecordFilter,
) -> usage_records::BoxedQuery<'a, Pg> {
    let mut query = usage_records::table
        .filter(usage_records::user_id.eq(user_id))
        .into_boxed();

    if let Some(api_key_id) = filter.api_key_id {
        query = query.filter(usage_records::api_key_id.eq(api_key_id));
    }
    if let Some(model) = filter.model.clone() {
        query = query.filter(usage_records::model.eq(model));
    }
    if let Some(start) = filter.start {
        query = query.filter(usage_records::created_at.ge(start));
    }
    if let Some(end) = filter.end {
        query = query.filter(usage_records::created_at.le(end));
    }
    query
}

#[async_trait]
impl UsageEventRepository for UsageEventPostgres {
    async fn find_event(&self, event_id: &str) -> Result<Option<WebhookEventEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let event_id = event_id.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<WebhookEventEntity>> {
            let mut conn = db_pool.get()?;

            let row = webhook_events::table
                .find(&event_id)
                .select(WebhookEventRow::as_select())
                .first::<WebhookEventRow>(&mut conn)
                .optional()?;

            Ok(row.map(WebhookEventEntity::from))
        })
        .await??)
    }

    async fn ingest_usage(
        &self,
        usage: NewUsageEvent,
        now: DateTime<Utc>,
    ) -> Result<UsageIngestOutcome> {
        let db_pool = Arc::clone(&self.db_pool);
        let default_timezone = self.default_timezone;

        Ok(task::spawn_blocking(move || -> Result<UsageIngestOutcome> {
            let mut conn = db_pool.get()?;

            conn.build_transaction()
                .read_committed()
                .run::<_, anyhow::Error, _>(|conn| {
                    let event_row = WebhookEventRow {
                        event_id: usage.event_id.clone(),
                        event_type: usage.event_type.clone(),
                        status: WebhookEventStatus::Processed.as_str().to_string(),
                        payload: usage.payload.clone(),
                        error_msg: None,
                        processed_at: now,
                    };

                    match claim_event(conn, &event_row)? {
                        EventClaim::Done => {
                            return Ok(UsageIngestOutcome::AlreadyProcessed);
                        }
                        EventClaim::RetryFailed => {
                            // Retry of a failed delivery: take the row over.
                            diesel::update(webhook_events::table.find(&usage.event_id))
                                .set((
                                    webhook_events::status.eq(&event_row.status),
                                    webhook_events::payload.eq(&event_row.payload),
                                    webhook_events::error_msg.eq(None::<String>),
                                    webhook_events::processed_at.eq(now),
                                ))
                                .execute(conn)?;
                        }
                        EventClaim::Fresh => {}
                    }

                    let usage_record_id = Uuid::new_v4();
                    diesel::insert_into(usage_records::table)
                        .values(UsageRecordRow {
                            id: usage_record_id,
                            user_id: usage.user_id,
                            api_key_id: usage.api_key_id,
                            event_id: usage.event_id.clone(),
                            model: usage.model.clone(),
                            prompt_tokens: usage.prompt_tokens,
                            completion_tokens: usage.completion_tokens,
                            total_tokens: usage.total_tokens,
                            cost_usd: usage.cost_usd,
                            credits_charged: usage.credits,
                            created_at: now,
                        })
                        .execute(conn)?;

                    diesel::update(api_keys::table.find(usage.api_key_id))
                        .set(api_keys::last_used_at.eq(now))
                        .execute(conn)?;

                    let deduction = if usage.credits > 0 {
                        settle_lapsed_in_tx(conn, usage.user_id, now, default_timezone)?;
                        let op = BalanceOperation::Deduct {
                            amount: usage.credits,
                            reason: usage.deduct_reason(),
                            reference: Some(usage_record_id.to_string()),
                        };
                        Some(apply_in_tx(conn, usage.user_id, &op, now, default_timezone)?)
                    } else {
                        None
                    };

                    Ok(UsageIngestOutcome::Recorded {
                        usage_record_id,
                        deduction,
                    })
                })
        })
        .await??)
    }

    async fn mark_failed(
        &self,
        event_id: &str,
        event_type: &str,
        payload: serde_json::Value,
        error_msg: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let db_pool = Arc::clone(&self.db_pool);
        let row = WebhookEventRow {
            event_id: event_id.to_string(),
            event_type: event_type.to_string(),
            status: WebhookEventStatus::Failed.as_str().to_string(),
            payload,
            error_msg: Some(error_msg.to_string()),
            processed_at: now,
        };

        Ok(task::spawn_blocking(move || -> Result<()> {
            let mut conn = db_pool.get()?;

            conn.build_transaction()
                .read_committed()
                .run::<_, anyhow::Error, _>(|conn| {
                    if claim_event(conn, &row)? == EventClaim::RetryFailed {
                        diesel::update(
                            webhook_events::table
                                .filter(webhook_events::event_id.eq(&row.event_id))
                                .filter(
                                    webhook_events::status
                                        .ne(WebhookEventStatus::Processed.as_str()),
                                ),
                        )
                        .set((
                            webhook_events::status.eq(&row.status),
                            webhook_events::error_msg.eq(&row.error_msg),
                            webhook_events::processed_at.eq(now),
                        ))
                        .execute(conn)?;
                    }
                    Ok(())
                })
        })
        .await??)
    }

    async fn list_usage_records(
        &self,
        user_id: Uuid,
        filter: UsageRecordFilter,
    ) -> Result<UsageRecordPage> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<UsageRecordPage> {
            let mut conn = db_pool.get()?;

            // SUM(int8) is numeric in Postgres; cast back so it loads as i64.
            let (total, total_tokens, total_credits) = filtered_usage(user_id, &filter)
                .select((
                    sql::<BigInt>("COUNT(*)"),
                    sql::<BigInt>("COALESCE(SUM(total_tokens), 0)::int8"),
                    sql::<BigInt>("COALESCE(SUM(credits_charged), 0)::int8"),
                ))
                .first::<(i64, i64, i64)>(&mut conn)?;

            let rows = filtered_usage(user_id, &filter)
                .order((usage_records::created_at.desc(), usage_records::id.desc()))
                .limit(filter.page.page_size)
                .offset(filter.page.offset())
                .select(UsageRecordRow::as_select())
                .load::<UsageRecordRow>(&mut conn)?;

            Ok(UsageRecordPage::new(
                rows.into_iter().map(UsageRecordEntity::from).collect(),
                total,
                UsageSummary {
                    total_tokens,
                    total_credits,
                },
                &filter,
            ))
        })
        .await??)
    }

    async fn purge_processed_before(&self, cutoff: DateTime<Utc>) -> Result<usize> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<usize> {
            let mut conn = db_pool.get()?;

            let deleted = diesel::delete(
                webhook_events::table
                    .filter(webhook_events::status.eq(WebhookEventStatus::Processed.as_str()))
                    .filter(webhook_events::processed_at.lt(cutoff)),
            )
            .execute(&mut conn)?;

            Ok(deleted)
        })
        .await??)
    }
}
