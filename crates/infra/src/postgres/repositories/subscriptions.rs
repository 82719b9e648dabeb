use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::PgPoolSquad,
    rows::SubscriptionRow,
    schema::subscriptions,
    subscription_tx::{IN_FORCE, create_or_renew_in_tx, expire_and_clear_in_tx},
};
use domain::{
    entities::{
        subscription_packages::SubscriptionPackageEntity, subscriptions::SubscriptionEntity,
    },
    ledger::BalanceOutcome,
    repositories::subscriptions::SubscriptionRepository,
    value_objects::{
        enums::subscription_statuses::SubscriptionStatus, subscriptions::SubscriptionChange,
    },
};

pub struct SubscriptionPostgres {
    db_pool: Arc<PgPoolSquad>,
    default_timezone: Tz,
}

impl SubscriptionPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>, default_timezone: Tz) -> Self {
        Self {
            db_pool,
            default_timezone,
        }
    }
}

#[async_trait]
impl SubscriptionRepository for SubscriptionPostgres {
    async fn find_in_force(&self, user_id: Uuid) -> Result<Option<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let row = subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .filter(subscriptions::status.eq_any(IN_FORCE))
                .order(subscriptions::end_date.desc())
                .select(SubscriptionRow::as_select())
                .first::<SubscriptionRow>(&mut conn)
                .optional()?;

            Ok(row.map(SubscriptionEntity::from))
        })
        .await??)
    }

    async fn create_or_renew(
        &self,
        user_id: Uuid,
        package: SubscriptionPackageEntity,
        reference: Option<String>,
        now: DateTime<Utc>,
    ) -> Result<SubscriptionChange> {
        let db_pool = Arc::clone(&self.db_pool);
        let default_timezone = self.default_timezone;

        Ok(task::spawn_blocking(move || -> Result<SubscriptionChange> {
            let mut conn = db_pool.get()?;

            conn.build_transaction()
                .read_committed()
                .run::<_, anyhow::Error, _>(|conn| {
                    create_or_renew_in_tx(conn, user_id, &package, reference, now, default_timezone)
                })
        })
        .await??)
    }

    async fn cancel(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let row = diesel::update(
                subscriptions::table
                    .filter(subscriptions::user_id.eq(user_id))
                    .filter(subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
                    .filter(subscriptions::end_date.ge(now)),
            )
            .set((
                subscriptions::status.eq(SubscriptionStatus::Cancelled.as_str()),
                subscriptions::auto_renew.eq(false),
                subscriptions::updated_at.eq(now),
            ))
            .returning(SubscriptionRow::as_returning())
            .get_result::<SubscriptionRow>(&mut conn)
            .optional()?;

            Ok(row.map(SubscriptionEntity::from))
        })
        .await??)
    }

    async fn set_auto_renew(
        &self,
        user_id: Uuid,
        auto_renew: bool,
        now: DateTime<Utc>,
    ) -> Result<Option<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let row = diesel::update(
                subscriptions::table
                    .filter(subscriptions::user_id.eq(user_id))
                    .filter(subscriptions::status.eq_any(IN_FORCE))
                    .filter(subscriptions::end_date.ge(now)),
            )
            .set((
                subscriptions::auto_renew.eq(auto_renew),
                subscriptions::updated_at.eq(now),
            ))
            .returning(SubscriptionRow::as_returning())
            .get_result::<SubscriptionRow>(&mut conn)
            .optional()?;

            Ok(row.map(SubscriptionEntity::from))
        })
        .await??)
    }

    async fn expire_and_clear(
        &self,
        subscription_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<BalanceOutcome>> {
        let db_pool = Arc::clone(&self.db_pool);
        let default_timezone = self.default_timezone;

        Ok(task::spawn_blocking(move || -> Result<Option<BalanceOutcome>> {
            let mut conn = db_pool.get()?;

            conn.build_transaction()
                .read_committed()
                .run::<_, anyhow::Error, _>(|conn| {
                    let subscription = subscriptions::table
                        .find(subscription_id)
                        .select(SubscriptionRow::as_select())
                        .first::<SubscriptionRow>(conn)
                        .optional()?
                        .map(SubscriptionEntity::from);

                    match subscription {
                        Some(subscription) => {
                            expire_and_clear_in_tx(conn, &subscription, now, default_timezone)
                        }
                        None => Ok(None),
                    }
                })
        })
        .await??)
    }

    async fn list_by_user(&self, user_id: Uuid) -> Result<Vec<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let rows = subscriptions::table
                .filter(subscriptions::user_id.eq(user_id))
                .order(subscriptions::created_at.desc())
                .select(SubscriptionRow::as_select())
                .load::<SubscriptionRow>(&mut conn)?;

            Ok(rows.into_iter().map(SubscriptionEntity::from).collect())
        })
        .await??)
    }

    async fn list_lapsed(&self, now: DateTime<Utc>) -> Result<Vec<SubscriptionEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<SubscriptionEntity>> {
            let mut conn = db_pool.get()?;

            let rows = subscriptions::table
                .filter(subscriptions::status.eq_any(IN_FORCE))
                .filter(subscriptions::end_date.lt(now))
                .order(subscriptions::end_date.asc())
                .select(SubscriptionRow::as_select())
                .load::<SubscriptionRow>(&mut conn)?;

            Ok(rows.into_iter().map(SubscriptionEntity::from).collect())
        })
        .await??)
    }

    async fn list_active_user_ids(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<Uuid>> {
            let mut conn = db_pool.get()?;

            let user_ids = subscriptions::table
                .filter(subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
                .filter(subscriptions::end_date.ge(now))
                .select(subscriptions::user_id)
                .distinct()
                .load::<Uuid>(&mut conn)?;

            Ok(user_ids)
        })
        .await??)
    }
}
