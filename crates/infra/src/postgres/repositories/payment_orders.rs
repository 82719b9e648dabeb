use anyhow::{Result, anyhow};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::postgres::{
    postgres_connection::PgPoolSquad,
    repositories::subscription_packages::load_package,
    rows::{InsertPaymentOrderRow, PaymentOrderRow},
    schema::payment_orders,
    subscription_tx::create_or_renew_in_tx,
};
use domain::{
    entities::payment_orders::{InsertPaymentOrderEntity, PaymentOrderEntity},
    repositories::payment_orders::PaymentOrderRepository,
    value_objects::{
        enums::payment_statuses::PaymentStatus,
        payments::{OrderFilter, OrderPage, PaymentCompletion},
    },
};

pub struct PaymentOrderPostgres {
    db_pool: Arc<PgPoolSquad>,
    default_timezone: Tz,
}

impl PaymentOrderPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>, default_timezone: Tz) -> Self {
        Self {
            db_pool,
            default_timezone,
        }
    }
}

#[async_trait]
impl PaymentOrderRepository for PaymentOrderPostgres {
    async fn create(&self, order: InsertPaymentOrderEntity) -> Result<PaymentOrderEntity> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<PaymentOrderEntity> {
            let mut conn = db_pool.get()?;

            let row = diesel::insert_into(payment_orders::table)
                .values(InsertPaymentOrderRow::pending(order, Utc::now()))
                .returning(PaymentOrderRow::as_returning())
                .get_result::<PaymentOrderRow>(&mut conn)?;

            PaymentOrderEntity::try_from(row)
        })
        .await??)
    }

    async fn find_by_order_no(&self, order_no: &str) -> Result<Option<PaymentOrderEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let order_no = order_no.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<PaymentOrderEntity>> {
            let mut conn = db_pool.get()?;

            let row = payment_orders::table
                .filter(payment_orders::order_no.eq(&order_no))
                .select(PaymentOrderRow::as_select())
                .first::<PaymentOrderRow>(&mut conn)
                .optional()?;

            row.map(PaymentOrderEntity::try_from).transpose()
        })
        .await??)
    }

    async fn find_by_id(&self, order_id: Uuid) -> Result<Option<PaymentOrderEntity>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<PaymentOrderEntity>> {
            let mut conn = db_pool.get()?;

            let row = payment_orders::table
                .find(order_id)
                .select(PaymentOrderRow::as_select())
                .first::<PaymentOrderRow>(&mut conn)
                .optional()?;

            row.map(PaymentOrderEntity::try_from).transpose()
        })
        .await??)
    }

    async fn list_by_user(&self, user_id: Uuid, filter: OrderFilter) -> Result<OrderPage> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<OrderPage> {
            let mut conn = db_pool.get()?;

            let mut count_query = payment_orders::table
                .filter(payment_orders::user_id.eq(user_id))
                .into_boxed();
            let mut page_query = payment_orders::table
                .filter(payment_orders::user_id.eq(user_id))
                .into_boxed();

            if let Some(status) = filter.status {
                count_query = count_query.filter(payment_orders::status.eq(status.as_str()));
                page_query = page_query.filter(payment_orders::status.eq(status.as_str()));
            }

            let total = count_query.count().get_result::<i64>(&mut conn)?;

            let rows = page_query
                .order((payment_orders::created_at.desc(), payment_orders::order_no.desc()))
                .limit(filter.page.page_size)
                .offset(filter.page.offset())
                .select(PaymentOrderRow::as_select())
                .load::<PaymentOrderRow>(&mut conn)?;

            let records = rows
                .into_iter()
                .map(PaymentOrderEntity::try_from)
                .collect::<Result<Vec<_>>>()?;

            Ok(OrderPage::new(records, total, &filter))
        })
        .await??)
    }

    async fn set_payment_method(
        &self,
        order_no: &str,
        payment_method: &str,
        now: DateTime<Utc>,
    ) -> Result<()> {
        let db_pool = Arc::clone(&self.db_pool);
        let order_no = order_no.to_string();
        let payment_method = payment_method.to_string();

        Ok(task::spawn_blocking(move || -> Result<()> {
            let mut conn = db_pool.get()?;

            diesel::update(
                payment_orders::table
                    .filter(payment_orders::order_no.eq(&order_no))
                    .filter(payment_orders::status.eq(PaymentStatus::Pending.as_str())),
            )
            .set((
                payment_orders::payment_method.eq(&payment_method),
                payment_orders::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

            Ok(())
        })
        .await??)
    }

    async fn complete_payment(
        &self,
        order_no: &str,
        trade_no: &str,
        now: DateTime<Utc>,
    ) -> Result<PaymentCompletion> {
        let db_pool = Arc::clone(&self.db_pool);
        let default_timezone = self.default_timezone;
        let order_no = order_no.to_string();
        let trade_no = trade_no.to_string();

        Ok(task::spawn_blocking(move || -> Result<PaymentCompletion> {
            let mut conn = db_pool.get()?;

            conn.build_transaction()
                .read_committed()
                .run::<_, anyhow::Error, _>(|conn| {
                    let current = payment_orders::table
                        .filter(payment_orders::order_no.eq(&order_no))
                        .select(PaymentOrderRow::as_select())
                        .for_update()
                        .first::<PaymentOrderRow>(conn)
                        .optional()?;

                    let Some(current) = current else {
                        return Ok(PaymentCompletion::NotFound);
                    };
                    let current = PaymentOrderEntity::try_from(current)?;
                    if current.status != PaymentStatus::Pending {
                        return Ok(PaymentCompletion::AlreadyFinal {
                            status: current.status,
                        });
                    }

                    // The claim: only one transaction moves this order out of pending.
                    let paid = diesel::update(
                        payment_orders::table
                            .filter(payment_orders::id.eq(current.id))
                            .filter(payment_orders::status.eq(PaymentStatus::Pending.as_str())),
                    )
                    .set((
                        payment_orders::status.eq(PaymentStatus::Paid.as_str()),
                        payment_orders::transaction_id.eq(&trade_no),
                        payment_orders::paid_at.eq(now),
                        payment_orders::updated_at.eq(now),
                    ))
                    .returning(PaymentOrderRow::as_returning())
                    .get_result::<PaymentOrderRow>(conn)?;
                    let order = PaymentOrderEntity::try_from(paid)?;

                    let package = load_package(conn, order.package_id)?.ok_or_else(|| {
                        anyhow!("package {} of order {} is gone", order.package_id, order.order_no)
                    })?;

                    let change = create_or_renew_in_tx(
                        conn,
                        order.user_id,
                        &package,
                        Some(order.order_no.clone()),
                        now,
                        default_timezone,
                    )?;

                    Ok(PaymentCompletion::Paid { order, change })
                })
        })
        .await??)
    }

    async fn cancel(
        &self,
        order_no: &str,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<Option<PaymentOrderEntity>> {
        let db_pool = Arc::clone(&self.db_pool);
        let order_no = order_no.to_string();

        Ok(task::spawn_blocking(move || -> Result<Option<PaymentOrderEntity>> {
            let mut conn = db_pool.get()?;

            let row = diesel::update(
                payment_orders::table
                    .filter(payment_orders::order_no.eq(&order_no))
                    .filter(payment_orders::user_id.eq(user_id))
                    .filter(payment_orders::status.eq(PaymentStatus::Pending.as_str())),
            )
            .set((
                payment_orders::status.eq(PaymentStatus::Cancelled.as_str()),
                payment_orders::updated_at.eq(now),
            ))
            .returning(PaymentOrderRow::as_returning())
            .get_result::<PaymentOrderRow>(&mut conn)
            .optional()?;

            row.map(PaymentOrderEntity::try_from).transpose()
        })
        .await??)
    }

    async fn mark_expired(&self, order_no: &str, now: DateTime<Utc>) -> Result<bool> {
        let db_pool = Arc::clone(&self.db_pool);
        let order_no = order_no.to_string();

        Ok(task::spawn_blocking(move || -> Result<bool> {
            let mut conn = db_pool.get()?;

            let updated = diesel::update(
                payment_orders::table
                    .filter(payment_orders::order_no.eq(&order_no))
                    .filter(payment_orders::status.eq(PaymentStatus::Pending.as_str()))
                    .filter(payment_orders::expires_at.lt(now)),
            )
            .set((
                payment_orders::status.eq(PaymentStatus::Expired.as_str()),
                payment_orders::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

            Ok(updated > 0)
        })
        .await??)
    }

    async fn expire_stale(&self, now: DateTime<Utc>) -> Result<usize> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<usize> {
            let mut conn = db_pool.get()?;

            let updated = diesel::update(
                payment_orders::table
                    .filter(payment_orders::status.eq(PaymentStatus::Pending.as_str()))
                    .filter(payment_orders::expires_at.lt(now)),
            )
            .set((
                payment_orders::status.eq(PaymentStatus::Expired.as_str()),
                payment_orders::updated_at.eq(now),
            ))
            .execute(&mut conn)?;

            Ok(updated)
        })
        .await??)
    }
}
