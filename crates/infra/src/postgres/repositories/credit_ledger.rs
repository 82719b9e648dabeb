use anyhow::Result;
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::prelude::*;
use std::sync::Arc;
use tokio::task;
use uuid::Uuid;

use crate::postgres::{
    ledger_tx::{apply_in_tx, lock_or_create_balance, user_timezone},
    postgres_connection::PgPoolSquad,
    rows::CreditTransactionRow,
    schema::{credit_balances, credit_transactions, subscriptions},
};
use domain::{
    entities::{
        credit_balances::CreditBalanceEntity, credit_transactions::CreditTransactionEntity,
    },
    ledger::{BalanceOperation, BalanceOutcome},
    repositories::credit_ledger::CreditLedgerRepository,
    value_objects::{
        credits::{TransactionFilter, TransactionPage},
        enums::subscription_statuses::SubscriptionStatus,
    },
};

pub struct CreditLedgerPostgres {
    db_pool: Arc<PgPoolSquad>,
    default_timezone: Tz,
}

impl CreditLedgerPostgres {
    pub fn new(db_pool: Arc<PgPoolSquad>, default_timezone: Tz) -> Self {
        Self {
            db_pool,
            default_timezone,
        }
    }
}

#[async_trait]
impl CreditLedgerRepository for CreditLedgerPostgres {
    async fn apply(
        &self,
        user_id: Uuid,
        op: BalanceOperation,
        now: DateTime<Utc>,
    ) -> Result<BalanceOutcome> {
        let db_pool = Arc::clone(&self.db_pool);
        let default_timezone = self.default_timezone;

        Ok(task::spawn_blocking(move || -> Result<BalanceOutcome> {
            let mut conn = db_pool.get()?;

            conn.build_transaction()
                .read_committed()
                .run::<_, anyhow::Error, _>(|conn| {
                    apply_in_tx(conn, user_id, &op, now, default_timezone)
                })
        })
        .await??)
    }

    async fn find_or_create_balance(
        &self,
        user_id: Uuid,
        now: DateTime<Utc>,
    ) -> Result<CreditBalanceEntity> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<CreditBalanceEntity> {
            let mut conn = db_pool.get()?;

            let balance = conn
                .build_transaction()
                .read_committed()
                .run::<_, diesel::result::Error, _>(|conn| {
                    lock_or_create_balance(conn, user_id, now)
                })?;

            Ok(balance)
        })
        .await??)
    }

    async fn list_transactions(
        &self,
        user_id: Uuid,
        filter: TransactionFilter,
    ) -> Result<TransactionPage> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<TransactionPage> {
            let mut conn = db_pool.get()?;

            let mut count_query = credit_transactions::table
                .filter(credit_transactions::user_id.eq(user_id))
                .into_boxed();
            let mut page_query = credit_transactions::table
                .filter(credit_transactions::user_id.eq(user_id))
                .into_boxed();

            if let Some(kind) = filter.transaction_type {
                count_query = count_query.filter(credit_transactions::type_.eq(kind.as_str()));
                page_query = page_query.filter(credit_transactions::type_.eq(kind.as_str()));
            }

            let total = count_query.count().get_result::<i64>(&mut conn)?;

            let rows = page_query
                .order((
                    credit_transactions::created_at.desc(),
                    credit_transactions::id.desc(),
                ))
                .limit(filter.page_size)
                .offset(filter.offset())
                .select(CreditTransactionRow::as_select())
                .load::<CreditTransactionRow>(&mut conn)?;

            let records = rows
                .into_iter()
                .map(CreditTransactionEntity::try_from)
                .collect::<Result<Vec<_>>>()?;

            Ok(TransactionPage::new(records, total, &filter))
        })
        .await??)
    }

    async fn list_replenish_candidates(&self, now: DateTime<Utc>) -> Result<Vec<Uuid>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Vec<Uuid>> {
            let mut conn = db_pool.get()?;

            let user_ids = credit_balances::table
                .inner_join(
                    subscriptions::table.on(subscriptions::user_id.eq(credit_balances::user_id)),
                )
                .filter(subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
                .filter(subscriptions::end_date.ge(now))
                .filter(credit_balances::replenish_credits.gt(0))
                .filter(credit_balances::current_credits.lt(credit_balances::base_credits))
                .select(credit_balances::user_id)
                .distinct()
                .load::<Uuid>(&mut conn)?;

            Ok(user_ids)
        })
        .await??)
    }

    async fn find_user_timezone(&self, user_id: Uuid) -> Result<Option<String>> {
        let db_pool = Arc::clone(&self.db_pool);

        Ok(task::spawn_blocking(move || -> Result<Option<String>> {
            let mut conn = db_pool.get()?;
            Ok(user_timezone(&mut conn, user_id)?)
        })
        .await??)
    }
}
