//! Balance writes shared by every repository that touches credits. All
//! functions expect to run inside an open transaction.

use anyhow::Result;
use chrono::{DateTime, Utc};
use chrono_tz::Tz;
use diesel::{PgConnection, prelude::*};
use uuid::Uuid;

use crate::postgres::{
    rows::{CreditBalanceChangeset, CreditBalanceRow, InsertCreditTransactionRow},
    schema::{app_users, credit_balances, credit_transactions, subscriptions},
};
use domain::{
    entities::credit_balances::CreditBalanceEntity,
    ledger::{
        BalanceOperation, BalanceOutcome, LedgerContext, calendar::resolve_timezone,
        plan_operation, verify_plan,
    },
    value_objects::enums::{
        subscription_statuses::SubscriptionStatus, transaction_types::TransactionType,
    },
};

/// Creates the zero row if missing, then takes the row lock. Every credit
/// mutation for a user is serialized on this lock.
pub fn lock_or_create_balance(
    conn: &mut PgConnection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> QueryResult<CreditBalanceEntity> {
    diesel::insert_into(credit_balances::table)
        .values(CreditBalanceRow::from_entity(&CreditBalanceEntity::empty(user_id, now)))
        .on_conflict(credit_balances::user_id)
        .do_nothing()
        .execute(conn)?;

    let row = credit_balances::table
        .find(user_id)
        .select(CreditBalanceRow::as_select())
        .for_update()
        .first::<CreditBalanceRow>(conn)?;

    Ok(row.into())
}

pub fn has_active_subscription(
    conn: &mut PgConnection,
    user_id: Uuid,
    now: DateTime<Utc>,
) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        subscriptions::table
            .filter(subscriptions::user_id.eq(user_id))
            .filter(subscriptions::status.eq(SubscriptionStatus::Active.as_str()))
            .filter(subscriptions::end_date.ge(now)),
    ))
    .get_result(conn)
}

pub fn user_timezone(conn: &mut PgConnection, user_id: Uuid) -> QueryResult<Option<String>> {
    let timezone = app_users::table
        .find(user_id)
        .select(app_users::timezone)
        .first::<Option<String>>(conn)
        .optional()?;

    Ok(timezone.flatten())
}

fn reference_seen(
    conn: &mut PgConnection,
    user_id: Uuid,
    transaction_type: TransactionType,
    reference: &str,
) -> QueryResult<bool> {
    diesel::select(diesel::dsl::exists(
        credit_transactions::table
            .filter(credit_transactions::user_id.eq(user_id))
            .filter(credit_transactions::type_.eq(transaction_type.as_str()))
            .filter(credit_transactions::reference.eq(reference)),
    ))
    .get_result(conn)
}

/// Lock, plan, verify, write. A planning or invariant error is returned as a
/// `LedgerError` inside the `anyhow::Error`, which rolls the caller's
/// transaction back.
pub fn apply_in_tx(
    conn: &mut PgConnection,
    user_id: Uuid,
    op: &BalanceOperation,
    now: DateTime<Utc>,
    default_timezone: Tz,
) -> Result<BalanceOutcome> {
    let prior = lock_or_create_balance(conn, user_id, now)?;

    let mut ctx = LedgerContext::new(now, default_timezone);
    if op.needs_subscription_context() {
        ctx.has_active_subscription = has_active_subscription(conn, user_id, now)?;
        let stored = user_timezone(conn, user_id)?;
        ctx.timezone = resolve_timezone(stored.as_deref(), default_timezone);
    }
    if let Some(reference) = op.once_only_reference() {
        ctx.reference_seen = reference_seen(conn, user_id, op.transaction_type(), reference)?;
    }

    let plan = plan_operation(&prior, op, &ctx)?;
    verify_plan(&prior, op, &plan)?;

    if plan.mutates(&prior) {
        diesel::update(credit_balances::table.find(user_id))
            .set(CreditBalanceChangeset::from(&plan.next))
            .execute(conn)?;
    }

    if let Some(entry) = plan.entry {
        diesel::insert_into(credit_transactions::table)
            .values(InsertCreditTransactionRow {
                user_id,
                type_: entry.transaction_type.as_str().to_string(),
                amount: entry.amount,
                balance: entry.balance,
                reference: entry.reference,
                description: Some(entry.description),
                created_at: now,
            })
            .execute(conn)?;
    }

    Ok(plan.outcome)
}
